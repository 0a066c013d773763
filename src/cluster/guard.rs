// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Prior installation check

use crate::error::{HarnessError, Result};
use crate::helm::{ReleaseManager, ReleaseRecord};
use tracing::{debug, instrument};

/// First release whose chart name contains `app_name`
pub fn find_conflicting_release<'a>(
    releases: &'a [ReleaseRecord],
    app_name: &str,
) -> Option<&'a ReleaseRecord> {
    releases.iter().find(|r| r.chart.contains(app_name))
}

/// Fail if any release of `app_name` is already installed. Errors listing
/// releases are returned as-is.
#[instrument(skip(releases))]
pub async fn check_no_prior_installation(
    releases: &dyn ReleaseManager,
    app_name: &str,
) -> Result<()> {
    let installed = releases.list().await?;
    debug!("Found {} installed releases", installed.len());

    match find_conflicting_release(&installed, app_name) {
        Some(existing) => Err(HarnessError::Conflict {
            chart: existing.chart.clone(),
            release: existing.name.clone(),
        }),
        None => Ok(()),
    }
}
