// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Release manager abstraction over install, upgrade, uninstall and list.

pub mod cli;

pub use cli::HelmCli;

use crate::error::Result;
use crate::values::HelmValues;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One entry of `helm list --output json`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleaseRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub chart: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl ReleaseRecord {
    pub fn new(name: &str, chart: &str) -> Self {
        Self {
            name: name.to_string(),
            chart: chart.to_string(),
            ..Default::default()
        }
    }
}

/// Result of uninstalling a release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallOutcome {
    Removed,
    /// The release did not exist, nothing was removed
    NotFound,
}

/// Drives releases of a chart within one namespace
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    async fn install(&self, chart: &Path, release: &str, values: &HelmValues) -> Result<()>;

    async fn upgrade(&self, chart: &Path, release: &str, values: &HelmValues) -> Result<()>;

    async fn uninstall(&self, release: &str) -> Result<UninstallOutcome>;

    async fn list(&self) -> Result<Vec<ReleaseRecord>>;
}
