// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deciding which auxiliary resources belong to a release.

/// Decides whether a resource name belongs to a release. Used for objects
/// the chart creates without a consistent `release` label.
pub trait OwnershipMatcher: Send + Sync {
    fn owns(&self, release: &str, resource_name: &str) -> bool;
}

/// Any name containing the release name. May match unrelated resources that
/// happen to contain it, so only use it within a test's own namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameContains;

impl OwnershipMatcher for NameContains {
    fn owns(&self, release: &str, resource_name: &str) -> bool {
        resource_name.contains(release)
    }
}

/// Names of the form `<release>-...`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactPrefix;

impl OwnershipMatcher for ExactPrefix {
    fn owns(&self, release: &str, resource_name: &str) -> bool {
        resource_name
            .strip_prefix(release)
            .is_some_and(|rest| rest.starts_with('-'))
    }
}
