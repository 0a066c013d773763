// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod cluster;
pub mod config;
pub mod constants;
pub mod consul;
pub mod error;
pub mod helm;
pub mod kubernetes;
pub mod scope;
pub mod values;

#[cfg(test)]
pub(crate) mod test_utils;

pub use cluster::HelmCluster;
pub use config::TestConfig;
pub use error::{HarnessError, Result};
pub use kubernetes::TestContext;
pub use scope::TestScope;
