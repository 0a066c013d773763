// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Consul cluster lifecycle: create, upgrade, destroy and connect.

pub mod connect;
pub mod guard;
pub mod ownership;
pub mod teardown;

pub use connect::{resolve_credential, ConnectionPlan, Credential};
pub use guard::check_no_prior_installation;
pub use ownership::{ExactPrefix, NameContains, OwnershipMatcher};
pub use teardown::Decommissioner;

use crate::config::TestConfig;
use crate::constants::{release_selector, APP_NAME};
use crate::consul::ConsulClient;
use crate::error::{HarnessError, Result};
use crate::helm::{HelmCli, ReleaseManager};
use crate::kubernetes::{wait_for_pods_ready, TestContext};
use crate::scope::{CleanupPolicy, TestScope};
use crate::values::{layered_values, merge_values, HelmValues};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// A Consul release installed from the Helm chart for the duration of a test
pub struct HelmCluster {
    ctx: TestContext,
    releases: Arc<dyn ReleaseManager>,
    release_name: String,
    chart_path: PathBuf,
    values: HelmValues,
    no_cleanup_on_failure: bool,
    debug_directory: Option<PathBuf>,
    ready_timeout: Duration,
    ownership: Arc<dyn OwnershipMatcher>,
}

impl HelmCluster {
    /// Prepare a cluster with the default values, the values implied by
    /// `config` and `helm_values`, later ones winning. Nothing is installed yet.
    pub fn new(
        ctx: &TestContext,
        config: &TestConfig,
        release_name: impl Into<String>,
        helm_values: &HelmValues,
    ) -> Result<Self> {
        let values = layered_values(&config.helm_values_from_config()?, helm_values);

        Ok(Self {
            ctx: ctx.clone(),
            releases: Arc::new(HelmCli::for_context(ctx)),
            release_name: release_name.into(),
            chart_path: config.chart_path.clone(),
            values,
            no_cleanup_on_failure: config.no_cleanup_on_failure,
            debug_directory: config.debug_directory.clone(),
            ready_timeout: config.ready_timeout,
            ownership: Arc::new(NameContains),
        })
    }

    pub fn with_release_manager(mut self, releases: Arc<dyn ReleaseManager>) -> Self {
        self.releases = releases;
        self
    }

    pub fn with_ownership(mut self, ownership: Arc<dyn OwnershipMatcher>) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn release_name(&self) -> &str {
        &self.release_name
    }

    pub fn namespace(&self) -> &str {
        self.ctx.namespace()
    }

    /// Effective Helm values, including every upgrade so far
    pub fn values(&self) -> &HelmValues {
        &self.values
    }

    pub fn decommissioner(&self) -> Decommissioner {
        Decommissioner {
            client: self.ctx.client().clone(),
            namespace: self.ctx.namespace().to_string(),
            release_name: self.release_name.clone(),
            releases: self.releases.clone(),
            ownership: self.ownership.clone(),
            debug_directory: self.debug_directory.clone(),
        }
    }

    /// Install the chart and wait for its pods. Teardown is registered on
    /// `scope` before anything else so a failed install is still cleaned up.
    #[instrument(
        skip(self, scope),
        fields(release = %self.release_name, namespace = %self.namespace())
    )]
    pub async fn create(&self, scope: &TestScope) -> Result<()> {
        let decommissioner = self.decommissioner();
        let test_name = scope.name().to_string();
        scope.defer_with_policy(
            format!("destroy release {}", self.release_name),
            CleanupPolicy::from_no_cleanup_on_failure(self.no_cleanup_on_failure),
            move |outcome| async move { decommissioner.destroy(outcome, &test_name).await },
        );

        check_no_prior_installation(self.releases.as_ref(), APP_NAME).await?;

        self.releases
            .install(&self.chart_path, &self.release_name, &self.values)
            .await
            .map_err(|e| {
                HarnessError::Provision(format!("install of {} failed: {}", self.release_name, e))
            })?;

        self.wait_until_ready().await?;
        info!("Release {} is ready", self.release_name);
        Ok(())
    }

    /// Merge `helm_values` over the values of previous installs and upgrades,
    /// then upgrade the release and wait for its pods again.
    #[instrument(
        skip(self, helm_values),
        fields(release = %self.release_name, namespace = %self.namespace())
    )]
    pub async fn upgrade(&mut self, helm_values: &HelmValues) -> Result<()> {
        merge_values(&mut self.values, helm_values);

        self.releases
            .upgrade(&self.chart_path, &self.release_name, &self.values)
            .await
            .map_err(|e| {
                HarnessError::Provision(format!("upgrade of {} failed: {}", self.release_name, e))
            })?;

        self.wait_until_ready().await?;
        info!("Release {} upgraded", self.release_name);
        Ok(())
    }

    /// Destroy the release now, outside of scope cleanup
    pub async fn destroy(&self, scope: &TestScope) -> Result<()> {
        self.decommissioner()
            .destroy(scope.outcome(), scope.name())
            .await
    }

    /// Client for the first server, tunnelled to localhost. With `secure`
    /// the client uses HTTPS and the datacenter's ACL token.
    pub async fn connect(&self, scope: &TestScope, secure: bool) -> Result<ConsulClient> {
        connect::connect(
            self.ctx.client(),
            self.ctx.namespace(),
            &self.release_name,
            scope,
            secure,
        )
        .await
    }

    async fn wait_until_ready(&self) -> Result<()> {
        wait_for_pods_ready(
            self.ctx.client(),
            self.ctx.namespace(),
            &release_selector(&self.release_name),
            self.ready_timeout,
        )
        .await
    }
}
