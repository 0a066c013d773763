// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Release teardown, including resources Helm leaves behind.

use super::ownership::OwnershipMatcher;
use crate::constants::release_selector;
use crate::error::{is_not_found, HarnessError, Result};
use crate::helm::{ReleaseManager, UninstallOutcome};
use crate::kubernetes::write_pods_debug_info;
use crate::scope::ScopeOutcome;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, ServiceAccount};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    api::{DeleteParams, ListParams},
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Removes a release and everything it left in the namespace
#[derive(Clone)]
pub struct Decommissioner {
    pub(crate) client: Client,
    pub(crate) namespace: String,
    pub(crate) release_name: String,
    pub(crate) releases: Arc<dyn ReleaseManager>,
    pub(crate) ownership: Arc<dyn OwnershipMatcher>,
    pub(crate) debug_directory: Option<PathBuf>,
}

impl Decommissioner {
    /// Tear the release down. Objects that are already gone count as
    /// deleted; any other failure stops the teardown.
    #[instrument(skip(self), fields(release = %self.release_name, namespace = %self.namespace))]
    pub async fn destroy(&self, outcome: ScopeOutcome, test_name: &str) -> Result<()> {
        if outcome.is_failed() {
            self.capture_diagnostics(test_name).await;
        }

        match self.releases.uninstall(&self.release_name).await {
            Ok(UninstallOutcome::Removed) => info!("Uninstalled release {}", self.release_name),
            Ok(UninstallOutcome::NotFound) => {
                debug!("Release {} was already uninstalled", self.release_name)
            }
            Err(e) => {
                return Err(HarnessError::Teardown(format!(
                    "failed to uninstall {}: {}",
                    self.release_name, e
                )))
            }
        }

        self.delete_volume_claims().await?;

        let accounts = self.sweep::<ServiceAccount>("service account").await?;
        let secrets = self.sweep::<Secret>("secret").await?;

        info!(
            "Release {} destroyed, removed {} service accounts and {} secrets",
            self.release_name,
            accounts.len(),
            secrets.len()
        );
        Ok(())
    }

    /// Diagnostics are best effort and never block teardown
    async fn capture_diagnostics(&self, test_name: &str) {
        let Some(directory) = &self.debug_directory else {
            debug!("No debug directory configured, skipping pod diagnostics");
            return;
        };

        if let Err(e) = write_pods_debug_info(
            &self.client,
            &self.namespace,
            &release_selector(&self.release_name),
            directory,
            test_name,
        )
        .await
        {
            warn!("Failed to write pod debug info: {}", e);
        }
    }

    /// Helm keeps StatefulSet volume claims after uninstall
    async fn delete_volume_claims(&self) -> Result<()> {
        let pvcs: Api<PersistentVolumeClaim> =
            Api::namespaced(self.client.clone(), &self.namespace);
        let lp = ListParams::default().labels(&release_selector(&self.release_name));

        match pvcs.delete_collection(&DeleteParams::default(), &lp).await {
            Ok(_) => {
                debug!("Deleted volume claims of {}", self.release_name);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(HarnessError::Teardown(format!(
                "failed to delete volume claims of {}: {}",
                self.release_name, e
            ))),
        }
    }

    /// Delete every object of kind `K` the ownership matcher assigns to the
    /// release. Returns the names that were targeted.
    async fn sweep<K>(&self, kind: &str) -> Result<Vec<String>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), &self.namespace);
        let list = api.list(&ListParams::default()).await.map_err(|e| {
            HarnessError::Teardown(format!("failed to list {}s in {}: {}", kind, self.namespace, e))
        })?;

        let names: Vec<String> = list.items.iter().map(|o| o.name_any()).collect();
        let owned = owned_names(self.ownership.as_ref(), &self.release_name, &names);

        for name in &owned {
            match api.delete(name, &DeleteParams::default()).await {
                Ok(_) => debug!("Deleted {} {}", kind, name),
                Err(e) if is_not_found(&e) => debug!("{} {} already gone", kind, name),
                Err(e) => {
                    return Err(HarnessError::Teardown(format!(
                        "failed to delete {} {}: {}",
                        kind, name, e
                    )))
                }
            }
        }

        Ok(owned)
    }
}

/// Names the matcher assigns to `release`, in input order
pub fn owned_names(matcher: &dyn OwnershipMatcher, release: &str, names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|name| matcher.owns(release, name))
        .cloned()
        .collect()
}
