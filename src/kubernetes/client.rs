// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test context and Kubernetes client creation

use crate::config::TestConfig;
use crate::error::{HarnessError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Where tests run: the namespace, the kube context and a client bound to it.
#[derive(Clone)]
pub struct TestContext {
    client: Client,
    namespace: String,
    kube_context: Option<String>,
    kubeconfig: Option<PathBuf>,
}

impl TestContext {
    /// Wrap an existing client. Helm falls back to its own kubeconfig discovery.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            kube_context: None,
            kubeconfig: None,
        }
    }

    /// Build a context and its client from the harness configuration
    #[instrument(skip(config), fields(namespace = %config.namespace))]
    pub async fn from_config(config: &TestConfig) -> Result<Self> {
        let client =
            create_client(config.kubeconfig.as_deref(), config.kube_context.as_deref()).await?;
        info!("Connected to Kubernetes cluster");

        Ok(Self {
            client,
            namespace: config.namespace.clone(),
            kube_context: config.kube_context.clone(),
            kubeconfig: config.kubeconfig.clone(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kube_context(&self) -> Option<&str> {
        self.kube_context.as_deref()
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }
}

/// Create a client from an explicit kubeconfig file, or infer one from the
/// environment when no file is given.
async fn create_client(kubeconfig: Option<&Path>, context: Option<&str>) -> Result<Client> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    let client_config = match (kubeconfig, context) {
        (Some(path), _) => {
            debug!("Loading kubeconfig from {}", path.display());
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                HarnessError::Kubeconfig(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let parsed: Kubeconfig = serde_yaml::from_str(&raw).map_err(|e| {
                HarnessError::Kubeconfig(format!("Failed to parse kubeconfig: {}", e))
            })?;
            KConfig::from_custom_kubeconfig(parsed, &options)
                .await
                .map_err(|e| HarnessError::Kubeconfig(format!("Failed to create config: {}", e)))?
        }
        (None, Some(_)) => KConfig::from_kubeconfig(&options)
            .await
            .map_err(|e| HarnessError::Kubeconfig(format!("Failed to create config: {}", e)))?,
        (None, None) => KConfig::infer()
            .await
            .map_err(|e| HarnessError::Kubeconfig(format!("Failed to infer config: {}", e)))?,
    };

    Client::try_from(client_config)
        .map_err(|e| HarnessError::Kubeconfig(format!("Failed to create client: {}", e)))
}
