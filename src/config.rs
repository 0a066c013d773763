// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::readiness::DEFAULT_TIMEOUT_SECS;
use crate::error::{HarnessError, Result};
use crate::values::HelmValues;
use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Harness configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub kubeconfig: Option<PathBuf>,
    pub kube_context: Option<String>,
    pub namespace: String,
    /// Path to the Helm chart installed by every cluster
    pub chart_path: PathBuf,
    /// Leave resources behind when a test fails, for post-mortem debugging
    pub no_cleanup_on_failure: bool,
    /// Where pod descriptions and logs of failed tests are written
    pub debug_directory: Option<PathBuf>,

    pub enable_enterprise: bool,
    pub enterprise_license_secret_name: Option<String>,
    pub enterprise_license_secret_key: Option<String>,
    pub enable_openshift: bool,
    pub enable_pod_security_policies: bool,

    pub consul_image: Option<String>,
    pub consul_k8s_image: Option<String>,

    pub ready_timeout: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            kube_context: None,
            namespace: "default".to_string(),
            chart_path: PathBuf::from("."),
            no_cleanup_on_failure: false,
            debug_directory: None,
            enable_enterprise: false,
            enterprise_license_secret_name: None,
            enterprise_license_secret_key: None,
            enable_openshift: false,
            enable_pod_security_policies: false,
            consul_image: None,
            consul_k8s_image: None,
            ready_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl TestConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let ready_timeout = match env::var("CONSUL_HARNESS_READY_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .context("CONSUL_HARNESS_READY_TIMEOUT_SECS must be a number of seconds")?,
            ),
            Err(_) => defaults.ready_timeout,
        };

        Ok(TestConfig {
            kubeconfig: optional("CONSUL_HARNESS_KUBECONFIG").map(PathBuf::from),
            kube_context: optional("CONSUL_HARNESS_KUBE_CONTEXT"),
            namespace: optional("CONSUL_HARNESS_NAMESPACE").unwrap_or(defaults.namespace),
            chart_path: optional("CONSUL_HARNESS_CHART_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.chart_path),
            no_cleanup_on_failure: flag("CONSUL_HARNESS_NO_CLEANUP_ON_FAILURE"),
            debug_directory: optional("CONSUL_HARNESS_DEBUG_DIRECTORY").map(PathBuf::from),
            enable_enterprise: flag("CONSUL_HARNESS_ENABLE_ENTERPRISE"),
            enterprise_license_secret_name: optional(
                "CONSUL_HARNESS_ENTERPRISE_LICENSE_SECRET_NAME",
            ),
            enterprise_license_secret_key: optional("CONSUL_HARNESS_ENTERPRISE_LICENSE_SECRET_KEY"),
            enable_openshift: flag("CONSUL_HARNESS_ENABLE_OPENSHIFT"),
            enable_pod_security_policies: flag("CONSUL_HARNESS_ENABLE_POD_SECURITY_POLICIES"),
            consul_image: optional("CONSUL_HARNESS_CONSUL_IMAGE"),
            consul_k8s_image: optional("CONSUL_HARNESS_CONSUL_K8S_IMAGE"),
            ready_timeout,
        })
    }

    /// Helm values implied by this configuration. These sit between the
    /// built-in defaults and per-test overrides.
    pub fn helm_values_from_config(&self) -> Result<HelmValues> {
        let mut values = HelmValues::new();

        if self.enable_enterprise {
            let (Some(name), Some(key)) = (
                self.enterprise_license_secret_name.as_ref(),
                self.enterprise_license_secret_key.as_ref(),
            ) else {
                return Err(HarnessError::Config(
                    "enterprise is enabled but the license secret name or key is not set"
                        .to_string(),
                ));
            };
            values.insert(
                "global.enterpriseLicense.secretName".to_string(),
                name.clone(),
            );
            values.insert("global.enterpriseLicense.secretKey".to_string(), key.clone());
        }

        if self.enable_openshift {
            values.insert("global.openshift.enabled".to_string(), "true".to_string());
        }

        if self.enable_pod_security_policies {
            values.insert(
                "global.enablePodSecurityPolicies".to_string(),
                "true".to_string(),
            );
        }

        if let Some(image) = &self.consul_image {
            values.insert("global.image".to_string(), image.clone());
        }

        if let Some(image) = &self.consul_k8s_image {
            values.insert("global.imageK8S".to_string(), image.clone());
        }

        Ok(values)
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn flag(name: &str) -> bool {
    env::var(name)
        .unwrap_or("false".to_string())
        .parse()
        .unwrap_or(false)
}
