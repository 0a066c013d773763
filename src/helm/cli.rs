// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `helm` binary backed release manager

use super::{ReleaseManager, ReleaseRecord, UninstallOutcome};
use crate::error::{HarnessError, Result};
use crate::kubernetes::TestContext;
use crate::values::HelmValues;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Runs helm commands scoped to a namespace and kube context
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: PathBuf,
    namespace: String,
    kube_context: Option<String>,
    kubeconfig: Option<PathBuf>,
}

impl HelmCli {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            binary: PathBuf::from("helm"),
            namespace: namespace.into(),
            kube_context: None,
            kubeconfig: None,
        }
    }

    /// Target the same cluster and namespace as the test context
    pub fn for_context(ctx: &TestContext) -> Self {
        Self {
            binary: PathBuf::from("helm"),
            namespace: ctx.namespace().to_string(),
            kube_context: ctx.kube_context().map(str::to_string),
            kubeconfig: ctx.kubeconfig().map(Path::to_path_buf),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--namespace".to_string(), self.namespace.clone()];
        if let Some(context) = &self.kube_context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args
    }

    fn release_args(
        &self,
        verb: &str,
        chart: &Path,
        release: &str,
        values: &HelmValues,
    ) -> Vec<String> {
        let mut args = vec![
            verb.to_string(),
            release.to_string(),
            chart.display().to_string(),
        ];
        args.extend(self.common_args());
        args.extend(set_args(values));
        args
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        debug!("Running {} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                HarnessError::Helm(format!("failed to run {}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            return Err(HarnessError::Helm(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// One `--set key=value` pair per value, in key order
fn set_args(values: &HelmValues) -> Vec<String> {
    values
        .iter()
        .flat_map(|(k, v)| ["--set".to_string(), format!("{}={}", k, v)])
        .collect()
}

/// Decode the output of `helm list --output json`
pub fn parse_release_list(output: &str) -> Result<Vec<ReleaseRecord>> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
        .map_err(|e| HarnessError::Helm(format!("failed to decode release list: {}", e)))
}

/// Helm reports a missing release as `...: release: not found`. Other
/// "not found" errors, such as an unknown kube context, are real failures.
fn is_release_not_found(message: &str) -> bool {
    message.contains("release: not found")
}

#[async_trait]
impl ReleaseManager for HelmCli {
    #[instrument(skip(self, values), fields(namespace = %self.namespace))]
    async fn install(&self, chart: &Path, release: &str, values: &HelmValues) -> Result<()> {
        info!("Installing release {} from {}", release, chart.display());
        self.run(&self.release_args("install", chart, release, values))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, values), fields(namespace = %self.namespace))]
    async fn upgrade(&self, chart: &Path, release: &str, values: &HelmValues) -> Result<()> {
        info!("Upgrading release {} from {}", release, chart.display());
        self.run(&self.release_args("upgrade", chart, release, values))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn uninstall(&self, release: &str) -> Result<UninstallOutcome> {
        let mut args = vec!["uninstall".to_string(), release.to_string()];
        args.extend(self.common_args());

        match self.run(&args).await {
            Ok(_) => Ok(UninstallOutcome::Removed),
            Err(HarnessError::Helm(message)) if is_release_not_found(&message) => {
                debug!("Release {} already gone: {}", release, message);
                Ok(UninstallOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<ReleaseRecord>> {
        let mut args = vec![
            "list".to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        args.extend(self.common_args());

        let output = self.run(&args).await?;
        parse_release_list(&output)
    }
}
