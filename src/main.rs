// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

use consul_harness::values::HelmValues;
use consul_harness::{HelmCluster, TestConfig, TestContext, TestScope};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Consul cluster smoke run");

    // Load configuration
    let config = TestConfig::from_env()?;
    info!(
        "Configuration loaded: namespace={}, chart_path={}",
        config.namespace,
        config.chart_path.display()
    );

    let secure: bool = env::var("CONSUL_HARNESS_SECURE")
        .unwrap_or("false".to_string())
        .parse()
        .unwrap_or(false);
    let release_name =
        env::var("CONSUL_HARNESS_RELEASE_NAME").unwrap_or("consul-smoke".to_string());

    let ctx = TestContext::from_config(&config)
        .await
        .context("failed to connect to Kubernetes")?;

    let mut overrides = HelmValues::new();
    if secure {
        overrides.insert("global.tls.enabled".to_string(), "true".to_string());
        overrides.insert("global.acls.manageSystemACLs".to_string(), "true".to_string());
    }

    let cluster = HelmCluster::new(&ctx, &config, release_name, &overrides)?;
    let scope = TestScope::new("smoke");

    scope
        .run(|scope| async move {
            cluster.create(&scope).await?;

            let consul = cluster.connect(&scope, secure).await?;
            let leader = consul.leader().await?;
            anyhow::ensure!(!leader.is_empty(), "datacenter has no leader");
            info!("Consul leader is {}", leader);

            Ok(())
        })
        .await
}
