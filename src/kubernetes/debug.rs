// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod diagnostics capture for failed tests

use crate::error::{HarnessError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{ListParams, LogParams},
    Api, Client, ResourceExt,
};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Write a description and container logs of every pod matching `selector`
/// into `<directory>/<test_name>/`. Returns the files written.
#[instrument(skip(client, directory))]
pub async fn write_pods_debug_info(
    client: &Client,
    namespace: &str,
    selector: &str,
    directory: &Path,
    test_name: &str,
) -> Result<Vec<PathBuf>> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let pod_list = pods.list(&ListParams::default().labels(selector)).await?;

    let test_dir = directory.join(sanitize(test_name));
    tokio::fs::create_dir_all(&test_dir).await.map_err(|e| {
        HarnessError::Diagnostics(format!("failed to create {}: {}", test_dir.display(), e))
    })?;

    let mut written = Vec::new();
    for pod in &pod_list.items {
        let name = pod.name_any();

        let description = serde_yaml::to_string(pod).map_err(|e| {
            HarnessError::Diagnostics(format!("failed to encode pod {}: {}", name, e))
        })?;
        let path = test_dir.join(format!("{}.yaml", name));
        write_file(&path, &description).await?;
        written.push(path);

        for container in container_names(pod) {
            let params = LogParams {
                container: Some(container.clone()),
                ..Default::default()
            };
            let logs = match pods.logs(&name, &params).await {
                Ok(logs) => logs,
                Err(e) => {
                    warn!("Failed to fetch logs for {}/{}: {}", name, container, e);
                    continue;
                }
            };
            let path = test_dir.join(format!("{}-{}.log", name, container));
            write_file(&path, &logs).await?;
            written.push(path);
        }
    }

    info!(
        "Wrote debug info for {} pods to {}",
        pod_list.items.len(),
        test_dir.display()
    );
    Ok(written)
}

fn container_names(pod: &Pod) -> Vec<String> {
    pod.spec
        .as_ref()
        .map(|spec| {
            spec.init_containers
                .iter()
                .flatten()
                .chain(spec.containers.iter())
                .map(|c| c.name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Test names may carry `/` for subtests
fn sanitize(test_name: &str) -> String {
    test_name.replace(['/', ' ', ':'], "_")
}

async fn write_file(path: &Path, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| {
            HarnessError::Diagnostics(format!("failed to write {}: {}", path.display(), e))
        })
}
