// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod readiness waiting

use crate::constants::readiness::POLL_INTERVAL_SECS;
use crate::error::{HarnessError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::{api::ListParams, Api, Client, ResourceExt};
use kube_runtime::wait::Condition;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

/// Condition: the pod reports `Ready=True`
pub fn is_pod_ready() -> impl Condition<Pod> {
    |obj: Option<&Pod>| {
        obj.and_then(|pod| pod.status.as_ref())
            .and_then(|status| status.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
    }
}

/// Names of the pods in `pods` that are not ready yet
fn unready_pods(pods: &[Pod]) -> Vec<String> {
    let ready = is_pod_ready();
    pods.iter()
        .filter(|pod| !ready.matches_object(Some(pod)))
        .map(|pod| pod.name_any())
        .collect()
}

/// Wait until at least one pod matches `selector` and all matching pods are ready.
#[instrument(skip(client))]
pub async fn wait_for_pods_ready(
    client: &Client,
    namespace: &str,
    selector: &str,
    timeout: Duration,
) -> Result<()> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let lp = ListParams::default().labels(selector);
    let deadline = Instant::now() + timeout;

    loop {
        let waiting_on = match pods.list(&lp).await {
            Ok(list) if list.items.is_empty() => "no pods found yet".to_string(),
            Ok(list) => {
                let unready = unready_pods(&list.items);
                if unready.is_empty() {
                    info!("All {} pods matching {} are ready", list.items.len(), selector);
                    return Ok(());
                }
                format!("pods not ready: {}", unready.join(", "))
            }
            Err(e) => format!("failed to list pods: {}", e),
        };

        if Instant::now() >= deadline {
            return Err(HarnessError::Provision(format!(
                "timed out after {:?} waiting for pods matching {} in {}: {}",
                timeout, selector, namespace, waiting_on
            )));
        }

        debug!("Waiting for pods matching {}: {}", selector, waiting_on);
        sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{core_path, list_json, make_pod, MockService};

    #[test]
    fn test_is_pod_ready() {
        let ready = make_pod("p", "ns", "r", true);
        let not_ready = make_pod("p", "ns", "r", false);
        let mut no_status = make_pod("p", "ns", "r", true);
        no_status.status = None;

        assert!(is_pod_ready().matches_object(Some(&ready)));
        assert!(!is_pod_ready().matches_object(Some(&not_ready)));
        assert!(!is_pod_ready().matches_object(Some(&no_status)));
        assert!(!is_pod_ready().matches_object(None));
    }

    #[test]
    fn test_unready_pods() {
        let pods = vec![
            make_pod("test-consul-server-0", "ns", "test", true),
            make_pod("test-consul-client-abcde", "ns", "test", false),
        ];

        assert_eq!(unready_pods(&pods), vec!["test-consul-client-abcde"]);
    }

    #[tokio::test]
    async fn test_wait_for_ready_pods_returns() {
        let pods = vec![
            make_pod("test-consul-server-0", "ns", "test", true),
            make_pod("test-consul-client-abcde", "ns", "test", true),
        ];
        let mock =
            MockService::new().on_get(&core_path("ns", "pods"), 200, &list_json("PodList", &pods));
        let client = mock.clone().into_client();

        wait_for_pods_ready(&client, "ns", "release=test", Duration::from_secs(5))
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .query
            .as_deref()
            .is_some_and(|q| q.contains("labelSelector=release%3Dtest")));
    }

    #[tokio::test]
    async fn test_wait_times_out_without_pods() {
        let mock = MockService::new().on_get(
            &core_path("ns", "pods"),
            200,
            &list_json::<Pod>("PodList", &[]),
        );
        let client = mock.into_client();

        let result = wait_for_pods_ready(&client, "ns", "release=test", Duration::ZERO).await;

        assert!(matches!(
            result,
            Err(HarnessError::Provision(msg)) if msg.contains("no pods found")
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out_on_unready_pod() {
        let pods = vec![make_pod("test-consul-server-0", "ns", "test", false)];
        let mock =
            MockService::new().on_get(&core_path("ns", "pods"), 200, &list_json("PodList", &pods));
        let client = mock.into_client();

        let result = wait_for_pods_ready(&client, "ns", "release=test", Duration::ZERO).await;

        assert!(matches!(
            result,
            Err(HarnessError::Provision(msg)) if msg.contains("test-consul-server-0")
        ));
    }
}
