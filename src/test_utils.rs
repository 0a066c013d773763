// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses and Helm.

use crate::error::{HarnessError, Result};
use crate::helm::{ReleaseManager, ReleaseRecord, UninstallOutcome};
use crate::values::HelmValues;
use async_trait::async_trait;
use http::{Request, Response};
use k8s_openapi::api::core::v1::{
    Pod, PodCondition, PodStatus, Secret, ServiceAccount,
};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::Client;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request seen by [`MockService`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
}

/// A mock HTTP service that returns predefined responses based on request
/// method and exact path. Unmatched requests get a 404.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for DELETE requests matching the exact path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of the requests received with the given method
    pub fn paths(&self, method: &str) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .map(|r| r.path)
            .collect()
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<
            dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>>
                + Send,
        >,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.clone(),
            path: path.clone(),
            query: req.uri().query().map(str::to_string),
        });

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("resource", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Path of a namespaced core/v1 collection
pub fn core_path(namespace: &str, resource: &str) -> String {
    format!("/api/v1/namespaces/{}/{}", namespace, resource)
}

/// Path of a single namespaced core/v1 object
pub fn object_path(namespace: &str, resource: &str, name: &str) -> String {
    format!("{}/{}", core_path(namespace, resource), name)
}

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap()
}

/// Wrap serialized objects in a list response
pub fn list_json<T: Serialize>(kind: &str, items: &[T]) -> String {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": { "resourceVersion": "1" },
        "items": items,
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    status_json(404, "NotFound", &format!("{} \"{}\" not found", resource, name))
}

/// Create a 403 forbidden response
pub fn forbidden_json(resource: &str) -> String {
    status_json(403, "Forbidden", &format!("{} is forbidden", resource))
}

/// A successful delete response
pub fn success_json() -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Success",
        "code": 200
    })
    .to_string()
}

fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

fn meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

pub fn make_secret(name: &str, namespace: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: meta(name, namespace),
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

pub fn make_service_account(name: &str, namespace: &str) -> ServiceAccount {
    ServiceAccount {
        metadata: meta(name, namespace),
        ..Default::default()
    }
}

pub fn make_pod(name: &str, namespace: &str, release: &str, ready: bool) -> Pod {
    let mut metadata = meta(name, namespace);
    metadata.labels = Some(BTreeMap::from([(
        "release".to_string(),
        release.to_string(),
    )]));

    Pod {
        metadata,
        status: Some(PodStatus {
            phase: Some("Running".to_string()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".to_string(),
                status: if ready { "True" } else { "False" }.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A call made against [`RecordingReleaseManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseCall {
    Install { release: String, values: HelmValues },
    Upgrade { release: String, values: HelmValues },
    Uninstall { release: String },
    List,
}

/// In-memory release manager that records every call
#[derive(Clone, Default)]
pub struct RecordingReleaseManager {
    calls: Arc<Mutex<Vec<ReleaseCall>>>,
    releases: Arc<Mutex<Vec<ReleaseRecord>>>,
    fail_install: Arc<Mutex<Option<String>>>,
    uninstall_missing: Arc<Mutex<bool>>,
}

impl RecordingReleaseManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases reported by `list`
    pub fn with_releases(self, releases: Vec<ReleaseRecord>) -> Self {
        *self.releases.lock().unwrap() = releases;
        self
    }

    /// Make `install` fail with the given message
    pub fn failing_install(self, message: &str) -> Self {
        *self.fail_install.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Make `uninstall` report the release as already gone
    pub fn uninstall_not_found(self) -> Self {
        *self.uninstall_missing.lock().unwrap() = true;
        self
    }

    pub fn calls(&self) -> Vec<ReleaseCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ReleaseCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ReleaseManager for RecordingReleaseManager {
    async fn install(&self, _chart: &Path, release: &str, values: &HelmValues) -> Result<()> {
        self.record(ReleaseCall::Install {
            release: release.to_string(),
            values: values.clone(),
        });
        match self.fail_install.lock().unwrap().clone() {
            Some(message) => Err(HarnessError::Helm(message)),
            None => Ok(()),
        }
    }

    async fn upgrade(&self, _chart: &Path, release: &str, values: &HelmValues) -> Result<()> {
        self.record(ReleaseCall::Upgrade {
            release: release.to_string(),
            values: values.clone(),
        });
        Ok(())
    }

    async fn uninstall(&self, release: &str) -> Result<UninstallOutcome> {
        self.record(ReleaseCall::Uninstall {
            release: release.to_string(),
        });
        if *self.uninstall_missing.lock().unwrap() {
            Ok(UninstallOutcome::NotFound)
        } else {
            Ok(UninstallOutcome::Removed)
        }
    }

    async fn list(&self) -> Result<Vec<ReleaseRecord>> {
        self.record(ReleaseCall::List);
        Ok(self.releases.lock().unwrap().clone())
    }
}

/// A chart directory that never gets read by the recording release manager
pub fn chart_path() -> PathBuf {
    PathBuf::from("/charts/consul")
}
