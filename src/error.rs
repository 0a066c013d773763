// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("detected an existing installation of Consul {chart}, release name: {release}")]
    Conflict { chart: String, release: String },

    #[error("Provisioning failed: {0}")]
    Provision(String),

    #[error("Teardown failed: {0}")]
    Teardown(String),

    #[error("Client connection failed: {0}")]
    Connect(String),

    #[error("Helm command failed: {0}")]
    Helm(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to parse kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to capture diagnostics: {0}")]
    Diagnostics(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

/// Whether a Kubernetes API error is a 404 for the requested object.
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}
