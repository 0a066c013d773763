// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ACL token resolution and Consul client bootstrap through a pod tunnel.

use crate::constants::{names, ports, secret_keys};
use crate::consul::{ConsulClient, ConsulConfig, Scheme};
use crate::error::{is_not_found, HarnessError, Result};
use crate::kubernetes::Tunnel;
use crate::scope::TestScope;
use bytes::Bytes;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::{info, instrument};

/// ACL credential of a datacenter. Primary datacenters bootstrap ACLs and
/// get a bootstrap token; secondaries get the replication token instead.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Primary { token: Bytes },
    Secondary { replication_token: Bytes },
}

impl Credential {
    pub fn token(&self) -> &[u8] {
        match self {
            Credential::Primary { token } => token,
            Credential::Secondary { replication_token } => replication_token,
        }
    }

    pub fn to_token_string(&self) -> Result<String> {
        String::from_utf8(self.token().to_vec())
            .map_err(|e| HarnessError::Connect(format!("ACL token is not valid UTF-8: {}", e)))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Primary { .. } => f.write_str("Primary(<redacted>)"),
            Credential::Secondary { .. } => f.write_str("Secondary(<redacted>)"),
        }
    }
}

/// Port, scheme and verification settings for one connection mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPlan {
    pub remote_port: u16,
    pub scheme: Scheme,
    pub insecure_skip_verify: bool,
}

impl ConnectionPlan {
    pub fn new(secure: bool) -> Self {
        if secure {
            // The tunnel is the trust boundary, the server certificate is not checked
            Self {
                remote_port: ports::HTTPS,
                scheme: Scheme::Https,
                insecure_skip_verify: true,
            }
        } else {
            Self {
                remote_port: ports::HTTP,
                scheme: Scheme::Http,
                insecure_skip_verify: false,
            }
        }
    }
}

pub fn bootstrap_token_secret_name(release: &str) -> String {
    format!("{}{}", release, names::BOOTSTRAP_TOKEN_SUFFIX)
}

pub fn federation_secret_name(release: &str) -> String {
    format!("{}{}", release, names::FEDERATION_SUFFIX)
}

pub fn server_pod_name(release: &str) -> String {
    format!("{}{}", release, names::SERVER_POD_SUFFIX)
}

fn secret_value(secret: &Secret, name: &str, key: &str) -> Result<Bytes> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .map(|v| Bytes::from(v.0.clone()))
        .ok_or_else(|| {
            HarnessError::Connect(format!("secret {} does not contain '{}' key", name, key))
        })
}

/// Read the bootstrap token, falling back to the federation secret's
/// replication token when the bootstrap secret does not exist.
#[instrument(skip(client))]
pub async fn resolve_credential(
    client: &Client,
    namespace: &str,
    release: &str,
) -> Result<Credential> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let bootstrap_name = bootstrap_token_secret_name(release);

    match secrets.get(&bootstrap_name).await {
        Ok(secret) => {
            info!("Using ACL bootstrap token from {}", bootstrap_name);
            Ok(Credential::Primary {
                token: secret_value(&secret, &bootstrap_name, secret_keys::TOKEN)?,
            })
        }
        Err(e) if is_not_found(&e) => {
            let federation_name = federation_secret_name(release);
            let secret = secrets.get(&federation_name).await.map_err(|e| {
                HarnessError::Connect(format!("failed to read secret {}: {}", federation_name, e))
            })?;
            info!("Using replication token from {}", federation_name);
            Ok(Credential::Secondary {
                replication_token: secret_value(
                    &secret,
                    &federation_name,
                    secret_keys::REPLICATION_TOKEN,
                )?,
            })
        }
        Err(e) => Err(HarnessError::Connect(format!(
            "failed to read secret {}: {}",
            bootstrap_name, e
        ))),
    }
}

/// Open a tunnel to the first server pod and build a client bound to it.
/// The tunnel closes when `scope` closes.
#[instrument(skip(client, scope), fields(scope = %scope.name()))]
pub async fn connect(
    client: &Client,
    namespace: &str,
    release: &str,
    scope: &TestScope,
    secure: bool,
) -> Result<ConsulClient> {
    let plan = ConnectionPlan::new(secure);

    let token = if secure {
        Some(
            resolve_credential(client, namespace, release)
                .await?
                .to_token_string()?,
        )
    } else {
        None
    };

    let tunnel =
        Tunnel::open(client, namespace, &server_pod_name(release), plan.remote_port).await?;
    let config = ConsulConfig {
        address: tunnel.local_addr().to_string(),
        scheme: plan.scheme,
        token,
        insecure_skip_verify: plan.insecure_skip_verify,
    };

    scope.defer(
        format!("close tunnel to {}:{}", tunnel.pod(), tunnel.remote_port()),
        move |_| async move {
            tunnel.close();
            Ok(())
        },
    );

    ConsulClient::new(config)
}
