// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Local port to pod port tunnels over the Kubernetes port-forward API

use crate::error::{HarnessError, Result};
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use std::net::{Ipv4Addr, SocketAddr};
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument, warn};

/// A listener on an OS-assigned localhost port whose connections are
/// forwarded to a port on one pod. Forwarding stops when the tunnel is
/// closed or dropped.
pub struct Tunnel {
    pod: String,
    local_addr: SocketAddr,
    remote_port: u16,
    task: JoinHandle<()>,
}

impl Tunnel {
    /// Bind a free local port and start forwarding it to `pod:remote_port`.
    /// Fails if the pod does not exist or no port could be bound.
    #[instrument(skip(client))]
    pub async fn open(
        client: &Client,
        namespace: &str,
        pod: &str,
        remote_port: u16,
    ) -> Result<Self> {
        let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);

        pods.get(pod).await.map_err(|e| {
            HarnessError::Connect(format!("cannot tunnel to pod {}/{}: {}", namespace, pod, e))
        })?;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(|e| HarnessError::Connect(format!("failed to bind local port: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| HarnessError::Connect(format!("failed to read local address: {}", e)))?;

        let task = tokio::spawn(accept_loop(listener, pods, pod.to_string(), remote_port));

        info!(
            "Forwarding {} to {}/{}:{}",
            local_addr, namespace, pod, remote_port
        );

        Ok(Self {
            pod: pod.to_string(),
            local_addr,
            remote_port,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    /// Stop forwarding and release the local port
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        debug!("Closing tunnel {} -> {}:{}", self.local_addr, self.pod, self.remote_port);
        self.task.abort();
    }
}

/// Accept local connections until aborted. In-flight connections live in the
/// join set and are aborted with it.
async fn accept_loop(listener: TcpListener, pods: Api<Pod>, pod: String, remote_port: u16) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Tunnel listener for {} failed: {}", pod, e);
                        break;
                    }
                };
                debug!("Accepted tunnel connection from {}", peer);

                let pods = pods.clone();
                let pod = pod.clone();
                connections.spawn(async move {
                    if let Err(e) = forward_connection(stream, &pods, &pod, remote_port).await {
                        warn!("Tunnel connection to {}:{} failed: {}", pod, remote_port, e);
                    }
                });
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
}

async fn forward_connection(
    mut stream: TcpStream,
    pods: &Api<Pod>,
    pod: &str,
    remote_port: u16,
) -> Result<()> {
    let mut forwarder = pods.portforward(pod, &[remote_port]).await?;

    let mut upstream = forwarder.take_stream(remote_port).ok_or_else(|| {
        HarnessError::Connect(format!("no stream for port {} on {}", remote_port, pod))
    })?;

    copy_bidirectional(&mut stream, &mut upstream)
        .await
        .map_err(|e| HarnessError::Connect(format!("tunnel copy failed: {}", e)))?;

    drop(upstream);
    forwarder
        .join()
        .await
        .map_err(|e| HarnessError::Connect(format!("port-forward ended with error: {}", e)))
}
