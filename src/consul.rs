// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Minimal Consul HTTP API client for tests.

use crate::constants::{ports, CONSUL_TOKEN_HEADER};
use crate::error::{HarnessError, Result};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::fmt;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

#[derive(Clone)]
pub struct ConsulConfig {
    /// `host:port` of the agent
    pub address: String,
    pub scheme: Scheme,
    pub token: Option<String>,
    pub insecure_skip_verify: bool,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", ports::HTTP),
            scheme: Scheme::Http,
            token: None,
            insecure_skip_verify: false,
        }
    }
}

impl fmt::Debug for ConsulConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsulConfig")
            .field("address", &self.address)
            .field("scheme", &self.scheme)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ConsulClient {
    config: ConsulConfig,
    base_url: Url,
    http: reqwest::Client,
}

impl ConsulClient {
    pub fn new(config: ConsulConfig) -> Result<Self> {
        let base_url = Url::parse(&format!("{}://{}", config.scheme.as_str(), config.address))
            .map_err(|e| {
                HarnessError::Connect(format!("invalid address {}: {}", config.address, e))
            })?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(token)
                .map_err(|e| HarnessError::Connect(format!("invalid ACL token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(CONSUL_TOKEN_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| HarnessError::Connect(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    pub fn config(&self) -> &ConsulConfig {
        &self.config
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    pub fn scheme(&self) -> Scheme {
        self.config.scheme
    }

    pub fn token(&self) -> Option<&str> {
        self.config.token.as_deref()
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| HarnessError::Connect(format!("invalid API path {}: {}", path, e)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| {
                HarnessError::Connect(format!("request to {} failed: {}", self.address(), e))
            })?;
        Ok(response)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(HarnessError::Connect(format!("Consul returned {}: {}", status, body.trim())))
    }

    /// Raft leader address, empty when there is none
    pub async fn leader(&self) -> Result<String> {
        let response = self.send(self.http.get(self.url("/v1/status/leader")?)).await?;
        Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| HarnessError::Connect(format!("invalid leader response: {}", e)))
    }

    /// Raft peer addresses
    pub async fn peers(&self) -> Result<Vec<String>> {
        let response = self.send(self.http.get(self.url("/v1/status/peers")?)).await?;
        Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| HarnessError::Connect(format!("invalid peers response: {}", e)))
    }

    pub async fn kv_put(&self, key: &str, value: impl Into<Bytes>) -> Result<bool> {
        let url = self.url(&format!("/v1/kv/{}", key))?;
        let response = self.send(self.http.put(url).body(value.into())).await?;
        Self::expect_success(response)
            .await?
            .json()
            .await
            .map_err(|e| HarnessError::Connect(format!("invalid kv response: {}", e)))
    }

    /// Raw value of `key`, `None` when the key does not exist
    pub async fn kv_get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut url = self.url(&format!("/v1/kv/{}", key))?;
        url.set_query(Some("raw"));

        let response = self.send(self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::expect_success(response)
            .await?
            .bytes()
            .await
            .map_err(|e| HarnessError::Connect(format!("failed to read kv value: {}", e)))?;
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one HTTP response and hand back the raw request head
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });

        (address, rx)
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ConsulConfig {
            token: Some("s3cr3t".to_string()),
            ..Default::default()
        };

        let printed = format!("{:?}", config);
        assert!(!printed.contains("s3cr3t"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_default_config_is_plaintext() {
        let client = ConsulClient::new(ConsulConfig::default()).unwrap();

        assert_eq!(client.scheme(), Scheme::Http);
        assert_eq!(client.address(), "127.0.0.1:8500");
        assert!(client.token().is_none());
    }

    #[tokio::test]
    async fn test_leader_sends_token() {
        let (address, request) = serve_once("200 OK", r#""10.0.0.5:8300""#).await;
        let client = ConsulClient::new(ConsulConfig {
            address,
            token: Some("abc".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(client.leader().await.unwrap(), "10.0.0.5:8300");

        let request = request.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /v1/status/leader"));
        assert!(request.contains("x-consul-token: abc"));
    }

    #[tokio::test]
    async fn test_kv_get_missing_key() {
        let (address, _request) = serve_once("404 Not Found", "").await;
        let client = ConsulClient::new(ConsulConfig {
            address,
            ..Default::default()
        })
        .unwrap();

        assert!(client.kv_get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_connect_error() {
        let (address, _request) = serve_once("403 Forbidden", "ACL not found").await;
        let client = ConsulClient::new(ConsulConfig {
            address,
            ..Default::default()
        })
        .unwrap();

        let result = client.peers().await;
        assert!(matches!(result, Err(HarnessError::Connect(msg)) if msg.contains("ACL not found")));
    }
}
