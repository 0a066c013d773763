// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Application name used by the prior-installation check
pub const APP_NAME: &str = "consul";

/// Label key the chart puts on every workload it renders
pub const RELEASE_LABEL: &str = "release";

/// Consul HTTP API ports on the server pods
pub mod ports {
    pub const HTTP: u16 = 8500;
    pub const HTTPS: u16 = 8501;
}

/// Names of resources derived from the release name
pub mod names {
    /// Secret holding the ACL bootstrap token on primary datacenters
    pub const BOOTSTRAP_TOKEN_SUFFIX: &str = "-consul-bootstrap-acl-token";
    /// Secret shared with secondary datacenters for WAN federation
    pub const FEDERATION_SUFFIX: &str = "-consul-federation";
    /// First server pod of the StatefulSet, target of the client tunnel
    pub const SERVER_POD_SUFFIX: &str = "-consul-server-0";
}

/// Secret data keys
pub mod secret_keys {
    pub const TOKEN: &str = "token";
    pub const REPLICATION_TOKEN: &str = "replicationToken";
}

/// Pod readiness polling configuration
pub mod readiness {
    /// Interval between pod readiness checks in seconds
    pub const POLL_INTERVAL_SECS: u64 = 2;
    /// Default upper bound for a readiness wait in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
}

/// Header carrying the ACL token on Consul API requests
pub const CONSUL_TOKEN_HEADER: &str = "X-Consul-Token";

/// Label selector matching every object of a release
pub fn release_selector(release_name: &str) -> String {
    format!("{}={}", RELEASE_LABEL, release_name)
}
