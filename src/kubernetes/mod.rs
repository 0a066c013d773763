// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for client creation, pod readiness, diagnostics and tunnels.

pub mod client;
pub mod debug;
pub mod pods;
pub mod tunnel;

pub use client::TestContext;
pub use debug::write_pods_debug_info;
pub use pods::wait_for_pods_ready;
pub use tunnel::Tunnel;
