// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Layered Helm value maps.

use std::collections::BTreeMap;

/// Dotted Helm value paths (`server.replicas`) to their string values.
pub type HelmValues = BTreeMap<String, String>;

/// Merge `overlay` into `base`. Keys present in both take the overlay value.
pub fn merge_values(base: &mut HelmValues, overlay: &HelmValues) {
    for (k, v) in overlay {
        base.insert(k.clone(), v.clone());
    }
}

/// Values every cluster starts from: a single-server datacenter.
pub fn default_values() -> HelmValues {
    HelmValues::from([
        ("server.replicas".to_string(), "1".to_string()),
        ("server.bootstrapExpect".to_string(), "1".to_string()),
    ])
}

/// Build the effective values from defaults, config-derived values and
/// caller overrides, in that order of increasing precedence.
pub fn layered_values(from_config: &HelmValues, overrides: &HelmValues) -> HelmValues {
    let mut values = default_values();
    merge_values(&mut values, from_config);
    merge_values(&mut values, overrides);
    values
}
