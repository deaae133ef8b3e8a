// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use tracing::warn;

/// Sentinel substring marking unconfigured secret material. Lookups of
/// missing keys synthesize a value containing it, so an unconfigured
/// format fails loudly at the write/lock step instead of silently deriving
/// passwords from an empty secret.
pub const PLACEHOLDER: &str = "CHANGE-ME";

/// Keys every deployment is expected to configure.
const EXPECTED_KEYS: [&str; 7] = [
    "DE290Tag.access",
    "DE290Tag.kill",
    "DE6Tag.access",
    "DE6Tag.kill",
    "DE386Tag.access",
    "DE386Tag.kill",
    "BRTag.secret",
];

static REGISTRY: OnceCell<HashMap<String, String>> = OnceCell::new();

/// Installs the password map once at startup. Subsequent calls are
/// ignored, which keeps the registry read-only for its whole lifetime.
///
/// Missing expected keys and values still carrying the placeholder are
/// reported as warnings so operators notice before the first write fails.
pub fn install(map: HashMap<String, String>) {
    for key in EXPECTED_KEYS {
        match map.get(key) {
            None => warn!("tag password {key} is not configured"),
            Some(v) if v.contains(PLACEHOLDER) => {
                warn!("tag password {key} still contains the {PLACEHOLDER} placeholder")
            },
            Some(_) => {},
        }
    }
    let _ = REGISTRY.set(map);
}

/// Looks up `"<FormatName>.<Role>"`, e.g. `DE290Tag.access`.
///
/// A missing entry (or an uninstalled registry) yields the placeholder
/// sentinel for that key.
pub fn lookup(format_name: &str, role: &str) -> String {
    let key = format!("{format_name}.{role}");
    REGISTRY
        .get()
        .and_then(|m| m.get(&key))
        .cloned()
        .unwrap_or_else(|| format!("{PLACEHOLDER}-{key}"))
}
