// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./perch.toml` > `~/.config/perch/perch.toml`
//! > `/etc/perch/perch.toml`, with environment variable overrides via the
//! `PERCH_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PerchConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/perch/perch.toml` (system-wide)
/// 3. `~/.config/perch/perch.toml` (user XDG config)
/// 4. `./perch.toml` (local directory)
/// 5. `PERCH_*` environment variables
pub fn load_config() -> Result<PerchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PerchConfig::default()))
        .merge(Toml::file("/etc/perch/perch.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("perch/perch.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("perch.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<PerchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PerchConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PerchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PerchConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PERCH_STORAGE_DATABASE_PATH` must map
/// to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("PERCH_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("daemon_", "daemon.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("worker_", "worker.", 1)
            .replacen("scheduler_", "scheduler.", 1)
            .replacen("publish_", "publish.", 1)
            .replacen("sync_", "sync.", 1);
        mapped.into()
    })
}
