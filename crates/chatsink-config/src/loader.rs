// SPDX-FileCopyrightText: 2026 Chatsink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chatsink.toml` > `~/.config/chatsink/chatsink.toml` > `/etc/chatsink/chatsink.toml`
//! with environment variable overrides via `CHATSINK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::ChatsinkConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatsink/chatsink.toml` (system-wide)
/// 3. `~/.config/chatsink/chatsink.toml` (user XDG config)
/// 4. `./chatsink.toml` (local directory)
/// 5. `CHATSINK_*` environment variables
pub fn load_config() -> Result<ChatsinkConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChatsinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatsinkConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatsinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatsinkConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChatsinkConfig::default()))
        .merge(Toml::file("/etc/chatsink/chatsink.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatsink/chatsink.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatsink.toml"))
        .merge(env_provider())
}

/// Top-level sections that environment keys may address.
const SECTIONS: &[&str] = &["service", "store", "queue", "worker", "gateway"];

/// Environment provider mapping `CHATSINK_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `CHATSINK_STORE_SERVICE_KEY`
/// must become `store.service_key`, not `store.service.key`. Only the leading
/// section name is rewritten.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("CHATSINK_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        for &section in SECTIONS {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.into()
    })
}
