// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/kindred/kindred.toml` < `~/.config/kindred/kindred.toml`
//! < `./kindred.toml`, then `KINDRED_*` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KindredConfig;
use crate::CONFIG_FILE;

/// Configuration sections that environment variables may target.
const ENV_SECTIONS: &[&str] = &["server", "hub", "storage", "openai"];

/// Candidate config files, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/kindred").join(CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("kindred").join(CONFIG_FILE));
    }
    paths.push(PathBuf::from(CONFIG_FILE));
    paths
}

/// Build the layered Figment without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(KindredConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<KindredConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<KindredConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KindredConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KindredConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KindredConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment provider mapping `KINDRED_<SECTION>_<KEY>` to `section.key`.
///
/// Only the first underscore after a known section name is turned into a
/// dot, so `KINDRED_HUB_READ_DEADLINE_SECS` becomes `hub.read_deadline_secs`.
fn env_provider() -> Env {
    Env::prefixed("KINDRED_").map(|key| {
        let key_str = key.as_str();
        for section in ENV_SECTIONS {
            if let Some(rest) = key_str.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.to_string().into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("KINDRED_HUB_READ_DEADLINE_SECS", "90");
            jail.set_env("KINDRED_OPENAI_API_KEY", "sk-test");
            jail.set_env("KINDRED_SERVER_PORT", "9000");

            let config: KindredConfig = Figment::new()
                .merge(Serialized::defaults(KindredConfig::default()))
                .merge(env_provider())
                .extract()?;

            assert_eq!(config.hub.read_deadline_secs, 90);
            assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
            assert_eq!(config.server.port, 9000);
            Ok(())
        });
    }

    #[test]
    fn local_file_is_last_path() {
        let paths = config_paths();
        assert_eq!(paths.last().unwrap(), &PathBuf::from(CONFIG_FILE));
        assert_eq!(paths[0], PathBuf::from("/etc/kindred/kindred.toml"));
    }
}
