// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::KindredConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing on the first one.
pub fn validate_config(config: &KindredConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        invalid("server.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        invalid(format!(
            "server.host `{host}` is not a valid IP address or hostname"
        ));
    }

    let hub = &config.hub;
    for (key, value) in [
        ("hub.outbound_buffer", hub.outbound_buffer as u64),
        ("hub.max_in_flight", hub.max_in_flight as u64),
        ("hub.read_deadline_secs", hub.read_deadline_secs),
        ("hub.generation_timeout_secs", hub.generation_timeout_secs),
        ("hub.transcription_timeout_secs", hub.transcription_timeout_secs),
        ("hub.synthesis_timeout_secs", hub.synthesis_timeout_secs),
        ("hub.undelivered_per_key", hub.undelivered_per_key as u64),
    ] {
        if value == 0 {
            invalid(format!("{key} must be greater than zero"));
        }
    }

    if hub.read_deadline_secs > 0 && hub.ping_period() >= hub.read_deadline() {
        invalid(format!(
            "keepalive ping period {:?} must be shorter than hub.read_deadline_secs",
            hub.ping_period()
        ));
    }

    // The history event plus a full replay must fit before the writer drains.
    if hub.undelivered_per_key >= hub.outbound_buffer {
        invalid(format!(
            "hub.undelivered_per_key ({}) must be smaller than hub.outbound_buffer ({})",
            hub.undelivered_per_key, hub.outbound_buffer
        ));
    }

    if hub.audio_format.trim().is_empty() {
        invalid("hub.audio_format must not be empty".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    let mut seen = HashSet::new();
    for (i, character) in config.characters.iter().enumerate() {
        if !seen.insert(character.id) {
            invalid(format!(
                "duplicate character id `{}` in [[characters]]",
                character.id
            ));
        }
        if character.name.trim().is_empty() {
            invalid(format!("characters[{i}].name must not be empty"));
        }
    }

    if !config.characters.is_empty() && !seen.contains(&hub.default_character_id) {
        invalid(format!(
            "hub.default_character_id `{}` does not match any [[characters]] entry",
            hub.default_character_id
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CharacterConfig;

    fn character(id: u64, name: &str) -> CharacterConfig {
        CharacterConfig {
            id,
            name: name.to_string(),
            persona: "test".to_string(),
            greeting: None,
            voice_type: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&KindredConfig::default()).is_ok());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let mut config = KindredConfig::default();
        config.hub.generation_timeout_secs = 0;
        config.hub.read_deadline_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        let text = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
        assert!(text.contains("hub.generation_timeout_secs"));
        assert!(text.contains("hub.read_deadline_secs"));
    }

    #[test]
    fn replay_must_fit_in_outbound_buffer() {
        let mut config = KindredConfig::default();
        config.hub.outbound_buffer = 4;
        config.hub.undelivered_per_key = 4;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("hub.undelivered_per_key (4)"));

        config.hub.undelivered_per_key = 3;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn duplicate_character_ids_are_rejected() {
        let mut config = KindredConfig::default();
        config.characters = vec![character(1, "Ada"), character(1, "Bea")];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("duplicate character id"));
    }

    #[test]
    fn default_character_must_exist_when_characters_configured() {
        let mut config = KindredConfig::default();
        config.characters = vec![character(2, "Ada")];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("default_character_id"));
    }

    #[test]
    fn invalid_host_is_rejected() {
        let mut config = KindredConfig::default();
        config.server.host = "not a host!".to_string();
        assert!(validate_config(&config).is_err());
    }
}
