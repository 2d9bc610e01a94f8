// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Kindred chat relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::time::Duration;

use kindred_core::Character;
use serde::{Deserialize, Serialize};

/// Top-level Kindred configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KindredConfig {
    /// HTTP listener and logging.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session hub limits and deadlines.
    #[serde(default)]
    pub hub: HubConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// OpenAI-compatible vendor endpoint.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Characters served by this instance.
    #[serde(default)]
    pub characters: Vec<CharacterConfig>,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Session hub configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    /// Capacity of each session's outbound event queue. Must exceed
    /// `undelivered_per_key` so a reconnect can take a full replay.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Maximum concurrently running commands per session.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Seconds a session may go without a pong before it is torn down.
    #[serde(default = "default_read_deadline_secs")]
    pub read_deadline_secs: u64,

    #[serde(default = "default_call_timeout_secs")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_call_timeout_secs")]
    pub transcription_timeout_secs: u64,

    #[serde(default = "default_call_timeout_secs")]
    pub synthesis_timeout_secs: u64,

    /// Maximum events held per undelivered bucket; the oldest are dropped first.
    #[serde(default = "default_undelivered_per_key")]
    pub undelivered_per_key: usize,

    /// Character used when the upgrade request carries no usable id.
    #[serde(default = "default_character_id")]
    pub default_character_id: u64,

    /// Synthesize speech for character replies.
    #[serde(default = "default_tts_enabled")]
    pub tts_enabled: bool,

    /// Retention window handed to the audio sink.
    #[serde(default = "default_audio_retention_secs")]
    pub audio_retention_secs: u64,

    /// Container format assumed for uploaded audio.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,
}

impl HubConfig {
    pub fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_secs)
    }

    /// Keepalive ping interval: 90% of the read deadline.
    pub fn ping_period(&self) -> Duration {
        self.read_deadline() * 9 / 10
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn audio_retention(&self) -> Duration {
        Duration::from_secs(self.audio_retention_secs)
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
            max_in_flight: default_max_in_flight(),
            read_deadline_secs: default_read_deadline_secs(),
            generation_timeout_secs: default_call_timeout_secs(),
            transcription_timeout_secs: default_call_timeout_secs(),
            synthesis_timeout_secs: default_call_timeout_secs(),
            undelivered_per_key: default_undelivered_per_key(),
            default_character_id: default_character_id(),
            tts_enabled: default_tts_enabled(),
            audio_retention_secs: default_audio_retention_secs(),
            audio_format: default_audio_format(),
        }
    }
}

fn default_outbound_buffer() -> usize {
    512
}

fn default_max_in_flight() -> usize {
    8
}

fn default_read_deadline_secs() -> u64 {
    60
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_undelivered_per_key() -> usize {
    256
}

fn default_character_id() -> u64 {
    1
}

fn default_tts_enabled() -> bool {
    true
}

fn default_audio_retention_secs() -> u64 {
    24 * 60 * 60
}

fn default_audio_format() -> String {
    "webm".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("kindred").join("kindred.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("kindred.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// OpenAI-compatible API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key, usually supplied as `KINDRED_OPENAI_API_KEY`. `None` sends
    /// no `Authorization` header.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    /// Voice used when a character has no `voice_type`.
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Maximum tokens to generate per reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            transcription_model: default_transcription_model(),
            speech_model: default_speech_model(),
            default_voice: default_voice(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_max_tokens() -> u32 {
    512
}

/// A character entry in `[[characters]]`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CharacterConfig {
    pub id: u64,
    pub name: String,
    pub persona: String,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub voice_type: Option<String>,
}

impl From<&CharacterConfig> for Character {
    fn from(config: &CharacterConfig) -> Self {
        Character {
            id: config.id,
            name: config.name.clone(),
            persona: config.persona.clone(),
            greeting: config.greeting.clone(),
            voice_type: config.voice_type.clone(),
        }
    }
}
