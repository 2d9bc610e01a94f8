// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation types shared by the hub, storage, and vendor clients.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Who authored a turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Character,
}

/// One message in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content)
    }

    pub fn character(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, Role::Character, content)
    }
}

/// Character metadata used to steer generation and synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: u64,
    pub name: String,
    /// System prompt describing the character's personality.
    pub persona: String,
    /// Opening line sent when a conversation has no history.
    #[serde(default)]
    pub greeting: Option<String>,
    /// Voice identifier passed to the speech synthesizer.
    #[serde(default)]
    pub voice_type: Option<String>,
}

/// Result of a speech-to-text call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    /// Reply produced by a combined ASR+LLM backend. When present it
    /// replaces the response generator for this exchange.
    pub sidecar_response: Option<String>,
}

impl Transcription {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sidecar_response: None,
        }
    }
}

/// An audio clip handed to an [`AudioSink`](crate::AudioSink) for durable storage.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub user_id: Option<String>,
    pub session_id: String,
    pub character_id: u64,
    pub data: Vec<u8>,
    pub format: String,
    pub ttl: Duration,
    pub metadata: serde_json::Value,
}
