// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable storage capabilities: conversation turns and audio clips.

use async_trait::async_trait;

use crate::error::KindredError;
use crate::types::{AudioUpload, Turn};

/// Persists conversation turns keyed by `(character_id, session_id)`.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    async fn save(
        &self,
        character_id: u64,
        session_id: &str,
        turn: &Turn,
    ) -> Result<(), KindredError>;

    /// Load every stored turn of a conversation, oldest first.
    async fn load_session(
        &self,
        character_id: u64,
        session_id: &str,
    ) -> Result<Vec<Turn>, KindredError>;
}

/// Durable storage for raw uploaded audio.
#[async_trait]
pub trait AudioSink: Send + Sync + 'static {
    /// Store a clip and return its identifier.
    async fn store(&self, upload: AudioUpload) -> Result<String, KindredError>;
}
