// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence doubles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use kindred_core::{AudioSink, AudioUpload, KindredError, MessageStore, Turn};
use tokio::sync::Mutex;

fn storage_failure(what: &str) -> KindredError {
    KindredError::Storage {
        source: Box::new(std::io::Error::other(format!("mock {what} failure"))),
    }
}

/// Message store keeping turns in a map keyed by `(character_id, session_id)`.
#[derive(Default)]
pub struct InMemoryMessageStore {
    turns: Mutex<HashMap<(u64, String), Vec<Turn>>>,
    fail_saves: AtomicBool,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a conversation.
    pub async fn seed(&self, character_id: u64, session_id: &str, turns: Vec<Turn>) {
        self.turns
            .lock()
            .await
            .insert((character_id, session_id.to_string()), turns);
    }

    /// Make every `save` fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub async fn turns(&self, character_id: u64, session_id: &str) -> Vec<Turn> {
        self.turns
            .lock()
            .await
            .get(&(character_id, session_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn total_turns(&self) -> usize {
        self.turns.lock().await.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save(
        &self,
        character_id: u64,
        session_id: &str,
        turn: &Turn,
    ) -> Result<(), KindredError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(storage_failure("save"));
        }
        self.turns
            .lock()
            .await
            .entry((character_id, session_id.to_string()))
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn load_session(
        &self,
        character_id: u64,
        session_id: &str,
    ) -> Result<Vec<Turn>, KindredError> {
        Ok(self.turns(character_id, session_id).await)
    }
}

/// Audio sink recording every upload.
#[derive(Default)]
pub struct MockAudioSink {
    uploads: Mutex<Vec<AudioUpload>>,
    fail: AtomicBool,
}

impl MockAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn uploads(&self) -> Vec<AudioUpload> {
        self.uploads.lock().await.clone()
    }
}

#[async_trait]
impl AudioSink for MockAudioSink {
    async fn store(&self, upload: AudioUpload) -> Result<String, KindredError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(storage_failure("audio store"));
        }
        let mut uploads = self.uploads.lock().await;
        uploads.push(upload);
        Ok(format!("clip-{}", uploads.len()))
    }
}
