// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed implementation of the hub's persistence capabilities.

use async_trait::async_trait;
use kindred_config::model::StorageConfig;
use kindred_core::{AudioSink, AudioUpload, KindredError, MessageStore, Turn};

use crate::database::Database;
use crate::queries;

/// Message store and audio sink sharing one SQLite database.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database configured in `[storage]`.
    pub async fn open(config: &StorageConfig) -> Result<Self, KindredError> {
        let db = Database::open_with(&config.database_path, config.wal_mode).await?;
        Ok(Self { db })
    }

    pub async fn close(self) -> Result<(), KindredError> {
        self.db.close().await
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn save(
        &self,
        character_id: u64,
        session_id: &str,
        turn: &Turn,
    ) -> Result<(), KindredError> {
        queries::turns::insert_turn(&self.db, character_id, session_id, turn).await
    }

    async fn load_session(
        &self,
        character_id: u64,
        session_id: &str,
    ) -> Result<Vec<Turn>, KindredError> {
        queries::turns::get_turns(&self.db, character_id, session_id).await
    }
}

#[async_trait]
impl AudioSink for SqliteStore {
    async fn store(&self, upload: AudioUpload) -> Result<String, KindredError> {
        let bytes = upload.data.len();
        let id = queries::audio::insert_clip(&self.db, upload).await?;
        tracing::debug!(clip_id = %id, bytes, "stored audio clip");
        Ok(id)
    }
}
