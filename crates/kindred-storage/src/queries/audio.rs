// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw audio clip persistence with retention.

use chrono::Utc;
use kindred_core::{AudioUpload, KindredError};
use rusqlite::params;

use super::format_timestamp;
use crate::database::{Database, map_tr_err};

/// Store an uploaded clip and return its generated id.
pub async fn insert_clip(db: &Database, upload: AudioUpload) -> Result<String, KindredError> {
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let ttl = chrono::Duration::from_std(upload.ttl)
        .map_err(|e| KindredError::Internal(format!("audio retention out of range: {e}")))?;
    let expires_at = created_at + ttl;
    let metadata = if upload.metadata.is_null() {
        None
    } else {
        Some(upload.metadata.to_string())
    };

    let clip_id = id.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO audio_clips
                 (id, user_id, session_id, character_id, format, data, metadata, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    clip_id,
                    upload.user_id,
                    upload.session_id,
                    upload.character_id as i64,
                    upload.format,
                    upload.data,
                    metadata,
                    format_timestamp(&created_at),
                    format_timestamp(&expires_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
    Ok(id)
}

/// Fetch the stored bytes and format of a clip.
pub async fn get_clip(
    db: &Database,
    id: &str,
) -> Result<Option<(Vec<u8>, String)>, KindredError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<(Vec<u8>, String)>, rusqlite::Error> {
            let mut stmt = conn.prepare("SELECT data, format FROM audio_clips WHERE id = ?1")?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}
