// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation turn persistence.

use std::str::FromStr;

use kindred_core::{KindredError, Role, Turn};
use rusqlite::params;

use super::{format_timestamp, parse_timestamp};
use crate::database::{Database, map_tr_err};

/// Append a turn to the conversation `(character_id, session_id)`.
pub async fn insert_turn(
    db: &Database,
    character_id: u64,
    session_id: &str,
    turn: &Turn,
) -> Result<(), KindredError> {
    let turn = turn.clone();
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO turns (id, character_id, session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    turn.id,
                    character_id as i64,
                    session_id,
                    turn.role.to_string(),
                    turn.content,
                    format_timestamp(&turn.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All turns of a conversation, oldest first. Ties keep insertion order.
pub async fn get_turns(
    db: &Database,
    character_id: u64,
    session_id: &str,
) -> Result<Vec<Turn>, KindredError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Turn>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, role, content, created_at FROM turns
                 WHERE character_id = ?1 AND session_id = ?2
                 ORDER BY created_at ASC, seq ASC",
            )?;
            let rows = stmt.query_map(params![character_id as i64, session_id], |row| {
                let role: String = row.get(1)?;
                let role = Role::from_str(&role).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let created_at: String = row.get(3)?;
                Ok(Turn {
                    id: row.get(0)?,
                    role,
                    content: row.get(2)?,
                    timestamp: parse_timestamp(3, &created_at)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    async fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn turns_round_trip_in_order() {
        let (_dir, db) = open_db().await;
        let base = Utc::now();
        let mut first = Turn::user("m1", "hi");
        first.timestamp = base;
        let mut second = Turn::character("m2", "hello there");
        second.timestamp = base + Duration::milliseconds(5);

        // Insert out of order; reads come back sorted by timestamp.
        insert_turn(&db, 1, "s1", &second).await.unwrap();
        insert_turn(&db, 1, "s1", &first).await.unwrap();

        let turns = get_turns(&db, 1, "s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].id, "m1");
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].id, "m2");
        assert_eq!(turns[1].role, Role::Character);
        assert_eq!(turns[1].content, "hello there");
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let (_dir, db) = open_db().await;
        insert_turn(&db, 1, "s1", &Turn::user("a", "one")).await.unwrap();
        insert_turn(&db, 2, "s1", &Turn::user("b", "two")).await.unwrap();
        insert_turn(&db, 1, "s2", &Turn::user("c", "three")).await.unwrap();

        assert_eq!(get_turns(&db, 1, "s1").await.unwrap().len(), 1);
        assert_eq!(get_turns(&db, 2, "s1").await.unwrap()[0].id, "b");
        assert!(get_turns(&db, 3, "s1").await.unwrap().is_empty());
    }
}
