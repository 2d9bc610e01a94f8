// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat and audio exchange pipelines.

pub mod audio;
pub mod chat;

use std::sync::atomic::{AtomicU64, Ordering};

use kindred_core::Turn;
use tracing::warn;

use crate::context::HubContext;
use crate::session::Session;

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Time-based id, unique within the process.
pub fn next_message_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("msg-{millis}-{seq}")
}

/// Save a turn. Failures are logged and the exchange continues.
pub(crate) async fn persist_turn(ctx: &HubContext, session: &Session, turn: &Turn) -> bool {
    match ctx
        .services
        .messages
        .save(session.character_id(), session.session_id(), turn)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(
                session_id = %session.session_id(),
                character_id = session.character_id(),
                turn_id = %turn.id,
                error = %e,
                "failed to persist turn"
            );
            false
        }
    }
}
