// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text exchange: user turn in, character turn (and optional speech) out.

use std::sync::Arc;

use kindred_core::{Character, Role, Turn};
use tracing::{debug, info, warn};

use super::{next_message_id, persist_turn};
use crate::codec::{ChatCommand, Event};
use crate::context::HubContext;
use crate::deadline::{Bounded, within};
use crate::session::Session;

/// Container format of synthesized speech.
pub const SYNTHESIZED_FORMAT: &str = "mp3";

/// Where a chat message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Typed,
    /// Transcribed speech. A sidecar reply from the speech backend, when
    /// present, is used instead of calling the generator.
    Voice { sidecar_response: Option<String> },
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Rejected,
    Replied { turn_id: String },
    Failed,
    TimedOut,
}

pub async fn handle_chat(
    ctx: &HubContext,
    session: &Arc<Session>,
    chat: ChatCommand,
    origin: Origin,
) -> ChatOutcome {
    if chat.sender != Role::User.to_string() {
        session.send(Event::error(format!(
            "messages must be sent by the user, got sender \"{}\"",
            chat.sender
        )));
        return ChatOutcome::Rejected;
    }
    if chat.content.trim().is_empty() {
        session.send(Event::error("message content must not be empty"));
        return ChatOutcome::Rejected;
    }

    let id = chat.id.unwrap_or_else(next_message_id);
    let (user_turn, history) =
        session.record_turn_with_prior(id.clone(), Role::User, chat.content);
    persist_turn(ctx, session, &user_turn).await;
    session.send(Event::Ack { id: id.clone() });

    let character = match ctx
        .services
        .characters
        .get(session.character_id(), session.user_id())
        .await
    {
        Ok(character) => character,
        Err(e) => {
            warn!(
                session_id = %session.session_id(),
                character_id = session.character_id(),
                error = %e,
                "character lookup failed"
            );
            session.send(Event::error(format!(
                "character {} is unavailable: {e}",
                session.character_id()
            )));
            return ChatOutcome::Failed;
        }
    };

    let sidecar = match &origin {
        Origin::Voice { sidecar_response } => sidecar_response
            .as_ref()
            .filter(|reply| !reply.trim().is_empty())
            .cloned(),
        Origin::Typed => None,
    };

    let reply = match sidecar {
        Some(reply) => {
            debug!(session_id = %session.session_id(), message_id = %id, "using sidecar reply");
            reply
        }
        None => match generate(ctx, session, &character, &user_turn, history).await {
            Ok(reply) => reply,
            Err(outcome) => return outcome,
        },
    };

    let character_turn = session.record_turn(next_message_id(), Role::Character, reply);
    persist_turn(ctx, session, &character_turn).await;
    session.send(Event::Chat(character_turn.clone()));
    info!(
        session_id = %session.session_id(),
        character_id = character.id,
        message_id = %id,
        turn_id = %character_turn.id,
        "exchange complete"
    );

    let wants_speech = matches!(origin, Origin::Voice { .. }) || session.call_settings().audio_enabled;
    if ctx.config.tts_enabled && wants_speech {
        spawn_synthesis(ctx, session, &character, &character_turn);
    }

    ChatOutcome::Replied {
        turn_id: character_turn.id,
    }
}

async fn generate(
    ctx: &HubContext,
    session: &Arc<Session>,
    character: &Character,
    user_turn: &Turn,
    history: Vec<Turn>,
) -> Result<String, ChatOutcome> {
    let limit = ctx.config.generation_timeout();
    let generator = ctx.services.generator.clone();
    let character_owned = character.clone();
    let message = user_turn.content.clone();

    session.send(Event::Typing { active: true });
    let result = within(limit, async move {
        generator
            .generate(&character_owned, &message, &history)
            .await
    })
    .await;
    session.send(Event::Typing { active: false });

    match result {
        Bounded::Done(Ok(reply)) if !reply.trim().is_empty() => Ok(reply),
        Bounded::Done(Ok(_)) => {
            session.send(Event::error("response generation returned an empty reply"));
            Err(ChatOutcome::Failed)
        }
        Bounded::Done(Err(e)) => {
            warn!(
                session_id = %session.session_id(),
                message_id = %user_turn.id,
                error = %e,
                "response generation failed"
            );
            session.send(Event::error(format!("response generation failed: {e}")));
            Err(ChatOutcome::Failed)
        }
        Bounded::TimedOut => {
            warn!(
                session_id = %session.session_id(),
                message_id = %user_turn.id,
                timeout_secs = limit.as_secs(),
                "response generation timed out"
            );
            session.send(Event::error(format!(
                "response generation timed out after {}s",
                limit.as_secs()
            )));
            Err(ChatOutcome::TimedOut)
        }
    }
}

/// Synthesize the reply on its own task. Failures only reach the log.
fn spawn_synthesis(ctx: &HubContext, session: &Arc<Session>, character: &Character, turn: &Turn) {
    let tts = ctx.services.tts.clone();
    let limit = ctx.config.synthesis_timeout();
    let session = session.clone();
    let text = turn.content.clone();
    let turn_id = turn.id.clone();
    let voice = character.voice_type.clone();

    tokio::spawn(async move {
        let result = within(limit, async move {
            tts.synthesize(&text, voice.as_deref()).await
        })
        .await;
        match result {
            Bounded::Done(Ok(data)) if !data.is_empty() => {
                session.send(Event::Audio {
                    data,
                    turn_id,
                    format: SYNTHESIZED_FORMAT.to_string(),
                });
            }
            Bounded::Done(Ok(_)) => {
                debug!(session_id = %session.session_id(), turn_id = %turn_id, "synthesis returned no audio");
            }
            Bounded::Done(Err(e)) => {
                warn!(session_id = %session.session_id(), turn_id = %turn_id, error = %e, "speech synthesis failed");
            }
            Bounded::TimedOut => {
                warn!(
                    session_id = %session.session_id(),
                    turn_id = %turn_id,
                    timeout_secs = limit.as_secs(),
                    "speech synthesis timed out"
                );
            }
        }
    });
}
