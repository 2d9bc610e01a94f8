// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Voice exchange: decode, store, transcribe, then continue as a chat.

use std::sync::Arc;

use kindred_core::AudioUpload;
use tracing::{debug, warn};

use super::chat::{self, ChatOutcome, Origin};
use super::next_message_id;
use crate::codec::{AudioCommand, ChatCommand, Event, SpeechStatus};
use crate::context::HubContext;
use crate::deadline::{Bounded, within};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    Rejected,
    NoSpeech,
    Failed,
    TimedOut,
    Transcribed(ChatOutcome),
}

pub async fn handle_audio(
    ctx: &HubContext,
    session: &Arc<Session>,
    audio: AudioCommand,
) -> AudioOutcome {
    let bytes = match audio.payload.decode() {
        Ok(bytes) => bytes,
        Err(e) => {
            session.send(Event::error(e.to_string()));
            return AudioOutcome::Rejected;
        }
    };
    if bytes.is_empty() {
        session.send(Event::speech_status(SpeechStatus::NoSpeechDetected));
        return AudioOutcome::NoSpeech;
    }

    session.send(Event::speech_status(SpeechStatus::Processing));

    let format = audio
        .format
        .unwrap_or_else(|| ctx.config.audio_format.clone());
    spawn_store(ctx, session, bytes.clone(), format);

    let limit = ctx.config.transcription_timeout();
    let stt = ctx.services.stt.clone();
    let session_id = session.session_id().to_string();
    let result = within(limit, async move { stt.transcribe(&session_id, &bytes).await }).await;

    let transcription = match result {
        Bounded::Done(Ok(transcription)) => transcription,
        Bounded::Done(Err(e)) => {
            warn!(session_id = %session.session_id(), error = %e, "transcription failed");
            session.send(Event::error(format!("transcription failed: {e}")));
            return AudioOutcome::Failed;
        }
        Bounded::TimedOut => {
            warn!(
                session_id = %session.session_id(),
                timeout_secs = limit.as_secs(),
                "transcription timed out"
            );
            session.send(Event::error(format!(
                "transcription timed out after {}s",
                limit.as_secs()
            )));
            return AudioOutcome::TimedOut;
        }
    };

    let text = transcription.text.trim().to_string();
    if text.is_empty() {
        session.send(Event::speech_status(SpeechStatus::NoSpeechDetected));
        return AudioOutcome::NoSpeech;
    }

    let id = next_message_id();
    session.send(Event::SpeechText {
        text: text.clone(),
        id: Some(id.clone()),
        status: Some(SpeechStatus::Transcribed),
    });

    let chat = ChatCommand {
        id: Some(id),
        ..ChatCommand::from_user(text)
    };
    let origin = Origin::Voice {
        sidecar_response: transcription.sidecar_response,
    };
    AudioOutcome::Transcribed(chat::handle_chat(ctx, session, chat, origin).await)
}

/// Hand the raw clip to the audio sink without waiting for it.
fn spawn_store(ctx: &HubContext, session: &Arc<Session>, data: Vec<u8>, format: String) {
    let sink = ctx.services.audio.clone();
    let upload = AudioUpload {
        user_id: session.user_id().map(str::to_string),
        session_id: session.session_id().to_string(),
        character_id: session.character_id(),
        data,
        format,
        ttl: ctx.config.audio_retention(),
        metadata: serde_json::json!({
            "clientId": session.client_id(),
            "source": "voice_message",
        }),
    };
    let session_id = upload.session_id.clone();
    tokio::spawn(async move {
        match sink.store(upload).await {
            Ok(id) => debug!(session_id = %session_id, clip_id = %id, "audio clip stored"),
            Err(e) => warn!(session_id = %session_id, error = %e, "failed to store audio clip"),
        }
    });
}
