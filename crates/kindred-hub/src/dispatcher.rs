// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes decoded commands to their handlers.
//!
//! Each command runs on its own task, bounded by the session's in-flight
//! limit. A panic inside a handler is caught here and reported to the client.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::codec::{CallPhase, Command, Event};
use crate::context::HubContext;
use crate::pipeline::audio::handle_audio;
use crate::pipeline::chat::{Origin, handle_chat};
use crate::session::Session;

/// Run `command` for `session` without blocking the caller.
///
/// `Ping` is answered inline. Commands over the in-flight limit are
/// rejected with an error event.
pub fn spawn_command(ctx: &HubContext, session: &Arc<Session>, command: Command) {
    if matches!(command, Command::Ping) {
        session.send(Event::Pong);
        return;
    }

    let Some(permit) = session.try_begin_command() else {
        warn!(
            session_id = %session.session_id(),
            command = command.tag(),
            "too many commands in flight, rejecting"
        );
        session.send(Event::error(format!(
            "too many requests in flight, {} rejected",
            command.tag()
        )));
        return;
    };

    let ctx = ctx.clone();
    let session = session.clone();
    tokio::spawn(async move {
        let _permit = permit;
        let tag = command.tag().to_string();
        let handled = AssertUnwindSafe(dispatch(&ctx, &session, command))
            .catch_unwind()
            .await;
        if let Err(panic) = handled {
            let message = panic_message(panic.as_ref());
            error!(
                session_id = %session.session_id(),
                command = %tag,
                panic = %message,
                "command handler panicked"
            );
            session.send(Event::error(format!("internal error while handling {tag}")));
        }
    });
}

/// Handle one command to completion on the current task.
pub async fn dispatch(ctx: &HubContext, session: &Arc<Session>, command: Command) {
    debug!(session_id = %session.session_id(), command = command.tag(), "dispatching");
    match command {
        Command::Chat(chat) => {
            handle_chat(ctx, session, chat, Origin::Typed).await;
        }
        Command::Audio(audio) => {
            handle_audio(ctx, session, audio).await;
        }
        Command::Ping => {
            session.send(Event::Pong);
        }
        Command::StartStream(start) => {
            if let Some(requested) = start.character_id
                && requested != session.character_id()
            {
                debug!(
                    session_id = %session.session_id(),
                    requested,
                    character_id = session.character_id(),
                    "stream requested for another character, keeping session character"
                );
            }
            session.update_call(|call| {
                call.active = true;
                call.video_enabled = start.video_enabled;
                call.audio_enabled = start.audio_enabled;
            });
            session.send(Event::CallState {
                state: CallPhase::Started,
                character_id: session.character_id(),
            });
        }
        Command::StreamConfig(update) => {
            session.update_call(|call| {
                if let Some(video) = update.video_enabled {
                    call.video_enabled = video;
                }
                if let Some(audio) = update.audio_enabled {
                    call.audio_enabled = audio;
                }
            });
            session.send(Event::CallState {
                state: CallPhase::Updated,
                character_id: session.character_id(),
            });
        }
        Command::Unknown { tag } => {
            session.send(Event::error(format!("unknown command type: {tag}")));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_common_payloads() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(s.as_ref()), "unknown panic");
    }
}
