// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle: open the conversation, run the reader and writer,
//! tear down.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use kindred_core::{KindredError, Role};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::codec::{self, Event};
use crate::context::HubContext;
use crate::dispatcher;
use crate::pipeline::{next_message_id, persist_turn};
use crate::session::{Session, SessionParams};
use crate::transport::{Frame, FrameSink, FrameStream};

/// Why the reader stopped.
#[derive(Debug)]
pub enum Disconnect {
    PeerClosed,
    DeadlineExpired,
    Transport(KindredError),
    /// Torn down from our side (eviction, overflow, shutdown, write error).
    Closed,
}

/// Serve one client connection until it ends.
pub async fn serve_connection<R, W>(ctx: HubContext, params: SessionParams, inbound: R, outbound: W)
where
    R: FrameStream,
    W: FrameSink,
{
    let (session, rx) = Session::new(
        params,
        ctx.config.outbound_buffer,
        ctx.config.max_in_flight,
        ctx.undelivered.clone(),
    );
    info!(
        session_id = %session.session_id(),
        client_id = %session.client_id(),
        character_id = session.character_id(),
        "session connected"
    );

    open_conversation(&ctx, &session).await;

    // The writer must be draining before registration replays the undelivered bucket.
    let writer = tokio::spawn(write_loop(
        session.clone(),
        rx,
        outbound,
        ctx.config.ping_period(),
    ));

    if let Err(e) = ctx.hub.register(session.clone()).await {
        warn!(session_id = %session.session_id(), error = %e, "failed to register session");
        session.close_outbound();
        let _ = writer.await;
        return;
    }

    let reason = read_loop(&ctx, &session, inbound, ctx.config.read_deadline()).await;

    if let Err(e) = ctx.hub.unregister(session.clone()).await {
        debug!(session_id = %session.session_id(), error = %e, "hub gone during teardown");
    }
    session.close_outbound();
    if tokio::time::timeout(ctx.config.read_deadline(), writer)
        .await
        .is_err()
    {
        warn!(session_id = %session.session_id(), "writer did not finish after close");
    }
    info!(
        session_id = %session.session_id(),
        client_id = %session.client_id(),
        reason = ?reason,
        "session disconnected"
    );
}

/// Restore history, or greet when the conversation is new.
async fn open_conversation(ctx: &HubContext, session: &Arc<Session>) {
    let history = match ctx
        .services
        .messages
        .load_session(session.character_id(), session.session_id())
        .await
    {
        Ok(turns) => turns,
        Err(e) => {
            warn!(session_id = %session.session_id(), error = %e, "failed to load history");
            Vec::new()
        }
    };

    if !history.is_empty() {
        debug!(session_id = %session.session_id(), turns = history.len(), "restored history");
        session.load_history(history.clone());
        session.send(Event::ChatHistory(history));
        return;
    }

    let greeting = match ctx
        .services
        .characters
        .get(session.character_id(), session.user_id())
        .await
    {
        Ok(character) => character.greeting.filter(|g| !g.trim().is_empty()),
        Err(e) => {
            warn!(
                session_id = %session.session_id(),
                character_id = session.character_id(),
                error = %e,
                "character lookup failed on connect"
            );
            None
        }
    };
    if let Some(greeting) = greeting {
        let turn = session.record_turn(next_message_id(), Role::Character, greeting);
        persist_turn(ctx, session, &turn).await;
        session.send(Event::Chat(turn));
    }
}

async fn read_loop<R: FrameStream>(
    ctx: &HubContext,
    session: &Arc<Session>,
    mut inbound: R,
    read_deadline: Duration,
) -> Disconnect {
    let shutdown = session.shutdown_token();
    let mut deadline = Instant::now() + read_deadline;
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return Disconnect::Closed,
            next = tokio::time::timeout_at(deadline, inbound.next()) => next,
        };
        let frame = match next {
            Err(_) => return Disconnect::DeadlineExpired,
            Ok(None) => return Disconnect::PeerClosed,
            Ok(Some(Err(e))) => return Disconnect::Transport(e),
            Ok(Some(Ok(frame))) => frame,
        };
        match frame {
            Frame::Text(text) => match codec::decode_command(&text) {
                Ok(command) => dispatcher::spawn_command(ctx, session, command),
                Err(e) => {
                    debug!(session_id = %session.session_id(), error = %e, "undecodable frame");
                    session.send(Event::error(e.to_string()));
                }
            },
            Frame::Pong(_) => deadline = Instant::now() + read_deadline,
            Frame::Ping(_) => {}
            Frame::Binary(_) => {
                session.send(Event::error("binary frames are not supported"));
            }
            Frame::Close => return Disconnect::PeerClosed,
        }
    }
}

async fn write_loop<W: FrameSink>(
    session: Arc<Session>,
    mut rx: mpsc::Receiver<Event>,
    mut sink: W,
    ping_period: Duration,
) {
    let mut ping = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    let _ = sink.send(Frame::Close).await;
                    return;
                };
                let text = match codec::encode_event(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(session_id = %session.session_id(), error = %e, "dropping unencodable event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Frame::Text(text)).await {
                    warn!(session_id = %session.session_id(), error = %e, "write failed");
                    session.stash(event);
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = sink.send(Frame::Ping(Vec::new())).await {
                    warn!(session_id = %session.session_id(), error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    // Write failure: close, then keep whatever was still queued.
    session.close_outbound();
    rx.close();
    while let Ok(event) = rx.try_recv() {
        session.stash(event);
    }
}
