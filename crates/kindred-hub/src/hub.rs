// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of live sessions.
//!
//! The [`Hub`] owns the live map and runs as a single task. Callers talk to it
//! through a cloneable [`HubHandle`]; every operation is a message on one mpsc
//! channel with a oneshot reply, so register, unregister and broadcast are
//! applied in the order they were sent.

use std::collections::HashMap;
use std::sync::Arc;

use kindred_core::KindredError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::Event;
use crate::session::Session;
use crate::undelivered::UndeliveredBuffer;

pub(crate) enum HubOp {
    Register {
        session: Arc<Session>,
        reply: oneshot::Sender<usize>,
    },
    Unregister {
        session: Arc<Session>,
        reply: oneshot::Sender<bool>,
    },
    Broadcast {
        event: Event,
        reply: oneshot::Sender<usize>,
    },
    ActiveSessions {
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Events landed in `key` after its live session registered.
    Flush { client_id: String, key: String },
}

/// The hub task. Construct with [`Hub::new`] and drive with [`Hub::run`].
pub struct Hub {
    ops: mpsc::Receiver<HubOp>,
    /// Keyed by client id: at most one live session per client.
    live: HashMap<String, Arc<Session>>,
    undelivered: Arc<UndeliveredBuffer>,
    /// Handed to registered sessions. Weak, so live sessions do not keep
    /// the hub's channel open.
    flush: FlushNotifier,
}

/// Cloneable handle for sending operations to the hub task.
#[derive(Clone)]
pub struct HubHandle {
    ops: mpsc::Sender<HubOp>,
}

/// Lets a closed session ask the hub to forward what it just buffered.
#[derive(Clone)]
pub(crate) struct FlushNotifier {
    ops: mpsc::WeakSender<HubOp>,
}

impl FlushNotifier {
    /// Best effort: if the hub is gone or its queue is full the events stay
    /// buffered for the next connect.
    pub(crate) fn request(&self, client_id: &str, key: &str) {
        let Some(ops) = self.ops.upgrade() else {
            return;
        };
        let op = HubOp::Flush {
            client_id: client_id.to_string(),
            key: key.to_string(),
        };
        if ops.try_send(op).is_err() {
            debug!(client_id = %client_id, "hub busy, leaving events buffered");
        }
    }
}

impl Hub {
    pub fn new(undelivered: Arc<UndeliveredBuffer>) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(256);
        let hub = Self {
            ops: rx,
            live: HashMap::new(),
            undelivered,
            flush: FlushNotifier {
                ops: tx.downgrade(),
            },
        };
        (hub, HubHandle { ops: tx })
    }

    /// Spawn the hub on the current runtime.
    pub fn spawn(
        undelivered: Arc<UndeliveredBuffer>,
        cancel: CancellationToken,
    ) -> (HubHandle, tokio::task::JoinHandle<()>) {
        let (hub, handle) = Self::new(undelivered);
        let task = tokio::spawn(hub.run(cancel));
        (handle, task)
    }

    /// Process operations until cancelled or every handle is dropped,
    /// then close all live sessions.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("session hub started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                op = self.ops.recv() => match op {
                    Some(op) => self.apply(op),
                    None => break,
                },
            }
        }
        let count = self.live.len();
        for (_, session) in self.live.drain() {
            session.close_outbound();
        }
        info!(closed = count, "session hub stopped");
    }

    fn apply(&mut self, op: HubOp) {
        match op {
            HubOp::Register { session, reply } => {
                let replayed = self.register(session);
                let _ = reply.send(replayed);
            }
            HubOp::Unregister { session, reply } => {
                let _ = reply.send(self.unregister(&session));
            }
            HubOp::Broadcast { event, reply } => {
                let _ = reply.send(self.broadcast(event));
            }
            HubOp::ActiveSessions { reply } => {
                let ids = self
                    .live
                    .values()
                    .map(|s| s.session_id().to_string())
                    .collect();
                let _ = reply.send(ids);
            }
            HubOp::Flush { client_id, key } => {
                self.flush(&client_id, &key);
            }
        }
    }

    fn register(&mut self, session: Arc<Session>) -> usize {
        let client_id = session.client_id().to_string();
        if let Some(previous) = self.live.insert(client_id.clone(), session.clone())
            && previous.serial() != session.serial()
        {
            info!(
                client_id = %client_id,
                evicted_session = %previous.session_id(),
                session_id = %session.session_id(),
                "evicting previous session for client"
            );
            previous.close_outbound();
        }
        session.attach_flush(self.flush.clone());

        let pending = self.undelivered.drain(session.key());
        let replayed = pending.len();
        for event in pending {
            session.send(event);
        }
        debug!(
            client_id = %client_id,
            session_id = %session.session_id(),
            replayed,
            live = self.live.len(),
            "session registered"
        );
        replayed
    }

    /// Forward buffered events to the live session that owns `key`. A
    /// closed session is skipped so its own stashes cannot loop back to it.
    fn flush(&mut self, client_id: &str, key: &str) -> usize {
        let Some(session) = self.live.get(client_id) else {
            return 0;
        };
        if session.key() != key || session.is_closed() {
            return 0;
        }
        let pending = self.undelivered.drain(key);
        let forwarded = pending.len();
        for event in pending {
            session.send(event);
        }
        if forwarded > 0 {
            debug!(
                client_id = %client_id,
                session_id = %session.session_id(),
                forwarded,
                "forwarded late undelivered events"
            );
        }
        forwarded
    }

    fn unregister(&mut self, session: &Arc<Session>) -> bool {
        let removed = match self.live.get(session.client_id()) {
            Some(current) if current.serial() == session.serial() => {
                self.live.remove(session.client_id());
                true
            }
            _ => false,
        };
        session.close_outbound();
        if removed {
            debug!(
                client_id = %session.client_id(),
                session_id = %session.session_id(),
                live = self.live.len(),
                "session unregistered"
            );
        }
        removed
    }

    fn broadcast(&mut self, event: Event) -> usize {
        let mut delivered = 0;
        let mut evicted = Vec::new();
        for (client_id, session) in &self.live {
            // A failed send has already buffered the event under the session's key.
            if session.send(event.clone()).is_queued() {
                delivered += 1;
            } else {
                evicted.push(client_id.clone());
            }
        }
        for client_id in evicted {
            if let Some(session) = self.live.remove(&client_id) {
                warn!(
                    client_id = %client_id,
                    session_id = %session.session_id(),
                    "evicting unresponsive session during broadcast"
                );
                session.close_outbound();
            }
        }
        delivered
    }
}

fn hub_gone<T>(_: T) -> KindredError {
    KindredError::Internal("session hub is not running".into())
}

impl HubHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HubOp,
    ) -> Result<T, KindredError> {
        let (tx, rx) = oneshot::channel();
        self.ops.send(build(tx)).await.map_err(hub_gone)?;
        rx.await.map_err(hub_gone)
    }

    /// Register a session, evicting any other session for the same client.
    /// Returns how many undelivered events were replayed into it.
    pub async fn register(&self, session: Arc<Session>) -> Result<usize, KindredError> {
        self.request(|reply| HubOp::Register { session, reply }).await
    }

    /// Remove a session and close its outbound buffer. Idempotent.
    pub async fn unregister(&self, session: Arc<Session>) -> Result<bool, KindredError> {
        self.request(|reply| HubOp::Unregister { session, reply })
            .await
    }

    /// Send `event` to every live session without blocking. Returns the
    /// number of sessions it was queued for.
    pub async fn broadcast(&self, event: Event) -> Result<usize, KindredError> {
        self.request(|reply| HubOp::Broadcast { event, reply }).await
    }

    pub async fn active_sessions(&self) -> Result<Vec<String>, KindredError> {
        self.request(|reply| HubOp::ActiveSessions { reply }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Delivery, SessionParams};

    fn session(
        buf: &Arc<UndeliveredBuffer>,
        session_id: &str,
        client_id: &str,
        capacity: usize,
    ) -> (Arc<Session>, mpsc::Receiver<Event>) {
        Session::new(
            SessionParams {
                session_id: session_id.into(),
                client_id: client_id.into(),
                character_id: 1,
                user_id: None,
            },
            capacity,
            4,
            buf.clone(),
        )
    }

    fn start() -> (HubHandle, Arc<UndeliveredBuffer>, CancellationToken) {
        let buf = Arc::new(UndeliveredBuffer::new(32));
        let cancel = CancellationToken::new();
        let (handle, _task) = Hub::spawn(buf.clone(), cancel.clone());
        (handle, buf, cancel)
    }

    #[tokio::test]
    async fn register_evicts_same_client() {
        let (hub, buf, _cancel) = start();
        let (first, _rx1) = session(&buf, "s1", "c1", 8);
        let (second, _rx2) = session(&buf, "s2", "c1", 8);

        hub.register(first.clone()).await.unwrap();
        hub.register(second.clone()).await.unwrap();

        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(hub.active_sessions().await.unwrap(), vec!["s2".to_string()]);

        // Unregistering the evicted session leaves the new one in place.
        assert!(!hub.unregister(first).await.unwrap());
        assert_eq!(hub.active_sessions().await.unwrap().len(), 1);
        assert!(hub.unregister(second.clone()).await.unwrap());
        assert!(!hub.unregister(second).await.unwrap());
        assert!(hub.active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undelivered_events_replay_exactly_once() {
        let (hub, buf, _cancel) = start();
        let (old, _old_rx) = session(&buf, "s1", "c1", 8);
        old.close_outbound();
        old.send(Event::Ack { id: "m1".into() });
        old.send(Event::Typing { active: false });

        let (fresh, mut rx) = session(&buf, "s1", "c1", 8);
        assert_eq!(hub.register(fresh.clone()).await.unwrap(), 2);
        assert_eq!(rx.recv().await.unwrap(), Event::Ack { id: "m1".into() });
        assert_eq!(rx.recv().await.unwrap(), Event::Typing { active: false });

        let (again, mut rx2) = session(&buf, "s1", "c1", 8);
        assert_eq!(hub.register(again).await.unwrap(), 0);
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_event_from_evicted_session_reaches_live_successor() {
        let (hub, buf, _cancel) = start();
        let (old, _old_rx) = session(&buf, "s1", "c1", 8);
        let (fresh, mut rx) = session(&buf, "s1", "c1", 8);
        hub.register(old.clone()).await.unwrap();
        hub.register(fresh.clone()).await.unwrap();
        assert!(old.is_closed());

        // An in-flight reply finishing on the evicted session.
        assert_eq!(old.send(Event::Ack { id: "m1".into() }), Delivery::Closed);

        // Ops are applied in order, so the flush has run once this returns.
        hub.active_sessions().await.unwrap();
        assert_eq!(rx.try_recv().unwrap(), Event::Ack { id: "m1".into() });
        assert_eq!(buf.pending(fresh.key()), 0);
    }

    #[tokio::test]
    async fn late_event_for_other_conversation_stays_buffered() {
        let (hub, buf, _cancel) = start();
        let (old, _old_rx) = session(&buf, "s1", "c1", 8);
        let (fresh, mut rx) = session(&buf, "s2", "c1", 8);
        hub.register(old.clone()).await.unwrap();
        hub.register(fresh).await.unwrap();

        old.send(Event::Typing { active: false });
        hub.active_sessions().await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(buf.pending(old.key()), 1);
    }

    #[tokio::test]
    async fn closed_session_does_not_flush_into_itself() {
        let (hub, buf, _cancel) = start();
        let (only, _rx) = session(&buf, "s1", "c1", 8);
        hub.register(only.clone()).await.unwrap();
        only.close_outbound();

        only.send(Event::Pong);
        hub.active_sessions().await.unwrap();
        assert_eq!(buf.pending(only.key()), 1);
    }

    #[tokio::test]
    async fn broadcast_evicts_full_sessions_and_buffers_for_them() {
        let (hub, buf, _cancel) = start();
        let (healthy, mut healthy_rx) = session(&buf, "s1", "c1", 8);
        let (slow, _slow_rx) = session(&buf, "s2", "c2", 1);
        hub.register(healthy).await.unwrap();
        hub.register(slow.clone()).await.unwrap();

        assert_eq!(hub.broadcast(Event::Pong).await.unwrap(), 2);
        assert_eq!(hub.broadcast(Event::error("notice")).await.unwrap(), 1);

        assert!(slow.is_closed());
        assert_eq!(buf.drain(slow.key()), vec![Event::error("notice")]);
        assert_eq!(hub.active_sessions().await.unwrap(), vec!["s1".to_string()]);
        assert_eq!(healthy_rx.recv().await.unwrap(), Event::Pong);
        assert_eq!(healthy_rx.recv().await.unwrap(), Event::error("notice"));
    }

    #[tokio::test]
    async fn cancel_closes_live_sessions() {
        let buf = Arc::new(UndeliveredBuffer::new(32));
        let cancel = CancellationToken::new();
        let (hub, task) = Hub::spawn(buf.clone(), cancel.clone());
        let (s, _rx) = session(&buf, "s1", "c1", 8);
        hub.register(s.clone()).await.unwrap();

        cancel.cancel();
        task.await.unwrap();
        assert!(s.is_closed());
        assert!(hub.active_sessions().await.is_err());
    }
}
