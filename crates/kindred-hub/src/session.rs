// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-connection session state.
//!
//! A [`Session`] is created when a client upgrades, shared as `Arc<Session>`
//! between the reader, the writer and in-flight command tasks, and never
//! reused after teardown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::{Duration, SubsecRound, Utc};
use kindred_core::{Role, Turn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::Event;
use crate::hub::FlushNotifier;
use crate::undelivered::{UndeliveredBuffer, bucket_key};

/// Identity of a connection, resolved from the upgrade query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub session_id: String,
    pub client_id: String,
    pub character_id: u64,
    pub user_id: Option<String>,
}

/// Media flags toggled by `start_stream` / `stream_config`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallSettings {
    pub active: bool,
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

/// What happened to an event handed to [`Session::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued on the outbound buffer.
    Queued,
    /// Outbound already closed; the event went to the undelivered buffer.
    Closed,
    /// Outbound full; the event was buffered and the session torn down.
    Overflow,
}

impl Delivery {
    pub fn is_queued(self) -> bool {
        matches!(self, Delivery::Queued)
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

pub struct Session {
    serial: u64,
    params: SessionParams,
    key: String,
    /// `None` once closed. Every send checks this under the lock.
    outbound: Mutex<Option<mpsc::Sender<Event>>>,
    turns: Mutex<Vec<Turn>>,
    call: Mutex<CallSettings>,
    in_flight: Arc<Semaphore>,
    undelivered: Arc<UndeliveredBuffer>,
    /// Set on registration.
    flush: OnceLock<FlushNotifier>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("serial", &self.serial)
            .field("session_id", &self.params.session_id)
            .field("client_id", &self.params.client_id)
            .field("character_id", &self.params.character_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stamp at storage precision (microseconds), bumping past the last turn
/// when the clock has not advanced or went backwards.
fn push_stamped(turns: &mut Vec<Turn>, mut turn: Turn) -> Turn {
    let mut at = Utc::now().trunc_subsecs(6);
    if let Some(last) = turns.last()
        && at <= last.timestamp
    {
        at = last.timestamp + Duration::microseconds(1);
    }
    turn.timestamp = at;
    turns.push(turn.clone());
    turn
}

impl Session {
    /// Create a session and the receiving end of its outbound buffer.
    pub fn new(
        params: SessionParams,
        outbound_capacity: usize,
        max_in_flight: usize,
        undelivered: Arc<UndeliveredBuffer>,
    ) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(outbound_capacity.max(1));
        let key = bucket_key(&params.session_id, &params.client_id);
        let session = Arc::new(Self {
            serial: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            params,
            key,
            outbound: Mutex::new(Some(tx)),
            turns: Mutex::new(Vec::new()),
            call: Mutex::new(CallSettings::default()),
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
            undelivered,
            flush: OnceLock::new(),
            shutdown: CancellationToken::new(),
        });
        (session, rx)
    }

    /// Process-unique number distinguishing sessions that share ids.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn session_id(&self) -> &str {
        &self.params.session_id
    }

    pub fn client_id(&self) -> &str {
        &self.params.client_id
    }

    pub fn character_id(&self) -> u64 {
        self.params.character_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.params.user_id.as_deref()
    }

    /// Undelivered-buffer key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Non-blocking send. Never writes to a closed outbound buffer.
    pub fn send(&self, event: Event) -> Delivery {
        let mut guard = lock(&self.outbound);
        let Some(tx) = guard.as_ref() else {
            drop(guard);
            debug!(
                session_id = %self.params.session_id,
                client_id = %self.params.client_id,
                event = event.kind(),
                "outbound closed, buffering event"
            );
            self.buffer_after_close(event);
            return Delivery::Closed;
        };
        match tx.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Closed(event)) => {
                guard.take();
                drop(guard);
                self.shutdown.cancel();
                self.buffer_after_close(event);
                Delivery::Closed
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                guard.take();
                drop(guard);
                warn!(
                    session_id = %self.params.session_id,
                    client_id = %self.params.client_id,
                    event = event.kind(),
                    "outbound buffer full, tearing session down"
                );
                self.shutdown.cancel();
                self.undelivered.put(&self.key, event);
                Delivery::Overflow
            }
        }
    }

    /// Buffer an event this session can no longer deliver and ask the hub to
    /// forward it if a successor already owns the same key.
    fn buffer_after_close(&self, event: Event) {
        self.undelivered.put(&self.key, event);
        if let Some(flush) = self.flush.get() {
            flush.request(&self.params.client_id, &self.key);
        }
    }

    pub(crate) fn attach_flush(&self, flush: FlushNotifier) {
        let _ = self.flush.set(flush);
    }

    /// Put an event straight into the undelivered buffer.
    pub fn stash(&self, event: Event) {
        self.undelivered.put(&self.key, event);
    }

    /// Close the outbound buffer. Returns true only for the call that closed it.
    pub fn close_outbound(&self) -> bool {
        let closed = lock(&self.outbound).take().is_some();
        self.shutdown.cancel();
        if closed {
            debug!(
                session_id = %self.params.session_id,
                client_id = %self.params.client_id,
                "outbound closed"
            );
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.outbound).is_none()
    }

    /// Cancelled when the session is torn down for any reason.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Try to reserve a command slot.
    pub fn try_begin_command(&self) -> Option<OwnedSemaphorePermit> {
        match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Snapshot of the conversation so far.
    pub fn history(&self) -> Vec<Turn> {
        lock(&self.turns).clone()
    }

    /// Append a new turn, stamped under the history lock so timestamps
    /// strictly increase in append order.
    pub fn record_turn(
        &self,
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
    ) -> Turn {
        let mut turns = lock(&self.turns);
        push_stamped(&mut turns, Turn::new(id, role, content))
    }

    /// Like [`Session::record_turn`], also returning the history that
    /// preceded the new turn, taken in the same critical section.
    pub fn record_turn_with_prior(
        &self,
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
    ) -> (Turn, Vec<Turn>) {
        let mut turns = lock(&self.turns);
        let prior = turns.clone();
        let turn = push_stamped(&mut turns, Turn::new(id, role, content));
        (turn, prior)
    }

    /// Seed history loaded from the message store.
    pub fn load_history(&self, turns: Vec<Turn>) {
        let mut guard = lock(&self.turns);
        let mut loaded = turns;
        loaded.append(&mut guard);
        *guard = loaded;
    }

    pub fn call_settings(&self) -> CallSettings {
        *lock(&self.call)
    }

    pub fn update_call(&self, f: impl FnOnce(&mut CallSettings)) -> CallSettings {
        let mut guard = lock(&self.call);
        f(&mut guard);
        *guard
    }
}
