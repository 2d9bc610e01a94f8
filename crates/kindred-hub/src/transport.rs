// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport-neutral WebSocket frames.
//!
//! The gateway maps its socket messages onto [`Frame`] so the session loops
//! can be driven by any `Stream`/`Sink` pair, including in-memory channels.

use futures::{Sink, Stream};
use kindred_core::KindredError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Inbound half of a connection.
pub trait FrameStream: Stream<Item = Result<Frame, KindredError>> + Send + Unpin + 'static {}

impl<T> FrameStream for T where
    T: Stream<Item = Result<Frame, KindredError>> + Send + Unpin + 'static
{
}

/// Outbound half of a connection.
pub trait FrameSink: Sink<Frame, Error = KindredError> + Send + Unpin + 'static {}

impl<T> FrameSink for T where T: Sink<Frame, Error = KindredError> + Send + Unpin + 'static {}
