// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session hub for the Kindred chat relay.
//!
//! Owns live client sessions, decodes inbound frames into typed commands,
//! runs chat and voice exchanges against external services under deadlines,
//! and buffers events that could not be delivered until the client returns.

pub mod codec;
pub mod connection;
pub mod context;
pub mod deadline;
pub mod dispatcher;
pub mod hub;
pub mod pipeline;
pub mod session;
pub mod transport;
pub mod undelivered;

pub use codec::{Command, Event};
pub use connection::serve_connection;
pub use context::{HubContext, Services};
pub use hub::{Hub, HubHandle};
pub use session::{Session, SessionParams};
pub use transport::Frame;
pub use undelivered::UndeliveredBuffer;
