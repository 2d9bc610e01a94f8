// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Kindred chat relay.
//!
//! Upgrades `GET /ws` connections and hands them to the session hub, and
//! serves the operational routes `GET /health` and `GET /v1/sessions`.

pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{GatewayState, build_router, serve, start_server};
pub use ws::ConnectQuery;
