// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket upgrade for client sessions.
//!
//! `GET /ws?characterId=<id>&clientId=<id>&sessionId=<id>&userId=<id>`
//!
//! Frames in both directions are JSON text `{"type": <tag>, "content": <payload>}`.
//! The socket is mapped onto hub [`Frame`]s and served by
//! [`kindred_hub::serve_connection`].

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use kindred_core::KindredError;
use kindred_hub::{Frame, SessionParams};
use serde::Deserialize;

use crate::server::GatewayState;

/// Upgrade query parameters, all optional on the wire.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectQuery {
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ConnectQuery {
    /// Resolve the session identity, filling in defaults.
    pub fn into_params(self, default_character_id: u64) -> SessionParams {
        let character_id = match self.character_id.as_deref().map(str::trim) {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                tracing::debug!(raw, default_character_id, "non-numeric characterId, using default");
                default_character_id
            }),
            None => default_character_id,
        };
        let client_id = non_empty(self.client_id)
            .unwrap_or_else(|| format!("client-{}", uuid::Uuid::new_v4()));
        let session_id = non_empty(self.session_id).unwrap_or_else(|| {
            format!(
                "session-{character_id}-{client_id}-{}",
                chrono::Utc::now().timestamp()
            )
        });
        SessionParams {
            session_id,
            client_id,
            character_id,
            user_id: non_empty(self.user_id),
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<GatewayState>,
) -> Response {
    let params = query.into_params(state.ctx.config.default_character_id);
    ws.on_upgrade(move |socket| handle_socket(socket, state, params))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, params: SessionParams) {
    let (sink, stream) = socket.split();
    let inbound = stream.map(inbound_frame);
    let outbound = sink
        .sink_map_err(transport_error)
        .with(|frame: Frame| futures::future::ready(Ok::<_, KindredError>(outbound_message(frame))));
    kindred_hub::serve_connection(state.ctx, params, inbound, outbound).await;
}

fn transport_error(e: axum::Error) -> KindredError {
    KindredError::Transport {
        message: e.to_string(),
    }
}

fn inbound_frame(msg: Result<Message, axum::Error>) -> Result<Frame, KindredError> {
    let frame = match msg.map_err(transport_error)? {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
        Message::Ping(bytes) => Frame::Ping(bytes.to_vec()),
        Message::Pong(bytes) => Frame::Pong(bytes.to_vec()),
        Message::Close(_) => Frame::Close,
    };
    Ok(frame)
}

fn outbound_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes.into()),
        Frame::Ping(bytes) => Message::Ping(bytes.into()),
        Frame::Pong(bytes) => Message::Pong(bytes.into()),
        Frame::Close => Message::Close(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(character: Option<&str>, client: Option<&str>, session: Option<&str>) -> ConnectQuery {
        ConnectQuery {
            character_id: character.map(str::to_string),
            client_id: client.map(str::to_string),
            session_id: session.map(str::to_string),
            user_id: None,
        }
    }

    #[test]
    fn explicit_parameters_are_kept() {
        let params = query(Some("7"), Some("c1"), Some("s1")).into_params(1);
        assert_eq!(params.character_id, 7);
        assert_eq!(params.client_id, "c1");
        assert_eq!(params.session_id, "s1");
    }

    #[test]
    fn missing_session_id_is_derived() {
        let params = query(Some("7"), Some("c1"), None).into_params(1);
        assert!(params.session_id.starts_with("session-7-c1-"), "{}", params.session_id);
        let ts = params.session_id.rsplit('-').next().unwrap();
        assert!(ts.parse::<i64>().is_ok());
    }

    #[test]
    fn non_numeric_character_falls_back_to_default() {
        assert_eq!(query(Some("ada"), Some("c1"), None).into_params(3).character_id, 3);
        assert_eq!(query(None, Some("c1"), None).into_params(3).character_id, 3);
    }

    #[test]
    fn missing_client_id_is_generated() {
        let a = query(Some("1"), None, None).into_params(1);
        let b = query(Some("1"), Some(""), None).into_params(1);
        assert!(a.client_id.starts_with("client-"));
        assert_ne!(a.client_id, b.client_id);
    }

    #[test]
    fn query_uses_camel_case_names() {
        let q: ConnectQuery =
            serde_json::from_str(r#"{"characterId":"2","clientId":"x","userId":"u"}"#).unwrap();
        let params = q.into_params(1);
        assert_eq!(params.character_id, 2);
        assert_eq!(params.user_id.as_deref(), Some("u"));
    }

    #[test]
    fn frames_map_both_ways() {
        assert_eq!(
            inbound_frame(Ok(Message::Text("hi".into()))).unwrap(),
            Frame::Text("hi".into())
        );
        assert_eq!(inbound_frame(Ok(Message::Close(None))).unwrap(), Frame::Close);
        assert!(matches!(
            outbound_message(Frame::Ping(vec![])),
            Message::Ping(_)
        ));
    }
}
