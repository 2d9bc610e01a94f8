// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire codec for client frames.
//!
//! Every frame is a JSON text message shaped `{"type": <tag>, "content": <payload>}`
//! in both directions. Tags are snake_case, payload fields camelCase.
//!
//! Client -> Server:
//! ```json
//! {"type": "chat", "content": {"sender": "user", "content": "hello"}}
//! {"type": "chat", "content": "hello"}
//! {"type": "audio", "content": {"data": "<base64>", "format": "webm"}}
//! {"type": "ping"}
//! ```
//!
//! Server -> Client:
//! ```json
//! {"type": "ack", "content": {"id": "msg-1718000000000-1"}}
//! {"type": "chat", "content": {"id": "...", "role": "character", "content": "...", "timestamp": "..."}}
//! {"type": "speech_text", "content": {"text": "", "status": "no_speech_detected"}}
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kindred_core::{KindredError, Role, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors produced while decoding a client frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Not JSON, or missing the `type` tag.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The tag is known but its payload does not match.
    #[error("invalid {tag} payload: {source}")]
    InvalidPayload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },

    /// Audio payload in an encoding the server cannot read.
    #[error("unsupported audio encoding: {0}")]
    UnsupportedAudio(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

impl From<CodecError> for KindredError {
    fn from(e: CodecError) -> Self {
        KindredError::Protocol(e.to_string())
    }
}

/// Frame tags understood by the decoder.
pub mod tags {
    pub const CHAT: &str = "chat";
    pub const AUDIO: &str = "audio";
    pub const PING: &str = "ping";
    pub const START_STREAM: &str = "start_stream";
    pub const STREAM_CONFIG: &str = "stream_config";
}

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chat(ChatCommand),
    Audio(AudioCommand),
    Ping,
    StartStream(StartStream),
    StreamConfig(StreamConfig),
    /// A well-formed frame whose tag is not recognized.
    Unknown { tag: String },
}

impl Command {
    /// The wire tag of this command.
    pub fn tag(&self) -> &str {
        match self {
            Command::Chat(_) => tags::CHAT,
            Command::Audio(_) => tags::AUDIO,
            Command::Ping => tags::PING,
            Command::StartStream(_) => tags::START_STREAM,
            Command::StreamConfig(_) => tags::STREAM_CONFIG,
            Command::Unknown { tag } => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "default_sender")]
    pub sender: String,
    pub content: String,
}

impl ChatCommand {
    /// A chat typed by the connected user.
    pub fn from_user(content: impl Into<String>) -> Self {
        Self {
            id: None,
            sender: default_sender(),
            content: content.into(),
        }
    }
}

fn default_sender() -> String {
    Role::User.to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioCommand {
    pub payload: AudioPayload,
    pub format: Option<String>,
}

/// Audio bytes as they arrived on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPayload {
    /// Base64 text.
    Base64(String),
    /// Legacy JSON array of byte values.
    Legacy(Vec<i64>),
    /// Anything else; carries a description of what was received.
    Unsupported(String),
}

impl AudioPayload {
    fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => AudioPayload::Base64(s),
            Value::Array(items) => {
                let mut bytes = Vec::with_capacity(items.len());
                for item in &items {
                    match item.as_i64() {
                        Some(n) => bytes.push(n),
                        None => return AudioPayload::Unsupported("non-integer array element".into()),
                    }
                }
                AudioPayload::Legacy(bytes)
            }
            Value::Null => AudioPayload::Unsupported("missing audio data".into()),
            other => AudioPayload::Unsupported(format!("{} audio data", json_kind(&other))),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            AudioPayload::Base64(s) => Value::String(s.clone()),
            AudioPayload::Legacy(bytes) => Value::from(bytes.clone()),
            AudioPayload::Unsupported(_) => Value::Null,
        }
    }

    /// Decode to raw bytes. Both encodings of the same audio yield identical bytes.
    pub fn decode(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            AudioPayload::Base64(s) => STANDARD
                .decode(s.trim())
                .map_err(|e| CodecError::UnsupportedAudio(format!("invalid base64: {e}"))),
            AudioPayload::Legacy(values) => values
                .iter()
                .map(|&n| {
                    u8::try_from(n).map_err(|_| {
                        CodecError::UnsupportedAudio(format!("byte value {n} out of range"))
                    })
                })
                .collect(),
            AudioPayload::Unsupported(what) => Err(CodecError::UnsupportedAudio(what.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartStream {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<u64>,
    #[serde(default)]
    pub video_enabled: bool,
    #[serde(default)]
    pub audio_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_enabled: Option<bool>,
}

/// Progress of a voice message through transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechStatus {
    Processing,
    Transcribed,
    NoSpeechDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    Started,
    Updated,
}

/// A server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "content",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Event {
    Ack {
        id: String,
    },
    Typing {
        active: bool,
    },
    Chat(Turn),
    Audio {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        turn_id: String,
        format: String,
    },
    SpeechText {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<SpeechStatus>,
    },
    Error {
        message: String,
    },
    ChatHistory(Vec<Turn>),
    CallState {
        state: CallPhase,
        character_id: u64,
    },
    Pong,
}

impl Event {
    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }

    pub fn speech_status(status: SpeechStatus) -> Self {
        Event::SpeechText {
            text: String::new(),
            id: None,
            status: Some(status),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Ack { .. } => "ack",
            Event::Typing { .. } => "typing",
            Event::Chat(_) => "chat",
            Event::Audio { .. } => "audio",
            Event::SpeechText { .. } => "speech_text",
            Event::Error { .. } => "error",
            Event::ChatHistory(_) => "chat_history",
            Event::CallState { .. } => "call_state",
            Event::Pong => "pong",
        }
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    tag: String,
    #[serde(default)]
    content: Value,
}

#[derive(Deserialize)]
struct AudioObject {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    format: Option<String>,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "numeric",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn payload<T: serde::de::DeserializeOwned>(tag: &str, content: Value) -> Result<T, CodecError> {
    serde_json::from_value(content).map_err(|source| CodecError::InvalidPayload {
        tag: tag.to_string(),
        source,
    })
}

/// Decode one text frame into a [`Command`].
pub fn decode_command(frame: &str) -> Result<Command, CodecError> {
    let Envelope { tag, content } = serde_json::from_str(frame).map_err(CodecError::Malformed)?;
    let command = match tag.as_str() {
        tags::CHAT => match content {
            Value::String(text) => Command::Chat(ChatCommand::from_user(text)),
            other => Command::Chat(payload(&tag, other)?),
        },
        tags::AUDIO => match content {
            Value::Object(_) => {
                let AudioObject { data, format } = payload(&tag, content)?;
                Command::Audio(AudioCommand {
                    payload: AudioPayload::from_value(data),
                    format,
                })
            }
            other => Command::Audio(AudioCommand {
                payload: AudioPayload::from_value(other),
                format: None,
            }),
        },
        tags::PING => Command::Ping,
        tags::START_STREAM => Command::StartStream(payload(&tag, null_as_object(content))?),
        tags::STREAM_CONFIG => Command::StreamConfig(payload(&tag, null_as_object(content))?),
        _ => Command::Unknown { tag },
    };
    Ok(command)
}

fn null_as_object(content: Value) -> Value {
    if content.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        content
    }
}

/// Encode a [`Command`] in its canonical object form.
pub fn encode_command(command: &Command) -> Result<String, CodecError> {
    let content = match command {
        Command::Chat(chat) => Some(serde_json::to_value(chat).map_err(CodecError::Encode)?),
        Command::Audio(audio) => {
            let mut obj = serde_json::Map::new();
            obj.insert("data".into(), audio.payload.to_value());
            if let Some(format) = &audio.format {
                obj.insert("format".into(), Value::String(format.clone()));
            }
            Some(Value::Object(obj))
        }
        Command::Ping | Command::Unknown { .. } => None,
        Command::StartStream(start) => {
            Some(serde_json::to_value(start).map_err(CodecError::Encode)?)
        }
        Command::StreamConfig(update) => {
            Some(serde_json::to_value(update).map_err(CodecError::Encode)?)
        }
    };
    let frame = match content {
        Some(content) => serde_json::json!({ "type": command.tag(), "content": content }),
        None => serde_json::json!({ "type": command.tag() }),
    };
    serde_json::to_string(&frame).map_err(CodecError::Encode)
}

pub fn encode_event(event: &Event) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(CodecError::Encode)
}

pub fn decode_event(frame: &str) -> Result<Event, CodecError> {
    serde_json::from_str(frame).map_err(CodecError::Malformed)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn chat_string_shorthand_is_a_user_message() {
        let cmd = decode_command(r#"{"type":"chat","content":"hello"}"#).unwrap();
        assert_eq!(cmd, Command::Chat(ChatCommand::from_user("hello")));
    }

    #[test]
    fn chat_object_keeps_id_and_sender() {
        let cmd = decode_command(
            r#"{"type":"chat","content":{"id":"m-1","sender":"character","content":"x"}}"#,
        )
        .unwrap();
        let Command::Chat(chat) = cmd else {
            panic!("expected chat");
        };
        assert_eq!(chat.id.as_deref(), Some("m-1"));
        assert_eq!(chat.sender, "character");
    }

    #[test]
    fn unknown_tag_is_not_an_error() {
        let cmd = decode_command(r#"{"type":"dance","content":{}}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Unknown {
                tag: "dance".into()
            }
        );
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(
            decode_command("not json"),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            decode_command(r#"{"content":"no tag"}"#),
            Err(CodecError::Malformed(_))
        ));
        assert!(matches!(
            decode_command(r#"{"type":"chat","content":{"sender":"user"}}"#),
            Err(CodecError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn base64_and_legacy_audio_decode_identically() {
        let b64 = decode_command(r#"{"type":"audio","content":"AQID/w=="}"#).unwrap();
        let legacy = decode_command(r#"{"type":"audio","content":[1,2,3,255]}"#).unwrap();
        let (Command::Audio(a), Command::Audio(b)) = (b64, legacy) else {
            panic!("expected audio commands");
        };
        assert_eq!(a.payload.decode().unwrap(), vec![1, 2, 3, 255]);
        assert_eq!(a.payload.decode().unwrap(), b.payload.decode().unwrap());
    }

    #[test]
    fn audio_object_form_carries_format() {
        let cmd = decode_command(r#"{"type":"audio","content":{"data":"","format":"wav"}}"#)
            .unwrap();
        let Command::Audio(audio) = cmd else {
            panic!("expected audio");
        };
        assert_eq!(audio.format.as_deref(), Some("wav"));
        assert!(audio.payload.decode().unwrap().is_empty());
    }

    #[test]
    fn unsupported_audio_fails_at_decode_time() {
        let cmd = decode_command(r#"{"type":"audio","content":42}"#).unwrap();
        let Command::Audio(audio) = cmd else {
            panic!("expected audio");
        };
        assert!(matches!(
            audio.payload.decode(),
            Err(CodecError::UnsupportedAudio(_))
        ));
        assert!(AudioPayload::Legacy(vec![256]).decode().is_err());
    }

    #[test]
    fn events_use_tag_and_camel_case_content() {
        let frame = encode_event(&Event::CallState {
            state: CallPhase::Started,
            character_id: 7,
        })
        .unwrap();
        let json: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "call_state");
        assert_eq!(json["content"]["characterId"], 7);
        assert_eq!(json["content"]["state"], "started");

        let frame = encode_event(&Event::speech_status(SpeechStatus::NoSpeechDetected)).unwrap();
        let json: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "speech_text");
        assert_eq!(json["content"]["text"], "");
        assert_eq!(json["content"]["status"], "no_speech_detected");
        assert!(json["content"].get("id").is_none());

        let frame = encode_event(&Event::Pong).unwrap();
        assert_eq!(frame, r#"{"type":"pong"}"#);
    }

    #[test]
    fn audio_event_bytes_are_base64() {
        let frame = encode_event(&Event::Audio {
            data: vec![0, 1, 2],
            turn_id: "t1".into(),
            format: "mp3".into(),
        })
        .unwrap();
        let json: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["content"]["data"], "AAEC");
        assert_eq!(json["content"]["turnId"], "t1");
    }

    fn sample_turn() -> Turn {
        Turn {
            id: "m-1".into(),
            role: Role::Character,
            content: "hi there".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn every_event_variant_round_trips() {
        let events = vec![
            Event::Ack { id: "a".into() },
            Event::Typing { active: true },
            Event::Chat(sample_turn()),
            Event::Audio {
                data: vec![9, 8, 7],
                turn_id: "m-1".into(),
                format: "mp3".into(),
            },
            Event::SpeechText {
                text: "hello".into(),
                id: Some("m-2".into()),
                status: Some(SpeechStatus::Transcribed),
            },
            Event::error("boom"),
            Event::ChatHistory(vec![sample_turn()]),
            Event::CallState {
                state: CallPhase::Updated,
                character_id: 3,
            },
            Event::Pong,
        ];
        for event in events {
            let frame = encode_event(&event).unwrap();
            assert_eq!(decode_event(&frame).unwrap(), event, "frame: {frame}");
        }
    }

    fn arb_command() -> impl Strategy<Value = Command> {
        prop_oneof![
            (
                proptest::option::of("[a-z0-9-]{1,12}"),
                "user|character",
                ".{0,40}"
            )
                .prop_map(|(id, sender, content)| Command::Chat(ChatCommand {
                    id,
                    sender,
                    content
                })),
            (
                "[A-Za-z0-9+/]{0,16}",
                proptest::option::of("webm|wav|ogg")
            )
                .prop_map(|(data, format)| Command::Audio(AudioCommand {
                    payload: AudioPayload::Base64(data),
                    format,
                })),
            (
                proptest::collection::vec(0i64..256, 0..16),
                proptest::option::of("webm|wav")
            )
                .prop_map(|(bytes, format)| Command::Audio(AudioCommand {
                    payload: AudioPayload::Legacy(bytes),
                    format,
                })),
            Just(Command::Ping),
            (proptest::option::of(0u64..1000), any::<bool>(), any::<bool>()).prop_map(
                |(character_id, video_enabled, audio_enabled)| Command::StartStream(StartStream {
                    character_id,
                    video_enabled,
                    audio_enabled,
                })
            ),
            (
                proptest::option::of(any::<bool>()),
                proptest::option::of(any::<bool>())
            )
                .prop_map(|(video_enabled, audio_enabled)| Command::StreamConfig(
                    StreamConfig {
                        video_enabled,
                        audio_enabled,
                    }
                )),
            "[a-z_]{1,12}"
                .prop_filter("known tags decode to typed commands", |t| ![
                    tags::CHAT,
                    tags::AUDIO,
                    tags::PING,
                    tags::START_STREAM,
                    tags::STREAM_CONFIG
                ]
                .contains(&t.as_str()))
                .prop_map(|tag| Command::Unknown { tag }),
        ]
    }

    proptest! {
        #[test]
        fn command_round_trip(cmd in arb_command()) {
            let frame = encode_command(&cmd).unwrap();
            prop_assert_eq!(decode_command(&frame).unwrap(), cmd);
        }
    }
}
