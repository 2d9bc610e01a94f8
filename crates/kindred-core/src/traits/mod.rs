// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the session hub.
//!
//! All traits are object safe and use `#[async_trait]` so the hub can hold
//! them as `Arc<dyn Trait>`.

pub mod character;
pub mod generation;
pub mod speech;
pub mod store;

pub use character::CharacterProvider;
pub use generation::ResponseGenerator;
pub use speech::{SpeechToText, TextToSpeech};
pub use store::{AudioSink, MessageStore};
