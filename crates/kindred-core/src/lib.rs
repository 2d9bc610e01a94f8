// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Kindred chat relay.
//!
//! This crate provides the conversation types, the error type, and the
//! collaborator traits the session hub consumes. Vendor clients, storage
//! backends, and test mocks all implement traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::KindredError;
pub use types::{AudioUpload, Character, Role, Transcription, Turn};

pub use traits::{
    AudioSink, CharacterProvider, MessageStore, ResponseGenerator, SpeechToText, TextToSpeech,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kindred_error_has_all_variants() {
        let _config = KindredError::Config("test".into());
        let _storage = KindredError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _provider = KindredError::Provider {
            message: "test".into(),
            source: None,
        };
        let _not_found = KindredError::NotFound {
            kind: "character".into(),
            id: "7".into(),
        };
        let _timeout = KindredError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _transport = KindredError::Transport {
            message: "test".into(),
        };
        let _protocol = KindredError::Protocol("test".into());
        let _internal = KindredError::Internal("test".into());
    }

    #[test]
    fn all_collaborator_traits_are_exported() {
        fn _assert_characters<T: CharacterProvider>() {}
        fn _assert_generator<T: ResponseGenerator>() {}
        fn _assert_stt<T: SpeechToText>() {}
        fn _assert_tts<T: TextToSpeech>() {}
        fn _assert_store<T: MessageStore>() {}
        fn _assert_sink<T: AudioSink>() {}
    }
}
