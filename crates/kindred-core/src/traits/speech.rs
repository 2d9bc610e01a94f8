// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech recognition and synthesis.

use async_trait::async_trait;

use crate::error::KindredError;
use crate::types::Transcription;

/// Converts recorded audio into text.
#[async_trait]
pub trait SpeechToText: Send + Sync + 'static {
    async fn transcribe(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> Result<Transcription, KindredError>;
}

/// Converts reply text into audio bytes.
#[async_trait]
pub trait TextToSpeech: Send + Sync + 'static {
    /// Synthesize `text` with the given voice. `None` selects the backend default.
    async fn synthesize(
        &self,
        text: &str,
        voice_type: Option<&str>,
    ) -> Result<Vec<u8>, KindredError>;
}
