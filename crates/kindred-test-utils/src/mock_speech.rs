// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock speech-to-text and text-to-speech services.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use kindred_core::{KindredError, SpeechToText, TextToSpeech, Transcription};
use tokio::sync::Mutex;

/// Transcriber returning queued transcriptions, then `fallback`.
pub struct MockStt {
    queue: Arc<Mutex<VecDeque<Transcription>>>,
    fallback: Transcription,
    fail: AtomicBool,
    hang: AtomicBool,
    calls: AtomicUsize,
}

impl MockStt {
    pub fn new() -> Self {
        Self::returning(Transcription::text("hello from audio"))
    }

    pub fn returning(fallback: Transcription) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            fail: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call yields an empty transcript.
    pub fn silent() -> Self {
        Self::returning(Transcription::default())
    }

    pub async fn push(&self, transcription: Transcription) {
        self.queue.lock().await.push_back(transcription);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_hanging(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockStt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechToText for MockStt {
    async fn transcribe(
        &self,
        _session_id: &str,
        _audio: &[u8],
    ) -> Result<Transcription, KindredError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(KindredError::Provider {
                message: "mock transcription failure".into(),
                source: None,
            });
        }
        Ok(self
            .queue
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Synthesizer returning fixed bytes, or failing on demand.
pub struct MockTts {
    audio: Vec<u8>,
    fail: AtomicBool,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
}

impl MockTts {
    pub fn new() -> Self {
        Self::returning(vec![0xFF, 0xF3, 0x44, 0xC4])
    }

    pub fn returning(audio: Vec<u8>) -> Self {
        Self {
            audio,
            fail: AtomicBool::new(false),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        let tts = Self::new();
        tts.set_failing(true);
        tts
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Recorded `(text, voice_type)` pairs.
    pub async fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockTts {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextToSpeech for MockTts {
    async fn synthesize(
        &self,
        text: &str,
        voice_type: Option<&str>,
    ) -> Result<Vec<u8>, KindredError> {
        self.requests
            .lock()
            .await
            .push((text.to_string(), voice_type.map(str::to_string)));
        if self.fail.load(Ordering::SeqCst) {
            return Err(KindredError::Provider {
                message: "mock synthesis failure".into(),
                source: None,
            });
        }
        Ok(self.audio.clone())
    }
}
