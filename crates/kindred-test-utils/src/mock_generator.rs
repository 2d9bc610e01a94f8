// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock response generator for deterministic testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kindred_core::{Character, KindredError, ResponseGenerator, Turn};
use tokio::sync::Mutex;

/// What the generator does on one call.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(String),
    Fail(String),
    /// Never returns.
    Hang,
    /// Reply after a delay.
    Delayed(Duration, String),
}

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub character_id: u64,
    pub user_message: String,
    pub history: Vec<Turn>,
}

/// A generator that plays back scripted behaviours.
///
/// Scripts are popped from a FIFO queue. When the queue is empty the
/// fallback script runs (a fixed "mock reply" unless changed).
pub struct MockGenerator {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    fallback: Script,
    calls: Arc<Mutex<Vec<GenerationCall>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_fallback(Script::Reply("mock reply".to_string()))
    }

    pub fn with_fallback(fallback: Script) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            fallback,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(
                responses.into_iter().map(Script::Reply).collect(),
            )),
            ..Self::new()
        }
    }

    /// A generator whose every call hangs forever.
    pub fn hanging() -> Self {
        Self::with_fallback(Script::Hang)
    }

    pub fn failing(message: &str) -> Self {
        Self::with_fallback(Script::Fail(message.to_string()))
    }

    pub async fn push(&self, script: Script) {
        self.scripts.lock().await.push_back(script);
    }

    pub async fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseGenerator for MockGenerator {
    async fn generate(
        &self,
        character: &Character,
        user_message: &str,
        history: &[Turn],
    ) -> Result<String, KindredError> {
        self.calls.lock().await.push(GenerationCall {
            character_id: character.id,
            user_message: user_message.to_string(),
            history: history.to_vec(),
        });
        let script = self
            .scripts
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match script {
            Script::Reply(text) => Ok(text),
            Script::Fail(message) => Err(KindredError::Provider {
                message,
                source: None,
            }),
            Script::Hang => futures::future::pending().await,
            Script::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}
