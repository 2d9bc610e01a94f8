// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared collaborators and settings handed to every session.

use std::sync::Arc;

use kindred_config::model::HubConfig;
use kindred_core::{
    AudioSink, CharacterProvider, MessageStore, ResponseGenerator, SpeechToText, TextToSpeech,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::{Hub, HubHandle};
use crate::undelivered::UndeliveredBuffer;

/// External capabilities the hub depends on.
#[derive(Clone)]
pub struct Services {
    pub characters: Arc<dyn CharacterProvider>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    pub messages: Arc<dyn MessageStore>,
    pub audio: Arc<dyn AudioSink>,
}

/// Everything a connection needs, cheap to clone into tasks.
#[derive(Clone)]
pub struct HubContext {
    pub services: Services,
    pub hub: HubHandle,
    pub undelivered: Arc<UndeliveredBuffer>,
    pub config: Arc<HubConfig>,
}

impl HubContext {
    /// Spawn the hub task and build a context around it.
    pub fn start(
        services: Services,
        config: HubConfig,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let undelivered = Arc::new(UndeliveredBuffer::new(config.undelivered_per_key));
        let (hub, task) = Hub::spawn(undelivered.clone(), cancel);
        let ctx = Self {
            services,
            hub,
            undelivered,
            config: Arc::new(config),
        };
        (ctx, task)
    }
}
