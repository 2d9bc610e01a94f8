// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process harness for end-to-end hub tests.
//!
//! `TestHarness` starts a hub wired to mock collaborators. `connect()` opens
//! a session over in-memory channels and returns a [`TestClient`] that speaks
//! the wire protocol, answering keepalive pings like a browser would.

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use kindred_config::model::HubConfig;
use kindred_core::KindredError;
use kindred_hub::codec::{self, Command, Event};
use kindred_hub::{Frame, HubContext, Services, SessionParams};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_characters::MockCharacters;
use crate::mock_generator::MockGenerator;
use crate::mock_speech::{MockStt, MockTts};
use crate::mock_store::{InMemoryMessageStore, MockAudioSink};

/// Builder for a [`TestHarness`].
pub struct TestHarnessBuilder {
    config: HubConfig,
    generator: MockGenerator,
    stt: MockStt,
    tts: MockTts,
    characters: MockCharacters,
    messages: InMemoryMessageStore,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: HubConfig {
                generation_timeout_secs: 2,
                transcription_timeout_secs: 2,
                synthesis_timeout_secs: 2,
                ..HubConfig::default()
            },
            generator: MockGenerator::new(),
            stt: MockStt::new(),
            tts: MockTts::new(),
            characters: MockCharacters::new(),
            messages: InMemoryMessageStore::new(),
        }
    }

    pub fn with_config(mut self, f: impl FnOnce(&mut HubConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn with_generator(mut self, generator: MockGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_stt(mut self, stt: MockStt) -> Self {
        self.stt = stt;
        self
    }

    pub fn with_tts(mut self, tts: MockTts) -> Self {
        self.tts = tts;
        self
    }

    pub fn with_characters(mut self, characters: MockCharacters) -> Self {
        self.characters = characters;
        self
    }

    pub fn with_messages(mut self, messages: InMemoryMessageStore) -> Self {
        self.messages = messages;
        self
    }

    /// Start the hub. Must be called inside a tokio runtime.
    pub fn build(self) -> TestHarness {
        let generator = Arc::new(self.generator);
        let stt = Arc::new(self.stt);
        let tts = Arc::new(self.tts);
        let characters = Arc::new(self.characters);
        let messages = Arc::new(self.messages);
        let audio = Arc::new(MockAudioSink::new());

        let services = Services {
            characters: characters.clone(),
            generator: generator.clone(),
            stt: stt.clone(),
            tts: tts.clone(),
            messages: messages.clone(),
            audio: audio.clone(),
        };
        let cancel = CancellationToken::new();
        let (ctx, hub_task) = HubContext::start(services, self.config, cancel.clone());

        TestHarness {
            ctx,
            generator,
            stt,
            tts,
            characters,
            messages,
            audio,
            cancel,
            hub_task,
        }
    }
}

/// A running hub with mock collaborators.
pub struct TestHarness {
    pub ctx: HubContext,
    pub generator: Arc<MockGenerator>,
    pub stt: Arc<MockStt>,
    pub tts: Arc<MockTts>,
    pub characters: Arc<MockCharacters>,
    pub messages: Arc<InMemoryMessageStore>,
    pub audio: Arc<MockAudioSink>,
    cancel: CancellationToken,
    hub_task: JoinHandle<()>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default session parameters for `client_id` talking to character 1.
    pub fn params(client_id: &str) -> SessionParams {
        SessionParams {
            session_id: format!("session-1-{client_id}"),
            client_id: client_id.to_string(),
            character_id: 1,
            user_id: None,
        }
    }

    /// Open a session with the given parameters.
    pub fn connect(&self, params: SessionParams) -> TestClient {
        let (client_tx, server_rx) = mpsc::unbounded::<Result<Frame, KindredError>>();
        let (server_tx, client_rx) = mpsc::unbounded::<Frame>();
        let sink = server_tx.sink_map_err(|e| KindredError::Transport {
            message: e.to_string(),
        });
        let task = tokio::spawn(kindred_hub::serve_connection(
            self.ctx.clone(),
            params,
            server_rx,
            sink,
        ));
        TestClient {
            tx: client_tx,
            rx: client_rx,
            task,
            recv_timeout: Duration::from_secs(120),
        }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.hub_task.await;
    }
}

/// Client end of an in-memory connection.
pub struct TestClient {
    tx: mpsc::UnboundedSender<Result<Frame, KindredError>>,
    rx: mpsc::UnboundedReceiver<Frame>,
    task: JoinHandle<()>,
    recv_timeout: Duration,
}

impl TestClient {
    pub fn send(&self, command: &Command) {
        let text = codec::encode_command(command).expect("encodable command");
        self.send_frame(Frame::Text(text));
    }

    pub fn send_raw(&self, text: &str) {
        self.send_frame(Frame::Text(text.to_string()));
    }

    pub fn send_frame(&self, frame: Frame) {
        let _ = self.tx.unbounded_send(Ok(frame));
    }

    /// Inject a transport failure into the server's reader.
    pub fn fail_transport(&self) {
        let _ = self.tx.unbounded_send(Err(KindredError::Transport {
            message: "connection reset".into(),
        }));
    }

    /// Next server frame other than a keepalive ping, or `None` once the
    /// server closes or the receive timeout passes.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let frame = tokio::time::timeout(self.recv_timeout, self.rx.next())
                .await
                .ok()??;
            match frame {
                Frame::Ping(payload) => self.send_frame(Frame::Pong(payload)),
                other => return Some(other),
            }
        }
    }

    /// Next decoded event, or `None` when the connection closes first.
    pub async fn next_event(&mut self) -> Option<Event> {
        match self.next_frame().await? {
            Frame::Text(text) => Some(codec::decode_event(&text).expect("server sent a valid event")),
            Frame::Close => None,
            other => panic!("unexpected frame from server: {other:?}"),
        }
    }

    pub async fn expect_event(&mut self) -> Event {
        self.next_event().await.expect("expected an event")
    }

    /// Collect every event that arrives within `window`, answering pings.
    /// Stops early if the server closes the connection.
    pub async fn events_within(&mut self, window: Duration) -> Vec<Event> {
        let deadline = tokio::time::Instant::now() + window;
        let mut events = Vec::new();
        while let Ok(Some(frame)) = tokio::time::timeout_at(deadline, self.rx.next()).await {
            match frame {
                Frame::Ping(payload) => self.send_frame(Frame::Pong(payload)),
                Frame::Text(text) => {
                    events.push(codec::decode_event(&text).expect("server sent a valid event"))
                }
                Frame::Close => break,
                other => panic!("unexpected frame from server: {other:?}"),
            }
        }
        events
    }

    /// Close the client side and wait for the server to finish the session.
    pub async fn disconnect(self) {
        let TestClient { tx, task, .. } = self;
        drop(tx);
        let _ = task.await;
    }
}
