// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Kindred integration tests.
//!
//! Provides mock collaborators and an in-process harness for fast,
//! deterministic tests without external services or sockets.
//!
//! # Components
//!
//! - [`MockGenerator`] - scripted response generator (reply, fail, hang, delay)
//! - [`MockStt`] / [`MockTts`] - scripted speech services
//! - [`InMemoryMessageStore`] / [`MockAudioSink`] - recording persistence
//! - [`MockCharacters`] - fixed character catalogue
//! - [`TestHarness`] / [`TestClient`] - hub plus in-memory connections

pub mod harness;
pub mod mock_characters;
pub mod mock_generator;
pub mod mock_speech;
pub mod mock_store;

pub use harness::{TestClient, TestHarness};
pub use mock_characters::MockCharacters;
pub use mock_generator::{GenerationCall, MockGenerator, Script};
pub use mock_speech::{MockStt, MockTts};
pub use mock_store::{InMemoryMessageStore, MockAudioSink};
