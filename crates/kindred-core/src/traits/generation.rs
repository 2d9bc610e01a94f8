// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Character reply generation.

use async_trait::async_trait;

use crate::error::KindredError;
use crate::types::{Character, Turn};

/// Produces a character's reply to a user message.
#[async_trait]
pub trait ResponseGenerator: Send + Sync + 'static {
    /// Generate the reply text.
    ///
    /// `history` holds the turns that precede `user_message`, oldest first.
    async fn generate(
        &self,
        character: &Character,
        user_message: &str,
        history: &[Turn],
    ) -> Result<String, KindredError>;
}
