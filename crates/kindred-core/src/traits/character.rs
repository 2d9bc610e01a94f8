// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Character lookup.

use async_trait::async_trait;

use crate::error::KindredError;
use crate::types::Character;

/// Resolves character metadata for a conversation.
#[async_trait]
pub trait CharacterProvider: Send + Sync + 'static {
    /// Fetch a character visible to `user_id`.
    ///
    /// Returns [`KindredError::NotFound`] when the id is unknown.
    async fn get(&self, id: u64, user_id: Option<&str>) -> Result<Character, KindredError>;
}
