// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Kindred chat relay.

use thiserror::Error;

/// The primary error type used across all collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum KindredError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// External service errors (generation, transcription, synthesis).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A looked-up entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Socket or server transport failure.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Malformed or unrecognized client frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KindredError {
    /// Shorthand for a [`KindredError::NotFound`] on a character id.
    pub fn character_not_found(id: u64) -> Self {
        KindredError::NotFound {
            kind: "character".to_string(),
            id: id.to_string(),
        }
    }

    /// Returns true if this error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, KindredError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_kind_and_id() {
        let err = KindredError::character_not_found(42);
        assert_eq!(err.to_string(), "character not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn timeout_display_includes_duration() {
        let err = KindredError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        assert!(err.to_string().contains("30s"));
        assert!(!err.is_not_found());
    }
}
