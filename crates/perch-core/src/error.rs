// SPDX-FileCopyrightText: 2026 Perch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Perch post scheduler.

use thiserror::Error;

/// The primary error type used across Perch trait boundaries and core operations.
#[derive(Debug, Error)]
pub enum PerchError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Agent errors (worker unreachable, malformed response, platform failure).
    #[error("agent error: {message}")]
    Agent {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A requested entity does not exist.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PerchError {
    /// Wrap an arbitrary error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PerchError::Storage {
            source: Box::new(source),
        }
    }

    /// Build an agent error from a message only.
    pub fn agent<M: Into<String>>(message: M) -> Self {
        PerchError::Agent {
            message: message.into(),
            source: None,
        }
    }
}
