// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Labelwerk.

use thiserror::Error;

/// Top-level error type for all Labelwerk operations.
#[derive(Debug, Error)]
pub enum LabelwerkError {
    // -- Command validation --
    #[error("validation failed: {0}")]
    Validation(String),

    // -- Link errors --
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("transport write failed: {0}")]
    TransportWrite(String),

    #[error("handshake decode failed: {0}")]
    Decode(String),

    // -- Discovery --
    #[error("printer discovery failed: {0}")]
    Discovery(String),

    // -- Dispatch --
    #[error("command deadline exceeded: {0}")]
    Timeout(String),

    #[error("dispatcher at capacity: {0}")]
    Busy(String),

    // -- Storage / serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LabelwerkError>;
