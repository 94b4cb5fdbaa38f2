// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk — Core types and error definitions shared across all crates.

pub mod config;
pub mod envelope;
pub mod error;
pub mod types;

pub use config::{BackpressurePolicy, LinkConfig};
pub use envelope::ResultEnvelope;
pub use error::{LabelwerkError, Result};
pub use types::*;
