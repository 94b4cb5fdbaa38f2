// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Link and dispatch configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::types::DEFAULT_ZPL_PORT;

/// What happens to a command submitted while all workers are busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Wait for a worker permit.
    Queue,
    /// Answer immediately with a capacity error.
    Reject,
}

/// Persistent engine settings.
///
/// Durations are stored as integer milliseconds so the file stays editable
/// by hand; use the accessor methods in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Raw-ZPL TCP port used when the caller does not specify one.
    pub default_zpl_port: u16,
    /// UDP port probed by network discovery broadcasts.
    pub discovery_port: u16,
    pub connect_timeout_ms: u64,
    pub io_timeout_ms: u64,
    /// Post-write settle delay on the Bluetooth link, letting the printer
    /// buffer drain before success is reported.
    pub bluetooth_settle_ms: u64,
    /// How long a discovery session collects replies.
    pub discovery_window_ms: u64,
    /// Deadline for one dispatched command, discovery included.
    pub command_timeout_ms: u64,
    /// Upper bound on concurrently running commands.
    pub max_concurrent_commands: usize,
    pub backpressure: BackpressurePolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            default_zpl_port: DEFAULT_ZPL_PORT,
            discovery_port: 4201,
            connect_timeout_ms: 10_000,
            io_timeout_ms: 60_000,
            bluetooth_settle_ms: 500,
            discovery_window_ms: 5_000,
            command_timeout_ms: 30_000,
            max_concurrent_commands: 8,
            backpressure: BackpressurePolicy::Queue,
        }
    }
}

impl LinkConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn bluetooth_settle(&self) -> Duration {
        Duration::from_millis(self.bluetooth_settle_ms)
    }

    pub fn discovery_window(&self) -> Duration {
        Duration::from_millis(self.discovery_window_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
