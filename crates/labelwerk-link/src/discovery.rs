// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Discovery sessions: one scanner feeding one registry through one channel.
//
// Scanners run wherever they like (async tasks, blocking threads, mDNS
// daemon callbacks); their events all funnel into the session's mpsc
// channel and are consumed on a single logical timeline, so registry
// mutation is never concurrent. Every session is stamped with a fresh id;
// starting a new session supersedes the old one, whose remaining events
// are discarded by id comparison.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use labelwerk_core::{DataMap, LabelwerkError, PrinterDescriptor, Result, SessionId};

use crate::registry::PrinterRegistry;

/// One unit of progress from a scanner.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// A printer answered; attributes as announced.
    Found(DataMap),
    /// The scan window closed normally.
    Finished,
    /// The scan failed; no partial results are guaranteed.
    Error(String),
}

/// Enumerates one transport family for reachable printers.
///
/// Contract: zero or more `Found` events, then exactly one `Finished` or
/// `Error`. A failed send means the session is gone; stop scanning.
#[async_trait]
pub trait DiscoveryScanner: Send + Sync {
    async fn scan(&self, window: Duration, events: mpsc::Sender<ScanEvent>);
}

struct ScanState {
    current: Option<SessionId>,
    registry: PrinterRegistry,
    last_completed: Option<DateTime<Utc>>,
}

enum EventOutcome {
    Continue,
    Superseded,
    Finished(Vec<PrinterDescriptor>),
    Errored(String),
}

/// Owns the registry and serializes discovery sessions over it.
#[derive(Clone)]
pub struct DiscoveryCoordinator {
    state: Arc<Mutex<ScanState>>,
}

impl DiscoveryCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScanState {
                current: None,
                registry: PrinterRegistry::new(),
                last_completed: None,
            })),
        }
    }

    /// Run one discovery session to completion.
    ///
    /// Clears the registry, drives the scanner's events into it, and
    /// returns the final snapshot on `Finished`. A session superseded by a
    /// newer one stops mutating the registry and reports a discovery error.
    pub async fn run(
        &self,
        scanner: Arc<dyn DiscoveryScanner>,
        window: Duration,
    ) -> Result<Vec<PrinterDescriptor>> {
        let session = SessionId::new();
        {
            let mut state = self.lock();
            state.current = Some(session);
            state.registry.clear();
        }
        info!(session = %session, window_ms = window.as_millis() as u64, "discovery session started");

        let (tx, mut rx) = mpsc::channel(64);
        let _scan_task = tokio::spawn(async move {
            scanner.scan(window, tx).await;
        });

        while let Some(event) = rx.recv().await {
            match self.apply_event(session, event) {
                EventOutcome::Continue => {}
                EventOutcome::Superseded => {
                    debug!(session = %session, "stale discovery event; session superseded");
                    return Err(LabelwerkError::Discovery(
                        "session superseded by a newer scan".into(),
                    ));
                }
                EventOutcome::Finished(snapshot) => {
                    info!(session = %session, found = snapshot.len(), "discovery session finished");
                    return Ok(snapshot);
                }
                EventOutcome::Errored(detail) => {
                    warn!(session = %session, error = %detail, "discovery session failed");
                    return Err(LabelwerkError::Discovery(detail));
                }
            }
        }

        // Channel closed without a terminal event: the scanner died.
        Err(LabelwerkError::Discovery(
            "scanner ended without completing the session".into(),
        ))
    }

    /// Snapshot of the most recent session's registry.
    pub fn printers(&self) -> Vec<PrinterDescriptor> {
        self.lock().registry.snapshot()
    }

    /// When the last session finished, if any has.
    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        self.lock().last_completed
    }

    fn apply_event(&self, session: SessionId, event: ScanEvent) -> EventOutcome {
        let mut state = self.lock();
        if state.current != Some(session) {
            return EventOutcome::Superseded;
        }
        match event {
            ScanEvent::Found(map) => {
                let descriptor = PrinterDescriptor::from_data_map(&map);
                if state.registry.add_if_absent(descriptor) {
                    debug!(total = state.registry.len(), "printer added to registry");
                }
                EventOutcome::Continue
            }
            ScanEvent::Finished => {
                state.current = None;
                state.last_completed = Some(Utc::now());
                EventOutcome::Finished(state.registry.snapshot())
            }
            ScanEvent::Error(detail) => {
                state.current = None;
                EventOutcome::Errored(detail)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().expect("scan state lock poisoned")
    }
}

impl Default for DiscoveryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
