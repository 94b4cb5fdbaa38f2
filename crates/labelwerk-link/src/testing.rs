// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scriptable fakes for the transport and discovery seams.
//
// Ships as a regular module rather than behind cfg(test) so that crates
// layered on top can drive their own tests through the same seams. The
// fakes record every call; tests assert on counts and captured bytes
// instead of reaching into link internals.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use labelwerk_core::{ConnectionTarget, DataMap, LabelwerkError, Result};

use crate::discovery::{DiscoveryScanner, ScanEvent};
use crate::transport::{Transport, TransportFactory};

/// Shared call counters for every transport a factory hands out.
#[derive(Clone, Debug, Default)]
pub struct TransportCalls {
    opens: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    exchanges: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl TransportCalls {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Default)]
struct Script {
    open_error: Option<String>,
    open_delay: Option<Duration>,
    write_error: Option<String>,
    exchange_reply: Option<Vec<u8>>,
    exchange_error: Option<String>,
}

/// In-memory transport following a factory-wide script.
#[derive(Debug)]
pub struct FakeTransport {
    script: Script,
    calls: TransportCalls,
    written: Arc<Mutex<Vec<u8>>>,
    connected: bool,
}

impl Transport for FakeTransport {
    fn open(&mut self) -> Result<()> {
        self.calls.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.script.open_delay {
            std::thread::sleep(delay);
        }
        if let Some(message) = &self.script.open_error {
            return Err(LabelwerkError::Connection(message.clone()));
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.calls.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.script.write_error {
            return Err(LabelwerkError::TransportWrite(message.clone()));
        }
        self.written
            .lock()
            .expect("fake write log poisoned")
            .extend_from_slice(payload);
        Ok(())
    }

    fn exchange(&mut self, _probe: &[u8], _max_reply: usize) -> Result<Vec<u8>> {
        self.calls.exchanges.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.script.exchange_error {
            return Err(LabelwerkError::Connection(message.clone()));
        }
        match &self.script.exchange_reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(LabelwerkError::Connection(
                "no scripted handshake reply".into(),
            )),
        }
    }

    fn close(&mut self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
    }
}

/// Factory producing [`FakeTransport`]s that share one script, one call
/// record, and one write log.
pub struct FakeFactory {
    script: Script,
    calls: TransportCalls,
    written: Arc<Mutex<Vec<u8>>>,
    targets: Arc<Mutex<Vec<ConnectionTarget>>>,
}

impl FakeFactory {
    /// A factory whose transports open, write, and close without fuss.
    pub fn healthy() -> Self {
        Self {
            script: Script::default(),
            calls: TransportCalls::default(),
            written: Arc::new(Mutex::new(Vec::new())),
            targets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_open_error(mut self, message: &str) -> Self {
        self.script.open_error = Some(message.into());
        self
    }

    /// Stall every `open()` by `delay` before following the script.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.script.open_delay = Some(delay);
        self
    }

    pub fn with_write_error(mut self, message: &str) -> Self {
        self.script.write_error = Some(message.into());
        self
    }

    pub fn with_exchange_reply(mut self, reply: Vec<u8>) -> Self {
        self.script.exchange_reply = Some(reply);
        self
    }

    pub fn with_exchange_error(mut self, message: &str) -> Self {
        self.script.exchange_error = Some(message.into());
        self
    }

    pub fn calls(&self) -> TransportCalls {
        self.calls.clone()
    }

    /// Every byte successfully written through any transport, in order.
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().expect("fake write log poisoned").clone()
    }

    /// Every target the factory was asked to build, in order.
    pub fn targets(&self) -> Vec<ConnectionTarget> {
        self.targets
            .lock()
            .expect("fake target log poisoned")
            .clone()
    }
}

impl TransportFactory for FakeFactory {
    fn create(&self, target: &ConnectionTarget) -> Result<Box<dyn Transport>> {
        target.validate()?;
        self.targets
            .lock()
            .expect("fake target log poisoned")
            .push(target.clone());
        Ok(Box::new(FakeTransport {
            script: self.script.clone(),
            calls: self.calls.clone(),
            written: Arc::clone(&self.written),
            connected: false,
        }))
    }
}

/// Scanner that replays a scripted event sequence.
pub struct FakeScanner {
    events: Vec<ScanEvent>,
    gate: Option<Arc<Notify>>,
}

impl FakeScanner {
    pub fn scripted(events: Vec<ScanEvent>) -> Self {
        Self { events, gate: None }
    }

    /// Hold the final event back until the gate is notified, letting tests
    /// order a slow scan against a competing one.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl DiscoveryScanner for FakeScanner {
    async fn scan(&self, _window: Duration, events: mpsc::Sender<ScanEvent>) {
        let last = self.events.len().saturating_sub(1);
        for (index, event) in self.events.iter().enumerate() {
            if index == last {
                if let Some(gate) = &self.gate {
                    gate.notified().await;
                }
            }
            if events.send(event.clone()).await.is_err() {
                return;
            }
        }
    }
}

/// Build a data map from literal pairs.
pub fn data_map(pairs: &[(&str, &str)]) -> DataMap {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
