// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Result delivery: the marshaling boundary between worker tasks and the
// caller's callback surface.
//
// Commands complete on whatever worker task ran them, but sinks are
// invoked from exactly one delivery task, in completion order.  Sinks
// are consumed by delivery, so a command cannot be answered twice.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use labelwerk_core::ResultEnvelope;

/// Consume-once callback surface for one command's result.
///
/// Mirrors the host side's result object: exactly one of the three
/// methods is invoked, exactly once, from the delivery task.
pub trait ResultSink: Send {
    fn success(self: Box<Self>, envelope: ResultEnvelope);
    fn error(self: Box<Self>, code: String, message: String, details: Option<String>);
    fn not_implemented(self: Box<Self>);
}

/// One command's outcome, in transit to its sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Success {
        envelope: ResultEnvelope,
    },
    Error {
        code: String,
        message: String,
        details: Option<String>,
    },
    NotImplemented,
}

fn hand_off(sink: Box<dyn ResultSink>, delivery: Delivery) {
    match delivery {
        Delivery::Success { envelope } => sink.success(envelope),
        Delivery::Error {
            code,
            message,
            details,
        } => sink.error(code, message, details),
        Delivery::NotImplemented => sink.not_implemented(),
    }
}

/// Funnel feeding every result through one delivery task.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<(Box<dyn ResultSink>, Delivery)>,
}

impl DeliveryQueue {
    /// Spawn the delivery task on the current runtime and return its
    /// sending handle.
    pub fn start() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Box<dyn ResultSink>, Delivery)>();
        tokio::spawn(async move {
            while let Some((sink, delivery)) = rx.recv().await {
                hand_off(sink, delivery);
            }
            debug!("delivery queue closed; task exiting");
        });
        Self { tx }
    }

    /// Enqueue one result. Order of invocation matches order of calls.
    pub fn deliver(&self, sink: Box<dyn ResultSink>, delivery: Delivery) {
        if self.tx.send((sink, delivery)).is_err() {
            warn!("delivery task stopped; result dropped");
        }
    }
}

/// Sink that resolves a oneshot with whatever was delivered. Test aid
/// for callers that want to await a command's result in place.
pub struct CollectingSink {
    tx: oneshot::Sender<Delivery>,
}

impl CollectingSink {
    pub fn pair() -> (Box<CollectingSink>, oneshot::Receiver<Delivery>) {
        let (tx, rx) = oneshot::channel();
        (Box::new(CollectingSink { tx }), rx)
    }
}

impl ResultSink for CollectingSink {
    fn success(self: Box<Self>, envelope: ResultEnvelope) {
        let _ = self.tx.send(Delivery::Success { envelope });
    }

    fn error(self: Box<Self>, code: String, message: String, details: Option<String>) {
        let _ = self.tx.send(Delivery::Error {
            code,
            message,
            details,
        });
    }

    fn not_implemented(self: Box<Self>) {
        let _ = self.tx.send(Delivery::NotImplemented);
    }
}
