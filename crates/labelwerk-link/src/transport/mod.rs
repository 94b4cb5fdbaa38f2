// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer transport contract and the production factory.
//
// Transports are deliberately blocking: every command runs its link I/O on a
// worker thread, so the trait stays simple and the implementations map
// directly onto socket and tty calls. Async orchestration lives above, in
// the dispatcher.

pub mod bluetooth;
pub mod tcp;

use labelwerk_core::{ConnectionTarget, LabelwerkError, LinkConfig, Result};

pub use bluetooth::BluetoothTransport;
pub use tcp::TcpTransport;

/// A duplex byte link to one printer. One instance per command, never
/// shared, never reused.
pub trait Transport: Send + std::fmt::Debug {
    /// Establish the link. Fails with `Connection`.
    fn open(&mut self) -> Result<()>;

    /// Whether the link is currently established.
    fn is_connected(&self) -> bool;

    /// Send a raw payload. Fails with `TransportWrite` once the link is
    /// open; writing on an unopened link is a `Connection` failure.
    fn write(&mut self, payload: &[u8]) -> Result<()>;

    /// Write a probe and read the printer's reply, used only by the
    /// handshake decoder. I/O failures here are `Connection` failures;
    /// whether the reply parses is the decoder's business.
    fn exchange(&mut self, probe: &[u8], max_reply: usize) -> Result<Vec<u8>>;

    /// Release the link. Idempotent; must be called on every exit path,
    /// including after a failed open or write.
    fn close(&mut self);
}

/// Builds transports from validated connection targets.
///
/// Injected into the dispatcher so tests swap in fakes; no global state.
pub trait TransportFactory: Send + Sync {
    fn create(&self, target: &ConnectionTarget) -> Result<Box<dyn Transport>>;
}

/// Run `body` against a freshly opened transport, guaranteeing `close()` on
/// every exit path after creation: open failure, body failure, or success.
pub fn with_transport<T>(
    factory: &dyn TransportFactory,
    target: &ConnectionTarget,
    body: impl FnOnce(&mut dyn Transport) -> Result<T>,
) -> Result<T> {
    let mut transport = factory.create(target)?;
    let outcome = transport.open().and_then(|_| body(transport.as_mut()));
    transport.close();
    outcome
}

/// Production factory backed by the real TCP and Bluetooth links.
pub struct LinkTransportFactory {
    config: LinkConfig,
}

impl LinkTransportFactory {
    pub fn new(config: LinkConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for LinkTransportFactory {
    fn create(&self, target: &ConnectionTarget) -> Result<Box<dyn Transport>> {
        target.validate()?;
        match target {
            ConnectionTarget::Tcp { host, port } => Ok(Box::new(TcpTransport::new(
                host.clone(),
                *port,
                &self.config,
            ))),
            ConnectionTarget::Bluetooth { mac } => Ok(Box::new(BluetoothTransport::new(
                mac.clone(),
                &self.config,
            ))),
            // USB is a discovery family only; nothing prints over it.
            ConnectionTarget::Usb { device_ref } => Err(LabelwerkError::Connection(format!(
                "USB target {device_ref} is discovery-only; printing over USB is not supported"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFactory;
    use labelwerk_core::LabelwerkError;

    #[test]
    fn factory_rejects_usb_targets() {
        let factory = LinkTransportFactory::new(LinkConfig::default());
        let err = factory
            .create(&ConnectionTarget::usb("usb:0a5f:0166"))
            .unwrap_err();
        assert!(matches!(err, LabelwerkError::Connection(_)));
    }

    #[test]
    fn factory_validates_before_building() {
        let factory = LinkTransportFactory::new(LinkConfig::default());
        let err = factory
            .create(&ConnectionTarget::bluetooth("not-a-mac"))
            .unwrap_err();
        assert!(matches!(err, LabelwerkError::Validation(_)));
    }

    #[test]
    fn with_transport_closes_after_body_failure() {
        let factory = FakeFactory::healthy().with_write_error("printer hung up");
        let target = ConnectionTarget::tcp("10.0.0.5", None);
        let outcome = with_transport(&factory, &target, |link| link.write(b"^XA^XZ"));
        assert!(matches!(outcome, Err(LabelwerkError::TransportWrite(_))));
        assert_eq!(factory.calls().opens(), 1);
        assert_eq!(factory.calls().closes(), 1);
    }

    #[test]
    fn with_transport_closes_after_open_failure() {
        let factory = FakeFactory::healthy().with_open_error("unreachable");
        let target = ConnectionTarget::tcp("10.0.0.5", None);
        let outcome = with_transport(&factory, &target, |link| link.write(b"^XA^XZ"));
        assert!(matches!(outcome, Err(LabelwerkError::Connection(_))));
        assert_eq!(factory.calls().writes(), 0);
        assert_eq!(factory.calls().closes(), 1);
    }
}
