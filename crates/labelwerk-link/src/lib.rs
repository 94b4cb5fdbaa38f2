// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk Link — printer transports, handshake decoding, and discovery.
// This crate bridges between the core domain types defined in
// `labelwerk-core` and the actual printer links: raw TCP, Bluetooth RFCOMM,
// UDP/mDNS network discovery, and USB enumeration.

pub mod discovery;
pub mod handshake;
pub mod net_scanner;
pub mod registry;
pub mod testing;
pub mod transport;
pub mod usb_scanner;

pub use discovery::{DiscoveryCoordinator, DiscoveryScanner, ScanEvent};
pub use net_scanner::NetworkScanner;
pub use registry::PrinterRegistry;
pub use transport::{LinkTransportFactory, Transport, TransportFactory, with_transport};
pub use usb_scanner::UsbScanner;
