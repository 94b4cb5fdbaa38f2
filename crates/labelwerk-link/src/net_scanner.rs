// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Network discovery scanner: UDP identity probe plus mDNS browse.
//
// The UDP leg broadcasts the identity probe on the discovery port and
// collects KEY=VALUE replies until the window closes. The mDNS leg
// browses the raw-printing service type in parallel; resolved services
// are translated into the same data-map shape so the registry cannot
// tell the legs apart. mDNS events arrive on the daemon's own thread
// and are forwarded into the session channel with blocking sends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use labelwerk_core::{DataMap, LinkConfig, data_keys};

use crate::discovery::{DiscoveryScanner, ScanEvent};
use crate::handshake::{HANDSHAKE_PROBE, MAX_REPLY_BYTES};

const MDNS_RAW_SERVICE: &str = "_pdl-datastream._tcp.local.";

/// Scans the local network for printers over UDP broadcast and mDNS.
pub struct NetworkScanner {
    probe_host: String,
    probe_port: u16,
    browse_mdns: bool,
}

impl NetworkScanner {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            probe_host: "255.255.255.255".into(),
            probe_port: config.discovery_port,
            browse_mdns: true,
        }
    }

    /// Probe a single host instead of the broadcast address, with the
    /// mDNS leg disabled. Used for diagnostics against a known printer.
    pub fn directed(host: impl Into<String>, port: u16) -> Self {
        Self {
            probe_host: host.into(),
            probe_port: port,
            browse_mdns: false,
        }
    }

    async fn probe_udp(
        &self,
        deadline: Instant,
        events: &mpsc::Sender<ScanEvent>,
    ) -> std::result::Result<(), String> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| format!("UDP bind failed: {e}"))?;
        socket
            .set_broadcast(true)
            .map_err(|e| format!("UDP broadcast mode failed: {e}"))?;
        socket
            .send_to(HANDSHAKE_PROBE, (self.probe_host.as_str(), self.probe_port))
            .await
            .map_err(|e| format!("UDP probe send failed: {e}"))?;
        debug!(host = %self.probe_host, port = self.probe_port, "sent discovery probe");

        let mut buf = vec![0u8; MAX_REPLY_BYTES];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
                Err(_) => break,
                Ok(Err(err)) => {
                    warn!(error = %err, "UDP receive failed; closing probe early");
                    break;
                }
                Ok(Ok((len, peer))) => match crate::handshake::parse_data_map(&buf[..len]) {
                    Ok(mut map) => {
                        map.entry(data_keys::ADDRESS.to_string())
                            .or_insert_with(|| peer.ip().to_string());
                        if events.send(ScanEvent::Found(map)).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(err) => {
                        warn!(peer = %peer, error = %err, "ignoring invalid discovery reply");
                    }
                },
            }
        }
        Ok(())
    }

    async fn browse_raw_service(&self, deadline: Instant, events: &mpsc::Sender<ScanEvent>) {
        let daemon = match ServiceDaemon::new() {
            Ok(daemon) => daemon,
            Err(err) => {
                warn!(error = %err, "mDNS daemon unavailable; skipping browse");
                return;
            }
        };
        let receiver = match daemon.browse(MDNS_RAW_SERVICE) {
            Ok(receiver) => receiver,
            Err(err) => {
                warn!(error = %err, "mDNS browse failed; skipping");
                let _ = daemon.shutdown();
                return;
            }
        };

        let forward = events.clone();
        std::thread::spawn(move || {
            while let Ok(event) = receiver.recv() {
                match event {
                    ServiceEvent::ServiceResolved(info) => {
                        debug!(service = %info.get_fullname(), "mDNS service resolved");
                        let map = service_data_map(&info);
                        if forward.blocking_send(ScanEvent::Found(map)).is_err() {
                            break;
                        }
                    }
                    ServiceEvent::SearchStopped(_) => break,
                    _ => {}
                }
            }
        });

        tokio::time::sleep(deadline.saturating_duration_since(Instant::now())).await;
        if let Err(err) = daemon.stop_browse(MDNS_RAW_SERVICE) {
            warn!(error = %err, "mDNS stop_browse failed");
        }
        if let Err(err) = daemon.shutdown() {
            warn!(error = %err, "mDNS daemon shutdown failed");
        }
    }
}

#[async_trait]
impl DiscoveryScanner for NetworkScanner {
    async fn scan(&self, window: Duration, events: mpsc::Sender<ScanEvent>) {
        let deadline = Instant::now() + window;
        let probe = self.probe_udp(deadline, &events);
        let outcome = if self.browse_mdns {
            let (outcome, ()) = tokio::join!(probe, self.browse_raw_service(deadline, &events));
            outcome
        } else {
            probe.await
        };
        match outcome {
            // Broadcast failure fails the session; mDNS trouble only warns.
            Err(detail) => {
                let _ = events.send(ScanEvent::Error(detail)).await;
            }
            Ok(()) => {
                let _ = events.send(ScanEvent::Finished).await;
            }
        }
    }
}

fn service_data_map(info: &ServiceInfo) -> DataMap {
    let mut map = DataMap::new();
    let address = info
        .get_addresses()
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| info.get_addresses().iter().next());
    if let Some(ip) = address {
        map.insert(data_keys::ADDRESS.to_string(), ip.to_string());
    }
    let product = info
        .get_property_val_str("ty")
        .or_else(|| info.get_property_val_str("product"))
        .map(str::to_owned)
        .unwrap_or_else(|| instance_name(info.get_fullname()).to_string());
    map.insert(data_keys::PRODUCT_NAME.to_string(), product);
    if let Some(serial) = info.get_property_val_str("serial") {
        map.insert(data_keys::SERIAL_NUMBER.to_string(), serial.to_string());
    }
    map
}

fn instance_name(fullname: &str) -> &str {
    fullname
        .strip_suffix(MDNS_RAW_SERVICE)
        .map(|name| name.trim_end_matches('.'))
        .unwrap_or(fullname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_name_strips_service_suffix() {
        assert_eq!(
            instance_name("Front Desk ZD420._pdl-datastream._tcp.local."),
            "Front Desk ZD420"
        );
        assert_eq!(instance_name("bare-name"), "bare-name");
    }

    #[test]
    fn resolved_service_maps_to_announcement_attributes() {
        let props = [("ty", "ZD420"), ("serial", "D2J185007015")];
        let info = ServiceInfo::new(
            MDNS_RAW_SERVICE,
            "Dock Printer",
            "dock.local.",
            "192.168.1.50",
            9100,
            &props[..],
        )
        .unwrap();
        let map = service_data_map(&info);
        assert_eq!(map.get(data_keys::PRODUCT_NAME).unwrap(), "ZD420");
        assert_eq!(map.get(data_keys::SERIAL_NUMBER).unwrap(), "D2J185007015");
        assert_eq!(map.get(data_keys::ADDRESS).unwrap(), "192.168.1.50");
    }

    #[test]
    fn resolved_service_without_txt_falls_back_to_instance_name() {
        let props: [(&str, &str); 0] = [];
        let info = ServiceInfo::new(
            MDNS_RAW_SERVICE,
            "Warehouse ZT411",
            "warehouse.local.",
            "192.168.1.51",
            9100,
            &props[..],
        )
        .unwrap();
        let map = service_data_map(&info);
        assert_eq!(map.get(data_keys::PRODUCT_NAME).unwrap(), "Warehouse ZT411");
    }

    #[tokio::test]
    async fn directed_probe_collects_replies() {
        let responder = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = responder.local_addr().unwrap().port();
        responder
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let server = std::thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (len, peer) = responder.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..len], HANDSHAKE_PROBE);
            responder
                .send_to(b"PRODUCT_NAME=ZT411\r\nSERIAL_NUMBER=99J000123\r\n\r\n", peer)
                .unwrap();
        });

        let scanner = NetworkScanner::directed("127.0.0.1", port);
        let (tx, mut rx) = mpsc::channel(16);
        scanner.scan(Duration::from_millis(400), tx).await;
        server.join().unwrap();

        let mut found = Vec::new();
        let mut finished = false;
        while let Some(event) = rx.recv().await {
            match event {
                ScanEvent::Found(map) => found.push(map),
                ScanEvent::Finished => finished = true,
                ScanEvent::Error(detail) => panic!("unexpected failure: {detail}"),
            }
        }
        assert!(finished);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get(data_keys::PRODUCT_NAME).unwrap(), "ZT411");
        assert_eq!(found[0].get(data_keys::ADDRESS).unwrap(), "127.0.0.1");
    }
}
