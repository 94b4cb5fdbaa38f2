// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB discovery scanner.
//
// Enumerates the USB bus and reports attached printers matching the
// Zebra vendor id. Enumeration is a blocking OS call, so it runs on the
// blocking pool; results enter the same session channel as the network
// legs. USB links are discovery-only here: the reported address names
// the device, it is not a printable target.

use std::time::Duration;

use async_trait::async_trait;
use nusb::MaybeFuture;
use tokio::sync::mpsc;
use tracing::debug;

use labelwerk_core::{DataMap, data_keys};

use crate::discovery::{DiscoveryScanner, ScanEvent};

const ZEBRA_VENDOR_ID: u16 = 0x0A5F;

/// Scans the USB bus for attached label printers.
pub struct UsbScanner {
    vendor_id: u16,
}

impl UsbScanner {
    pub fn new() -> Self {
        Self {
            vendor_id: ZEBRA_VENDOR_ID,
        }
    }
}

impl Default for UsbScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscoveryScanner for UsbScanner {
    async fn scan(&self, _window: Duration, events: mpsc::Sender<ScanEvent>) {
        let listing = tokio::task::spawn_blocking(|| {
            nusb::list_devices()
                .wait()
                .map(|devices| devices.collect::<Vec<_>>())
        })
        .await;

        let devices = match listing {
            Ok(Ok(devices)) => devices,
            Ok(Err(err)) => {
                let detail = format!("USB enumeration failed: {err}");
                let _ = events.send(ScanEvent::Error(detail)).await;
                return;
            }
            Err(err) => {
                let detail = format!("USB enumeration task failed: {err}");
                let _ = events.send(ScanEvent::Error(detail)).await;
                return;
            }
        };

        for device in devices {
            if device.vendor_id() != self.vendor_id {
                continue;
            }
            debug!(
                vendor_id = device.vendor_id(),
                product_id = device.product_id(),
                "USB printer matched vendor filter"
            );
            let map = device_data_map(&device);
            if events.send(ScanEvent::Found(map)).await.is_err() {
                return;
            }
        }
        let _ = events.send(ScanEvent::Finished).await;
    }
}

fn device_data_map(device: &nusb::DeviceInfo) -> DataMap {
    let mut map = DataMap::new();
    let product = device
        .product_string()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Zebra {:04x}", device.product_id()));
    map.insert(data_keys::PRODUCT_NAME.to_string(), product);
    let mut address = format!(
        "usb:{:04x}:{:04x}",
        device.vendor_id(),
        device.product_id()
    );
    if let Some(serial) = device.serial_number() {
        map.insert(data_keys::SERIAL_NUMBER.to_string(), serial.to_string());
        address.push(':');
        address.push_str(serial);
    }
    map.insert(data_keys::ADDRESS.to_string(), address);
    map
}

// Enumeration needs an attached device, so this scanner has no unit
// tests; session behaviour is covered through the scripted scanner.
