// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bluetooth printer link over RFCOMM (Serial Port Profile).
//
// The MAC address is resolved to a bound /dev/rfcommN device node via the
// kernel's rfcomm table, the tty is switched to raw mode so binary ZPL
// passes through untouched, and writes are chunked to keep the Bluetooth
// buffer from overflowing. After the payload is written the link sleeps for
// the configured settle delay before reporting success; label printers need
// the pause to drain their buffer. The link is write-only: identity
// handshakes happen over TCP.

use std::fs::File;
use std::io::Write;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use labelwerk_core::{LabelwerkError, LinkConfig, Result};

use super::Transport;

/// Kernel table listing bound RFCOMM devices.
#[cfg(unix)]
const RFCOMM_TABLE: &str = "/proc/net/rfcomm";

/// Chunk size for RFCOMM writes.
const WRITE_CHUNK: usize = 4096;

/// Pause between chunks so the Bluetooth buffer keeps up.
const CHUNK_DELAY: Duration = Duration::from_millis(2);

#[derive(Debug)]
pub struct BluetoothTransport {
    mac: String,
    settle: Duration,
    device: Option<File>,
}

impl BluetoothTransport {
    /// Build an unopened link; `open` resolves and opens the device node.
    pub fn new(mac: String, config: &LinkConfig) -> Self {
        Self {
            mac,
            settle: config.bluetooth_settle(),
            device: None,
        }
    }

    #[cfg(unix)]
    fn open_device(&self) -> Result<File> {
        use std::os::unix::io::AsRawFd;

        let table = std::fs::read_to_string(RFCOMM_TABLE).unwrap_or_default();
        let path = rfcomm_device_for_mac(&table, &self.mac).ok_or_else(|| {
            LabelwerkError::Connection(format!(
                "no RFCOMM binding for {}; bind one with `rfcomm bind`",
                self.mac
            ))
        })?;

        info!(mac = %self.mac, device = %path, "opening Bluetooth RFCOMM link");
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| LabelwerkError::Connection(format!("open {path}: {e}")))?;
        configure_tty_raw(file.as_raw_fd())?;
        Ok(file)
    }

    #[cfg(not(unix))]
    fn open_device(&self) -> Result<File> {
        Err(LabelwerkError::Connection(
            "Bluetooth RFCOMM links require a Unix host".into(),
        ))
    }
}

impl Transport for BluetoothTransport {
    fn open(&mut self) -> Result<()> {
        let file = self.open_device()?;
        self.device = Some(file);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        let total = payload.len();
        let settle = self.settle;
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| LabelwerkError::Connection("Bluetooth link not open".into()))?;

        let mut sent = 0usize;
        for chunk in payload.chunks(WRITE_CHUNK) {
            device.write_all(chunk).map_err(|e| {
                LabelwerkError::TransportWrite(format!("RFCOMM send failed at byte {sent}: {e}"))
            })?;
            sent += chunk.len();
            debug!(sent, total, "RFCOMM progress");
            if sent < total {
                thread::sleep(CHUNK_DELAY);
            }
        }
        device
            .flush()
            .map_err(|e| LabelwerkError::TransportWrite(format!("RFCOMM flush: {e}")))?;

        // Give the printer buffer time to drain before claiming success.
        thread::sleep(settle);
        info!(total, settle_ms = settle.as_millis() as u64, "RFCOMM payload sent");
        Ok(())
    }

    fn exchange(&mut self, _probe: &[u8], _max_reply: usize) -> Result<Vec<u8>> {
        Err(LabelwerkError::Connection(
            "Bluetooth link is write-only; identity handshakes run over TCP".into(),
        ))
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            debug!(mac = %self.mac, "Bluetooth RFCOMM link closed");
        }
    }
}

/// Find the bound device path for a MAC in rfcomm-table text.
///
/// Lines look like `rfcomm0: 00:11:62:AA:BB:CC channel 1 clean`.
fn rfcomm_device_for_mac(table: &str, mac: &str) -> Option<String> {
    let mac_upper = mac.to_uppercase();
    for line in table.lines() {
        if line.to_uppercase().contains(&mac_upper) {
            if let Some(dev_name) = line.split(':').next() {
                return Some(format!("/dev/{}", dev_name.trim()));
            }
        }
    }
    None
}

/// Switch the RFCOMM tty to raw mode: no input/output processing, no echo,
/// no canonical buffering, no XON/XOFF (0x11/0x13 appear in binary labels),
/// 8-bit characters.
#[cfg(unix)]
fn configure_tty_raw(fd: i32) -> Result<()> {
    use std::mem::MaybeUninit;

    let mut termios = MaybeUninit::uninit();
    let rc = unsafe { libc::tcgetattr(fd, termios.as_mut_ptr()) };
    if rc != 0 {
        return Err(LabelwerkError::Connection(format!(
            "tcgetattr failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    let mut termios = unsafe { termios.assume_init() };

    termios.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON
        | libc::IXOFF
        | libc::IXANY);
    termios.c_oflag &= !libc::OPOST;
    termios.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB);
    termios.c_cflag |= libc::CS8;

    let rc = unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) };
    if rc != 0 {
        return Err(LabelwerkError::Connection(format!(
            "tcsetattr failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}
