// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Labelwerk printer link engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{LabelwerkError, Result};

/// TCP port label printers listen on for raw ZPL when none is given.
pub const DEFAULT_ZPL_PORT: u16 = 6101;

/// Placeholder reported for attributes a printer did not announce.
pub const NOT_AVAILABLE: &str = "N/A";

/// Flat attribute map produced by the handshake decoder.
///
/// Keys are the canonical uppercase names in [`data_keys`]; iteration order
/// is deterministic so snapshots and logs are stable.
pub type DataMap = BTreeMap<String, String>;

/// Canonical attribute keys reported by a printer during the handshake.
pub mod data_keys {
    pub const ADDRESS: &str = "ADDRESS";
    pub const SERIAL_NUMBER: &str = "SERIAL_NUMBER";
    pub const AVAILABLE_INTERFACES: &str = "AVAILABLE_INTERFACES";
    pub const AVAILABLE_LANGUAGES: &str = "AVAILABLE_LANGUAGES";
    pub const DARKNESS: &str = "DARKNESS";
    pub const JSON_PORT_NUMBER: &str = "JSON_PORT_NUMBER";
    pub const PRODUCT_NAME: &str = "PRODUCT_NAME";
    pub const FIRMWARE_VER: &str = "FIRMWARE_VER";
    pub const LINK_OS_MAJOR_VER: &str = "LINK_OS_MAJOR_VER";
    pub const PRIMARY_LANGUAGE: &str = "PRIMARY_LANGUAGE";
}

/// Unique identifier for a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandId(pub Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a discovery session.
///
/// Events carrying a session id other than the coordinator's current one are
/// stale and must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport families a discovery session can scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportFamily {
    Network,
    Usb,
}

impl std::fmt::Display for TransportFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Usb => write!(f, "usb"),
        }
    }
}

/// A printer found during discovery or interrogated over a live connection.
///
/// Field names are the wire contract; absent attributes are omitted from
/// serialized JSON rather than emitted as nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterDescriptor {
    /// Primary dedup key within a discovery session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_interfaces: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_languages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub darkness: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_port_number: Option<String>,
    #[serde(rename = "firmwareVer", skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
    #[serde(rename = "linkOSMajorVer", skip_serializing_if = "Option::is_none")]
    pub link_os_major_version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_language: Option<String>,
}

impl PrinterDescriptor {
    /// Build a descriptor from a decoded handshake attribute map.
    ///
    /// Attributes the printer did not report stay `None`; a malformed
    /// Link-OS version is treated as unreported.
    pub fn from_data_map(map: &DataMap) -> Self {
        let field = |key: &str| map.get(key).cloned();
        Self {
            address: field(data_keys::ADDRESS),
            product_name: field(data_keys::PRODUCT_NAME),
            serial_number: field(data_keys::SERIAL_NUMBER),
            available_interfaces: field(data_keys::AVAILABLE_INTERFACES),
            available_languages: field(data_keys::AVAILABLE_LANGUAGES),
            darkness: field(data_keys::DARKNESS),
            json_port_number: field(data_keys::JSON_PORT_NUMBER),
            firmware_version: field(data_keys::FIRMWARE_VER),
            link_os_major_version: map
                .get(data_keys::LINK_OS_MAJOR_VER)
                .and_then(|raw| raw.parse().ok()),
            primary_language: field(data_keys::PRIMARY_LANGUAGE),
        }
    }

    /// Substitute `"N/A"` for every unreported string attribute.
    ///
    /// Applied only on the printer-info path; discovery snapshots carry
    /// attributes exactly as reported.
    pub fn with_na_defaults(mut self) -> Self {
        let na = || Some(NOT_AVAILABLE.to_string());
        self.address = self.address.or_else(na);
        self.product_name = self.product_name.or_else(na);
        self.serial_number = self.serial_number.or_else(na);
        self.available_interfaces = self.available_interfaces.or_else(na);
        self.available_languages = self.available_languages.or_else(na);
        self.darkness = self.darkness.or_else(na);
        self.json_port_number = self.json_port_number.or_else(na);
        self
    }

    /// Dedup key for the registry; descriptors without an address share one.
    pub fn address_key(&self) -> &str {
        self.address.as_deref().unwrap_or("")
    }
}

/// Structural check for a Bluetooth MAC: six colon-separated hex octets.
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Where a command's transport should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Tcp { host: String, port: u16 },
    Bluetooth { mac: String },
    Usb { device_ref: String },
}

impl ConnectionTarget {
    /// TCP target; the well-known ZPL port applies when none is given.
    pub fn tcp(host: impl Into<String>, port: Option<u16>) -> Self {
        Self::Tcp {
            host: host.into(),
            port: port.unwrap_or(DEFAULT_ZPL_PORT),
        }
    }

    pub fn bluetooth(mac: impl Into<String>) -> Self {
        Self::Bluetooth { mac: mac.into() }
    }

    pub fn usb(device_ref: impl Into<String>) -> Self {
        Self::Usb {
            device_ref: device_ref.into(),
        }
    }

    /// Structural validation, run by the factory before any I/O.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Tcp { host, .. } if host.trim().is_empty() => Err(
                LabelwerkError::Validation("TCP host must not be empty".into()),
            ),
            Self::Bluetooth { mac } if !is_valid_mac(mac) => Err(LabelwerkError::Validation(
                format!("malformed Bluetooth MAC address: {mac}"),
            )),
            Self::Usb { device_ref } if device_ref.trim().is_empty() => Err(
                LabelwerkError::Validation("USB device reference must not be empty".into()),
            ),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Self::Bluetooth { mac } => write!(f, "bt://{mac}"),
            Self::Usb { device_ref } => write!(f, "usb://{device_ref}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> DataMap {
        let mut map = DataMap::new();
        map.insert(data_keys::ADDRESS.into(), "10.0.0.42".into());
        map.insert(data_keys::PRODUCT_NAME.into(), "ZD420".into());
        map.insert(data_keys::SERIAL_NUMBER.into(), "XXZKJ191500160".into());
        map.insert(data_keys::DARKNESS.into(), "15".into());
        map.insert(data_keys::LINK_OS_MAJOR_VER.into(), "6".into());
        map
    }

    #[test]
    fn descriptor_copies_reported_attributes() {
        let desc = PrinterDescriptor::from_data_map(&sample_map());
        assert_eq!(desc.address.as_deref(), Some("10.0.0.42"));
        assert_eq!(desc.product_name.as_deref(), Some("ZD420"));
        assert_eq!(desc.link_os_major_version, Some(6));
        assert_eq!(desc.available_languages, None);
    }

    #[test]
    fn unparseable_link_os_version_is_unreported() {
        let mut map = sample_map();
        map.insert(data_keys::LINK_OS_MAJOR_VER.into(), "six".into());
        let desc = PrinterDescriptor::from_data_map(&map);
        assert_eq!(desc.link_os_major_version, None);
    }

    #[test]
    fn na_defaults_fill_only_missing_strings() {
        let desc = PrinterDescriptor::from_data_map(&sample_map()).with_na_defaults();
        assert_eq!(desc.address.as_deref(), Some("10.0.0.42"));
        assert_eq!(desc.available_interfaces.as_deref(), Some(NOT_AVAILABLE));
        assert_eq!(desc.json_port_number.as_deref(), Some(NOT_AVAILABLE));
        // numeric attribute stays unreported rather than becoming "N/A"
        assert_eq!(desc.link_os_major_version, Some(6));
    }

    #[test]
    fn serialized_field_names_match_wire_contract() {
        let desc = PrinterDescriptor::from_data_map(&sample_map());
        let value = serde_json::to_value(&desc).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("productName"));
        assert!(obj.contains_key("serialNumber"));
        assert!(obj.contains_key("linkOSMajorVer"));
        assert!(!obj.contains_key("availableInterfaces"));
    }

    #[test]
    fn mac_validation_requires_six_hex_octets() {
        assert!(is_valid_mac("AC:3F:A4:1D:7A:5C"));
        assert!(is_valid_mac("ac:3f:a4:1d:7a:5c"));
        assert!(!is_valid_mac(""));
        assert!(!is_valid_mac("AC:3F:A4:1D:7A"));
        assert!(!is_valid_mac("AC:3F:A4:1D:7A:ZZ"));
        assert!(!is_valid_mac("AC-3F-A4-1D-7A-5C"));
    }

    #[test]
    fn tcp_target_defaults_to_zpl_port() {
        let target = ConnectionTarget::tcp("10.0.0.5", None);
        assert_eq!(
            target,
            ConnectionTarget::Tcp {
                host: "10.0.0.5".into(),
                port: DEFAULT_ZPL_PORT
            }
        );
        assert!(target.validate().is_ok());
    }

    #[test]
    fn empty_host_and_bad_mac_fail_validation() {
        assert!(ConnectionTarget::tcp("  ", None).validate().is_err());
        assert!(ConnectionTarget::bluetooth("not-a-mac").validate().is_err());
        assert!(
            ConnectionTarget::bluetooth("AC:3F:A4:1D:7A:5C")
                .validate()
                .is_ok()
        );
    }
}
