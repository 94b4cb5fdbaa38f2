// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wire command parsing and validation.
//
// Method names, argument keys, error codes, and messages are a frozen
// wire contract shared with existing callers; none of them may drift.
// Validation happens here, before any admission or I/O, so a malformed
// call is answered without touching a printer.

use serde_json::Value;

/// Wire method names accepted by the dispatcher.
pub mod methods {
    pub const PRINT_ZPL_OVER_TCPIP: &str = "printZPLOverTCPIP";
    pub const PRINT_ZPL_OVER_BLUETOOTH: &str = "printZPLOverBluetooth";
    pub const ON_GET_PRINTER_INFO: &str = "onGetPrinterInfo";
    pub const IS_PRINTER_CONNECTED: &str = "isPrinterConnected";
    pub const ON_DISCOVERY: &str = "onDiscovery";
    pub const ON_DISCOVERY_USB: &str = "onDiscoveryUSB";
}

/// Wire error codes. The casing is inconsistent because the contract
/// predates this engine; it is preserved exactly.
pub mod codes {
    pub const PRINT_ZPL_OVER_TCPIP: &str = "PrintZPLOverTCPIP";
    pub const INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";
    pub const IS_PRINTER_CONNECTED: &str = "isPrinterConnected";
    pub const CONNECTION_FAILED: &str = "ConnectionError";
    pub const PRINT_ERROR: &str = "PRINT_ERROR";
    pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";
    pub const DISCOVERY_ERROR: &str = "DISCOVERY_ERROR";
    pub const DISCOVERY_FAILED: &str = "discoveryError";
    pub const DISCOVERY_USB_FAILED: &str = "discoveryUSBError";
    pub const COMMAND_REJECTED: &str = "COMMAND_REJECTED";
    pub const COMMAND_TIMEOUT: &str = "COMMAND_TIMEOUT";
}

/// A validated command, ready for admission.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PrintTcp {
        host: String,
        port: Option<u16>,
        data: String,
    },
    PrintBluetooth {
        mac: String,
        data: String,
    },
    PrinterInfo {
        host: String,
        port: Option<u16>,
    },
    IsConnected {
        host: String,
        port: Option<u16>,
    },
    DiscoverNetwork,
    DiscoverUsb,
}

/// Outcome of parsing a wire call.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Arguments check out; run it.
    Run(Command),
    /// A required argument is missing or empty; answer with this code and
    /// message without running anything.
    Invalid {
        code: &'static str,
        message: &'static str,
    },
    /// Method name not part of the surface.
    Unknown,
}

impl Command {
    /// Parse and validate one wire call.
    pub fn parse(method: &str, args: &Value) -> Parsed {
        match method {
            methods::PRINT_ZPL_OVER_TCPIP => {
                match (string_arg(args, "ip"), string_arg(args, "data")) {
                    (Some(host), Some(data)) => Parsed::Run(Command::PrintTcp {
                        host,
                        port: port_arg(args),
                        data,
                    }),
                    (None, _) => Parsed::Invalid {
                        code: codes::PRINT_ZPL_OVER_TCPIP,
                        message: "IP Address is required",
                    },
                    (_, None) => Parsed::Invalid {
                        code: codes::PRINT_ZPL_OVER_TCPIP,
                        message: "Data is required",
                    },
                }
            }
            methods::PRINT_ZPL_OVER_BLUETOOTH => {
                match (string_arg(args, "mac"), string_arg(args, "data")) {
                    (Some(mac), Some(data)) => {
                        Parsed::Run(Command::PrintBluetooth { mac, data })
                    }
                    _ => Parsed::Invalid {
                        code: codes::INVALID_ARGUMENTS,
                        message: "MAC Address and Data are required",
                    },
                }
            }
            methods::ON_GET_PRINTER_INFO => match string_arg(args, "ip") {
                Some(host) => Parsed::Run(Command::PrinterInfo {
                    host,
                    port: port_arg(args),
                }),
                None => Parsed::Invalid {
                    code: codes::INVALID_ARGUMENTS,
                    message: "IP Address is required",
                },
            },
            methods::IS_PRINTER_CONNECTED => match string_arg(args, "ip") {
                Some(host) => Parsed::Run(Command::IsConnected {
                    host,
                    port: port_arg(args),
                }),
                None => Parsed::Invalid {
                    code: codes::IS_PRINTER_CONNECTED,
                    message: "IP Address is required",
                },
            },
            methods::ON_DISCOVERY => Parsed::Run(Command::DiscoverNetwork),
            methods::ON_DISCOVERY_USB => Parsed::Run(Command::DiscoverUsb),
            _ => Parsed::Unknown,
        }
    }

    /// Wire name of the command, for logs and timeout details.
    pub fn method(&self) -> &'static str {
        match self {
            Command::PrintTcp { .. } => methods::PRINT_ZPL_OVER_TCPIP,
            Command::PrintBluetooth { .. } => methods::PRINT_ZPL_OVER_BLUETOOTH,
            Command::PrinterInfo { .. } => methods::ON_GET_PRINTER_INFO,
            Command::IsConnected { .. } => methods::IS_PRINTER_CONNECTED,
            Command::DiscoverNetwork => methods::ON_DISCOVERY,
            Command::DiscoverUsb => methods::ON_DISCOVERY_USB,
        }
    }
}

/// Fetch a required string argument. Empty strings count as absent.
fn string_arg(args: &Value, key: &str) -> Option<String> {
    match args.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        _ => None,
    }
}

/// Fetch the optional port. Callers send it as a JSON number or as a
/// numeric string; anything unparseable falls back to the default port.
fn port_arg(args: &Value) -> Option<u16> {
    match args.get("port") {
        Some(Value::Number(number)) => number.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(text)) => text.parse().ok(),
        _ => None,
    }
}
