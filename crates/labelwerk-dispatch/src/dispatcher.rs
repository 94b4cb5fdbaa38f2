// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The command dispatcher: admission, execution, and wire-error mapping.
//
// Every command passes the same pipeline: parse and validate, admit
// under the concurrency bound, execute with blocking link work on the
// blocking pool, then deliver exactly one result through the delivery
// queue.  Internal errors never cross the boundary raw; each command
// maps them to its wire code and message here and nowhere else.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument, warn};

use labelwerk_core::{
    BackpressurePolicy, CommandId, ConnectionTarget, LabelwerkError, LinkConfig,
    PrinterDescriptor, Result, ResultEnvelope,
};
use labelwerk_link::discovery::{DiscoveryCoordinator, DiscoveryScanner};
use labelwerk_link::handshake::fetch_data_map;
use labelwerk_link::transport::{
    LinkTransportFactory, Transport, TransportFactory, with_transport,
};
use labelwerk_link::{NetworkScanner, UsbScanner};

use crate::command::{Command, Parsed, codes};
use crate::delivery::{Delivery, DeliveryQueue, ResultSink};

/// Coordinates the whole command surface over injected link seams.
///
/// Cloning is cheap; clones share the registry, the permit pool, and the
/// delivery queue. Construct from within a Tokio runtime: the delivery
/// task is spawned immediately.
#[derive(Clone)]
pub struct CommandDispatcher {
    config: LinkConfig,
    transports: Arc<dyn TransportFactory>,
    network_scanner: Arc<dyn DiscoveryScanner>,
    usb_scanner: Arc<dyn DiscoveryScanner>,
    coordinator: DiscoveryCoordinator,
    permits: Arc<Semaphore>,
    deliveries: DeliveryQueue,
}

impl CommandDispatcher {
    /// Wire up the production transports and scanners.
    pub fn production(config: LinkConfig) -> Self {
        let network = Arc::new(NetworkScanner::new(&config));
        let transports = Arc::new(LinkTransportFactory::new(config.clone()));
        Self::new(config, transports, network, Arc::new(UsbScanner::new()))
    }

    /// Build with injected seams; tests drive fakes through this.
    pub fn new(
        config: LinkConfig,
        transports: Arc<dyn TransportFactory>,
        network_scanner: Arc<dyn DiscoveryScanner>,
        usb_scanner: Arc<dyn DiscoveryScanner>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_commands));
        Self {
            transports,
            network_scanner,
            usb_scanner,
            coordinator: DiscoveryCoordinator::new(),
            permits,
            deliveries: DeliveryQueue::start(),
            config,
        }
    }

    /// Submit one wire call. The sink receives exactly one answer:
    /// validation failures and admission rejections immediately, execution
    /// results when the worker finishes.
    ///
    /// Under the `queue` policy this call waits for a free permit; under
    /// `reject` it returns at once and over-capacity calls are answered
    /// with `COMMAND_REJECTED`.
    #[instrument(skip_all, fields(method = %method))]
    pub async fn submit(&self, method: &str, args: &Value, sink: Box<dyn ResultSink>) -> CommandId {
        let command_id = CommandId::new();
        match Command::parse(method, args) {
            Parsed::Invalid { code, message } => {
                debug!(id = %command_id, code, message, "command rejected by validation");
                self.deliveries.deliver(
                    sink,
                    Delivery::Error {
                        code: code.to_string(),
                        message: message.to_string(),
                        details: None,
                    },
                );
            }
            Parsed::Unknown => {
                debug!(id = %command_id, "unknown command method");
                self.deliveries.deliver(sink, Delivery::NotImplemented);
            }
            Parsed::Run(command) => {
                let permit = match self.admit().await {
                    Ok(permit) => permit,
                    Err(err) => {
                        warn!(id = %command_id, error = %err, "command rejected at admission");
                        self.deliveries.deliver(
                            sink,
                            Delivery::Error {
                                code: codes::COMMAND_REJECTED.to_string(),
                                message: "Too many concurrent commands".to_string(),
                                details: Some(err.to_string()),
                            },
                        );
                        return command_id;
                    }
                };
                let dispatcher = self.clone();
                tokio::spawn(async move {
                    dispatcher
                        .run_command(command_id, command, permit, sink)
                        .await;
                });
            }
        }
        command_id
    }

    /// Registry snapshot from the most recent discovery session.
    pub fn printers(&self) -> Vec<PrinterDescriptor> {
        self.coordinator.printers()
    }

    /// When the last discovery session finished, if any has.
    pub fn last_discovery(&self) -> Option<DateTime<Utc>> {
        self.coordinator.last_completed()
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        match self.config.backpressure {
            BackpressurePolicy::Queue => self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| LabelwerkError::Busy("dispatcher is shutting down".into())),
            BackpressurePolicy::Reject => self.permits.clone().try_acquire_owned().map_err(|_| {
                LabelwerkError::Busy(format!(
                    "{} commands already running",
                    self.config.max_concurrent_commands
                ))
            }),
        }
    }

    async fn run_command(
        &self,
        command_id: CommandId,
        command: Command,
        permit: OwnedSemaphorePermit,
        sink: Box<dyn ResultSink>,
    ) {
        let _permit = permit;
        let deadline = self.config.command_timeout();
        let delivery = match tokio::time::timeout(deadline, self.execute(&command)).await {
            Ok(delivery) => delivery,
            Err(_) => {
                warn!(
                    id = %command_id,
                    method = command.method(),
                    timeout_ms = deadline.as_millis() as u64,
                    "command deadline exceeded"
                );
                Delivery::Error {
                    code: codes::COMMAND_TIMEOUT.to_string(),
                    message: "Command timed out".to_string(),
                    details: Some(command.method().to_string()),
                }
            }
        };
        match &delivery {
            Delivery::Success { .. } => {
                info!(id = %command_id, method = command.method(), "command completed");
            }
            Delivery::Error { code, .. } => {
                warn!(id = %command_id, method = command.method(), code = %code, "command failed");
            }
            Delivery::NotImplemented => {}
        }
        self.deliveries.deliver(sink, delivery);
    }

    /// Run one validated command and map its outcome to the wire contract.
    async fn execute(&self, command: &Command) -> Delivery {
        match command {
            Command::PrintTcp { host, port, data } => {
                match self.print_tcp(host, *port, data).await {
                    Ok(envelope) => Delivery::Success { envelope },
                    Err(err) => error_delivery(codes::CONNECTION_FAILED, "Connection failed", &err),
                }
            }
            Command::PrintBluetooth { mac, data } => {
                match self.print_bluetooth(mac, data).await {
                    Ok(envelope) => Delivery::Success { envelope },
                    Err(err) => {
                        error_delivery(codes::PRINT_ERROR, "Failed to print over Bluetooth", &err)
                    }
                }
            }
            Command::PrinterInfo { host, port } => match self.printer_info(host, *port).await {
                Ok(envelope) => Delivery::Success { envelope },
                Err(err @ LabelwerkError::Decode(_)) => {
                    error_delivery(codes::DISCOVERY_ERROR, "Invalid discovery packet received", &err)
                }
                Err(err) => {
                    error_delivery(codes::CONNECTION_ERROR, "Failed to connect to printer", &err)
                }
            },
            Command::IsConnected { host, port } => self.is_connected(host, *port).await,
            Command::DiscoverNetwork => {
                match self.discover(Arc::clone(&self.network_scanner)).await {
                    Ok(envelope) => Delivery::Success { envelope },
                    Err(err) => {
                        error_delivery(codes::DISCOVERY_FAILED, codes::DISCOVERY_FAILED, &err)
                    }
                }
            }
            Command::DiscoverUsb => match self.discover(Arc::clone(&self.usb_scanner)).await {
                Ok(envelope) => Delivery::Success { envelope },
                Err(err) => {
                    error_delivery(codes::DISCOVERY_USB_FAILED, codes::DISCOVERY_USB_FAILED, &err)
                }
            },
        }
    }

    /// Callers that omit the port get the configured raw-ZPL default.
    fn tcp_target(&self, host: &str, port: Option<u16>) -> ConnectionTarget {
        ConnectionTarget::tcp(host, port.or(Some(self.config.default_zpl_port)))
    }

    async fn print_tcp(&self, host: &str, port: Option<u16>, data: &str) -> Result<ResultEnvelope> {
        let target = self.tcp_target(host, port);
        let payload = data.as_bytes().to_vec();
        let sent = payload.len();
        self.run_on_link(target, move |link| link.write(&payload))
            .await?;
        debug!(bytes = sent, "network print payload delivered");
        Ok(ResultEnvelope::success("Print successful"))
    }

    async fn print_bluetooth(&self, mac: &str, data: &str) -> Result<ResultEnvelope> {
        let target = ConnectionTarget::bluetooth(mac);
        let payload = data.as_bytes().to_vec();
        let sent = payload.len();
        self.run_on_link(target, move |link| link.write(&payload))
            .await?;
        debug!(bytes = sent, "Bluetooth print payload delivered");
        Ok(ResultEnvelope::success("Successfully sent data to printer"))
    }

    async fn printer_info(&self, host: &str, port: Option<u16>) -> Result<ResultEnvelope> {
        let target = self.tcp_target(host, port);
        let map = self
            .run_on_link(target, |link| fetch_data_map(link))
            .await?;
        let descriptor = PrinterDescriptor::from_data_map(&map).with_na_defaults();
        let content = serde_json::to_string(&descriptor)?;
        Ok(ResultEnvelope::success(content))
    }

    /// Reachability is payload, not an error: every probe outcome is a
    /// success-delivered status envelope.
    async fn is_connected(&self, host: &str, port: Option<u16>) -> Delivery {
        let target = self.tcp_target(host, port);
        let probe = self.run_on_link(target, |link| fetch_data_map(link)).await;
        let envelope = match probe {
            Ok(_) => ResultEnvelope::status(true, "Connected"),
            Err(LabelwerkError::Decode(detail)) => {
                debug!(detail = %detail, "printer answered with an undecodable reply");
                ResultEnvelope::status(false, "Invalid discovery packet")
            }
            Err(err) => {
                debug!(error = %err, "printer unreachable");
                ResultEnvelope::status(false, "Unconnected")
            }
        };
        Delivery::Success { envelope }
    }

    async fn discover(&self, scanner: Arc<dyn DiscoveryScanner>) -> Result<ResultEnvelope> {
        let snapshot = self
            .coordinator
            .run(scanner, self.config.discovery_window())
            .await?;
        let content = serde_json::to_string(&snapshot)?;
        Ok(ResultEnvelope::success(content).with_message("Successfully!"))
    }

    /// Run blocking link work on the blocking pool, releasing the
    /// transport on every exit path.
    async fn run_on_link<T, F>(&self, target: ConnectionTarget, body: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Transport) -> Result<T> + Send + 'static,
    {
        let transports = Arc::clone(&self.transports);
        match tokio::task::spawn_blocking(move || {
            with_transport(transports.as_ref(), &target, body)
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(err) => Err(LabelwerkError::Connection(format!(
                "link worker failed: {err}"
            ))),
        }
    }
}

fn error_delivery(code: &str, message: &str, err: &LabelwerkError) -> Delivery {
    Delivery::Error {
        code: code.to_string(),
        message: message.to_string(),
        details: Some(err.to_string()),
    }
}
