// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Labelwerk Dispatch — the command surface of the engine.  Parses wire
// commands, admits them under the configured concurrency bound, runs
// their link work, and marshals every result through a single delivery
// task back to the caller's sink.

pub mod command;
pub mod delivery;
pub mod dispatcher;

pub use command::{Command, Parsed, codes, methods};
pub use delivery::{CollectingSink, Delivery, DeliveryQueue, ResultSink};
pub use dispatcher::CommandDispatcher;
