// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory registry of printers found during one discovery session.

use tracing::debug;

use labelwerk_core::PrinterDescriptor;

/// Ordered, deduplicated-by-address collection of discovered printers.
///
/// Insertion order is discovery order. Mutation is serialized by the
/// discovery coordinator's session lock; the registry itself carries no
/// synchronization.
#[derive(Debug, Default)]
pub struct PrinterRegistry {
    entries: Vec<PrinterDescriptor>,
}

impl PrinterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all entries; called at the start of every discovery session.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Insert unless a printer with the same address is already present.
    /// First-seen wins; returns whether the descriptor was inserted.
    /// Descriptors without an address share the empty dedup key.
    pub fn add_if_absent(&mut self, descriptor: PrinterDescriptor) -> bool {
        let duplicate = self
            .entries
            .iter()
            .any(|existing| existing.address_key() == descriptor.address_key());
        if duplicate {
            debug!(address = descriptor.address_key(), "duplicate printer dropped");
            return false;
        }
        self.entries.push(descriptor);
        true
    }

    /// Copy of the current entries in discovery order.
    pub fn snapshot(&self) -> Vec<PrinterDescriptor> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
