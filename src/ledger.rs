// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Capacity ledger: the per-service counters every booking debits and
//! every cancellation reclaims.
//!
//! A ledger counts abstract capacity units: seats for passenger services,
//! kilograms for cargo services. `available_count` only ever moves through
//! [`CapacityLedger::reserve`] and [`CapacityLedger::release`]; no other
//! writer touches it.

use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a capacity unit means for a given service.
///
/// Fixed once the service has booked legs; determines which leg variant
/// bookings may create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityKind {
    /// Units are seats; one passenger leg consumes one unit.
    Passenger,
    /// Units are kilograms; a cargo leg consumes its declared weight.
    Cargo,
}

impl CapacityKind {
    /// Wire code used by the transport layer (1 = passenger, 2 = cargo).
    pub fn code(self) -> u8 {
        match self {
            CapacityKind::Passenger => 1,
            CapacityKind::Cargo => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(CapacityKind::Passenger),
            2 => Some(CapacityKind::Cargo),
            _ => None,
        }
    }
}

/// Per-service capacity counters.
///
/// Invariant: `0 <= available_count <= max_count` at all times. A reserve
/// that would go negative is rejected with [`EngineError::CapacityExhausted`];
/// a release that would exceed the ceiling saturates at `max_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityLedger {
    kind: CapacityKind,
    max_count: u32,
    available_count: u32,
    /// Nominal unit price; used for range filtering by the admin layer.
    price: Option<Decimal>,
}

impl CapacityLedger {
    /// A fresh ledger has no capacity until configured.
    pub fn new() -> Self {
        Self {
            kind: CapacityKind::Passenger,
            max_count: 0,
            available_count: 0,
            price: None,
        }
    }

    pub fn kind(&self) -> CapacityKind {
        self.kind
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn available_count(&self) -> u32 {
        self.available_count
    }

    pub fn price(&self) -> Option<Decimal> {
        self.price
    }

    /// Units currently reserved against the ledger.
    pub fn reserved(&self) -> u32 {
        self.max_count - self.available_count
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.available_count <= self.max_count,
            "Invariant violated: available {} exceeds max {}",
            self.available_count,
            self.max_count
        );
    }

    /// Sets the capacity envelope.
    ///
    /// Only accepted while nothing is reserved, so `available_count` always
    /// restarts equal to `max_count`. `kind_fixed` is passed by the owning
    /// service once any leg has been booked; changing the kind after that
    /// point fails with [`EngineError::KindFixed`].
    pub fn configure(
        &mut self,
        kind: Option<CapacityKind>,
        max_count: u32,
        price: Option<Decimal>,
        kind_fixed: bool,
    ) -> Result<(), EngineError> {
        if max_count == 0 {
            return Err(EngineError::InvalidCapacity);
        }
        if self.reserved() > 0 {
            return Err(EngineError::InvalidCapacity);
        }
        if let Some(kind) = kind {
            if kind_fixed && kind != self.kind {
                return Err(EngineError::KindFixed);
            }
            self.kind = kind;
        }
        self.max_count = max_count;
        self.available_count = max_count;
        if price.is_some() {
            self.price = price;
        }
        self.assert_invariants();
        Ok(())
    }

    /// Debits `amount` units from the ledger.
    ///
    /// # Errors
    ///
    /// [`EngineError::CapacityExhausted`] if `amount` exceeds the current
    /// remainder; the error carries the remainder for diagnostics.
    pub fn reserve(&mut self, amount: u32) -> Result<(), EngineError> {
        if amount > self.available_count {
            return Err(EngineError::CapacityExhausted {
                available: self.available_count,
            });
        }
        self.available_count -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Returns `amount` units to the ledger, saturating at `max_count`.
    ///
    /// Over-release (a retried cancellation reclaiming more than was ever
    /// reserved) clamps to the ceiling rather than erroring, so a replayed
    /// request cannot corrupt the envelope.
    pub fn release(&mut self, amount: u32) {
        self.available_count = self
            .available_count
            .saturating_add(amount)
            .min(self.max_count);
        self.assert_invariants();
    }
}

impl Default for CapacityLedger {
    fn default() -> Self {
        Self::new()
    }
}
