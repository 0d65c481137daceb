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

//! Tests for the capacity ledger through its public API: configuration
//! rules, reserve/release arithmetic and the count invariant.

use rust_decimal_macros::dec;
use transit_engine_rs::{CapacityKind, CapacityLedger, EngineError};

fn cargo_ledger(kg: u32) -> CapacityLedger {
    let mut ledger = CapacityLedger::new();
    ledger
        .configure(Some(CapacityKind::Cargo), kg, None, false)
        .unwrap();
    ledger
}

#[test]
fn reserve_release_sequence_keeps_counts_consistent() {
    let mut ledger = cargo_ledger(1000);
    ledger.reserve(200).unwrap();
    ledger.reserve(300).unwrap();
    assert_eq!(ledger.available_count(), 500);
    assert_eq!(ledger.reserved(), 500);

    ledger.release(300);
    assert_eq!(ledger.available_count(), 800);
    assert_eq!(ledger.reserved(), 200);

    ledger.reserve(800).unwrap();
    assert_eq!(ledger.available_count(), 0);
    assert_eq!(
        ledger.reserve(1),
        Err(EngineError::CapacityExhausted { available: 0 })
    );
}

#[test]
fn failed_reserve_leaves_counts_untouched() {
    let mut ledger = cargo_ledger(100);
    ledger.reserve(60).unwrap();
    assert_eq!(
        ledger.reserve(50),
        Err(EngineError::CapacityExhausted { available: 40 })
    );
    assert_eq!(ledger.available_count(), 40);
    assert_eq!(ledger.max_count(), 100);
}

#[test]
fn reconfigure_resets_available_to_new_ceiling() {
    let mut ledger = cargo_ledger(100);
    ledger.reserve(100).unwrap();
    ledger.release(100);
    // Everything reclaimed, so a resize is accepted and refills.
    ledger.configure(None, 250, None, true).unwrap();
    assert_eq!(ledger.available_count(), 250);
    assert_eq!(ledger.kind(), CapacityKind::Cargo);
}

#[test]
fn price_survives_reconfiguration_without_one() {
    let mut ledger = CapacityLedger::new();
    ledger
        .configure(Some(CapacityKind::Passenger), 4, Some(dec!(9.99)), false)
        .unwrap();
    ledger.configure(None, 6, None, false).unwrap();
    assert_eq!(ledger.price(), Some(dec!(9.99)));

    ledger.configure(None, 6, Some(dec!(12.00)), false).unwrap();
    assert_eq!(ledger.price(), Some(dec!(12.00)));
}

#[test]
fn over_release_saturates_at_ceiling() {
    let mut ledger = cargo_ledger(500);
    ledger.reserve(100).unwrap();
    // A duplicated reclaim must clamp, never overflow the envelope.
    ledger.release(100);
    ledger.release(100);
    assert_eq!(ledger.available_count(), 500);
    assert_eq!(ledger.reserved(), 0);
}

#[test]
fn unconfigured_ledger_rejects_every_reserve() {
    let mut ledger = CapacityLedger::new();
    assert_eq!(
        ledger.reserve(1),
        Err(EngineError::CapacityExhausted { available: 0 })
    );
}

#[test]
fn serializes_with_named_fields() {
    let ledger = cargo_ledger(1000);
    let json = serde_json::to_string(&ledger).unwrap();
    assert!(json.contains("\"max_count\":1000"));
    assert!(json.contains("\"available_count\":1000"));
    assert!(json.contains("\"kind\":\"Cargo\""));

    let back: CapacityLedger = serde_json::from_str(&json).unwrap();
    assert_eq!(back.max_count(), 1000);
    assert_eq!(back.kind(), CapacityKind::Cargo);
}
