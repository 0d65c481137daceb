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

//! The service aggregate: schedule, lifecycle state, capacity ledger and
//! the tickets booked against it.
//!
//! The whole aggregate sits behind one mutex, so every read-check-write
//! path (booking, cancellation plus reclaim) runs under a single lock
//! acquisition and commits all-or-nothing. Ledgers of different services
//! are independent; the engine never holds two service locks at once.

use crate::base::{DriverId, LegId, RouteId, ServiceId, TicketId, UserId};
use crate::error::{EngineError, Entity};
use crate::ledger::{CapacityKind, CapacityLedger};
use crate::ticket::{Leg, LegInput, LegState, PayDetails, Ticket, TicketStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Service lifecycle state.
///
/// Code 1 is the initial scheduled/draft state; codes 2 through 5 are
/// opaque operator-assigned phases with no enforced transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceState(u8);

impl ServiceState {
    pub const SCHEDULED: ServiceState = ServiceState(1);

    /// Accepts the open range of operator codes, 1 through 5.
    pub fn new(code: u8) -> Option<Self> {
        (1..=5).contains(&code).then_some(ServiceState(code))
    }

    pub fn code(self) -> u8 {
        self.0
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        ServiceState::SCHEDULED
    }
}

/// Result of an update operation: did any row actually change?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Changed,
    NoChange,
}

#[derive(Debug)]
pub(crate) struct ServiceData {
    id: ServiceId,
    start_date: Option<DateTime<Utc>>,
    state: ServiceState,
    driver: DriverId,
    route: Option<RouteId>,
    driver_minimum_salary: Option<Decimal>,
    /// Minutes before the scheduled start after which ticket-status
    /// changes are rejected.
    wait_time_min: i64,
    ledger: CapacityLedger,
    tickets: HashMap<TicketId, Ticket>,
}

impl ServiceData {
    fn new(
        id: ServiceId,
        driver: DriverId,
        start_date: Option<DateTime<Utc>>,
        route: Option<RouteId>,
        driver_minimum_salary: Option<Decimal>,
        wait_time_min: i64,
    ) -> Self {
        Self {
            id,
            start_date,
            state: ServiceState::SCHEDULED,
            driver,
            route,
            driver_minimum_salary,
            wait_time_min,
            ledger: CapacityLedger::new(),
            tickets: HashMap::new(),
        }
    }

    pub(crate) fn id(&self) -> ServiceId {
        self.id
    }

    pub(crate) fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    pub(crate) fn ledger(&self) -> &CapacityLedger {
        &self.ledger
    }

    /// True while the cutoff window is still open: the elapsed time from
    /// `now` until the scheduled start exceeds the configured minimum.
    /// An unscheduled draft has no cutoff.
    pub(crate) fn cutoff_open(&self, now: DateTime<Utc>) -> bool {
        match self.start_date {
            None => true,
            Some(start) => start - now > ChronoDuration::minutes(self.wait_time_min),
        }
    }

    fn kind_fixed(&self) -> bool {
        self.tickets.values().any(|t| !t.legs.is_empty())
    }

    pub(crate) fn configure_capacity(
        &mut self,
        kind: Option<CapacityKind>,
        max_count: u32,
        price: Option<Decimal>,
    ) -> Result<(), EngineError> {
        let fixed = self.kind_fixed();
        self.ledger.configure(kind, max_count, price, fixed)
    }

    /// Inserts a placeholder ticket with no legs and no capacity debit.
    /// Used when service creation seeds a first reservation.
    pub(crate) fn seed_ticket(&mut self, ticket: Ticket) {
        debug_assert!(ticket.legs.is_empty());
        self.tickets.insert(ticket.id, ticket);
    }

    /// Books a ticket: creates the ticket row, its pay record and its
    /// legs, and debits the ledger, as one atomic unit.
    ///
    /// Passenger bookings debit a flat 1 unit per call; cargo bookings
    /// debit the summed weight of the legs created by this call.
    pub(crate) fn book(
        &mut self,
        ticket_id: TicketId,
        holder: UserId,
        promo_code: Option<String>,
        pay: PayDetails,
        leg_ids: Vec<LegId>,
        legs: Vec<LegInput>,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        debug_assert_eq!(leg_ids.len(), legs.len());

        if self.ledger.available_count() == 0 {
            return Err(EngineError::CapacityExhausted { available: 0 });
        }

        // Validate every leg input before creating anything, so a failure
        // leaves no partial ticket behind.
        for input in &legs {
            let matches = matches!(
                (self.ledger.kind(), input),
                (CapacityKind::Passenger, LegInput::Passenger(_))
                    | (CapacityKind::Cargo, LegInput::Cargo(_))
            );
            if !matches {
                return Err(EngineError::WrongLegKind);
            }
        }

        let debit = match self.ledger.kind() {
            CapacityKind::Passenger => 1,
            CapacityKind::Cargo => legs
                .iter()
                .map(|input| match input {
                    LegInput::Cargo(c) => c.weight_kg,
                    LegInput::Passenger(_) => 0,
                })
                .sum(),
        };
        self.ledger.reserve(debit)?;

        let mut ticket = Ticket::new(ticket_id, Some(holder), promo_code, pay, now);
        ticket.legs = leg_ids
            .into_iter()
            .zip(legs)
            .map(|(id, input)| Leg::new(id, input))
            .collect();
        self.tickets.insert(ticket_id, ticket);
        Ok(())
    }

    /// Applies a ticket-status and/or leg-state update.
    ///
    /// The cutoff gates the ticket-status half only; a supplied leg update
    /// is still attempted. Cancelling the ticket reclaims 1 unit once;
    /// cancelling a leg reclaims that leg's own capacity footprint.
    ///
    /// An unknown leg id or an illegal leg transition fails the whole call
    /// before anything is written; an error never leaves a half-applied
    /// status change or reclaim behind.
    pub(crate) fn apply_ticket_update(
        &mut self,
        ticket_id: TicketId,
        new_status: Option<TicketStatus>,
        leg: Option<(LegId, LegState)>,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, EngineError> {
        let cutoff_open = self.cutoff_open(now);
        let ticket = self
            .tickets
            .get_mut(&ticket_id)
            .ok_or(EngineError::NotFound(Entity::Ticket))?;

        // Resolve and validate the leg half up front, so the status half
        // cannot commit when the leg half is doomed.
        let leg_change = match leg {
            Some((leg_id, new_state)) => {
                let idx = ticket
                    .legs
                    .iter()
                    .position(|l| l.id == leg_id)
                    .ok_or(EngineError::NotFound(Entity::Leg))?;
                let from = ticket.legs[idx].state;
                if from != new_state && !from.can_transition(new_state) {
                    return Err(EngineError::InvalidTransition {
                        from,
                        to: new_state,
                    });
                }
                Some((idx, new_state))
            }
            None => None,
        };

        let mut changed = false;

        if cutoff_open {
            if let Some(status) = new_status {
                // A repeated write of the same status is not a change and
                // must not trigger a second reclaim.
                if ticket.status != status {
                    ticket.status = status;
                    changed = true;
                    if status == TicketStatus::Cancelled {
                        self.ledger.release(1);
                    }
                }
            }
        }

        if let Some((idx, new_state)) = leg_change {
            let leg = &mut ticket.legs[idx];
            if leg.state != new_state {
                leg.state = new_state;
                changed = true;
                if new_state == LegState::Cancelled {
                    let units = leg.capacity_units();
                    self.ledger.release(units);
                }
            }
        }

        if changed {
            Ok(UpdateOutcome::Changed)
        } else if cutoff_open {
            Ok(UpdateOutcome::NoChange)
        } else {
            Err(EngineError::CutoffPassed)
        }
    }

    /// Removes a ticket and its legs. No capacity is reclaimed; cancel
    /// the ticket first if its reservation should return to the ledger.
    pub(crate) fn remove_ticket(&mut self, ticket_id: TicketId) -> Result<(), EngineError> {
        self.tickets
            .remove(&ticket_id)
            .map(|_| ())
            .ok_or(EngineError::NotFound(Entity::Ticket))
    }

    pub(crate) fn apply_service_update(
        &mut self,
        start_date: Option<DateTime<Utc>>,
        state: Option<ServiceState>,
        driver: Option<DriverId>,
        route: Option<RouteId>,
        wait_time_min: Option<i64>,
    ) -> UpdateOutcome {
        let mut changed = false;
        if let Some(start_date) = start_date {
            if self.start_date != Some(start_date) {
                self.start_date = Some(start_date);
                changed = true;
            }
        }
        if let Some(state) = state {
            if self.state != state {
                self.state = state;
                changed = true;
            }
        }
        if let Some(driver) = driver {
            if self.driver != driver {
                self.driver = driver;
                changed = true;
            }
        }
        if let Some(route) = route {
            if self.route != Some(route) {
                self.route = Some(route);
                changed = true;
            }
        }
        if let Some(wait) = wait_time_min {
            if self.wait_time_min != wait {
                self.wait_time_min = wait;
                changed = true;
            }
        }
        if changed {
            UpdateOutcome::Changed
        } else {
            UpdateOutcome::NoChange
        }
    }

    pub(crate) fn ticket(&self, ticket_id: TicketId) -> Option<&Ticket> {
        self.tickets.get(&ticket_id)
    }

    pub(crate) fn snapshot(&self) -> ServiceSnapshot {
        let mut tickets: Vec<Ticket> = self.tickets.values().cloned().collect();
        tickets.sort_by_key(|t| t.id);
        ServiceSnapshot {
            id: self.id,
            start_date: self.start_date,
            state: self.state,
            driver: self.driver,
            route: self.route,
            driver_minimum_salary: self.driver_minimum_salary,
            wait_time_min: self.wait_time_min,
            ledger: self.ledger.clone(),
            tickets,
        }
    }
}

/// One schedulable service and everything booked against it.
#[derive(Debug)]
pub struct Service {
    inner: Mutex<ServiceData>,
}

impl Service {
    pub(crate) fn new(
        id: ServiceId,
        driver: DriverId,
        start_date: Option<DateTime<Utc>>,
        route: Option<RouteId>,
        driver_minimum_salary: Option<Decimal>,
        wait_time_min: i64,
    ) -> Self {
        Self {
            inner: Mutex::new(ServiceData::new(
                id,
                driver,
                start_date,
                route,
                driver_minimum_salary,
                wait_time_min,
            )),
        }
    }

    /// Acquires the aggregate lock with a bounded wait.
    ///
    /// Each attempt waits up to `timeout`; after `retries` extra attempts
    /// the caller gets [`EngineError::ConcurrentModification`], which is
    /// safe to retry.
    pub(crate) fn lock_bounded(
        &self,
        timeout: Duration,
        retries: u32,
    ) -> Result<MutexGuard<'_, ServiceData>, EngineError> {
        for _ in 0..=retries {
            if let Some(guard) = self.inner.try_lock_for(timeout) {
                return Ok(guard);
            }
        }
        Err(EngineError::ConcurrentModification)
    }

    pub fn available_count(&self) -> u32 {
        self.inner.lock().ledger.available_count()
    }

    pub fn max_count(&self) -> u32 {
        self.inner.lock().ledger.max_count()
    }

    pub fn ticket_count(&self) -> usize {
        self.inner.lock().tickets.len()
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        self.inner.lock().snapshot()
    }
}

/// Point-in-time view of a service aggregate, for rendering by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub id: ServiceId,
    pub start_date: Option<DateTime<Utc>>,
    pub state: ServiceState,
    pub driver: DriverId,
    pub route: Option<RouteId>,
    pub driver_minimum_salary: Option<Decimal>,
    pub wait_time_min: i64,
    pub ledger: CapacityLedger,
    pub tickets: Vec<Ticket>,
}
