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

//! Capacity and lifecycle engine.
//!
//! The [`Engine`] is the one writer of every capacity ledger. It creates
//! services, books tickets against their capacity, applies ticket and leg
//! state transitions with the wait-time cutoff, reclaims capacity on
//! cancellation, and maintains the driver availability side channel.
//!
//! # Concurrency
//!
//! Services live in a [`DashMap`] and each service aggregate sits behind
//! its own mutex, so bookings against different services proceed in
//! parallel while the read-check-write hot path of a single ledger is
//! linearized. Lock waits are bounded; an exhausted wait surfaces as the
//! retryable [`EngineError::ConcurrentModification`].

use crate::base::{DriverId, LegId, RouteId, ServiceId, TicketId, UserId};
use crate::directory::Directory;
use crate::driver::{AvailabilityState, Driver, DriverState, DriverStatus};
use crate::error::{EngineError, Entity};
use crate::ledger::CapacityKind;
use crate::service::{Service, ServiceSnapshot, ServiceState, UpdateOutcome};
use crate::ticket::{LegInput, LegState, PayDetails, Ticket, TicketStatus};
use crate::ticket_index::TicketIndex;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time source for the cutoff arithmetic.
///
/// Injected through [`EngineConfig`] so tests can pin the clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Engine construction parameters.
///
/// Explicit configuration instead of process-wide globals: lock bounds
/// for the per-service mutex and the time source for cutoff checks.
#[derive(Clone)]
pub struct EngineConfig {
    /// Maximum wait per lock attempt on a service aggregate.
    pub lock_timeout: Duration,
    /// Extra lock attempts before surfacing `ConcurrentModification`.
    pub lock_retries: u32,
    pub clock: Arc<dyn Clock>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(200),
            lock_retries: 3,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Parameters for [`Engine::create_service`].
#[derive(Debug, Clone, Default)]
pub struct NewService {
    pub driver: DriverId,
    pub start_date: Option<DateTime<Utc>>,
    pub route: Option<RouteId>,
    pub driver_minimum_salary: Option<Decimal>,
    /// Minutes before the scheduled start after which cancellations are
    /// rejected. Defaults to 0 (cancellable until departure).
    pub wait_time_min: i64,
    /// Optionally seed the service with one placeholder ticket (no legs,
    /// no capacity debit).
    pub seed_ticket: Option<SeedTicket>,
}

/// A placeholder first reservation created together with a service.
#[derive(Debug, Clone, Default)]
pub struct SeedTicket {
    pub holder: Option<UserId>,
    pub promo_code: Option<String>,
    pub pay: PayDetails,
}

/// Parameters for [`Engine::configure_capacity`].
#[derive(Debug, Clone)]
pub struct CapacityConfig {
    pub kind: Option<CapacityKind>,
    pub max_count: u32,
    pub price: Option<Decimal>,
}

/// Parameters for [`Engine::book_ticket`].
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub user: UserId,
    pub promo_code: Option<String>,
    pub legs: Vec<LegInput>,
    pub payment: PayDetails,
}

/// Parameters for [`Engine::update_ticket_state`]: either half may be
/// supplied on its own.
#[derive(Debug, Clone, Default)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub leg: Option<(LegId, LegState)>,
}

/// Typed set of optional service fields to update, in place of the
/// source's ad hoc update object.
#[derive(Debug, Clone, Default)]
pub struct ServiceUpdate {
    pub start_date: Option<DateTime<Utc>>,
    pub state: Option<ServiceState>,
    pub driver: Option<DriverId>,
    pub route: Option<RouteId>,
    pub wait_time_min: Option<i64>,
}

/// Optional driver record fields to update.
#[derive(Debug, Clone, Default)]
pub struct DriverUpdate {
    pub status: Option<DriverStatus>,
    pub rating: Option<u32>,
}

/// A ticket snapshot together with its owning service.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TicketSnapshot {
    pub service: ServiceId,
    pub ticket: Ticket,
}

/// Service capacity and ticket lifecycle engine.
pub struct Engine {
    services: DashMap<ServiceId, Service>,
    tickets: TicketIndex,
    directory: Directory,
    driver_states: DashMap<DriverId, DriverState>,
    config: EngineConfig,
    next_service_id: AtomicU64,
    next_ticket_id: AtomicU64,
    next_leg_id: AtomicU64,
}

impl Engine {
    /// Creates an engine with default lock bounds and the system clock.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            services: DashMap::new(),
            tickets: TicketIndex::new(),
            directory: Directory::new(),
            driver_states: DashMap::new(),
            config,
            next_service_id: AtomicU64::new(1),
            next_ticket_id: AtomicU64::new(1),
            next_leg_id: AtomicU64::new(1),
        }
    }

    // --- directory registration (stands in for the excluded admin CRUD) ---

    pub fn register_user(&self, id: UserId) {
        self.directory.register_user(id);
    }

    pub fn register_route(&self, id: RouteId) {
        self.directory.register_route(id);
    }

    pub fn register_driver(&self, id: DriverId) {
        self.directory.register_driver(id);
    }

    // --- service lifecycle ---

    /// Creates a service together with its (still unconfigured) capacity
    /// ledger, and optionally seeds a placeholder first ticket.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] if the driver, the route, or the seed
    ///   ticket's holder is not registered.
    pub fn create_service(&self, request: NewService) -> Result<ServiceId, EngineError> {
        self.directory.require_driver(request.driver)?;
        if let Some(route) = request.route {
            self.directory.require_route(route)?;
        }
        if let Some(seed) = &request.seed_ticket {
            if let Some(holder) = seed.holder {
                self.directory.require_user(holder)?;
            }
        }

        let service_id = ServiceId(self.next_service_id.fetch_add(1, Ordering::Relaxed));
        let service = Service::new(
            service_id,
            request.driver,
            request.start_date,
            request.route,
            request.driver_minimum_salary,
            request.wait_time_min,
        );

        if let Some(seed) = request.seed_ticket {
            let ticket_id = TicketId(self.next_ticket_id.fetch_add(1, Ordering::Relaxed));
            let ticket = Ticket::new(
                ticket_id,
                seed.holder,
                seed.promo_code,
                seed.pay,
                self.config.clock.now(),
            );
            // The service is not yet visible to other threads.
            let mut data = service.lock_bounded(self.config.lock_timeout, 0)?;
            data.seed_ticket(ticket);
            drop(data);
            self.tickets.insert(ticket_id, service_id)?;
        }

        self.services.insert(service_id, service);
        info!(service = %service_id, driver = %request.driver, "service created");
        Ok(service_id)
    }

    /// Sets a service's capacity envelope (kind, ceiling, unit price).
    ///
    /// Only accepted while no capacity is outstanding; the kind is fixed
    /// once the service has booked legs.
    pub fn configure_capacity(
        &self,
        service_id: ServiceId,
        config: CapacityConfig,
    ) -> Result<(), EngineError> {
        let service = self
            .services
            .get(&service_id)
            .ok_or(EngineError::NotFound(Entity::Service))?;
        let mut data = service.lock_bounded(self.config.lock_timeout, self.config.lock_retries)?;
        data.configure_capacity(config.kind, config.max_count, config.price)?;
        debug!(service = %service_id, max = config.max_count, "capacity configured");
        Ok(())
    }

    /// Applies a typed partial update to a service's own fields.
    pub fn update_service(
        &self,
        service_id: ServiceId,
        update: ServiceUpdate,
    ) -> Result<UpdateOutcome, EngineError> {
        if let Some(driver) = update.driver {
            self.directory.require_driver(driver)?;
        }
        if let Some(route) = update.route {
            self.directory.require_route(route)?;
        }
        let service = self
            .services
            .get(&service_id)
            .ok_or(EngineError::NotFound(Entity::Service))?;
        let mut data = service.lock_bounded(self.config.lock_timeout, self.config.lock_retries)?;
        Ok(data.apply_service_update(
            update.start_date,
            update.state,
            update.driver,
            update.route,
            update.wait_time_min,
        ))
    }

    /// Deletes a service and its ledger.
    ///
    /// Refused with [`EngineError::HasDependents`] while any ticket still
    /// references the service. The zero-ticket check and the removal are
    /// one atomic step, so a concurrent booking cannot slip in between.
    pub fn delete_service(&self, service_id: ServiceId) -> Result<(), EngineError> {
        let mut dependents = None;
        let mut busy = false;
        let removed = self.services.remove_if(&service_id, |_, service| {
            match service.lock_bounded(self.config.lock_timeout, self.config.lock_retries) {
                Ok(data) => {
                    let tickets = data.ticket_count();
                    if tickets == 0 {
                        true
                    } else {
                        dependents = Some(tickets);
                        false
                    }
                }
                Err(_) => {
                    busy = true;
                    false
                }
            }
        });

        match removed {
            Some(_) => {
                info!(service = %service_id, "service deleted");
                Ok(())
            }
            None if busy => Err(EngineError::ConcurrentModification),
            None => match dependents {
                Some(tickets) => Err(EngineError::HasDependents { tickets }),
                None => Err(EngineError::NotFound(Entity::Service)),
            },
        }
    }

    // --- ticket booking and lifecycle ---

    /// Books a ticket against a service's capacity.
    ///
    /// Creates the ticket, its payment record and its legs, and debits the
    /// ledger, all under one lock acquisition: either everything commits
    /// or nothing does.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown user or service.
    /// - [`EngineError::CapacityExhausted`] when the ledger cannot cover
    ///   the booking's debit; carries the observed remainder.
    /// - [`EngineError::WrongLegKind`] for a leg input that does not match
    ///   the ledger's capacity kind.
    pub fn book_ticket(
        &self,
        service_id: ServiceId,
        request: BookingRequest,
    ) -> Result<TicketId, EngineError> {
        self.directory.require_user(request.user)?;
        let service = self
            .services
            .get(&service_id)
            .ok_or(EngineError::NotFound(Entity::Service))?;
        let mut data = service.lock_bounded(self.config.lock_timeout, self.config.lock_retries)?;

        let ticket_id = TicketId(self.next_ticket_id.fetch_add(1, Ordering::Relaxed));
        let leg_ids: Vec<LegId> = request
            .legs
            .iter()
            .map(|_| LegId(self.next_leg_id.fetch_add(1, Ordering::Relaxed)))
            .collect();

        let result = data.book(
            ticket_id,
            request.user,
            request.promo_code,
            request.payment,
            leg_ids,
            request.legs,
            self.config.clock.now(),
        );
        if let Err(e) = &result {
            if let EngineError::CapacityExhausted { available } = e {
                warn!(service = %service_id, available, "booking rejected, capacity exhausted");
            }
            return Err(e.clone());
        }
        drop(data);

        self.tickets.insert(ticket_id, service_id)?;
        debug!(service = %service_id, ticket = %ticket_id, "ticket booked");
        Ok(ticket_id)
    }

    /// Updates a ticket's status and/or one of its legs' state, reclaiming
    /// capacity on cancellations.
    ///
    /// The wait-time cutoff gates the ticket-status half; the leg half is
    /// still attempted after the cutoff. Returns
    /// [`UpdateOutcome::Changed`] if any row changed and
    /// [`UpdateOutcome::NoChange`] if the window was open but nothing
    /// needed changing.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotFound`] for an unknown ticket or leg.
    /// - [`EngineError::CutoffPassed`] when the window has closed and
    ///   nothing changed.
    /// - [`EngineError::InvalidTransition`] for a leg state move outside
    ///   the machine.
    ///
    /// An error means nothing was written: a bad leg half fails the call
    /// before the status half may commit.
    pub fn update_ticket_state(
        &self,
        ticket_id: TicketId,
        update: TicketUpdate,
    ) -> Result<UpdateOutcome, EngineError> {
        let service_id = self
            .tickets
            .service_of(ticket_id)
            .ok_or(EngineError::NotFound(Entity::Ticket))?;
        let service = self
            .services
            .get(&service_id)
            .ok_or(EngineError::NotFound(Entity::Service))?;
        let mut data = service.lock_bounded(self.config.lock_timeout, self.config.lock_retries)?;
        let outcome = data.apply_ticket_update(
            ticket_id,
            update.status,
            update.leg,
            self.config.clock.now(),
        )?;
        debug!(ticket = %ticket_id, changed = matches!(outcome, UpdateOutcome::Changed), "ticket update applied");
        Ok(outcome)
    }

    /// Removes a ticket and its legs.
    ///
    /// No capacity is reclaimed, matching the source system; cancel the
    /// ticket first if its reservation should return to the ledger.
    pub fn delete_ticket(&self, ticket_id: TicketId) -> Result<(), EngineError> {
        let service_id = self
            .tickets
            .service_of(ticket_id)
            .ok_or(EngineError::NotFound(Entity::Ticket))?;
        let Some(service) = self.services.get(&service_id) else {
            // Stale index entry for a since-deleted service.
            self.tickets.remove(ticket_id);
            return Err(EngineError::NotFound(Entity::Ticket));
        };
        let mut data = service.lock_bounded(self.config.lock_timeout, self.config.lock_retries)?;
        data.remove_ticket(ticket_id)?;
        drop(data);
        self.tickets.remove(ticket_id);
        debug!(ticket = %ticket_id, "ticket deleted");
        Ok(())
    }

    // --- driver side channel ---

    pub fn driver(&self, id: DriverId) -> Option<Driver> {
        self.directory.driver(id)
    }

    /// Updates a driver's operational status and/or rating.
    pub fn update_driver(
        &self,
        id: DriverId,
        update: DriverUpdate,
    ) -> Result<UpdateOutcome, EngineError> {
        let changed = self.directory.update_driver(id, |driver| {
            let mut changed = false;
            if let Some(status) = update.status {
                if driver.status != status {
                    driver.status = status;
                    changed = true;
                }
            }
            if let Some(rating) = update.rating {
                if driver.rating != Some(rating) {
                    driver.rating = Some(rating);
                    changed = true;
                }
            }
            changed
        })?;
        Ok(if changed {
            UpdateOutcome::Changed
        } else {
            UpdateOutcome::NoChange
        })
    }

    /// Upserts a driver's availability state.
    ///
    /// `order_type`/`order_id` are only applied while the driver is not
    /// already mid-order; an in-flight assignment is never clobbered.
    pub fn set_driver_state(
        &self,
        id: DriverId,
        state: Option<AvailabilityState>,
        order_type: Option<String>,
        order_id: Option<String>,
    ) -> Result<UpdateOutcome, EngineError> {
        self.directory.require_driver(id)?;
        let mut entry = self.driver_states.entry(id).or_default();
        let changed = entry.apply(state, order_type, order_id);
        Ok(if changed {
            UpdateOutcome::Changed
        } else {
            UpdateOutcome::NoChange
        })
    }

    pub fn driver_state(&self, id: DriverId) -> Option<DriverState> {
        self.driver_states.get(&id).map(|s| s.clone())
    }

    // --- views for the rendering layer ---

    pub fn service_snapshot(&self, service_id: ServiceId) -> Result<ServiceSnapshot, EngineError> {
        let service = self
            .services
            .get(&service_id)
            .ok_or(EngineError::NotFound(Entity::Service))?;
        Ok(service.snapshot())
    }

    /// Snapshots of all services, ordered by id.
    pub fn service_snapshots(&self) -> Vec<ServiceSnapshot> {
        let mut snapshots: Vec<ServiceSnapshot> =
            self.services.iter().map(|s| s.snapshot()).collect();
        snapshots.sort_by_key(|s| s.id);
        snapshots
    }

    pub fn ticket_snapshot(&self, ticket_id: TicketId) -> Result<TicketSnapshot, EngineError> {
        let service_id = self
            .tickets
            .service_of(ticket_id)
            .ok_or(EngineError::NotFound(Entity::Ticket))?;
        let service = self
            .services
            .get(&service_id)
            .ok_or(EngineError::NotFound(Entity::Service))?;
        let data = service.lock_bounded(self.config.lock_timeout, self.config.lock_retries)?;
        let ticket = data
            .ticket(ticket_id)
            .cloned()
            .ok_or(EngineError::NotFound(Entity::Ticket))?;
        Ok(TicketSnapshot {
            service: service_id,
            ticket,
        })
    }

    /// Number of tickets currently issued across all services.
    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    /// Drains and returns ticket ids in issue order, for end-of-run
    /// reporting.
    pub fn drain_issue_order(&self) -> Vec<TicketId> {
        self.tickets.drain_issue_order()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
