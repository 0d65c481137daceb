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

//! # Transit Engine
//!
//! This library provides the service capacity and ticket lifecycle engine
//! of a transport-booking backend: operators schedule services (a vehicle
//! run for passengers or cargo), customers book tickets against a
//! service's finite capacity, and cancellations reclaim capacity subject
//! to a wait-time cutoff before departure.
//!
//! ## Core Components
//!
//! - [`Engine`]: central orchestrator; the only writer of capacity ledgers
//! - [`CapacityLedger`]: per-service capacity counters (seats or kilograms)
//! - [`Ticket`] / [`Leg`]: a reservation and the units consuming capacity
//! - [`EngineError`]: failure taxonomy surfaced to the transport layer
//!
//! ## Example
//!
//! ```
//! use transit_engine_rs::{
//!     BookingRequest, CapacityConfig, CapacityKind, DriverId, Engine, LegInput, NewService,
//!     PassengerLeg, PayDetails, UserId,
//! };
//!
//! let engine = Engine::new();
//! engine.register_driver(DriverId(1));
//! engine.register_user(UserId(1));
//!
//! let service = engine
//!     .create_service(NewService {
//!         driver: DriverId(1),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! engine
//!     .configure_capacity(
//!         service,
//!         CapacityConfig {
//!             kind: Some(CapacityKind::Passenger),
//!             max_count: 4,
//!             price: None,
//!         },
//!     )
//!     .unwrap();
//!
//! let ticket = engine
//!     .book_ticket(
//!         service,
//!         BookingRequest {
//!             user: UserId(1),
//!             promo_code: None,
//!             legs: vec![LegInput::Passenger(PassengerLeg::default())],
//!             payment: PayDetails::default(),
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(engine.service_snapshot(service).unwrap().ledger.available_count(), 3);
//! assert_eq!(engine.ticket_snapshot(ticket).unwrap().service, service);
//! ```
//!
//! ## Thread Safety
//!
//! Each service aggregate sits behind its own lock, so bookings against
//! different services proceed in parallel while a single ledger's
//! read-check-write path is linearized: two concurrent bookings never
//! both succeed when only one unit of capacity remains.

pub mod base;
mod directory;
pub mod driver;
mod engine;
pub mod error;
pub mod ledger;
pub mod service;
pub mod ticket;
mod ticket_index;

pub use base::{DriverId, LegId, RouteId, ServiceId, TicketId, UserId};
pub use driver::{AvailabilityState, Driver, DriverState, DriverStatus};
pub use engine::{
    BookingRequest, CapacityConfig, Clock, DriverUpdate, Engine, EngineConfig, NewService,
    SeedTicket, ServiceUpdate, SystemClock, TicketSnapshot, TicketUpdate,
};
pub use error::{EngineError, Entity};
pub use ledger::{CapacityKind, CapacityLedger};
pub use service::{Service, ServiceSnapshot, ServiceState, UpdateOutcome};
pub use ticket::{
    CargoLeg, Leg, LegBody, LegInput, LegState, PassengerLeg, PayDetails, Ticket, TicketStatus,
};
pub use ticket_index::TicketIndex;
