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

//! Error types for the capacity and lifecycle engine.

use crate::ticket::LegState;
use std::fmt;
use thiserror::Error;

/// The kind of entity a [`EngineError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Service,
    Ticket,
    Leg,
    Driver,
    Route,
    User,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Service => "service",
            Entity::Ticket => "ticket",
            Entity::Leg => "leg",
            Entity::Driver => "driver",
            Entity::Route => "route",
            Entity::User => "user",
        };
        f.write_str(name)
    }
}

/// Engine processing errors.
///
/// Everything here propagates unmodified through the transport layer.
/// The one silent behavior the engine has is the saturating release on
/// over-reclaim, which is a deliberate arithmetic choice, not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A referenced service, ticket, leg, driver, route or user is absent
    #[error("{0} not found")]
    NotFound(Entity),

    /// The service has no capacity left; carries the observed remainder
    #[error("no capacity available (remaining: {available})")]
    CapacityExhausted { available: u32 },

    /// Service deletion refused while tickets still reference it
    #[error("service still has {tickets} dependent ticket(s)")]
    HasDependents { tickets: usize },

    /// The wait-time cutoff before the scheduled start has passed
    #[error("cancellation window for this service has closed")]
    CutoffPassed,

    /// Lock wait on the service aggregate was exhausted; retryable
    #[error("service aggregate is busy, retry the operation")]
    ConcurrentModification,

    /// Leg state machine violation
    #[error("invalid leg state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: LegState, to: LegState },

    /// Capacity kind cannot change once the service has booked legs
    #[error("capacity kind is fixed once legs have been booked")]
    KindFixed,

    /// Zero ceiling, or reconfiguration while capacity is outstanding
    #[error("invalid capacity configuration")]
    InvalidCapacity,

    /// A leg input of the wrong kind for the service's capacity ledger
    #[error("leg input does not match the service capacity kind")]
    WrongLegKind,
}
