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

//! Tickets, their attached payment record, and leg records.
//!
//! A ticket is a reservation against one service. The legs inside it are
//! what actually consume capacity, and each leg carries its own state
//! independent of the ticket's status:
//!
//! `Pending -> InProgress -> Completed`, and
//! `Pending | InProgress -> Cancelled` (both end states terminal).

use crate::base::{LegId, TicketId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ticket status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl TicketStatus {
    /// Wire code (1 = pending, 2 = confirmed, 3 = cancelled).
    pub fn code(self) -> u8 {
        match self {
            TicketStatus::Pending => 1,
            TicketStatus::Confirmed => 2,
            TicketStatus::Cancelled => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TicketStatus::Pending),
            2 => Some(TicketStatus::Confirmed),
            3 => Some(TicketStatus::Cancelled),
            _ => None,
        }
    }
}

/// Per-leg state, independent of the parent ticket's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegState {
    Pending,
    InProgress,
    Cancelled,
    Completed,
}

impl LegState {
    /// Wire code (1 = pending, 2 = in progress, 3 = cancelled, 4 = completed).
    pub fn code(self) -> u8 {
        match self {
            LegState::Pending => 1,
            LegState::InProgress => 2,
            LegState::Cancelled => 3,
            LegState::Completed => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(LegState::Pending),
            2 => Some(LegState::InProgress),
            3 => Some(LegState::Cancelled),
            4 => Some(LegState::Completed),
            _ => None,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition.
    ///
    /// The source system accepted arbitrary state values here; the engine
    /// enforces the intended machine instead.
    pub fn can_transition(self, to: LegState) -> bool {
        matches!(
            (self, to),
            (LegState::Pending, LegState::InProgress)
                | (LegState::Pending, LegState::Cancelled)
                | (LegState::InProgress, LegState::Completed)
                | (LegState::InProgress, LegState::Cancelled)
        )
    }
}

/// Opaque payment record attached 1:1 to a ticket at creation.
///
/// All fields are pass-through; the engine never interprets them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayDetails {
    pub method: Option<String>,
    pub price: Option<Decimal>,
    /// External payment order id.
    pub order_id: Option<String>,
}

/// Passenger leg fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerLeg {
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    /// Corrected destination, when dispatch fixes up the requested one.
    pub to_fix_address: Option<String>,
    pub is_child: bool,
    pub phone_number: Option<String>,
    pub seat: Option<u32>,
}

/// Cargo leg fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoLeg {
    /// Weight in kilograms; the amount debited from the capacity ledger.
    pub weight_kg: u32,
}

/// Leg input supplied with a booking call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegInput {
    Passenger(PassengerLeg),
    Cargo(CargoLeg),
}

/// Kind-specific body of a stored leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegBody {
    Passenger(PassengerLeg),
    Cargo(CargoLeg),
}

/// A leg record: the unit actually consuming capacity inside a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub id: LegId,
    pub state: LegState,
    pub body: LegBody,
}

impl Leg {
    pub fn new(id: LegId, input: LegInput) -> Self {
        let body = match input {
            LegInput::Passenger(p) => LegBody::Passenger(p),
            LegInput::Cargo(c) => LegBody::Cargo(c),
        };
        Self {
            id,
            state: LegState::Pending,
            body,
        }
    }

    /// Units this leg returns to the ledger when cancelled: one seat for a
    /// passenger leg, the declared weight for a cargo leg.
    pub fn capacity_units(&self) -> u32 {
        match &self.body {
            LegBody::Passenger(_) => 1,
            LegBody::Cargo(c) => c.weight_kg,
        }
    }
}

/// A reservation against one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub holder: Option<UserId>,
    pub promo_code: Option<String>,
    pub status: TicketStatus,
    pub pay: PayDetails,
    pub legs: Vec<Leg>,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(
        id: TicketId,
        holder: Option<UserId>,
        promo_code: Option<String>,
        pay: PayDetails,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            holder,
            promo_code,
            status: TicketStatus::Pending,
            pay,
            legs: Vec::new(),
            created_at,
        }
    }

    pub fn leg(&self, leg_id: LegId) -> Option<&Leg> {
        self.legs.iter().find(|l| l.id == leg_id)
    }

    pub fn leg_mut(&mut self, leg_id: LegId) -> Option<&mut Leg> {
        self.legs.iter_mut().find(|l| l.id == leg_id)
    }
}
