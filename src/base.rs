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

//! Core identifier types for services, tickets, legs and their references.
//!
//! Service, ticket and leg ids are allocated by the engine. Driver, route
//! and user ids are assigned by the surrounding system and registered with
//! the engine's directory before they may be referenced.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize,
            Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Unique identifier for a scheduled service (one vehicle run).
    ServiceId
}

id_type! {
    /// Unique identifier for a ticket booked against a service.
    TicketId
}

id_type! {
    /// Unique identifier for a leg (passenger or cargo) within a ticket.
    LegId
}

id_type! {
    /// Identifier for a driver, assigned by the admin layer.
    DriverId
}

id_type! {
    /// Identifier for a route, assigned by the admin layer.
    RouteId
}

id_type! {
    /// Identifier for a user (ticket holder), assigned by the admin layer.
    UserId
}
