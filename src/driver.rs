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

//! Driver records and the driver availability side channel.
//!
//! Driver state travels alongside service and ticket updates but has no
//! capacity coupling: it is a small state holder keyed by driver id,
//! upserted on demand.

use crate::base::DriverId;
use serde::{Deserialize, Serialize};

/// Operational driver status (1 = active, 2 = inactive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStatus {
    Active,
    Inactive,
}

/// A registered driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub status: DriverStatus,
    pub rating: Option<u32>,
}

impl Driver {
    pub fn new(id: DriverId) -> Self {
        Self {
            id,
            status: DriverStatus::Active,
            rating: None,
        }
    }
}

/// Current availability of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvailabilityState {
    Available,
    OnOrder,
    Offline,
}

/// The driver's current order assignment, if any.
///
/// `order_type` and `order_id` are only rewritten while the driver is not
/// already mid-order; an in-flight assignment is never clobbered by a
/// concurrent update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverState {
    pub state: AvailabilityState,
    pub order_type: Option<String>,
    pub order_id: Option<String>,
}

impl DriverState {
    pub fn new() -> Self {
        Self {
            state: AvailabilityState::Available,
            order_type: None,
            order_id: None,
        }
    }

    pub fn mid_order(&self) -> bool {
        self.state == AvailabilityState::OnOrder
    }

    /// Applies an upsert: the availability state always wins, the order
    /// fields only when the driver was not already mid-order.
    pub fn apply(
        &mut self,
        state: Option<AvailabilityState>,
        order_type: Option<String>,
        order_id: Option<String>,
    ) -> bool {
        let was_mid_order = self.mid_order();
        let mut changed = false;
        if let Some(state) = state {
            if self.state != state {
                self.state = state;
                changed = true;
            }
        }
        if !was_mid_order {
            if order_type.is_some() && self.order_type != order_type {
                self.order_type = order_type;
                changed = true;
            }
            if order_id.is_some() && self.order_id != order_id {
                self.order_id = order_id;
                changed = true;
            }
        }
        changed
    }
}

impl Default for DriverState {
    fn default() -> Self {
        Self::new()
    }
}
