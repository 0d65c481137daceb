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

//! Reference directory of known users, routes and drivers.
//!
//! The engine only needs existence checks and the driver record itself;
//! full admin CRUD for these entities lives outside the core and feeds
//! registrations in with already-validated ids.

use crate::base::{DriverId, RouteId, UserId};
use crate::driver::Driver;
use crate::error::{EngineError, Entity};
use dashmap::DashMap;

#[derive(Debug, Default)]
pub(crate) struct Directory {
    users: DashMap<UserId, ()>,
    routes: DashMap<RouteId, ()>,
    drivers: DashMap<DriverId, Driver>,
}

impl Directory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_user(&self, id: UserId) {
        self.users.insert(id, ());
    }

    pub(crate) fn register_route(&self, id: RouteId) {
        self.routes.insert(id, ());
    }

    pub(crate) fn register_driver(&self, id: DriverId) {
        self.drivers.entry(id).or_insert_with(|| Driver::new(id));
    }

    pub(crate) fn require_user(&self, id: UserId) -> Result<(), EngineError> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(EngineError::NotFound(Entity::User))
        }
    }

    pub(crate) fn require_route(&self, id: RouteId) -> Result<(), EngineError> {
        if self.routes.contains_key(&id) {
            Ok(())
        } else {
            Err(EngineError::NotFound(Entity::Route))
        }
    }

    pub(crate) fn require_driver(&self, id: DriverId) -> Result<(), EngineError> {
        if self.drivers.contains_key(&id) {
            Ok(())
        } else {
            Err(EngineError::NotFound(Entity::Driver))
        }
    }

    pub(crate) fn driver(&self, id: DriverId) -> Option<Driver> {
        self.drivers.get(&id).map(|d| d.clone())
    }

    pub(crate) fn update_driver<F>(&self, id: DriverId, f: F) -> Result<bool, EngineError>
    where
        F: FnOnce(&mut Driver) -> bool,
    {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or(EngineError::NotFound(Entity::Driver))?;
        Ok(f(&mut driver))
    }
}
