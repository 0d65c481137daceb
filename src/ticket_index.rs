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

//! Thread-safe global ticket index.
//!
//! Maps every issued ticket id to the service that owns it, with duplicate
//! detection, and keeps a FIFO log of issue order for reporting.

use crate::base::{ServiceId, TicketId};
use crate::error::EngineError;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Global `TicketId -> ServiceId` index.
///
/// Combines a [`DashMap`] for O(1) ownership lookup with a [`SegQueue`]
/// preserving issue order. All operations are safe for concurrent access.
#[derive(Debug, Default)]
pub struct TicketIndex {
    /// Owning service per ticket for O(1) lookup.
    owners: DashMap<TicketId, ServiceId>,

    /// Ticket ids in issue order, for reporting.
    issued: SegQueue<TicketId>,
}

impl TicketIndex {
    pub fn new() -> Self {
        Self {
            owners: DashMap::new(),
            issued: SegQueue::new(),
        }
    }

    /// Records a freshly issued ticket.
    ///
    /// Ticket ids are allocated from an atomic counter, so a duplicate
    /// here means the engine replayed an insert; the entry API makes the
    /// check-and-insert atomic and the caller sees it as a transient
    /// conflict.
    pub(crate) fn insert(
        &self,
        ticket_id: TicketId,
        service_id: ServiceId,
    ) -> Result<(), EngineError> {
        match self.owners.entry(ticket_id) {
            Entry::Occupied(_) => Err(EngineError::ConcurrentModification),
            Entry::Vacant(entry) => {
                entry.insert(service_id);
                self.issued.push(ticket_id);
                Ok(())
            }
        }
    }

    /// The service owning `ticket_id`, if the ticket still exists.
    pub fn service_of(&self, ticket_id: TicketId) -> Option<ServiceId> {
        self.owners.get(&ticket_id).map(|r| *r)
    }

    pub(crate) fn remove(&self, ticket_id: TicketId) {
        self.owners.remove(&ticket_id);
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Drains the issue-order log.
    ///
    /// Ids of since-deleted tickets are skipped. The log is consumed; this
    /// is meant for end-of-run reporting, not steady-state queries.
    pub fn drain_issue_order(&self) -> Vec<TicketId> {
        let mut out = Vec::new();
        while let Some(id) = self.issued.pop() {
            if self.owners.contains_key(&id) {
                out.push(id);
            }
        }
        out
    }
}
