// Traceback: Probabilistic Packet Marking and Path Reconstruction
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Router
//!
//! A router in the topology only knows its name, its id and the ordered list of neighbors to which
//! it has an outgoing link. Routers keep no state across packets; marking is performed on values
//! passed through them (see [`marking`](crate::marking)).

use crate::topology::RouterId;

/// Router (or host) in the topology. Attackers and the victim are routers as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    name: String,
    router_id: RouterId,
    neighbors: Vec<RouterId>,
}

impl Router {
    pub(crate) fn new(name: String, router_id: RouterId) -> Router {
        Router { name, router_id, neighbors: Vec::new() }
    }

    /// Return the name of the router
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the id of the router
    pub fn router_id(&self) -> RouterId {
        self.router_id
    }

    /// Outbound neighbors, in the order in which the links were added.
    pub fn neighbors(&self) -> &[RouterId] {
        &self.neighbors
    }

    /// Adds a neighbor. Returns `false` if the neighbor was already known.
    pub(crate) fn add_neighbor(&mut self, neighbor: RouterId) -> bool {
        if self.neighbors.contains(&neighbor) {
            false
        } else {
            self.neighbors.push(neighbor);
            true
        }
    }
}
