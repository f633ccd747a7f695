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

#![deny(missing_docs, missing_debug_implementations)]

//! # Topology Model
//!
//! Directed network of routers, with one or more attackers and a single victim. Routing is
//! computed when the topology is built: every router forwards attack traffic along a shortest path
//! towards the victim.
//!
//! ## Example usage
//!
//! The following example generates the linear topology `A -> R1 -> R2 -> R3 -> V`.
//!
//! ```rust
//! use traceback::topology::TopologyBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut t = TopologyBuilder::new();
//!
//!     let a = t.add_router("A")?;
//!     let r1 = t.add_router("R1")?;
//!     let r2 = t.add_router("R2")?;
//!     let r3 = t.add_router("R3")?;
//!     let v = t.add_router("V")?;
//!
//!     t.add_link(a, r1)?;
//!     t.add_link(r1, r2)?;
//!     t.add_link(r2, r3)?;
//!     t.add_link(r3, v)?;
//!
//!     t.add_attacker(a)?;
//!     t.set_victim(v)?;
//!
//!     let topo = t.build()?;
//!
//!     assert_eq!(topo.path(a, v)?, vec![a, r1, r2, r3, v]);
//!     assert_eq!(topo.distance_to_victim(a), Some(4));
//!
//!     Ok(())
//! }
//! ```

mod network;
mod router;
mod types;

pub use network::{AttackGraph, Topology, TopologyBuilder, TopologySpec};
pub use router::Router;
pub use types::{ConfigurationError, LinkGraph, RouterId};
