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

#![deny(missing_docs)]

//! # Traceback: Probabilistic Packet Marking and Path Reconstruction
//! This is a library for simulating probabilistic packet marking (PPM) on a network under a
//! flooding attack, and for reconstructing the attack path (or tree) at the victim.
//!
//! ## Structure
//!
//! - **[`Topology`](topology)**: Directed network of routers, with the attackers and the victim.
//!   Attack traffic follows a shortest-path tree towards the victim. See
//!   [`TopologyBuilder`](topology::TopologyBuilder).
//!
//! - **[`Marking`](marking)**: The mark carried by every packet, and the per-hop marking
//!   algorithms: node sampling, edge sampling and edge fragment sampling. The compact fragment
//!   encoding lives in [`encoding`](marking::encoding).
//!
//! - **[`Simulate`](simulate)**: Send packets from the attackers to the victim and collect the
//!   marks in an [`ObservationSet`](simulate::ObservationSet). Runs are reproducible from their
//!   seed, and can be distributed over multiple threads without changing the result.
//!
//! - **[`Reconstruction`](reconstruction)**: Invert the collected marks into a
//!   [`ReconstructedGraph`](reconstruction::ReconstructedGraph). Missing or ambiguous information
//!   is reported as data, never as an error.
//!
//! - **[`Compare`](compare)**: Precision and recall of a reconstruction against the ground truth.
//!
//! - **[`Experiment`](experiment)**: Sweep the marking probability and the packet count, and
//!   summarize the convergence of the reconstruction.
//!
//! - **[`ExampleNetworks`](example_networks)**: Prepared topologies, some of which can be scaled
//!   to arbitrary size.
//!
//! ## Usage
//!
//! ```
//! use traceback::{compare, reconstruct, simulate_run, Error};
//! use traceback::marking::Algorithm;
//! use traceback::topology::TopologyBuilder;
//!
//! fn main() -> Result<(), Error> {
//!     let mut t = TopologyBuilder::new();
//!     let a = t.add_router("attacker")?;
//!     let r = t.add_router("r1")?;
//!     let v = t.add_router("victim")?;
//!     t.add_link(a, r)?;
//!     t.add_link(r, v)?;
//!     t.add_attacker(a)?;
//!     t.set_victim(v)?;
//!     let topo = t.build()?;
//!
//!     let observations = simulate_run(&topo, Algorithm::EdgeSampling, 0.5, 1000, 42)?;
//!     let reconstructed = reconstruct(&observations, Algorithm::EdgeSampling, 10);
//!     let metrics = compare(&reconstructed, &topo);
//!
//!     assert_eq!(metrics.recall, 1.0);
//!     assert!(metrics.spurious_edges.is_empty());
//!
//!     Ok(())
//! }
//! ```

pub mod example_networks;
mod test;

pub mod compare;
mod error;
pub mod experiment;
pub mod marking;
pub mod reconstruction;
pub mod simulate;
pub mod topology;

pub use compare::compare;
pub use error::Error;
pub use reconstruction::reconstruct;
pub use simulate::simulate_run;

use std::sync::{Arc, RwLock};

/// Stopper, to check when to stop a long-running sweep. All clones share the same flag.
#[derive(Debug, Clone)]
pub struct Stopper {
    b: Arc<RwLock<bool>>,
}

impl Default for Stopper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopper {
    /// Create a new stopper
    pub fn new() -> Self {
        Self { b: Arc::new(RwLock::new(false)) }
    }

    /// Send the stop command. This function will block until the write lock can be acquired.
    pub fn send_stop(&self) {
        match self.b.write() {
            Ok(mut b) => *b = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
    }

    /// Checks if the stop flag is set. This function will block until the read lock can be
    /// acquired. A poisoned lock counts as stopped.
    pub fn is_stop(&self) -> bool {
        self.b.read().map(|b| *b).unwrap_or(true)
    }
}
