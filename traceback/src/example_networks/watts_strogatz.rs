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

//! # Watts-Strogatz Net
//! Random small-world topology, regenerated until it is connected.

use super::ExampleNetwork;
use crate::topology::{ConfigurationError, Topology, TopologyBuilder};

use log::*;
use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use rand::prelude::*;
use std::collections::BTreeSet;

/// Number of graphs generated before giving up on finding a connected one
const MAX_ATTEMPTS: u64 = 100;

/// # Watts-Strogatz Net
///
/// Start with a ring of `n` routers, each connected to its `k / 2` nearest neighbors on either
/// side. Then, every edge `(u, u + j)` is rewired with probability `beta` to `(u, w)`, where `w` is
/// chosen uniformly among the routers not yet connected to `u`. All links are bidirectional.
///
/// Disconnected graphs are discarded, and the graph is regenerated with the next seed. Routers
/// are named `r00`, `r01`, ..., and router `ri` has id `i`.
///
/// As an [`ExampleNetwork`], the variant is the seed, router 0 is the victim and router 1 the
/// attacker, on a graph with `n = 20`, `k = 2` and `beta = 0.75`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WattsStrogatzNet {
    /// Number of routers
    pub n: usize,
    /// Each router is connected to its `k` nearest neighbors in the ring
    pub k: usize,
    /// Rewiring probability
    pub beta: f64,
    /// Seed of the first attempt
    pub seed: u64,
}

impl Default for WattsStrogatzNet {
    fn default() -> Self {
        Self { n: 20, k: 2, beta: 0.75, seed: 0 }
    }
}

impl WattsStrogatzNet {
    /// Create a new generator
    pub fn new(n: usize, k: usize, beta: f64, seed: u64) -> Self {
        Self { n, k, beta, seed }
    }

    /// Generate the undirected edges of a connected graph. Each edge `(a, b)` has `a < b`.
    pub fn edges(&self) -> Result<BTreeSet<(usize, usize)>, ConfigurationError> {
        if self.n < 2 {
            return Err(ConfigurationError::InvalidTopologyParameters(format!(
                "need at least 2 routers, not {}",
                self.n
            )));
        }
        if self.k < 2 || self.k >= self.n {
            return Err(ConfigurationError::InvalidTopologyParameters(format!(
                "k must be between 2 and n - 1, not {}",
                self.k
            )));
        }
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(ConfigurationError::InvalidTopologyParameters(format!(
                "beta must be between 0 and 1, not {}",
                self.beta
            )));
        }

        for attempt in 0..MAX_ATTEMPTS {
            let edges = self.generate(self.seed.wrapping_add(attempt));
            if is_connected(self.n, &edges) {
                return Ok(edges);
            }
            info!("Need to regenerate graph, not connected");
        }
        Err(ConfigurationError::InvalidTopologyParameters(format!(
            "no connected graph found after {} attempts",
            MAX_ATTEMPTS
        )))
    }

    /// Generate a connected graph, with the given victim and attackers (by their index).
    pub fn build(&self, victim: usize, attackers: &[usize]) -> Result<Topology, ConfigurationError> {
        let edges = self.edges()?;

        let mut t = TopologyBuilder::new();
        let routers = (0..self.n).map(|i| t.add_router(format!("r{:02}", i))).collect::<Result<Vec<_>, _>>()?;
        for (a, b) in edges {
            t.add_bidirectional_link(routers[a], routers[b])?;
        }

        let router = |i: usize| {
            routers.get(i).copied().ok_or_else(|| {
                ConfigurationError::InvalidTopologyParameters(format!("router {} does not exist", i))
            })
        };
        t.set_victim(router(victim)?)?;
        for attacker in attackers {
            t.add_attacker(router(*attacker)?)?;
        }

        t.build()
    }

    fn generate(&self, seed: u64) -> BTreeSet<(usize, usize)> {
        let n = self.n;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();

        for j in 1..=(self.k / 2) {
            for u in 0..n {
                edges.insert(ordered(u, (u + j) % n));
            }
        }

        for j in 1..=(self.k / 2) {
            for u in 0..n {
                if !rng.gen_bool(self.beta) {
                    continue;
                }
                let old = ordered(u, (u + j) % n);
                if !edges.contains(&old) {
                    continue;
                }
                let candidates: Vec<usize> =
                    (0..n).filter(|w| *w != u && !edges.contains(&ordered(u, *w))).collect();
                if candidates.is_empty() {
                    continue;
                }
                let w = candidates[rng.gen_range(0, candidates.len())];
                edges.remove(&old);
                edges.insert(ordered(u, w));
            }
        }

        edges
    }
}

impl ExampleNetwork for WattsStrogatzNet {
    fn net(variant: usize) -> Result<Topology, ConfigurationError> {
        Self { seed: variant as u64, ..Default::default() }.build(0, &[1])
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn is_connected(n: usize, edges: &BTreeSet<(usize, usize)>) -> bool {
    let mut g: UnGraph<(), ()> = UnGraph::with_capacity(n, edges.len());
    for _ in 0..n {
        g.add_node(());
    }
    g.extend_with_edges(edges.iter().map(|(a, b)| (*a as u32, *b as u32)));
    connected_components(&g) == 1
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ring_without_rewiring() {
        let edges = WattsStrogatzNet::new(6, 2, 0.0, 0).edges().unwrap();
        assert_eq!(edges.len(), 6);
        assert!(edges.contains(&(0, 5)));
        assert!(edges.contains(&(2, 3)));
    }

    #[test]
    fn rewiring_keeps_edge_count() {
        let net = WattsStrogatzNet::new(30, 4, 0.5, 3);
        let edges = net.edges().unwrap();
        assert_eq!(edges.len(), 60);
        assert!(edges.iter().all(|(a, b)| a < b && *b < 30));
        assert_eq!(net.edges().unwrap(), edges);
    }

    #[test]
    fn invalid_parameters() {
        assert!(WattsStrogatzNet::new(1, 2, 0.5, 0).edges().is_err());
        assert!(WattsStrogatzNet::new(10, 10, 0.5, 0).edges().is_err());
        assert!(WattsStrogatzNet::new(10, 2, 1.5, 0).edges().is_err());
        assert!(WattsStrogatzNet::new(10, 2, 0.5, 0).build(0, &[10]).is_err());
    }
}
