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

//! # Evaluation
//!
//! Compare a reconstructed attack graph with the ground truth of the topology.

use crate::reconstruction::ReconstructedGraph;
use crate::topology::{AttackGraph, RouterId, Topology};

use std::collections::BTreeSet;

/// Quality of a reconstruction. Precision and recall are computed on the edges. If there is
/// nothing to divide by, the respective value is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Fraction of reconstructed edges which are true edges
    pub precision: f64,
    /// Fraction of true edges which were reconstructed
    pub recall: f64,
    /// Fraction of reconstructed nodes which are part of an attack path
    pub node_precision: f64,
    /// Fraction of the nodes on the attack paths which were reconstructed
    pub node_recall: f64,
    /// Nodes on the attack paths which were not reconstructed
    pub missing_nodes: BTreeSet<RouterId>,
    /// Reconstructed nodes which are not on any attack path
    pub spurious_nodes: BTreeSet<RouterId>,
    /// Attack edges which were not reconstructed
    pub missing_edges: BTreeSet<(RouterId, RouterId)>,
    /// Reconstructed edges which do not exist in the attack graph
    pub spurious_edges: BTreeSet<(RouterId, RouterId)>,
}

impl Metrics {
    /// Returns `true` if the reconstruction is exactly the attack graph.
    pub fn is_exact(&self) -> bool {
        self.missing_nodes.is_empty()
            && self.spurious_nodes.is_empty()
            && self.missing_edges.is_empty()
            && self.spurious_edges.is_empty()
    }
}

/// Compare the reconstruction with the union of all attack paths of the topology. Only confirmed
/// nodes and edges are considered.
pub fn compare(reconstructed: &ReconstructedGraph, topology: &Topology) -> Metrics {
    compare_graph(reconstructed, &topology.attack_graph())
}

/// Compare the reconstruction with a known attack graph.
pub fn compare_graph(reconstructed: &ReconstructedGraph, truth: &AttackGraph) -> Metrics {
    let nodes: BTreeSet<RouterId> = reconstructed.nodes.keys().copied().collect();
    let edges: BTreeSet<(RouterId, RouterId)> = reconstructed.edges.keys().copied().collect();

    let true_edges = edges.intersection(&truth.edges).count();
    let true_nodes = nodes.intersection(&truth.nodes).count();

    Metrics {
        precision: ratio(true_edges, edges.len()),
        recall: ratio(true_edges, truth.edges.len()),
        node_precision: ratio(true_nodes, nodes.len()),
        node_recall: ratio(true_nodes, truth.nodes.len()),
        missing_nodes: truth.nodes.difference(&nodes).copied().collect(),
        spurious_nodes: nodes.difference(&truth.nodes).copied().collect(),
        missing_edges: truth.edges.difference(&edges).copied().collect(),
        spurious_edges: edges.difference(&truth.edges).copied().collect(),
    }
}

fn ratio(a: usize, b: usize) -> f64 {
    if b == 0 {
        0.0
    } else {
        a as f64 / b as f64
    }
}
