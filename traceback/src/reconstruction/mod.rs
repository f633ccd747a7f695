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

//! # Reconstruction
//!
//! Invert the marks collected by the victim into an attack graph. Each algorithm has its own
//! reconstruction, and each yields a structurally different [`ReconstructedGraph`]:
//!
//! - **Node sampling** only knows how often each router was sampled. Routers are ranked by their
//!   frequency, and the ranking is interpreted as a path towards the victim.
//! - **Edge sampling** knows edges and their distance to the victim. Edges are chained from the
//!   victim backwards, producing a tree.
//! - **Edge fragment sampling** must first reassemble the edges from their fragments (see
//!   [`FragmentAccumulator`]), and then chains them like edge sampling.
//!
//! Reconstruction never fails. An empty or unreliable reconstruction is reported with its
//! [`ReconstructionStatus`], and all observations below the minimum support are listed as
//! unconfirmed. The result does not depend on the order of the observations.

mod edge_sampling;
mod fragment;
mod node_sampling;

pub use fragment::{DecodedEdges, FragmentAccumulator, MAX_COMBINATIONS};

use crate::marking::{Algorithm, EdgeCodec};
use crate::simulate::ObservationSet;
use crate::topology::RouterId;

use log::*;
use std::collections::BTreeMap;

/// How conflicting edges at the same distance are treated by the edge reconstructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeResolution {
    /// All supported edges are accepted, which produces a tree for multiple attackers. Edges
    /// leaving the same router are still resolved by majority.
    Tree,
    /// A single attack path is assumed. Only the edge with the strictly largest support is
    /// accepted at each distance. Ties are reported, and none of the tied edges is accepted.
    MajorityVote,
}

impl Default for EdgeResolution {
    fn default() -> Self {
        EdgeResolution::Tree
    }
}

/// Parameters of the reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconstructionConfig {
    /// Nodes and edges with fewer supporting observations are listed as unconfirmed.
    pub min_support: usize,
    /// How conflicts at the same distance are resolved
    pub resolution: EdgeResolution,
    /// Fragment layout (must match the one used for marking)
    pub codec: EdgeCodec,
}

impl ReconstructionConfig {
    /// Default configuration with the given minimum support
    pub fn new(min_support: usize) -> Self {
        Self { min_support, ..Default::default() }
    }

    /// Set the conflict resolution
    pub fn resolution(mut self, resolution: EdgeResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the fragment layout
    pub fn codec(mut self, codec: EdgeCodec) -> Self {
        self.codec = codec;
        self
    }
}

/// Overall status of a reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconstructionStatus {
    /// Everything observed could be explained
    Complete,
    /// Something was reconstructed, but some observations remain unconfirmed or unresolved.
    Partial,
    /// No informative observation, or nothing reached the minimum support
    InsufficientData,
}

/// Support of a reconstructed node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSupport {
    /// Number of observations supporting this node
    pub support: usize,
    /// Fraction of all marked observations supporting this node
    pub confidence: f64,
    /// Inferred number of hops towards the victim
    pub distance: usize,
}

/// Support of a reconstructed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeSupport {
    /// Number of observations supporting this edge (for fragments: of its rarest fragment)
    pub support: usize,
    /// Distance of the end of the edge to the victim
    pub distance: u32,
}

/// Position of a router in the node sampling ranking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RankedNode {
    /// The router
    pub router: RouterId,
    /// Number of samples
    pub support: usize,
    /// Position in the ranking, 0 being the most frequent one (nearest to the victim)
    pub position: usize,
}

/// How a conflict between edges at the same distance was resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConflictResolution {
    /// All edges were accepted as branches of the tree
    Branching,
    /// The edge with the largest support was accepted
    Majority {
        /// The accepted edge
        winner: (RouterId, RouterId),
    },
    /// Multiple edges share the largest support. None of them is accepted.
    Tie,
}

/// Multiple supported edges at the same distance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Conflict {
    /// Distance of the edges
    pub distance: u32,
    /// All candidate edges `(start, end, support)`
    pub candidates: Vec<(RouterId, RouterId, usize)>,
    /// The chosen resolution
    pub resolution: ConflictResolution,
}

/// Algorithm-specific part of a reconstruction
#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructionDetail {
    /// Node sampling
    NodeSampling {
        /// Confirmed routers, ordered by decreasing support
        ranking: Vec<RankedNode>,
        /// Groups of confirmed routers with equal support. Their relative order is unknown.
        ties: Vec<Vec<RouterId>>,
        /// Number of marks which are not node sampling candidates
        malformed: usize,
    },
    /// Edge sampling
    EdgeSampling {
        /// Resolved conflicts
        conflicts: Vec<Conflict>,
        /// Number of marks which are not valid edge sampling marks
        malformed: usize,
    },
    /// Edge fragment sampling
    EdgeFragmentSampling {
        /// Resolved conflicts
        conflicts: Vec<Conflict>,
        /// Number of marks which are not valid fragment marks
        malformed: usize,
        /// Distances for which some fragment indices were never observed, with the missing indices
        incomplete: BTreeMap<u32, Vec<u32>>,
        /// Number of fragment combinations rejected by the hash check
        rejected_combinations: usize,
        /// Distances skipped, because too many fragment combinations would need to be checked
        overflowed: Vec<u32>,
    },
}

/// # Reconstructed Graph
///
/// Attack graph inferred by the victim. Edges point from the upstream router to the downstream
/// router, the victim is not part of `nodes`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedGraph {
    /// Algorithm of the observations
    pub algorithm: Algorithm,
    /// The victim
    pub victim: RouterId,
    /// Overall status
    pub status: ReconstructionStatus,
    /// Number of observations
    pub observations: usize,
    /// Number of marked observations
    pub marked: usize,
    /// Confirmed nodes
    pub nodes: BTreeMap<RouterId, NodeSupport>,
    /// Confirmed edges
    pub edges: BTreeMap<(RouterId, RouterId), EdgeSupport>,
    /// Nodes below the minimum support
    pub unconfirmed_nodes: BTreeMap<RouterId, usize>,
    /// Edges below the minimum support, or not connected to the victim
    pub unconfirmed_edges: BTreeMap<(RouterId, RouterId), EdgeSupport>,
    /// Algorithm-specific information
    pub detail: ReconstructionDetail,
}

impl ReconstructedGraph {
    /// Returns `true` if the status is [`ReconstructionStatus::InsufficientData`]
    pub fn is_insufficient(&self) -> bool {
        self.status == ReconstructionStatus::InsufficientData
    }

    /// Confirmed nodes ordered by decreasing support (ties by id)
    pub fn nodes_by_support(&self) -> Vec<(RouterId, usize)> {
        let mut nodes: Vec<(RouterId, usize)> = self.nodes.iter().map(|(r, s)| (*r, s.support)).collect();
        nodes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        nodes
    }
}

/// Status of a reconstruction from `marked` informative observations.
fn status(marked: usize, accepted: bool, unresolved: bool) -> ReconstructionStatus {
    if marked == 0 || !accepted {
        ReconstructionStatus::InsufficientData
    } else if unresolved {
        ReconstructionStatus::Partial
    } else {
        ReconstructionStatus::Complete
    }
}

/// # Reconstruct the attack graph
///
/// Reconstruct the attack graph from the observations, using the algorithm which produced them.
/// Nodes and edges with less than `min_support` observations are listed as unconfirmed. Edge
/// conflicts are resolved as a [tree](EdgeResolution::Tree), and the default fragment layout is
/// assumed.
pub fn reconstruct(observations: &ObservationSet, algorithm: Algorithm, min_support: usize) -> ReconstructedGraph {
    reconstruct_with(observations, algorithm, &ReconstructionConfig::new(min_support))
}

/// Reconstruct the attack graph with the given configuration.
pub fn reconstruct_with(
    observations: &ObservationSet,
    algorithm: Algorithm,
    config: &ReconstructionConfig,
) -> ReconstructedGraph {
    if observations.algorithm() != algorithm {
        warn!(
            "Reconstructing {} observations with {}. Foreign marks are ignored!",
            observations.algorithm(),
            algorithm
        );
    }
    let result = match algorithm {
        Algorithm::NodeSampling => node_sampling::reconstruct(observations, config),
        Algorithm::EdgeSampling => edge_sampling::reconstruct(observations, config),
        Algorithm::EdgeFragmentSampling => fragment::reconstruct(observations, config),
    };
    debug!(
        "Reconstructed {} nodes and {} edges ({} unconfirmed) from {} observations: {:?}",
        result.nodes.len(),
        result.edges.len(),
        result.unconfirmed_edges.len() + result.unconfirmed_nodes.len(),
        result.observations,
        result.status
    );
    result
}
