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

//! # Packet Marking
//!
//! This module contains the mark carried by a simulated packet, and the per-hop marking
//! algorithms. Every hop receives the current mark as a value and returns the new mark; routers
//! never keep any state across packets. This makes the simulation of different packets completely
//! independent of each other.
//!
//! - **[Node sampling](node_sampling)**: each hop overwrites the candidate node with probability
//!   `p`.
//! - **[Edge sampling](edge_sampling::mark_hop)**: each hop starts a new edge with probability
//!   `p`. Otherwise, it completes a freshly started edge and increments the distance.
//! - **[Edge fragment sampling](edge_sampling::mark_fragment_hop)**: like edge sampling, but only a
//!   single fragment of the codewords of both endpoints is carried, see [`encoding`].

pub mod edge_sampling;
pub mod encoding;
pub mod node_sampling;

pub use encoding::{encode_node, Codebook, EdgeCodec, EdgeDecode, EdgeFragment, EncodingError};

use crate::simulate::SimulationParameters;
use crate::topology::{ConfigurationError, RouterId, Topology};
use crate::Error;

use log::*;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marking algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Each packet carries a single router identifier
    NodeSampling,
    /// Each packet carries an edge and its distance to the victim
    EdgeSampling,
    /// Each packet carries one fragment of an edge and its distance to the victim
    EdgeFragmentSampling,
}

impl Algorithm {
    /// All algorithms
    pub const ALL: [Algorithm; 3] =
        [Algorithm::NodeSampling, Algorithm::EdgeSampling, Algorithm::EdgeFragmentSampling];
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::NodeSampling => write!(f, "node_sampling"),
            Algorithm::EdgeSampling => write!(f, "edge_sampling"),
            Algorithm::EdgeFragmentSampling => write!(f, "edge_fragment_sampling"),
        }
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "node_sampling" => Ok(Algorithm::NodeSampling),
            "edge_sampling" => Ok(Algorithm::EdgeSampling),
            "edge_fragment_sampling" => Ok(Algorithm::EdgeFragmentSampling),
            _ => Err(format!("Unknown marking algorithm: {}", s)),
        }
    }
}

/// Edge candidate of the edge sampling algorithm. `end` is `None` until the hop after `start`
/// has forwarded the packet; an edge arriving at the victim without `end` ends at the victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeMark {
    /// Router that started the edge
    pub start: RouterId,
    /// Router right after `start`
    pub end: Option<RouterId>,
    /// Number of hops since `end` was written
    pub distance: u32,
}

/// Edge fragment of the edge fragment sampling algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FragmentMark {
    /// The carried fragment
    pub fragment: EdgeFragment,
    /// Number of hops since the end fragment was written (saturating)
    pub distance: u32,
}

/// # Mark
///
/// The marking field of a packet. The variants make it impossible to carry a partially written
/// mark of the wrong shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mark {
    /// No hop has marked the packet
    Empty,
    /// Node sampling candidate, with the number of hops since it was written.
    Candidate {
        /// Marking router
        node: RouterId,
        /// Hops since the router has marked the packet
        hops: u32,
    },
    /// Edge sampling candidate
    Edge(EdgeMark),
    /// Edge fragment sampling candidate
    Fragment(FragmentMark),
}

impl Default for Mark {
    fn default() -> Self {
        Mark::Empty
    }
}

impl Mark {
    /// Returns `true` if any hop has written the mark.
    pub fn is_marked(&self) -> bool {
        !matches!(self, Mark::Empty)
    }

    /// Returns the algorithm which produced the mark, or `None` for an empty mark.
    pub fn algorithm(&self) -> Option<Algorithm> {
        match self {
            Mark::Empty => None,
            Mark::Candidate { .. } => Some(Algorithm::NodeSampling),
            Mark::Edge(_) => Some(Algorithm::EdgeSampling),
            Mark::Fragment(_) => Some(Algorithm::EdgeFragmentSampling),
        }
    }
}

/// A packet arriving at the victim. Only the mark is visible to the victim; the other fields are
/// ground truth of the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Final mark
    pub mark: Mark,
    /// Number of hops traveled
    pub distance_traveled: u32,
    /// Last router which has won the coin flip
    pub marked_by: Option<RouterId>,
}

/// # Marker
///
/// Immutable marking context of a simulation run. It holds everything a hop needs to mark a packet:
/// the algorithm, the marking probability and (for fragment sampling) the codewords of all
/// routers. Create it with [`Marker::new`], which validates the parameters against the topology.
#[derive(Debug, Clone)]
pub struct Marker {
    algorithm: Algorithm,
    probability: f64,
    codec: EdgeCodec,
    codebook: Option<Codebook>,
}

impl Marker {
    /// Prepare the marking context. Fails if the parameters are invalid, or if the topology cannot
    /// be encoded with the fragment layout.
    pub fn new(topology: &Topology, params: &SimulationParameters) -> Result<Self, Error> {
        params.validate()?;
        let codebook = match params.algorithm {
            Algorithm::EdgeFragmentSampling => {
                // the attacker is hop 0, so the victim sees at most `hops - 1`
                let max = params.codec.max_distance();
                let distance = (topology.max_attack_distance() as u32).saturating_sub(1);
                if distance > max {
                    return Err(EncodingError::DistanceOverflow { distance, max }.into());
                }
                Some(params.codec.codebook(topology)?)
            }
            _ => None,
        };
        Ok(Self {
            algorithm: params.algorithm,
            probability: params.marking_probability,
            codec: params.codec,
            codebook,
        })
    }

    /// The marking algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The marking probability
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Simulate the traversal of a single packet along `path`. Every element of the path except
    /// the last one (the victim) performs the marking procedure, including the attacker.
    pub fn mark_packet<R: Rng + ?Sized>(&self, path: &[RouterId], rng: &mut R) -> Packet {
        let hops = path.len().saturating_sub(1);
        let mut mark = Mark::Empty;
        let mut marked_by = None;
        for hop in path.iter().take(hops) {
            let next = match self.algorithm {
                Algorithm::NodeSampling => node_sampling::mark_hop(mark, *hop, self.probability, rng),
                Algorithm::EdgeSampling => edge_sampling::mark_hop(mark, *hop, self.probability, rng),
                Algorithm::EdgeFragmentSampling => {
                    let codeword = self.codebook.as_ref().and_then(|c| c.get(*hop)).unwrap_or(0);
                    edge_sampling::mark_fragment_hop(mark, codeword, self.probability, &self.codec, rng)
                }
            };
            if is_rewrite(&next) {
                marked_by = Some(*hop);
                trace!("hop {} marked the packet", hop.index());
            }
            mark = next;
        }
        Packet { mark, distance_traveled: hops as u32, marked_by }
    }
}

/// A mark which was just (re)written by the current hop.
fn is_rewrite(mark: &Mark) -> bool {
    match mark {
        Mark::Empty => false,
        Mark::Candidate { hops, .. } => *hops == 0,
        Mark::Edge(e) => e.distance == 0 && e.end.is_none(),
        Mark::Fragment(f) => f.distance == 0 && f.fragment.end.is_none(),
    }
}

/// Flip a biased coin. The probability is clamped to `[0, 1]`.
pub(crate) fn coin_flip<R: Rng + ?Sized>(p: f64, rng: &mut R) -> bool {
    let p = if p.is_nan() { 0.0 } else { p.max(0.0).min(1.0) };
    rng.gen_bool(p)
}

/// Check that a marking probability is usable.
pub(crate) fn check_probability(p: f64) -> Result<(), ConfigurationError> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidProbability(p))
    }
}

/// Expected number of packets the victim needs to receive before every edge of a path of length
/// `d` was seen at least once with edge sampling: `ln(d) / (p (1 - p)^(d - 1))`. For a single
/// edge this is `1 / p`. Returns infinity if no packet can ever carry the farthest edge.
pub fn expected_packets(p: f64, d: usize) -> f64 {
    if d == 0 {
        return 0.0;
    }
    let farthest = p * (1.0 - p).powi(d as i32 - 1);
    if !(farthest > 0.0) {
        return f64::INFINITY;
    }
    if d == 1 {
        1.0 / farthest
    } else {
        (d as f64).ln() / farthest
    }
}
