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

//! Edge fragment sampling reconstruction: reassemble the edges, then chain them.

use super::edge_sampling::{Chain, EdgeBuckets};
use super::{status, ReconstructedGraph, ReconstructionConfig, ReconstructionDetail};
use crate::marking::{Algorithm, EdgeCodec, EdgeDecode, EdgeFragment, FragmentMark, Mark};
use crate::simulate::ObservationSet;
use crate::topology::RouterId;

use itertools::Itertools;
use log::*;
use std::collections::BTreeMap;

/// Maximum number of fragment combinations checked at a single distance.
pub const MAX_COMBINATIONS: usize = 1 << 20;

/// Fragment values `(start, end)` observed at a single index, with their count.
type FragmentCounts = BTreeMap<(u64, Option<u64>), usize>;

/// # Fragment Accumulator
///
/// Collects the fragments received by the victim, grouped by distance and by fragment index.
/// Since all state is kept in ordered maps, the accumulated state does not depend on the order in
/// which fragments arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentAccumulator {
    codec: EdgeCodec,
    fragments: BTreeMap<u32, BTreeMap<u32, FragmentCounts>>,
    malformed: usize,
}

/// Edges decoded at a single distance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedEdges {
    /// Decoded edges `(start, end)`, `end` being `None` for edges ending at the victim, with their
    /// support (the count of their rarest fragment). Fragments are counted by value, so a fragment
    /// shared by several edges at the same index counts for each of them. The support of an edge is
    /// thus an upper bound on the number of packets that carried it.
    pub edges: BTreeMap<(RouterId, Option<RouterId>), usize>,
    /// Number of combinations rejected by the hash check
    pub rejected: usize,
    /// Fragment indices which were never observed
    pub missing: Vec<u32>,
    /// `true` if there were too many combinations to check
    pub overflowed: bool,
}

impl FragmentAccumulator {
    /// Create an empty accumulator for the given fragment layout.
    pub fn new(codec: EdgeCodec) -> Self {
        Self { codec, fragments: BTreeMap::new(), malformed: 0 }
    }

    /// Add a single fragment. Fragments with an invalid index are counted as malformed.
    pub fn add(&mut self, mark: &FragmentMark) {
        let fragment = mark.fragment;
        if fragment.index >= self.codec.total_fragments() {
            self.malformed += 1;
            return;
        }
        *self
            .fragments
            .entry(mark.distance)
            .or_default()
            .entry(fragment.index)
            .or_default()
            .entry((fragment.start, fragment.end))
            .or_default() += 1;
    }

    /// Number of fragments which could not be accumulated
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// All distances at which some fragment was observed
    pub fn distances(&self) -> Vec<u32> {
        self.fragments.keys().copied().collect()
    }

    /// Fragment indices never observed at the given distance
    pub fn missing(&self, distance: u32) -> Vec<u32> {
        let level = self.fragments.get(&distance);
        (0..self.codec.total_fragments())
            .filter(|i| level.map(|l| !l.contains_key(i)).unwrap_or(true))
            .collect()
    }

    /// Number of fragment combinations at the given distance, saturating at `usize::MAX`.
    pub fn combinations(&self, distance: u32) -> usize {
        match self.fragments.get(&distance) {
            Some(level) if level.len() == self.codec.total_fragments() as usize => {
                level.values().fold(1usize, |acc, f| acc.saturating_mul(f.len()))
            }
            _ => 0,
        }
    }

    /// # Decode all edges at a distance
    ///
    /// Every combination of one fragment per index is reassembled and checked. Combinations of
    /// fragments from different edges are rejected by the hash check, except with the collision
    /// probability of the codec. If there are more than [`MAX_COMBINATIONS`] combinations,
    /// fragments below `min_support` are dropped first. If there are still too many, the distance
    /// is skipped.
    pub fn decode(&self, distance: u32, min_support: usize) -> DecodedEdges {
        let mut result = DecodedEdges { missing: self.missing(distance), ..Default::default() };
        let level = match self.fragments.get(&distance) {
            Some(level) if result.missing.is_empty() => level,
            _ => return result,
        };

        let mut choices: Vec<Vec<(EdgeFragment, usize)>> = level
            .iter()
            .map(|(index, counts)| {
                counts
                    .iter()
                    .map(|((start, end), n)| (EdgeFragment { index: *index, start: *start, end: *end }, *n))
                    .collect()
            })
            .collect();

        if self.combinations(distance) > MAX_COMBINATIONS {
            debug!("Too many fragment combinations at distance {}, pruning rare fragments", distance);
            for choice in choices.iter_mut() {
                choice.retain(|(_, n)| *n >= min_support);
            }
            let pruned = choices.iter().fold(1usize, |acc, c| acc.saturating_mul(c.len()));
            if pruned == 0 || pruned > MAX_COMBINATIONS {
                warn!("Skipping distance {}: {} fragment combinations after pruning", distance, pruned);
                result.overflowed = true;
                return result;
            }
        }

        for combination in choices.into_iter().multi_cartesian_product() {
            let fragments: Vec<EdgeFragment> = combination.iter().map(|(f, _)| *f).collect();
            let support = combination.iter().map(|(_, n)| *n).min().unwrap_or(0);
            match self.codec.decode_edge(&fragments) {
                EdgeDecode::Edge { start, end } => {
                    let entry = result.edges.entry((start, end)).or_default();
                    *entry = (*entry).max(support);
                }
                EdgeDecode::Incomplete { .. } | EdgeDecode::Inconsistent => result.rejected += 1,
            }
        }
        result
    }
}

pub(super) fn reconstruct(observations: &ObservationSet, config: &ReconstructionConfig) -> ReconstructedGraph {
    let victim = observations.victim();
    let mut marked: usize = 0;
    let mut foreign: usize = 0;
    let mut accumulator = FragmentAccumulator::new(config.codec);

    for mark in observations.marks() {
        match mark {
            Mark::Empty => {}
            Mark::Fragment(fragment) => {
                marked += 1;
                accumulator.add(fragment);
            }
            _ => {
                marked += 1;
                foreign += 1;
            }
        }
    }

    let mut buckets: EdgeBuckets = BTreeMap::new();
    let mut incomplete = BTreeMap::new();
    let mut overflowed = Vec::new();
    let mut rejected_combinations = 0;
    let mut malformed = foreign + accumulator.malformed();

    for distance in accumulator.distances() {
        let decoded = accumulator.decode(distance, config.min_support);
        rejected_combinations += decoded.rejected;
        if !decoded.missing.is_empty() {
            debug!("Fragments {:?} are missing at distance {}", decoded.missing, distance);
            incomplete.insert(distance, decoded.missing);
        }
        if decoded.overflowed {
            overflowed.push(distance);
        }
        for ((start, end), support) in decoded.edges {
            match (end, distance) {
                (None, 0) => {
                    buckets.entry(distance).or_default().insert((start, victim), support);
                }
                (Some(end), d) if d > 0 && end != start => {
                    buckets.entry(distance).or_default().insert((start, end), support);
                }
                _ => malformed += 1,
            }
        }
    }
    if malformed > 0 {
        warn!("Ignoring {} malformed edge fragment marks", malformed);
    }

    let chain = Chain::build(victim, &buckets, marked, config);
    let unresolved =
        chain.is_unresolved() || malformed > 0 || !incomplete.is_empty() || !overflowed.is_empty();

    ReconstructedGraph {
        algorithm: Algorithm::EdgeFragmentSampling,
        victim,
        status: status(marked, !chain.edges.is_empty(), unresolved),
        observations: observations.len(),
        marked,
        nodes: chain.nodes,
        edges: chain.edges,
        unconfirmed_nodes: chain.unconfirmed_nodes,
        unconfirmed_edges: chain.unconfirmed_edges,
        detail: ReconstructionDetail::EdgeFragmentSampling {
            conflicts: chain.conflicts,
            malformed,
            incomplete,
            rejected_combinations,
            overflowed,
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn r(id: usize) -> RouterId {
        RouterId::new(id)
    }

    fn add_edge(acc: &mut FragmentAccumulator, codec: &EdgeCodec, start: usize, end: Option<usize>, d: u32, n: usize) {
        for fragment in codec.fragments_for(r(start), end.map(r)).unwrap() {
            for _ in 0..n {
                acc.add(&FragmentMark { fragment, distance: d });
            }
        }
    }

    #[test]
    fn single_edge() {
        let codec = EdgeCodec::default();
        let mut acc = FragmentAccumulator::new(codec);
        add_edge(&mut acc, &codec, 7, Some(3), 2, 4);
        assert_eq!(acc.combinations(2), 1);
        let decoded = acc.decode(2, 1);
        assert_eq!(decoded.edges.get(&(r(7), Some(r(3)))), Some(&4));
        assert_eq!(decoded.rejected, 0);
        assert!(decoded.missing.is_empty());
    }

    #[test]
    fn two_edges_same_distance() {
        let codec = EdgeCodec::default();
        let mut acc = FragmentAccumulator::new(codec);
        add_edge(&mut acc, &codec, 5, Some(1), 1, 3);
        add_edge(&mut acc, &codec, 6, Some(2), 1, 2);
        let decoded = acc.decode(1, 1);
        assert_eq!(decoded.edges.len(), 2);
        assert_eq!(decoded.edges.get(&(r(5), Some(r(1)))), Some(&3));
        assert_eq!(decoded.edges.get(&(r(6), Some(r(2)))), Some(&2));
        assert_eq!(decoded.rejected, acc.combinations(1) - 2);
    }

    #[test]
    fn shared_fragments_add_up() {
        // 2-bit fragments, such that the two edges are likely to share some of them
        let codec = EdgeCodec::new(4, 4, 4, 5).unwrap();
        let mut acc = FragmentAccumulator::new(codec);
        add_edge(&mut acc, &codec, 1, Some(2), 1, 10);
        add_edge(&mut acc, &codec, 1, Some(3), 1, 3);

        let frequent = codec.fragments_for(r(1), Some(r(2))).unwrap();
        let rare = codec.fragments_for(r(1), Some(r(3))).unwrap();
        let support = |own: usize| {
            frequent.iter().zip(rare.iter()).map(|(a, b)| if a == b { 13 } else { own }).min().unwrap()
        };

        let decoded = acc.decode(1, 1);
        assert_eq!(decoded.edges.get(&(r(1), Some(r(2)))), Some(&support(10)));
        assert_eq!(decoded.edges.get(&(r(1), Some(r(3)))), Some(&support(3)));
        assert!(support(3) >= 3);
    }

    #[test]
    fn missing_fragment() {
        let codec = EdgeCodec::default();
        let mut acc = FragmentAccumulator::new(codec);
        let fragment = codec.encode_edge_fragment(r(4), None, 3).unwrap();
        acc.add(&FragmentMark { fragment, distance: 0 });
        let decoded = acc.decode(0, 0);
        assert!(decoded.edges.is_empty());
        assert_eq!(decoded.missing, vec![0, 1, 2, 4, 5, 6, 7]);
        assert_eq!(acc.missing(5).len(), 8);
    }

    #[test]
    fn invalid_index_is_malformed() {
        let codec = EdgeCodec::default();
        let mut acc = FragmentAccumulator::new(codec);
        acc.add(&FragmentMark { fragment: EdgeFragment { index: 8, start: 0, end: None }, distance: 0 });
        assert_eq!(acc.malformed(), 1);
        assert!(acc.distances().is_empty());
    }
}
