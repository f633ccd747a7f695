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

//! Edge sampling reconstruction: chain the observed edges from the victim backwards.

use super::{
    status, Conflict, ConflictResolution, EdgeResolution, EdgeSupport, NodeSupport, ReconstructedGraph,
    ReconstructionConfig, ReconstructionDetail,
};
use crate::marking::{Algorithm, EdgeMark, Mark};
use crate::simulate::ObservationSet;
use crate::topology::RouterId;

use log::*;
use std::collections::{BTreeMap, BTreeSet};

/// Observed edges `(start, end)` with their support, bucketed by their distance.
pub(super) type EdgeBuckets = BTreeMap<u32, BTreeMap<(RouterId, RouterId), usize>>;

pub(super) fn reconstruct(observations: &ObservationSet, config: &ReconstructionConfig) -> ReconstructedGraph {
    let victim = observations.victim();
    let mut marked: usize = 0;
    let mut malformed: usize = 0;
    let mut buckets: EdgeBuckets = BTreeMap::new();

    for mark in observations.marks() {
        match mark {
            Mark::Empty => {}
            Mark::Edge(edge) => {
                marked += 1;
                match resolve_end(edge, victim) {
                    Some(key) => *buckets.entry(edge.distance).or_default().entry(key).or_default() += 1,
                    None => malformed += 1,
                }
            }
            _ => {
                marked += 1;
                malformed += 1;
            }
        }
    }
    if malformed > 0 {
        warn!("Ignoring {} malformed edge sampling marks", malformed);
    }

    let chain = Chain::build(victim, &buckets, marked, config);
    let unresolved = chain.is_unresolved() || malformed > 0;

    ReconstructedGraph {
        algorithm: Algorithm::EdgeSampling,
        victim,
        status: status(marked, !chain.edges.is_empty(), unresolved),
        observations: observations.len(),
        marked,
        nodes: chain.nodes,
        edges: chain.edges,
        unconfirmed_nodes: chain.unconfirmed_nodes,
        unconfirmed_edges: chain.unconfirmed_edges,
        detail: ReconstructionDetail::EdgeSampling { conflicts: chain.conflicts, malformed },
    }
}

/// An edge without `end` ends at the victim, but only if nobody has touched it since it was
/// started. An edge with `end` must have traveled at least one hop since.
fn resolve_end(edge: &EdgeMark, victim: RouterId) -> Option<(RouterId, RouterId)> {
    match (edge.end, edge.distance) {
        (None, 0) => Some((edge.start, victim)),
        (Some(end), d) if d > 0 && end != edge.start => Some((edge.start, end)),
        _ => None,
    }
}

/// Result of chaining edges from the victim towards the attackers.
#[derive(Debug, Default)]
pub(super) struct Chain {
    pub nodes: BTreeMap<RouterId, NodeSupport>,
    pub edges: BTreeMap<(RouterId, RouterId), EdgeSupport>,
    pub unconfirmed_nodes: BTreeMap<RouterId, usize>,
    pub unconfirmed_edges: BTreeMap<(RouterId, RouterId), EdgeSupport>,
    pub conflicts: Vec<Conflict>,
}

impl Chain {
    /// Chain the edges, starting with all edges ending at the victim (distance 0). An edge at
    /// distance `d` is accepted only if its end was accepted as the start of an edge at distance
    /// `d - 1`. Edges below the minimum support, edges that are not connected to the already
    /// accepted graph, and edges rejected by the conflict resolution remain unconfirmed. A router
    /// gets at most one accepted edge towards the victim, so the result is always a tree.
    pub fn build(victim: RouterId, buckets: &EdgeBuckets, marked: usize, config: &ReconstructionConfig) -> Self {
        let mut chain = Chain::default();
        let mut frontier: BTreeSet<RouterId> = BTreeSet::new();
        frontier.insert(victim);
        let mut expected: u32 = 0;

        for (distance, level) in buckets.iter() {
            let distance = *distance;
            if distance != expected {
                trace!("No edges between distance {} and {}", expected, distance);
                frontier.clear();
            }
            expected = distance.saturating_add(1);

            let mut candidates: Vec<(RouterId, RouterId, usize)> = Vec::new();
            for ((start, end), support) in level.iter() {
                let connected = frontier.contains(end)
                    && *start != victim
                    && !chain.nodes.contains_key(start);
                if connected && *support >= config.min_support {
                    candidates.push((*start, *end, *support));
                } else {
                    chain.reject(*start, *end, *support, distance);
                }
            }

            let candidates = chain.single_successor(distance, candidates);
            let accepted = chain.resolve(distance, candidates, config.resolution);

            frontier.clear();
            for (start, end, support) in accepted {
                chain.accept(start, end, support, distance, marked);
                frontier.insert(start);
            }
        }

        for ((start, _), edge) in chain.unconfirmed_edges.iter() {
            if *start != victim && !chain.nodes.contains_key(start) {
                let entry = chain.unconfirmed_nodes.entry(*start).or_default();
                *entry = (*entry).max(edge.support);
            }
        }

        chain
    }

    /// Returns `true` if some edges remain unconfirmed, or if some conflict ended in a tie.
    pub fn is_unresolved(&self) -> bool {
        !self.unconfirmed_edges.is_empty()
            || self.conflicts.iter().any(|c| c.resolution == ConflictResolution::Tie)
    }

    fn resolve(
        &mut self,
        distance: u32,
        candidates: Vec<(RouterId, RouterId, usize)>,
        resolution: EdgeResolution,
    ) -> Vec<(RouterId, RouterId, usize)> {
        if candidates.len() <= 1 {
            return candidates;
        }
        match resolution {
            EdgeResolution::Tree => {
                self.conflicts.push(Conflict {
                    distance,
                    candidates: candidates.clone(),
                    resolution: ConflictResolution::Branching,
                });
                candidates
            }
            EdgeResolution::MajorityVote => self.majority(distance, candidates),
        }
    }

    /// A router forwards all traffic to a single next hop. If several candidates share the same
    /// start, only the best supported one survives.
    fn single_successor(
        &mut self,
        distance: u32,
        candidates: Vec<(RouterId, RouterId, usize)>,
    ) -> Vec<(RouterId, RouterId, usize)> {
        let mut by_start: BTreeMap<RouterId, Vec<(RouterId, RouterId, usize)>> = BTreeMap::new();
        for candidate in candidates {
            by_start.entry(candidate.0).or_default().push(candidate);
        }
        let mut result = Vec::new();
        for (_, group) in by_start {
            if group.len() == 1 {
                result.extend(group);
            } else {
                result.extend(self.majority(distance, group));
            }
        }
        result
    }

    /// Keep the unique best supported candidate. On a tie, all of them are rejected.
    fn majority(
        &mut self,
        distance: u32,
        candidates: Vec<(RouterId, RouterId, usize)>,
    ) -> Vec<(RouterId, RouterId, usize)> {
        let max = candidates.iter().map(|(_, _, s)| *s).max().unwrap_or(0);
        let winners: Vec<_> = candidates.iter().filter(|(_, _, s)| *s == max).copied().collect();
        if winners.len() == 1 {
            let (start, end, _) = winners[0];
            for (s, e, support) in candidates.iter().filter(|(s, e, _)| (*s, *e) != (start, end)) {
                self.reject(*s, *e, *support, distance);
            }
            self.conflicts.push(Conflict {
                distance,
                candidates,
                resolution: ConflictResolution::Majority { winner: (start, end) },
            });
            winners
        } else {
            warn!("{} edges at distance {} are tied with support {}", winners.len(), distance, max);
            for (s, e, support) in candidates.iter() {
                self.reject(*s, *e, *support, distance);
            }
            self.conflicts.push(Conflict { distance, candidates, resolution: ConflictResolution::Tie });
            Vec::new()
        }
    }

    fn accept(&mut self, start: RouterId, end: RouterId, support: usize, distance: u32, marked: usize) {
        self.edges.insert((start, end), EdgeSupport { support, distance });
        let node = self.nodes.entry(start).or_insert(NodeSupport {
            support: 0,
            confidence: 0.0,
            distance: distance as usize + 1,
        });
        if support > node.support {
            node.support = support;
            node.confidence = support as f64 / marked.max(1) as f64;
        }
    }

    fn reject(&mut self, start: RouterId, end: RouterId, support: usize, distance: u32) {
        let edge = self.unconfirmed_edges.entry((start, end)).or_insert(EdgeSupport { support: 0, distance });
        if support > edge.support {
            *edge = EdgeSupport { support, distance };
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn r(id: usize) -> RouterId {
        RouterId::new(id)
    }

    fn buckets(edges: &[(u32, usize, usize, usize)]) -> EdgeBuckets {
        let mut b: EdgeBuckets = BTreeMap::new();
        for (d, s, e, n) in edges {
            b.entry(*d).or_default().insert((r(*s), r(*e)), *n);
        }
        b
    }

    #[test]
    fn end_resolution() {
        let v = r(0);
        assert_eq!(resolve_end(&EdgeMark { start: r(1), end: None, distance: 0 }, v), Some((r(1), v)));
        assert_eq!(resolve_end(&EdgeMark { start: r(2), end: Some(r(1)), distance: 1 }, v), Some((r(2), r(1))));
        assert_eq!(resolve_end(&EdgeMark { start: r(2), end: Some(r(1)), distance: 0 }, v), None);
        assert_eq!(resolve_end(&EdgeMark { start: r(2), end: None, distance: 3 }, v), None);
        assert_eq!(resolve_end(&EdgeMark { start: r(2), end: Some(r(2)), distance: 1 }, v), None);
    }

    #[test]
    fn chain_single_path() {
        let b = buckets(&[(0, 3, 0, 40), (1, 2, 3, 20), (2, 1, 2, 10)]);
        let chain = Chain::build(r(0), &b, 70, &ReconstructionConfig::new(5));
        assert_eq!(chain.edges.len(), 3);
        assert_eq!(chain.nodes[&r(1)].distance, 3);
        assert_eq!(chain.nodes[&r(3)].support, 40);
        assert!(chain.conflicts.is_empty());
        assert!(!chain.is_unresolved());
    }

    #[test]
    fn chain_stops_at_gap() {
        // nothing at distance 1, so the edge at distance 2 is an orphan
        let b = buckets(&[(0, 3, 0, 40), (2, 1, 2, 10)]);
        let chain = Chain::build(r(0), &b, 50, &ReconstructionConfig::new(0));
        assert_eq!(chain.edges.len(), 1);
        assert!(chain.unconfirmed_edges.contains_key(&(r(1), r(2))));
        assert_eq!(chain.unconfirmed_nodes.get(&r(1)), Some(&10));
        assert!(chain.is_unresolved());
    }

    #[test]
    fn one_successor_per_router() {
        // 2 appears twice at distance 1, once towards 3 and once towards 5
        let b = buckets(&[(0, 3, 0, 40), (0, 5, 0, 30), (1, 2, 3, 20), (1, 2, 5, 4)]);
        let chain = Chain::build(r(0), &b, 94, &ReconstructionConfig::new(1));
        assert!(chain.edges.contains_key(&(r(2), r(3))));
        assert!(!chain.edges.contains_key(&(r(2), r(5))));
        assert!(chain.unconfirmed_edges.contains_key(&(r(2), r(5))));
        assert_eq!(chain.conflicts.len(), 2);
        assert_eq!(chain.conflicts[0].resolution, ConflictResolution::Branching);
        assert_eq!(chain.conflicts[1].resolution, ConflictResolution::Majority { winner: (r(2), r(3)) });

        let b = buckets(&[(0, 3, 0, 40), (0, 5, 0, 30), (1, 2, 3, 7), (1, 2, 5, 7)]);
        let chain = Chain::build(r(0), &b, 84, &ReconstructionConfig::new(1));
        assert!(!chain.nodes.contains_key(&r(2)));
        assert_eq!(chain.conflicts[1].resolution, ConflictResolution::Tie);
        assert!(chain.is_unresolved());
    }

    #[test]
    fn majority_and_tie() {
        let b = buckets(&[(0, 3, 0, 40), (1, 2, 3, 20), (1, 4, 3, 5)]);
        let config = ReconstructionConfig::new(1).resolution(EdgeResolution::MajorityVote);
        let chain = Chain::build(r(0), &b, 65, &config);
        assert!(chain.edges.contains_key(&(r(2), r(3))));
        assert!(chain.unconfirmed_edges.contains_key(&(r(4), r(3))));
        assert_eq!(chain.conflicts[0].resolution, ConflictResolution::Majority { winner: (r(2), r(3)) });

        let b = buckets(&[(0, 3, 0, 40), (1, 2, 3, 20), (1, 4, 3, 20), (2, 1, 2, 10)]);
        let chain = Chain::build(r(0), &b, 90, &config);
        assert_eq!(chain.edges.len(), 1);
        assert_eq!(chain.conflicts[0].resolution, ConflictResolution::Tie);
        assert!(chain.unconfirmed_edges.contains_key(&(r(1), r(2))));
        assert!(chain.is_unresolved());
    }
}
