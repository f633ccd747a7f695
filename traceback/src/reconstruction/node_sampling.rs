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

//! Node sampling reconstruction: rank the sampled routers by their frequency.

use super::{
    status, EdgeSupport, NodeSupport, RankedNode, ReconstructedGraph, ReconstructionConfig,
    ReconstructionDetail,
};
use crate::marking::{Algorithm, Mark};
use crate::simulate::ObservationSet;
use crate::topology::RouterId;

use log::*;
use std::collections::BTreeMap;

pub(super) fn reconstruct(observations: &ObservationSet, config: &ReconstructionConfig) -> ReconstructedGraph {
    let victim = observations.victim();
    let mut marked: usize = 0;
    let mut malformed: usize = 0;
    let mut counts: BTreeMap<RouterId, usize> = BTreeMap::new();

    for mark in observations.marks() {
        match mark {
            Mark::Empty => {}
            Mark::Candidate { node, .. } if *node != victim => {
                marked += 1;
                *counts.entry(*node).or_default() += 1;
            }
            _ => {
                marked += 1;
                malformed += 1;
            }
        }
    }
    if malformed > 0 {
        warn!("Ignoring {} marks which are not node sampling candidates", malformed);
    }

    let mut sorted: Vec<(RouterId, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut unconfirmed_nodes = BTreeMap::new();
    let mut ranking: Vec<RankedNode> = Vec::new();
    for (router, support) in sorted {
        if support < config.min_support {
            unconfirmed_nodes.insert(router, support);
        } else {
            let position = ranking.len();
            ranking.push(RankedNode { router, support, position });
        }
    }

    let mut nodes = BTreeMap::new();
    let mut edges = BTreeMap::new();
    for (i, ranked) in ranking.iter().enumerate() {
        nodes.insert(
            ranked.router,
            NodeSupport {
                support: ranked.support,
                confidence: ranked.support as f64 / marked as f64,
                distance: i + 1,
            },
        );
        let end = if i == 0 { victim } else { ranking[i - 1].router };
        edges.insert((ranked.router, end), EdgeSupport { support: ranked.support, distance: i as u32 });
    }

    let ties = find_ties(&ranking);
    if !ties.is_empty() {
        debug!("{} groups of routers have equal support, their order is unknown", ties.len());
    }

    let unresolved = !ties.is_empty() || !unconfirmed_nodes.is_empty() || malformed > 0;

    ReconstructedGraph {
        algorithm: Algorithm::NodeSampling,
        victim,
        status: status(marked, !nodes.is_empty(), unresolved),
        observations: observations.len(),
        marked,
        nodes,
        edges,
        unconfirmed_nodes,
        unconfirmed_edges: BTreeMap::new(),
        detail: ReconstructionDetail::NodeSampling { ranking, ties, malformed },
    }
}

/// Groups of consecutive ranked routers with the same support.
fn find_ties(ranking: &[RankedNode]) -> Vec<Vec<RouterId>> {
    let mut ties: Vec<Vec<RouterId>> = Vec::new();
    let mut group: Vec<RouterId> = Vec::new();
    let mut last: Option<usize> = None;
    for ranked in ranking {
        if last != Some(ranked.support) {
            if group.len() > 1 {
                ties.push(std::mem::take(&mut group));
            }
            group.clear();
        }
        group.push(ranked.router);
        last = Some(ranked.support);
    }
    if group.len() > 1 {
        ties.push(group);
    }
    ties
}
