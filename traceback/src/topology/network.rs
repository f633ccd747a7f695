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

//! # Topology
//!
//! This module contains the builder for the topology, and the immutable [`Topology`] which is used
//! during the simulation. Routing towards the victim is computed once, when the topology is built.

use crate::topology::{ConfigurationError, LinkGraph, Router, RouterId};

use log::*;
use petgraph::Incoming;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// # Topology Description
///
/// Declarative description of a topology, using router names. Use
/// [`Topology::build`] to turn it into a topology.
///
/// ```rust
/// use traceback::topology::{Topology, TopologySpec};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let spec = TopologySpec {
///     routers: vec!["A".into(), "R1".into(), "V".into()],
///     links: vec![("A".into(), "R1".into()), ("R1".into(), "V".into())],
///     attackers: vec!["A".into()],
///     victim: "V".into(),
/// };
/// let topo = Topology::build(&spec)?;
/// let a = topo.get_router_id("A")?;
/// assert_eq!(topo.path(a, topo.victim())?.len(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySpec {
    /// Names of all routers (including attackers and the victim)
    pub routers: Vec<String>,
    /// Directed links `(source, target)`, traffic flows from source to target
    pub links: Vec<(String, String)>,
    /// Names of the attacking hosts
    pub attackers: Vec<String>,
    /// Name of the victim
    pub victim: String,
}

/// # Topology Builder
///
/// Incrementally constructs a [`Topology`]. Router ids are handed out in increasing order,
/// starting at 0.
#[derive(Debug, Clone, Default)]
pub struct TopologyBuilder {
    graph: LinkGraph,
    routers: Vec<Router>,
    names: HashMap<String, RouterId>,
    attackers: Vec<RouterId>,
    victim: Option<RouterId>,
}

impl TopologyBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new router to the topology and return its id. Fails if the name is already taken.
    pub fn add_router<S: Into<String>>(&mut self, name: S) -> Result<RouterId, ConfigurationError> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(ConfigurationError::DuplicateIdentifier(name));
        }
        let router_id = self.graph.add_node(());
        self.names.insert(name.clone(), router_id);
        self.routers.push(Router::new(name, router_id));
        Ok(router_id)
    }

    /// Add a directed link from `source` to `target`. Adding the same link twice has no effect.
    pub fn add_link(&mut self, source: RouterId, target: RouterId) -> Result<(), ConfigurationError> {
        self.check_router(target)?;
        let router = self
            .routers
            .get_mut(source.index())
            .ok_or(ConfigurationError::RouterNotFound(source))?;
        if router.add_neighbor(target) {
            self.graph.add_edge(source, target, ());
        }
        Ok(())
    }

    /// Add a link in both directions.
    pub fn add_bidirectional_link(&mut self, a: RouterId, b: RouterId) -> Result<(), ConfigurationError> {
        self.add_link(a, b)?;
        self.add_link(b, a)
    }

    /// Declare a router as attacker. Multiple attackers are allowed.
    pub fn add_attacker(&mut self, attacker: RouterId) -> Result<(), ConfigurationError> {
        self.check_router(attacker)?;
        if !self.attackers.contains(&attacker) {
            self.attackers.push(attacker);
        }
        Ok(())
    }

    /// Declare the victim. A previously declared victim is replaced.
    pub fn set_victim(&mut self, victim: RouterId) -> Result<(), ConfigurationError> {
        self.check_router(victim)?;
        self.victim = Some(victim);
        Ok(())
    }

    /// Returns the id of a router by its name
    pub fn get_router_id<S: AsRef<str>>(&self, name: S) -> Result<RouterId, ConfigurationError> {
        self.names
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownRouter(name.as_ref().to_string()))
    }

    fn check_router(&self, router: RouterId) -> Result<(), ConfigurationError> {
        if router.index() < self.routers.len() {
            Ok(())
        } else {
            Err(ConfigurationError::RouterNotFound(router))
        }
    }

    /// Finish the topology. The routing tree towards the victim is computed using a breadth-first
    /// search on the reversed links, such that every router forwards along a shortest path (by hop
    /// count). If a router has multiple next hops with the same distance, the one with the
    /// smallest id is chosen. Thus, the union of all attack paths is always a tree.
    pub fn build(self) -> Result<Topology, ConfigurationError> {
        let victim = self.victim.ok_or(ConfigurationError::NoVictim)?;

        let mut attackers = Vec::with_capacity(self.attackers.len());
        for attacker in self.attackers {
            if attacker == victim {
                warn!("Victim {} is declared as attacker! Ignoring it.", self.routers[victim.index()].name());
            } else {
                attackers.push(attacker);
            }
        }
        if attackers.is_empty() {
            return Err(ConfigurationError::NoAttackers);
        }

        let num_routers = self.routers.len();
        let mut next_hop: Vec<Option<RouterId>> = vec![None; num_routers];
        let mut distance: Vec<Option<usize>> = vec![None; num_routers];
        distance[victim.index()] = Some(0);

        let mut queue: VecDeque<(RouterId, usize)> = VecDeque::new();
        queue.push_back((victim, 0));
        while let Some((current, d)) = queue.pop_front() {
            let mut upstream: Vec<RouterId> = self.graph.neighbors_directed(current, Incoming).collect();
            upstream.sort();
            upstream.dedup();
            for router in upstream {
                if distance[router.index()].is_none() {
                    distance[router.index()] = Some(d + 1);
                    next_hop[router.index()] = Some(current);
                    queue.push_back((router, d + 1));
                }
            }
        }

        if let Some(unreachable) = attackers.iter().find(|a| distance[a.index()].is_none()) {
            return Err(ConfigurationError::VictimUnreachable(*unreachable));
        }

        debug!(
            "Built topology with {} routers, {} links and {} attackers",
            num_routers,
            self.graph.edge_count(),
            attackers.len()
        );

        Ok(Topology {
            graph: self.graph,
            routers: self.routers,
            names: self.names,
            attackers,
            victim,
            next_hop,
            distance,
        })
    }
}

/// # Topology
///
/// Immutable directed graph of routers, with the designated attackers and the victim. Every
/// attacker is guaranteed to have a (simple) path towards the victim.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: LinkGraph,
    routers: Vec<Router>,
    names: HashMap<String, RouterId>,
    attackers: Vec<RouterId>,
    victim: RouterId,
    next_hop: Vec<Option<RouterId>>,
    distance: Vec<Option<usize>>,
}

impl Topology {
    /// Build a topology from its declarative description.
    pub fn build(spec: &TopologySpec) -> Result<Self, ConfigurationError> {
        let mut builder = TopologyBuilder::new();
        for name in spec.routers.iter() {
            builder.add_router(name.as_str())?;
        }
        for (source, target) in spec.links.iter() {
            let source = builder.get_router_id(source)?;
            let target = builder.get_router_id(target)?;
            builder.add_link(source, target)?;
        }
        for attacker in spec.attackers.iter() {
            let attacker = builder.get_router_id(attacker)?;
            builder.add_attacker(attacker)?;
        }
        let victim = builder.get_router_id(&spec.victim)?;
        builder.set_victim(victim)?;
        builder.build()
    }

    /// Returns the victim
    pub fn victim(&self) -> RouterId {
        self.victim
    }

    /// Returns all attackers
    pub fn attackers(&self) -> &[RouterId] {
        &self.attackers
    }

    /// Returns all routers, ordered by their id
    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    /// Number of routers in the topology (including hosts)
    pub fn num_routers(&self) -> usize {
        self.routers.len()
    }

    /// Number of directed links
    pub fn num_links(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns a reference to the link graph
    pub fn graph(&self) -> &LinkGraph {
        &self.graph
    }

    /// Returns the router with the given id
    pub fn get_router(&self, router: RouterId) -> Result<&Router, ConfigurationError> {
        self.routers.get(router.index()).ok_or(ConfigurationError::RouterNotFound(router))
    }

    /// Returns the id of a router by its name
    pub fn get_router_id<S: AsRef<str>>(&self, name: S) -> Result<RouterId, ConfigurationError> {
        self.names
            .get(name.as_ref())
            .copied()
            .ok_or_else(|| ConfigurationError::UnknownRouter(name.as_ref().to_string()))
    }

    /// Returns the name of a router
    pub fn get_router_name(&self, router: RouterId) -> Result<&str, ConfigurationError> {
        self.get_router(router).map(|r| r.name())
    }

    /// Next hop of the router towards the victim, or `None` for the victim itself and for routers
    /// which cannot reach the victim.
    pub fn next_hop(&self, router: RouterId) -> Option<RouterId> {
        self.next_hop.get(router.index()).copied().flatten()
    }

    /// Number of hops from the router to the victim.
    pub fn distance_to_victim(&self, router: RouterId) -> Option<usize> {
        self.distance.get(router.index()).copied().flatten()
    }

    /// Returns the route from `source` to `victim`, including both ends. The route is
    /// deterministic, and identical for every packet sent from `source`.
    pub fn path(&self, source: RouterId, victim: RouterId) -> Result<Vec<RouterId>, ConfigurationError> {
        if victim != self.victim {
            return Err(ConfigurationError::NotTheVictim(victim));
        }
        let len = self
            .distance_to_victim(self.get_router(source)?.router_id())
            .ok_or(ConfigurationError::VictimUnreachable(source))?;
        let mut path = Vec::with_capacity(len + 1);
        let mut current = source;
        path.push(current);
        while let Some(next) = self.next_hop(current) {
            path.push(next);
            current = next;
        }
        Ok(path)
    }

    /// Returns the route of every attacker towards the victim, in the order of
    /// [`attackers`](Topology::attackers).
    pub fn paths(&self) -> Result<Vec<Vec<RouterId>>, ConfigurationError> {
        self.attackers.iter().map(|a| self.path(*a, self.victim)).collect()
    }

    /// Length (in hops) of the longest attack path
    pub fn max_attack_distance(&self) -> usize {
        self.attackers.iter().filter_map(|a| self.distance_to_victim(*a)).max().unwrap_or(0)
    }

    /// Returns the ground truth: the union of all attack paths.
    pub fn attack_graph(&self) -> AttackGraph {
        let mut nodes = BTreeSet::new();
        let mut edges = BTreeSet::new();
        for attacker in self.attackers.iter() {
            let mut current = *attacker;
            while let Some(next) = self.next_hop(current) {
                nodes.insert(current);
                edges.insert((current, next));
                current = next;
            }
        }
        AttackGraph { victim: self.victim, nodes, edges }
    }
}

/// Union of all attack paths of a topology. The victim is not part of `nodes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackGraph {
    /// The victim, root of the tree
    pub victim: RouterId,
    /// All routers and attackers forwarding attack traffic
    pub nodes: BTreeSet<RouterId>,
    /// All links `(upstream, downstream)` used by attack traffic
    pub edges: BTreeSet<(RouterId, RouterId)>,
}
