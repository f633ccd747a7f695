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

//! Module containing all type definitions of the topology model

use petgraph::prelude::*;
use thiserror::Error;

type IndexType = u32;
/// Router Identification (and index into the graph)
pub type RouterId = NodeIndex<IndexType>;
/// Directed link graph of the topology. Every edge points in the direction in which traffic may
/// be forwarded.
pub type LinkGraph = Graph<(), (), Directed, IndexType>;

/// Configuration Error, raised while building a topology or while preparing a simulation run.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigurationError {
    /// Two routers were declared with the same name
    #[error("Router identifier {0} is used more than once")]
    DuplicateIdentifier(String),
    /// A link or role references a router name which was never declared
    #[error("Router {0} is not declared in the topology")]
    UnknownRouter(String),
    /// A router id does not exist in the topology
    #[error("Router {0:?} does not exist in the topology")]
    RouterNotFound(RouterId),
    /// No victim was chosen
    #[error("The topology has no victim")]
    NoVictim,
    /// No attacker was chosen, or the only attackers were the victim itself
    #[error("The topology has no attacker")]
    NoAttackers,
    /// There exists no path from the router to the victim
    #[error("Router {0:?} cannot reach the victim")]
    VictimUnreachable(RouterId),
    /// A route was requested towards a router which is not the victim of the topology
    #[error("Router {0:?} is not the victim of the topology")]
    NotTheVictim(RouterId),
    /// The marking probability is not a number within `[0, 1]`
    #[error("Invalid marking probability: {0}")]
    InvalidProbability(f64),
    /// A simulation run must send at least one packet
    #[error("A simulation run must send at least one packet")]
    NoPackets,
    /// Parameters of a generated topology are invalid
    #[error("Invalid topology parameters: {0}")]
    InvalidTopologyParameters(String),
}
