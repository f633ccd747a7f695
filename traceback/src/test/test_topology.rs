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

//! Test building topologies and computing the routes towards the victim.

use crate::example_networks::repetitions::{Repetition2, Repetition3};
use crate::example_networks::{BinaryTreeNet, ChainNet, ExampleNetwork, WattsStrogatzNet};
use crate::topology::{ConfigurationError, RouterId, Topology, TopologyBuilder, TopologySpec};
use lazy_static::lazy_static;
use maplit::btreeset;

lazy_static! {
    static ref A: RouterId = 0.into();
    static ref B: RouterId = 1.into();
    static ref C: RouterId = 2.into();
    static ref D: RouterId = 3.into();
    static ref V: RouterId = 4.into();
}

fn r(id: usize) -> RouterId {
    RouterId::new(id)
}

/// # Test topology
///
/// ```text
///      .-> B --.
///     /         v
/// A -+          D ---> V
///     \         ^
///      '-> C --'
/// ```
fn get_test_topo() -> Topology {
    let mut t = TopologyBuilder::new();

    assert_eq!(*A, t.add_router("A").unwrap());
    assert_eq!(*B, t.add_router("B").unwrap());
    assert_eq!(*C, t.add_router("C").unwrap());
    assert_eq!(*D, t.add_router("D").unwrap());
    assert_eq!(*V, t.add_router("V").unwrap());

    t.add_link(*A, *C).unwrap();
    t.add_link(*A, *B).unwrap();
    t.add_link(*B, *D).unwrap();
    t.add_link(*C, *D).unwrap();
    t.add_link(*D, *V).unwrap();

    t.add_attacker(*A).unwrap();
    t.set_victim(*V).unwrap();

    t.build().unwrap()
}

fn spec(routers: &[&str], links: &[(&str, &str)], attackers: &[&str], victim: &str) -> TopologySpec {
    TopologySpec {
        routers: routers.iter().map(|r| r.to_string()).collect(),
        links: links.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
        attackers: attackers.iter().map(|a| a.to_string()).collect(),
        victim: victim.to_string(),
    }
}

#[test]
fn test_get_router() {
    let topo = get_test_topo();

    assert_eq!(topo.get_router_id("A"), Ok(*A));
    assert_eq!(topo.get_router_id("V"), Ok(*V));
    assert_eq!(topo.get_router_name(*B), Ok("B"));
    assert_eq!(topo.get_router_name(*D), Ok("D"));
    topo.get_router_id("E").unwrap_err();
    topo.get_router_name(r(10)).unwrap_err();

    assert_eq!(topo.num_routers(), 5);
    assert_eq!(topo.num_links(), 5);
    assert_eq!(topo.victim(), *V);
    assert_eq!(topo.attackers(), &[*A]);
    assert_eq!(topo.get_router(*A).unwrap().neighbors(), &[*C, *B]);
}

#[test]
fn test_shortest_path_tie_break() {
    let topo = get_test_topo();

    // B and C are both two hops away from V. B has the smaller id.
    assert_eq!(topo.path(*A, *V), Ok(vec![*A, *B, *D, *V]));
    assert_eq!(topo.path(*C, *V), Ok(vec![*C, *D, *V]));
    assert_eq!(topo.path(*V, *V), Ok(vec![*V]));
    assert_eq!(topo.distance_to_victim(*A), Some(3));
    assert_eq!(topo.next_hop(*V), None);
    assert_eq!(topo.max_attack_distance(), 3);

    // the same route is returned every time
    assert_eq!(topo.path(*A, *V), topo.path(*A, *V));
}

#[test]
fn test_path_errors() {
    let topo = get_test_topo();
    assert_eq!(topo.path(*A, *D), Err(ConfigurationError::NotTheVictim(*D)));
    assert_eq!(topo.path(r(10), *V), Err(ConfigurationError::RouterNotFound(r(10))));
}

#[test]
fn test_attack_graph() {
    let topo = get_test_topo();
    let g = topo.attack_graph();
    assert_eq!(g.victim, *V);
    assert_eq!(g.nodes, btreeset! {*A, *B, *D});
    assert_eq!(g.edges, btreeset! {(*A, *B), (*B, *D), (*D, *V)});
}

#[test]
fn test_build_from_spec() {
    let s = spec(&["A", "R1", "R2", "V"], &[("A", "R1"), ("R1", "R2"), ("R2", "V")], &["A"], "V");
    let topo = Topology::build(&s).unwrap();
    let a = topo.get_router_id("A").unwrap();
    assert_eq!(topo.path(a, topo.victim()).unwrap().len(), 4);
}

#[test]
fn test_configuration_errors() {
    let duplicate = spec(&["A", "A", "V"], &[("A", "V")], &["A"], "V");
    assert_eq!(Topology::build(&duplicate).unwrap_err(), ConfigurationError::DuplicateIdentifier("A".to_string()));

    let unknown = spec(&["A", "V"], &[("A", "X")], &["A"], "V");
    assert_eq!(Topology::build(&unknown).unwrap_err(), ConfigurationError::UnknownRouter("X".to_string()));

    // links are directed: V cannot be reached from A
    let unreachable = spec(&["A", "V"], &[("V", "A")], &["A"], "V");
    assert_eq!(Topology::build(&unreachable).unwrap_err(), ConfigurationError::VictimUnreachable(r(0)));

    let no_attacker = spec(&["A", "V"], &[("A", "V")], &[], "V");
    assert_eq!(Topology::build(&no_attacker).unwrap_err(), ConfigurationError::NoAttackers);

    let mut t = TopologyBuilder::new();
    let a = t.add_router("A").unwrap();
    t.add_attacker(a).unwrap();
    assert_eq!(t.build().unwrap_err(), ConfigurationError::NoVictim);

    let mut t = TopologyBuilder::new();
    let a = t.add_router("A").unwrap();
    assert_eq!(t.add_link(a, r(5)), Err(ConfigurationError::RouterNotFound(r(5))));
}

#[test]
fn test_victim_is_not_an_attacker() {
    let only_victim = spec(&["A", "V"], &[("A", "V")], &["V"], "V");
    assert_eq!(Topology::build(&only_victim).unwrap_err(), ConfigurationError::NoAttackers);

    let both = spec(&["A", "V"], &[("A", "V")], &["V", "A"], "V");
    let topo = Topology::build(&both).unwrap();
    assert_eq!(topo.attackers(), &[r(0)]);
}

#[test]
fn test_chain_net() {
    let topo = ChainNet::<Repetition3>::net(0).unwrap();
    assert_eq!(topo.num_routers(), 5);
    assert_eq!(topo.victim(), r(4));
    assert_eq!(topo.path(r(0), r(4)).unwrap(), vec![r(0), r(1), r(2), r(3), r(4)]);

    let topo = ChainNet::<Repetition3>::net(2).unwrap();
    assert_eq!(topo.attackers().len(), 3);
    let a1 = topo.get_router_id("a01").unwrap();
    assert_eq!(topo.distance_to_victim(a1), Some(3));
}

#[test]
fn test_binary_tree_net() {
    let topo = BinaryTreeNet::<Repetition2>::net(0).unwrap();
    assert_eq!(topo.num_routers(), 8);
    assert_eq!(topo.attackers().len(), 4);
    assert!(topo.attackers().iter().all(|a| topo.distance_to_victim(*a) == Some(3)));
    let g = topo.attack_graph();
    assert_eq!(g.nodes.len(), 7);
    assert_eq!(g.edges.len(), 7);

    let topo = BinaryTreeNet::<Repetition2>::net(1).unwrap();
    assert_eq!(topo.attackers().len(), 1);
    assert_eq!(topo.attack_graph().edges.len(), 3);
}

#[test]
fn test_watts_strogatz_net() {
    let topo = WattsStrogatzNet::net(0).unwrap();
    assert_eq!(topo.num_routers(), 20);
    assert_eq!(topo.victim(), r(0));
    assert_eq!(topo.attackers(), &[r(1)]);
    assert!(topo.distance_to_victim(r(1)).is_some());
    // all links are bidirectional
    assert_eq!(topo.num_links() % 2, 0);

    let again = WattsStrogatzNet::net(0).unwrap();
    assert_eq!(topo.path(r(1), r(0)), again.path(r(1), r(0)));
}
