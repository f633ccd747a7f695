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

//! Test the experiment harness.

use crate::example_networks::repetitions::Repetition3;
use crate::example_networks::{ChainNet, ExampleNetwork};
use crate::experiment::Sweep;
use crate::marking::{expected_packets, Algorithm};
use crate::topology::ConfigurationError;
use crate::{Error, Stopper};
use assert_approx_eq::assert_approx_eq;

#[test]
fn test_sweep_convergence() {
    let _ = pretty_env_logger::try_init();
    let topo = ChainNet::<Repetition3>::net(0).unwrap();
    let report = Sweep::new(Algorithm::EdgeSampling)
        .probabilities(vec![0.5])
        .packet_counts(vec![5, 10000])
        .repetitions(5)
        .min_support(1)
        .seed(42)
        .run(&topo, &Stopper::new())
        .unwrap();

    assert!(!report.aborted);
    assert_eq!(report.runs, 10);
    assert_eq!(report.attack_distance, 4);
    assert_eq!(report.points.len(), 2);

    let few = &report.points[0];
    let many = &report.points[1];
    assert_eq!(few.packet_count, 5);
    assert_eq!(few.runs, 5);
    assert!(few.recall.mean < 1.0);

    assert_eq!(many.exact_runs, 5);
    assert_eq!(many.insufficient_runs, 0);
    assert_approx_eq!(many.recall.mean, 1.0);
    assert_approx_eq!(many.recall.std, 0.0);
    assert_approx_eq!(many.missing_nodes.max, 0.0);
    assert_approx_eq!(many.expected_packets, expected_packets(0.5, 4));
}

#[test]
fn test_sweep_parallel() {
    let topo = ChainNet::<Repetition3>::net(1).unwrap();
    let sweep = Sweep::new(Algorithm::NodeSampling).packet_counts(vec![3000]).repetitions(2).seed(3);
    let sequential = sweep.run(&topo, &Stopper::new()).unwrap();
    let parallel = sweep.clone().parallel(Some(2)).run(&topo, &Stopper::new()).unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn test_sweep_stopped() {
    let topo = ChainNet::<Repetition3>::net(0).unwrap();
    let stopper = Stopper::new();
    let other = stopper.clone();
    other.send_stop();
    assert!(stopper.is_stop());

    let report = Sweep::new(Algorithm::EdgeSampling).run(&topo, &stopper).unwrap();
    assert!(report.aborted);
    assert_eq!(report.runs, 0);
    assert!(report.points.is_empty());
}

#[test]
fn test_sweep_invalid() {
    let topo = ChainNet::<Repetition3>::net(0).unwrap();
    let result = Sweep::new(Algorithm::EdgeSampling).probabilities(vec![0.5, 2.0]).run(&topo, &Stopper::new());
    assert_eq!(result, Err(Error::Configuration(ConfigurationError::InvalidProbability(2.0))));

    let result = Sweep::new(Algorithm::EdgeSampling).packet_counts(vec![0]).run(&topo, &Stopper::new());
    assert_eq!(result, Err(Error::Configuration(ConfigurationError::NoPackets)));
}

#[test]
fn test_report_serialization() {
    let topo = ChainNet::<Repetition3>::net(0).unwrap();
    let report = Sweep::new(Algorithm::EdgeFragmentSampling)
        .probabilities(vec![0.3])
        .packet_counts(vec![500])
        .repetitions(2)
        .run(&topo, &Stopper::new())
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["algorithm"], "edge_fragment_sampling");
    assert_eq!(json["aborted"], false);
    assert_eq!(json["points"][0]["packet_count"], 500);
    assert_eq!(json["points"][0]["recall"]["values"].as_array().map(|v| v.len()), Some(2));
}
