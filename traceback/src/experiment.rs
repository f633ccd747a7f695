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

//! # Experiment Harness
//!
//! Repeatedly simulate and reconstruct an attack on a topology, for a grid of marking
//! probabilities and packet counts, and summarize how quickly the reconstruction converges to the
//! ground truth.
//!
//! ```rust
//! use traceback::experiment::Sweep;
//! use traceback::example_networks::{repetitions::Repetition3, ChainNet, ExampleNetwork};
//! use traceback::marking::Algorithm;
//! use traceback::Stopper;
//!
//! # fn main() -> Result<(), traceback::Error> {
//! let topo = ChainNet::<Repetition3>::net(0)?;
//! let report = Sweep::new(Algorithm::EdgeSampling)
//!     .probabilities(vec![0.2, 0.5])
//!     .packet_counts(vec![100, 1000])
//!     .repetitions(3)
//!     .seed(7)
//!     .run(&topo, &Stopper::new())?;
//! assert_eq!(report.points.len(), 4);
//! assert!(!report.aborted);
//! # Ok(())
//! # }
//! ```

use crate::compare::compare;
use crate::marking::{expected_packets, Algorithm, EdgeCodec};
use crate::reconstruction::{reconstruct_with, EdgeResolution, ReconstructionConfig, ReconstructionStatus};
use crate::simulate::{simulate, simulate_run_parallel, SimulationParameters};
use crate::topology::Topology;
use crate::{Error, Stopper};

use log::*;
use serde::Serialize;
use statistical as stats;
use std::fmt;

/// Summary of a sample of values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsResult {
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Mean
    pub mean: f64,
    /// Median
    pub median: f64,
    /// Sample standard deviation (0 for less than two values)
    pub std: f64,
    /// All values
    pub values: Vec<f64>,
}

impl StatisticsResult {
    /// Prepares the statistical result. An empty sample yields all zeros.
    pub fn new(values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self { min: 0.0, max: 0.0, mean: 0.0, median: 0.0, std: 0.0, values };
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = stats::mean(&values);
        let median = stats::median(&values);
        let std = if values.len() >= 2 { stats::standard_deviation(&values, Some(mean)) } else { 0.0 };
        Self { min, max, mean, median, std, values }
    }
}

impl fmt::Display for StatisticsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4} +- {:.4} (min: {:.4}, median: {:.4}, max: {:.4})",
            self.mean, self.std, self.min, self.median, self.max
        )
    }
}

/// Convergence of the reconstruction for a single marking probability and packet count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergencePoint {
    /// Marking probability
    pub marking_probability: f64,
    /// Number of packets per run
    pub packet_count: usize,
    /// Number of runs
    pub runs: usize,
    /// Edge precision
    pub precision: StatisticsResult,
    /// Edge recall
    pub recall: StatisticsResult,
    /// Node recall
    pub node_recall: StatisticsResult,
    /// Number of missing nodes
    pub missing_nodes: StatisticsResult,
    /// Number of spurious edges
    pub spurious_edges: StatisticsResult,
    /// Runs without enough data to reconstruct anything
    pub insufficient_runs: usize,
    /// Runs which have reconstructed exactly the attack graph
    pub exact_runs: usize,
    /// Expected number of packets needed by edge sampling to see every edge of the longest path
    pub expected_packets: f64,
}

/// Result of a sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    /// Marking algorithm
    pub algorithm: Algorithm,
    /// Length of the longest attack path
    pub attack_distance: usize,
    /// Total number of performed runs
    pub runs: usize,
    /// One entry per grid point, in the order of the sweep
    pub points: Vec<ConvergencePoint>,
    /// `true` if the sweep was stopped before all runs were performed
    pub aborted: bool,
}

#[derive(Debug, Default)]
struct Samples {
    precision: Vec<f64>,
    recall: Vec<f64>,
    node_recall: Vec<f64>,
    missing_nodes: Vec<f64>,
    spurious_edges: Vec<f64>,
    insufficient: usize,
    exact: usize,
}

impl Samples {
    fn into_point(self, marking_probability: f64, packet_count: usize, attack_distance: usize) -> ConvergencePoint {
        ConvergencePoint {
            marking_probability,
            packet_count,
            runs: self.precision.len(),
            precision: StatisticsResult::new(self.precision),
            recall: StatisticsResult::new(self.recall),
            node_recall: StatisticsResult::new(self.node_recall),
            missing_nodes: StatisticsResult::new(self.missing_nodes),
            spurious_edges: StatisticsResult::new(self.spurious_edges),
            insufficient_runs: self.insufficient,
            exact_runs: self.exact,
            expected_packets: expected_packets(marking_probability, attack_distance),
        }
    }
}

/// # Sweep
///
/// Grid of marking probabilities and packet counts, with a number of repetitions per grid point.
/// Run `i` of the sweep uses the seed `seed + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    algorithm: Algorithm,
    probabilities: Vec<f64>,
    packet_counts: Vec<usize>,
    repetitions: usize,
    min_support: usize,
    seed: u64,
    resolution: EdgeResolution,
    codec: EdgeCodec,
    n_threads: Option<usize>,
}

impl Sweep {
    /// Sweep with a single grid point: `p = 0.04`, 1000 packets, 10 repetitions, and a minimum
    /// support of 1.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            probabilities: vec![0.04],
            packet_counts: vec![1000],
            repetitions: 10,
            min_support: 1,
            seed: 0,
            resolution: EdgeResolution::default(),
            codec: EdgeCodec::default(),
            n_threads: None,
        }
    }

    /// Marking probabilities to sweep
    pub fn probabilities(mut self, probabilities: Vec<f64>) -> Self {
        self.probabilities = probabilities;
        self
    }

    /// Packet counts to sweep
    pub fn packet_counts(mut self, packet_counts: Vec<usize>) -> Self {
        self.packet_counts = packet_counts;
        self
    }

    /// Number of runs per grid point
    pub fn repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Minimum support of the reconstruction
    pub fn min_support(mut self, min_support: usize) -> Self {
        self.min_support = min_support;
        self
    }

    /// Seed of the first run
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Conflict resolution of the reconstruction
    pub fn resolution(mut self, resolution: EdgeResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Fragment layout, used for marking and for reconstruction
    pub fn codec(mut self, codec: EdgeCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Simulate every run on multiple threads. The results do not change.
    pub fn parallel(mut self, n_threads: Option<usize>) -> Self {
        self.n_threads = Some(n_threads.unwrap_or_else(num_cpus::get));
        self
    }

    /// Total number of runs
    pub fn num_runs(&self) -> usize {
        self.probabilities.len() * self.packet_counts.len() * self.repetitions
    }

    fn parameters(&self, marking_probability: f64, packet_count: usize, run: usize) -> SimulationParameters {
        SimulationParameters::new(self.algorithm, marking_probability, packet_count, self.seed.wrapping_add(run as u64))
            .with_codec(self.codec)
    }

    /// # Run the sweep
    ///
    /// All parameters are checked before the first run. The stopper is checked between runs; if
    /// it was triggered, the report contains the runs performed so far and is marked as aborted.
    pub fn run(&self, topology: &Topology, stopper: &Stopper) -> Result<SweepReport, Error> {
        for p in self.probabilities.iter() {
            for n in self.packet_counts.iter() {
                self.parameters(*p, *n, 0).validate()?;
            }
        }

        let attack_distance = topology.max_attack_distance();
        let config = ReconstructionConfig::new(self.min_support).resolution(self.resolution).codec(self.codec);

        info!(
            "Sweeping {} probabilities and {} packet counts with {} ({} runs)",
            self.probabilities.len(),
            self.packet_counts.len(),
            self.algorithm,
            self.num_runs()
        );

        let mut points = Vec::new();
        let mut run = 0;
        let mut aborted = false;

        'sweep: for p in self.probabilities.iter() {
            for n in self.packet_counts.iter() {
                let mut samples = Samples::default();
                for _ in 0..self.repetitions {
                    if stopper.is_stop() {
                        aborted = true;
                        if !samples.precision.is_empty() {
                            points.push(samples.into_point(*p, *n, attack_distance));
                        }
                        break 'sweep;
                    }

                    let params = self.parameters(*p, *n, run);
                    let observations = match self.n_threads {
                        Some(threads) => simulate_run_parallel(topology, &params, Some(threads))?,
                        None => simulate(topology, &params)?,
                    };
                    let reconstructed = reconstruct_with(&observations, self.algorithm, &config);
                    let metrics = compare(&reconstructed, topology);

                    samples.precision.push(metrics.precision);
                    samples.recall.push(metrics.recall);
                    samples.node_recall.push(metrics.node_recall);
                    samples.missing_nodes.push(metrics.missing_nodes.len() as f64);
                    samples.spurious_edges.push(metrics.spurious_edges.len() as f64);
                    if reconstructed.status == ReconstructionStatus::InsufficientData {
                        samples.insufficient += 1;
                    }
                    if metrics.is_exact() {
                        samples.exact += 1;
                    }
                    run += 1;
                }
                let point = samples.into_point(*p, *n, attack_distance);
                debug!("p = {}, {} packets: recall {}", p, n, point.recall);
                points.push(point);
            }
        }

        if aborted {
            warn!("Sweep was stopped after {} of {} runs", run, self.num_runs());
        }

        Ok(SweepReport { algorithm: self.algorithm, attack_distance, runs: run, points, aborted })
    }
}
