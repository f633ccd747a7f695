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

//! # Simulation
//!
//! Simulate a flood of attack packets from the attackers to the victim, and collect the marks
//! arriving at the victim.
//!
//! Packets are simulated in chunks of [`PACKETS_PER_CHUNK`] packets. Every chunk draws from its
//! own random number generator, seeded from the run seed and the chunk number. Thus, the result of
//! a run only depends on the topology, the parameters and the seed, but not on the number of
//! threads used to compute it.

use crate::marking::encoding::mix64;
use crate::marking::{check_probability, Algorithm, EdgeCodec, Mark, Marker, Packet};
use crate::topology::{ConfigurationError, RouterId, Topology};
use crate::Error;

use log::*;
use rand::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

/// Number of packets simulated with the same random number generator
pub const PACKETS_PER_CHUNK: usize = 1024;

/// Bytes needed to carry a single router address
const ADDRESS_BYTES: usize = 4;
/// Bytes needed to carry an edge (two addresses and the distance) without compression
const EDGE_BYTES: usize = 2 * ADDRESS_BYTES + 1;

/// Parameters of a single simulation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParameters {
    /// The marking algorithm performed by every hop
    pub algorithm: Algorithm,
    /// Probability that a hop marks the packet
    pub marking_probability: f64,
    /// Number of packets sent by the attackers
    pub packet_count: usize,
    /// Seed for the random number generator
    pub seed: u64,
    /// Fragment layout, only used by [`Algorithm::EdgeFragmentSampling`]
    pub codec: EdgeCodec,
}

impl SimulationParameters {
    /// Create new parameters with the default fragment layout.
    pub fn new(algorithm: Algorithm, marking_probability: f64, packet_count: usize, seed: u64) -> Self {
        Self { algorithm, marking_probability, packet_count, seed, codec: EdgeCodec::default() }
    }

    /// Use a different fragment layout
    pub fn with_codec(mut self, codec: EdgeCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_probability(self.marking_probability)?;
        if self.packet_count == 0 {
            return Err(ConfigurationError::NoPackets);
        }
        Ok(())
    }
}

/// Additional bytes per run needed by naive implementations of the marking schemes, and the width
/// of the compressed fragment mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkingOverhead {
    /// Every router appends its address to every packet
    pub node_append_bytes: usize,
    /// One address per packet
    pub node_sampling_bytes: usize,
    /// Two addresses and a distance byte per packet
    pub edge_sampling_bytes: usize,
    /// Width of the fragment mark, in bits, of the configured fragment layout
    pub fragment_mark_bits: u32,
}

impl MarkingOverhead {
    fn merge(&mut self, other: &Self) {
        self.node_append_bytes += other.node_append_bytes;
        self.node_sampling_bytes += other.node_sampling_bytes;
        self.edge_sampling_bytes += other.edge_sampling_bytes;
        self.fragment_mark_bits = self.fragment_mark_bits.max(other.fragment_mark_bits);
    }
}

/// Ground truth statistics of a simulation run. The victim does not know any of these, they are
/// only used to evaluate the reconstruction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Number of packets sent
    pub packets_sent: usize,
    /// Number of times a packet was forwarded by a router which is neither attacker nor victim
    pub router_hops: usize,
    /// Number of packets sent or forwarded by each router
    pub times_used: BTreeMap<RouterId, usize>,
    /// Number of packets arriving at the victim with the mark of each router
    pub times_marked: BTreeMap<RouterId, usize>,
    /// Marking overhead
    pub overhead: MarkingOverhead,
}

impl RunStatistics {
    fn record(&mut self, path: &[RouterId], packet: &Packet, codec: &EdgeCodec) {
        let hops = path.len().saturating_sub(1);
        let routers = hops.saturating_sub(1);
        self.packets_sent += 1;
        self.router_hops += routers;
        for router in path.iter().take(hops) {
            *self.times_used.entry(*router).or_default() += 1;
        }
        if let Some(router) = packet.marked_by {
            *self.times_marked.entry(router).or_default() += 1;
        }
        self.overhead.node_append_bytes += routers * ADDRESS_BYTES;
        self.overhead.node_sampling_bytes += ADDRESS_BYTES;
        self.overhead.edge_sampling_bytes += EDGE_BYTES;
        self.overhead.fragment_mark_bits = codec.mark_bits();
    }

    fn merge(&mut self, other: &Self) {
        self.packets_sent += other.packets_sent;
        self.router_hops += other.router_hops;
        for (router, n) in other.times_used.iter() {
            *self.times_used.entry(*router).or_default() += n;
        }
        for (router, n) in other.times_marked.iter() {
            *self.times_marked.entry(*router).or_default() += n;
        }
        self.overhead.merge(&other.overhead);
    }
}

/// # Observation Set
///
/// Multiset of marks received by the victim during a run. Observations only grow; merging two
/// sets is the reduce step of a parallel simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    victim: RouterId,
    algorithm: Algorithm,
    marks: Vec<Mark>,
    statistics: RunStatistics,
}

impl ObservationSet {
    /// Create an empty observation set
    pub fn new(victim: RouterId, algorithm: Algorithm) -> Self {
        Self { victim, algorithm, marks: Vec::new(), statistics: RunStatistics::default() }
    }

    /// Create an observation set from marks collected elsewhere. No statistics are known.
    pub fn from_marks<I: IntoIterator<Item = Mark>>(victim: RouterId, algorithm: Algorithm, marks: I) -> Self {
        Self { victim, algorithm, marks: marks.into_iter().collect(), statistics: RunStatistics::default() }
    }

    /// The victim collecting the marks
    pub fn victim(&self) -> RouterId {
        self.victim
    }

    /// The algorithm used by the routers
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// All received marks, in arrival order
    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Number of received packets
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    /// Returns `true` if no packet was received
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Number of packets carrying a mark
    pub fn num_marked(&self) -> usize {
        self.marks.iter().filter(|m| m.is_marked()).count()
    }

    /// Ground truth statistics of the run
    pub fn statistics(&self) -> &RunStatistics {
        &self.statistics
    }

    /// Add a single mark
    pub fn push(&mut self, mark: Mark) {
        self.marks.push(mark);
    }

    /// Append all observations of `other`. Reconstruction does not depend on the order in which
    /// observation sets are merged.
    pub fn merge(&mut self, other: ObservationSet) {
        if other.algorithm != self.algorithm || other.victim != self.victim {
            warn!(
                "Merging observations of {} at {:?} into observations of {} at {:?}",
                other.algorithm, other.victim, self.algorithm, self.victim
            );
        }
        self.statistics.merge(&other.statistics);
        self.marks.extend(other.marks);
    }

    fn record(&mut self, path: &[RouterId], packet: Packet, codec: &EdgeCodec) {
        self.statistics.record(path, &packet, codec);
        self.marks.push(packet.mark);
    }
}

/// # Simulate a run
///
/// Send `packet_count` packets from the attackers of the topology to the victim, and collect the
/// marks at the victim. Each packet originates at an attacker chosen uniformly at random.
///
/// ```rust
/// use traceback::{simulate_run, marking::Algorithm};
/// use traceback::example_networks::{ChainNet, ExampleNetwork};
///
/// # fn main() -> Result<(), traceback::Error> {
/// let topo = ChainNet::<traceback::example_networks::repetitions::Repetition3>::net(0)?;
/// let observations = simulate_run(&topo, Algorithm::EdgeSampling, 0.5, 1000, 42)?;
/// assert_eq!(observations.len(), 1000);
/// # Ok(())
/// # }
/// ```
pub fn simulate_run(
    topology: &Topology,
    algorithm: Algorithm,
    marking_probability: f64,
    packet_count: usize,
    seed: u64,
) -> Result<ObservationSet, Error> {
    simulate(topology, &SimulationParameters::new(algorithm, marking_probability, packet_count, seed))
}

/// Simulate a run with the given parameters, on the current thread.
pub fn simulate(topology: &Topology, params: &SimulationParameters) -> Result<ObservationSet, Error> {
    let marker = Marker::new(topology, params)?;
    let paths = topology.paths()?;

    info!(
        "Simulating {} packets with {} (p = {}, seed = {})",
        params.packet_count, params.algorithm, params.marking_probability, params.seed
    );

    let mut observations = ObservationSet::new(topology.victim(), params.algorithm);
    for chunk in 0..num_chunks(params.packet_count) {
        observations.merge(simulate_chunk(&marker, &paths, topology.victim(), params, chunk));
    }

    debug!("Victim received {} marked packets out of {}", observations.num_marked(), observations.len());
    Ok(observations)
}

/// # Simulate a run using multiple parallel threads
///
/// The chunks of the run are distributed over `n_threads` threads (by default, one thread per
/// cpu). The result is identical to [`simulate`] with the same parameters.
pub fn simulate_run_parallel(
    topology: &Topology,
    params: &SimulationParameters,
    n_threads: Option<usize>,
) -> Result<ObservationSet, Error> {
    let marker = Arc::new(Marker::new(topology, params)?);
    let paths = Arc::new(topology.paths()?);
    let chunks = num_chunks(params.packet_count);
    let n_threads = n_threads.unwrap_or_else(num_cpus::get).max(1).min(chunks);

    info!(
        "Simulating {} packets with {} (p = {}, seed = {}) on {} threads",
        params.packet_count, params.algorithm, params.marking_probability, params.seed, n_threads
    );

    let handles = (0..n_threads)
        .map(|t| {
            let marker = Arc::clone(&marker);
            let paths = Arc::clone(&paths);
            let params = *params;
            let victim = topology.victim();
            thread::spawn(move || {
                (t..chunks)
                    .step_by(n_threads)
                    .map(|chunk| (chunk, simulate_chunk(&marker, &paths, victim, &params, chunk)))
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let mut results: Vec<(usize, ObservationSet)> = Vec::with_capacity(chunks);
    for handle in handles {
        match handle.join() {
            Ok(r) => results.extend(r),
            Err(e) => std::panic::resume_unwind(e),
        }
    }
    results.sort_by_key(|(chunk, _)| *chunk);

    let mut observations = ObservationSet::new(topology.victim(), params.algorithm);
    for (_, chunk) in results {
        observations.merge(chunk);
    }

    debug!("Victim received {} marked packets out of {}", observations.num_marked(), observations.len());
    Ok(observations)
}

/// Simulate a single packet from `path[0]` to the victim, using the caller's random number
/// generator.
pub fn simulate_packet<R: Rng + ?Sized>(
    topology: &Topology,
    path: &[RouterId],
    params: &SimulationParameters,
    rng: &mut R,
) -> Result<Packet, Error> {
    let marker = Marker::new(topology, params)?;
    Ok(marker.mark_packet(path, rng))
}

fn num_chunks(packet_count: usize) -> usize {
    (packet_count + PACKETS_PER_CHUNK - 1) / PACKETS_PER_CHUNK
}

fn chunk_seed(seed: u64, chunk: usize) -> u64 {
    mix64(seed ^ mix64(chunk as u64))
}

fn simulate_chunk(
    marker: &Marker,
    paths: &[Vec<RouterId>],
    victim: RouterId,
    params: &SimulationParameters,
    chunk: usize,
) -> ObservationSet {
    let mut rng = StdRng::seed_from_u64(chunk_seed(params.seed, chunk));
    let first = chunk * PACKETS_PER_CHUNK;
    let num_packets = PACKETS_PER_CHUNK.min(params.packet_count - first);

    let mut observations = ObservationSet::new(victim, params.algorithm);
    for _ in 0..num_packets {
        let path = &paths[rng.gen_range(0, paths.len())];
        let packet = marker.mark_packet(path, &mut rng);
        observations.record(path, packet, &params.codec);
    }
    observations
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chunks() {
        assert_eq!(num_chunks(1), 1);
        assert_eq!(num_chunks(PACKETS_PER_CHUNK), 1);
        assert_eq!(num_chunks(PACKETS_PER_CHUNK + 1), 2);
        assert_ne!(chunk_seed(42, 0), chunk_seed(42, 1));
        assert_ne!(chunk_seed(42, 0), chunk_seed(43, 0));
    }

    #[test]
    fn validate_parameters() {
        let p = SimulationParameters::new(Algorithm::NodeSampling, 0.5, 10, 0);
        assert!(p.validate().is_ok());
        let p = SimulationParameters::new(Algorithm::NodeSampling, 0.5, 0, 0);
        assert_eq!(p.validate(), Err(ConfigurationError::NoPackets));
        let p = SimulationParameters::new(Algorithm::NodeSampling, 1.1, 10, 0);
        assert_eq!(p.validate(), Err(ConfigurationError::InvalidProbability(1.1)));
    }
}
