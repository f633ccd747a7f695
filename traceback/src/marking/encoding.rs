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

//! # Mark Encoding
//!
//! Pure functions to encode router identifiers into marks. Node sampling carries the identifier
//! directly. For edge fragment sampling, every router identifier is expanded into a *codeword*,
//! which interleaves the bits of the identifier with the bits of a hash of that identifier. The
//! codeword is then split into `total_fragments` fragments of equal size. A packet carries a
//! single fragment index, together with the corresponding fragment of the start and of the end of
//! the edge.
//!
//! ## Collision model
//!
//! At the victim, fragments of different edges at the same distance cannot be told apart, so all
//! combinations of fragments are reassembled and checked. A reassembled codeword, which is not the
//! codeword of a single identifier, is accepted only if its hash bits happen to match. Exactly one
//! of the `2^hash_bits` hash values is valid for each identifier, hence a random recombination is
//! accepted with probability `2^-hash_bits` per endpoint, see
//! [`EdgeCodec::collision_probability`].

use crate::marking::Mark;
use crate::topology::{RouterId, Topology};

use std::collections::BTreeMap;
use thiserror::Error;

/// Encoding Error
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    /// The mark requires more bits than the declared capacity
    #[error("Mark requires {required} bits, but the capacity is {capacity} bits")]
    CapacityExceeded {
        /// Number of bits required by the layout
        required: u32,
        /// Declared capacity of the mark
        capacity: u32,
    },
    /// The identifier does not fit into the identifier space
    #[error("Identifier {0} does not fit into {1} bits")]
    IdentifierTooLarge(u32, u32),
    /// The fragment index is not smaller than the number of fragments
    #[error("Fragment index {index} is out of range (total: {total})")]
    FragmentIndexOutOfRange {
        /// Requested fragment index
        index: u32,
        /// Number of fragments
        total: u32,
    },
    /// The layout of the codeword is invalid
    #[error("Invalid fragment layout: {0}")]
    InvalidFragmentLayout(String),
    /// A path is longer than the distance field can represent
    #[error("Distance {distance} cannot be represented (maximum: {max})")]
    DistanceOverflow {
        /// Largest distance the victim would have to receive
        distance: u32,
        /// Largest representable distance
        max: u32,
    },
}

/// Encode a router identifier as a node sampling mark, as written by the marking router.
pub fn encode_node(router: RouterId) -> Mark {
    Mark::Candidate { node: router, hops: 0 }
}

/// A single fragment of an edge. `start` and `end` hold the bits of the respective codewords at
/// position `index`. `end` is `None` if no router has completed the edge (the edge ends at the
/// victim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeFragment {
    /// Position of the fragment in the codeword
    pub index: u32,
    /// Fragment of the start codeword
    pub start: u64,
    /// Fragment of the end codeword
    pub end: Option<u64>,
}

/// Result of reassembling the fragments of an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecode {
    /// The edge was recovered. `end` is `None` if the edge ends at the victim.
    Edge {
        /// Upstream router of the edge
        start: RouterId,
        /// Downstream router of the edge
        end: Option<RouterId>,
    },
    /// Some fragment indices are missing. Nothing is guessed.
    Incomplete {
        /// Missing fragment indices
        missing: Vec<u32>,
    },
    /// The fragments cannot belong to a single edge: they disagree, or the hash check failed.
    Inconsistent,
}

/// # Edge Codec
///
/// Layout of the fragmented edge mark. The codeword of an identifier has `id_bits + hash_bits`
/// bits, which must be divisible by `total_fragments`. A mark carries two fragments (start and
/// end), the fragment index, and the distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeCodec {
    id_bits: u32,
    hash_bits: u32,
    total_fragments: u32,
    distance_bits: u32,
}

impl Default for EdgeCodec {
    /// 32-bit identifiers, 32-bit hash, 8 fragments and 5 bits of distance.
    fn default() -> Self {
        Self { id_bits: 32, hash_bits: 32, total_fragments: 8, distance_bits: 5 }
    }
}

impl EdgeCodec {
    /// Create a new codec, checking that the layout is valid.
    pub fn new(
        id_bits: u32,
        hash_bits: u32,
        total_fragments: u32,
        distance_bits: u32,
    ) -> Result<Self, EncodingError> {
        if id_bits == 0 || id_bits > 32 {
            return Err(EncodingError::InvalidFragmentLayout(format!(
                "identifier must have between 1 and 32 bits, not {}",
                id_bits
            )));
        }
        if hash_bits > 32 {
            return Err(EncodingError::InvalidFragmentLayout(format!(
                "hash must have at most 32 bits, not {}",
                hash_bits
            )));
        }
        if distance_bits == 0 || distance_bits > 16 {
            return Err(EncodingError::InvalidFragmentLayout(format!(
                "distance must have between 1 and 16 bits, not {}",
                distance_bits
            )));
        }
        let width = id_bits + hash_bits;
        if total_fragments == 0 || width % total_fragments != 0 {
            return Err(EncodingError::InvalidFragmentLayout(format!(
                "a codeword of {} bits cannot be split into {} fragments",
                width, total_fragments
            )));
        }
        Ok(Self { id_bits, hash_bits, total_fragments, distance_bits })
    }

    /// Check that the mark fits into `capacity` bits.
    pub fn with_capacity(self, capacity: u32) -> Result<Self, EncodingError> {
        let required = self.mark_bits();
        if required > capacity {
            Err(EncodingError::CapacityExceeded { required, capacity })
        } else {
            Ok(self)
        }
    }

    /// Size of the identifier space, in bits
    pub fn id_bits(&self) -> u32 {
        self.id_bits
    }

    /// Number of hash bits in each codeword
    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    /// Number of fragments of each codeword
    pub fn total_fragments(&self) -> u32 {
        self.total_fragments
    }

    /// Number of bits of the distance field
    pub fn distance_bits(&self) -> u32 {
        self.distance_bits
    }

    /// Largest distance that can be carried. Larger distances saturate.
    pub fn max_distance(&self) -> u32 {
        ((1u64 << self.distance_bits) - 1) as u32
    }

    /// Width of a codeword
    pub fn codeword_bits(&self) -> u32 {
        self.id_bits + self.hash_bits
    }

    /// Width of a single fragment
    pub fn fragment_bits(&self) -> u32 {
        self.codeword_bits() / self.total_fragments
    }

    /// Number of bits needed to carry the fragment index
    pub fn index_bits(&self) -> u32 {
        if self.total_fragments <= 1 {
            0
        } else {
            32 - (self.total_fragments - 1).leading_zeros()
        }
    }

    /// Total width of a fragment mark: two fragments, the index and the distance.
    pub fn mark_bits(&self) -> u32 {
        2 * self.fragment_bits() + self.index_bits() + self.distance_bits
    }

    /// Probability that a codeword reassembled from fragments of different identifiers passes the
    /// hash check of a single endpoint.
    pub fn collision_probability(&self) -> f64 {
        0.5f64.powi(self.hash_bits as i32)
    }

    /// Hash of an identifier, truncated to `hash_bits`.
    pub fn hash(&self, id: u32) -> u32 {
        (mix64(id as u64) & mask(self.hash_bits)) as u32
    }

    /// Returns the codeword of a router.
    pub fn codeword(&self, router: RouterId) -> Result<u64, EncodingError> {
        let id = router.index() as u64;
        if id > mask(self.id_bits) {
            return Err(EncodingError::IdentifierTooLarge(id as u32, self.id_bits));
        }
        let id = id as u32;
        Ok(self.interleave(id, self.hash(id)))
    }

    /// Checks a (reassembled) codeword. Returns the identifier if the hash matches.
    pub fn check_codeword(&self, codeword: u64) -> Option<u32> {
        if codeword > mask(self.codeword_bits()) {
            return None;
        }
        let (id, hash) = self.deinterleave(codeword);
        if self.hash(id) == hash {
            Some(id)
        } else {
            None
        }
    }

    /// Fragment `index` of a codeword. `index` must be smaller than `total_fragments`.
    pub(crate) fn slice(&self, codeword: u64, index: u32) -> u64 {
        let bits = self.fragment_bits();
        (codeword >> (index * bits)) & mask(bits)
    }

    /// Encode fragment `index` of the edge `(start, end)`. `end` is `None` for an edge ending at
    /// the victim. Calling this function repeatedly yields identical fragments.
    pub fn encode_edge_fragment(
        &self,
        start: RouterId,
        end: Option<RouterId>,
        index: u32,
    ) -> Result<EdgeFragment, EncodingError> {
        if index >= self.total_fragments {
            return Err(EncodingError::FragmentIndexOutOfRange { index, total: self.total_fragments });
        }
        let start = self.slice(self.codeword(start)?, index);
        let end = match end {
            Some(end) => Some(self.slice(self.codeword(end)?, index)),
            None => None,
        };
        Ok(EdgeFragment { index, start, end })
    }

    /// All fragments of the edge `(start, end)`, ordered by their index.
    pub fn fragments_for(&self, start: RouterId, end: Option<RouterId>) -> Result<Vec<EdgeFragment>, EncodingError> {
        (0..self.total_fragments).map(|i| self.encode_edge_fragment(start, end, i)).collect()
    }

    /// Reassemble an edge from its fragments. Duplicate fragments are allowed, as long as they are
    /// identical. The edge is returned only if every index is present and both codewords pass the
    /// hash check.
    pub fn decode_edge(&self, fragments: &[EdgeFragment]) -> EdgeDecode {
        let mut by_index: BTreeMap<u32, EdgeFragment> = BTreeMap::new();
        for fragment in fragments {
            if fragment.index >= self.total_fragments {
                return EdgeDecode::Inconsistent;
            }
            match by_index.get(&fragment.index) {
                Some(known) if known != fragment => return EdgeDecode::Inconsistent,
                Some(_) => {}
                None => {
                    by_index.insert(fragment.index, *fragment);
                }
            }
        }

        let missing: Vec<u32> = (0..self.total_fragments).filter(|i| !by_index.contains_key(i)).collect();
        if !missing.is_empty() {
            return EdgeDecode::Incomplete { missing };
        }

        let bits = self.fragment_bits();
        let ends_at_victim = by_index.values().all(|f| f.end.is_none());
        if !ends_at_victim && by_index.values().any(|f| f.end.is_none()) {
            return EdgeDecode::Inconsistent;
        }

        let mut start_word: u64 = 0;
        let mut end_word: u64 = 0;
        for (index, fragment) in by_index.iter() {
            start_word |= fragment.start << (index * bits);
            end_word |= fragment.end.unwrap_or(0) << (index * bits);
        }

        let start = match self.check_codeword(start_word) {
            Some(id) => RouterId::new(id as usize),
            None => return EdgeDecode::Inconsistent,
        };
        if ends_at_victim {
            return EdgeDecode::Edge { start, end: None };
        }
        match self.check_codeword(end_word) {
            Some(id) => EdgeDecode::Edge { start, end: Some(RouterId::new(id as usize)) },
            None => EdgeDecode::Inconsistent,
        }
    }

    /// Precompute the codewords of all routers of the topology.
    pub fn codebook(&self, topology: &Topology) -> Result<Codebook, EncodingError> {
        let words = topology
            .routers()
            .iter()
            .map(|r| self.codeword(r.router_id()))
            .collect::<Result<Vec<u64>, EncodingError>>()?;
        Ok(Codebook { words })
    }

    fn interleave(&self, id: u32, hash: u32) -> u64 {
        let mut word: u64 = 0;
        let mut pos = 0;
        for i in 0..self.id_bits.max(self.hash_bits) {
            if i < self.id_bits {
                word |= (((id >> i) & 1) as u64) << pos;
                pos += 1;
            }
            if i < self.hash_bits {
                word |= (((hash >> i) & 1) as u64) << pos;
                pos += 1;
            }
        }
        word
    }

    fn deinterleave(&self, word: u64) -> (u32, u32) {
        let mut id: u32 = 0;
        let mut hash: u32 = 0;
        let mut pos = 0;
        for i in 0..self.id_bits.max(self.hash_bits) {
            if i < self.id_bits {
                id |= (((word >> pos) & 1) as u32) << i;
                pos += 1;
            }
            if i < self.hash_bits {
                hash |= (((word >> pos) & 1) as u32) << i;
                pos += 1;
            }
        }
        (id, hash)
    }
}

/// Codewords of all routers of a topology, indexed by the router id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codebook {
    words: Vec<u64>,
}

impl Codebook {
    /// Codeword of the router, if the router is part of the topology.
    pub fn get(&self, router: RouterId) -> Option<u64> {
        self.words.get(router.index()).copied()
    }
}

/// Mask of the lowest `bits` bits.
fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// SplitMix64 finalizer, used for the codeword hash and for deriving seeds.
pub(crate) fn mix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interleave_roundtrip() {
        let codec = EdgeCodec::new(8, 4, 3, 5).unwrap();
        for id in 0..256u32 {
            let hash = codec.hash(id);
            assert!(hash < 16);
            assert_eq!(codec.deinterleave(codec.interleave(id, hash)), (id, hash));
        }
    }

    #[test]
    fn mask_bounds() {
        assert_eq!(mask(0), 0);
        assert_eq!(mask(8), 0xff);
        assert_eq!(mask(64), u64::MAX);
    }

    #[test]
    fn index_bits() {
        assert_eq!(EdgeCodec::new(32, 32, 1, 5).unwrap().index_bits(), 0);
        assert_eq!(EdgeCodec::new(32, 32, 2, 5).unwrap().index_bits(), 1);
        assert_eq!(EdgeCodec::new(32, 32, 8, 5).unwrap().index_bits(), 3);
        assert_eq!(EdgeCodec::new(8, 4, 3, 5).unwrap().index_bits(), 2);
    }
}
