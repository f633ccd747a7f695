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

//! Test the mark encoding and the fragment codec.

use crate::example_networks::repetitions::Repetition3;
use crate::example_networks::{ChainNet, ExampleNetwork};
use crate::marking::{encode_node, EdgeCodec, EdgeDecode, EdgeFragment, EncodingError, Mark};
use crate::topology::RouterId;
use assert_approx_eq::assert_approx_eq;

fn r(id: usize) -> RouterId {
    RouterId::new(id)
}

#[test]
fn test_encode_node() {
    assert_eq!(encode_node(r(3)), Mark::Candidate { node: r(3), hops: 0 });
    assert_eq!(encode_node(r(3)), encode_node(r(3)));
}

#[test]
fn test_default_layout() {
    let codec = EdgeCodec::default();
    assert_eq!(codec.codeword_bits(), 64);
    assert_eq!(codec.fragment_bits(), 8);
    assert_eq!(codec.index_bits(), 3);
    assert_eq!(codec.mark_bits(), 24);
    assert_eq!(codec.max_distance(), 31);
    assert_eq!(codec.with_capacity(24), Ok(codec));
    assert_eq!(codec.with_capacity(16), Err(EncodingError::CapacityExceeded { required: 24, capacity: 16 }));
}

#[test]
fn test_invalid_layout() {
    assert!(matches!(EdgeCodec::new(32, 32, 7, 5), Err(EncodingError::InvalidFragmentLayout(_))));
    assert!(matches!(EdgeCodec::new(0, 32, 8, 5), Err(EncodingError::InvalidFragmentLayout(_))));
    assert!(matches!(EdgeCodec::new(33, 31, 8, 5), Err(EncodingError::InvalidFragmentLayout(_))));
    assert!(matches!(EdgeCodec::new(32, 32, 8, 0), Err(EncodingError::InvalidFragmentLayout(_))));
    assert!(EdgeCodec::new(16, 16, 4, 4).is_ok());
}

#[test]
fn test_encode_fragment_errors() {
    let codec = EdgeCodec::new(8, 4, 3, 5).unwrap();
    assert_eq!(codec.codeword(r(256)), Err(EncodingError::IdentifierTooLarge(256, 8)));
    assert_eq!(
        codec.encode_edge_fragment(r(1), Some(r(2)), 3),
        Err(EncodingError::FragmentIndexOutOfRange { index: 3, total: 3 })
    );
    assert_eq!(
        codec.encode_edge_fragment(r(1), Some(r(256)), 0),
        Err(EncodingError::IdentifierTooLarge(256, 8))
    );
}

#[test]
fn test_decode_is_left_inverse() {
    for codec in [EdgeCodec::default(), EdgeCodec::new(8, 4, 3, 5).unwrap(), EdgeCodec::new(16, 16, 1, 4).unwrap()]
        .iter()
    {
        for start in 0..50 {
            for end in [None, Some(r(0)), Some(r(49)), Some(r(start + 1))].iter() {
                let fragments = codec.fragments_for(r(start), *end).unwrap();
                assert_eq!(fragments.len(), codec.total_fragments() as usize);
                assert_eq!(codec.decode_edge(&fragments), EdgeDecode::Edge { start: r(start), end: *end });

                // encoding is deterministic, and the order of the fragments does not matter
                let mut reversed = codec.fragments_for(r(start), *end).unwrap();
                reversed.reverse();
                assert_eq!(reversed.len(), fragments.len());
                assert_eq!(codec.decode_edge(&reversed), EdgeDecode::Edge { start: r(start), end: *end });
            }
        }
    }
}

#[test]
fn test_decode_incomplete() {
    let codec = EdgeCodec::default();
    let fragments = codec.fragments_for(r(4), Some(r(5))).unwrap();
    let partial: Vec<EdgeFragment> = fragments.iter().filter(|f| f.index % 3 != 0).copied().collect();
    assert_eq!(codec.decode_edge(&partial), EdgeDecode::Incomplete { missing: vec![0, 3, 6] });
    assert_eq!(codec.decode_edge(&[]), EdgeDecode::Incomplete { missing: (0..8).collect() });
}

#[test]
fn test_decode_inconsistent() {
    let codec = EdgeCodec::default();
    let a = codec.fragments_for(r(4), Some(r(5))).unwrap();
    let b = codec.fragments_for(r(6), Some(r(7))).unwrap();

    // two different fragments with the same index
    let mut both = a.clone();
    both.push(b[2]);
    if a[2] != b[2] {
        assert_eq!(codec.decode_edge(&both), EdgeDecode::Inconsistent);
    }

    // duplicates are fine
    let mut duplicates = a.clone();
    duplicates.extend(a.iter().copied());
    assert_eq!(codec.decode_edge(&duplicates), EdgeDecode::Edge { start: r(4), end: Some(r(5)) });

    // edges to the victim mixed with other edges
    let c = codec.fragments_for(r(4), None).unwrap();
    let mut mixed = a.clone();
    mixed[1] = c[1];
    assert_eq!(codec.decode_edge(&mixed), EdgeDecode::Inconsistent);

    // out of range
    let mut invalid = a;
    invalid.push(EdgeFragment { index: 8, start: 0, end: None });
    assert_eq!(codec.decode_edge(&invalid), EdgeDecode::Inconsistent);
}

#[test]
fn test_recombination_is_rejected() {
    let codec = EdgeCodec::default();
    let a = codec.fragments_for(r(1), Some(r(2))).unwrap();
    let b = codec.fragments_for(r(3), Some(r(4))).unwrap();
    let mut mixed: Vec<EdgeFragment> = a.iter().take(4).copied().collect();
    mixed.extend(b.iter().skip(4).copied());
    assert_eq!(codec.decode_edge(&mixed), EdgeDecode::Inconsistent);
}

#[test]
fn test_collision_probability() {
    // with 8 id bits and 4 hash bits, exactly one codeword out of 16 is valid for every id.
    let codec = EdgeCodec::new(8, 4, 3, 5).unwrap();
    let space = 1u64 << codec.codeword_bits();
    let valid = (0..space).filter(|w| codec.check_codeword(*w).is_some()).count();
    assert_eq!(valid, 256);
    assert_approx_eq!(valid as f64 / space as f64, codec.collision_probability());
    assert_approx_eq!(EdgeCodec::default().collision_probability(), 0.5f64.powi(32));
    assert_eq!(codec.check_codeword(space), None);
}

#[test]
fn test_codebook() {
    let topo = ChainNet::<Repetition3>::net(0).unwrap();
    let codec = EdgeCodec::default();
    let codebook = codec.codebook(&topo).unwrap();
    for router in topo.routers() {
        let word = codebook.get(router.router_id()).unwrap();
        assert_eq!(Ok(word), codec.codeword(router.router_id()));
        assert_eq!(codec.check_codeword(word), Some(router.router_id().index() as u32));
    }
    assert_eq!(codebook.get(r(100)), None);

    let tiny = EdgeCodec::new(2, 2, 2, 3).unwrap();
    assert_eq!(tiny.codebook(&topo), Err(EncodingError::IdentifierTooLarge(4, 2)));
}
