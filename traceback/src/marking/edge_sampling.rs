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

//! # Edge Sampling
//!
//! A hop which wins the coin flip starts a new edge: it writes itself as `start`, clears `end` and
//! resets the distance to 0. A hop which does not win completes the edge if the distance is 0 (it
//! writes itself as `end`), and increments the distance in every case. The victim thus receives a
//! single edge of the attack path, together with the number of hops between the end of that edge
//! and the victim.

use crate::marking::{coin_flip, EdgeCodec, EdgeFragment, EdgeMark, FragmentMark, Mark};
use crate::topology::RouterId;

use rand::Rng;

/// Perform the edge sampling procedure of a single hop, and return the new mark.
pub fn mark_hop<R: Rng + ?Sized>(mark: Mark, hop: RouterId, p: f64, rng: &mut R) -> Mark {
    if coin_flip(p, rng) {
        return Mark::Edge(EdgeMark { start: hop, end: None, distance: 0 });
    }
    match mark {
        Mark::Edge(EdgeMark { start, end, distance }) => Mark::Edge(EdgeMark {
            start,
            end: if distance == 0 { Some(hop) } else { end },
            distance: distance.saturating_add(1),
        }),
        other => other,
    }
}

/// Perform the edge fragment sampling procedure of a single hop with the given codeword. A hop
/// starting a new edge picks the fragment index uniformly at random. The distance saturates at
/// [`EdgeCodec::max_distance`].
pub fn mark_fragment_hop<R: Rng + ?Sized>(
    mark: Mark,
    codeword: u64,
    p: f64,
    codec: &EdgeCodec,
    rng: &mut R,
) -> Mark {
    if coin_flip(p, rng) {
        let index = rng.gen_range(0, codec.total_fragments());
        return Mark::Fragment(FragmentMark {
            fragment: EdgeFragment { index, start: codec.slice(codeword, index), end: None },
            distance: 0,
        });
    }
    match mark {
        Mark::Fragment(FragmentMark { fragment, distance }) => {
            let fragment = if distance == 0 {
                EdgeFragment { end: Some(codec.slice(codeword, fragment.index)), ..fragment }
            } else {
                fragment
            };
            Mark::Fragment(FragmentMark { fragment, distance: (distance + 1).min(codec.max_distance()) })
        }
        other => other,
    }
}
