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

//! # Node Sampling
//!
//! Every hop overwrites the candidate with its own identifier with probability `p`. The victim
//! receives the identifier of the last hop which has won its coin flip. A hop at distance `d` from
//! the victim survives with probability `p (1 - p)^(d - 1)`, hence hops close to the victim
//! dominate the samples.

use crate::marking::{coin_flip, encode_node, Mark};
use crate::topology::RouterId;

use rand::Rng;

/// Perform the node sampling procedure of a single hop, and return the new mark.
pub fn mark_hop<R: Rng + ?Sized>(mark: Mark, hop: RouterId, p: f64, rng: &mut R) -> Mark {
    if coin_flip(p, rng) {
        return encode_node(hop);
    }
    match mark {
        Mark::Candidate { node, hops } => Mark::Candidate { node, hops: hops.saturating_add(1) },
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn always_mark() {
        let mut rng = StdRng::seed_from_u64(0);
        let mark = mark_hop(Mark::Empty, 1.into(), 1.0, &mut rng);
        assert_eq!(mark, Mark::Candidate { node: 1.into(), hops: 0 });
        let mark = mark_hop(mark, 2.into(), 1.0, &mut rng);
        assert_eq!(mark, Mark::Candidate { node: 2.into(), hops: 0 });
    }

    #[test]
    fn never_mark() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(mark_hop(Mark::Empty, 1.into(), 0.0, &mut rng), Mark::Empty);
        let mark = Mark::Candidate { node: 3.into(), hops: 2 };
        assert_eq!(mark_hop(mark, 1.into(), 0.0, &mut rng), Mark::Candidate { node: 3.into(), hops: 3 });
    }
}
