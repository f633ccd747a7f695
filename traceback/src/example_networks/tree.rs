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

//! # Binary Tree Net
//! Attackers at the leaves of a complete binary tree, with the victim behind the root.

use super::{
    repetitions::{Repetition2, Repetitions},
    ExampleNetwork,
};
use crate::topology::{ConfigurationError, RouterId, Topology, TopologyBuilder};
use std::marker::PhantomData;

/// # Binary Tree Net
/// The victim `v` is connected to the root `r` of a complete binary tree of depth `N`. Router
/// `t{d}_{i}` is the `i`-th router at depth `d`, and it forwards to `t{d-1}_{i/2}`. The `2^N`
/// leaves are the attackers. Every attack path has `N + 1` hops.
///
/// Variant 0 uses all leaves as attackers. Variant `k > 0` only uses the first `k` leaves.
#[derive(Debug)]
pub struct BinaryTreeNet<R = Repetition2> {
    phantom: PhantomData<R>,
}

impl<R> ExampleNetwork for BinaryTreeNet<R>
where
    R: Repetitions,
{
    fn net(variant: usize) -> Result<Topology, ConfigurationError> {
        let depth = R::get_count();
        if depth > 16 {
            return Err(ConfigurationError::InvalidTopologyParameters(format!(
                "binary tree of depth {} is too large",
                depth
            )));
        }

        let mut t = TopologyBuilder::new();
        let v = t.add_router("v")?;
        let root = t.add_router("r")?;
        t.add_link(root, v)?;
        t.set_victim(v)?;

        let mut level: Vec<RouterId> = vec![root];
        for d in 1..=depth {
            let mut next = Vec::with_capacity(level.len() * 2);
            for i in 0..(level.len() * 2) {
                let router = t.add_router(format!("t{}_{}", d, i))?;
                t.add_link(router, level[i / 2])?;
                next.push(router);
            }
            level = next;
        }

        let num_attackers = if variant == 0 { level.len() } else { variant.min(level.len()) };
        for leaf in level.iter().take(num_attackers) {
            t.add_attacker(*leaf)?;
        }

        t.build()
    }
}
