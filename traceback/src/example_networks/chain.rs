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

//! # Chain Net
//! A single chain of routers between the attacker and the victim.

use super::{
    repetitions::{Repetition3, Repetitions},
    ExampleNetwork,
};
use crate::topology::{ConfigurationError, Topology, TopologyBuilder};
use std::marker::PhantomData;

/// # Chain Net
/// This network consists of the attacker `a`, `N` routers and the victim `v`, arranged as follows:
///
/// ```text
/// a -> r00 -> r01 -> ... -> r(N-1) -> v
/// ```
///
/// The attacker has id 0, router `ri` has id `i + 1`, and the victim has id `N + 1`. With
/// `Repetition3`, this is the linear topology `A -> R1 -> R2 -> R3 -> V`.
///
/// The variant adds additional attackers `a01`, `a02`, ... Attacker `ai` is connected to router
/// `r(i mod N)`, and it is added after the victim.
#[derive(Debug)]
pub struct ChainNet<R = Repetition3> {
    phantom: PhantomData<R>,
}

impl<R> ExampleNetwork for ChainNet<R>
where
    R: Repetitions,
{
    fn net(variant: usize) -> Result<Topology, ConfigurationError> {
        let n = R::get_count();
        if n == 0 {
            return Err(ConfigurationError::InvalidTopologyParameters(
                "a chain needs at least one router".to_string(),
            ));
        }

        let mut t = TopologyBuilder::new();
        let a = t.add_router("a")?;
        let mut routers = Vec::with_capacity(n);
        let mut last = a;
        for i in 0..n {
            let r = t.add_router(format!("r{:02}", i))?;
            t.add_link(last, r)?;
            routers.push(r);
            last = r;
        }
        let v = t.add_router("v")?;
        t.add_link(last, v)?;

        t.add_attacker(a)?;
        t.set_victim(v)?;

        for i in 1..=variant {
            let extra = t.add_router(format!("a{:02}", i))?;
            t.add_link(extra, routers[i % n])?;
            t.add_attacker(extra)?;
        }

        t.build()
    }
}
