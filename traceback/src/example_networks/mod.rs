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

//! Networks for testing and for experiments

use crate::topology::{ConfigurationError, Topology};

pub mod repetitions;

mod chain;
pub use chain::ChainNet;

mod tree;
pub use tree::BinaryTreeNet;

mod watts_strogatz;
pub use watts_strogatz::WattsStrogatzNet;

/// Trait for easier access to example networks.
pub trait ExampleNetwork {
    /// Get the topology with the chosen variant. The meaning of the variant depends on the network.
    fn net(variant: usize) -> Result<Topology, ConfigurationError>;
}
