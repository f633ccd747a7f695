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

//! Module containing the crate-level error type

use crate::marking::EncodingError;
use crate::topology::ConfigurationError;
use thiserror::Error;

/// Main error type. Both kinds are raised while setting up a simulation, before any packet is
/// sent. Reconstruction never fails, see [`ReconstructionStatus`](crate::reconstruction::ReconstructionStatus).
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Invalid topology or simulation parameters
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// The topology cannot be encoded with the chosen mark layout
    #[error("Encoding Error: {0}")]
    Encoding(#[from] EncodingError),
}
