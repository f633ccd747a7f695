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

//! Sizes of the scalable example networks, encoded as types.

/// Trait for encoding the number of repetitions as a type.
pub trait Repetitions {
    /// Get the number of repetitions
    fn get_count() -> usize;
}

macro_rules! repetition {
    ($name:ident, $count:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug)]
        pub struct $name {}

        impl Repetitions for $name {
            fn get_count() -> usize {
                $count
            }
        }
    };
}

repetition!(Repetition1, 1, "One repetition");
repetition!(Repetition2, 2, "Two repetitions");
repetition!(Repetition3, 3, "Three repetitions");
repetition!(Repetition4, 4, "Four repetitions");
repetition!(Repetition5, 5, "Five repetitions");
repetition!(Repetition6, 6, "Six repetitions");
repetition!(Repetition8, 8, "Eight repetitions");
repetition!(Repetition10, 10, "10 repetitions");
repetition!(Repetition15, 15, "15 repetitions");
repetition!(Repetition20, 20, "20 repetitions");
repetition!(Repetition25, 25, "25 repetitions");
repetition!(Repetition30, 30, "30 repetitions");
