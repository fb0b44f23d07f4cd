// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

use thiserror::Error;

/// Failures shared by every crate that manipulates zones, points or endpoints.
#[derive(Debug, Error)]
pub enum Error {
    #[error("world rectangle must have positive, integer-valued extents, got {to:?}")]
    InvalidWorld { to: crate::geometry::Point },

    #[error("rectangle is degenerate: from {from:?} must be strictly less than to {to:?}")]
    DegenerateRectangle {
        from: crate::geometry::Point,
        to: crate::geometry::Point,
    },

    #[error("zones are not adjacent: {a:?} / {b:?}")]
    NotAdjacent {
        a: crate::geometry::Rectangle,
        b: crate::geometry::Rectangle,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
