// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Geometry, key hashing, and the shared node/mode types used across the
//! ZoneCache workspace.

pub mod error;
pub mod geometry;
pub mod hash;
pub mod log_markers;
pub mod mode;
pub mod node_record;

pub use error::{Error, Result};
pub use geometry::{Point, Rectangle};
pub use hash::KeyHasher;
pub use mode::Mode;
pub use node_record::{NodeId, NodeRecord};
