// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Routing and topology-change protocols: the neighbour table and trash
//! set, the join and departure handshakes, the migration engine, the
//! request router, and neighbour gossip.

pub mod departure;
pub mod error;
pub mod gossip;
pub mod join;
pub mod migration;
pub mod neighbour_table;
pub mod node;
pub mod router;
pub mod trash_set;

pub use error::{Error, Result};
pub use neighbour_table::NeighbourTable;
pub use node::Node;
pub use trash_set::TrashSet;
