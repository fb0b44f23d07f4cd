// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

use thiserror::Error;
use zonecache_core::geometry::Rectangle;

#[derive(Debug, Error)]
pub enum Error {
    /// A local cache operation failed (out-of-memory, object-too-large).
    /// Propagated verbatim to the client rather than folded into a
    /// generic not-stored outcome.
    #[error("cache error: {0}")]
    Cache(#[from] zonecache_cache::Error),

    /// Failure to reach the chosen neighbour. The router returns a
    /// server-error string; client retry is the policy.
    #[error("could not reach neighbour at {addr}: {source}")]
    Routing {
        addr: std::net::SocketAddr,
        #[source]
        source: zonecache_comms::Error,
    },

    /// Stream failure mid-migration. The initiator aborts and returns to
    /// its pre-transition mode (DESIGN.md, Q1).
    #[error("migration with peer {peer} aborted: {source}")]
    Migration {
        peer: std::net::SocketAddr,
        #[source]
        source: zonecache_comms::Error,
    },

    /// A merge attempted between non-adjacent zones. Fatal for that
    /// departure attempt; DESIGN.md Q2 says retry with another neighbour.
    #[error("cannot merge non-adjacent zones {a:?} and {b:?}")]
    Topology { a: Rectangle, b: Rectangle },

    /// Malformed inter-node frame; the offending connection is closed,
    /// no state change.
    #[error("protocol error: {0}")]
    Protocol(#[from] zonecache_comms::Error),

    /// No neighbour currently known could take the request or the merge.
    #[error("no suitable neighbour is known")]
    NoNeighbour,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
