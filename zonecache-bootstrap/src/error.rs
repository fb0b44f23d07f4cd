// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("registry has no entries to select a parent from")]
    EmptyRegistry,

    #[error("no registered node has join endpoint {0}")]
    UnknownJoiner(std::net::SocketAddr),

    #[error("protocol error talking to {addr}: {source}")]
    Protocol {
        addr: std::net::SocketAddr,
        #[source]
        source: zonecache_comms::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
