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
    #[error("routing error: {0}")]
    Routing(#[from] zonecache_routing::Error),

    #[error("bootstrap directory at {addr} failed: {source}")]
    Bootstrap {
        addr: std::net::SocketAddr,
        #[source]
        source: zonecache_comms::Error,
    },

    #[error("bootstrap sent a malformed reply: {0}")]
    BootstrapProtocol(String),

    #[error("invalid world rectangle: {0}")]
    InvalidWorld(#[from] zonecache_core::Error),

    #[error("cache error: {0}")]
    Cache(#[from] zonecache_cache::Error),

    #[error("client protocol error: {0}")]
    Protocol(#[from] zonecache_comms::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
