// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Node configuration: a plain struct-plus-derive shape using `clap`'s
//! derive API, matching the rest of this workspace.

use std::net::{IpAddr, SocketAddr};

use clap::Parser;

/// A fresh cluster's first node skips bootstrap's ADDITION handshake
/// entirely and self-assigns ownership of the whole world rectangle;
/// every later node dials `bootstrap` to learn its join endpoint and
/// either that it is first too (an empty registry) or who to join.
#[derive(Parser, Debug, Clone)]
#[command(name = "zonecached")]
pub struct Config {
    /// World rectangle lower corner, read only by the first node.
    #[arg(long, requires = "first")]
    pub world_from_x: Option<f64>,
    #[arg(long, requires = "first")]
    pub world_from_y: Option<f64>,

    /// World rectangle upper corner, read only by the first node.
    #[arg(long, requires = "first")]
    pub world_to_x: Option<f64>,
    #[arg(long, requires = "first")]
    pub world_to_y: Option<f64>,

    /// Bootstrap directory's ADDITION endpoint. Its UPDATE and DEPARTURE
    /// endpoints are the next two ports up, matching `bootstrapd`'s own
    /// default port spacing.
    #[arg(long)]
    pub bootstrap: SocketAddr,

    /// Register as the cluster's first node instead of dialing
    /// bootstrap's ADDITION endpoint.
    #[arg(long)]
    pub first: bool,

    #[arg(long, default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Fixed join-endpoint port, used only when `--first` (a joining
    /// node's join port is assigned by bootstrap instead).
    #[arg(long, default_value_t = 7000)]
    pub join_port: u16,

    #[arg(long, default_value_t = 7001)]
    pub propagate_port: u16,

    #[arg(long, default_value_t = 7002)]
    pub removal_port: u16,

    /// Client-facing memcache-protocol port (DESIGN.md, Q5).
    #[arg(long, default_value_t = 11211)]
    pub client_port: u16,

    #[arg(long, default_value_t = 32)]
    pub neighbour_capacity: usize,

    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,

    #[arg(long)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn join_ep(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.join_port)
    }

    pub fn propagate_ep(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.propagate_port)
    }

    pub fn removal_ep(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.removal_port)
    }

    pub fn client_ep(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.client_port)
    }

    pub fn bootstrap_update_ep(&self) -> SocketAddr {
        SocketAddr::new(self.bootstrap.ip(), self.bootstrap.port() + 1)
    }

    pub fn bootstrap_departure_ep(&self) -> SocketAddr {
        SocketAddr::new(self.bootstrap.ip(), self.bootstrap.port() + 2)
    }
}
