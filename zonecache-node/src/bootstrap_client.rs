// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! The node side of the bootstrap directory's three endpoints: one dial
//! to ADDITION when joining, and a push to UPDATE (and, on departure, to
//! DEPARTURE) every time this node's own `(join_ep, propagate_ep,
//! removal_ep, zone)` changes.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::info;

use zonecache_comms::framing::{read_text_frame, write_text_frame};
use zonecache_core::geometry::Rectangle;
use zonecache_core::log_markers::LogMarker;
use zonecache_routing::Node;

use crate::config::Config;
use crate::error::{Error, Result};

/// The outcome of dialling bootstrap's ADDITION endpoint.
pub struct Addition {
    pub assigned_join_port: u16,
    pub world: Rectangle,
    pub parent_join_ep: Option<SocketAddr>,
}

/// ADDITION: learns this node's assigned `join_ep` port, the world
/// rectangle, and either that this node is first or who its parent is.
pub async fn request_addition(config: &Config) -> Result<Addition> {
    let addr = config.bootstrap;
    let mut stream = TcpStream::connect(addr).await.map_err(|e| Error::Bootstrap {
        addr,
        source: zonecache_comms::Error::Io(e),
    })?;

    let port_str = io(addr, read_text_frame(&mut stream).await)?;
    let assigned_join_port: u16 = port_str
        .parse()
        .map_err(|_| Error::BootstrapProtocol(format!("bad assigned port {port_str:?}")))?;

    let world_str = io(addr, read_text_frame(&mut stream).await)?;
    let world = Rectangle::from_wire_string(&world_str)
        .ok_or_else(|| Error::BootstrapProtocol(format!("bad world rectangle {world_str:?}")))?;

    let reply = io(addr, read_text_frame(&mut stream).await)?;
    let parent_join_ep = if reply == "FIRST 0" {
        info!(marker = %LogMarker::BootstrapAssignedFirst, "bootstrap assigned us as first node");
        None
    } else if let Some(rest) = reply.strip_prefix("NOTFIRST ") {
        let parent: SocketAddr = rest
            .trim()
            .parse()
            .map_err(|_| Error::BootstrapProtocol(format!("bad parent join_ep {rest:?}")))?;
        info!(marker = %LogMarker::BootstrapAssignedParent, %parent, "bootstrap assigned us a parent");
        Some(parent)
    } else {
        return Err(Error::BootstrapProtocol(format!("unrecognised addition reply {reply:?}")));
    };

    Ok(Addition {
        assigned_join_port,
        world,
        parent_join_ep,
    })
}

/// UPDATE: pushes this node's current `(join_ep, propagate_ep,
/// removal_ep)` triple and zone. Called after every zone change: first
/// registration, after a completed split, after a completed merge.
pub async fn push_update(config: &Config, node: &Arc<Node>) -> Result<()> {
    let addr = config.bootstrap_update_ep();
    let mut stream = TcpStream::connect(addr).await.map_err(|e| Error::Bootstrap {
        addr,
        source: zonecache_comms::Error::Io(e),
    })?;
    let record = node.record().await;
    io(
        addr,
        write_text_frame(&mut stream, &format!("{} {} {}", record.join_ep, record.propagate_ep, record.removal_ep))
            .await,
    )?;
    io(addr, write_text_frame(&mut stream, &record.zone.to_wire_string()).await)?;
    Ok(())
}

/// DEPARTURE: the *absorbing* node reports the departed node's
/// `join_ep` plus its own refreshed triple and zone, on the same
/// connection (the directory's `handle_departure` reads both in one
/// call).
pub async fn push_departure(config: &Config, departed_join_ep: SocketAddr, node: &Arc<Node>) -> Result<()> {
    let addr = config.bootstrap_departure_ep();
    let mut stream = TcpStream::connect(addr).await.map_err(|e| Error::Bootstrap {
        addr,
        source: zonecache_comms::Error::Io(e),
    })?;
    io(addr, write_text_frame(&mut stream, &departed_join_ep.to_string()).await)?;

    let record = node.record().await;
    io(
        addr,
        write_text_frame(&mut stream, &format!("{} {} {}", record.join_ep, record.propagate_ep, record.removal_ep))
            .await,
    )?;
    io(addr, write_text_frame(&mut stream, &record.zone.to_wire_string()).await)?;
    Ok(())
}

fn io<T>(addr: SocketAddr, r: zonecache_comms::Result<T>) -> Result<T> {
    r.map_err(|source| Error::Bootstrap { addr, source })
}
