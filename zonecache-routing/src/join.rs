// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! JoinProtocol: the handshake that turns a node into a child and
//! splits the parent's zone.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::info;

use zonecache_comms::framing::{read_text_frame, write_text_frame};
use zonecache_core::geometry::Rectangle;
use zonecache_core::log_markers::LogMarker;
use zonecache_core::{Mode, NodeRecord};

use crate::error::{Error, Result};
use crate::gossip::{self};
use crate::migration;
use crate::node::Node;
use zonecache_comms::wire::GossipVerb;

const NONE_TOKEN: &str = "NONE";

/// Finds the one neighbour of `old_zone` that sits to the right of the
/// new split boundary — the only neighbour that can become the child's
/// neighbour.
fn find_right_neighbour(table: &crate::neighbour_table::NeighbourTable, old_zone: &Rectangle) -> Option<NodeRecord> {
    table
        .list()
        .iter()
        .find(|n| n.zone.from.x == old_zone.to.x)
        .copied()
}

/// Parent side: drives one accepted connection at `join_ep` through the
/// split handshake and the resulting migration.
pub async fn parent_handle_join(node: &Arc<Node>, mut stream: TcpStream) -> Result<()> {
    let peer_addr = stream.peer_addr().map_err(|e| Error::Routing {
        addr: node.join_ep,
        source: zonecache_comms::Error::Io(e),
    })?;

    node.set_mode(Mode::SplittingParentInit { child_join_ep: peer_addr }).await;

    let old_zone = node.zone().await;
    let (parent_new_zone, child_zone) = old_zone.bisect_vertical();

    write_text_frame(&mut stream, &child_zone.to_wire_string())
        .await
        .map_err(|source| Error::Routing { addr: peer_addr, source })?;
    write_text_frame(&mut stream, &parent_new_zone.to_wire_string())
        .await
        .map_err(|source| Error::Routing { addr: peer_addr, source })?;
    write_text_frame(
        &mut stream,
        &format!("{} {}", node.propagate_ep, node.removal_ep),
    )
    .await
    .map_err(|source| Error::Routing { addr: peer_addr, source })?;

    let child_eps = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: peer_addr, source })?;
    let (child_propagate_ep, child_removal_ep) =
        NodeRecord::endpoints_from_wire_str(&child_eps).ok_or_else(|| Error::Routing {
            addr: peer_addr,
            source: zonecache_comms::Error::Malformed("join: bad child endpoints".into()),
        })?;

    let right_neighbour = find_right_neighbour(&*node.neighbours().await, &old_zone);
    match &right_neighbour {
        Some(n) => {
            write_text_frame(&mut stream, &n.zone.to_wire_string())
                .await
                .map_err(|source| Error::Routing { addr: peer_addr, source })?;
            write_text_frame(&mut stream, &format!("{} {}", n.propagate_ep, n.removal_ep))
                .await
                .map_err(|source| Error::Routing { addr: peer_addr, source })?;
        }
        None => {
            write_text_frame(&mut stream, NONE_TOKEN)
                .await
                .map_err(|source| Error::Routing { addr: peer_addr, source })?;
        }
    }

    let child = NodeRecord {
        join_ep: peer_addr,
        propagate_ep: child_propagate_ep,
        removal_ep: child_removal_ep,
        zone: child_zone,
    };

    // Gossip: the one neighbour that was adjacent to
    // the old zone's right edge moves its allegiance to the child;
    // every other neighbour just gets an UPDATE_NEIGHBOUR.
    {
        let mut neighbours = node.neighbours_mut().await;
        if let Some(n) = &right_neighbour {
            neighbours.remove_by_propagate_ep(n.propagate_ep);
            let _ = gossip::send(n.propagate_ep, GossipVerb::RemoveNeighbour, &node.record().await).await;
            let _ = gossip::send(n.propagate_ep, GossipVerb::AddNeighbour, &child).await;
        }
        neighbours.add_or_update(child);
        let remaining: Vec<SocketAddr> = neighbours.list().iter().map(|n| n.propagate_ep).collect();
        drop(neighbours);
        let parent_new_record = NodeRecord {
            zone: parent_new_zone,
            ..node.record().await
        };
        for ep in remaining {
            let _ = gossip::send(ep, GossipVerb::UpdateNeighbour, &parent_new_record).await;
        }
    }

    node.set_mode(Mode::SplittingParentMigrating {
        child,
        new_zone: parent_new_zone,
    })
    .await;

    match migration::run_source(node, peer_addr, &mut stream, Some(child_zone)).await {
        Ok(()) => {
            node.set_zone(parent_new_zone).await;
            node.set_mode(Mode::Normal).await;
            info!(marker = %LogMarker::SplitCommitted, child = %peer_addr, "split committed");
            Ok(())
        }
        Err(err) => {
            node.set_mode(Mode::Normal).await;
            info!(marker = %LogMarker::MigrationAborted, child = %peer_addr, "split migration aborted, rolled back to Normal");
            Err(err)
        }
    }
}

/// Child side: dials `parent_join_ep`, runs the handshake, then receives
/// the migrated keyspace.
pub async fn child_run_join(node: &Arc<Node>, parent_join_ep: SocketAddr) -> Result<()> {
    node.set_mode(Mode::SplittingChildInit { parent_join_ep }).await;

    let mut stream = TcpStream::connect(parent_join_ep).await.map_err(|e| Error::Routing {
        addr: parent_join_ep,
        source: zonecache_comms::Error::Io(e),
    })?;

    let child_zone_str = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: parent_join_ep, source })?;
    let child_zone = Rectangle::from_wire_string(&child_zone_str).ok_or_else(|| Error::Routing {
        addr: parent_join_ep,
        source: zonecache_comms::Error::Malformed("join: bad child zone".into()),
    })?;

    let _parent_new_zone_str = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: parent_join_ep, source })?;

    let parent_eps = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: parent_join_ep, source })?;
    let (parent_propagate_ep, parent_removal_ep) =
        NodeRecord::endpoints_from_wire_str(&parent_eps).ok_or_else(|| Error::Routing {
            addr: parent_join_ep,
            source: zonecache_comms::Error::Malformed("join: bad parent endpoints".into()),
        })?;

    write_text_frame(&mut stream, &format!("{} {}", node.propagate_ep, node.removal_ep))
        .await
        .map_err(|source| Error::Routing { addr: parent_join_ep, source })?;

    let maybe_zone = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: parent_join_ep, source })?;
    let right_neighbour = if maybe_zone == NONE_TOKEN {
        None
    } else {
        let zone = Rectangle::from_wire_string(&maybe_zone).ok_or_else(|| Error::Routing {
            addr: parent_join_ep,
            source: zonecache_comms::Error::Malformed("join: bad neighbour zone".into()),
        })?;
        let eps = read_text_frame(&mut stream)
            .await
            .map_err(|source| Error::Routing { addr: parent_join_ep, source })?;
        let (propagate_ep, removal_ep) =
            NodeRecord::endpoints_from_wire_str(&eps).ok_or_else(|| Error::Routing {
                addr: parent_join_ep,
                source: zonecache_comms::Error::Malformed("join: bad neighbour endpoints".into()),
            })?;
        Some(NodeRecord {
            join_ep: propagate_ep,
            propagate_ep,
            removal_ep,
            zone,
        })
    };

    let parent = NodeRecord {
        join_ep: parent_join_ep,
        propagate_ep: parent_propagate_ep,
        removal_ep: parent_removal_ep,
        // `zone` is a placeholder: the parent's shrunk zone isn't known
        // yet, only its old (pre-split) zone would be. The correct value
        // arrives moments later as an UPDATE_NEIGHBOUR gossip message
        // from `parent_handle_join`.
        zone: child_zone,
    };

    {
        let mut neighbours = node.neighbours_mut().await;
        neighbours.add_or_update(parent);
        if let Some(n) = right_neighbour {
            neighbours.add_or_update(n);
        }
    }

    node.set_mode(Mode::SplittingChildMigrating {
        parent,
        new_zone: child_zone,
    })
    .await;

    match migration::run_receiver(node, parent_join_ep, &mut stream).await {
        Ok(()) => {
            node.set_zone(child_zone).await;
            node.set_mode(Mode::Normal).await;
            info!(marker = %LogMarker::JoinAccepted, parent = %parent_join_ep, "join committed");
            Ok(())
        }
        Err(err) => {
            node.set_mode(Mode::Normal).await;
            Err(err)
        }
    }
}
