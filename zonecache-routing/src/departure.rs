// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! DepartureProtocol: the handshake that merges a dying node's zone
//! into a neighbour.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tracing::{info, warn};

use zonecache_comms::framing::{read_text_frame, write_text_frame};
use zonecache_comms::wire::GossipVerb;
use zonecache_core::geometry::Rectangle;
use zonecache_core::log_markers::LogMarker;
use zonecache_core::{Mode, NodeRecord};

use crate::error::{Error, Result};
use crate::gossip;
use crate::migration;
use crate::node::Node;

/// Dying-node side. Picks the smallest-area neighbour, retrying once
/// against the next-smallest if the first merge attempt fails because
/// the zones are not adjacent (DESIGN.md, Q2), rather than corrupting
/// the zone as the source recipe does.
pub async fn depart(node: &Arc<Node>) -> Result<()> {
    let mut excluded: Vec<SocketAddr> = Vec::new();

    for attempt in 0..2 {
        let candidate = {
            let neighbours = node.neighbours().await;
            neighbours.smallest_by_area_excluding(&excluded)
        };
        let Some(candidate) = candidate else {
            return Err(Error::NoNeighbour);
        };

        match try_depart_to(node, candidate).await {
            Ok(()) => return Ok(()),
            Err(Error::Topology { .. }) if attempt == 0 => {
                warn!(peer = %candidate.propagate_ep, "departure: merge target not adjacent, retrying");
                excluded.push(candidate.propagate_ep);
                continue;
            }
            Err(err) => {
                node.set_mode(Mode::Normal).await;
                return Err(err);
            }
        }
    }
    node.set_mode(Mode::Normal).await;
    Err(Error::NoNeighbour)
}

async fn try_depart_to(node: &Arc<Node>, target: NodeRecord) -> Result<()> {
    node.set_mode(Mode::MergingChildInit { parent: target }).await;

    let mut stream = TcpStream::connect(target.removal_ep).await.map_err(|e| Error::Routing {
        addr: target.removal_ep,
        source: zonecache_comms::Error::Io(e),
    })?;

    let my_zone = node.zone().await;
    write_text_frame(&mut stream, &my_zone.to_wire_string())
        .await
        .map_err(|source| Error::Routing { addr: target.removal_ep, source })?;

    let merged_zone_str = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: target.removal_ep, source })?;
    if merged_zone_str == "REJECTED" {
        return Err(Error::Topology { a: my_zone, b: target.zone });
    }
    let merged_zone = Rectangle::from_wire_string(&merged_zone_str).ok_or_else(|| Error::Routing {
        addr: target.removal_ep,
        source: zonecache_comms::Error::Malformed("departure: bad merged zone".into()),
    })?;

    let my_neighbours: Vec<NodeRecord> = node.neighbours().await.list().to_vec();
    write_text_frame(&mut stream, &my_neighbours.len().to_string())
        .await
        .map_err(|source| Error::Routing { addr: target.removal_ep, source })?;
    for n in &my_neighbours {
        write_text_frame(
            &mut stream,
            &format!("{} {} {}", n.propagate_ep, n.removal_ep, n.zone.to_wire_string()),
        )
        .await
        .map_err(|source| Error::Routing { addr: target.removal_ep, source })?;
    }

    node.set_mode(Mode::MergingChildMigrating { parent: target, merged_zone }).await;

    migration::run_source(node, target.removal_ep, &mut stream, None).await?;

    info!(marker = %LogMarker::DepartureStarted, into = %target.propagate_ep, "departure merge complete, exiting");
    Ok(())
}

/// Absorbing-node side: accepts a connection at `removal_ep`, computes
/// the merge, receives the departing node's neighbour list, and streams
/// in its keyspace. Returns the departed node's record on success so the
/// caller can report its departure onward (e.g. to a bootstrap
/// directory).
pub async fn accept_departure(node: &Arc<Node>, mut stream: TcpStream) -> Result<NodeRecord> {
    let peer_addr = stream.peer_addr().map_err(|e| Error::Routing {
        addr: node.removal_ep,
        source: zonecache_comms::Error::Io(e),
    })?;

    let child_zone_str = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: peer_addr, source })?;
    let child_zone = Rectangle::from_wire_string(&child_zone_str).ok_or_else(|| Error::Routing {
        addr: peer_addr,
        source: zonecache_comms::Error::Malformed("departure: bad child zone".into()),
    })?;

    let my_zone = node.zone().await;
    let merged = match my_zone.try_merge(&child_zone) {
        Ok(z) => z,
        Err(_) => {
            write_text_frame(&mut stream, "REJECTED")
                .await
                .map_err(|source| Error::Routing { addr: peer_addr, source })?;
            return Err(Error::Topology { a: my_zone, b: child_zone });
        }
    };
    write_text_frame(&mut stream, &merged.to_wire_string())
        .await
        .map_err(|source| Error::Routing { addr: peer_addr, source })?;

    let child = NodeRecord {
        join_ep: peer_addr,
        propagate_ep: peer_addr,
        removal_ep: peer_addr,
        zone: child_zone,
    };
    node.set_mode(Mode::MergingParentInit { child }).await;

    let count: usize = read_text_frame(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: peer_addr, source })?
        .parse()
        .unwrap_or(0);
    let mut departing_neighbours = Vec::with_capacity(count);
    for _ in 0..count {
        let line = read_text_frame(&mut stream)
            .await
            .map_err(|source| Error::Routing { addr: peer_addr, source })?;
        let mut parts = line.splitn(3, ' ');
        let propagate_ep: SocketAddr = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| {
            Error::Routing {
                addr: peer_addr,
                source: zonecache_comms::Error::Malformed("departure: bad neighbour propagate_ep".into()),
            }
        })?;
        let removal_ep: SocketAddr = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| {
            Error::Routing {
                addr: peer_addr,
                source: zonecache_comms::Error::Malformed("departure: bad neighbour removal_ep".into()),
            }
        })?;
        let zone_str = parts.next().unwrap_or_default();
        let zone = Rectangle::from_wire_string(zone_str).ok_or_else(|| Error::Routing {
            addr: peer_addr,
            source: zonecache_comms::Error::Malformed("departure: bad neighbour zone".into()),
        })?;
        departing_neighbours.push(NodeRecord {
            join_ep: propagate_ep,
            propagate_ep,
            removal_ep,
            zone,
        });
    }

    node.set_mode(Mode::MergingParentMigrating { child, new_zone: merged }).await;

    match migration::run_receiver(node, peer_addr, &mut stream).await {
        Ok(()) => {
            node.set_zone(merged).await;
            node.set_mode(Mode::Normal).await;

            // Refresh our own table from the departing node's, then
            // gossip: any neighbour adjacent to the departed node but
            // not to us now gets REMOVE_NEIGHBOUR(D)/ADD_NEIGHBOUR(M).
            let my_record = node.record().await;
            let mut neighbours = node.neighbours_mut().await;
            neighbours.remove_by_propagate_ep(child.propagate_ep);
            let mut to_notify = Vec::new();
            for n in departing_neighbours {
                if n.propagate_ep == my_record.propagate_ep {
                    continue;
                }
                if !merged.are_adjacent(&n.zone) {
                    continue;
                }
                if neighbours.add_or_update(n) {
                    to_notify.push(n.propagate_ep);
                }
            }
            drop(neighbours);

            for ep in to_notify {
                let _ = gossip::send(ep, GossipVerb::RemoveNeighbour, &child).await;
                let _ = gossip::send(ep, GossipVerb::AddNeighbour, &my_record).await;
            }

            info!(marker = %LogMarker::MergeCommitted, from = %peer_addr, "merge committed");
            Ok(child)
        }
        Err(err) => {
            node.set_mode(Mode::Normal).await;
            info!(marker = %LogMarker::MigrationAborted, from = %peer_addr, "merge migration aborted, rolled back to Normal");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::sync::Arc;
    use tokio::net::TcpListener;
    use zonecache_cache::{CacheAdapter, MemEngine};
    use zonecache_core::geometry::Point;

    fn world() -> Rectangle {
        Rectangle::world(Point::new(0.0, 0.0), Point::new(50.0, 50.0)).unwrap()
    }

    fn node(addr: SocketAddr, zone: Rectangle) -> Arc<Node> {
        let cache: Arc<dyn CacheAdapter> = Arc::new(MemEngine::new());
        Arc::new(Node::new(addr, addr, addr, world(), zone, 10, cache))
    }

    #[tokio::test]
    async fn departure_merges_into_smallest_neighbour_and_moves_keys() {
        let (left, right) = world().bisect_vertical();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let absorbing_ep = listener.local_addr().unwrap();
        let absorbing = node(absorbing_ep, left);

        let departing_ep: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let departing = node(departing_ep, right);
        departing.cache().set(b"k", 0, 0, Bytes::from_static(b"v")).unwrap();
        {
            let mut neighbours = departing.neighbours_mut().await;
            neighbours.add_or_update(NodeRecord {
                join_ep: absorbing_ep,
                propagate_ep: absorbing_ep,
                removal_ep: absorbing_ep,
                zone: left,
            });
        }

        let absorbing_for_accept = absorbing.clone();
        let accept_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            accept_departure(&absorbing_for_accept, stream).await
        });

        depart(&departing).await.unwrap();
        accept_task.await.unwrap().unwrap();

        assert_eq!(absorbing.zone().await, world());
        assert_eq!(absorbing.cache().get(b"k").unwrap().value, Bytes::from_static(b"v"));
        assert!(absorbing.mode().await.is_normal());
    }

    #[tokio::test]
    async fn try_depart_to_reports_topology_error_for_non_adjacent_zones() {
        let near = Rectangle::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)).unwrap();
        let far = Rectangle::new(Point::new(40.0, 40.0), Point::new(50.0, 50.0)).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let absorbing_ep = listener.local_addr().unwrap();
        let absorbing = node(absorbing_ep, far);

        let departing_ep: SocketAddr = "127.0.0.1:2".parse().unwrap();
        let departing = node(departing_ep, near);

        let target = NodeRecord {
            join_ep: absorbing_ep,
            propagate_ep: absorbing_ep,
            removal_ep: absorbing_ep,
            zone: far,
        };

        let absorbing_for_accept = absorbing.clone();
        let accept_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            accept_departure(&absorbing_for_accept, stream).await
        });

        let err = try_depart_to(&departing, target).await.unwrap_err();
        assert!(matches!(err, Error::Topology { .. }));
        assert!(accept_task.await.unwrap().is_err());
    }
}
