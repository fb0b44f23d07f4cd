// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! The bootstrap directory: the single process that hands a joining node
//! its future join endpoint and tells it either that it is the first
//! node, or who to dial next. Grounded directly on
//! `original_source/bootstrap.c`'s three accept-loop routines
//! (`node_addition_routine`, `metadata_update_routine`,
//! `node_depature_routine`), reimagined as three async handlers over one
//! growable registry instead of three `pthread_create` loops over a
//! fixed ten-slot array.

use std::net::{IpAddr, SocketAddr};

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use zonecache_comms::framing::{read_text_frame, write_text_frame};
use zonecache_comms::wire::query_area;
use zonecache_core::geometry::Rectangle;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    join_ep: SocketAddr,
    propagate_ep: SocketAddr,
    removal_ep: SocketAddr,
    zone: Rectangle,
    /// Area as of the last UPDATE push, refreshed in place by `pick_parent`
    /// when a `QueryArea` round-trip disagrees with it (DESIGN.md, Q3).
    /// Tracked separately from `zone` because `QueryArea` only reports an
    /// area, not the rectangle that produced it.
    last_known_area: f64,
}

/// The registry of nodes known to have completed at least one
/// registration push, plus the world rectangle handed to every joiner.
pub struct Directory {
    world: Rectangle,
    bind_ip: IpAddr,
    entries: tokio::sync::Mutex<Vec<Entry>>,
}

impl Directory {
    pub fn new(world: Rectangle, bind_ip: IpAddr) -> Self {
        Self {
            world,
            bind_ip,
            entries: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn world(&self) -> Rectangle {
        self.world
    }

    /// ADDITION: binds an ephemeral listener to learn a free port (the
    /// same bind-then-close trick as the source's `find_port`), hands it
    /// back as the joiner's future `join_ep` port, sends the world
    /// rectangle, then either `FIRST 0` or `NOTFIRST <join_ep>` for the
    /// largest-area registered node.
    pub async fn handle_addition(&self, stream: &mut TcpStream) -> Result<()> {
        let peer_ip = stream
            .peer_addr()
            .map_err(|e| Error::Protocol {
                addr: "0.0.0.0:0".parse().unwrap(),
                source: zonecache_comms::Error::Io(e),
            })?
            .ip();

        let probe = TcpListener::bind((self.bind_ip, 0)).await.map_err(|e| Error::Protocol {
            addr: "0.0.0.0:0".parse().unwrap(),
            source: zonecache_comms::Error::Io(e),
        })?;
        let assigned_port = probe.local_addr().unwrap().port();
        drop(probe);
        let joiner_join_ep = SocketAddr::new(peer_ip, assigned_port);

        io(joiner_join_ep, write_text_frame(stream, &assigned_port.to_string()).await)?;
        io(joiner_join_ep, write_text_frame(stream, &self.world.to_wire_string()).await)?;

        let parent = self.pick_parent().await;
        match parent {
            None => {
                io(joiner_join_ep, write_text_frame(stream, "FIRST 0").await)?;
                info!(join_ep = %joiner_join_ep, "addition: assigned as first node");
            }
            Some(p) => {
                io(joiner_join_ep, write_text_frame(stream, &format!("NOTFIRST {}", p.join_ep)).await)?;
                info!(join_ep = %joiner_join_ep, parent = %p.join_ep, "addition: assigned a parent");
            }
        }
        Ok(())
    }

    /// Picks the registered node with the largest zone, re-querying its
    /// current area over `propagate_ep` first since a split or merge may
    /// have changed it since the last push (DESIGN.md, Q3).
    async fn pick_parent(&self) -> Option<Entry> {
        let candidate = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .copied()
                .max_by(|a, b| a.last_known_area.partial_cmp(&b.last_known_area).unwrap_or(std::cmp::Ordering::Equal))
        }?;

        match query_area_of(candidate.propagate_ep).await {
            Ok(area) if (area - candidate.last_known_area).abs() > f64::EPSILON => {
                debug!(peer = %candidate.propagate_ep, old = candidate.last_known_area, new = area, "addition: refreshed stale area before reply");
                let mut entries = self.entries.lock().await;
                if let Some(e) = entries.iter_mut().find(|e| e.join_ep == candidate.join_ep) {
                    e.last_known_area = area;
                }
            }
            Ok(_) => {}
            Err(err) => {
                warn!(peer = %candidate.propagate_ep, %err, "addition: could not refresh area, using last known value");
            }
        }
        Some(candidate)
    }

    /// UPDATE: a node (first registration, or post-split parent/child)
    /// pushes `"<join_ep> <propagate_ep> <removal_ep>"` followed by its
    /// zone; the registry upserts by `join_ep`.
    pub async fn handle_update(&self, stream: &mut TcpStream) -> Result<()> {
        let addr_line = read_text_frame(stream).await.map_err(|source| Error::Protocol {
            addr: stream.peer_addr().unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap()),
            source,
        })?;
        let mut parts = addr_line.split_whitespace();
        let join_ep: SocketAddr = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| Error::Protocol {
            addr: "0.0.0.0:0".parse().unwrap(),
            source: zonecache_comms::Error::Malformed("update: bad join_ep".into()),
        })?;
        let propagate_ep: SocketAddr = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| Error::Protocol {
            addr: join_ep,
            source: zonecache_comms::Error::Malformed("update: bad propagate_ep".into()),
        })?;
        let removal_ep: SocketAddr = parts.next().and_then(|s| s.parse().ok()).ok_or_else(|| Error::Protocol {
            addr: join_ep,
            source: zonecache_comms::Error::Malformed("update: bad removal_ep".into()),
        })?;

        let zone_str = read_text_frame(stream).await.map_err(|source| Error::Protocol { addr: join_ep, source })?;
        let zone = Rectangle::from_wire_string(&zone_str).ok_or_else(|| Error::Protocol {
            addr: join_ep,
            source: zonecache_comms::Error::Malformed("update: bad zone".into()),
        })?;

        let area = zone.area();
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.iter_mut().find(|e| e.join_ep == join_ep) {
            existing.propagate_ep = propagate_ep;
            existing.removal_ep = removal_ep;
            existing.zone = zone;
            existing.last_known_area = area;
        } else {
            entries.push(Entry { join_ep, propagate_ep, removal_ep, zone, last_known_area: area });
        }
        info!(%join_ep, ?zone, "update: registry entry upserted");
        Ok(())
    }

    /// DEPARTURE: the absorbing node pushes the departed node's
    /// `join_ep` plus its own refreshed `(propagate_ep, removal_ep,
    /// zone)`, so the registry drops the departed entry and the
    /// absorber's entry reflects the merged zone.
    pub async fn handle_departure(&self, stream: &mut TcpStream) -> Result<()> {
        let departed_line = read_text_frame(stream).await.map_err(|source| Error::Protocol {
            addr: stream.peer_addr().unwrap_or_else(|_| "0.0.0.0:0".parse().unwrap()),
            source,
        })?;
        let departed_join_ep: SocketAddr = departed_line.trim().parse().map_err(|_| Error::Protocol {
            addr: "0.0.0.0:0".parse().unwrap(),
            source: zonecache_comms::Error::Malformed("departure: bad departed join_ep".into()),
        })?;

        let mut entries = self.entries.lock().await;
        entries.retain(|e| e.join_ep != departed_join_ep);
        drop(entries);

        info!(join_ep = %departed_join_ep, "departure: registry entry removed");
        self.handle_update(stream).await
    }

    #[cfg(test)]
    async fn registered_zones(&self) -> Vec<(SocketAddr, Rectangle)> {
        self.entries.lock().await.iter().map(|e| (e.join_ep, e.zone)).collect()
    }
}

async fn query_area_of(propagate_ep: SocketAddr) -> Result<f64> {
    let mut stream = TcpStream::connect(propagate_ep).await.map_err(|e| Error::Protocol {
        addr: propagate_ep,
        source: zonecache_comms::Error::Io(e),
    })?;
    query_area::write_request(&mut stream)
        .await
        .map_err(|source| Error::Protocol { addr: propagate_ep, source })?;
    query_area::read_reply(&mut stream)
        .await
        .map_err(|source| Error::Protocol { addr: propagate_ep, source })
}

fn io<T>(peer: SocketAddr, r: zonecache_comms::Result<T>) -> Result<T> {
    r.map_err(|source| Error::Protocol { addr: peer, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonecache_core::geometry::Point;

    fn world() -> Rectangle {
        Rectangle::world(Point::new(0.0, 0.0), Point::new(50.0, 50.0)).unwrap()
    }

    #[tokio::test]
    async fn addition_replies_first_when_registry_empty() {
        let dir = Directory::new(world(), "127.0.0.1".parse().unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            dir.handle_addition(&mut stream).await.unwrap();
            dir
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        let _port = read_text_frame(&mut client).await.unwrap();
        let world_str = read_text_frame(&mut client).await.unwrap();
        assert_eq!(Rectangle::from_wire_string(&world_str).unwrap(), world());
        let reply = read_text_frame(&mut client).await.unwrap();
        assert_eq!(reply, "FIRST 0");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn update_then_addition_replies_notfirst_with_largest_zone() {
        let dir = std::sync::Arc::new(Directory::new(world(), "127.0.0.1".parse().unwrap()));
        let (left, right) = world().bisect_vertical();

        {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let dir2 = dir.clone();
            let server = tokio::spawn(async move {
                let (mut stream, _) = listener.accept().await.unwrap();
                dir2.handle_update(&mut stream).await.unwrap();
            });
            let mut client = TcpStream::connect(addr).await.unwrap();
            write_text_frame(&mut client, "127.0.0.1:9001 127.0.0.1:9002 127.0.0.1:9003").await.unwrap();
            write_text_frame(&mut client, &left.to_wire_string()).await.unwrap();
            server.await.unwrap();
        }

        assert_eq!(dir.registered_zones().await, vec![("127.0.0.1:9001".parse().unwrap(), left)]);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dir3 = dir.clone();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            dir3.handle_addition(&mut stream).await.unwrap();
        });
        let mut client = TcpStream::connect(addr).await.unwrap();
        let _port = read_text_frame(&mut client).await.unwrap();
        let _world = read_text_frame(&mut client).await.unwrap();
        let reply = read_text_frame(&mut client).await.unwrap();
        assert_eq!(reply, "NOTFIRST 127.0.0.1:9001");
        server.await.unwrap();

        let _ = right; // only used to document which half was registered
    }

    #[tokio::test]
    async fn departure_removes_the_departed_entry_and_keeps_the_absorber() {
        let dir = Directory::new(world(), "127.0.0.1".parse().unwrap());
        let (left, right) = world().bisect_vertical();

        push_update(&dir, "127.0.0.1:9001", "127.0.0.1:9011", "127.0.0.1:9021", right).await;
        push_update(&dir, "127.0.0.1:9002", "127.0.0.1:9012", "127.0.0.1:9022", left).await;
        assert_eq!(dir.registered_zones().await.len(), 2);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_fut = listener.accept();
        let connect_fut = TcpStream::connect(addr);
        let (accepted, client) = tokio::join!(accept_fut, connect_fut);
        let (mut server_stream, _) = accepted.unwrap();
        let mut client = client.unwrap();

        let depart_fut = dir.handle_departure(&mut server_stream);
        let write_fut = async {
            write_text_frame(&mut client, "127.0.0.1:9001").await.unwrap();
            write_text_frame(&mut client, "127.0.0.1:9002 127.0.0.1:9012 127.0.0.1:9022").await.unwrap();
            write_text_frame(&mut client, &world().to_wire_string()).await.unwrap();
        };
        let (depart_res, _) = tokio::join!(depart_fut, write_fut);
        depart_res.unwrap();

        let zones = dir.registered_zones().await;
        assert_eq!(zones, vec![("127.0.0.1:9002".parse().unwrap(), world())]);
    }

    async fn push_update(dir: &Directory, join_ep: &str, propagate_ep: &str, removal_ep: &str, zone: Rectangle) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_fut = listener.accept();
        let connect_fut = TcpStream::connect(addr);
        let (accepted, client) = tokio::join!(accept_fut, connect_fut);
        let (mut server_stream, _) = accepted.unwrap();
        let mut client = client.unwrap();

        let handle_fut = dir.handle_update(&mut server_stream);
        let write_fut = async {
            write_text_frame(&mut client, &format!("{join_ep} {propagate_ep} {removal_ep}")).await.unwrap();
            write_text_frame(&mut client, &zone.to_wire_string()).await.unwrap();
        };
        let (handle_res, _) = tokio::join!(handle_fut, write_fut);
        handle_res.unwrap();
    }
}
