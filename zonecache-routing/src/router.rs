// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Router: decides local-serve vs neighbour-forward and propagates
//! writes and deletes. Operates purely in terms of the
//! `CacheAdapter` contract (get/set/delete) — richer per-verb semantics
//! (add/replace/append/prepend/cas/incr/decr/touch) are resolved by the
//! caller before reaching the router, since a
//! non-local write degrades to an unconditional local set, a forward,
//! and a local delete regardless of which store verb the client sent.

use bytes::Bytes;
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use zonecache_cache::{CacheAdapter, DeleteOutcome as CacheDeleteOutcome, StoreOutcome};
use zonecache_comms::wire::{ForwardReply, ForwardRequest};
use zonecache_core::hash::KeyHasher;

use crate::error::{Error, Result};
use crate::node::Node;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    Hit { flags: u32, exptime: u32, value: Bytes },
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

async fn dial(addr: std::net::SocketAddr) -> Result<TcpStream> {
    TcpStream::connect(addr).await.map_err(|e| Error::Routing {
        addr,
        source: zonecache_comms::Error::Io(e),
    })
}

/// `GET`.
pub async fn route_get(node: &Node, key: &[u8]) -> Result<GetOutcome> {
    let p = KeyHasher::project(&node.world, key);
    let mode = node.mode().await;
    let zone = node.zone().await;

    let locally_owned = match mode.new_zone() {
        Some(new_zone) => new_zone.contains(p),
        None => zone.contains(p),
    };

    if locally_owned {
        trace!(?p, "get: locally owned");
        return Ok(local_get(node, key));
    }

    if mode.is_migrating() {
        let trash = node.trash().await;
        if trash.contains(key) {
            trace!(?p, "get: key in trash during transition, reporting miss");
            return Ok(GetOutcome::Miss);
        }
        drop(trash);
        // Transitional reads: serve locally if present, else forward.
        if let GetOutcome::Hit { flags, exptime, value } = local_get(node, key) {
            return Ok(GetOutcome::Hit { flags, exptime, value });
        }
    }

    forward_get(node, p, key).await
}

fn local_get(node: &Node, key: &[u8]) -> GetOutcome {
    match node.cache().get(key) {
        Some(entry) => GetOutcome::Hit {
            flags: entry.flags,
            exptime: entry.exptime,
            value: entry.value,
        },
        None => GetOutcome::Miss,
    }
}

async fn forward_get(node: &Node, p: zonecache_core::geometry::Point, key: &[u8]) -> Result<GetOutcome> {
    let neighbours = node.neighbours().await;
    let target = neighbours.best_for_point(p).ok_or(Error::NoNeighbour)?;
    drop(neighbours);

    debug!(target = %target.propagate_ep, "get: forwarding to neighbour");
    let mut stream = dial(target.propagate_ep).await?;
    ForwardRequest::Get { key: Bytes::copy_from_slice(key) }
        .write(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: target.propagate_ep, source })?;
    let reply = ForwardReply::read(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: target.propagate_ep, source })?;
    Ok(match reply {
        ForwardReply::NotFound => GetOutcome::Miss,
        ForwardReply::Found { flags, exptime, value } => GetOutcome::Hit { flags, exptime, value },
        other => {
            warn!(?other, "get: unexpected forward reply");
            GetOutcome::Miss
        }
    })
}

/// `SET`/`ADD`/`REPLACE`/`APPEND`/`PREPEND`/`CAS`. The
/// caller has already resolved the final `(flags, exptime, value)` to
/// store, whatever the original verb's conditional semantics were.
pub async fn route_store(
    node: &Node,
    key: &[u8],
    flags: u32,
    exptime: u32,
    value: Bytes,
) -> Result<StoreOutcome> {
    let p = KeyHasher::project(&node.world, key);
    let mode = node.mode().await;
    let zone = node.zone().await;

    let locally_owned = match mode.new_zone() {
        Some(new_zone) => new_zone.contains(p),
        None => zone.contains(p),
    };

    if locally_owned {
        trace!(?p, "store: locally owned");
        return local_set(node, key, flags, exptime, value);
    }

    if mode.is_migrating() {
        // Transitional, non-local: trash the key and acknowledge as
        // stored without forwarding.
        let mut trash = node.trash().await;
        trash.add(Bytes::copy_from_slice(key));
        trace!(?p, "store: added to trash during transition");
        return Ok(StoreOutcome::Stored);
    }

    // NORMAL, non-local: realise locally first so the bytes can be
    // forwarded, then forward, then drop the local copy.
    local_set(node, key, flags, exptime, value.clone())?;
    forward_store(node, p, key, flags, exptime, value).await?;
    node.cache().delete(key);
    Ok(StoreOutcome::Stored)
}

fn local_set(
    node: &Node,
    key: &[u8],
    flags: u32,
    exptime: u32,
    value: Bytes,
) -> Result<StoreOutcome> {
    node.cache()
        .set(key, flags, exptime, value)
        .map_err(Error::Cache)
}

async fn forward_store(
    node: &Node,
    p: zonecache_core::geometry::Point,
    key: &[u8],
    flags: u32,
    exptime: u32,
    value: Bytes,
) -> Result<()> {
    let neighbours = node.neighbours().await;
    let target = neighbours.best_for_point(p).ok_or(Error::NoNeighbour)?;
    drop(neighbours);

    debug!(target = %target.propagate_ep, "store: forwarding to neighbour");
    let mut stream = dial(target.propagate_ep).await?;
    ForwardRequest::Set {
        key: Bytes::copy_from_slice(key),
        flags,
        exptime,
        value,
    }
    .write(&mut stream)
    .await
    .map_err(|source| Error::Routing { addr: target.propagate_ep, source })?;
    let _ = ForwardReply::read(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: target.propagate_ep, source })?;
    Ok(())
}

/// `DELETE`, symmetric to `SET`.
pub async fn route_delete(node: &Node, key: &[u8]) -> Result<DeleteOutcome> {
    let p = KeyHasher::project(&node.world, key);
    let mode = node.mode().await;
    let zone = node.zone().await;

    let locally_owned = match mode.new_zone() {
        Some(new_zone) => new_zone.contains(p),
        None => zone.contains(p),
    };

    if locally_owned {
        return Ok(match node.cache().delete(key) {
            CacheDeleteOutcome::Deleted => DeleteOutcome::Deleted,
            CacheDeleteOutcome::NotFound => DeleteOutcome::NotFound,
        });
    }

    if mode.is_migrating() {
        let mut trash = node.trash().await;
        trash.add(Bytes::copy_from_slice(key));
        return Ok(DeleteOutcome::Deleted);
    }

    let neighbours = node.neighbours().await;
    let target = neighbours.best_for_point(p).ok_or(Error::NoNeighbour)?;
    drop(neighbours);

    let mut stream = dial(target.propagate_ep).await?;
    ForwardRequest::Delete { key: Bytes::copy_from_slice(key) }
        .write(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: target.propagate_ep, source })?;
    let reply = ForwardReply::read(&mut stream)
        .await
        .map_err(|source| Error::Routing { addr: target.propagate_ep, source })?;
    Ok(match reply {
        ForwardReply::Deleted => DeleteOutcome::Deleted,
        _ => DeleteOutcome::NotFound,
    })
}

/// Serves an incoming forwarded request on the `propagate_ep` listener.
/// Always operates against the local cache directly: a node never
/// re-forwards a request it received as a forward (the neighbour graph
/// has no multi-hop routing, by design — forwarding is one hop only).
pub fn serve_forward_request(node: &Node, request: ForwardRequest) -> ForwardReply {
    match request {
        ForwardRequest::Get { key } => match node.cache().get(&key) {
            Some(entry) => ForwardReply::Found {
                flags: entry.flags,
                exptime: entry.exptime,
                value: entry.value,
            },
            None => ForwardReply::NotFound,
        },
        ForwardRequest::Set { key, flags, exptime, value } => {
            let _ = node.cache().set(&key, flags, exptime, value);
            ForwardReply::Stored
        }
        ForwardRequest::Delete { key } => match node.cache().delete(&key) {
            CacheDeleteOutcome::Deleted => ForwardReply::Deleted,
            CacheDeleteOutcome::NotFound => ForwardReply::NotFound,
        },
    }
}
