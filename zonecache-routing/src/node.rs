// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! `Node`: `{ self: NodeRecord, new_zone, mode, neighbours, trash, cache }`
//! Holds the shared, lock-guarded state a single running node owns:
//! held behind an `Arc`, interior `RwLock`/`Mutex` fields, and an
//! async-friendly snapshot accessor instead of exposing the locks
//! directly to callers.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use zonecache_cache::CacheAdapter;
use zonecache_core::geometry::Rectangle;
use zonecache_core::{Mode, NodeRecord};

use crate::neighbour_table::NeighbourTable;
use crate::trash_set::TrashSet;

/// A read-only snapshot of a node's topology state, cheap to clone and
/// safe to hand to a logging call or a gossip fan-out without holding
/// any lock across an `.await`.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub zone: Rectangle,
    pub mode: Mode,
    pub neighbours: Vec<NodeRecord>,
}

pub struct Node {
    pub join_ep: SocketAddr,
    pub propagate_ep: SocketAddr,
    pub removal_ep: SocketAddr,
    pub world: Rectangle,

    zone: RwLock<Rectangle>,
    mode: RwLock<Mode>,
    neighbours: RwLock<NeighbourTable>,
    trash: Mutex<TrashSet>,
    cache: Arc<dyn CacheAdapter>,
}

impl Node {
    pub fn new(
        join_ep: SocketAddr,
        propagate_ep: SocketAddr,
        removal_ep: SocketAddr,
        world: Rectangle,
        zone: Rectangle,
        neighbour_capacity: usize,
        cache: Arc<dyn CacheAdapter>,
    ) -> Self {
        Self {
            join_ep,
            propagate_ep,
            removal_ep,
            world,
            zone: RwLock::new(zone),
            mode: RwLock::new(Mode::Normal),
            neighbours: RwLock::new(NeighbourTable::new(neighbour_capacity)),
            trash: Mutex::new(TrashSet::new()),
            cache,
        }
    }

    pub async fn record(&self) -> NodeRecord {
        NodeRecord {
            join_ep: self.join_ep,
            propagate_ep: self.propagate_ep,
            removal_ep: self.removal_ep,
            zone: *self.zone.read().await,
        }
    }

    pub async fn zone(&self) -> Rectangle {
        *self.zone.read().await
    }

    pub async fn set_zone(&self, zone: Rectangle) {
        *self.zone.write().await = zone;
    }

    pub async fn mode(&self) -> Mode {
        self.mode.read().await.clone()
    }

    pub async fn set_mode(&self, mode: Mode) {
        debug!(?mode, "mode transition");
        *self.mode.write().await = mode;
    }

    pub async fn neighbours(&self) -> tokio::sync::RwLockReadGuard<'_, NeighbourTable> {
        self.neighbours.read().await
    }

    pub async fn neighbours_mut(&self) -> tokio::sync::RwLockWriteGuard<'_, NeighbourTable> {
        self.neighbours.write().await
    }

    pub async fn trash(&self) -> tokio::sync::MutexGuard<'_, TrashSet> {
        self.trash.lock().await
    }

    pub fn cache(&self) -> &dyn CacheAdapter {
        self.cache.as_ref()
    }

    pub fn cache_handle(&self) -> Arc<dyn CacheAdapter> {
        self.cache.clone()
    }

    pub async fn state_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            zone: self.zone().await,
            mode: self.mode().await,
            neighbours: self.neighbours().await.list().to_vec(),
        }
    }
}
