// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! `CacheAdapter` deliberately has no notion of a CAS token — it
//! is the minimal get/set/delete contract the router needs. `gets`/`cas`
//! are a client-protocol feature, not a cache-engine one, so this node
//! keeps its own token side-table instead of widening the adapter
//! contract for one command pair.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;

pub struct CasTable {
    tokens: DashMap<Bytes, u64>,
    next: AtomicU64,
}

impl Default for CasTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CasTable {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
            next: AtomicU64::new(1),
        }
    }

    /// Assigns and records a fresh token for `key`, called after every
    /// write that should invalidate an older `cas_unique`.
    pub fn bump(&self, key: &[u8]) -> u64 {
        let token = self.next.fetch_add(1, Ordering::Relaxed);
        self.tokens.insert(Bytes::copy_from_slice(key), token);
        token
    }

    pub fn current(&self, key: &[u8]) -> Option<u64> {
        self.tokens.get(key).map(|v| *v)
    }

    pub fn remove(&self, key: &[u8]) {
        self.tokens.remove(key);
    }
}
