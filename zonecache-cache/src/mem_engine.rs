// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! A minimal in-memory [`CacheAdapter`] implementation. Not a slab
//! allocator or an LRU, but enough of a single-node engine to run the
//! system end to end and to drive the integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use dashmap::DashMap;

use crate::adapter::{CacheAdapter, CacheEntry, DeleteOutcome, StoreOutcome};
use crate::error::{Error, Result};

/// The classic memcached default item size ceiling.
const MAX_VALUE_LEN: usize = 1024 * 1024;

#[derive(Debug, Clone)]
struct Slot {
    flags: u32,
    exptime: u32,
    value: Bytes,
    cas: u64,
}

/// Concurrent, `Send + Sync` without a node-wide mutex: an
/// `Arc`-shared `DashMap` keyed by key bytes, the same shape used
/// elsewhere in this workspace for shared peer state.
pub struct MemEngine {
    table: DashMap<Bytes, Slot>,
    next_cas: AtomicU64,
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemEngine {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
            next_cas: AtomicU64::new(1),
        }
    }

    fn is_expired(slot: &Slot) -> bool {
        if slot.exptime == 0 {
            return false;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        now >= slot.exptime as u64
    }

    fn next_cas(&self) -> u64 {
        self.next_cas.fetch_add(1, Ordering::Relaxed)
    }

    pub fn gets(&self, key: &[u8]) -> Option<(CacheEntry, u64)> {
        let slot = self.table.get(key)?;
        if Self::is_expired(&slot) {
            drop(slot);
            self.table.remove(key);
            return None;
        }
        Some((
            CacheEntry {
                flags: slot.flags,
                exptime: slot.exptime,
                value: slot.value.clone(),
            },
            slot.cas,
        ))
    }

    pub fn add(&self, key: &[u8], flags: u32, exptime: u32, value: Bytes) -> Result<StoreOutcome> {
        if value.len() > MAX_VALUE_LEN {
            return Err(Error::ObjectTooLarge);
        }
        if self.get(key).is_some() {
            return Ok(StoreOutcome::NotStored);
        }
        self.set(key, flags, exptime, value)
    }

    pub fn replace(&self, key: &[u8], flags: u32, exptime: u32, value: Bytes) -> Result<StoreOutcome> {
        if self.get(key).is_none() {
            return Ok(StoreOutcome::NotStored);
        }
        self.set(key, flags, exptime, value)
    }

    pub fn append(&self, key: &[u8], suffix: Bytes) -> Result<StoreOutcome> {
        self.concat(key, suffix, false)
    }

    pub fn prepend(&self, key: &[u8], prefix: Bytes) -> Result<StoreOutcome> {
        self.concat(key, prefix, true)
    }

    fn concat(&self, key: &[u8], extra: Bytes, prepend: bool) -> Result<StoreOutcome> {
        let Some(mut entry) = self.table.get_mut(key) else {
            return Ok(StoreOutcome::NotStored);
        };
        if Self::is_expired(&entry) {
            return Ok(StoreOutcome::NotStored);
        }
        let mut combined = Vec::with_capacity(entry.value.len() + extra.len());
        if prepend {
            combined.extend_from_slice(&extra);
            combined.extend_from_slice(&entry.value);
        } else {
            combined.extend_from_slice(&entry.value);
            combined.extend_from_slice(&extra);
        }
        if combined.len() > MAX_VALUE_LEN {
            return Err(Error::ObjectTooLarge);
        }
        entry.value = Bytes::from(combined);
        entry.cas = self.next_cas();
        Ok(StoreOutcome::Stored)
    }

    pub fn cas(
        &self,
        key: &[u8],
        flags: u32,
        exptime: u32,
        value: Bytes,
        cas_unique: u64,
    ) -> Result<StoreOutcome> {
        if value.len() > MAX_VALUE_LEN {
            return Err(Error::ObjectTooLarge);
        }
        let Some(mut entry) = self.table.get_mut(key) else {
            return Ok(StoreOutcome::NotStored);
        };
        if entry.cas != cas_unique {
            return Ok(StoreOutcome::Exists);
        }
        *entry = Slot {
            flags,
            exptime,
            value,
            cas: self.next_cas(),
        };
        Ok(StoreOutcome::Stored)
    }

    /// Returns the post-increment/decrement value, or `None` if the key
    /// is absent or not a parseable integer.
    pub fn incr_decr(&self, key: &[u8], delta: u64, increment: bool) -> Option<u64> {
        let mut entry = self.table.get_mut(key)?;
        let current: u64 = std::str::from_utf8(&entry.value).ok()?.trim().parse().ok()?;
        let updated = if increment {
            current.saturating_add(delta)
        } else {
            current.saturating_sub(delta)
        };
        entry.value = Bytes::from(updated.to_string());
        entry.cas = self.next_cas();
        Some(updated)
    }

    pub fn touch(&self, key: &[u8], exptime: u32) -> DeleteOutcome {
        match self.table.get_mut(key) {
            Some(mut entry) => {
                entry.exptime = exptime;
                DeleteOutcome::Deleted
            }
            None => DeleteOutcome::NotFound,
        }
    }

    pub fn flush_all(&self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl CacheAdapter for MemEngine {
    fn get(&self, key: &[u8]) -> Option<CacheEntry> {
        self.gets(key).map(|(entry, _)| entry)
    }

    fn set(&self, key: &[u8], flags: u32, exptime: u32, value: Bytes) -> Result<StoreOutcome> {
        if value.len() > MAX_VALUE_LEN {
            return Err(Error::ObjectTooLarge);
        }
        let cas = self.next_cas();
        self.table.insert(
            Bytes::copy_from_slice(key),
            Slot {
                flags,
                exptime,
                value,
                cas,
            },
        );
        Ok(StoreOutcome::Stored)
    }

    fn delete(&self, key: &[u8]) -> DeleteOutcome {
        match self.table.remove(key) {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::NotFound,
        }
    }

    fn iter_keys(&self) -> Vec<Bytes> {
        self.table.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let e = MemEngine::new();
        e.set(b"k", 0, 0, Bytes::from_static(b"v")).unwrap();
        assert_eq!(e.get(b"k").unwrap().value, Bytes::from_static(b"v"));
    }

    #[test]
    fn set_twice_returns_latest() {
        let e = MemEngine::new();
        e.set(b"k", 0, 0, Bytes::from_static(b"v1")).unwrap();
        e.set(b"k", 0, 0, Bytes::from_static(b"v2")).unwrap();
        assert_eq!(e.get(b"k").unwrap().value, Bytes::from_static(b"v2"));
    }

    #[test]
    fn delete_then_get_is_miss() {
        let e = MemEngine::new();
        e.set(b"k", 0, 0, Bytes::from_static(b"v")).unwrap();
        assert_eq!(e.delete(b"k"), DeleteOutcome::Deleted);
        assert!(e.get(b"k").is_none());
    }

    #[test]
    fn add_refuses_existing_key() {
        let e = MemEngine::new();
        e.set(b"k", 0, 0, Bytes::from_static(b"v")).unwrap();
        assert_eq!(
            e.add(b"k", 0, 0, Bytes::from_static(b"v2")).unwrap(),
            StoreOutcome::NotStored
        );
    }

    #[test]
    fn zero_length_value_is_allowed() {
        let e = MemEngine::new();
        e.set(b"k", 0, 0, Bytes::new()).unwrap();
        assert_eq!(e.get(b"k").unwrap().value.len(), 0);
    }

    #[test]
    fn oversized_value_is_rejected() {
        let e = MemEngine::new();
        let big = Bytes::from(vec![0u8; MAX_VALUE_LEN + 1]);
        assert_eq!(e.set(b"k", 0, 0, big).unwrap_err(), Error::ObjectTooLarge);
    }

    #[test]
    fn cas_rejects_stale_token() {
        let e = MemEngine::new();
        e.set(b"k", 0, 0, Bytes::from_static(b"v1")).unwrap();
        let (_, cas) = e.gets(b"k").unwrap();
        e.set(b"k", 0, 0, Bytes::from_static(b"v2")).unwrap();
        assert_eq!(
            e.cas(b"k", 0, 0, Bytes::from_static(b"v3"), cas).unwrap(),
            StoreOutcome::Exists
        );
    }

    #[test]
    fn incr_decr_round_trip() {
        let e = MemEngine::new();
        e.set(b"k", 0, 0, Bytes::from_static(b"10")).unwrap();
        assert_eq!(e.incr_decr(b"k", 5, true), Some(15));
        assert_eq!(e.incr_decr(b"k", 3, false), Some(12));
    }
}
