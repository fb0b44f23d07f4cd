// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! `CacheAdapter`: the contract wrapping the single-node cache engine.

use bytes::Bytes;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub flags: u32,
    pub exptime: u32,
    pub value: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    NotStored,
    Exists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Must be safe to call from multiple worker threads/tasks concurrently.
/// `iter_keys` returns a snapshot; callers that need a consistent
/// migration snapshot take their own lock around the call per the
/// concurrency model.
pub trait CacheAdapter: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<CacheEntry>;
    fn set(&self, key: &[u8], flags: u32, exptime: u32, value: Bytes) -> Result<StoreOutcome>;
    fn delete(&self, key: &[u8]) -> DeleteOutcome;
    fn iter_keys(&self) -> Vec<Bytes>;
}
