// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! The `CacheAdapter` contract and a minimal in-memory reference
//! implementation.

pub mod adapter;
pub mod error;
pub mod mem_engine;

pub use adapter::{CacheAdapter, CacheEntry, DeleteOutcome, StoreOutcome};
pub use error::{Error, Result};
pub use mem_engine::MemEngine;
