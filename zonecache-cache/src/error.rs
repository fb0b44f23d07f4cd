// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

use thiserror::Error;

/// `CacheError`: propagated verbatim to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("object too large for cache")]
    ObjectTooLarge,

    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
