// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

use thiserror::Error;

/// `ProtocolError`: malformed inter-node frame or a
/// transport failure underneath it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame exceeded maximum size ({len} bytes)")]
    FrameTooLarge { len: u32 },

    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("connection closed before a full frame was received")]
    UnexpectedEof,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
