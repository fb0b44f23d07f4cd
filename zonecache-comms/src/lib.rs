// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Transport: explicit length-prefixed framing, the inter-node wire
//! messages, and the client-facing text protocol codec.

pub mod error;
pub mod framing;
pub mod text_protocol;
pub mod wire;

pub use error::{Error, Result};
