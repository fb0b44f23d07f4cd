// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! The node binary's supporting library: configuration, the bootstrap
//! directory client, client-session CAS tracking, the client text
//! protocol dispatcher, and the join/propagate/removal accept loops.

pub mod bootstrap_client;
pub mod cas_table;
pub mod config;
pub mod error;
pub mod listeners;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
