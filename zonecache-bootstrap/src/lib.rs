// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! The bootstrap directory: a small standalone service a fresh
//! cluster's first few nodes dial to learn the world rectangle and
//! either that they are node zero or who to join.

pub mod directory;
pub mod error;

pub use directory::Directory;
pub use error::{Error, Result};
