// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! A flat set of `Display`-able event tags, logged as a structured
//! `tracing` field (`marker = %LogMarker::...`) rather than embedded in a
//! free-text message, so operators can grep for a stable token across
//! releases.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMarker {
    BootstrapAssignedFirst,
    BootstrapAssignedParent,
    JoinAccepted,
    SplitCommitted,
    DepartureStarted,
    MergeCommitted,
    MigrationAborted,
    GossipSent,
    GossipApplied,
}

impl fmt::Display for LogMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogMarker::BootstrapAssignedFirst => "BootstrapAssignedFirst",
            LogMarker::BootstrapAssignedParent => "BootstrapAssignedParent",
            LogMarker::JoinAccepted => "JoinAccepted",
            LogMarker::SplitCommitted => "SplitCommitted",
            LogMarker::DepartureStarted => "DepartureStarted",
            LogMarker::MergeCommitted => "MergeCommitted",
            LogMarker::MigrationAborted => "MigrationAborted",
            LogMarker::GossipSent => "GossipSent",
            LogMarker::GossipApplied => "GossipApplied",
        };
        write!(f, "{s}")
    }
}
