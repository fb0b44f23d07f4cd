// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! `NodeId`/`NodeRecord` — the data model for a node's
//! addressable identity and the zone it serves.

use std::fmt;
use std::net::SocketAddr;

use crate::geometry::Rectangle;

/// A node's stable identity: its `propagate_ep`. Two `NodeRecord`s are
/// "the same neighbour" iff they share this address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub SocketAddr);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{ join_ep, propagate_ep, removal_ep, zone }`.
/// `join_ep` is where a joiner may connect to split this node's zone;
/// `propagate_ep` handles inter-node data requests and gossip;
/// `removal_ep` handles departure merges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRecord {
    pub join_ep: SocketAddr,
    pub propagate_ep: SocketAddr,
    pub removal_ep: SocketAddr,
    pub zone: Rectangle,
}

impl NodeRecord {
    pub fn id(&self) -> NodeId {
        NodeId(self.propagate_ep)
    }

    /// `"<propagate_ep> <removal_ep>"`, the endpoint-pair wire
    /// serialisation used throughout the join/departure/gossip protocols
    /// on the wire.
    pub fn endpoints_to_wire_string(&self) -> String {
        format!("{} {}", self.propagate_ep, self.removal_ep)
    }

    pub fn endpoints_from_wire_str(s: &str) -> Option<(SocketAddr, SocketAddr)> {
        let mut parts = s.trim().split_whitespace();
        let propagate_ep = parts.next()?.parse().ok()?;
        let removal_ep = parts.next()?.parse().ok()?;
        Some((propagate_ep, removal_ep))
    }
}
