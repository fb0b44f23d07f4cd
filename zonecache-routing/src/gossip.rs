// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! NeighbourGossip: ADD/REMOVE/UPDATE neighbour notifications on
//! topology change. Not transitive: callers must
//! directly reach every node whose adjacency changed.

use tokio::net::TcpStream;
use tracing::{debug, warn};

use zonecache_core::log_markers::LogMarker;
use zonecache_core::NodeRecord;

use crate::error::{Error, Result};
use crate::neighbour_table::NeighbourTable;
use zonecache_comms::wire::{GossipMessage, GossipVerb};

/// Applies an incoming gossip message to a neighbour table, following its
/// semantics: ADD = add_or_update, REMOVE = remove_by_propagate_ep,
/// UPDATE = add_or_update only when already present, else ignored.
pub fn apply(table: &mut NeighbourTable, msg: &GossipMessage) {
    use zonecache_core::NodeRecord as Rec;
    let rec = Rec {
        join_ep: msg.propagate_ep, // join_ep is not carried by gossip; callers that need
        propagate_ep: msg.propagate_ep,
        removal_ep: msg.removal_ep,
        zone: msg.zone,
    };
    match msg.verb {
        GossipVerb::AddNeighbour => {
            table.add_or_update(rec);
        }
        GossipVerb::RemoveNeighbour => {
            table.remove_by_propagate_ep(msg.propagate_ep);
        }
        GossipVerb::UpdateNeighbour => {
            if table.find_by_zone(&msg.zone).is_some()
                || table.list().iter().any(|e| e.propagate_ep == msg.propagate_ep)
            {
                table.add_or_update(rec);
            }
        }
    }
    debug!(marker = %LogMarker::GossipApplied, verb = ?msg.verb, peer = %msg.propagate_ep, "gossip applied");
}

/// Dials `target` and sends one gossip message.
pub async fn send(target: std::net::SocketAddr, verb: GossipVerb, about: &NodeRecord) -> Result<()> {
    let mut stream = TcpStream::connect(target).await.map_err(|e| Error::Routing {
        addr: target,
        source: zonecache_comms::Error::Io(e),
    })?;
    let msg = GossipMessage {
        verb,
        propagate_ep: about.propagate_ep,
        removal_ep: about.removal_ep,
        zone: about.zone,
    };
    msg.write(&mut stream).await.map_err(|source| Error::Routing { addr: target, source })?;
    debug!(marker = %LogMarker::GossipSent, %target, ?verb, "gossip sent");
    Ok(())
}

/// Best-effort fan-out: logs and continues past individual send
/// failures rather than aborting the whole gossip round, since a single
/// unreachable neighbour should not block a topology change that has
/// already committed locally.
pub async fn broadcast(targets: &[std::net::SocketAddr], verb: GossipVerb, about: &NodeRecord) {
    for &target in targets {
        if let Err(err) = send(target, verb, about).await {
            warn!(%target, %err, "gossip: failed to notify neighbour");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonecache_core::geometry::{Point, Rectangle};

    fn zone() -> Rectangle {
        Rectangle::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)).unwrap()
    }

    #[test]
    fn add_inserts_new_entry() {
        let mut table = NeighbourTable::default();
        let msg = GossipMessage {
            verb: GossipVerb::AddNeighbour,
            propagate_ep: "127.0.0.1:9001".parse().unwrap(),
            removal_ep: "127.0.0.1:9002".parse().unwrap(),
            zone: zone(),
        };
        apply(&mut table, &msg);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn update_is_ignored_when_absent() {
        let mut table = NeighbourTable::default();
        let msg = GossipMessage {
            verb: GossipVerb::UpdateNeighbour,
            propagate_ep: "127.0.0.1:9001".parse().unwrap(),
            removal_ep: "127.0.0.1:9002".parse().unwrap(),
            zone: zone(),
        };
        apply(&mut table, &msg);
        assert!(table.is_empty());
    }

    #[test]
    fn remove_drops_entry() {
        let mut table = NeighbourTable::default();
        let add = GossipMessage {
            verb: GossipVerb::AddNeighbour,
            propagate_ep: "127.0.0.1:9001".parse().unwrap(),
            removal_ep: "127.0.0.1:9002".parse().unwrap(),
            zone: zone(),
        };
        apply(&mut table, &add);
        let remove = GossipMessage { verb: GossipVerb::RemoveNeighbour, ..add };
        apply(&mut table, &remove);
        assert!(table.is_empty());
    }
}
