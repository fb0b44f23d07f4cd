// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! The node's transition state machine. A tagged sum rather than an
//! integer enum with ad-hoc guards: each transitional variant carries
//! only the data that is valid in that phase.

use crate::geometry::Rectangle;
use crate::node_record::NodeRecord;

/// The node's current position in the split/merge state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Normal,

    /// Accepted a joiner at `join_ep`; zones have not yet been sent.
    SplittingParentInit { child_join_ep: std::net::SocketAddr },
    /// Zones and endpoints have been exchanged with `child`; migration of
    /// the child's half of the keyspace is under way.
    SplittingParentMigrating { child: NodeRecord, new_zone: Rectangle },

    /// Dialled a parent; awaiting our assigned zone.
    SplittingChildInit { parent_join_ep: std::net::SocketAddr },
    /// Received `new_zone` and `parent`'s endpoints; migration in.
    SplittingChildMigrating { parent: NodeRecord, new_zone: Rectangle },

    /// Accepted a departing neighbour's merge request at `removal_ep`;
    /// the merged zone has not yet been computed.
    MergingParentInit { child: NodeRecord },
    /// `new_zone` is the union of our zone and `child`'s; migration in.
    MergingParentMigrating { child: NodeRecord, new_zone: Rectangle },

    /// Dialled our smallest-area neighbour to depart; awaiting the
    /// merged-zone reply.
    MergingChildInit { parent: NodeRecord },
    /// Streaming our keyspace to `parent`, after which we exit.
    MergingChildMigrating { parent: NodeRecord, merged_zone: Rectangle },
}

impl Mode {
    pub fn is_normal(&self) -> bool {
        matches!(self, Mode::Normal)
    }

    /// The zone a transitional mode is migrating *towards*, used by the
    /// router's `contains(new_zone, p)` check. `None`
    /// in `Normal` mode and in the `*_Init` phases, where no zone split
    /// has been computed yet.
    pub fn new_zone(&self) -> Option<&Rectangle> {
        match self {
            Mode::Normal
            | Mode::SplittingParentInit { .. }
            | Mode::SplittingChildInit { .. }
            | Mode::MergingParentInit { .. }
            | Mode::MergingChildInit { .. } => None,
            Mode::SplittingParentMigrating { new_zone, .. }
            | Mode::SplittingChildMigrating { new_zone, .. } => Some(new_zone),
            Mode::MergingParentMigrating { new_zone, .. } => Some(new_zone),
            Mode::MergingChildMigrating { merged_zone, .. } => Some(merged_zone),
        }
    }

    pub fn is_migrating(&self) -> bool {
        matches!(
            self,
            Mode::SplittingParentMigrating { .. }
                | Mode::SplittingChildMigrating { .. }
                | Mode::MergingParentMigrating { .. }
                | Mode::MergingChildMigrating { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use assert_matches::assert_matches;

    #[test]
    fn normal_has_no_new_zone() {
        assert_eq!(Mode::Normal.new_zone(), None);
        assert!(!Mode::Normal.is_migrating());
    }

    #[test]
    fn migrating_variants_expose_new_zone() {
        let z = Rectangle::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0)).unwrap();
        let parent = dummy_record(z);
        let mode = Mode::SplittingChildMigrating {
            parent,
            new_zone: z,
        };
        assert_matches!(mode.new_zone(), Some(_));
        assert!(mode.is_migrating());
    }

    fn dummy_record(zone: Rectangle) -> NodeRecord {
        let addr: std::net::SocketAddr = "127.0.0.1:9000".parse().unwrap();
        NodeRecord {
            join_ep: addr,
            propagate_ep: addr,
            removal_ep: addr,
            zone,
        }
    }
}
