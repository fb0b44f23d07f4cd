// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! NeighbourTable: per-node mutable set of known neighbours.
//! Backed by a `Vec` rather than a map: the bound
//! (default 10) is small enough that a linear scan is simpler than a
//! tree, and iteration order — used by the tie-break rule in
//! `best_for_point` — is exactly insertion order with a `Vec`.

use std::net::SocketAddr;

use zonecache_core::geometry::Point;
use zonecache_core::NodeRecord;

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct NeighbourTable {
    entries: Vec<NodeRecord>,
    capacity: usize,
}

impl Default for NeighbourTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl NeighbourTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// If an entry with the same `propagate_ep` exists, overwrites its
    /// zone and `removal_ep`; otherwise inserts, unless the table is at
    /// capacity, in which case the insert is dropped (logged by the
    /// caller — the table itself stays a pure collection).
    pub fn add_or_update(&mut self, rec: NodeRecord) -> bool {
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.propagate_ep == rec.propagate_ep)
        {
            *existing = rec;
            return true;
        }
        if self.entries.len() >= self.capacity {
            return false;
        }
        self.entries.push(rec);
        true
    }

    /// No-op if absent.
    pub fn remove_by_propagate_ep(&mut self, ep: SocketAddr) {
        self.entries.retain(|e| e.propagate_ep != ep);
    }

    /// Exact equality lookup, used only during merge.
    pub fn find_by_zone(&self, zone: &zonecache_core::Rectangle) -> Option<NodeRecord> {
        self.entries.iter().find(|e| &e.zone == zone).copied()
    }

    /// The neighbour whose zone contains `p`; if none contains it, the
    /// neighbour whose centroid is closest (squared Euclidean distance).
    /// Ties broken by iteration order.
    pub fn best_for_point(&self, p: Point) -> Option<NodeRecord> {
        if let Some(rec) = self.entries.iter().find(|e| e.zone.contains(p)) {
            return Some(*rec);
        }
        self.entries
            .iter()
            .min_by(|a, b| {
                centroid_dist2(&a.zone, p)
                    .partial_cmp(&centroid_dist2(&b.zone, p))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
    }

    /// The neighbour with minimum non-zero area, used by departure to
    /// choose a merge partner. `exclude` lets a retry (DESIGN.md, Q2)
    /// skip a candidate that has already failed.
    pub fn smallest_by_area_excluding(&self, exclude: &[SocketAddr]) -> Option<NodeRecord> {
        self.entries
            .iter()
            .filter(|e| e.zone.area() > 0.0 && !exclude.contains(&e.propagate_ep))
            .min_by(|a, b| {
                a.zone
                    .area()
                    .partial_cmp(&b.zone.area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .copied()
    }

    pub fn smallest_by_area(&self) -> Option<NodeRecord> {
        self.smallest_by_area_excluding(&[])
    }

    pub fn list(&self) -> &[NodeRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn centroid_dist2(zone: &zonecache_core::Rectangle, p: Point) -> f64 {
    let cx = (zone.from.x + zone.to.x) / 2.0;
    let cy = (zone.from.y + zone.to.y) / 2.0;
    let dx = cx - p.x;
    let dy = cy - p.y;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonecache_core::geometry::Rectangle;

    fn rec(addr: &str, zone: Rectangle) -> NodeRecord {
        let a: SocketAddr = addr.parse().unwrap();
        NodeRecord {
            join_ep: a,
            propagate_ep: a,
            removal_ep: a,
            zone,
        }
    }

    #[test]
    fn add_or_update_overwrites_same_propagate_ep() {
        let mut t = NeighbourTable::default();
        let z1 = Rectangle::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)).unwrap();
        let z2 = Rectangle::new(Point::new(0.0, 0.0), Point::new(20.0, 10.0)).unwrap();
        t.add_or_update(rec("127.0.0.1:9001", z1));
        t.add_or_update(rec("127.0.0.1:9001", z2));
        assert_eq!(t.len(), 1);
        assert_eq!(t.list()[0].zone, z2);
    }

    #[test]
    fn remove_is_noop_if_absent() {
        let mut t = NeighbourTable::default();
        t.remove_by_propagate_ep("127.0.0.1:9999".parse().unwrap());
        assert!(t.is_empty());
    }

    #[test]
    fn best_for_point_prefers_containment_over_centroid() {
        let mut t = NeighbourTable::default();
        let near = Rectangle::new(Point::new(0.0, 0.0), Point::new(5.0, 5.0)).unwrap();
        let containing = Rectangle::new(Point::new(5.0, 0.0), Point::new(15.0, 10.0)).unwrap();
        t.add_or_update(rec("127.0.0.1:9001", near));
        t.add_or_update(rec("127.0.0.1:9002", containing));
        let best = t.best_for_point(Point::new(10.0, 5.0)).unwrap();
        assert_eq!(best.zone, containing);
    }

    #[test]
    fn smallest_by_area_excludes_failed_candidate() {
        let mut t = NeighbourTable::default();
        let small = Rectangle::new(Point::new(0.0, 0.0), Point::new(5.0, 5.0)).unwrap();
        let smaller = Rectangle::new(Point::new(10.0, 0.0), Point::new(12.0, 1.0)).unwrap();
        t.add_or_update(rec("127.0.0.1:9001", small));
        t.add_or_update(rec("127.0.0.1:9002", smaller));
        let first = t.smallest_by_area().unwrap();
        assert_eq!(first.zone, smaller);
        let retry = t.smallest_by_area_excluding(&[first.propagate_ep]).unwrap();
        assert_eq!(retry.zone, small);
    }
}
