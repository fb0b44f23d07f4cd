// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Pure geometry: point-in-rectangle, area, vertical bisection, adjacency
//! and merge. No locking, no I/O.

use std::fmt;

use crate::error::{Error, Result};

/// A point in the world rectangle's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Half-open axis-aligned rectangle: `from` inclusive, `to` exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub from: Point,
    pub to: Point,
}

impl Rectangle {
    /// Builds a rectangle, rejecting degenerate extents
    /// invariant: `from.x < to.x ∧ from.y < to.y`).
    pub fn new(from: Point, to: Point) -> Result<Self> {
        if from.x < to.x && from.y < to.y {
            Ok(Self { from, to })
        } else {
            Err(Error::DegenerateRectangle { from, to })
        }
    }

    /// Builds the immutable world rectangle. Resolves Q4: `to` must have
    /// positive, integer-valued coordinates so `KeyHasher` never divides
    /// by a zero or fractional modulus.
    pub fn world(from: Point, to: Point) -> Result<Self> {
        let rect = Self::new(from, to)?;
        let integer_and_positive =
            |v: f64| v > 0.0 && v.fract() == 0.0;
        if !integer_and_positive(to.x) || !integer_and_positive(to.y) {
            return Err(Error::InvalidWorld { to });
        }
        Ok(rect)
    }

    /// Half-open containment test.
    pub fn contains(&self, p: Point) -> bool {
        self.from.x <= p.x && p.x < self.to.x && self.from.y <= p.y && p.y < self.to.y
    }

    /// `(to.x - from.x) * (to.y - from.y)`.
    pub fn area(&self) -> f64 {
        (self.to.x - self.from.x) * (self.to.y - self.from.y)
    }

    /// Splits along x into `(left, right)`. The joiner receives `right`;
    /// the parent retains `left`.
    pub fn bisect_vertical(&self) -> (Rectangle, Rectangle) {
        let mid_x = (self.from.x + self.to.x) / 2.0;
        let left = Rectangle {
            from: self.from,
            to: Point::new(mid_x, self.to.y),
        };
        let right = Rectangle {
            from: Point::new(mid_x, self.from.y),
            to: self.to,
        };
        (left, right)
    }

    /// True iff `a.to.x == b.from.x` or `a.from.x == b.to.x`. Y-overlap is
    /// assumed: the protocol only ever produces rectangles obtainable by
    /// repeated vertical bisection of the world rectangle.
    pub fn are_adjacent(&self, other: &Rectangle) -> bool {
        self.to.x == other.from.x || other.to.x == self.from.x
    }

    /// Merges two zones that share a y-extent and touch along x.
    pub fn try_merge(&self, other: &Rectangle) -> Result<Rectangle> {
        let same_y = self.from.y == other.from.y && self.to.y == other.to.y;
        if !same_y {
            return Err(Error::NotAdjacent {
                a: *self,
                b: *other,
            });
        }
        if self.to.x == other.from.x {
            Rectangle::new(self.from, other.to)
        } else if other.to.x == self.from.x {
            Rectangle::new(other.from, self.to)
        } else {
            Err(Error::NotAdjacent {
                a: *self,
                b: *other,
            })
        }
    }

    /// `"[(fx,fy) to (tx,ty)]"`, the inter-node wire serialisation of a
    /// zone.
    pub fn to_wire_string(&self) -> String {
        format!(
            "[({},{}) to ({},{})]",
            self.from.x, self.from.y, self.to.x, self.to.y
        )
    }

    /// Parses the `"[(fx,fy) to (tx,ty)]"` wire format.
    pub fn from_wire_string(s: &str) -> Option<Rectangle> {
        let s = s.trim();
        let s = s.strip_prefix('[')?.strip_suffix(']')?;
        let (from_part, to_part) = s.split_once(" to ")?;
        let from = parse_point(from_part)?;
        let to = parse_point(to_part)?;
        Rectangle::new(from, to).ok()
    }
}

fn parse_point(s: &str) -> Option<Point> {
    let s = s.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (x, y) = s.split_once(',')?;
    Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Free-function form of the operations above, for call sites (e.g.
/// wire-decoded zones) that want to call ZoneMap operations without
/// naming `Rectangle` as a receiver.
pub mod zone_map {
    use super::{Point, Rectangle};
    use crate::error::Result;

    pub fn contains(zone: &Rectangle, p: Point) -> bool {
        zone.contains(p)
    }

    pub fn area(zone: &Rectangle) -> f64 {
        zone.area()
    }

    pub fn bisect_vertical(zone: &Rectangle) -> (Rectangle, Rectangle) {
        zone.bisect_vertical()
    }

    pub fn are_adjacent(a: &Rectangle, b: &Rectangle) -> bool {
        a.are_adjacent(b)
    }

    pub fn try_merge(a: &Rectangle, b: &Rectangle) -> Result<Rectangle> {
        a.try_merge(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Rectangle {
        Rectangle::world(Point::new(0.0, 0.0), Point::new(50.0, 50.0)).unwrap()
    }

    #[test]
    fn world_rejects_non_integer_extents() {
        assert!(Rectangle::world(Point::new(0.0, 0.0), Point::new(50.5, 50.0)).is_err());
        assert!(Rectangle::world(Point::new(0.0, 0.0), Point::new(0.0, 50.0)).is_err());
    }

    #[test]
    fn contains_is_half_open() {
        let z = world();
        assert!(z.contains(Point::new(0.0, 0.0)));
        assert!(!z.contains(Point::new(50.0, 0.0)));
        assert!(!z.contains(Point::new(0.0, 50.0)));
        assert!(z.contains(Point::new(49.999, 49.999)));
    }

    #[test]
    fn bisect_vertical_matches_scenario_s2() {
        let z = world();
        let (left, right) = z.bisect_vertical();
        assert_eq!(left, Rectangle::new(Point::new(0.0, 0.0), Point::new(25.0, 50.0)).unwrap());
        assert_eq!(right, Rectangle::new(Point::new(25.0, 0.0), Point::new(50.0, 50.0)).unwrap());
    }

    #[test]
    fn boundary_point_belongs_to_right_child() {
        // B1: a point exactly on the split boundary belongs to the right
        // child under the half-open convention.
        let z = world();
        let (left, right) = z.bisect_vertical();
        let boundary = Point::new(25.0, 10.0);
        assert!(!left.contains(boundary));
        assert!(right.contains(boundary));
    }

    #[test]
    fn adjacency_and_merge_round_trip() {
        let z = world();
        let (left, right) = z.bisect_vertical();
        assert!(left.are_adjacent(&right));
        let merged = left.try_merge(&right).unwrap();
        assert_eq!(merged, z);
    }

    #[test]
    fn merge_rejects_non_adjacent_or_differing_y() {
        let a = Rectangle::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)).unwrap();
        let b = Rectangle::new(Point::new(20.0, 0.0), Point::new(30.0, 10.0)).unwrap();
        assert!(a.try_merge(&b).is_err());

        let c = Rectangle::new(Point::new(10.0, 0.0), Point::new(20.0, 5.0)).unwrap();
        assert!(a.try_merge(&c).is_err());
    }

    #[test]
    fn wire_round_trip() {
        let z = Rectangle::new(Point::new(12.5, 0.0), Point::new(25.0, 50.0)).unwrap();
        let s = z.to_wire_string();
        assert_eq!(s, "[(12.5,0) to (25,50)]");
        assert_eq!(Rectangle::from_wire_string(&s), Some(z));
    }
}
