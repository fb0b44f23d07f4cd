// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! Deterministic key-to-point hashing. A DJB2 variant projected onto
//! the world rectangle's integer extents.

use crate::geometry::{Point, Rectangle};

/// Zero-sized: the hash has no state, only a contract all nodes must
/// agree on.
pub struct KeyHasher;

impl KeyHasher {
    /// `h = 5381; h = h*33 + b` for each byte, then `p.x = h mod
    /// floor(world.to.x)`, `p.y = h mod floor(world.to.y)`.
    ///
    /// `world` must have been built via [`Rectangle::world`], which
    /// guarantees `to.x`/`to.y` are positive integers, so the modulus
    /// below can never be zero.
    pub fn project(world: &Rectangle, key: &[u8]) -> Point {
        let mut h: u64 = 5381;
        for &b in key {
            h = h.wrapping_mul(33).wrapping_add(b as u64);
        }
        let mod_x = world.to.x as u64;
        let mod_y = world.to.y as u64;
        Point::new((h % mod_x) as f64, (h % mod_y) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> Rectangle {
        Rectangle::world(Point::new(0.0, 0.0), Point::new(50.0, 50.0)).unwrap()
    }

    #[test]
    fn deterministic_across_calls() {
        let w = world();
        let p1 = KeyHasher::project(&w, b"hello");
        let p2 = KeyHasher::project(&w, b"hello");
        assert_eq!(p1, p2);
    }

    #[test]
    fn stays_within_world_bounds() {
        let w = world();
        for key in ["a", "bb", "ccc", "", "a much longer key than the rest"] {
            let p = KeyHasher::project(&w, key.as_bytes());
            assert!(w.contains(p) || p.x == 0.0 || p.y == 0.0);
            assert!(p.x < w.to.x && p.y < w.to.y);
        }
    }
}
