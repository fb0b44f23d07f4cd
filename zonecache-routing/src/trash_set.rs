// Copyright 2026 ZoneCache Contributors.
//
// This software is licensed under the General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, this software is
// distributed under the GPL Licence on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. Please review the Licence
// for the specific language governing permissions and limitations relating to
// use of this software.

//! TrashSet: per-node set of keys whose ownership is transitioning
//! away during a split or merge, still served locally until migration
//! confirms the peer has them.

use std::collections::HashSet;

use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct TrashSet {
    keys: HashSet<Bytes>,
}

impl TrashSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: Bytes) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.keys.remove(key);
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.keys.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_contains_remove_round_trip() {
        let mut t = TrashSet::new();
        assert!(!t.contains(b"k"));
        t.add(Bytes::from_static(b"k"));
        assert!(t.contains(b"k"));
        t.remove(b"k");
        assert!(!t.contains(b"k"));
    }

    #[test]
    fn clear_empties_the_set() {
        let mut t = TrashSet::new();
        t.add(Bytes::from_static(b"a"));
        t.add(Bytes::from_static(b"b"));
        t.clear();
        assert!(t.is_empty());
    }
}
