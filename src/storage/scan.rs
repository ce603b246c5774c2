// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Partition sets and map scan iteration

use std::sync::Arc;

use super::map::MapContainer;
use crate::core::{Error, Result, Value};

/// Sorted, deduplicated set of partition ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PartitionIdSet {
    ids: Vec<u32>,
}

impl PartitionIdSet {
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut ids: Vec<u32> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    /// Partitions `0..count`
    pub fn range(count: u32) -> Self {
        Self {
            ids: (0..count).collect(),
        }
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }
}

/// Cursor over the entries of selected map partitions
///
/// Partitions are visited in ascending id order. Ids the map does not own are
/// skipped. `key()` and `value()` are valid after `try_advance()` returned
/// true.
#[derive(Debug)]
pub struct MapScanIterator {
    map: Arc<MapContainer>,
    parts: Vec<u32>,
    part_pos: usize,
    entry_pos: usize,
    positioned: bool,
}

impl MapScanIterator {
    pub fn new(map: Arc<MapContainer>, parts: &PartitionIdSet) -> Self {
        let owned = map.partition_count();
        Self {
            parts: parts.iter().filter(|&p| p < owned).collect(),
            map,
            part_pos: 0,
            entry_pos: 0,
            positioned: false,
        }
    }

    /// Move to the next entry, returning false once all partitions are exhausted
    pub fn try_advance(&mut self) -> bool {
        if self.positioned {
            self.entry_pos += 1;
        }
        while let Some(&part) = self.parts.get(self.part_pos) {
            if self.entry_pos < self.map.partition(part).len() {
                self.positioned = true;
                return true;
            }
            self.part_pos += 1;
            self.entry_pos = 0;
        }
        self.positioned = false;
        false
    }

    fn current(&self) -> Result<&(Value, Value)> {
        if !self.positioned {
            return Err(Error::internal("map scan iterator is not positioned"));
        }
        self.parts
            .get(self.part_pos)
            .and_then(|&p| self.map.partition(p).get(self.entry_pos))
            .ok_or_else(|| Error::internal("map scan iterator is out of range"))
    }

    /// Key of the current entry
    pub fn key(&self) -> Result<Value> {
        self.current().map(|(k, _)| k.clone())
    }

    /// Value of the current entry
    pub fn value(&self) -> Result<Value> {
        self.current().map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(n: i32, partitions: u32) -> Arc<MapContainer> {
        let mut map = MapContainer::with_partitions("m", partitions);
        for i in 0..n {
            map.put(i, i + 100);
        }
        Arc::new(map)
    }

    #[test]
    fn test_partition_id_set() {
        let set = PartitionIdSet::new([3, 1, 3, 2]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(set.contains(2));
        assert!(!set.contains(0));
    }

    #[test]
    fn test_iterate_all_partitions() {
        let map = map_of(50, 7);
        let mut iter = MapScanIterator::new(Arc::clone(&map), &map.all_partitions());
        let mut keys = Vec::new();
        while iter.try_advance() {
            keys.push(iter.key().unwrap());
            let v = iter.value().unwrap();
            assert!(matches!(v, Value::Int(x) if x >= 100));
        }
        assert_eq!(keys.len(), 50);
        assert!(!iter.try_advance());
        assert!(iter.key().is_err());
    }

    #[test]
    fn test_iterate_subset() {
        let map = map_of(50, 4);
        let parts = PartitionIdSet::new([1, 9]);
        let mut iter = MapScanIterator::new(Arc::clone(&map), &parts);
        let mut count = 0;
        while iter.try_advance() {
            assert_eq!(map.partition_of(&iter.key().unwrap()), 1);
            count += 1;
        }
        assert_eq!(count, map.partition(1).len());
    }
}
