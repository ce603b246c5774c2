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

//! Partitioned in-memory maps

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHasher};

use super::scan::PartitionIdSet;
use crate::core::{Error, Result, Value};

/// Default number of partitions for new maps
pub const DEFAULT_PARTITION_COUNT: u32 = 271;

/// A named key/value map split into partitions
///
/// Entries are assigned to partitions by a stable hash of the key. Within a
/// partition entries keep insertion order, and `put` on an existing key
/// replaces the value in place.
#[derive(Debug, Clone)]
pub struct MapContainer {
    name: String,
    partitions: Vec<Vec<(Value, Value)>>,
    len: usize,
}

impl MapContainer {
    /// Create a map with [`DEFAULT_PARTITION_COUNT`] partitions
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_partitions(name, DEFAULT_PARTITION_COUNT)
    }

    /// Create a map with the given number of partitions (at least one)
    pub fn with_partitions(name: impl Into<String>, partition_count: u32) -> Self {
        let count = partition_count.max(1) as usize;
        Self {
            name: name.into(),
            partitions: vec![Vec::new(); count],
            len: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Partition that owns a key
    pub fn partition_of(&self, key: &Value) -> u32 {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() % self.partitions.len() as u64) as u32
    }

    /// Insert or replace an entry, returning the previous value
    pub fn put(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let partition = self.partition_of(&key) as usize;
        let entries = &mut self.partitions[partition];
        if let Some(entry) = entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(&mut entry.1, value));
        }
        entries.push((key, value));
        self.len += 1;
        None
    }

    /// Look up the value of a key
    pub fn get(&self, key: &Value) -> Option<&Value> {
        let partition = self.partition_of(key) as usize;
        self.partitions[partition]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Entries of one partition
    pub fn partition(&self, id: u32) -> &[(Value, Value)] {
        self.partitions
            .get(id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Set of every partition of this map
    pub fn all_partitions(&self) -> PartitionIdSet {
        PartitionIdSet::range(self.partition_count())
    }
}

/// Registry of maps addressed by name
#[derive(Debug, Clone, Default)]
pub struct Storage {
    maps: FxHashMap<String, Arc<MapContainer>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a map under its own name, replacing any previous one
    pub fn register(&mut self, map: MapContainer) -> Arc<MapContainer> {
        let map = Arc::new(map);
        self.maps.insert(map.name().to_string(), Arc::clone(&map));
        map
    }

    pub fn map(&self, name: &str) -> Result<Arc<MapContainer>> {
        self.maps
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MapNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let mut map = MapContainer::with_partitions("m", 4);
        assert_eq!(map.put(1, "a"), None);
        assert_eq!(map.put(2, "b"), None);
        assert_eq!(map.put(1, "c"), Some(Value::varchar("a")));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::Int(1)), Some(&Value::varchar("c")));
        assert_eq!(map.get(&Value::Int(3)), None);
    }

    #[test]
    fn test_partitioning_is_stable() {
        let mut map = MapContainer::with_partitions("m", 8);
        for i in 0..100 {
            map.put(i, i * 2);
        }
        let total: usize = (0..map.partition_count())
            .map(|p| map.partition(p).len())
            .sum();
        assert_eq!(total, 100);
        for p in 0..map.partition_count() {
            for (k, _) in map.partition(p) {
                assert_eq!(map.partition_of(k), p);
            }
        }
    }

    #[test]
    fn test_storage_lookup() {
        let mut storage = Storage::new();
        storage.register(MapContainer::new("people"));
        assert!(storage.map("people").is_ok());
        assert_eq!(
            storage.map("orders").unwrap_err(),
            Error::MapNotFound("orders".to_string())
        );
    }
}
