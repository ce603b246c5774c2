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

//! Compiler manager
//!
//! Entry point used by the query runner. Partitions a plan, compiles every
//! fragment and bundles the units into a [`CompiledFragmentTemplate`].
//! Compiled unit types are cached by their content-addressed name, so
//! structurally identical fragments are compiled once. A cached entry keeps
//! the source it was compiled from and only serves requests with that exact
//! source, so two fragments whose hashes collide never share a unit.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use super::config::CompilerConfig;
use super::driver::{compile_generated, FragmentCompiler, GeneratedUnit};
use super::partition::partition;
use super::runtime::{CompiledFragmentTemplate, CompiledUnitType};
use crate::core::Result;
use crate::plan::PlanTree;

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Compiled unit together with the source it was compiled from
struct CachedUnit {
    source: String,
    unit: Arc<CompiledUnitType>,
}

pub struct CompilerManager {
    config: CompilerConfig,
    cache: Mutex<LruCache<String, CachedUnit>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CompilerManager {
    pub fn new(config: CompilerConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Template for a plan, or `None` when nothing can be compiled.
    /// Failures are logged and yield `None`.
    pub fn template(&self, tree: &PlanTree) -> Option<Arc<CompiledFragmentTemplate>> {
        match self.try_template(tree) {
            Ok(template) => template,
            Err(e) => {
                tracing::warn!(error = %e, "plan compilation failed, falling back to interpretation");
                if let Some(source) = e.compilation_source() {
                    tracing::debug!("rejected source:\n{}", source);
                }
                None
            }
        }
    }

    /// Template for a plan; `Ok(None)` when compilation is disabled or the
    /// plan has no compilable fragment
    #[tracing::instrument(level = "debug", skip(self, tree), fields(nodes = tree.len()))]
    pub fn try_template(&self, tree: &PlanTree) -> Result<Option<Arc<CompiledFragmentTemplate>>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let fragments = partition(tree)?;
        if fragments.is_empty() {
            tracing::debug!("no compilable fragment");
            return Ok(None);
        }

        let mut units = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            let generated = FragmentCompiler::new(fragment)
                .with_log_source(self.config.log_source)
                .generate()?;
            units.push(self.unit_for(&generated)?);
        }
        let template =
            CompiledFragmentTemplate::new(units, self.config.effective_batch_size())?;
        tracing::debug!(units = template.units().len(), "created fragment template");
        Ok(Some(Arc::new(template)))
    }

    fn unit_for(&self, generated: &GeneratedUnit) -> Result<Arc<CompiledUnitType>> {
        if let Some(entry) = self.cache.lock().get(&generated.qualified_name) {
            if entry.source == generated.source {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(unit = %generated.qualified_name, "compiled unit cache hit");
                return Ok(Arc::clone(&entry.unit));
            }
            tracing::warn!(
                unit = %generated.qualified_name,
                "unit name collision with different source, recompiling"
            );
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let unit = compile_generated(generated)?;
        self.cache.lock().put(
            generated.qualified_name.clone(),
            CachedUnit {
                source: generated.source.clone(),
                unit: Arc::clone(&unit),
            },
        );
        Ok(unit)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.lock().len(),
        }
    }

    /// Drop every cached unit type
    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

impl Default for CompilerManager {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl std::fmt::Debug for CompilerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerManager")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::plan::{MapScanNode, PlanBuilder, PlanNodeKind, QueryPath, TopObjectDescriptor};

    fn plan(path: &str) -> PlanTree {
        let mut b = PlanBuilder::new();
        b.add(
            1,
            PlanNodeKind::MapScan(MapScanNode {
                map_name: "m".to_string(),
                key_descriptor: TopObjectDescriptor::Scalar(DataType::Int),
                value_descriptor: TopObjectDescriptor::class("Point"),
                field_paths: vec![QueryPath::value_field(path)],
                field_types: vec![DataType::Int],
                projects: vec![0],
                filter: None,
            }),
            &[],
        )
        .unwrap();
        b.add(2, PlanNodeKind::Root, &[1]).unwrap();
        b.build(2).unwrap()
    }

    #[test]
    fn test_cache_hits_for_identical_shapes() {
        let manager = CompilerManager::default();
        let first = manager.template(&plan("x")).unwrap();
        let second = manager.template(&plan("x")).unwrap();
        assert!(Arc::ptr_eq(&first.units()[0], &second.units()[0]));
        assert_eq!(
            manager.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );

        manager.template(&plan("y")).unwrap();
        assert_eq!(manager.stats().entries, 2);
        manager.clear();
        assert_eq!(manager.stats().entries, 0);
    }

    #[test]
    fn test_disabled_and_uncompilable() {
        let manager = CompilerManager::new(CompilerConfig::disabled());
        assert!(manager.template(&plan("x")).is_none());

        let manager = CompilerManager::default();
        assert!(manager.try_template(&plan("a.b")).unwrap().is_none());
    }

    fn generated(path: &str) -> GeneratedUnit {
        let fragments = partition(&plan(path)).unwrap();
        FragmentCompiler::new(&fragments[0]).generate().unwrap()
    }

    #[test]
    fn test_name_collision_with_different_source_recompiles() {
        let manager = CompilerManager::default();
        let x = generated("x");
        let y = generated("y");
        assert_ne!(x.qualified_name, y.qualified_name);

        // Same name as x, body of y
        let collider = GeneratedUnit {
            name: x.name.clone(),
            qualified_name: x.qualified_name.clone(),
            source: y.source.replace(&y.name, &x.name),
        };
        assert_ne!(collider.source, x.source);

        let original = manager.unit_for(&x).unwrap();
        let colliding = manager.unit_for(&collider).unwrap();
        assert!(!Arc::ptr_eq(&original, &colliding));
        assert_eq!(manager.stats().hits, 0);
        assert_eq!(manager.stats().misses, 2);

        // The entry now holds the colliding source, so x compiles again
        let again = manager.unit_for(&x).unwrap();
        assert!(!Arc::ptr_eq(&again, &colliding));
        assert_eq!(manager.stats().misses, 3);
        assert!(Arc::ptr_eq(&manager.unit_for(&x).unwrap(), &again));
        assert_eq!(manager.stats().hits, 1);
        assert_eq!(manager.stats().entries, 1);
    }

    #[test]
    fn test_capacity_evicts() {
        let manager = CompilerManager::new(CompilerConfig::new().with_cache_capacity(1));
        manager.template(&plan("x")).unwrap();
        manager.template(&plan("y")).unwrap();
        manager.template(&plan("x")).unwrap();
        assert_eq!(manager.stats().misses, 3);
        assert_eq!(manager.stats().entries, 1);
    }
}
