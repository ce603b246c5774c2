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

//! Compiler configuration

/// Default batch capacity of compiled and interpreted executors
pub const DEFAULT_BATCH_SIZE: usize = crate::executor::DEFAULT_BATCH_SIZE;

/// Default number of compiled unit types kept by the manager
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Configuration of the fragment compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Whether plans are compiled at all
    /// Default: true
    pub enabled: bool,

    /// Rows per batch; 0 is treated as 1
    /// Default: 1024
    pub batch_size: usize,

    /// Compiled unit types retained in the cache; 0 is treated as 1
    /// Default: 256
    pub cache_capacity: usize,

    /// Trace generated source
    /// Default: false
    pub log_source: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            log_source: false,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpret every plan
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    pub fn with_log_source(mut self, log_source: bool) -> Self {
        self.log_source = log_source;
        self
    }

    /// Batch size clamped to at least one row
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.batch_size, 1024);
        assert_eq!(config.cache_capacity, 256);
        assert!(!config.log_source);
        assert!(!CompilerConfig::disabled().enabled);
    }

    #[test]
    fn test_clamping() {
        let config = CompilerConfig::new().with_batch_size(0).with_cache_capacity(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.cache_capacity, 1);

        let raw = CompilerConfig {
            batch_size: 0,
            ..CompilerConfig::default()
        };
        assert_eq!(raw.effective_batch_size(), 1);
    }
}
