//! Key-value cache strategy and configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Policy governing how attention key/value state is stored and reused
/// across decoding steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvCacheStrategy {
    /// Defer to the default strategy of the requested architecture
    ModelDefault,
    Naive,
    Continuous,
    Paged,
}

impl fmt::Display for KvCacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelDefault => write!(f, "model_default"),
            Self::Naive => write!(f, "naive"),
            Self::Continuous => write!(f, "continuous"),
            Self::Paged => write!(f, "paged"),
        }
    }
}

/// KV cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvCacheConfig {
    /// The cache strategy to use. `model_default` selects the preferred
    /// strategy for the architecture during resolution.
    pub cache_strategy: KvCacheStrategy,
    /// Number of tokens in a single page of the paged cache.
    pub page_size: u32,
    /// Whether to enable prefix caching for the paged cache.
    pub enable_prefix_caching: bool,
    /// Whether to swap paged cache blocks to host memory on eviction.
    pub enable_swapping_to_host: bool,
    /// Host memory reserved for swapped cache blocks, in GiB.
    pub host_swap_space_gb: f64,
    /// Fraction of available device memory the cache workspace may consume.
    pub device_memory_utilization: f64,
}

impl Default for KvCacheConfig {
    fn default() -> Self {
        Self {
            cache_strategy: KvCacheStrategy::ModelDefault,
            page_size: 128,
            enable_prefix_caching: false,
            enable_swapping_to_host: false,
            host_swap_space_gb: 50.0,
            device_memory_utilization: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_display() {
        assert_eq!(KvCacheStrategy::ModelDefault.to_string(), "model_default");
        assert_eq!(KvCacheStrategy::Paged.to_string(), "paged");
    }

    #[test]
    fn test_config_defaults() {
        let config = KvCacheConfig::default();
        assert_eq!(config.cache_strategy, KvCacheStrategy::ModelDefault);
        assert_eq!(config.page_size, 128);
        assert!(!config.enable_prefix_caching);
    }
}
