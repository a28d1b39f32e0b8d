//! The configuration resolution pipeline.
//!
//! Resolution runs as an ordered sequence of stages over a working copy of
//! the [`ModelConfig`]:
//!
//! 1. Device validation and model-family overrides (`devices`)
//! 2. Weight path normalization and model path resolution (`normalize`)
//! 3. Encoding resolution, device compatibility, and encoding-specific
//!    finalization (`encoding`)
//! 4. Default weight file selection (`weights`)
//! 5. KV cache strategy selection (`strategy`)
//! 6. Final weight path consistency validation (`validate`)
//!
//! Later stages rely on values earlier stages produce; each stage checks its
//! own preconditions and fails with [`Error::Internal`] when called out of
//! order. A failure at any stage leaves the caller's config untouched.

mod devices;
mod encoding;
mod normalize;
mod strategy;
mod validate;
mod weights;

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::device::{DeviceScanner, HostDeviceScanner};
use crate::encoding::{Encoding, WeightsFormat};
use crate::error::{Error, Result};
use crate::kv_cache::KvCacheStrategy;
use crate::repo::cache::{HubCache, WeightCache};
use crate::repo::hub::HfRegistryClient;
use crate::repo::registry::{RegistryClient, RetryPolicy};
use crate::repo::{RepoType, Repository};

/// Architecture-level inputs to resolution.
#[derive(Clone)]
pub struct ResolveOptions {
    /// Encoding adopted when nothing stronger is discoverable.
    pub default_encoding: Encoding,
    /// Preferred serialization format for default weight selection.
    pub default_weights_format: WeightsFormat,
    /// Encodings the architecture supports, each with its cache strategies
    /// in preference order (first entry = preferred default).
    pub supported_encodings: HashMap<Encoding, Vec<KvCacheStrategy>>,
    /// Whether the architecture supports multi-GPU inference.
    pub multi_gpu_supported: bool,
}

impl ResolveOptions {
    pub fn new(default_encoding: Encoding, default_weights_format: WeightsFormat) -> Self {
        Self {
            default_encoding,
            default_weights_format,
            supported_encodings: HashMap::new(),
            multi_gpu_supported: true,
        }
    }

    /// Declare a supported encoding with its cache strategies in preference
    /// order.
    pub fn with_encoding(mut self, encoding: Encoding, strategies: Vec<KvCacheStrategy>) -> Self {
        self.supported_encodings.insert(encoding, strategies);
        self
    }

    /// Declared encodings in a stable order, for error messages.
    pub(crate) fn declared_encodings(&self) -> Vec<Encoding> {
        let mut encodings: Vec<Encoding> = self.supported_encodings.keys().copied().collect();
        encodings.sort();
        encodings
    }
}

/// Resolves [`ModelConfig`]s against local state and the model registry.
///
/// Holds the three collaborators resolution consults: a device scanner, a
/// registry client, and the local weight cache. Resolvers are cheap to share
/// and independent resolutions may run on parallel threads.
pub struct ModelResolver {
    devices: Arc<dyn DeviceScanner>,
    registry: Arc<dyn RegistryClient>,
    cache: Arc<dyn WeightCache>,
    retry: RetryPolicy,
}

impl ModelResolver {
    /// Resolver over the host devices, the Hugging Face registry, and the
    /// standard hub cache.
    pub fn new() -> Self {
        Self::with_collaborators(
            Arc::new(HostDeviceScanner),
            Arc::new(HfRegistryClient::new()),
            Arc::new(HubCache::new()),
        )
    }

    /// Resolver over custom collaborator implementations.
    pub fn with_collaborators(
        devices: Arc<dyn DeviceScanner>,
        registry: Arc<dyn RegistryClient>,
        cache: Arc<dyn WeightCache>,
    ) -> Self {
        Self {
            devices,
            registry,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy applied to registry queries.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate and resolve `config` in place.
    ///
    /// On success every resolution invariant holds: a non-empty model path,
    /// a non-empty locatable weight path list, a set encoding, and a cache
    /// strategy the encoding supports. On failure `config` is unchanged;
    /// callers must treat a failed resolution as non-recoverable for that
    /// launch attempt.
    pub fn resolve(&self, config: &mut ModelConfig, options: &ResolveOptions) -> Result<()> {
        let mut draft = config.clone();
        self.run(&mut draft, options)?;
        *config = draft;
        Ok(())
    }

    fn run(&self, config: &mut ModelConfig, options: &ResolveOptions) -> Result<()> {
        devices::validate(self, config, options)?;
        normalize::normalize_weight_paths(self, config)?;
        normalize::resolve_model_path(self, config)?;
        encoding::resolve_encoding(self, config, options)?;
        encoding::validate_device_compatibility(config, options)?;
        encoding::finalize_encoding_config(self, config)?;
        weights::resolve_weight_paths(self, config, options)?;
        strategy::resolve_cache_strategy(config, options)?;
        validate::validate_weight_paths(self, config)
    }

    /// Query surface over an arbitrary repository id.
    pub(crate) fn repo_at(&self, repo_id: &str, revision: &str) -> Repository {
        Repository::locate(
            repo_id,
            revision,
            Arc::clone(&self.registry),
            Arc::clone(&self.cache),
            self.retry,
        )
    }

    /// The repository weights are loaded from: the weights repo recorded
    /// during normalization when present, the model path otherwise.
    pub fn weights_repo(&self, config: &ModelConfig) -> Repository {
        let repo_id = config.weights_repo_id().unwrap_or(&config.model_path);
        self.repo_at(repo_id, &config.revision)
    }

    /// The repository the model itself lives in.
    pub(crate) fn model_repo(&self, config: &ModelConfig) -> Repository {
        self.repo_at(&config.model_path, &config.revision)
    }

    /// Total size in bytes of all weight files in `config`.
    ///
    /// Local locations are consulted first (direct path, then the download
    /// cache) to keep this off the network; online repositories fall back
    /// to registry size metadata.
    pub fn weights_size(&self, config: &ModelConfig) -> Result<u64> {
        let repo = self.weights_repo(config);
        let mut total = 0u64;
        for path in &config.weight_paths {
            if let Some(local) = repo.local_weight_path(path)? {
                total += std::fs::metadata(&local)?.len();
                continue;
            }
            match repo.repo_type() {
                RepoType::Local => {
                    return Err(Error::WeightNotFound(format!(
                        "weight file '{}' not found within the local repository path '{}'",
                        path.display(),
                        repo.repo_id()
                    )));
                }
                RepoType::Online => match repo.size_of(&path.to_string_lossy())? {
                    Some(size) => total += size,
                    None => {
                        return Err(Error::InvalidConfiguration(format!(
                            "failed to get size of weight file '{}' from repository '{}'",
                            path.display(),
                            repo.repo_id()
                        )));
                    }
                },
            }
        }
        Ok(total)
    }
}

impl Default for ModelResolver {
    fn default() -> Self {
        Self::new()
    }
}
