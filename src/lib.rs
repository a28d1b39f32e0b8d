//! Bramble - model configuration resolution for local LLM inference.
//!
//! Given a possibly partial [`ModelConfig`], resolution settles the concrete
//! weight files, quantization encoding, and KV cache strategy to use,
//! reconciling user input against the local filesystem, the download cache,
//! and a remote model registry.

pub mod config;
pub mod device;
pub mod encoding;
pub mod error;
pub mod kv_cache;
pub mod repo;
pub mod resolver;

pub use error::{Error, Result};

pub use config::{ModelConfig, QuantizationConfig, DEFAULT_REVISION};
pub use device::{DeviceScanner, DeviceSpec, DeviceType, HostDeviceScanner};
pub use encoding::{weights_format, Encoding, WeightsFormat};
pub use kv_cache::{KvCacheConfig, KvCacheStrategy};

pub use repo::cache::{CacheLookup, HubCache, WeightCache};
pub use repo::hub::HfRegistryClient;
pub use repo::registry::{RegistryClient, RegistryError, RetryPolicy};
pub use repo::{RepoType, Repository};

pub use resolver::{ModelResolver, ResolveOptions};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
