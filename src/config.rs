//! Model configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::device::DeviceSpec;
use crate::encoding::Encoding;
use crate::kv_cache::KvCacheConfig;

/// Default repository revision.
pub const DEFAULT_REVISION: &str = "main";

/// Configuration for a model to run inference on.
///
/// Created once per pipeline launch from user/CLI input with whatever fields
/// are known, then resolved in place by
/// [`ModelResolver::resolve`](crate::resolver::ModelResolver::resolve).
/// After a successful resolve the config is treated as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Repository id of the model to load.
    pub model_path: String,

    /// Paths of the weight files to use. Filled with repository defaults
    /// when empty.
    pub weight_paths: Vec<PathBuf>,

    /// Weight encoding. Inferred during resolution when unset.
    pub quantization_encoding: Option<Encoding>,

    /// Repository revision (branch or commit) to use.
    pub revision: String,

    /// Whether to allow custom modelling code from the repository.
    pub trust_remote_code: bool,

    /// Devices to run inference on. Populated from the device scanner when
    /// empty.
    pub device_specs: Vec<DeviceSpec>,

    /// KV cache configuration.
    pub kv_cache: KvCacheConfig,

    /// Repository the weight paths address when it differs from
    /// `model_path`. Set only by the resolver.
    #[serde(skip)]
    weights_repo_id: Option<String>,

    /// Quantization parameters read from the model config document. Set only
    /// by the resolver.
    #[serde(skip)]
    quant_config: Option<QuantizationConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            weight_paths: Vec::new(),
            quantization_encoding: None,
            revision: DEFAULT_REVISION.to_string(),
            trust_remote_code: false,
            device_specs: Vec::new(),
            kv_cache: KvCacheConfig::default(),
            weights_repo_id: None,
            quant_config: None,
        }
    }
}

impl ModelConfig {
    /// Config for a model repository, all other fields defaulted.
    pub fn new(model_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    /// Repository id the weight paths were addressed to, when the normalizer
    /// found one distinct from `model_path`.
    pub fn weights_repo_id(&self) -> Option<&str> {
        self.weights_repo_id.as_deref()
    }

    pub(crate) fn set_weights_repo_id(&mut self, repo_id: String) {
        self.weights_repo_id = Some(repo_id);
    }

    /// Quantization parameters, present after resolving a GPTQ model.
    pub fn quant_config(&self) -> Option<&QuantizationConfig> {
        self.quant_config.as_ref()
    }

    pub(crate) fn set_quant_config(&mut self, quant_config: QuantizationConfig) {
        self.quant_config = Some(quant_config);
    }
}

/// Quantization parameters for GPTQ-quantized models, read from the
/// repository's model config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizationConfig {
    pub quant_method: String,
    pub bits: u32,
    pub group_size: i64,
    pub desc_act: bool,
    pub sym: bool,
}
