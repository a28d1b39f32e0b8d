//! Quantization encoding resolution.

use crate::config::{ModelConfig, QuantizationConfig};
use crate::device::DeviceType;
use crate::encoding::{weights_format, Encoding, WeightsFormat};
use crate::error::{Error, Result};

use super::{ModelResolver, ResolveOptions};

/// Settle `quantization_encoding`.
///
/// Explicit user input wins when consistent with the weight files; weight
/// file metadata decides when the user gave none; repository-level discovery
/// and the accelerator default are the last resort. Pytorch checkpoints are
/// exempt from the file checks entirely: their containers carry no encoding
/// tag to validate against.
pub(super) fn resolve_encoding(
    resolver: &ModelResolver,
    config: &mut ModelConfig,
    options: &ResolveOptions,
) -> Result<()> {
    let format = weights_format(&config.weight_paths);
    let inspectable = !config.weight_paths.is_empty() && format != Some(WeightsFormat::Pytorch);

    if inspectable && config.quantization_encoding.is_some() {
        validate_explicit_encoding(resolver, config)?;
    } else if inspectable && config.quantization_encoding.is_none() {
        infer_encoding_from_weights(resolver, config)?;
    } else if config.quantization_encoding.is_none() {
        adopt_repository_default(resolver, config, options)?;
    }
    Ok(())
}

/// The encoding tagged on the first weight file must agree with the one the
/// user asked for.
fn validate_explicit_encoding(resolver: &ModelResolver, config: &ModelConfig) -> Result<()> {
    let Some(encoding) = config.quantization_encoding else {
        return Err(Error::Internal(
            "explicit encoding validation requires a set encoding".into(),
        ));
    };
    let Some(first) = config.weight_paths.first() else {
        return Err(Error::Internal(
            "explicit encoding validation requires weight paths".into(),
        ));
    };

    let file_encoding = if first.exists() {
        first
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(Encoding::parse_from_file_name)
    } else {
        resolver
            .weights_repo(config)
            .encoding_for_file(&first.to_string_lossy())?
    };

    if let Some(file_encoding) = file_encoding {
        if file_encoding != encoding {
            return Err(Error::InvalidConfiguration(format!(
                "weight path provided '{}' has an inconsistent encoding '{}' \
                 with the quantization_encoding provided '{}'. please update one",
                first.display(),
                file_encoding,
                encoding
            )));
        }
    }
    Ok(())
}

/// Infer the encoding from the first weight file.
fn infer_encoding_from_weights(resolver: &ModelResolver, config: &mut ModelConfig) -> Result<()> {
    let Some(first) = config.weight_paths.first().cloned() else {
        return Err(Error::Internal(
            "encoding inference requires weight paths".into(),
        ));
    };

    let inferred = if first.exists() {
        if first.extension().and_then(|ext| ext.to_str()) == Some("safetensors") {
            // A bare safetensors container carries no encoding tag.
            return Err(Error::InvalidConfiguration(
                "if a local safetensors file is provided, please provide a quantization_encoding"
                    .into(),
            ));
        }
        first
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(Encoding::parse_from_file_name)
    } else {
        resolver
            .weights_repo(config)
            .encoding_for_file(&first.to_string_lossy())?
    };

    match inferred {
        Some(encoding) => {
            log::debug!("encoding inferred from weights file: {}", encoding);
            config.quantization_encoding = Some(encoding);
            Ok(())
        }
        None => Err(Error::InvalidConfiguration(format!(
            "encoding cannot be inferred from weights file '{}', please pass a quantization_encoding explicitly",
            first.display()
        ))),
    }
}

/// Pick an encoding from what the repository declares.
fn adopt_repository_default(
    resolver: &ModelResolver,
    config: &mut ModelConfig,
    options: &ResolveOptions,
) -> Result<()> {
    let supported = resolver.weights_repo(config).supported_encodings()?;

    if supported.len() == 1 {
        log::debug!(
            "repository only has '{}' weights, using '{}'",
            supported[0],
            supported[0]
        );
        config.quantization_encoding = Some(supported[0]);
    } else if config
        .device_specs
        .iter()
        .any(|spec| spec.device_type != DeviceType::Cpu)
        && supported.contains(&Encoding::Bfloat16)
    {
        // Accelerator default: reduced precision when nothing else decides.
        config.quantization_encoding = Some(Encoding::Bfloat16);
    } else {
        log::debug!(
            "encoding not provided, using default encoding of {}",
            options.default_encoding
        );
        config.quantization_encoding = Some(options.default_encoding);
    }
    Ok(())
}

/// Reject device/encoding pairings the encoding cannot run on.
pub(super) fn validate_device_compatibility(
    config: &ModelConfig,
    options: &ResolveOptions,
) -> Result<()> {
    let Some(encoding) = config.quantization_encoding else {
        return Err(Error::Internal(
            "device compatibility check requires a resolved encoding".into(),
        ));
    };
    for spec in &config.device_specs {
        if !encoding.supported_on(spec) {
            let alternatives = options
                .declared_encodings()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::InvalidConfiguration(format!(
                "the encoding '{}' is not compatible with the selected device type '{}'. \
                 use a different device, or one of the encodings available for this model: {}",
                encoding, spec.device_type, alternatives
            )));
        }
    }
    Ok(())
}

/// Read quantization parameters for encodings that need model-config input.
pub(super) fn finalize_encoding_config(
    resolver: &ModelResolver,
    config: &mut ModelConfig,
) -> Result<()> {
    if config.quantization_encoding != Some(Encoding::Gptq) {
        return Ok(());
    }

    let repo = resolver.model_repo(config);
    let Some(document) = repo.model_config()? else {
        return Err(Error::InvalidConfiguration(format!(
            "no model config found for GPTQ repository '{}'",
            config.model_path
        )));
    };

    if document.get("torch_dtype").and_then(|value| value.as_str()) != Some("float16") {
        return Err(Error::InvalidConfiguration(
            "bfloat16 scales are not supported for GPTQ-quantized models".into(),
        ));
    }

    let Some(section) = document.get("quantization_config") else {
        return Err(Error::InvalidConfiguration(format!(
            "GPTQ repository '{}' declares no quantization_config",
            config.model_path
        )));
    };
    let quant_config: QuantizationConfig =
        serde_json::from_value(section.clone()).map_err(|err| {
            Error::InvalidConfiguration(format!(
                "malformed quantization_config in '{}': {}",
                config.model_path, err
            ))
        })?;
    config.set_quant_config(quant_config);
    Ok(())
}
