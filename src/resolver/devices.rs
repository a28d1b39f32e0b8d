//! Device validation and model-family overrides.

use crate::config::ModelConfig;
use crate::device::{DeviceSpec, DeviceType};
use crate::error::{Error, Result};

use super::{ModelResolver, ResolveOptions};

/// Confirm the requested device specs are available.
///
/// Runs before any path or registry work so an impossible device request
/// fails without a single network call.
pub(super) fn validate(
    resolver: &ModelResolver,
    config: &mut ModelConfig,
    options: &ResolveOptions,
) -> Result<()> {
    if config.device_specs.is_empty() {
        config.device_specs = resolver.devices.scan_available_devices();
    }

    if !resolver.devices.devices_exist(&config.device_specs) {
        let available = resolver.devices.scan_available_devices();
        return Err(Error::InvalidConfiguration(format!(
            "device specs provided ({}) do not exist. available devices: {}",
            format_specs(&config.device_specs),
            format_specs(&available)
        )));
    }

    if !options.multi_gpu_supported
        && config.device_specs.len() > 1
        && config.device_specs.first().map(|spec| spec.device_type) == Some(DeviceType::Gpu)
    {
        return Err(Error::InvalidConfiguration(format!(
            "multiple GPU inference is currently not supported for '{}'",
            config.model_path
        )));
    }

    // The replit family needs its custom modelling code; the stock config
    // parser rejects its attention layout otherwise.
    if config.model_path.to_lowercase().contains("replit") && !config.trust_remote_code {
        log::debug!(
            "forcing trust_remote_code for model '{}'",
            config.model_path
        );
        config.trust_remote_code = true;
    }

    Ok(())
}

fn format_specs(specs: &[DeviceSpec]) -> String {
    specs
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
