//! Default weight file selection.

use crate::config::ModelConfig;
use crate::encoding::{Encoding, FORMAT_PREFERENCE};
use crate::error::{Error, Result};

use super::{ModelResolver, ResolveOptions};

/// Fill `weight_paths` with the repository defaults for the resolved
/// encoding. A no-op when the user already supplied paths.
pub(super) fn resolve_weight_paths(
    resolver: &ModelResolver,
    config: &mut ModelConfig,
    options: &ResolveOptions,
) -> Result<()> {
    let Some(encoding) = config.quantization_encoding else {
        return Err(Error::Internal(
            "weight path resolution requires a resolved encoding".into(),
        ));
    };

    if config.weight_paths.is_empty() {
        let repo = resolver.weights_repo(config);
        // A float request may be served by its losslessly castable sibling.
        let mut files = repo.files_for_encoding(encoding, encoding.alternate())?;

        if let Some(defaults) = files
            .remove(&options.default_weights_format)
            .filter(|found| !found.is_empty())
        {
            config.weight_paths = defaults;
        } else {
            for format in FORMAT_PREFERENCE {
                if let Some(found) = files.remove(&format).filter(|found| !found.is_empty()) {
                    config.weight_paths = found;
                    break;
                }
            }
        }
    }

    if config.weight_paths.is_empty() {
        let repo = resolver.weights_repo(config);
        if !matches!(encoding, Encoding::Bfloat16 | Encoding::Float32) {
            return Err(Error::InvalidConfiguration(format!(
                "compatible weights cannot be found for '{}' in 'gguf' format in the provided repo: '{}'. \
                 try a different quantization_encoding",
                encoding,
                repo.repo_id()
            )));
        }
        return Err(Error::InvalidConfiguration(format!(
            "compatible weights cannot be found for '{}'",
            encoding
        )));
    }
    Ok(())
}
