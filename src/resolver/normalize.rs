//! Weight path normalization and model path resolution.

use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::error::{Error, Result};

use super::ModelResolver;

/// Rewrite raw weight paths into repository-relative form.
///
/// Weight references are commonly given as `org/repo/file.ext` strings that
/// embed a repository id without a separate field. When the embedded id
/// matches the model path it is stripped; when it names a different
/// repository that confirms the file, the id is recorded as the weights
/// repo and stripped. Misreading these silently would load weights from the
/// wrong repository.
pub(super) fn normalize_weight_paths(
    resolver: &ModelResolver,
    config: &mut ModelConfig,
) -> Result<()> {
    let mut normalized = Vec::with_capacity(config.weight_paths.len());
    for path in std::mem::take(&mut config.weight_paths) {
        // Already on disk: keep untouched.
        if path.is_file() {
            normalized.push(path);
            continue;
        }

        let text = path.to_string_lossy().to_string();
        let pieces: Vec<&str> = text.split('/').collect();
        if pieces.len() >= 3 {
            let candidate = format!("{}/{}", pieces[0], pieces[1]);
            let remainder = pieces[2..].join("/");

            if !config.model_path.is_empty() && candidate == config.model_path {
                normalized.push(PathBuf::from(remainder));
                continue;
            }

            if resolver
                .repo_at(&candidate, &config.revision)
                .file_exists(&remainder)?
            {
                log::debug!("weight path '{}' addresses repository '{}'", text, candidate);
                config.set_weights_repo_id(candidate);
                normalized.push(PathBuf::from(remainder));
                continue;
            }
        } else if config.model_path.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "unable to derive a model path from weight path '{}', please provide a valid repository id",
                text
            )));
        }

        normalized.push(path);
    }
    config.weight_paths = normalized;
    Ok(())
}

/// Ensure a usable model path once weight paths are settled.
///
/// Without weight paths the model path is the only source of weights and
/// must name an existing repository. Without a model path, the repository
/// recorded during normalization stands in for it.
pub(super) fn resolve_model_path(resolver: &ModelResolver, config: &mut ModelConfig) -> Result<()> {
    if config.weight_paths.is_empty() {
        if config.model_path.is_empty() {
            return Err(Error::InvalidConfiguration(
                "model_path must be provided and must be a valid model repository".into(),
            ));
        }
        if !Path::new(&config.model_path).exists() && !resolver.model_repo(config).exists()? {
            return Err(Error::InvalidConfiguration(format!(
                "'{}' is not a valid model repository",
                config.model_path
            )));
        }
    } else if config.model_path.is_empty() {
        match config.weights_repo_id() {
            Some(repo_id) => config.model_path = repo_id.to_string(),
            None => {
                return Err(Error::InvalidConfiguration(
                    "unable to derive a model path from the provided weight paths".into(),
                ));
            }
        }
    }
    Ok(())
}
