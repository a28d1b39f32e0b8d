//! Final weight path consistency validation.

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::repo::RepoType;

use super::ModelResolver;

/// Confirm every resolved weight path is locatable, locally or remotely.
///
/// Runs last, after the weight path list is guaranteed non-empty, so a
/// config that resolves successfully never names a weight file nothing can
/// load.
pub(super) fn validate_weight_paths(resolver: &ModelResolver, config: &ModelConfig) -> Result<()> {
    if config.weight_paths.is_empty() {
        return Err(Error::Internal(
            "final validation requires a non-empty weight path list".into(),
        ));
    }

    let repo = resolver.weights_repo(config);
    for path in &config.weight_paths {
        if repo.local_weight_path(path)?.is_some() {
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
            RepoType::Online => {
                let name = path.to_string_lossy();
                if !repo.file_exists(&name)? {
                    return Err(Error::InvalidConfiguration(format!(
                        "weight path '{}' does not exist locally or in cache, \
                         and '{}/{}' does not exist on the registry",
                        name,
                        repo.repo_id(),
                        name
                    )));
                }
            }
        }
    }
    Ok(())
}
