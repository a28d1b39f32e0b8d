//! Local weight cache collaborator.

use std::path::PathBuf;

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The file is present in the cache at this absolute path.
    Found(PathBuf),
    /// A prior lookup proved the file does not exist in the repository.
    /// Authoritative: callers must not fall back to a remote check.
    ConfirmedAbsent,
    /// The cache has no record of the file.
    Miss,
}

/// Local content cache for files downloaded from a registry.
pub trait WeightCache: Send + Sync {
    fn try_load(&self, repo_id: &str, filename: &str, revision: &str) -> CacheLookup;
}

/// [`WeightCache`] over the Hugging Face hub cache directory layout.
///
/// The hub cache records positive entries only, so lookups never report
/// [`CacheLookup::ConfirmedAbsent`].
pub struct HubCache {
    cache: hf_hub::Cache,
}

impl HubCache {
    /// Cache at the standard location (`$HF_HOME`, falling back to
    /// `~/.cache/huggingface`).
    pub fn new() -> Self {
        Self {
            cache: hf_hub::Cache::default(),
        }
    }

    /// Cache rooted at a custom directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            cache: hf_hub::Cache::new(root),
        }
    }
}

impl Default for HubCache {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightCache for HubCache {
    fn try_load(&self, repo_id: &str, filename: &str, revision: &str) -> CacheLookup {
        let repo = hf_hub::Repo::with_revision(
            repo_id.to_string(),
            hf_hub::RepoType::Model,
            revision.to_string(),
        );
        match self.cache.repo(repo).get(filename) {
            Some(path) => CacheLookup::Found(path),
            None => CacheLookup::Miss,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_misses() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = HubCache::with_root(dir.path().to_path_buf());
        assert_eq!(
            cache.try_load("acme/llama-x", "model.safetensors", "main"),
            CacheLookup::Miss
        );
    }
}
