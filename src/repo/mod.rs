//! Model weight repositories.
//!
//! A repository is a named source of model weights, either a local directory
//! or an entry on a remote registry. [`Repository`] exposes the same
//! existence/size/encoding queries over both: local repositories answer
//! purely from the filesystem, online repositories answer through the
//! [`RegistryClient`] collaborator with bounded retry.

pub mod cache;
pub mod hub;
pub mod registry;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::encoding::{Encoding, WeightsFormat};
use crate::error::{Error, Result};
use self::cache::{CacheLookup, WeightCache};
use self::registry::{with_retry, RegistryClient, RegistryError, RetryPolicy};

/// Classification of a repository source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoType {
    Local,
    Online,
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Online => write!(f, "online"),
        }
    }
}

enum Source {
    Local(PathBuf),
    Online,
}

/// A model weight repository addressed by id and revision.
pub struct Repository {
    repo_id: String,
    revision: String,
    source: Source,
    registry: Arc<dyn RegistryClient>,
    cache: Arc<dyn WeightCache>,
    retry: RetryPolicy,
}

impl Repository {
    /// Classify `repo_id` and build the query surface over it.
    ///
    /// An id naming an existing local directory is a local repository;
    /// anything else is treated as an online registry entry.
    pub fn locate(
        repo_id: &str,
        revision: &str,
        registry: Arc<dyn RegistryClient>,
        cache: Arc<dyn WeightCache>,
        retry: RetryPolicy,
    ) -> Repository {
        let path = Path::new(repo_id);
        let source = if path.is_dir() {
            Source::Local(path.to_path_buf())
        } else {
            Source::Online
        };
        Repository {
            repo_id: repo_id.to_string(),
            revision: revision.to_string(),
            source,
            registry,
            cache,
            retry,
        }
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn repo_type(&self) -> RepoType {
        match self.source {
            Source::Local(_) => RepoType::Local,
            Source::Online => RepoType::Online,
        }
    }

    /// Whether the repository itself exists.
    pub fn exists(&self) -> Result<bool> {
        match &self.source {
            Source::Local(_) => Ok(true),
            Source::Online => self.query("repository existence", || {
                self.registry.repo_exists(&self.repo_id, &self.revision)
            }),
        }
    }

    /// Whether `filename` exists in the repository.
    pub fn file_exists(&self, filename: &str) -> Result<bool> {
        match &self.source {
            Source::Local(root) => Ok(root.join(filename).is_file()),
            Source::Online => self.query("weight file existence", || {
                self.registry
                    .file_exists(&self.repo_id, &self.revision, filename)
            }),
        }
    }

    /// Size of `filename` in bytes, when known.
    pub fn size_of(&self, filename: &str) -> Result<Option<u64>> {
        match &self.source {
            Source::Local(root) => {
                let path = root.join(filename);
                if path.is_file() {
                    Ok(Some(std::fs::metadata(&path)?.len()))
                } else {
                    Ok(None)
                }
            }
            Source::Online => self.query("weight file size", || {
                self.registry.size_of(&self.repo_id, &self.revision, filename)
            }),
        }
    }

    /// Encoding of `filename`, when one can be determined.
    pub fn encoding_for_file(&self, filename: &str) -> Result<Option<Encoding>> {
        match &self.source {
            Source::Local(_) => Ok(Encoding::parse_from_file_name(filename)),
            Source::Online => self.query("weight file encoding", || {
                self.registry
                    .encoding_for_file(&self.repo_id, &self.revision, filename)
            }),
        }
    }

    /// Weight files grouped by serialization format for `encoding`, falling
    /// back to `alternate` when the requested encoding has no files.
    pub fn files_for_encoding(
        &self,
        encoding: Encoding,
        alternate: Option<Encoding>,
    ) -> Result<HashMap<WeightsFormat, Vec<PathBuf>>> {
        match &self.source {
            Source::Local(root) => Ok(index_files_for_encoding(
                &local_files(root)?,
                encoding,
                alternate,
            )),
            Source::Online => self.query("weight file index", || {
                self.registry
                    .files_for_encoding(&self.repo_id, &self.revision, encoding, alternate)
            }),
        }
    }

    /// Encodings the repository carries weights for.
    pub fn supported_encodings(&self) -> Result<Vec<Encoding>> {
        match &self.source {
            Source::Local(root) => Ok(encodings_present(&local_files(root)?)),
            Source::Online => self.query("supported encodings", || {
                self.registry.supported_encodings(&self.repo_id, &self.revision)
            }),
        }
    }

    /// The repository's model configuration document, when present.
    pub fn model_config(&self) -> Result<Option<serde_json::Value>> {
        match &self.source {
            Source::Local(root) => {
                let path = root.join("config.json");
                if !path.is_file() {
                    return Ok(None);
                }
                let content = std::fs::read_to_string(&path)?;
                let document = serde_json::from_str(&content).map_err(|err| {
                    Error::InvalidConfiguration(format!(
                        "malformed config.json in '{}': {}",
                        self.repo_id, err
                    ))
                })?;
                Ok(Some(document))
            }
            Source::Online => self.query("model config", || {
                self.registry.model_config(&self.repo_id, &self.revision)
            }),
        }
    }

    /// Check common local locations for a weight file and return its
    /// absolute path if found.
    ///
    /// The direct path is checked first even for online repositories,
    /// because callers may hand us absolute paths for files already
    /// downloaded. After that, online repositories consult the local
    /// download cache only; a cached confirmed-absent entry is authoritative
    /// and fails with [`Error::WeightNotFound`] rather than falling through
    /// to a remote check.
    pub fn local_weight_path(&self, relative: &Path) -> Result<Option<PathBuf>> {
        if relative.is_file() {
            return Ok(Some(relative.canonicalize()?));
        }
        match &self.source {
            Source::Local(_) => Ok(None),
            Source::Online => {
                let filename = relative.to_string_lossy();
                match self.cache.try_load(&self.repo_id, &filename, &self.revision) {
                    CacheLookup::Found(path) => Ok(Some(path)),
                    CacheLookup::ConfirmedAbsent => Err(Error::WeightNotFound(format!(
                        "'{}' is recorded as non-existent in the local cache for '{}'",
                        relative.display(),
                        self.repo_id
                    ))),
                    CacheLookup::Miss => Ok(None),
                }
            }
        }
    }

    fn query<T>(
        &self,
        what: &str,
        call: impl FnMut() -> std::result::Result<T, RegistryError>,
    ) -> Result<T> {
        with_retry(&self.retry, what, call).map_err(|err| {
            Error::InvalidConfiguration(format!(
                "{} query for '{}' failed: {}",
                what, self.repo_id, err
            ))
        })
    }
}

/// Top-level files of a local repository directory, as full paths.
fn local_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Group `files` by serialization format, keeping those tagged with
/// `encoding`; when nothing matches, retry with `alternate`.
pub(crate) fn index_files_for_encoding(
    files: &[PathBuf],
    encoding: Encoding,
    alternate: Option<Encoding>,
) -> HashMap<WeightsFormat, Vec<PathBuf>> {
    let index = index_for(files, encoding);
    if index.is_empty() {
        if let Some(alternate) = alternate {
            return index_for(files, alternate);
        }
    }
    index
}

fn index_for(files: &[PathBuf], encoding: Encoding) -> HashMap<WeightsFormat, Vec<PathBuf>> {
    let mut index: HashMap<WeightsFormat, Vec<PathBuf>> = HashMap::new();
    for file in files {
        let Some(format) = WeightsFormat::from_path(file) else {
            continue;
        };
        let name = file.file_name().and_then(|name| name.to_str()).unwrap_or("");
        if Encoding::parse_from_file_name(name) == Some(encoding) {
            index.entry(format).or_default().push(file.clone());
        }
    }
    // Sharded sets must stay in order.
    for files in index.values_mut() {
        files.sort();
    }
    index
}

/// Distinct encodings tagged across `files`, in a stable order.
pub(crate) fn encodings_present(files: &[PathBuf]) -> Vec<Encoding> {
    let mut encodings: Vec<Encoding> = files
        .iter()
        .filter(|file| WeightsFormat::from_path(file).is_some())
        .filter_map(|file| file.file_name().and_then(|name| name.to_str()))
        .filter_map(Encoding::parse_from_file_name)
        .collect();
    encodings.sort();
    encodings.dedup();
    encodings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct NullRegistry;

    impl RegistryClient for NullRegistry {
        fn repo_exists(&self, _: &str, _: &str) -> std::result::Result<bool, RegistryError> {
            Ok(false)
        }

        fn file_exists(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> std::result::Result<bool, RegistryError> {
            Ok(false)
        }

        fn size_of(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> std::result::Result<Option<u64>, RegistryError> {
            Ok(None)
        }

        fn encoding_for_file(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> std::result::Result<Option<Encoding>, RegistryError> {
            Ok(None)
        }

        fn files_for_encoding(
            &self,
            _: &str,
            _: &str,
            _: Encoding,
            _: Option<Encoding>,
        ) -> std::result::Result<HashMap<WeightsFormat, Vec<PathBuf>>, RegistryError> {
            Ok(HashMap::new())
        }

        fn supported_encodings(
            &self,
            _: &str,
            _: &str,
        ) -> std::result::Result<Vec<Encoding>, RegistryError> {
            Ok(Vec::new())
        }

        fn model_config(
            &self,
            _: &str,
            _: &str,
        ) -> std::result::Result<Option<serde_json::Value>, RegistryError> {
            Ok(None)
        }
    }

    struct AbsentCache;

    impl WeightCache for AbsentCache {
        fn try_load(&self, _: &str, _: &str, _: &str) -> CacheLookup {
            CacheLookup::ConfirmedAbsent
        }
    }

    struct MissCache;

    impl WeightCache for MissCache {
        fn try_load(&self, _: &str, _: &str, _: &str) -> CacheLookup {
            CacheLookup::Miss
        }
    }

    fn local_repo(dir: &Path) -> Repository {
        Repository::locate(
            &dir.to_string_lossy(),
            "main",
            Arc::new(NullRegistry),
            Arc::new(MissCache),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn test_locate_classifies_directories_as_local() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = local_repo(dir.path());
        assert_eq!(repo.repo_type(), RepoType::Local);
        assert!(repo.exists().unwrap());

        let online = Repository::locate(
            "acme/llama-x",
            "main",
            Arc::new(NullRegistry),
            Arc::new(MissCache),
            RetryPolicy::default(),
        );
        assert_eq!(online.repo_type(), RepoType::Online);
    }

    #[test]
    fn test_local_repository_queries() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("model-bf16.safetensors"), b"w").expect("write");
        fs::write(dir.path().join("model-q4_k.gguf"), b"w").expect("write");
        fs::write(dir.path().join("README.md"), b"doc").expect("write");

        let repo = local_repo(dir.path());
        assert!(repo.file_exists("model-bf16.safetensors").unwrap());
        assert!(!repo.file_exists("missing.safetensors").unwrap());
        assert_eq!(repo.size_of("model-bf16.safetensors").unwrap(), Some(1));
        assert_eq!(
            repo.encoding_for_file("model-bf16.safetensors").unwrap(),
            Some(Encoding::Bfloat16)
        );
        assert_eq!(
            repo.supported_encodings().unwrap(),
            vec![Encoding::Bfloat16, Encoding::Q4K]
        );

        let files = repo.files_for_encoding(Encoding::Q4K, None).unwrap();
        assert_eq!(
            files.get(&WeightsFormat::Gguf),
            Some(&vec![dir.path().join("model-q4_k.gguf")])
        );
    }

    #[test]
    fn test_alternate_encoding_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("model-bf16.safetensors"), b"w").expect("write");

        let repo = local_repo(dir.path());
        // float32 request, only bfloat16 weights present.
        let files = repo
            .files_for_encoding(Encoding::Float32, Some(Encoding::Bfloat16))
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key(&WeightsFormat::Safetensors));
    }

    #[test]
    fn test_local_weight_path_direct_hit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("model-q4_k.gguf");
        fs::write(&file, b"w").expect("write");

        let repo = local_repo(dir.path());
        let found = repo.local_weight_path(&file).unwrap();
        assert!(found.is_some());

        // Repo-relative names are not probed against the repo root.
        assert!(repo
            .local_weight_path(Path::new("model-q4_k.gguf"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_cached_confirmed_absent_is_fatal() {
        let repo = Repository::locate(
            "acme/llama-x",
            "main",
            Arc::new(NullRegistry),
            Arc::new(AbsentCache),
            RetryPolicy::default(),
        );
        let err = repo
            .local_weight_path(Path::new("model.safetensors"))
            .unwrap_err();
        assert!(matches!(err, Error::WeightNotFound(_)));
    }

    #[test]
    fn test_model_config_local() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("config.json"),
            br#"{"model_type": "llama", "torch_dtype": "float16"}"#,
        )
        .expect("write");

        let repo = local_repo(dir.path());
        let document = repo.model_config().unwrap().expect("config");
        assert_eq!(
            document.get("model_type").and_then(|v| v.as_str()),
            Some("llama")
        );
    }
}
