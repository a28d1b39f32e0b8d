//! Hugging Face hub registry client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::encoding::Encoding;
use crate::repo::registry::{RegistryClient, RegistryError};
use crate::repo::{encodings_present, index_files_for_encoding};

const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// File entry reported by the hub API.
#[derive(Debug, Clone, Deserialize)]
struct SiblingEntry {
    rfilename: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    #[serde(default)]
    siblings: Vec<SiblingEntry>,
}

/// [`RegistryClient`] backed by the Hugging Face hub HTTP API.
///
/// Repository file listings are fetched once per (repo, revision) and cached
/// for the lifetime of the client; a confirmed-missing repository is cached
/// the same way so repeated queries stay off the network.
pub struct HfRegistryClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
    info_cache: Mutex<HashMap<String, Option<Vec<SiblingEntry>>>>,
}

impl HfRegistryClient {
    /// Client against the public hub, authenticating with `HF_TOKEN` when
    /// set.
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Client against a custom registry endpoint.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
            token: std::env::var("HF_TOKEN").ok(),
            info_cache: Mutex::new(HashMap::new()),
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, RegistryError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().map_err(|err| {
            if err.is_timeout() || err.is_connect() {
                RegistryError::Transient(err.to_string())
            } else {
                RegistryError::Request(err.to_string())
            }
        })
    }

    /// File listing for the repository, `None` when the repository does not
    /// exist at the revision.
    fn repo_files(
        &self,
        repo_id: &str,
        revision: &str,
    ) -> Result<Option<Vec<SiblingEntry>>, RegistryError> {
        let key = format!("{}@{}", repo_id, revision);
        {
            let cache = self.info_cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(entry) = cache.get(&key) {
                return Ok(entry.clone());
            }
        }

        let url = format!(
            "{}/api/models/{}/revision/{}?blobs=true",
            self.endpoint, repo_id, revision
        );
        let response = self.send(self.client.get(&url))?;
        let status = response.status();
        let entry = if status.is_success() {
            let info: RepoInfo = response.json().map_err(|err| {
                RegistryError::Request(format!(
                    "invalid repository info for '{}': {}",
                    repo_id, err
                ))
            })?;
            Some(info.siblings)
        } else if status == StatusCode::NOT_FOUND
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
        {
            // The hub answers 401/403 rather than 404 for repositories the
            // caller cannot see; all three are a confirmed absence here.
            None
        } else if status.is_server_error() {
            return Err(RegistryError::Transient(format!(
                "registry returned {} for '{}'",
                status, repo_id
            )));
        } else {
            return Err(RegistryError::Request(format!(
                "registry returned {} for '{}'",
                status, repo_id
            )));
        };

        self.info_cache
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key, entry.clone());
        Ok(entry)
    }

    fn paths(files: &[SiblingEntry]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|file| PathBuf::from(&file.rfilename))
            .collect()
    }
}

impl Default for HfRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClient for HfRegistryClient {
    fn repo_exists(&self, repo_id: &str, revision: &str) -> Result<bool, RegistryError> {
        Ok(self.repo_files(repo_id, revision)?.is_some())
    }

    fn file_exists(
        &self,
        repo_id: &str,
        revision: &str,
        filename: &str,
    ) -> Result<bool, RegistryError> {
        Ok(self
            .repo_files(repo_id, revision)?
            .map(|files| files.iter().any(|file| file.rfilename == filename))
            .unwrap_or(false))
    }

    fn size_of(
        &self,
        repo_id: &str,
        revision: &str,
        filename: &str,
    ) -> Result<Option<u64>, RegistryError> {
        Ok(self.repo_files(repo_id, revision)?.and_then(|files| {
            files
                .iter()
                .find(|file| file.rfilename == filename)
                .and_then(|file| file.size)
        }))
    }

    fn encoding_for_file(
        &self,
        _repo_id: &str,
        _revision: &str,
        filename: &str,
    ) -> Result<Option<Encoding>, RegistryError> {
        // The hub exposes no encoding metadata beyond the file name itself.
        Ok(Encoding::parse_from_file_name(filename))
    }

    fn files_for_encoding(
        &self,
        repo_id: &str,
        revision: &str,
        encoding: Encoding,
        alternate: Option<Encoding>,
    ) -> Result<HashMap<crate::encoding::WeightsFormat, Vec<PathBuf>>, RegistryError> {
        let files = self.repo_files(repo_id, revision)?.unwrap_or_default();
        Ok(index_files_for_encoding(
            &Self::paths(&files),
            encoding,
            alternate,
        ))
    }

    fn supported_encodings(
        &self,
        repo_id: &str,
        revision: &str,
    ) -> Result<Vec<Encoding>, RegistryError> {
        let files = self.repo_files(repo_id, revision)?.unwrap_or_default();
        Ok(encodings_present(&Self::paths(&files)))
    }

    fn model_config(
        &self,
        repo_id: &str,
        revision: &str,
    ) -> Result<Option<serde_json::Value>, RegistryError> {
        let url = format!(
            "{}/{}/resolve/{}/config.json",
            self.endpoint, repo_id, revision
        );
        let response = self.send(self.client.get(&url))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
        {
            return Ok(None);
        }
        if status.is_server_error() {
            return Err(RegistryError::Transient(format!(
                "registry returned {} for '{}/config.json'",
                status, repo_id
            )));
        }
        if !status.is_success() {
            return Err(RegistryError::Request(format!(
                "registry returned {} for '{}/config.json'",
                status, repo_id
            )));
        }
        let document = response.json().map_err(|err| {
            RegistryError::Request(format!("invalid config.json in '{}': {}", repo_id, err))
        })?;
        Ok(Some(document))
    }
}
