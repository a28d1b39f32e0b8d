//! Remote model registry collaborator interface.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::encoding::{Encoding, WeightsFormat};

/// Errors surfaced by a [`RegistryClient`].
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The request failed in a way that may succeed on retry
    #[error("transient registry failure: {0}")]
    Transient(String),

    /// The request failed definitively
    #[error("registry request failed: {0}")]
    Request(String),
}

/// Query interface over a remote model registry.
///
/// Existence queries answer `Ok(false)` for a confirmed-absent resource;
/// only transport-level failures are errors. Callers retry
/// [`RegistryError::Transient`] failures and nothing else.
pub trait RegistryClient: Send + Sync {
    /// Whether the repository exists at the given revision.
    fn repo_exists(&self, repo_id: &str, revision: &str) -> Result<bool, RegistryError>;

    /// Whether `filename` exists in the repository.
    fn file_exists(
        &self,
        repo_id: &str,
        revision: &str,
        filename: &str,
    ) -> Result<bool, RegistryError>;

    /// Size of `filename` in bytes, when the registry exposes it.
    fn size_of(
        &self,
        repo_id: &str,
        revision: &str,
        filename: &str,
    ) -> Result<Option<u64>, RegistryError>;

    /// Encoding of `filename`, when one can be determined from registry
    /// metadata.
    fn encoding_for_file(
        &self,
        repo_id: &str,
        revision: &str,
        filename: &str,
    ) -> Result<Option<Encoding>, RegistryError>;

    /// Weight files grouped by serialization format for `encoding`, falling
    /// back to `alternate` when the requested encoding has no files.
    fn files_for_encoding(
        &self,
        repo_id: &str,
        revision: &str,
        encoding: Encoding,
        alternate: Option<Encoding>,
    ) -> Result<HashMap<WeightsFormat, Vec<PathBuf>>, RegistryError>;

    /// Encodings the repository carries weights for.
    fn supported_encodings(&self, repo_id: &str, revision: &str)
        -> Result<Vec<Encoding>, RegistryError>;

    /// The repository's model configuration document, when present.
    fn model_config(
        &self,
        repo_id: &str,
        revision: &str,
    ) -> Result<Option<serde_json::Value>, RegistryError>;
}

/// Bounded retry with exponential backoff for registry calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Run `call`, retrying transient failures under `policy`.
pub(crate) fn with_retry<T>(
    policy: &RetryPolicy,
    what: &str,
    mut call: impl FnMut() -> Result<T, RegistryError>,
) -> Result<T, RegistryError> {
    let mut delay = policy.base_delay;
    let mut attempt = 1;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(RegistryError::Transient(reason)) if attempt < policy.max_attempts => {
                log::warn!(
                    "{} failed (attempt {}/{}): {}, retrying...",
                    what,
                    attempt,
                    policy.max_attempts,
                    reason
                );
                std::thread::sleep(delay);
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn immediate() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_transient_failures_are_retried() {
        let attempts = Cell::new(0);
        let result = with_retry(&immediate(), "probe", || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(RegistryError::Transient("connection reset".into()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn test_request_failures_are_not_retried() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = with_retry(&immediate(), "probe", || {
            attempts.set(attempts.get() + 1);
            Err(RegistryError::Request("bad request".into()))
        });
        assert!(matches!(result, Err(RegistryError::Request(_))));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_retry_budget_exhaustion_surfaces_last_error() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = with_retry(&immediate(), "probe", || {
            attempts.set(attempts.get() + 1);
            Err(RegistryError::Transient("timeout".into()))
        });
        assert!(matches!(result, Err(RegistryError::Transient(_))));
        assert_eq!(attempts.get(), 3);
    }
}
