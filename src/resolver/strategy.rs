//! KV cache strategy selection.

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::kv_cache::KvCacheStrategy;

use super::ResolveOptions;

/// Pick a cache strategy the resolved encoding supports.
///
/// An explicit strategy outside the encoding's support set is downgraded to
/// the preferred one with a warning rather than failing the run: the choice
/// is harmless to correct.
pub(super) fn resolve_cache_strategy(
    config: &mut ModelConfig,
    options: &ResolveOptions,
) -> Result<()> {
    let Some(encoding) = config.quantization_encoding else {
        return Err(Error::Internal(
            "cache strategy resolution requires a resolved encoding".into(),
        ));
    };

    let supported = options
        .supported_encodings
        .get(&encoding)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let Some(&preferred) = supported.first() else {
        return Ok(());
    };

    let current = config.kv_cache.cache_strategy;
    if current == KvCacheStrategy::ModelDefault {
        log::debug!("default cache_strategy of '{}' enabled", preferred);
        config.kv_cache.cache_strategy = preferred;
    } else if !supported.contains(&current) {
        log::warn!(
            "cache_strategy = '{}' not supported for '{}', using '{}' cache strategy",
            current,
            encoding,
            preferred
        );
        config.kv_cache.cache_strategy = preferred;
    }
    Ok(())
}
