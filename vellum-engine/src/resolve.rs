//! Template resolution and cache-key computation.
//!
//! # Artifact naming
//!
//! ```text
//! <cache_dir>/<basename>.<hash32>.<cache_ext>     file templates
//! <cache_dir>/<hash32>.s.<cache_ext>              string templates
//! ```
//!
//! For file templates the hash covers the *matched base directory* plus the
//! serialized fingerprint trail — deliberately not the template's byte
//! content; staleness is detected by mtime comparison instead. For string
//! templates the hash covers the source text plus the concatenated trail
//! values, so a changed literal lands at a different path.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use vellum_core::config::Settings;

use crate::error::EngineError;

/// A located template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    /// Full path to the template file.
    pub source: PathBuf,
    /// The configured base directory that matched (or the literal path's
    /// parent for absolute names). Feeds the cache key.
    pub matched_dir: PathBuf,
}

impl ResolvedTemplate {
    /// Directory containing the template file; handed to afterParse hooks.
    pub fn template_dir(&self) -> PathBuf {
        self.source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

/// Locate a template by logical name.
///
/// A name starting with `/` is path-absolute: only the literal path (name
/// plus configured extension) is checked, never the base-directory list.
/// Otherwise base directories are probed in configured order and the first
/// hit wins.
pub fn resolve(name: &str, settings: &Settings) -> Result<ResolvedTemplate, EngineError> {
    let file = format!("{name}.{}", settings.ext);

    if name.starts_with('/') {
        let path = PathBuf::from(&file);
        if path.is_file() {
            let matched_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("/"));
            return Ok(ResolvedTemplate {
                source: path,
                matched_dir,
            });
        }
        return Err(EngineError::TemplateNotFound {
            name: name.to_owned(),
            tried: vec![path],
        });
    }

    let mut tried = Vec::new();
    for dir in &settings.base_dirs {
        let path = dir.join(&file);
        if path.is_file() {
            return Ok(ResolvedTemplate {
                source: path,
                matched_dir: dir.clone(),
            });
        }
        tried.push(path);
    }
    Err(EngineError::TemplateNotFound {
        name: name.to_owned(),
        tried,
    })
}

/// First 32 hex chars of SHA-256 over `input`.
pub fn cache_key(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(32);
    digest
}

/// Compiled-artifact path for a file template.
pub fn artifact_path(
    resolved: &ResolvedTemplate,
    name: &str,
    trail_serialized: &str,
    settings: &Settings,
) -> PathBuf {
    let basename = Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_owned());
    let key = cache_key(&format!("{}{trail_serialized}", resolved.matched_dir.display()));
    settings
        .cache_dir
        .join(format!("{basename}.{key}.{}", settings.cache_ext))
}

/// Compiled-artifact path for a string template.
pub fn string_artifact_path(source: &str, trail_values: &str, settings: &Settings) -> PathBuf {
    let key = cache_key(&format!("{source}{trail_values}"));
    settings
        .cache_dir
        .join(format!("{key}.s.{}", settings.cache_ext))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
