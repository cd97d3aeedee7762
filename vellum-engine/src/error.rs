//! Error types for vellum-engine.

use std::path::PathBuf;

use thiserror::Error;

use vellum_compiler::{CompileError, ExecError};
use vellum_core::PluginError;

/// All errors that can abort a render. None are retried internally; the
/// embedding framework catches and translates them.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No candidate path existed for the logical template name.
    #[error("template '{name}' not found; tried {tried:?}")]
    TemplateNotFound { name: String, tried: Vec<PathBuf> },

    /// The cache directory could not be created or an artifact could not
    /// be persisted. Fatal for the render.
    #[error("failed to write cache artifact at {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error outside the cache-write path, with the path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed template syntax, or a sandboxed construct while
    /// sandboxing is enabled.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A compiled program failed at execution time.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// A hook handler failed; propagated unmodified from the pipeline.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// A program could not be serialized for persistence.
    #[error("artifact serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}
