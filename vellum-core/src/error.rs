//! Error types for vellum-core.

use thiserror::Error;

use crate::plugin::HookKind;

/// A hook handler failed. The pipeline does not catch or suppress plugin
/// failures — this aborts the render that triggered the hook.
#[derive(Debug, Error)]
#[error("plugin '{plugin}' failed in {hook}: {source}")]
pub struct PluginError {
    /// Registered name of the failing plugin.
    pub plugin: String,
    /// Hook that was being dispatched.
    pub hook: HookKind,
    #[source]
    pub source: anyhow::Error,
}

/// A tag could not be registered.
#[derive(Debug, Error)]
pub enum TagError {
    /// The matching pattern is not a valid regular expression.
    #[error("invalid pattern for tag '{name}': {source}")]
    Pattern {
        name: String,
        #[source]
        source: regex::Error,
    },
}
