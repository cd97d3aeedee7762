//! Error types for vellum-compiler.

use thiserror::Error;

/// Compilation failed. Carries the offending source fragment; compile
/// errors are never auto-recovered.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A construct was opened but never closed (`{$x` without `}`,
    /// `{if}` without `{/if}`, …).
    #[error("unterminated {construct} near '{fragment}'")]
    Unterminated { construct: String, fragment: String },

    /// A block opener the compiler does not understand, or a closer with
    /// no matching opener.
    #[error("unknown syntax near '{fragment}'")]
    UnknownSyntax { fragment: String },

    /// An expression inside a block failed to parse.
    #[error("bad expression '{fragment}': {reason}")]
    BadExpr { fragment: String, reason: String },

    /// `{call}` used while sandbox mode is enabled.
    #[error("sandboxed construct near '{fragment}'")]
    Sandboxed { fragment: String },
}

/// Execution of a compiled program failed.
#[derive(Debug, Error)]
pub enum ExecError {
    /// `{call}` referenced a host function nobody registered.
    #[error("unknown host function '{name}'")]
    UnknownFunction { name: String },
}

/// A persisted artifact could not be loaded.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The sentinel header line is missing or wrong — the file is not a
    /// vellum artifact (or is half-written).
    #[error("artifact sentinel missing or invalid")]
    BadSentinel,

    /// The artifact was produced by an incompatible format version.
    #[error("unsupported artifact version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    /// The JSON body failed to parse.
    #[error("artifact body invalid: {0}")]
    Body(#[from] serde_json::Error),
}
