//! The compiled program — op tree, expressions, and the artifact format.
//!
//! # Artifact layout
//!
//! ```text
//! ;vellum artifact v1 — refuses execution outside the vellum engine
//! {"version":1,"compiled_at":"…","ops":[…]}
//! ```
//!
//! The first line is a sentinel: a loader that does not find it treats the
//! file as not-an-artifact. The body is the JSON-serialized [`Program`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

/// Sentinel header written as the first line of every artifact.
pub const ARTIFACT_SENTINEL: &str =
    ";vellum artifact v1 — refuses execution outside the vellum engine";

/// Current artifact format version.
pub const ARTIFACT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Comparison operators usable in `{if}` expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An evaluable expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Dotted variable path: `$user.name` → `["user", "name"]`.
    Var(Vec<String>),
    Str(String),
    Num(f64),
    Bool(bool),
    Not(Box<Expr>),
    Cmp {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a && b && c` — all terms truthy.
    And(Vec<Expr>),
    /// `a || b || c` — any term truthy.
    Or(Vec<Expr>),
}

// ---------------------------------------------------------------------------
// Ops
// ---------------------------------------------------------------------------

/// One instruction of a compiled template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// Literal output text.
    Text(String),
    /// Interpolate an expression. `raw` skips HTML escaping.
    Interp { expr: Expr, raw: bool },
    /// `{if}`/`{elseif}` branches in order, plus the `{else}` body.
    If {
        branches: Vec<(Expr, Vec<Op>)>,
        fallback: Vec<Op>,
    },
    /// Iterate `expr`, binding `var` (plus `var_index` / `var_key`).
    Loop {
        expr: Expr,
        var: String,
        body: Vec<Op>,
    },
    /// Invoke a registered host function and interpolate its result.
    Call { name: String, args: Vec<Expr> },
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// A compiled template plus artifact metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub version: u32,
    pub compiled_at: DateTime<Utc>,
    pub ops: Vec<Op>,
}

impl Program {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            compiled_at: Utc::now(),
            ops,
        }
    }

    /// Serialize to the on-disk artifact form (sentinel line + JSON body).
    pub fn to_artifact(&self) -> Result<String, serde_json::Error> {
        let body = serde_json::to_string(self)?;
        Ok(format!("{ARTIFACT_SENTINEL}\n{body}\n"))
    }

    /// Parse an on-disk artifact, validating sentinel and version.
    pub fn from_artifact(text: &str) -> Result<Program, ArtifactError> {
        let mut lines = text.splitn(2, '\n');
        let header = lines.next().unwrap_or_default();
        if header.trim_end() != ARTIFACT_SENTINEL {
            return Err(ArtifactError::BadSentinel);
        }
        let body = lines.next().ok_or(ArtifactError::BadSentinel)?;
        let program: Program = serde_json::from_str(body)?;
        if program.version != ARTIFACT_VERSION {
            return Err(ArtifactError::Version {
                found: program.version,
                expected: ARTIFACT_VERSION,
            });
        }
        Ok(program)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Program {
        Program::new(vec![
            Op::Text("hello ".into()),
            Op::Interp {
                expr: Expr::Var(vec!["name".into()]),
                raw: false,
            },
        ])
    }

    #[test]
    fn artifact_roundtrip() {
        let program = sample();
        let text = program.to_artifact().unwrap();
        assert!(text.starts_with(ARTIFACT_SENTINEL));
        let loaded = Program::from_artifact(&text).unwrap();
        assert_eq!(loaded.ops, program.ops);
    }

    #[test]
    fn missing_sentinel_is_rejected() {
        let body = serde_json::to_string(&sample()).unwrap();
        assert!(matches!(
            Program::from_artifact(&body),
            Err(ArtifactError::BadSentinel)
        ));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut program = sample();
        program.version = 99;
        let text = format!(
            "{ARTIFACT_SENTINEL}\n{}\n",
            serde_json::to_string(&program).unwrap()
        );
        assert!(matches!(
            Program::from_artifact(&text),
            Err(ArtifactError::Version { found: 99, .. })
        ));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let text = format!("{ARTIFACT_SENTINEL}\n{{\"version\":1,");
        assert!(matches!(
            Program::from_artifact(&text),
            Err(ArtifactError::Body(_))
        ));
    }
}
