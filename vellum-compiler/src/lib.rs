//! # vellum-compiler
//!
//! Translates template markup into a [`Program`] — a serializable op tree
//! that the interpreter in [`exec`] runs against bound variables. The
//! persisted form of a `Program` (sentinel header + JSON body) is the
//! compiled artifact the cache stores.

pub mod error;
pub mod exec;
pub mod parse;
pub mod program;

pub use error::{ArtifactError, CompileError, ExecError};
pub use exec::{execute, HostFn, HostFns, Scope};
pub use parse::compile;
pub use program::{CmpOp, Expr, Op, Program, ARTIFACT_SENTINEL, ARTIFACT_VERSION};
