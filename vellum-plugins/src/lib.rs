//! # vellum-plugins
//!
//! Reference plugins for the vellum hook pipeline:
//!
//! - [`PathReplace`] (`afterParse`) — rewrites relative asset references in
//!   template source against the configured base URL and template directory.
//! - [`Compress`] (`afterDraw`) — minifies rendered HTML and bundles local
//!   stylesheet/script references into single cached files.
//!
//! Both are regex-driven, best-effort text transformations over markup, not
//! real parsers. The observable contract (URLs rewritten/bundled, output
//! otherwise unchanged) is what they guarantee, not exact whitespace.

pub mod compress;
pub mod path_replace;

pub use compress::{Compress, CompressOptions, ScriptPos};
pub use path_replace::PathReplace;
