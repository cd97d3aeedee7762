//! Vellum core library — configuration, bindings, tag and plugin registries.
//!
//! Public API surface:
//! - [`config`] — [`Settings`], [`Setting`], [`ConfigStore`] with the fingerprint trail
//! - [`vars`] — [`Bindings`] variable map
//! - [`tags`] — [`TagRegistry`] compiler extensions
//! - [`plugin`] — [`Plugin`] contract, [`PluginRegistry`], [`HookContext`]
//! - [`error`] — [`PluginError`], [`TagError`]

pub mod config;
pub mod error;
pub mod plugin;
pub mod tags;
pub mod vars;

pub use config::{ConfigStore, Setting, Settings, SettingsPatch, TrailEntry};
pub use error::{PluginError, TagError};
pub use plugin::{HookContext, HookKind, Plugin, PluginRegistry};
pub use tags::{TagRegistry, TagTransform};
pub use vars::Bindings;
