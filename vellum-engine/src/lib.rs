//! # vellum-engine
//!
//! Resolver, cache, and renderer for compiled templates.
//!
//! Process-wide mutable state — configuration, tag and plugin registries,
//! host functions — lives in one explicit [`Engine`] value rather than
//! ambient globals. Renderers borrow the engine; mutating it requires
//! `&mut Engine`. No internal locking: a multi-threaded embedding
//! synchronizes configuration, registry mutation, and renders externally.

pub mod cache;
pub mod error;
pub mod render;
pub mod resolve;

use std::path::PathBuf;
use std::time::Duration;

use vellum_compiler::exec::{HostFn, HostFns};
use vellum_core::{ConfigStore, Setting, Settings, TagError, TagRegistry, TagTransform};
use vellum_core::{Plugin, PluginRegistry};

pub use error::EngineError;
pub use render::Renderer;
pub use resolve::ResolvedTemplate;

/// Shared engine context: configuration store, registries, host functions.
#[derive(Default)]
pub struct Engine {
    config: ConfigStore,
    tags: TagRegistry,
    plugins: PluginRegistry,
    functions: HostFns,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    // -- configuration ------------------------------------------------------

    /// Apply one global setting; recorded in the fingerprint trail.
    pub fn configure(&mut self, setting: Setting) {
        self.config.apply(setting);
    }

    /// Apply several global settings in order.
    pub fn configure_all<I: IntoIterator<Item = Setting>>(&mut self, settings: I) {
        self.config.apply_all(settings);
    }

    pub fn settings(&self) -> &Settings {
        self.config.settings()
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    // -- extension registries -----------------------------------------------

    /// Register (or overwrite) a compiler tag.
    pub fn register_tag(
        &mut self,
        name: impl Into<String>,
        pattern: &str,
        transform: TagTransform,
    ) -> Result<(), TagError> {
        self.tags.register(name, pattern, transform)
    }

    /// Register a plugin under `name` (or its type name).
    pub fn register_plugin<P: Plugin + 'static>(&mut self, plugin: P, name: Option<&str>) {
        self.plugins.register(plugin, name);
    }

    /// Remove a plugin by name.
    pub fn remove_plugin(&mut self, name: &str) -> bool {
        self.plugins.remove(name)
    }

    /// Register a host function callable from `{call}`.
    pub fn register_function(&mut self, name: impl Into<String>, function: HostFn) {
        self.functions.insert(name.into(), function);
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn functions(&self) -> &HostFns {
        &self.functions
    }

    // -- cache maintenance --------------------------------------------------

    /// Delete cached artifacts (and bundles) older than `max_age_seconds`.
    pub fn clean(&self, max_age_seconds: u64) -> Result<Vec<PathBuf>, EngineError> {
        cache::clean_at(
            &self.settings().cache_dir,
            Duration::from_secs(max_age_seconds),
        )
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", self.settings())
            .field("tags", &self.tags)
            .field("plugins", &self.plugins)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
