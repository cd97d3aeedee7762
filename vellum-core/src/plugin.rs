//! Plugin contract, registry, and hook pipeline.
//!
//! Hooks are an explicit enum, not probed method names: a plugin declares
//! the [`HookKind`]s it participates in and the registry dispatches only
//! those. Dispatch is a sequential fold — every participating plugin, in
//! registration order, receives the *same* mutable [`HookContext`]; later
//! plugins observe (and may overwrite) what earlier ones wrote. Ordering is
//! the only conflict-resolution knob.

use std::fmt;
use std::path::PathBuf;

use crate::config::Settings;
use crate::error::PluginError;

// ---------------------------------------------------------------------------
// Hook kinds & context
// ---------------------------------------------------------------------------

/// Extension points the engine fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Once per compiled artifact, over the tag-expanded template source.
    AfterParse,
    /// Once per render, over the fully executed output.
    AfterDraw,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookKind::AfterParse => write!(f, "afterParse"),
            HookKind::AfterDraw => write!(f, "afterDraw"),
        }
    }
}

/// Mutable carrier threaded through a hook chain.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// Template source (afterParse) or rendered output (afterDraw).
    /// Handlers read and may overwrite it.
    pub code: String,
    /// Snapshot of the effective configuration for this render.
    pub conf: Settings,
    /// Directory containing the resolved template. Set for afterParse,
    /// `None` for afterDraw and for string templates.
    pub template_dir: Option<PathBuf>,
}

impl HookContext {
    pub fn new(code: impl Into<String>, conf: Settings) -> Self {
        Self {
            code: code.into(),
            conf,
            template_dir: None,
        }
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Plugin contract
// ---------------------------------------------------------------------------

/// A post-processing extension.
///
/// Implement the method for each hook named in [`hooks`](Plugin::hooks);
/// the defaults are no-ops so a plugin only writes the handlers it uses.
/// Handlers must not assume exclusive access to the context.
pub trait Plugin: Send + Sync {
    /// Hook kinds this plugin participates in.
    fn hooks(&self) -> &[HookKind];

    fn after_parse(&self, _ctx: &mut HookContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_draw(&self, _ctx: &mut HookContext) -> anyhow::Result<()> {
        Ok(())
    }
}

struct Registered {
    name: String,
    plugin: Box<dyn Plugin>,
}

// ---------------------------------------------------------------------------
// Registry & dispatch
// ---------------------------------------------------------------------------

/// Ordered, name-keyed plugin collection.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Registered>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin under `name`, or under its short type name when
    /// `name` is `None`. Re-registering an existing name replaces the
    /// plugin in place, keeping its position in the dispatch order.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P, name: Option<&str>) {
        let name = name
            .map(str::to_owned)
            .unwrap_or_else(|| short_type_name::<P>());
        let entry = Registered {
            name,
            plugin: Box::new(plugin),
        };
        match self.plugins.iter_mut().find(|p| p.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.plugins.push(entry),
        }
    }

    /// Remove a plugin by name; returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name != name);
        self.plugins.len() != before
    }

    /// Run one hook over every participating plugin, in registration order.
    ///
    /// The first handler failure aborts the chain and is returned as a
    /// [`PluginError`] naming the plugin; it is never suppressed.
    pub fn run(&self, hook: HookKind, ctx: &mut HookContext) -> Result<(), PluginError> {
        for entry in &self.plugins {
            if !entry.plugin.hooks().contains(&hook) {
                continue;
            }
            let result = match hook {
                HookKind::AfterParse => entry.plugin.after_parse(ctx),
                HookKind::AfterDraw => entry.plugin.after_draw(ctx),
            };
            result.map_err(|source| PluginError {
                plugin: entry.name.clone(),
                hook,
                source,
            })?;
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

fn short_type_name<T>() -> String {
    std::any::type_name::<T>()
        .rsplit("::")
        .next()
        .unwrap_or("plugin")
        .to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
