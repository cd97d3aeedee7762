//! The renderer — binds variables, drives compile-or-reuse, executes the
//! program, and runs the hook pipeline.
//!
//! One [`Renderer`] is one render scope: its instance settings and variable
//! bindings never leak into the shared [`Engine`] or into sibling
//! renderers. A single render is strictly sequential: resolve → compile if
//! needed (tags → afterParse → parse → persist) → execute → afterDraw.

use std::path::{Path, PathBuf};

use serde_json::Value;

use vellum_compiler::{compile, execute, Program};
use vellum_core::{HookContext, HookKind, Setting, Settings, SettingsPatch};

use crate::cache;
use crate::error::{io_err, EngineError};
use crate::resolve;
use crate::Engine;

/// Per-render instance bound to a shared [`Engine`].
pub struct Renderer<'e> {
    engine: &'e Engine,
    overrides: SettingsPatch,
    vars: vellum_core::Bindings,
}

impl<'e> Renderer<'e> {
    pub fn new(engine: &'e Engine) -> Self {
        Self {
            engine,
            overrides: SettingsPatch::default(),
            vars: vellum_core::Bindings::new(),
        }
    }

    // -- instance configuration & bindings ----------------------------------

    /// Instance-scoped setting, merged over global configuration at render
    /// time. Never written back to the engine.
    pub fn configure(&mut self, setting: Setting) {
        self.overrides.set(setting);
    }

    /// Bind one variable (always wins over earlier values).
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.set(name, value);
    }

    /// Bulk-merge variables; keys already bound are left untouched.
    pub fn set_all<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.vars.set_all(vars);
    }

    /// The configuration this renderer would use right now.
    pub fn effective_settings(&self) -> Settings {
        self.engine.settings().merged(&self.overrides)
    }

    // -- rendering -----------------------------------------------------------

    /// Render a file template by logical name.
    pub fn render(&self, name: &str) -> Result<String, EngineError> {
        let settings = self.effective_settings();
        let resolved = resolve::resolve(name, &settings)?;
        let artifact = self.artifact_path_resolved(&resolved, name, &settings);

        let program = match cache::needs_compile(&artifact, &resolved.source, settings.debug)? {
            false => match cache::load_program(&artifact) {
                Some(program) => program,
                // Corrupt artifact: self-heal with a fresh compile.
                None => self.compile_file(&resolved, &artifact, &settings)?,
            },
            true => self.compile_file(&resolved, &artifact, &settings)?,
        };

        self.execute_and_draw(&program, &settings)
    }

    /// Render a literal template string.
    pub fn render_string(&self, source: &str) -> Result<String, EngineError> {
        let settings = self.effective_settings();
        let artifact = resolve::string_artifact_path(
            source,
            &self.engine.config().trail_values(),
            &settings,
        );

        // No mtime to compare for a literal: content changes surface as a
        // different key, so the policy is debug-or-absent.
        let program = if settings.debug || !artifact.is_file() {
            let program = self.compile_source(source, None, &settings)?;
            cache::write_program(&artifact, &program)?;
            program
        } else {
            match cache::load_program(&artifact) {
                Some(program) => program,
                None => {
                    let program = self.compile_source(source, None, &settings)?;
                    cache::write_program(&artifact, &program)?;
                    program
                }
            }
        };

        self.execute_and_draw(&program, &settings)
    }

    /// Compiled-artifact path this renderer would use for `name`.
    pub fn artifact_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        let settings = self.effective_settings();
        let resolved = resolve::resolve(name, &settings)?;
        Ok(self.artifact_path_resolved(&resolved, name, &settings))
    }

    fn artifact_path_resolved(
        &self,
        resolved: &resolve::ResolvedTemplate,
        name: &str,
        settings: &Settings,
    ) -> PathBuf {
        resolve::artifact_path(
            resolved,
            name,
            &self.engine.config().trail_serialized(),
            settings,
        )
    }

    // -- compilation ---------------------------------------------------------

    fn compile_file(
        &self,
        resolved: &resolve::ResolvedTemplate,
        artifact: &Path,
        settings: &Settings,
    ) -> Result<Program, EngineError> {
        tracing::info!(
            "compiling {} -> {}",
            resolved.source.display(),
            artifact.display()
        );
        let source =
            std::fs::read_to_string(&resolved.source).map_err(|e| io_err(&resolved.source, e))?;
        let program = self.compile_source(&source, Some(resolved.template_dir()), settings)?;
        cache::write_program(artifact, &program)?;
        Ok(program)
    }

    /// Tags → afterParse hooks → built-in translation.
    fn compile_source(
        &self,
        source: &str,
        template_dir: Option<PathBuf>,
        settings: &Settings,
    ) -> Result<Program, EngineError> {
        let expanded = self.engine.tags().apply(source);
        let mut ctx = HookContext::new(expanded, settings.clone());
        ctx.template_dir = template_dir;
        self.engine.plugins().run(HookKind::AfterParse, &mut ctx)?;
        Ok(compile(&ctx.code, settings)?)
    }

    // -- execution -----------------------------------------------------------

    fn execute_and_draw(
        &self,
        program: &Program,
        settings: &Settings,
    ) -> Result<String, EngineError> {
        let scope = self.vars.to_scope();
        let output = execute(program, &scope, self.engine.functions(), settings)?;
        let mut ctx = HookContext::new(output, settings.clone());
        self.engine.plugins().run(HookKind::AfterDraw, &mut ctx)?;
        Ok(ctx.code)
    }
}

impl std::fmt::Debug for Renderer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("overrides", &self.overrides)
            .field("vars", &self.vars.len())
            .finish()
    }
}
