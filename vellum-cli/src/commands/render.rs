//! `vellum render` / `vellum render-string` — compile and draw templates.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;

use vellum_core::Setting;
use vellum_engine::{Engine, Renderer};
use vellum_plugins::{Compress, CompressOptions, PathReplace};

/// Options shared by both render subcommands.
#[derive(Args, Debug)]
pub struct RenderOpts {
    /// Bind a variable, `key=value`. Values parse as JSON, falling back to
    /// plain strings. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// YAML file of variable bindings (a top-level mapping).
    #[arg(long, value_name = "FILE")]
    pub vars: Option<PathBuf>,

    /// YAML settings file. Defaults to `vellum.yaml` in the working
    /// directory, then the per-user config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Template search directory. Repeatable; overrides the config file.
    #[arg(long = "base-dir", value_name = "DIR")]
    pub base_dir: Vec<PathBuf>,

    /// Compiled artifact directory.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Recompile on every render, ignoring cached artifacts.
    #[arg(long)]
    pub debug: bool,

    /// Enable a bundled plugin: `compress` or `path-replace`. Repeatable.
    #[arg(long = "plugin", value_name = "NAME")]
    pub plugins: Vec<String>,

    /// Write the rendered output to a file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Arguments for `vellum render`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Logical template name, without the extension.
    pub name: String,

    #[command(flatten)]
    pub opts: RenderOpts,
}

/// Arguments for `vellum render-string`.
#[derive(Args, Debug)]
pub struct RenderStringArgs {
    /// Template source text.
    pub source: String,

    #[command(flatten)]
    pub opts: RenderOpts,
}

impl RenderArgs {
    pub fn run(self) -> Result<()> {
        let engine = build_engine(&self.opts)?;
        let renderer = bound_renderer(&engine, &self.opts)?;
        let output = renderer
            .render(&self.name)
            .with_context(|| format!("failed to render '{}'", self.name))?;
        emit(&output, self.opts.out.as_deref())
    }
}

impl RenderStringArgs {
    pub fn run(self) -> Result<()> {
        let engine = build_engine(&self.opts)?;
        let renderer = bound_renderer(&engine, &self.opts)?;
        let output = renderer
            .render_string(&self.source)
            .context("failed to render template string")?;
        emit(&output, self.opts.out.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Engine and renderer construction
// ---------------------------------------------------------------------------

/// Build an engine from the config file and flags. Flags win over file
/// values, and every value lands in the global fingerprint trail.
pub fn build_engine(opts: &RenderOpts) -> Result<Engine> {
    let patch = super::load_config(opts.config.as_deref())?;
    let mut engine = Engine::new();
    engine.configure_all(patch.to_settings());

    if !opts.base_dir.is_empty() {
        engine.configure(Setting::BaseDirs(opts.base_dir.clone()));
    }
    if let Some(dir) = &opts.cache_dir {
        engine.configure(Setting::CacheDir(dir.clone()));
    }
    if opts.debug {
        engine.configure(Setting::Debug(true));
    }

    for name in &opts.plugins {
        match name.as_str() {
            "compress" => engine.register_plugin(Compress::new(CompressOptions::default()), None),
            "path-replace" => engine.register_plugin(PathReplace::new(), None),
            other => bail!("unknown plugin '{other}'; expected: compress, path-replace"),
        }
    }

    Ok(engine)
}

fn bound_renderer<'e>(engine: &'e Engine, opts: &RenderOpts) -> Result<Renderer<'e>> {
    let mut renderer = Renderer::new(engine);

    if let Some(path) = &opts.vars {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read vars file {}", path.display()))?;
        let value: Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid YAML in {}", path.display()))?;
        let Value::Object(map) = value else {
            bail!("{}: vars file must be a top-level mapping", path.display());
        };
        renderer.set_all(map);
    }

    for entry in &opts.set {
        let (key, value) = parse_binding(entry)?;
        renderer.set(key, value);
    }

    Ok(renderer)
}

fn parse_binding(entry: &str) -> Result<(String, Value)> {
    let Some((key, raw)) = entry.split_once('=') else {
        bail!("--set expects key=value, got '{entry}'");
    };
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
    Ok((key.to_owned(), value))
}

fn emit(output: &str, out: Option<&std::path::Path>) -> Result<()> {
    match out {
        Some(path) => std::fs::write(path, output)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            println!("{output}");
            Ok(())
        }
    }
}
