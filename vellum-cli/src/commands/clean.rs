//! `vellum clean` — remove compiled artifacts past a maximum age.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use vellum_core::Setting;
use vellum_engine::Engine;

/// Arguments for `vellum clean`.
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Remove artifacts older than this many seconds. `0` removes everything.
    #[arg(long, value_name = "SECS")]
    pub max_age: u64,

    /// Cache directory to sweep. Defaults to the configured `cache_dir`.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// YAML settings file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl CleanArgs {
    pub fn run(self) -> Result<()> {
        let patch = super::load_config(self.config.as_deref())?;
        let mut engine = Engine::new();
        engine.configure_all(patch.to_settings());
        if let Some(dir) = self.cache_dir {
            engine.configure(Setting::CacheDir(dir));
        }

        let cache_dir = engine.settings().cache_dir.clone();
        if !cache_dir.exists() {
            println!("Nothing to clean: {} does not exist.", cache_dir.display());
            return Ok(());
        }

        let removed = engine
            .clean(self.max_age)
            .with_context(|| format!("failed to clean {}", cache_dir.display()))?;

        if removed.is_empty() {
            println!("✓ {} — nothing older than {}s", cache_dir.display(), self.max_age);
            return Ok(());
        }

        println!(
            "✓ {} — removed {} artifact{}",
            cache_dir.display(),
            removed.len(),
            if removed.len() == 1 { "" } else { "s" },
        );
        for path in &removed {
            println!("  {}  {}", "✗".red(), path.display());
        }
        Ok(())
    }
}
