//! Vellum — template compilation and caching CLI.
//!
//! # Usage
//!
//! ```text
//! vellum render <name> [--set k=v]... [--vars vars.yaml] [--config vellum.yaml]
//!               [--base-dir dir]... [--cache-dir dir] [--debug] [-o out]
//! vellum render-string <source> [--set k=v]... [--vars vars.yaml] [...]
//! vellum status [--cache-dir dir] [--json]
//! vellum clean --max-age <secs> [--cache-dir dir]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    clean::CleanArgs,
    render::{RenderArgs, RenderStringArgs},
    status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "vellum",
    version,
    about = "Compile, cache and render vellum templates",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template file resolved against the configured base directories.
    Render(RenderArgs),

    /// Compile and render a template source string passed on the command line.
    RenderString(RenderStringArgs),

    /// List compiled artifacts in the cache directory.
    Status(StatusArgs),

    /// Remove compiled artifacts older than a given age.
    Clean(CleanArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => args.run(),
        Commands::RenderString(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Clean(args) => args.run(),
    }
}
