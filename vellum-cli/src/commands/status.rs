//! `vellum status` — cache directory visibility.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Arguments for `vellum status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Cache directory to inspect. Defaults to the configured `cache_dir`.
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// YAML settings file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => {
                let patch = super::load_config(self.config.as_deref())?;
                patch.cache_dir.unwrap_or_else(|| PathBuf::from("cache"))
            }
        };

        let mut artifacts = Vec::new();
        if cache_dir.exists() {
            collect(&cache_dir, &cache_dir, &mut artifacts)
                .with_context(|| format!("failed to scan {}", cache_dir.display()))?;
        }
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));

        if self.json {
            print_json(&cache_dir, artifacts)?;
            return Ok(());
        }
        print_table(&cache_dir, artifacts);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Artifact {
    name: String,
    kind: ArtifactKind,
    size: u64,
    age_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ArtifactKind {
    Template,
    StringTemplate,
    Bundle,
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<Artifact>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect(root, &path, out)?;
            continue;
        }
        let meta = entry.metadata()?;
        let name = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .display()
            .to_string();
        let age_secs = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        out.push(Artifact {
            kind: classify(&name),
            name,
            size: meta.len(),
            age_secs,
        });
    }
    Ok(())
}

fn classify(name: &str) -> ArtifactKind {
    // Bundles live under compress/{css,js}/; string artifacts are exactly
    // `<32-hex>.s.<ext>`. A template basename with its own `.s` segment
    // stays a file template.
    if name.starts_with("compress/") || name.starts_with("compress\\") {
        return ArtifactKind::Bundle;
    }
    let mut parts = name.split('.');
    if let (Some(hash), Some("s"), Some(_ext), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    {
        if hash.len() == 32 && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return ArtifactKind::StringTemplate;
        }
    }
    ArtifactKind::Template
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "artifact")]
    name: String,
    #[tabled(rename = "kind")]
    kind: &'static str,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "age")]
    age: String,
}

#[derive(Serialize)]
struct StatusJson {
    cache_dir: String,
    artifacts: Vec<ArtifactJson>,
}

#[derive(Serialize)]
struct ArtifactJson {
    name: String,
    kind: ArtifactKind,
    size_bytes: u64,
    age_secs: u64,
}

fn print_table(cache_dir: &Path, artifacts: Vec<Artifact>) {
    let total: u64 = artifacts.iter().map(|a| a.size).sum();
    println!(
        "Vellum v{} | {} | {} artifacts | {}",
        env!("CARGO_PKG_VERSION"),
        cache_dir.display().to_string().bold(),
        artifacts.len(),
        format_size(total),
    );

    if artifacts.is_empty() {
        println!("{}", "Cache is empty.".bright_black());
        return;
    }

    let rows: Vec<ArtifactRow> = artifacts
        .into_iter()
        .map(|a| ArtifactRow {
            name: a.name,
            kind: kind_label(a.kind),
            size: format_size(a.size),
            age: format_age(a.age_secs),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn print_json(cache_dir: &Path, artifacts: Vec<Artifact>) -> Result<()> {
    let payload = StatusJson {
        cache_dir: cache_dir.display().to_string(),
        artifacts: artifacts
            .into_iter()
            .map(|a| ArtifactJson {
                name: a.name,
                kind: a.kind,
                size_bytes: a.size,
                age_secs: a.age_secs,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn kind_label(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Template => "template",
        ArtifactKind::StringTemplate => "string",
        ArtifactKind::Bundle => "bundle",
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

fn format_age(secs: u64) -> String {
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_distinguishes_artifact_kinds() {
        let hash = "0123456789abcdef0123456789abcdef";
        assert_eq!(classify("page.0a1b2c.vtc"), ArtifactKind::Template);
        assert_eq!(
            classify(&format!("{hash}.s.vtc")),
            ArtifactKind::StringTemplate
        );
        assert_eq!(classify("compress/css/abc.css"), ArtifactKind::Bundle);
        // A template whose own basename contains `.s` is not a string
        // artifact.
        assert_eq!(
            classify(&format!("page.s.{hash}.vtc")),
            ArtifactKind::Template
        );
        assert_eq!(classify("short.s.vtc"), ArtifactKind::Template);
    }

    #[test]
    fn sizes_and_ages_render_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_age(5), "just now");
        assert_eq!(format_age(120), "2m ago");
        assert_eq!(format_age(2 * 86400), "2d ago");
    }
}
