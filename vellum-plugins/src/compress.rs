//! Compress — minify rendered HTML and bundle local assets.
//!
//! Runs on `afterDraw`. Local stylesheet and script references are read
//! from the configured asset root, concatenated, light-minified, and
//! written once to `<cache_dir>/compress/{css,js}/<hash>.<ext>`. The hash
//! covers the referenced *file names* only, so an existing bundle is never
//! regenerated — the operator clears stale bundles (or runs the cache
//! expiry sweep).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use vellum_core::{HookContext, HookKind, Plugin};

/// Where the single bundled `<script>` reference is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptPos {
    /// Before `</head>`.
    Head,
    /// Before `</body>` (default — scripts load last).
    #[default]
    End,
}

/// Construction-time options for [`Compress`].
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Directory local asset references resolve against on disk.
    pub asset_root: PathBuf,
    /// URL prefix for bundle references in the output. Empty means the
    /// cache directory path itself is used as the prefix.
    pub public_url: String,
    pub script_pos: ScriptPos,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            public_url: String::new(),
            script_pos: ScriptPos::default(),
        }
    }
}

pub struct Compress {
    options: CompressOptions,
    comment_re: Regex,
    whitespace_re: Regex,
    link_re: Regex,
    script_re: Regex,
    href_re: Regex,
}

impl Compress {
    pub fn new(options: CompressOptions) -> Self {
        Self {
            options,
            comment_re: Regex::new(r"(?s)<!--.*?-->").expect("static pattern"),
            whitespace_re: Regex::new(r"\s+").expect("static pattern"),
            link_re: Regex::new(r#"(?i)<link\b[^>]*rel\s*=\s*"stylesheet"[^>]*>"#)
                .expect("static pattern"),
            script_re: Regex::new(r#"(?is)<script\b[^>]*\bsrc\s*=\s*"([^"]*)"[^>]*>\s*</script>"#)
                .expect("static pattern"),
            href_re: Regex::new(r#"(?i)\bhref\s*=\s*"([^"]*)""#).expect("static pattern"),
        }
    }

    fn bundle_url(&self, ctx: &HookContext, kind: &str, file: &str) -> String {
        let prefix = if self.options.public_url.is_empty() {
            ctx.conf.cache_dir.display().to_string()
        } else {
            self.options.public_url.trim_end_matches('/').to_owned()
        };
        format!("{prefix}/compress/{kind}/{file}")
    }

    /// Concatenate + minify the named assets into one bundle file, written
    /// create-once. Returns the bundle file name.
    fn bundle(
        &self,
        ctx: &HookContext,
        kind: &str,
        ext: &str,
        urls: &[String],
        minify: fn(&str) -> String,
    ) -> Result<String> {
        let names: String = urls
            .iter()
            .map(|u| basename(u))
            .collect::<Vec<_>>()
            .join(",");
        let file = format!("{}.{ext}", name_hash(&names));
        let path = ctx.conf.cache_dir.join("compress").join(kind).join(&file);

        if !path.is_file() {
            let mut body = String::new();
            for url in urls {
                // Root-relative references resolve under the asset root, so
                // the leading slash must not reset the join to `/`.
                let asset = self.options.asset_root.join(url.trim_start_matches('/'));
                let content = std::fs::read_to_string(&asset)
                    .with_context(|| format!("reading asset {}", asset.display()))?;
                body.push_str(&minify(&content));
                body.push('\n');
            }
            let dir = path.parent().context("bundle path has no parent")?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating bundle dir {}", dir.display()))?;
            let tmp = PathBuf::from(format!("{}.tmp", path.display()));
            std::fs::write(&tmp, &body)
                .with_context(|| format!("writing bundle {}", tmp.display()))?;
            std::fs::rename(&tmp, &path)
                .with_context(|| format!("renaming bundle into {}", path.display()))?;
        }
        Ok(file)
    }
}

impl Plugin for Compress {
    fn hooks(&self) -> &[HookKind] {
        &[HookKind::AfterDraw]
    }

    fn after_draw(&self, ctx: &mut HookContext) -> Result<()> {
        let mut output = minify_html(&ctx.code, &self.comment_re, &self.whitespace_re);

        // Stylesheets: collect local references, drop the tags, bundle.
        let mut stylesheets = Vec::new();
        output = self
            .link_re
            .replace_all(&output, |caps: &Captures<'_>| {
                match self
                    .href_re
                    .captures(&caps[0])
                    .map(|href| href[1].to_owned())
                    .filter(|url| is_local(url))
                {
                    Some(url) => {
                        stylesheets.push(url);
                        String::new()
                    }
                    None => caps[0].to_owned(),
                }
            })
            .into_owned();

        // Scripts: same.
        let mut scripts = Vec::new();
        output = self
            .script_re
            .replace_all(&output, |caps: &Captures<'_>| {
                if is_local(&caps[1]) {
                    scripts.push(caps[1].to_owned());
                    String::new()
                } else {
                    caps[0].to_owned()
                }
            })
            .into_owned();

        if !stylesheets.is_empty() {
            let file = self.bundle(ctx, "css", "css", &stylesheets, minify_css)?;
            let tag = format!(
                r#"<link rel="stylesheet" href="{}">"#,
                self.bundle_url(ctx, "css", &file)
            );
            output = insert_before(&output, "</head>", &tag);
        }

        if !scripts.is_empty() {
            let file = self.bundle(ctx, "js", "js", &scripts, minify_js)?;
            let tag = format!(
                r#"<script src="{}"></script>"#,
                self.bundle_url(ctx, "js", &file)
            );
            let anchor = match self.options.script_pos {
                ScriptPos::Head => "</head>",
                ScriptPos::End => "</body>",
            };
            output = insert_before(&output, anchor, &tag);
        }

        ctx.code = output;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Only references the bundler can read from disk: no scheme, not
/// protocol-relative. Root-relative paths resolve under the asset root.
fn is_local(url: &str) -> bool {
    !url.is_empty() && !url.starts_with("//") && !url.contains(':') && !url.starts_with('{')
}

fn basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// First 32 hex chars of SHA-256 over the joined base names — deliberately
/// content-independent.
fn name_hash(names: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(names.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(32);
    digest
}

fn insert_before(output: &str, anchor: &str, tag: &str) -> String {
    match output.find(anchor) {
        Some(at) => format!("{}{tag}{}", &output[..at], &output[at..]),
        None => format!("{output}{tag}"),
    }
}

/// Strip comments (conditional comments survive) and collapse whitespace
/// runs. Best-effort: not a parser.
fn minify_html(html: &str, comment_re: &Regex, whitespace_re: &Regex) -> String {
    let stripped = comment_re.replace_all(html, |caps: &Captures<'_>| {
        if caps[0].starts_with("<!--[if") {
            caps[0].to_owned()
        } else {
            String::new()
        }
    });
    whitespace_re.replace_all(stripped.trim(), " ").into_owned()
}

fn minify_css(css: &str) -> String {
    let comment_re = Regex::new(r"(?s)/\*.*?\*/").expect("static pattern");
    let stripped = comment_re.replace_all(css, "");
    stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Conservative: drop blank lines and trailing whitespace only. Anything
/// smarter needs a real tokenizer to not break string literals.
fn minify_js(js: &str) -> String {
    js.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
