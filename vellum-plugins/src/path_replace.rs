//! PathReplace — rewrite relative asset references in template source.
//!
//! Runs on `afterParse`, so the rewrites land in the compiled artifact.
//! A reference is rewritten to `<base_url>/<collapse(template_dir/url)>`;
//! absolute paths, fragments, protocol-relative and scheme'd URLs, and
//! template expressions are left untouched.

use anyhow::Result;
use regex::{Captures, Regex};

use vellum_core::{HookContext, HookKind, Plugin};

/// Asset-bearing tags whose `src`/`href`/`action`/`data` attributes are
/// rewritten.
const TAG_PATTERN: &str =
    r"(?i)<(?:img|script|link|a|form|input|object|embed)\b[^>]*>";

const ATTR_PATTERN: &str = r#"(?i)\b(src|href|action|data)\s*=\s*"([^"]*)""#;

pub struct PathReplace {
    tag_re: Regex,
    attr_re: Regex,
}

impl PathReplace {
    pub fn new() -> Self {
        Self {
            tag_re: Regex::new(TAG_PATTERN).expect("static pattern"),
            attr_re: Regex::new(ATTR_PATTERN).expect("static pattern"),
        }
    }
}

impl Default for PathReplace {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for PathReplace {
    fn hooks(&self) -> &[HookKind] {
        &[HookKind::AfterParse]
    }

    fn after_parse(&self, ctx: &mut HookContext) -> Result<()> {
        let base_url = ctx.conf.base_url.trim_end_matches('/').to_owned();
        let template_dir = ctx
            .template_dir
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_default();

        ctx.code = self
            .tag_re
            .replace_all(&ctx.code, |tag: &Captures<'_>| {
                self.attr_re
                    .replace_all(&tag[0], |attr: &Captures<'_>| {
                        let url = &attr[2];
                        if is_rewritable(url) {
                            format!(r#"{}="{}""#, &attr[1], rewrite(url, &base_url, &template_dir))
                        } else {
                            attr[0].to_owned()
                        }
                    })
                    .into_owned()
            })
            .into_owned();
        Ok(())
    }
}

/// Relative references only: everything anchored elsewhere stays put.
fn is_rewritable(url: &str) -> bool {
    if url.is_empty()
        || url.starts_with('/')
        || url.starts_with('#')
        || url.starts_with('{')
    {
        return false;
    }
    // Scheme'd URLs (http:, mailto:, data:, …).
    let scheme = url
        .split_once(':')
        .map(|(scheme, _)| {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        })
        .unwrap_or(false);
    !scheme
}

fn rewrite(url: &str, base_url: &str, template_dir: &str) -> String {
    let joined = if template_dir.is_empty() {
        url.to_owned()
    } else {
        format!("{}/{url}", template_dir.trim_end_matches('/'))
    };
    let collapsed = collapse_dots(&joined);
    if base_url.is_empty() {
        collapsed
    } else {
        format!("{base_url}/{collapsed}")
    }
}

/// Collapse `./` and `../` segments; `..` beyond the root is dropped.
fn collapse_dots(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::Settings;

    fn run(source: &str, base_url: &str, template_dir: Option<&str>) -> String {
        let mut conf = Settings::default();
        conf.base_url = base_url.to_owned();
        let mut ctx = HookContext::new(source, conf);
        if let Some(dir) = template_dir {
            ctx.template_dir = Some(dir.into());
        }
        PathReplace::new().after_parse(&mut ctx).unwrap();
        ctx.code
    }

    #[test]
    fn relative_src_is_rewritten() {
        let out = run(
            r#"<img src="img/logo.png">"#,
            "http://example.com",
            Some("tpl"),
        );
        assert_eq!(out, r#"<img src="http://example.com/tpl/img/logo.png">"#);
    }

    #[test]
    fn dot_segments_collapse() {
        let out = run(
            r#"<script src="../js/./app.js"></script>"#,
            "/static",
            Some("tpl/admin"),
        );
        assert_eq!(out, r#"<script src="/static/tpl/js/app.js"></script>"#);
    }

    #[test]
    fn anchored_references_are_untouched() {
        for url in [
            "http://cdn.example.com/a.css",
            "//cdn.example.com/a.css",
            "/rooted/a.css",
            "#section",
            "mailto:a@example.com",
            "{$dynamic}",
        ] {
            let source = format!(r#"<a href="{url}">x</a>"#);
            assert_eq!(run(&source, "/static", Some("tpl")), source);
        }
    }

    #[test]
    fn form_action_and_link_href_are_covered() {
        let out = run(
            r#"<form action="submit.php"><link rel="stylesheet" href="css/a.css">"#,
            "/app",
            Some("tpl"),
        );
        assert_eq!(
            out,
            r#"<form action="/app/tpl/submit.php"><link rel="stylesheet" href="/app/tpl/css/a.css">"#
        );
    }

    #[test]
    fn attributes_outside_asset_tags_are_untouched() {
        let source = r#"<span data-note="x" href="y"></span>"#;
        assert_eq!(run(source, "/app", Some("tpl")), source);
    }

    #[test]
    fn empty_base_url_keeps_paths_relative() {
        let out = run(r#"<img src="logo.png">"#, "", Some("tpl"));
        assert_eq!(out, r#"<img src="tpl/logo.png">"#);
    }

    #[test]
    fn no_template_dir_still_applies_base_url() {
        let out = run(r#"<img src="logo.png">"#, "/static/", None);
        assert_eq!(out, r#"<img src="/static/logo.png">"#);
    }
}
