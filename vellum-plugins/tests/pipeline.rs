//! Both reference plugins running inside a full render.

use std::fs;

use tempfile::TempDir;

use vellum_core::Setting;
use vellum_engine::{Engine, Renderer};
use vellum_plugins::{Compress, CompressOptions, PathReplace, ScriptPos};

#[test]
fn path_replace_then_compress_over_a_real_render() {
    let root = TempDir::new().expect("root");
    let tpl_dir = root.path().join("tpl");
    fs::create_dir_all(&tpl_dir).expect("tpl dir");

    // The stylesheet reference is template-relative; PathReplace rewrites
    // it at parse time, and Compress later ignores it (it is root-relative
    // on disk only for the bundler when local).
    fs::write(
        tpl_dir.join("page.tpl"),
        concat!(
            "<html><head>\n",
            r#"<link rel="stylesheet" href="site.css">"#,
            "\n</head><body>\n<h1>{$title}</h1>\n",
            r#"<script src="app.js"></script>"#,
            "\n</body></html>\n",
        ),
    )
    .expect("write template");
    fs::write(tpl_dir.join("site.css"), "h1 { color: red; }\n").expect("css");
    fs::write(tpl_dir.join("app.js"), "boot();\n").expect("js");

    let mut engine = Engine::new();
    engine.configure(Setting::BaseDirs(vec![tpl_dir.clone()]));
    engine.configure(Setting::CacheDir(root.path().join("cache")));
    engine.register_plugin(PathReplace::new(), None);
    engine.register_plugin(
        Compress::new(CompressOptions {
            // PathReplace prefixed references with the template dir, so the
            // bundler resolves them from the filesystem root.
            asset_root: std::path::PathBuf::from("/"),
            public_url: "/bundles".to_owned(),
            script_pos: ScriptPos::End,
        }),
        None,
    );

    let mut renderer = Renderer::new(&engine);
    renderer.set("title", serde_json::Value::from("Hello & welcome"));
    let out = renderer.render("page").expect("render");

    // Variable interpolated and escaped.
    assert!(out.contains("<h1>Hello &amp; welcome</h1>"), "got: {out}");
    // Original references replaced by one bundle each.
    assert!(!out.contains("site.css"), "got: {out}");
    assert!(!out.contains("app.js"), "got: {out}");
    assert!(out.contains("/bundles/compress/css/"), "got: {out}");
    assert!(out.contains("/bundles/compress/js/"), "got: {out}");
    // Script bundle sits at the end of the body.
    let script_at = out.find("/bundles/compress/js/").expect("script ref");
    let body_at = out.find("</body>").expect("body close");
    assert!(script_at < body_at && script_at > out.find("</head>").expect("head"));

    // Bundle bodies exist under the cache directory.
    let css_dir = root.path().join("cache").join("compress").join("css");
    let js_dir = root.path().join("cache").join("compress").join("js");
    assert_eq!(fs::read_dir(&css_dir).expect("css dir").count(), 1);
    assert_eq!(fs::read_dir(&js_dir).expect("js dir").count(), 1);
}

#[test]
fn unregistering_compress_leaves_output_untouched() {
    let root = TempDir::new().expect("root");
    let tpl_dir = root.path().join("tpl");
    fs::create_dir_all(&tpl_dir).expect("tpl dir");
    fs::write(tpl_dir.join("page.tpl"), "<p>  spaced  </p>").expect("write");

    let mut engine = Engine::new();
    engine.configure(Setting::BaseDirs(vec![tpl_dir]));
    engine.configure(Setting::CacheDir(root.path().join("cache")));
    engine.register_plugin(Compress::new(CompressOptions::default()), Some("compress"));
    assert!(engine.remove_plugin("compress"));

    let out = Renderer::new(&engine).render("page").expect("render");
    assert_eq!(out, "<p>  spaced  </p>");
}
