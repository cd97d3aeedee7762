//! Configuration store — effective settings plus the fingerprint trail.
//!
//! # Global vs. instance
//!
//! The engine owns one [`ConfigStore`] for its lifetime. Every explicit
//! global set goes through [`ConfigStore::apply`], which updates the
//! effective [`Settings`] *and* appends a [`TrailEntry`] to the fingerprint
//! trail. The trail is serialized into cache keys, so a configuration
//! change invalidates artifacts compiled under the old configuration.
//!
//! Renderer instances carry a [`SettingsPatch`] of overrides merged over
//! the global settings at render time. Instance values win on conflict and
//! are never written back into the global store or the trail.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Effective engine settings.
///
/// All path fields use `PathBuf`; never `&str` or `String` for filesystem
/// paths. Directory lists preserve configured order — the resolver probes
/// them first to last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Template search directories, probed in order.
    pub base_dirs: Vec<PathBuf>,
    /// Directory holding compiled artifacts (and plugin bundles).
    pub cache_dir: PathBuf,
    /// Template file extension, without the dot.
    pub ext: String,
    /// Compiled artifact extension, without the dot.
    pub cache_ext: String,
    /// Output charset, recorded in the fingerprint trail.
    pub charset: String,
    /// Debug mode: recompile on every render.
    pub debug: bool,
    /// HTML-escape interpolated values unless a region opts out.
    pub auto_escape: bool,
    /// Reject host-function calls at compile time.
    pub sandbox: bool,
    /// Base URL used by URL-rewriting plugins.
    pub base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dirs: vec![PathBuf::from("tpl")],
            cache_dir: PathBuf::from("cache"),
            ext: "tpl".to_owned(),
            cache_ext: "vtc".to_owned(),
            charset: "UTF-8".to_owned(),
            debug: false,
            auto_escape: true,
            sandbox: false,
            base_url: String::new(),
        }
    }
}

impl Settings {
    fn apply(&mut self, setting: &Setting) {
        match setting {
            Setting::BaseDirs(dirs) => self.base_dirs = dirs.clone(),
            Setting::CacheDir(dir) => self.cache_dir = dir.clone(),
            Setting::Ext(ext) => self.ext = ext.clone(),
            Setting::CacheExt(ext) => self.cache_ext = ext.clone(),
            Setting::Charset(charset) => self.charset = charset.clone(),
            Setting::Debug(flag) => self.debug = *flag,
            Setting::AutoEscape(flag) => self.auto_escape = *flag,
            Setting::Sandbox(flag) => self.sandbox = *flag,
            Setting::BaseUrl(url) => self.base_url = url.clone(),
        }
    }

    /// Global settings with an instance patch merged over them.
    ///
    /// `self` is left untouched — instance configuration never leaks back
    /// into the global store.
    pub fn merged(&self, patch: &SettingsPatch) -> Settings {
        let mut merged = self.clone();
        for setting in patch.to_settings() {
            merged.apply(&setting);
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// Setting — the typed unit of explicit configuration
// ---------------------------------------------------------------------------

/// One explicitly-set configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    BaseDirs(Vec<PathBuf>),
    CacheDir(PathBuf),
    Ext(String),
    CacheExt(String),
    Charset(String),
    Debug(bool),
    AutoEscape(bool),
    Sandbox(bool),
    BaseUrl(String),
}

impl Setting {
    /// Stable key name recorded in the fingerprint trail.
    pub fn key(&self) -> &'static str {
        match self {
            Setting::BaseDirs(_) => "base_dirs",
            Setting::CacheDir(_) => "cache_dir",
            Setting::Ext(_) => "ext",
            Setting::CacheExt(_) => "cache_ext",
            Setting::Charset(_) => "charset",
            Setting::Debug(_) => "debug",
            Setting::AutoEscape(_) => "auto_escape",
            Setting::Sandbox(_) => "sandbox",
            Setting::BaseUrl(_) => "base_url",
        }
    }

    fn value_string(&self) -> String {
        match self {
            Setting::BaseDirs(dirs) => dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(","),
            Setting::CacheDir(dir) => dir.display().to_string(),
            Setting::Ext(s) | Setting::CacheExt(s) | Setting::Charset(s) | Setting::BaseUrl(s) => {
                s.clone()
            }
            Setting::Debug(b) | Setting::AutoEscape(b) | Setting::Sandbox(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), self.value_string())
    }
}

// ---------------------------------------------------------------------------
// Fingerprint trail
// ---------------------------------------------------------------------------

/// One entry of the fingerprint trail: a key that was explicitly set
/// globally, with the value it was set to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailEntry {
    pub key: String,
    pub value: String,
}

/// Global configuration store: effective settings plus the ordered trail of
/// every explicit set (duplicates included).
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    settings: Settings,
    trail: Vec<TrailEntry>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one explicit setting and record it in the trail.
    pub fn apply(&mut self, setting: Setting) {
        self.trail.push(TrailEntry {
            key: setting.key().to_owned(),
            value: setting.value_string(),
        });
        self.settings.apply(&setting);
    }

    /// Apply a sequence of settings in order.
    pub fn apply_all<I: IntoIterator<Item = Setting>>(&mut self, settings: I) {
        for setting in settings {
            self.apply(setting);
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn trail(&self) -> &[TrailEntry] {
        &self.trail
    }

    /// `key=value;` serialization used in file-template cache keys.
    pub fn trail_serialized(&self) -> String {
        let mut out = String::new();
        for entry in &self.trail {
            out.push_str(&entry.key);
            out.push('=');
            out.push_str(&entry.value);
            out.push(';');
        }
        out
    }

    /// Concatenated trail values, used in string-template cache keys.
    pub fn trail_values(&self) -> String {
        self.trail.iter().map(|e| e.value.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// SettingsPatch — instance overrides / config-file shape
// ---------------------------------------------------------------------------

/// All-optional mirror of [`Settings`].
///
/// Doubles as the renderer's instance-override set and as the
/// deserialization shape for a YAML settings file. Unset fields fall
/// through to the global value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dirs: Option<Vec<PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ext: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_escape: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl SettingsPatch {
    /// Record one setting in the patch, overwriting any earlier value for
    /// the same key.
    pub fn set(&mut self, setting: Setting) {
        match setting {
            Setting::BaseDirs(v) => self.base_dirs = Some(v),
            Setting::CacheDir(v) => self.cache_dir = Some(v),
            Setting::Ext(v) => self.ext = Some(v),
            Setting::CacheExt(v) => self.cache_ext = Some(v),
            Setting::Charset(v) => self.charset = Some(v),
            Setting::Debug(v) => self.debug = Some(v),
            Setting::AutoEscape(v) => self.auto_escape = Some(v),
            Setting::Sandbox(v) => self.sandbox = Some(v),
            Setting::BaseUrl(v) => self.base_url = Some(v),
        }
    }

    /// Expand the set fields back into [`Setting`] values, in declaration
    /// order.
    pub fn to_settings(&self) -> Vec<Setting> {
        let mut out = Vec::new();
        if let Some(v) = &self.base_dirs {
            out.push(Setting::BaseDirs(v.clone()));
        }
        if let Some(v) = &self.cache_dir {
            out.push(Setting::CacheDir(v.clone()));
        }
        if let Some(v) = &self.ext {
            out.push(Setting::Ext(v.clone()));
        }
        if let Some(v) = &self.cache_ext {
            out.push(Setting::CacheExt(v.clone()));
        }
        if let Some(v) = &self.charset {
            out.push(Setting::Charset(v.clone()));
        }
        if let Some(v) = self.debug {
            out.push(Setting::Debug(v));
        }
        if let Some(v) = self.auto_escape {
            out.push(Setting::AutoEscape(v));
        }
        if let Some(v) = self.sandbox {
            out.push(Setting::Sandbox(v));
        }
        if let Some(v) = &self.base_url {
            out.push(Setting::BaseUrl(v.clone()));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = Settings::default();
        assert_eq!(settings.base_dirs, vec![PathBuf::from("tpl")]);
        assert_eq!(settings.ext, "tpl");
        assert!(settings.auto_escape);
        assert!(!settings.debug);
    }

    #[test]
    fn trail_records_every_explicit_set_in_order() {
        let mut store = ConfigStore::new();
        store.apply(Setting::Charset("UTF-8".into()));
        store.apply(Setting::Debug(true));
        store.apply(Setting::Charset("ISO-8859-1".into()));

        let keys: Vec<_> = store.trail().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["charset", "debug", "charset"]);
        assert_eq!(
            store.trail_serialized(),
            "charset=UTF-8;debug=true;charset=ISO-8859-1;"
        );
        assert_eq!(store.trail_values(), "UTF-8trueISO-8859-1");
        // Last set wins for the effective value.
        assert_eq!(store.settings().charset, "ISO-8859-1");
    }

    #[test]
    fn merged_patch_wins_without_touching_global() {
        let mut store = ConfigStore::new();
        store.apply(Setting::Debug(false));

        let mut patch = SettingsPatch::default();
        patch.set(Setting::Debug(true));
        patch.set(Setting::Ext("html".into()));

        let effective = store.settings().merged(&patch);
        assert!(effective.debug);
        assert_eq!(effective.ext, "html");
        assert!(!store.settings().debug, "global store must be untouched");
        assert_eq!(store.trail().len(), 1, "patch never reaches the trail");
    }

    #[test]
    fn patch_yaml_roundtrip() {
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"debug": true, "base_url": "/static"}"#).unwrap();
        assert_eq!(patch.debug, Some(true));
        assert_eq!(patch.base_url.as_deref(), Some("/static"));
        assert!(patch.cache_dir.is_none());
    }
}
