//! Cache policy and artifact persistence.
//!
//! Recompile when any of: debug flag set, artifact missing, artifact mtime
//! older than the source mtime. A present-but-corrupt artifact (bad
//! sentinel, truncated body) is a cache miss, not an error — a fresh
//! compile overwrites it.
//!
//! Writes go to a `.tmp` sibling and rename into place, so a concurrent
//! reader never observes a partially-written artifact.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use vellum_compiler::Program;

use crate::error::{io_err, EngineError};

/// File-template cache-miss policy, keyed on source mtime.
pub fn needs_compile(artifact: &Path, source: &Path, debug: bool) -> Result<bool, EngineError> {
    if debug {
        return Ok(true);
    }
    let Ok(artifact_meta) = std::fs::metadata(artifact) else {
        return Ok(true);
    };
    let source_meta = std::fs::metadata(source).map_err(|e| io_err(source, e))?;
    let artifact_mtime = artifact_meta.modified().map_err(|e| io_err(artifact, e))?;
    let source_mtime = source_meta.modified().map_err(|e| io_err(source, e))?;
    Ok(artifact_mtime < source_mtime)
}

/// Load a persisted program, or `None` when the artifact is unreadable or
/// invalid (logged at warn; the caller recompiles).
pub fn load_program(artifact: &Path) -> Option<Program> {
    let text = match std::fs::read_to_string(artifact) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!("unreadable artifact {}: {err}", artifact.display());
            return None;
        }
    };
    match Program::from_artifact(&text) {
        Ok(program) => {
            tracing::debug!("cache hit: {}", artifact.display());
            Some(program)
        }
        Err(err) => {
            tracing::warn!("invalid artifact {}: {err}", artifact.display());
            None
        }
    }
}

/// Persist a program atomically (`.tmp` + rename). Creates the cache
/// directory; any filesystem failure is [`EngineError::CacheWrite`].
pub fn write_program(artifact: &Path, program: &Program) -> Result<(), EngineError> {
    let cache_write = |path: &Path, source: std::io::Error| EngineError::CacheWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = artifact.parent() {
        std::fs::create_dir_all(dir).map_err(|e| cache_write(dir, e))?;
    }
    let text = program.to_artifact()?;
    let tmp = PathBuf::from(format!("{}.tmp", artifact.display()));
    std::fs::write(&tmp, &text).map_err(|e| cache_write(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, artifact) {
        let _ = std::fs::remove_file(&tmp);
        return Err(cache_write(artifact, e));
    }
    tracing::info!("wrote artifact: {}", artifact.display());
    Ok(())
}

/// Delete cached files (artifacts and plugin bundles, recursively) whose
/// mtime is older than `max_age`. Returns the deleted paths.
pub fn clean_at(cache_dir: &Path, max_age: Duration) -> Result<Vec<PathBuf>, EngineError> {
    let mut deleted = Vec::new();
    if !cache_dir.exists() {
        return Ok(deleted);
    }
    let cutoff = SystemTime::now() - max_age;
    sweep(cache_dir, cutoff, &mut deleted)?;
    Ok(deleted)
}

fn sweep(dir: &Path, cutoff: SystemTime, deleted: &mut Vec<PathBuf>) -> Result<(), EngineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            sweep(&path, cutoff, deleted)?;
        } else if meta.is_file() {
            let mtime = meta.modified().map_err(|e| io_err(&path, e))?;
            if mtime < cutoff {
                std::fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
                tracing::info!("expired: {}", path.display());
                deleted.push(path);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
