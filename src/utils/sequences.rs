//! Image sequence enumeration
//!
//! Turns a directory (or a glob pattern) into the ordered list of frame files.
//! Files are filtered by extension (case-insensitive) and sorted lexicographically,
//! so zero-padded numbering (`frame_0001.png`, `frame_0002.png`, ...) plays in order.

use log::debug;
use std::path::{Path, PathBuf};

use crate::core::error::SequenceError;

/// True if the path has one of `extensions` (lowercase, without dot)
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| extensions.contains(&s.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// List frame files for `source`.
///
/// - Directory: every regular file inside it with an accepted extension
/// - Anything containing `*`, `?` or `[`: expanded as a glob pattern
pub fn list_frames(source: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, SequenceError> {
    let text = source.to_string_lossy();
    let mut paths = if text.contains(['*', '?', '[']) {
        glob_paths(&text)?
    } else {
        read_dir_paths(source)?
    };

    paths.retain(|p| p.is_file() && has_extension(p, extensions));
    paths.sort();

    debug!(
        "Found {} frames in {} (extensions: {:?})",
        paths.len(),
        source.display(),
        extensions
    );
    Ok(paths)
}

fn read_dir_paths(dir: &Path) -> Result<Vec<PathBuf>, SequenceError> {
    let io_err = |source| SequenceError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    Ok(paths)
}

/// Expand a glob pattern into a list of paths
fn glob_paths(pattern: &str) -> Result<Vec<PathBuf>, SequenceError> {
    let entries = glob::glob(pattern).map_err(|e| SequenceError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    // Unreadable entries are skipped, same as files with the wrong extension
    Ok(entries.filter_map(Result::ok).collect())
}
