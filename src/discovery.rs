//! Entry discovery.
//!
//! Walks the source root and returns the deterministic, path-sorted list of
//! public entry modules. Only filesystem reads happen here; discovery never
//! writes.
//!
//! Path segments starting with `.` or `_` (and `node_modules`) are never
//! entries. Underscore-prefixed modules stay importable as internal code but
//! are not part of the published surface.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::error::BuildError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Path relative to the source root.
    pub relative_path: PathBuf,
    /// Relative path with the extension stripped, `/`-separated. Unique
    /// across the build.
    pub logical_name: String,
}

/// Turn a path relative to the source root into a logical name.
pub fn logical_name_of(relative: &Path) -> String {
    let no_ext = relative.with_extension("");
    no_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_private_segment(segment: &str) -> bool {
    segment.starts_with('.') || segment.starts_with('_') || segment == "node_modules"
}

/// Discover all entry modules under the configured source root.
pub fn discover_entries(config: &BuildConfig) -> Result<Vec<SourceEntry>, BuildError> {
    let root = &config.source_root;
    if !root.is_dir() {
        return Err(BuildError::Discovery(format!(
            "source root {} does not exist or is not a directory",
            root.display()
        )));
    }

    let pattern = &config.entry_pattern;
    let mut entries = Vec::new();

    // walkdir depth counts the file itself, so a file N directories deep
    // sits at walkdir depth N + 1.
    let walker = WalkDir::new(root)
        .max_depth(pattern.max_depth + 1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            e.file_name()
                .to_str()
                .map(|name| !is_private_segment(name))
                .unwrap_or(false)
        });

    for entry in walker {
        let entry = entry.map_err(|e| BuildError::Discovery(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(e) => e,
            None => continue,
        };
        if !pattern.extensions.iter().any(|allowed| allowed == ext) {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|e| BuildError::Discovery(e.to_string()))?
            .to_path_buf();
        let logical_name = logical_name_of(&relative);
        entries.push(SourceEntry {
            relative_path: relative,
            logical_name,
        });
    }

    if entries.is_empty() {
        return Err(BuildError::Discovery(format!(
            "no entry modules matched under {}",
            root.display()
        )));
    }

    entries.sort_by(|a, b| a.logical_name.cmp(&b.logical_name));

    // Logical names must be unique: `foo.ts` next to `foo.tsx` would
    // otherwise fight over one output file.
    for pair in entries.windows(2) {
        if pair[0].logical_name == pair[1].logical_name {
            return Err(BuildError::NamingCollision {
                first: pair[0].relative_path.display().to_string(),
                second: pair[1].relative_path.display().to_string(),
                output: pair[0].logical_name.clone(),
            });
        }
    }

    Ok(entries)
}
