//! Build configuration surface.
//!
//! A `BuildConfig` is read once per build invocation and is immutable for
//! the duration of the build. The external specifier set in particular must not
//! change mid-build: an identifier classified External for one entry is
//! External for every entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BuildError;

/// Inclusion rule for entry discovery: which extensions count as entry
/// modules and how many directory levels below the source root to look.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntryPattern {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Maximum number of directory segments between the source root and an
    /// entry file. `2` admits `buttons/primary.tsx` and `a/b/c.tsx` but not
    /// `a/b/c/d.tsx`.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_extensions() -> Vec<String> {
    vec!["ts".to_string(), "tsx".to_string()]
}

fn default_max_depth() -> usize {
    2
}

impl Default for EntryPattern {
    fn default() -> Self {
        EntryPattern {
            extensions: default_extensions(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfig {
    pub source_root: PathBuf,
    #[serde(default)]
    pub entry_pattern: EntryPattern,
    /// Import specifiers that are never bundled. Exact-match semantics: a
    /// framework and its runtime helpers must each be listed explicitly.
    #[serde(default)]
    pub external_specs: BTreeSet<String>,
    pub output_root: PathBuf,
    /// Subpath under the output root where compiled style assets land.
    #[serde(default = "default_asset_directory")]
    pub asset_directory: String,
    /// Extension of paired scoped stylesheets (sibling `<stem>.<ext>`).
    #[serde(default = "default_style_extension")]
    pub style_extension: String,
}

fn default_asset_directory() -> String {
    "assets".to_string()
}

fn default_style_extension() -> String {
    "css".to_string()
}

impl BuildConfig {
    pub fn new(source_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        BuildConfig {
            source_root: source_root.into(),
            entry_pattern: EntryPattern::default(),
            external_specs: BTreeSet::new(),
            output_root: output_root.into(),
            asset_directory: default_asset_directory(),
            style_extension: default_style_extension(),
        }
    }

    /// Load a configuration from a JSON file. Unknown fields are rejected so
    /// a typo never silently falls back to a default.
    pub fn from_json_file(path: &Path) -> Result<Self, BuildError> {
        let data = fs::read_to_string(path).map_err(|e| {
            BuildError::Discovery(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            BuildError::Discovery(format!("invalid config {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let cfg: BuildConfig = serde_json::from_str(
            r#"{ "sourceRoot": "src/components", "outputRoot": "dist" }"#,
        )
        .unwrap();
        assert_eq!(cfg.entry_pattern.max_depth, 2);
        assert_eq!(cfg.asset_directory, "assets");
        assert_eq!(cfg.style_extension, "css");
        assert!(cfg.external_specs.is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<BuildConfig, _> = serde_json::from_str(
            r#"{ "sourceRoot": "s", "outputRoot": "d", "entryGlob": "**/*.ts" }"#,
        );
        assert!(result.is_err());
    }
}
