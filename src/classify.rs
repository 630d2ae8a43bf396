//! Dependency classification.
//!
//! Decides, per import specifier, whether the import is bundled into the
//! importing entry's output or left external for the host environment to
//! resolve at runtime. External status is an exact match against the
//! configured specifier set; the set is immutable during a build, so the
//! classification is uniform across every entry by construction.

use std::path::{Component, Path, PathBuf};

use crate::config::BuildConfig;
use crate::discovery::logical_name_of;
use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Bundle,
    External,
}

/// Resolution result for a bundle-classified specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedImport {
    /// An internal script module: its logical name plus the source file it
    /// resolved to, relative to the source root.
    Module {
        logical_name: String,
        relative_path: PathBuf,
    },
    /// A stylesheet inside the source tree, path relative to the source root.
    Stylesheet(PathBuf),
}

pub struct Classifier<'a> {
    config: &'a BuildConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a BuildConfig) -> Self {
        Classifier { config }
    }

    pub fn classify(&self, specifier: &str) -> ImportKind {
        if self.config.external_specs.contains(specifier) {
            ImportKind::External
        } else {
            ImportKind::Bundle
        }
    }

    /// Resolve a bundle-classified specifier encountered in `importer`
    /// (a module path relative to the source root). Relative specifiers
    /// resolve against the importer's directory, bare specifiers against the
    /// source root itself.
    pub fn resolve(
        &self,
        importer: &Path,
        importer_logical: &str,
        specifier: &str,
    ) -> Result<ResolvedImport, BuildError> {
        let base = if specifier.starts_with('.') {
            let dir = importer.parent().unwrap_or_else(|| Path::new(""));
            normalize(&dir.join(specifier))
        } else {
            normalize(Path::new(specifier))
        };

        let base = match base {
            Some(p) => p,
            None => {
                return Err(BuildError::UnresolvedImport {
                    module: importer_logical.to_string(),
                    specifier: specifier.to_string(),
                })
            }
        };

        let root = &self.config.source_root;

        // Stylesheets resolve by exact path only.
        if base
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == self.config.style_extension)
            .unwrap_or(false)
        {
            if root.join(&base).is_file() {
                return Ok(ResolvedImport::Stylesheet(base));
            }
            return Err(BuildError::UnresolvedImport {
                module: importer_logical.to_string(),
                specifier: specifier.to_string(),
            });
        }

        for candidate in self.module_candidates(&base) {
            if root.join(&candidate).is_file() {
                return Ok(ResolvedImport::Module {
                    logical_name: logical_name_of(&candidate),
                    relative_path: candidate,
                });
            }
        }

        Err(BuildError::UnresolvedImport {
            module: importer_logical.to_string(),
            specifier: specifier.to_string(),
        })
    }

    fn module_candidates(&self, base: &Path) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if base.extension().is_some() {
            candidates.push(base.to_path_buf());
        }
        for ext in &self.config.entry_pattern.extensions {
            candidates.push(base.with_extension(ext));
            candidates.push(base.join(format!("index.{}", ext)));
        }
        candidates
    }
}

/// Lexically fold `.` and `..` segments. Returns None when the path escapes
/// the source root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop()?;
            }
            Component::Normal(seg) => out.push(seg.to_string_lossy().to_string()),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out.iter().collect())
}
