//! Build error taxonomy.
//!
//! Every error is fatal to the whole build: nothing is retried and no
//! partial output is ever written. The first error encountered is reported
//! with enough context (logical name, offending specifier or path) to locate
//! it in the source tree.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// The source root is missing, unreadable, or matched no entries.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Two distinct logical names normalize to the same output path.
    #[error("naming collision: `{first}` and `{second}` both map to `{output}`")]
    NamingCollision {
        first: String,
        second: String,
        output: String,
    },

    /// A bundle-classified import could not be located inside the source tree.
    #[error("unresolved import `{specifier}` in `{module}`")]
    UnresolvedImport { module: String, specifier: String },

    /// Static verification failed somewhere in the shared graph.
    #[error("type check failed in `{module}`: {message}")]
    TypeCheck { module: String, message: String },

    /// An entry's public shape cannot be statically resolved.
    #[error("declaration emit failed for `{entry}`: {message}")]
    DeclarationEmit { entry: String, message: String },

    /// Output filesystem failure while writing compiled files or the manifest.
    #[error("manifest write failed at `{path}`: {message}")]
    ManifestWrite { path: String, message: String },
}

impl BuildError {
    pub fn type_check(module: &str, message: impl Into<String>) -> Self {
        BuildError::TypeCheck {
            module: module.to_string(),
            message: message.into(),
        }
    }

    pub fn declaration_emit(entry: &str, message: impl Into<String>) -> Self {
        BuildError::DeclarationEmit {
            entry: entry.to_string(),
            message: message.into(),
        }
    }
}
