//! # libbuild
//!
//! Build orchestration core for a publishable component library: every
//! public source module compiles to its own importable output file, with its
//! own scoped style asset and declaration file, under deterministic names.
//!
//! ## Invariants
//!
//! 1. **Tree-shakability**: importing one entry's output never loads another
//!    entry's code. Shared internal modules are inlined into each entry that
//!    needs them.
//! 2. **One graph**: parsing and static verification run once over the whole
//!    entry set; per-entry emission reads the graph and mutates nothing
//!    shared.
//! 3. **Uniform classification**: an import specifier classified External is
//!    External for every entry of the build.
//! 4. **Styles travel with their component**: a bound stylesheet becomes a
//!    scoped sibling asset, imported unconditionally and declared
//!    side-effecting in the manifest.
//! 5. **Fail fast, write late**: the first error aborts the build before the
//!    write phase starts. No partial output, ever.
//! 6. **Determinism**: rebuilding unchanged sources yields byte-identical
//!    output files and manifest.

mod classify;
mod compile;
mod config;
mod declgen;
mod discovery;
mod error;
mod graph;
mod manifest;
mod naming;
mod pipeline;
mod style;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod graph_tests;
#[cfg(test)]
mod pipeline_tests;

pub use classify::{Classifier, ImportKind, ResolvedImport};
pub use compile::{compile_entries, CompiledUnit};
pub use config::{BuildConfig, EntryPattern};
pub use declgen::{emit_declarations, DeclarationUnit};
pub use discovery::{discover_entries, SourceEntry};
pub use error::BuildError;
pub use graph::ModuleGraph;
pub use manifest::{render_umbrella, umbrella_alias, BuildManifest};
pub use naming::{output_paths, plan_names, OutputPaths};
pub use pipeline::{run_build, run_build_with, BuildReport};
pub use style::{bind_styles, HashScoper, ScopedStyles, StyleAsset, StyleCompiler};
