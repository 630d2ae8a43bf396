//! Output naming.
//!
//! Pure mapping from logical names to output file names. The mapping embeds
//! nothing run-dependent (no timestamps, no randomness) so re-running a
//! build on unchanged sources yields identical paths. Collisions are checked
//! case-insensitively because published packages get unpacked on
//! case-insensitive filesystems.

use std::collections::BTreeMap;

use crate::discovery::SourceEntry;
use crate::error::BuildError;

pub const UMBRELLA_MODULE: &str = "index.js";
pub const UMBRELLA_DECLARATION: &str = "index.d.ts";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// Compiled module file, relative to the output root.
    pub module_file: String,
    /// Declaration file, relative to the output root.
    pub declaration_file: String,
}

/// Map a single logical name to its output paths. The directory structure of
/// the output mirrors the logical name's path segments.
pub fn output_paths(logical_name: &str) -> OutputPaths {
    OutputPaths {
        module_file: format!("{}.js", logical_name),
        declaration_file: format!("{}.d.ts", logical_name),
    }
}

/// Plan output names for every entry, failing on any collision before a
/// single file is written.
pub fn plan_names(entries: &[SourceEntry]) -> Result<BTreeMap<String, OutputPaths>, BuildError> {
    let mut plan = BTreeMap::new();
    let mut claimed: BTreeMap<String, String> = BTreeMap::new();

    // The umbrella owns index.js / index.d.ts at the output root.
    claimed.insert(UMBRELLA_MODULE.to_lowercase(), "<umbrella>".to_string());

    for entry in entries {
        let paths = output_paths(&entry.logical_name);
        let key = paths.module_file.to_lowercase();
        if let Some(owner) = claimed.get(&key) {
            return Err(BuildError::NamingCollision {
                first: owner.clone(),
                second: entry.logical_name.clone(),
                output: paths.module_file,
            });
        }
        claimed.insert(key, entry.logical_name.clone());
        plan.insert(entry.logical_name.clone(), paths);
    }

    Ok(plan)
}
