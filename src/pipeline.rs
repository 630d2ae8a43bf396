//! Build orchestration.
//!
//! Phases run strictly in order: discover, name, graph, compile, bind
//! styles, emit declarations, render the umbrella and manifest. Every output
//! byte is planned in memory first; the filesystem write phase starts only
//! once the whole plan exists, so a failing build never leaves partial
//! output behind.

use std::fs;
use std::path::{Path, PathBuf};

use crate::compile::compile_entries;
use crate::config::BuildConfig;
use crate::declgen::emit_declarations;
use crate::discovery::discover_entries;
use crate::error::BuildError;
use crate::graph::ModuleGraph;
use crate::manifest::{render_umbrella, BuildManifest};
use crate::naming::{plan_names, UMBRELLA_DECLARATION, UMBRELLA_MODULE};
use crate::style::{bind_styles, HashScoper, StyleCompiler};

#[derive(Debug)]
pub struct BuildReport {
    pub entries: Vec<String>,
    /// Every file written, relative to the output root, sorted.
    pub written_files: Vec<String>,
}

/// Run a full build with the default style scoper.
pub fn run_build(config: &BuildConfig) -> Result<BuildReport, BuildError> {
    run_build_with(config, &HashScoper)
}

pub fn run_build_with(
    config: &BuildConfig,
    style_compiler: &dyn StyleCompiler,
) -> Result<BuildReport, BuildError> {
    let entries = discover_entries(config)?;
    eprintln!("[libbuild] discovered {} entries", entries.len());

    let names = plan_names(&entries)?;

    let graph = ModuleGraph::build(config, &entries)?;
    eprintln!(
        "[libbuild] graph built: {} modules, verification passed",
        graph.modules.len()
    );

    let mut units = compile_entries(&graph)?;
    let assets = bind_styles(config, &graph, &mut units, style_compiler)?;
    eprintln!(
        "[libbuild] compiled {} entries, bound {} style assets",
        units.len(),
        assets.len()
    );

    let declarations = emit_declarations(&graph)?;
    let umbrella = render_umbrella(&graph)?;
    let manifest = BuildManifest::new(&assets).to_json()?;

    // The plan is complete; nothing below can fail for non-io reasons.
    let mut outputs: Vec<(String, &str)> = Vec::new();
    for unit in &units {
        let paths = names.get(&unit.logical_name).ok_or_else(|| {
            BuildError::type_check(&unit.logical_name, "entry missing from the naming plan")
        })?;
        outputs.push((paths.module_file.clone(), &unit.code));
    }
    for declaration in &declarations {
        let paths = names.get(&declaration.logical_name).ok_or_else(|| {
            BuildError::type_check(&declaration.logical_name, "entry missing from the naming plan")
        })?;
        outputs.push((paths.declaration_file.clone(), &declaration.text));
    }
    for asset in &assets {
        outputs.push((asset.output_asset_path.clone(), &asset.css));
    }
    outputs.push((UMBRELLA_MODULE.to_string(), &umbrella));
    outputs.push((UMBRELLA_DECLARATION.to_string(), &umbrella));
    outputs.push(("package.json".to_string(), &manifest));

    for (relative, content) in &outputs {
        write_output(&config.output_root, relative, content)?;
    }
    eprintln!("[libbuild] wrote {} files", outputs.len());

    let mut written_files: Vec<String> = outputs.into_iter().map(|(p, _)| p).collect();
    written_files.sort();
    Ok(BuildReport {
        entries: entries.into_iter().map(|e| e.logical_name).collect(),
        written_files,
    })
}

fn write_output(output_root: &Path, relative: &str, content: &str) -> Result<(), BuildError> {
    let path: PathBuf = output_root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::ManifestWrite {
            path: parent.display().to_string(),
            message: e.to_string(),
        })?;
    }
    fs::write(&path, content).map_err(|e| BuildError::ManifestWrite {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}
