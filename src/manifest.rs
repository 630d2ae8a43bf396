//! Umbrella entry and package manifest.
//!
//! The umbrella module re-exports every public entry for consumers who do
//! not care about tree-shaking; the manifest points package fields at the
//! umbrella and declares every style asset side-effecting. Content is fully
//! determined by the entry set and asset paths, so re-running an unchanged
//! build writes byte-identical files.

use serde::Serialize;

use crate::error::BuildError;
use crate::graph::ModuleGraph;
use crate::naming::{UMBRELLA_DECLARATION, UMBRELLA_MODULE};
use crate::style::StyleAsset;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildManifest {
    pub module: String,
    pub types: String,
    pub side_effects: Vec<String>,
}

impl BuildManifest {
    pub fn new(assets: &[StyleAsset]) -> Self {
        let mut side_effects: Vec<String> = assets
            .iter()
            .map(|a| format!("./{}", a.output_asset_path))
            .collect();
        side_effects.sort();
        BuildManifest {
            module: format!("./{}", UMBRELLA_MODULE),
            types: format!("./{}", UMBRELLA_DECLARATION),
            side_effects,
        }
    }

    pub fn to_json(&self) -> Result<String, BuildError> {
        let mut json = serde_json::to_string_pretty(self).map_err(|e| {
            BuildError::ManifestWrite {
                path: "package.json".to_string(),
                message: e.to_string(),
            }
        })?;
        json.push('\n');
        Ok(json)
    }
}

/// `buttons/primary` -> `ButtonsPrimary`. Used to give each entry's default
/// export a stable named alias on the umbrella surface.
pub fn umbrella_alias(logical_name: &str) -> String {
    logical_name
        .split(['/', '-', '_', '.'])
        .filter(|seg| !seg.is_empty())
        .map(|seg| {
            let mut chars = seg.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Render the umbrella re-export lines. The same text serves as both the
/// umbrella module and the umbrella declaration file.
pub fn render_umbrella(graph: &ModuleGraph) -> Result<String, BuildError> {
    let mut lines = Vec::new();
    let mut aliases: Vec<(String, String)> = Vec::new();
    for entry in &graph.entry_names {
        lines.push(format!("export * from './{}.js';", entry));
        let surface = graph.export_surface(entry)?;
        if surface.default.is_some() {
            let alias = umbrella_alias(entry);
            if let Some((owner, _)) = aliases.iter().find(|(_, a)| a == &alias) {
                return Err(BuildError::NamingCollision {
                    first: owner.clone(),
                    second: entry.clone(),
                    output: alias,
                });
            }
            aliases.push((entry.clone(), alias.clone()));
            lines.push(format!(
                "export {{ default as {} }} from './{}.js';",
                alias, entry
            ));
        }
    }
    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}
