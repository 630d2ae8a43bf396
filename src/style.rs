//! Style asset binding.
//!
//! A naive pipeline compiles every component's rules into one aggregate
//! stylesheet that all consumers load. Here each entry's stylesheet compiles
//! to its own scoped asset, the entry's module imports it unconditionally,
//! and the asset path is recorded as side-effecting in the manifest so a
//! consuming bundler cannot drop the bindingless import.
//!
//! Binding runs only after every entry has compiled; the manifest needs the
//! full union of asset paths.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::compile::CompiledUnit;
use crate::config::BuildConfig;
use crate::error::BuildError;
use crate::graph::ModuleGraph;

/// Compiled stylesheet text plus the mapping from authored class names to
/// the scoped identifiers that replaced them.
#[derive(Debug, Clone)]
pub struct ScopedStyles {
    pub css: String,
    pub class_map: BTreeMap<String, String>,
}

/// Turns stylesheet source into scoped output. Implementations must be
/// usable from the emission worker pool.
pub trait StyleCompiler: Send + Sync {
    fn compile(&self, owner_logical_name: &str, source: &str) -> Result<ScopedStyles, BuildError>;
}

/// Default scoper: suffixes every class selector with a short hash of the
/// owning entry's logical name. Two entries can then both declare `.label`
/// without their compiled rules ever colliding.
pub struct HashScoper;

lazy_static::lazy_static! {
    // A class selector starts a selector list or follows whitespace or a
    // combinator. This never matches inside numeric tokens like `0.5em`.
    static ref CLASS_SELECTOR_RE: Regex =
        Regex::new(r"(^|[\s,>+~(])\.([A-Za-z_-][A-Za-z0-9_-]*)").unwrap();
}

pub fn scope_suffix(owner_logical_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_logical_name.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl StyleCompiler for HashScoper {
    fn compile(&self, owner_logical_name: &str, source: &str) -> Result<ScopedStyles, BuildError> {
        let suffix = scope_suffix(owner_logical_name);
        let mut class_map = BTreeMap::new();
        let css = CLASS_SELECTOR_RE
            .replace_all(source, |caps: &regex::Captures| {
                let name = &caps[2];
                let scoped = format!("{}-{}", name, suffix);
                class_map.insert(name.to_string(), scoped.clone());
                format!("{}.{}", &caps[1], scoped)
            })
            .to_string();
        Ok(ScopedStyles { css, class_map })
    }
}

/// One bound asset, ready to write.
#[derive(Debug, Clone)]
pub struct StyleAsset {
    pub source_stylesheet_path: PathBuf,
    /// Relative to the output root.
    pub output_asset_path: String,
    pub owner_logical_name: String,
    pub css: String,
    /// Authored class name -> scoped identifier.
    pub class_map: BTreeMap<String, String>,
}

/// Bind each entry's stylesheet: compile it scoped, prepend the side-effect
/// import to the entry's code, and return the assets for the write phase.
///
/// An entry's stylesheet is either imported by the entry module itself or
/// paired as a sibling `<stem>.<ext>` file. Stylesheet imports in internal
/// modules are rejected: a shared module's rules would otherwise end up
/// owned by several entries at once.
pub fn bind_styles(
    config: &BuildConfig,
    graph: &ModuleGraph,
    units: &mut [CompiledUnit],
    compiler: &dyn StyleCompiler,
) -> Result<Vec<StyleAsset>, BuildError> {
    for record in graph.modules.values() {
        if !record.style_imports.is_empty()
            && !graph.entry_names.contains(&record.logical_name)
        {
            return Err(BuildError::type_check(
                &record.logical_name,
                "only entry modules may bind a stylesheet; shared modules cannot \
                 own style rules",
            ));
        }
    }

    let mut assets = Vec::new();
    // Flattening the logical name's segments can make distinct entries
    // (`buttons/primary`, `buttons-primary`) claim the same asset file.
    let mut claimed: BTreeMap<String, String> = BTreeMap::new();
    for unit in units.iter_mut() {
        let record = graph.module(&unit.logical_name)?;
        let stylesheet = match bound_stylesheet(config, record)? {
            Some(path) => path,
            None => continue,
        };

        let absolute = config.source_root.join(&stylesheet);
        let source = fs::read_to_string(&absolute).map_err(|e| {
            BuildError::Discovery(format!("cannot read {}: {}", absolute.display(), e))
        })?;
        // No rules means no asset and no import. An empty side effect would
        // still defeat tree-shaking for nothing.
        if source.trim().is_empty() {
            continue;
        }

        let scoped = compiler.compile(&unit.logical_name, &source)?;
        let output_asset_path = format!(
            "{}/{}.{}",
            config.asset_directory,
            unit.logical_name.replace('/', "-"),
            config.style_extension
        );
        if let Some(first) = claimed.get(&output_asset_path.to_lowercase()) {
            return Err(BuildError::NamingCollision {
                first: first.clone(),
                second: unit.logical_name.clone(),
                output: output_asset_path,
            });
        }
        claimed.insert(output_asset_path.to_lowercase(), unit.logical_name.clone());

        let import_path = relative_import(&unit.logical_name, &output_asset_path);
        unit.code = format!("import '{}';\n{}", import_path, unit.code);
        unit.bound_style_asset = Some(output_asset_path.clone());

        assets.push(StyleAsset {
            source_stylesheet_path: stylesheet,
            output_asset_path,
            owner_logical_name: unit.logical_name.clone(),
            css: scoped.css,
            class_map: scoped.class_map,
        });
    }
    Ok(assets)
}

fn bound_stylesheet(
    config: &BuildConfig,
    record: &crate::graph::ModuleRecord,
) -> Result<Option<PathBuf>, BuildError> {
    match record.style_imports.len() {
        0 => {}
        1 => return Ok(Some(record.style_imports[0].clone())),
        _ => {
            return Err(BuildError::type_check(
                &record.logical_name,
                "an entry may bind at most one stylesheet",
            ));
        }
    }
    let sibling = record.relative_path.with_extension(&config.style_extension);
    if config.source_root.join(&sibling).is_file() {
        return Ok(Some(sibling));
    }
    Ok(None)
}

/// Path from the entry's output module to the asset, both relative to the
/// output root.
fn relative_import(owner_logical_name: &str, asset_path: &str) -> String {
    let depth = owner_logical_name.matches('/').count();
    if depth == 0 {
        format!("./{}", asset_path)
    } else {
        format!("{}{}", "../".repeat(depth), asset_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_selectors_are_suffixed_per_owner() {
        let scoped = HashScoper
            .compile("buttons/primary", ".btn { color: red; }\n.btn:hover .icon { }\n")
            .unwrap();
        let suffix = scope_suffix("buttons/primary");
        assert!(scoped.css.contains(&format!(".btn-{} {{", suffix)));
        assert!(scoped.css.contains(&format!(".icon-{}", suffix)));
        assert_eq!(
            scoped.class_map.get("btn"),
            Some(&format!("btn-{}", suffix))
        );
    }

    #[test]
    fn different_owners_scope_differently() {
        let a = HashScoper.compile("buttons/primary", ".label { }").unwrap();
        let b = HashScoper.compile("text/body", ".label { }").unwrap();
        assert_ne!(a.css, b.css);
    }

    #[test]
    fn numeric_tokens_are_untouched() {
        let scoped = HashScoper
            .compile("card", ".card { margin: 0.5em; padding: .5em; }")
            .unwrap();
        assert!(scoped.css.contains("margin: 0.5em"));
        assert!(scoped.css.contains("padding: .5em"));
    }

    #[test]
    fn import_path_steps_out_of_nested_directories() {
        assert_eq!(
            relative_import("buttons/primary", "assets/buttons-primary.css"),
            "../assets/buttons-primary.css"
        );
        assert_eq!(relative_import("card", "assets/card.css"), "./assets/card.css");
    }
}
