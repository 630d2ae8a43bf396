//! Per-entry compilation.
//!
//! Each public entry compiles to one standalone module: the bodies of every
//! internal module in the entry's runtime closure, inlined dependencies-first,
//! under a hoisted block of deduplicated external imports. Internal modules
//! shared by several entries are inlined into each of them; consumers that
//! import one entry pull in nothing from any other.
//!
//! Emission reads the shared graph and never mutates it, so entries compile
//! in parallel.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use crate::error::BuildError;
use crate::graph::{
    ImportTarget, ImportedName, ModuleGraph, ModuleRecord, ResolvedExport,
};

#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub logical_name: String,
    pub code: String,
    /// External specifiers the emitted code actually imports, after pruning.
    pub imported_externals: BTreeSet<String>,
    /// Output path of the bound style asset, relative to the output root.
    /// Filled in by the style binder.
    pub bound_style_asset: Option<String>,
}

/// Compile every entry in the graph. Output order matches entry order.
pub fn compile_entries(graph: &ModuleGraph) -> Result<Vec<CompiledUnit>, BuildError> {
    graph
        .entry_names
        .par_iter()
        .map(|entry| compile_entry(graph, entry))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// External import hoisting
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ExternalGroup {
    side_effect: bool,
    defaults: Vec<String>,
    namespaces: Vec<String>,
    named: BTreeSet<(String, String)>,
}

fn collect_externals(
    graph: &ModuleGraph,
    closure: &[String],
) -> Result<BTreeMap<String, ExternalGroup>, BuildError> {
    let mut groups: BTreeMap<String, ExternalGroup> = BTreeMap::new();
    for name in closure {
        let record = graph.module(name)?;
        for import in &record.imports {
            if import.target != ImportTarget::External || !import.has_runtime_effect() {
                continue;
            }
            let group = groups.entry(import.specifier.clone()).or_default();
            if import.side_effect_only {
                group.side_effect = true;
            }
            for clause in &import.clauses {
                if clause.type_only {
                    continue;
                }
                match &clause.imported {
                    ImportedName::Default => {
                        if !group.defaults.contains(&clause.local) {
                            group.defaults.push(clause.local.clone());
                        }
                    }
                    ImportedName::Namespace => {
                        if !group.namespaces.contains(&clause.local) {
                            group.namespaces.push(clause.local.clone());
                        }
                    }
                    ImportedName::Named(imported) => {
                        group
                            .named
                            .insert((imported.clone(), clause.local.clone()));
                    }
                }
            }
        }
    }
    Ok(groups)
}

fn render_externals(
    groups: &BTreeMap<String, ExternalGroup>,
    used: &BTreeSet<String>,
) -> (Vec<String>, BTreeSet<String>) {
    let mut lines = Vec::new();
    let mut specifiers = BTreeSet::new();
    for (specifier, group) in groups {
        let defaults: Vec<&String> = group
            .defaults
            .iter()
            .filter(|local| used.contains(*local))
            .collect();
        let named: Vec<&(String, String)> = group
            .named
            .iter()
            .filter(|(_, local)| used.contains(local))
            .collect();

        let mut specs = Vec::new();
        for (imported, local) in &named {
            if imported == local {
                specs.push(imported.clone());
            } else {
                specs.push(format!("{} as {}", imported, local));
            }
        }

        let mut first_line = String::new();
        if let Some(default) = defaults.first() {
            first_line.push_str(default);
        }
        if !specs.is_empty() {
            if !first_line.is_empty() {
                first_line.push_str(", ");
            }
            first_line.push_str(&format!("{{ {} }}", specs.join(", ")));
        }
        let mut group_lines = Vec::new();
        if !first_line.is_empty() {
            group_lines.push(format!("import {} from '{}';", first_line, specifier));
        }
        for default in defaults.iter().skip(1) {
            group_lines.push(format!("import {} from '{}';", default, specifier));
        }
        for namespace in group.namespaces.iter().filter(|l| used.contains(*l)) {
            group_lines.push(format!("import * as {} from '{}';", namespace, specifier));
        }
        if group_lines.is_empty() && group.side_effect {
            group_lines.push(format!("import '{}';", specifier));
        }
        if !group_lines.is_empty() {
            specifiers.insert(specifier.clone());
        }
        lines.extend(group_lines);
    }
    (lines, specifiers)
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal import aliasing
// ─────────────────────────────────────────────────────────────────────────────

/// Aliases bridge an importer's local name to the concrete binding the graph
/// resolved it to. Emitted once per closure, at the first module that needs
/// them.
struct AliasPlan {
    /// local -> concrete expression, for conflict detection.
    bound: BTreeMap<String, String>,
    /// module -> alias statements to emit before that module's body.
    per_module: BTreeMap<String, Vec<String>>,
}

fn plan_aliases(
    graph: &ModuleGraph,
    entry: &str,
    closure: &[String],
) -> Result<AliasPlan, BuildError> {
    let mut plan = AliasPlan {
        bound: BTreeMap::new(),
        per_module: BTreeMap::new(),
    };

    for name in closure {
        let record = graph.module(name)?;
        for import in &record.imports {
            let target = match &import.target {
                ImportTarget::Internal(t) => t,
                ImportTarget::External => continue,
            };
            for clause in &import.clauses {
                if clause.type_only {
                    continue;
                }
                let concrete = match &clause.imported {
                    ImportedName::Named(imported) => {
                        match graph.resolve_named(target, imported)? {
                            Some(ResolvedExport::Value { ident, .. }) => ident,
                            Some(ResolvedExport::Type { .. }) | None => continue,
                        }
                    }
                    ImportedName::Default => match graph.resolve_default(target)? {
                        Some(ResolvedExport::Value { ident, .. }) => ident,
                        Some(ResolvedExport::Type { .. }) | None => {
                            return Err(BuildError::type_check(
                                name,
                                format!("`{}` has no default export", import.specifier),
                            ));
                        }
                    },
                    ImportedName::Namespace => namespace_literal(graph, target)?,
                };
                if concrete == clause.local {
                    continue;
                }
                if let Some(existing) = plan.bound.get(&clause.local) {
                    if existing != &concrete {
                        return Err(BuildError::type_check(
                            name,
                            format!(
                                "binding `{}` is bound to different values within the \
                                 closure of `{}`",
                                clause.local, entry
                            ),
                        ));
                    }
                    continue;
                }
                plan.bound.insert(clause.local.clone(), concrete.clone());
                plan.per_module
                    .entry(name.clone())
                    .or_default()
                    .push(format!("const {} = {};", clause.local, concrete));
            }
        }
    }
    Ok(plan)
}

/// A namespace import becomes an object literal over the target's resolved
/// export surface.
fn namespace_literal(graph: &ModuleGraph, target: &str) -> Result<String, BuildError> {
    let surface = graph.export_surface(target)?;
    let mut fields: Vec<String> = surface
        .values
        .iter()
        .map(|(name, (_, ident))| {
            if name == ident {
                name.clone()
            } else {
                format!("{}: {}", name, ident)
            }
        })
        .collect();
    if let Some((_, ident)) = &surface.default {
        fields.push(format!("default: {}", ident));
    }
    Ok(format!("{{ {} }}", fields.join(", ")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry assembly
// ─────────────────────────────────────────────────────────────────────────────

fn check_binding_collisions(
    graph: &ModuleGraph,
    entry: &str,
    closure: &[String],
    externals: &BTreeMap<String, ExternalGroup>,
    aliases: &AliasPlan,
) -> Result<(), BuildError> {
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    for name in closure {
        let record = graph.module(name)?;
        for declared in &record.declared_names {
            if let Some(owner) = owners.insert(declared.as_str(), name.as_str()) {
                return Err(BuildError::type_check(
                    entry,
                    format!(
                        "top-level binding `{}` is declared by both `{}` and `{}`",
                        declared, owner, name
                    ),
                ));
            }
        }
    }
    let check_import_local = |local: &str| -> Result<(), BuildError> {
        if let Some(owner) = owners.get(local) {
            return Err(BuildError::type_check(
                entry,
                format!(
                    "imported binding `{}` collides with a declaration in `{}`",
                    local, owner
                ),
            ));
        }
        Ok(())
    };
    for group in externals.values() {
        for local in group.defaults.iter().chain(group.namespaces.iter()) {
            check_import_local(local)?;
        }
        for (_, local) in &group.named {
            check_import_local(local)?;
        }
    }
    for local in aliases.bound.keys() {
        check_import_local(local)?;
    }
    Ok(())
}

fn compile_entry(graph: &ModuleGraph, entry: &str) -> Result<CompiledUnit, BuildError> {
    let closure = graph.runtime_closure(entry)?;
    let externals = collect_externals(graph, &closure)?;
    let aliases = plan_aliases(graph, entry, &closure)?;
    check_binding_collisions(graph, entry, &closure, &externals, &aliases)?;

    let surface = graph.export_surface(entry)?;
    let entry_record = graph.module(entry)?;

    // Everything the emitted code can reference, for pruning externals whose
    // bindings no surviving statement uses.
    let mut used: BTreeSet<String> = BTreeSet::new();
    for name in &closure {
        used.extend(graph.module(name)?.referenced.iter().cloned());
    }
    for (_, ident) in surface.values.values() {
        used.insert(ident.clone());
    }
    if let Some((_, ident)) = &surface.default {
        used.insert(ident.clone());
    }

    let mut sections: Vec<String> = Vec::new();
    let (import_lines, imported_externals) = render_externals(&externals, &used);
    if !import_lines.is_empty() {
        sections.push(import_lines.join("\n"));
    }

    for name in &closure {
        let record = graph.module(name)?;
        let mut part = String::new();
        if let Some(lines) = aliases.per_module.get(name) {
            part.push_str(&lines.join("\n"));
        }
        let body = module_body(record);
        if !body.is_empty() {
            if !part.is_empty() {
                part.push('\n');
            }
            part.push_str(&body);
        }
        if !part.is_empty() {
            sections.push(part);
        }
    }

    let mut exports = Vec::new();
    if !surface.values.is_empty() {
        let specs: Vec<String> = surface
            .values
            .iter()
            .map(|(exported, (_, ident))| {
                if exported == ident {
                    exported.clone()
                } else {
                    format!("{} as {}", ident, exported)
                }
            })
            .collect();
        exports.push(format!("export {{ {} }};", specs.join(", ")));
    }
    if let Some((_, ident)) = &surface.default {
        exports.push(format!("export default {};", ident));
    }
    for reexport in &entry_record.exports.external_reexports {
        if !reexport.type_only {
            exports.push(reexport.text.clone());
        }
    }
    if !exports.is_empty() {
        sections.push(exports.join("\n"));
    }

    let mut code = sections.join("\n\n");
    code.push('\n');
    Ok(CompiledUnit {
        logical_name: entry.to_string(),
        code,
        imported_externals,
        bound_style_asset: None,
    })
}

fn module_body(record: &ModuleRecord) -> String {
    record
        .body
        .iter()
        .map(|s| s.trim_end())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
