//! Type declaration emission.
//!
//! Each compiled entry gets a declaration file whose exported shape mirrors
//! the runtime exports one-to-one. The shape must resolve statically: an
//! exported value without a type annotation, or a re-export from an external
//! module with no known contract, fails the build rather than degrading to
//! an untyped surface.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::BuildError;
use crate::graph::{DeclKind, ImportTarget, ImportedName, ModuleGraph};

#[derive(Debug, Clone)]
pub struct DeclarationUnit {
    pub logical_name: String,
    pub text: String,
}

pub fn emit_declarations(graph: &ModuleGraph) -> Result<Vec<DeclarationUnit>, BuildError> {
    graph
        .entry_names
        .iter()
        .map(|entry| emit_entry_declaration(graph, entry))
        .collect()
}

fn emit_entry_declaration(graph: &ModuleGraph, entry: &str) -> Result<DeclarationUnit, BuildError> {
    let closure = graph.type_closure(entry)?;
    let surface = graph.export_surface(entry)?;
    let entry_record = graph.module(entry)?;

    if let Some(reexport) = entry_record.exports.external_reexports.first() {
        return Err(BuildError::declaration_emit(
            entry,
            format!(
                "cannot mirror a re-export from an external module: `{}`",
                reexport.text.trim()
            ),
        ));
    }

    let mut body_sections: Vec<String> = Vec::new();

    // Type declarations from the whole closure, dependencies first.
    for name in &closure {
        let record = graph.module(name)?;
        for (_, text) in &record.type_decls {
            body_sections.push(text.trim_end().to_string());
        }
    }

    // One `declare` per concrete exported binding.
    let mut declared: BTreeSet<&str> = BTreeSet::new();
    let mut bindings: Vec<(&String, &String)> = surface
        .values
        .values()
        .map(|(module, ident)| (module, ident))
        .collect();
    if let Some((module, ident)) = &surface.default {
        bindings.push((module, ident));
    }
    for (module, ident) in bindings {
        if !declared.insert(ident.as_str()) {
            continue;
        }
        let record = graph.module(module)?;
        let decl = record.decls.get(ident).ok_or_else(|| {
            BuildError::declaration_emit(
                entry,
                format!(
                    "`{}` is re-exported from an external module without a known \
                     type contract",
                    ident
                ),
            )
        })?;
        body_sections.push(declare_binding(entry, ident, decl)?);
    }

    let mut export_lines: Vec<String> = Vec::new();
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
        export_lines.push(format!("export {{ {} }};", specs.join(", ")));
    }
    if !surface.types.is_empty() {
        let specs: Vec<String> = surface
            .types
            .iter()
            .map(|(exported, concrete)| {
                if exported == concrete {
                    exported.clone()
                } else {
                    format!("{} as {}", concrete, exported)
                }
            })
            .collect();
        export_lines.push(format!("export type {{ {} }};", specs.join(", ")));
    }
    if let Some((_, ident)) = &surface.default {
        export_lines.push(format!("export default {};", ident));
    }
    if export_lines.is_empty() {
        // A declaration file with no exports would be treated as a script.
        export_lines.push("export {};".to_string());
    }
    body_sections.push(export_lines.join("\n"));

    let body = body_sections.join("\n\n");
    let imports = external_type_imports(graph, &closure, &body)?;
    let text = if imports.is_empty() {
        format!("{}\n", body)
    } else {
        format!("{}\n\n{}\n", imports.join("\n"), body)
    };

    Ok(DeclarationUnit {
        logical_name: entry.to_string(),
        text,
    })
}

fn declare_binding(entry: &str, ident: &str, decl: &DeclKind) -> Result<String, BuildError> {
    match decl {
        DeclKind::Function {
            signature,
            has_return_type,
        } => {
            if !*has_return_type {
                return Err(BuildError::declaration_emit(
                    entry,
                    format!("function `{}` has no return type annotation", ident),
                ));
            }
            let signature = signature.strip_prefix("async ").unwrap_or(signature);
            Ok(format!("declare {};", signature))
        }
        DeclKind::Var { keyword, annotation } => match annotation {
            Some(annotation) => Ok(format!("declare {} {}: {};", keyword, ident, annotation)),
            None => Err(BuildError::declaration_emit(
                entry,
                format!("binding `{}` has no type annotation", ident),
            )),
        },
        DeclKind::Class => Err(BuildError::declaration_emit(
            entry,
            format!(
                "class `{}` cannot be mirrored into a declaration file; export a \
                 typed factory instead",
                ident
            ),
        )),
        DeclKind::TypeAlias | DeclKind::Interface => Err(BuildError::declaration_emit(
            entry,
            format!("`{}` is a type, not a value", ident),
        )),
    }
}

/// External imports the declaration body actually mentions. Type-only and
/// value clauses both qualify; a name is kept when it appears as a word in
/// the emitted body.
fn external_type_imports(
    graph: &ModuleGraph,
    closure: &[String],
    body: &str,
) -> Result<Vec<String>, BuildError> {
    let mut lines: Vec<String> = Vec::new();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    for name in closure {
        let record = graph.module(name)?;
        for import in &record.imports {
            if import.target != ImportTarget::External {
                continue;
            }
            for clause in &import.clauses {
                if !is_word_used(body, &clause.local) {
                    continue;
                }
                let key = (import.specifier.clone(), clause.local.clone());
                if !seen.insert(key) {
                    continue;
                }
                let line = match &clause.imported {
                    ImportedName::Default => {
                        format!("import {} from '{}';", clause.local, import.specifier)
                    }
                    ImportedName::Namespace => {
                        format!("import * as {} from '{}';", clause.local, import.specifier)
                    }
                    ImportedName::Named(imported) if imported == &clause.local => {
                        format!("import {{ {} }} from '{}';", clause.local, import.specifier)
                    }
                    ImportedName::Named(imported) => format!(
                        "import {{ {} as {} }} from '{}';",
                        imported, clause.local, import.specifier
                    ),
                };
                lines.push(line);
            }
        }
    }
    lines.sort();
    Ok(lines)
}

fn is_word_used(body: &str, name: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(name));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(body),
        Err(_) => false,
    }
}
