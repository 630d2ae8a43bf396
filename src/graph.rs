//! Shared module graph.
//!
//! Every source file in the build is parsed exactly once, up front. The
//! resulting graph is immutable and read-only during per-entry emission, so
//! emission can fan out across a worker pool without re-parsing anything.
//!
//! Parsing normalizes each module into plain data:
//! - runtime body statements, sliced from the source with type syntax erased
//!   and `export` keywords stripped,
//! - an export map (exported name -> origin, including re-export chains),
//! - classified imports,
//! - declaration info for the declaration emitter (original, annotated text).
//!
//! Static verification runs once across the whole entry set so error
//! locations are consistent build-wide: syntax errors, imports of missing
//! exports, and internal import cycles all abort here, before any entry is
//! emitted.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use rayon::prelude::*;
use regex::Regex;

use crate::classify::{Classifier, ImportKind, ResolvedImport};
use crate::config::BuildConfig;
use crate::discovery::SourceEntry;
use crate::error::BuildError;

// ═══════════════════════════════════════════════════════════════════════════════
// MODULE RECORD TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedName {
    Default,
    Namespace,
    Named(String),
}

#[derive(Debug, Clone)]
pub struct ImportClause {
    pub imported: ImportedName,
    pub local: String,
    pub type_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    Internal(String),
    External,
}

#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub specifier: String,
    pub target: ImportTarget,
    pub clauses: Vec<ImportClause>,
    /// `import './thing';` — no bindings, retained for its effect.
    pub side_effect_only: bool,
    pub type_only: bool,
}

impl ImportRecord {
    /// Whether this import must exist at runtime (not erasable type syntax).
    pub fn has_runtime_effect(&self) -> bool {
        if self.type_only {
            return false;
        }
        self.side_effect_only || self.clauses.iter().any(|c| !c.type_only)
    }
}

#[derive(Debug, Clone)]
pub enum ExportOrigin {
    /// A binding declared (or imported) in this module.
    Local(String),
    ReexportNamed { module: String, name: String },
    ReexportDefault { module: String },
}

#[derive(Debug, Clone)]
pub struct ExternalReexport {
    pub text: String,
    pub type_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExportMap {
    /// Runtime value exports: exported name -> origin.
    pub values: BTreeMap<String, ExportOrigin>,
    /// Type exports: exported name -> concrete declaration name.
    pub types: BTreeMap<String, String>,
    pub default: Option<ExportOrigin>,
    /// `export * from './internal'` targets, in source order.
    pub star_from: Vec<String>,
    /// Verbatim `export ... from 'external'` statements. Preserved in the
    /// compiled module; always a DeclarationEmitError for the entry surface.
    pub external_reexports: Vec<ExternalReexport>,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Function {
        /// Original annotated text up to the body.
        signature: String,
        has_return_type: bool,
    },
    Var {
        keyword: String,
        annotation: Option<String>,
    },
    Class,
    TypeAlias,
    Interface,
}

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub logical_name: String,
    pub relative_path: PathBuf,
    pub imports: Vec<ImportRecord>,
    pub exports: ExportMap,
    /// Runtime statements, type-erased, export keywords stripped.
    pub body: Vec<String>,
    /// Type-level declarations: (name, original annotated text).
    pub type_decls: Vec<(String, String)>,
    /// Top-level declaration info by local identifier.
    pub decls: BTreeMap<String, DeclKind>,
    /// Every top-level runtime binding introduced by this module's body.
    pub declared_names: BTreeSet<String>,
    /// Every identifier referenced anywhere in the module.
    pub referenced: BTreeSet<String>,
    /// Stylesheets this module imports, relative to the source root.
    pub style_imports: Vec<PathBuf>,
}

/// Result of resolving an exported name to its concrete origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedExport {
    Value { module: String, ident: String },
    Type { name: String },
}

/// The fully resolved public shape of one module: every exported name mapped
/// to the concrete binding (or type declaration) that backs it, with
/// `export *` chains expanded.
#[derive(Debug, Clone, Default)]
pub struct ExportSurface {
    /// Exported name -> concrete value binding.
    pub values: BTreeMap<String, (String, String)>,
    /// Exported name -> concrete type declaration name.
    pub types: BTreeMap<String, String>,
    /// Concrete binding behind `export default`, if any.
    pub default: Option<(String, String)>,
}

#[derive(Debug)]
pub struct ModuleGraph {
    pub modules: BTreeMap<String, ModuleRecord>,
    pub entry_names: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPE ERASURE
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static::lazy_static! {
    /// `a?: T` leaves `a?` behind once the annotation span is deleted.
    static ref OPTIONAL_MARKER_RE: Regex = Regex::new(r"\?([,)])").unwrap();
    static ref TRAILING_WS_RE: Regex = Regex::new(r"[ \t]+\n").unwrap();
}

/// Collects deletion spans for TypeScript-only syntax. Nested spans are
/// tolerated; the applier skips anything inside an already-deleted range.
#[derive(Default)]
struct TypeEraser {
    deletions: Vec<(u32, u32)>,
}

impl<'a> Visit<'a> for TypeEraser {
    fn visit_ts_type_annotation(&mut self, it: &TSTypeAnnotation<'a>) {
        self.deletions.push((it.span.start, it.span.end));
    }

    fn visit_ts_type_parameter_declaration(&mut self, it: &TSTypeParameterDeclaration<'a>) {
        self.deletions.push((it.span.start, it.span.end));
    }

    fn visit_ts_as_expression(&mut self, it: &TSAsExpression<'a>) {
        self.deletions.push((it.expression.span().end, it.span.end));
        oxc_ast_visit::walk::walk_ts_as_expression(self, it);
    }

    fn visit_ts_satisfies_expression(&mut self, it: &TSSatisfiesExpression<'a>) {
        self.deletions.push((it.expression.span().end, it.span.end));
        oxc_ast_visit::walk::walk_ts_satisfies_expression(self, it);
    }

    fn visit_ts_non_null_expression(&mut self, it: &TSNonNullExpression<'a>) {
        self.deletions.push((it.expression.span().end, it.span.end));
        oxc_ast_visit::walk::walk_ts_non_null_expression(self, it);
    }
}

struct ReferenceCollector {
    names: BTreeSet<String>,
}

impl<'a> Visit<'a> for ReferenceCollector {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }
}

/// Slice `span` from the source with the type-erasure deletions applied.
fn erased_slice(source: &str, span: Span, deletions: &[(u32, u32)]) -> String {
    let start = span.start as usize;
    let end = span.end as usize;
    let mut out = String::with_capacity(end - start);
    let mut cursor = start;
    for &(del_start, del_end) in deletions {
        let (ds, de) = (del_start as usize, del_end as usize);
        if de <= start || ds >= end {
            continue;
        }
        if ds < cursor {
            // Nested inside an earlier deletion.
            continue;
        }
        out.push_str(&source[cursor..ds]);
        cursor = de.min(end);
    }
    out.push_str(&source[cursor..end]);
    let out = OPTIONAL_MARKER_RE.replace_all(&out, "$1").to_string();
    TRAILING_WS_RE.replace_all(&out, "\n").to_string()
}

fn plain_slice(source: &str, span: Span) -> String {
    source[span.start as usize..span.end as usize].to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// PER-MODULE PARSE
// ═══════════════════════════════════════════════════════════════════════════════

fn module_export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

fn collect_pattern_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match pattern {
        BindingPattern::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPattern::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_pattern_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPattern::ArrayPattern(arr) => {
            for elem in arr.elements.iter().flatten() {
                collect_pattern_names(elem, names);
            }
            if let Some(rest) = &arr.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        _ => {}
    }
}

fn variable_keyword(kind: VariableDeclarationKind) -> &'static str {
    match kind {
        VariableDeclarationKind::Let => "let",
        VariableDeclarationKind::Var => "var",
        _ => "const",
    }
}

/// Extract the type annotation of a declarator from its original text:
/// `name: Annotation = init`. Scans for the `=` that starts the initializer,
/// skipping `=>` inside function-type annotations and any bracketed nesting.
fn declarator_annotation(text: &str) -> Option<String> {
    let colon = find_top_level(text, |c| c == ':')?;
    let rest = &text[colon + 1..];
    let eq = find_initializer_eq(rest);
    let annotation = match eq {
        Some(idx) => &rest[..idx],
        None => rest,
    };
    let annotation = annotation.trim().trim_end_matches(';').trim();
    if annotation.is_empty() {
        None
    } else {
        Some(annotation.to_string())
    }
}

fn find_top_level(text: &str, pred: impl Fn(char) -> bool) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            _ if depth == 0 && pred(c) => return Some(i),
            _ => {}
        }
    }
    None
}

fn find_initializer_eq(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b'>' => {
                // `=>` arrows were consumed below; a bare `>` closes a generic.
                depth -= 1;
            }
            b'=' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'>' {
                    i += 2;
                    continue;
                }
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn default_symbol(logical_name: &str) -> String {
    let mangled: String = logical_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("_default_{}", mangled)
}

struct ModuleParser<'a> {
    config: &'a BuildConfig,
    classifier: Classifier<'a>,
}

impl<'a> ModuleParser<'a> {
    fn new(config: &'a BuildConfig) -> Self {
        ModuleParser {
            config,
            classifier: Classifier::new(config),
        }
    }

    fn parse(&self, logical_name: &str, relative_path: &PathBuf) -> Result<ModuleRecord, BuildError> {
        let absolute = self.config.source_root.join(relative_path);
        let source = fs::read_to_string(&absolute).map_err(|e| {
            BuildError::Discovery(format!("cannot read {}: {}", absolute.display(), e))
        })?;

        let allocator = Allocator::default();
        let is_jsx = relative_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.ends_with('x'))
            .unwrap_or(false);
        let source_type = SourceType::default()
            .with_typescript(true)
            .with_module(true)
            .with_jsx(is_jsx);

        let ret = Parser::new(&allocator, &source, source_type).parse();
        if let Some(error) = ret.errors.first() {
            return Err(BuildError::type_check(
                logical_name,
                format!("syntax error: {:?}", error),
            ));
        }

        let mut eraser = TypeEraser::default();
        eraser.visit_program(&ret.program);
        let mut deletions = eraser.deletions;
        deletions.sort_unstable();

        let mut references = ReferenceCollector {
            names: BTreeSet::new(),
        };
        references.visit_program(&ret.program);

        let mut record = ModuleRecord {
            logical_name: logical_name.to_string(),
            relative_path: relative_path.clone(),
            imports: Vec::new(),
            exports: ExportMap::default(),
            body: Vec::new(),
            type_decls: Vec::new(),
            decls: BTreeMap::new(),
            declared_names: BTreeSet::new(),
            referenced: references.names,
            style_imports: Vec::new(),
        };

        for stmt in &ret.program.body {
            self.record_statement(stmt, &source, &deletions, &mut record)?;
        }

        Ok(record)
    }

    fn record_statement(
        &self,
        stmt: &Statement,
        source: &str,
        deletions: &[(u32, u32)],
        record: &mut ModuleRecord,
    ) -> Result<(), BuildError> {
        let logical = record.logical_name.clone();
        match stmt {
            Statement::ImportDeclaration(import) => {
                self.record_import(import, record)?;
            }
            Statement::ExportNamedDeclaration(export) => {
                if let Some(decl) = &export.declaration {
                    self.record_declaration(decl, source, deletions, record, true)?;
                } else if let Some(src) = &export.source {
                    self.record_reexport(export, src, source, record)?;
                } else {
                    for spec in &export.specifiers {
                        let exported = module_export_name(&spec.exported);
                        let local = module_export_name(&spec.local);
                        if exported == "default" {
                            record.exports.default = Some(ExportOrigin::Local(local));
                        } else {
                            record
                                .exports
                                .values
                                .insert(exported, ExportOrigin::Local(local));
                        }
                    }
                }
            }
            Statement::ExportDefaultDeclaration(export) => {
                self.record_default_export(export, source, deletions, record)?;
            }
            Statement::ExportAllDeclaration(export) => {
                if export.exported.is_some() {
                    return Err(BuildError::type_check(
                        &logical,
                        "`export * as` is not supported; re-export names explicitly",
                    ));
                }
                let specifier = export.source.value.to_string();
                match self.classifier.classify(&specifier) {
                    ImportKind::External => {
                        record.exports.external_reexports.push(ExternalReexport {
                            text: plain_slice(source, export.span),
                            type_only: export.export_kind.is_type(),
                        });
                    }
                    ImportKind::Bundle => {
                        match self.classifier.resolve(
                            &record.relative_path,
                            &logical,
                            &specifier,
                        )? {
                            ResolvedImport::Module { logical_name, .. } => {
                                record.exports.star_from.push(logical_name);
                            }
                            ResolvedImport::Stylesheet(_) => {
                                return Err(BuildError::type_check(
                                    &logical,
                                    format!("cannot re-export from stylesheet `{}`", specifier),
                                ));
                            }
                        }
                    }
                }
            }
            Statement::TSTypeAliasDeclaration(decl) => {
                let name = decl.id.name.to_string();
                record
                    .type_decls
                    .push((name.clone(), plain_slice(source, decl.span)));
                record.decls.insert(name, DeclKind::TypeAlias);
            }
            Statement::TSInterfaceDeclaration(decl) => {
                let name = decl.id.name.to_string();
                record
                    .type_decls
                    .push((name.clone(), plain_slice(source, decl.span)));
                record.decls.insert(name, DeclKind::Interface);
            }
            Statement::TSEnumDeclaration(decl) => {
                return Err(BuildError::type_check(
                    &logical,
                    format!(
                        "TypeScript enum `{}` is not supported in component sources",
                        decl.id.name
                    ),
                ));
            }
            Statement::TSModuleDeclaration(_) | Statement::TSImportEqualsDeclaration(_) => {
                return Err(BuildError::type_check(
                    &logical,
                    "TypeScript namespaces are not supported in component sources",
                ));
            }
            Statement::VariableDeclaration(decl) => {
                self.record_variable(decl, source, deletions, record, false)?;
            }
            Statement::FunctionDeclaration(func) => {
                self.record_function(func, source, deletions, record, false)?;
            }
            Statement::ClassDeclaration(class) => {
                self.record_class(class, source, deletions, record, false)?;
            }
            other => {
                record
                    .body
                    .push(erased_slice(source, other.span(), deletions));
            }
        }
        Ok(())
    }

    fn record_import(
        &self,
        import: &ImportDeclaration,
        record: &mut ModuleRecord,
    ) -> Result<(), BuildError> {
        let specifier = import.source.value.to_string();
        let decl_type_only = import.import_kind.is_type();

        let mut clauses = Vec::new();
        if let Some(specifiers) = &import.specifiers {
            for spec in specifiers {
                match spec {
                    ImportDeclarationSpecifier::ImportSpecifier(s) => {
                        clauses.push(ImportClause {
                            imported: ImportedName::Named(module_export_name(&s.imported)),
                            local: s.local.name.to_string(),
                            type_only: decl_type_only || s.import_kind.is_type(),
                        });
                    }
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                        clauses.push(ImportClause {
                            imported: ImportedName::Default,
                            local: s.local.name.to_string(),
                            type_only: decl_type_only,
                        });
                    }
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                        clauses.push(ImportClause {
                            imported: ImportedName::Namespace,
                            local: s.local.name.to_string(),
                            type_only: decl_type_only,
                        });
                    }
                }
            }
        }
        let side_effect_only = import.specifiers.is_none();

        let target = match self.classifier.classify(&specifier) {
            ImportKind::External => ImportTarget::External,
            ImportKind::Bundle => {
                match self
                    .classifier
                    .resolve(&record.relative_path, &record.logical_name, &specifier)?
                {
                    ResolvedImport::Module { logical_name, .. } => {
                        ImportTarget::Internal(logical_name)
                    }
                    ResolvedImport::Stylesheet(path) => {
                        if !side_effect_only {
                            return Err(BuildError::type_check(
                                &record.logical_name,
                                format!(
                                    "stylesheet import `{}` must not bind names; \
                                     use a bare side-effect import",
                                    specifier
                                ),
                            ));
                        }
                        record.style_imports.push(path);
                        return Ok(());
                    }
                }
            }
        };

        record.imports.push(ImportRecord {
            specifier,
            target,
            clauses,
            side_effect_only,
            type_only: decl_type_only,
        });
        Ok(())
    }

    fn record_reexport(
        &self,
        export: &ExportNamedDeclaration,
        src: &StringLiteral,
        source: &str,
        record: &mut ModuleRecord,
    ) -> Result<(), BuildError> {
        let specifier = src.value.to_string();
        match self.classifier.classify(&specifier) {
            ImportKind::External => {
                record.exports.external_reexports.push(ExternalReexport {
                    text: plain_slice(source, export.span),
                    type_only: export.export_kind.is_type(),
                });
            }
            ImportKind::Bundle => {
                let target = match self.classifier.resolve(
                    &record.relative_path,
                    &record.logical_name,
                    &specifier,
                )? {
                    ResolvedImport::Module { logical_name, .. } => logical_name,
                    ResolvedImport::Stylesheet(_) => {
                        return Err(BuildError::type_check(
                            &record.logical_name,
                            format!("cannot re-export from stylesheet `{}`", specifier),
                        ));
                    }
                };
                for spec in &export.specifiers {
                    let exported = module_export_name(&spec.exported);
                    let local = module_export_name(&spec.local);
                    let origin = if local == "default" {
                        ExportOrigin::ReexportDefault {
                            module: target.clone(),
                        }
                    } else {
                        ExportOrigin::ReexportNamed {
                            module: target.clone(),
                            name: local,
                        }
                    };
                    if exported == "default" {
                        record.exports.default = Some(origin);
                    } else {
                        record.exports.values.insert(exported, origin);
                    }
                }
            }
        }
        Ok(())
    }

    fn record_default_export(
        &self,
        export: &ExportDefaultDeclaration,
        source: &str,
        deletions: &[(u32, u32)],
        record: &mut ModuleRecord,
    ) -> Result<(), BuildError> {
        match &export.declaration {
            ExportDefaultDeclarationKind::FunctionDeclaration(func) => {
                let name = match &func.id {
                    Some(id) => id.name.to_string(),
                    None => default_symbol(&record.logical_name),
                };
                let body_start = func
                    .body
                    .as_ref()
                    .map(|b| b.span.start)
                    .unwrap_or(func.span.end);
                let signature = source[func.span.start as usize..body_start as usize]
                    .trim_end()
                    .to_string();
                let signature = if func.id.is_some() {
                    signature
                } else {
                    signature.replacen("function", &format!("function {}", name), 1)
                };
                record.decls.insert(
                    name.clone(),
                    DeclKind::Function {
                        signature,
                        has_return_type: func.return_type.is_some(),
                    },
                );
                let text = erased_slice(source, func.span, deletions);
                if func.id.is_some() {
                    record.body.push(text);
                } else {
                    record.body.push(format!("const {} = {};", name, text));
                }
                record.declared_names.insert(name.clone());
                record.exports.default = Some(ExportOrigin::Local(name));
            }
            ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                let name = match &class.id {
                    Some(id) => id.name.to_string(),
                    None => default_symbol(&record.logical_name),
                };
                record.decls.insert(name.clone(), DeclKind::Class);
                let text = erased_slice(source, class.span, deletions);
                if class.id.is_some() {
                    record.body.push(text);
                } else {
                    record.body.push(format!("const {} = {};", name, text));
                }
                record.declared_names.insert(name.clone());
                record.exports.default = Some(ExportOrigin::Local(name));
            }
            other => {
                if let Some(expr) = other.as_expression() {
                    if let Expression::Identifier(id) = expr {
                        record.exports.default =
                            Some(ExportOrigin::Local(id.name.to_string()));
                    } else {
                        let name = default_symbol(&record.logical_name);
                        let text = erased_slice(source, expr.span(), deletions);
                        record.body.push(format!("const {} = {};", name, text));
                        record.decls.insert(
                            name.clone(),
                            DeclKind::Var {
                                keyword: "const".to_string(),
                                annotation: None,
                            },
                        );
                        record.declared_names.insert(name.clone());
                        record.exports.default = Some(ExportOrigin::Local(name));
                    }
                } else {
                    return Err(BuildError::type_check(
                        &record.logical_name,
                        "unsupported default export form",
                    ));
                }
            }
        }
        Ok(())
    }

    fn record_declaration(
        &self,
        decl: &Declaration,
        source: &str,
        deletions: &[(u32, u32)],
        record: &mut ModuleRecord,
        exported: bool,
    ) -> Result<(), BuildError> {
        match decl {
            Declaration::VariableDeclaration(var) => {
                self.record_variable(var, source, deletions, record, exported)
            }
            Declaration::FunctionDeclaration(func) => {
                self.record_function(func, source, deletions, record, exported)
            }
            Declaration::ClassDeclaration(class) => {
                self.record_class(class, source, deletions, record, exported)
            }
            Declaration::TSTypeAliasDeclaration(alias) => {
                let name = alias.id.name.to_string();
                record
                    .type_decls
                    .push((name.clone(), plain_slice(source, alias.span)));
                record.decls.insert(name.clone(), DeclKind::TypeAlias);
                if exported {
                    record.exports.types.insert(name.clone(), name);
                }
                Ok(())
            }
            Declaration::TSInterfaceDeclaration(iface) => {
                let name = iface.id.name.to_string();
                record
                    .type_decls
                    .push((name.clone(), plain_slice(source, iface.span)));
                record.decls.insert(name.clone(), DeclKind::Interface);
                if exported {
                    record.exports.types.insert(name.clone(), name);
                }
                Ok(())
            }
            Declaration::TSEnumDeclaration(decl) => Err(BuildError::type_check(
                &record.logical_name,
                format!(
                    "TypeScript enum `{}` is not supported in component sources",
                    decl.id.name
                ),
            )),
            _ => Err(BuildError::type_check(
                &record.logical_name,
                "unsupported exported declaration form",
            )),
        }
    }

    fn record_variable(
        &self,
        var: &VariableDeclaration,
        source: &str,
        deletions: &[(u32, u32)],
        record: &mut ModuleRecord,
        exported: bool,
    ) -> Result<(), BuildError> {
        record.body.push(erased_slice(source, var.span, deletions));
        let keyword = variable_keyword(var.kind);
        for declarator in &var.declarations {
            let mut names = Vec::new();
            collect_pattern_names(&declarator.id, &mut names);
            let annotation = if names.len() == 1 {
                declarator_annotation(&plain_slice(source, declarator.span))
            } else {
                None
            };
            for name in names {
                record.decls.insert(
                    name.clone(),
                    DeclKind::Var {
                        keyword: keyword.to_string(),
                        annotation: annotation.clone(),
                    },
                );
                record.declared_names.insert(name.clone());
                if exported {
                    record
                        .exports
                        .values
                        .insert(name.clone(), ExportOrigin::Local(name));
                }
            }
        }
        Ok(())
    }

    fn record_function(
        &self,
        func: &Function,
        source: &str,
        deletions: &[(u32, u32)],
        record: &mut ModuleRecord,
        exported: bool,
    ) -> Result<(), BuildError> {
        let name = match &func.id {
            Some(id) => id.name.to_string(),
            None => {
                return Err(BuildError::type_check(
                    &record.logical_name,
                    "top-level function declarations must be named",
                ))
            }
        };
        let body_start = func
            .body
            .as_ref()
            .map(|b| b.span.start)
            .unwrap_or(func.span.end);
        let signature = source[func.span.start as usize..body_start as usize]
            .trim_end()
            .to_string();
        record.decls.insert(
            name.clone(),
            DeclKind::Function {
                signature,
                has_return_type: func.return_type.is_some(),
            },
        );
        record.body.push(erased_slice(source, func.span, deletions));
        record.declared_names.insert(name.clone());
        if exported {
            record
                .exports
                .values
                .insert(name.clone(), ExportOrigin::Local(name));
        }
        Ok(())
    }

    fn record_class(
        &self,
        class: &Class,
        source: &str,
        deletions: &[(u32, u32)],
        record: &mut ModuleRecord,
        exported: bool,
    ) -> Result<(), BuildError> {
        let name = match &class.id {
            Some(id) => id.name.to_string(),
            None => {
                return Err(BuildError::type_check(
                    &record.logical_name,
                    "top-level class declarations must be named",
                ))
            }
        };
        record.decls.insert(name.clone(), DeclKind::Class);
        record
            .body
            .push(erased_slice(source, class.span, deletions));
        record.declared_names.insert(name.clone());
        if exported {
            record
                .exports
                .values
                .insert(name.clone(), ExportOrigin::Local(name));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRAPH BUILD + VERIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

impl ModuleGraph {
    /// Parse every reachable module, then run the build-wide verification
    /// pass. Parsing fans out across the worker pool; each worker holds its
    /// own allocator and only plain data leaves it.
    pub fn build(config: &BuildConfig, entries: &[SourceEntry]) -> Result<Self, BuildError> {
        let parser = ModuleParser::new(config);
        let classifier = Classifier::new(config);

        let mut modules: BTreeMap<String, ModuleRecord> = BTreeMap::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut frontier: Vec<(String, PathBuf)> = entries
            .iter()
            .map(|e| (e.logical_name.clone(), e.relative_path.clone()))
            .collect();
        for (logical, _) in &frontier {
            seen.insert(logical.clone());
        }

        while !frontier.is_empty() {
            let parsed: Result<Vec<ModuleRecord>, BuildError> = frontier
                .par_iter()
                .map(|(logical, path)| parser.parse(logical, path))
                .collect();
            let parsed = parsed?;

            let mut next = Vec::new();
            for record in parsed {
                for import in &record.imports {
                    if let ImportTarget::Internal(dep) = &import.target {
                        if seen.insert(dep.clone()) {
                            let path = resolve_module_path(&classifier, &record, &import.specifier)?;
                            next.push((dep.clone(), path));
                        }
                    }
                }
                for dep in record
                    .exports
                    .star_from
                    .iter()
                    .chain(reexport_modules(&record.exports).iter())
                {
                    if seen.insert(dep.clone()) {
                        // Re-exports carry no specifier here; resolve by
                        // logical name against the entry extensions.
                        let path = path_for_logical(config, dep).ok_or_else(|| {
                            BuildError::UnresolvedImport {
                                module: record.logical_name.clone(),
                                specifier: dep.clone(),
                            }
                        })?;
                        next.push((dep.clone(), path));
                    }
                }
                modules.insert(record.logical_name.clone(), record);
            }
            frontier = next;
        }

        let graph = ModuleGraph {
            modules,
            entry_names: entries.iter().map(|e| e.logical_name.clone()).collect(),
        };
        graph.verify()?;
        Ok(graph)
    }

    pub fn module(&self, logical_name: &str) -> Result<&ModuleRecord, BuildError> {
        self.modules.get(logical_name).ok_or_else(|| {
            BuildError::type_check(logical_name, "module missing from the shared graph")
        })
    }

    /// Internal modules this module needs at runtime, in source order.
    pub fn runtime_deps(&self, record: &ModuleRecord) -> Vec<String> {
        let mut deps = Vec::new();
        let mut push = |name: &String| {
            if !deps.contains(name) {
                deps.push(name.clone());
            }
        };
        for import in &record.imports {
            if let ImportTarget::Internal(target) = &import.target {
                if import.has_runtime_effect() {
                    push(target);
                }
            }
        }
        for origin in record
            .exports
            .values
            .values()
            .chain(record.exports.default.iter())
        {
            match origin {
                ExportOrigin::ReexportNamed { module, .. }
                | ExportOrigin::ReexportDefault { module } => push(module),
                ExportOrigin::Local(_) => {}
            }
        }
        for star in &record.exports.star_from {
            push(star);
        }
        deps
    }

    /// All internal edges including type-only imports, for declaration
    /// emission.
    pub fn type_deps(&self, record: &ModuleRecord) -> Vec<String> {
        let mut deps = self.runtime_deps(record);
        for import in &record.imports {
            if let ImportTarget::Internal(target) = &import.target {
                if !deps.contains(target) {
                    deps.push(target.clone());
                }
            }
        }
        deps
    }

    /// Dependencies-first closure of an entry over runtime edges.
    pub fn runtime_closure(&self, entry: &str) -> Result<Vec<String>, BuildError> {
        self.closure_of(entry, |record| self.runtime_deps(record))
    }

    /// Dependencies-first closure over all edges (runtime + type-only).
    pub fn type_closure(&self, entry: &str) -> Result<Vec<String>, BuildError> {
        self.closure_of(entry, |record| self.type_deps(record))
    }

    fn closure_of(
        &self,
        entry: &str,
        deps_of: impl Fn(&ModuleRecord) -> Vec<String>,
    ) -> Result<Vec<String>, BuildError> {
        let mut order = Vec::new();
        let mut state: HashMap<String, u8> = HashMap::new(); // 1 = visiting, 2 = done
        let mut stack = vec![(entry.to_string(), false)];
        while let Some((name, expanded)) = stack.pop() {
            if expanded {
                state.insert(name.clone(), 2);
                order.push(name);
                continue;
            }
            match state.get(&name) {
                Some(2) => continue,
                Some(1) => {
                    return Err(BuildError::type_check(
                        &name,
                        format!("import cycle detected while building `{}`", entry),
                    ));
                }
                _ => {}
            }
            state.insert(name.clone(), 1);
            let record = self.module(&name)?;
            stack.push((name, true));
            // Reverse keeps source order once the stack unwinds.
            for dep in deps_of(record).into_iter().rev() {
                match state.get(&dep) {
                    Some(1) => {
                        return Err(BuildError::type_check(
                            &dep,
                            format!("import cycle detected while building `{}`", entry),
                        ));
                    }
                    None => stack.push((dep, false)),
                    _ => {}
                }
            }
        }
        Ok(order)
    }

    /// Resolve an exported name to its concrete origin, following re-export
    /// chains across modules.
    pub fn resolve_named(
        &self,
        module: &str,
        name: &str,
    ) -> Result<Option<ResolvedExport>, BuildError> {
        self.resolve_named_inner(module, name, &mut HashSet::new())
    }

    fn resolve_named_inner(
        &self,
        module: &str,
        name: &str,
        visiting: &mut HashSet<(String, String)>,
    ) -> Result<Option<ResolvedExport>, BuildError> {
        if name == "default" {
            return self.resolve_default_inner(module, visiting);
        }
        if !visiting.insert((module.to_string(), name.to_string())) {
            return Err(BuildError::type_check(
                module,
                format!("re-export cycle resolving `{}`", name),
            ));
        }
        let record = self.module(module)?;
        if let Some(origin) = record.exports.values.get(name) {
            return self.resolve_origin(record, origin, visiting);
        }
        if let Some(local) = record.exports.types.get(name) {
            return Ok(Some(ResolvedExport::Type {
                name: local.clone(),
            }));
        }
        for star in &record.exports.star_from {
            if let Some(resolved) = self.resolve_named_inner(star, name, visiting)? {
                return Ok(Some(resolved));
            }
        }
        Ok(None)
    }

    pub fn resolve_default(&self, module: &str) -> Result<Option<ResolvedExport>, BuildError> {
        self.resolve_default_inner(module, &mut HashSet::new())
    }

    fn resolve_default_inner(
        &self,
        module: &str,
        visiting: &mut HashSet<(String, String)>,
    ) -> Result<Option<ResolvedExport>, BuildError> {
        if !visiting.insert((module.to_string(), "default".to_string())) {
            return Err(BuildError::type_check(
                module,
                "re-export cycle resolving the default export",
            ));
        }
        let record = self.module(module)?;
        match &record.exports.default {
            Some(origin) => self.resolve_origin(record, origin, visiting),
            None => Ok(None),
        }
    }

    fn resolve_origin(
        &self,
        record: &ModuleRecord,
        origin: &ExportOrigin,
        visiting: &mut HashSet<(String, String)>,
    ) -> Result<Option<ResolvedExport>, BuildError> {
        match origin {
            ExportOrigin::Local(local) => {
                match record.decls.get(local) {
                    Some(DeclKind::TypeAlias) | Some(DeclKind::Interface) => {
                        return Ok(Some(ResolvedExport::Type {
                            name: local.clone(),
                        }));
                    }
                    Some(_) => {
                        return Ok(Some(ResolvedExport::Value {
                            module: record.logical_name.clone(),
                            ident: local.clone(),
                        }));
                    }
                    None => {}
                }
                // Not declared here: it may be an imported binding that is
                // being re-exported by name.
                for import in &record.imports {
                    for clause in &import.clauses {
                        if clause.local != *local {
                            continue;
                        }
                        match &import.target {
                            ImportTarget::External => {
                                // The hoisted external import provides the
                                // binding; there is no declaration to mirror.
                                return Ok(Some(ResolvedExport::Value {
                                    module: record.logical_name.clone(),
                                    ident: local.clone(),
                                }));
                            }
                            ImportTarget::Internal(target) => {
                                return match &clause.imported {
                                    ImportedName::Named(n) => {
                                        self.resolve_named_inner(target, n, visiting)
                                    }
                                    ImportedName::Default => {
                                        self.resolve_default_inner(target, visiting)
                                    }
                                    ImportedName::Namespace => Ok(Some(ResolvedExport::Value {
                                        module: record.logical_name.clone(),
                                        ident: local.clone(),
                                    })),
                                };
                            }
                        }
                    }
                }
                Err(BuildError::type_check(
                    &record.logical_name,
                    format!("exported name `{}` is not declared", local),
                ))
            }
            ExportOrigin::ReexportNamed { module, name } => {
                self.resolve_named_inner(module, name, visiting)
            }
            ExportOrigin::ReexportDefault { module } => {
                self.resolve_default_inner(module, visiting)
            }
        }
    }

    /// Expand a module's exports into its resolved public shape. Explicit
    /// exports win over `export *`; two stars contributing the same name with
    /// different origins is an error.
    pub fn export_surface(&self, module: &str) -> Result<ExportSurface, BuildError> {
        let record = self.module(module)?;
        let mut surface = ExportSurface::default();

        for star in &record.exports.star_from {
            let sub = self.export_surface(star)?;
            for (name, value) in sub.values {
                if let Some(prev) = surface.values.get(&name) {
                    if prev != &value {
                        return Err(BuildError::type_check(
                            module,
                            format!("`export *` exposes conflicting bindings for `{}`", name),
                        ));
                    }
                } else {
                    surface.values.insert(name, value);
                }
            }
            for (name, ty) in sub.types {
                if let Some(prev) = surface.types.get(&name) {
                    if prev != &ty {
                        return Err(BuildError::type_check(
                            module,
                            format!("`export *` exposes conflicting types for `{}`", name),
                        ));
                    }
                } else {
                    surface.types.insert(name, ty);
                }
            }
        }

        for (name, origin) in &record.exports.values {
            match self.resolve_origin(record, origin, &mut HashSet::new())? {
                Some(ResolvedExport::Value { module: m, ident }) => {
                    surface.types.remove(name);
                    surface.values.insert(name.clone(), (m, ident));
                }
                Some(ResolvedExport::Type { name: ty }) => {
                    surface.values.remove(name);
                    surface.types.insert(name.clone(), ty);
                }
                None => {
                    return Err(BuildError::type_check(
                        module,
                        format!("export `{}` does not resolve", name),
                    ));
                }
            }
        }
        for (name, local) in &record.exports.types {
            surface.types.insert(name.clone(), local.clone());
        }

        if let Some(origin) = &record.exports.default {
            match self.resolve_origin(record, origin, &mut HashSet::new())? {
                Some(ResolvedExport::Value { module: m, ident }) => {
                    surface.default = Some((m, ident));
                }
                Some(ResolvedExport::Type { .. }) | None => {
                    return Err(BuildError::type_check(
                        module,
                        "default export does not resolve to a value",
                    ));
                }
            }
        }

        Ok(surface)
    }

    /// Build-wide static verification: every named import from an internal
    /// module must resolve to an export of that module, every export origin
    /// must resolve, and no entry closure may contain a cycle.
    fn verify(&self) -> Result<(), BuildError> {
        for record in self.modules.values() {
            for import in &record.imports {
                let target = match &import.target {
                    ImportTarget::Internal(t) => t,
                    ImportTarget::External => continue,
                };
                for clause in &import.clauses {
                    match &clause.imported {
                        ImportedName::Named(name) => {
                            if self.resolve_named(target, name)?.is_none() {
                                return Err(BuildError::type_check(
                                    &record.logical_name,
                                    format!(
                                        "`{}` has no export named `{}`",
                                        import.specifier, name
                                    ),
                                ));
                            }
                        }
                        ImportedName::Default => {
                            if !clause.type_only && self.resolve_default(target)?.is_none() {
                                return Err(BuildError::type_check(
                                    &record.logical_name,
                                    format!("`{}` has no default export", import.specifier),
                                ));
                            }
                        }
                        ImportedName::Namespace => {}
                    }
                }
            }
            for (name, origin) in &record.exports.values {
                if self
                    .resolve_origin(record, origin, &mut HashSet::new())?
                    .is_none()
                {
                    return Err(BuildError::type_check(
                        &record.logical_name,
                        format!("export `{}` does not resolve", name),
                    ));
                }
            }
        }
        for entry in &self.entry_names {
            self.runtime_closure(entry)?;
        }
        Ok(())
    }
}

fn reexport_modules(exports: &ExportMap) -> Vec<String> {
    let mut modules = Vec::new();
    for origin in exports.values.values().chain(exports.default.iter()) {
        match origin {
            ExportOrigin::ReexportNamed { module, .. }
            | ExportOrigin::ReexportDefault { module } => {
                if !modules.contains(module) {
                    modules.push(module.clone());
                }
            }
            ExportOrigin::Local(_) => {}
        }
    }
    modules
}

fn resolve_module_path(
    classifier: &Classifier,
    importer: &ModuleRecord,
    specifier: &str,
) -> Result<PathBuf, BuildError> {
    match classifier.resolve(&importer.relative_path, &importer.logical_name, specifier)? {
        ResolvedImport::Module { relative_path, .. } => Ok(relative_path),
        ResolvedImport::Stylesheet(_) => Err(BuildError::UnresolvedImport {
            module: importer.logical_name.clone(),
            specifier: specifier.to_string(),
        }),
    }
}

fn path_for_logical(config: &BuildConfig, logical: &str) -> Option<PathBuf> {
    let base: PathBuf = logical.split('/').collect();
    for ext in &config.entry_pattern.extensions {
        let candidate = base.with_extension(ext);
        if config.source_root.join(&candidate).is_file() {
            return Some(candidate);
        }
    }
    None
}
