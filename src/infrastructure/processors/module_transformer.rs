use crate::infrastructure::processors::runtime_helpers;
use crate::utils::{Result, SluiceError};
use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Argument, BindingIdentifier, CallExpression, Declaration, ExportAllDeclaration,
    ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, IdentifierReference,
    ImportDeclaration, ImportDeclarationSpecifier, ModuleExportName, ObjectProperty,
    StaticMemberExpression, Statement, TaggedTemplateExpression,
};
use oxc::ast_visit::{walk, Visit};
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::parser::Parser;
use oxc::semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc::span::{GetSpan, SourceType, Span};
use oxc::syntax::identifier::is_identifier_name;
use oxc::transformer::{HelperLoaderMode, TransformOptions, Transformer};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

const DEFAULT_LOCAL: &str = "__sluice_default";

/// One module after ESM rewriting and syntax lowering
#[derive(Debug, Clone)]
pub struct TransformedModule {
    pub code: String,
    pub source_map: Option<String>,
    /// Specifiers in first-seen order, as written in the source
    pub specifiers: Vec<String>,
    /// `babelHelpers` members the lowered code calls
    pub helpers: Vec<String>,
}

/// Text replacement over the original source
#[derive(Debug)]
struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

/// Rewrites ES module syntax into CommonJS and lowers syntax with oxc
pub struct ModuleTransformer {
    target: String,
}

impl ModuleTransformer {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// `display_path` is the name recorded in the module's source map
    pub fn transform(&self, source: &str, path: &Path, display_path: &str) -> Result<TransformedModule> {
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            return Self::json_module(source, path);
        }

        let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());
        let (rewritten, specifiers) = Self::rewrite_module_syntax(source, path, source_type)?;
        let (code, source_map, helpers) = self.lower(&rewritten, path, display_path, source_type)?;

        Ok(TransformedModule {
            code,
            source_map,
            specifiers,
            helpers,
        })
    }

    fn json_module(source: &str, path: &Path) -> Result<TransformedModule> {
        let _: serde_json::Value = serde_json::from_str(source).map_err(|e| {
            SluiceError::js_in(format!("invalid JSON: {}", e), path.to_path_buf())
        })?;

        Ok(TransformedModule {
            code: format!("module.exports = {};", source.trim()),
            source_map: None,
            specifiers: Vec::new(),
            helpers: Vec::new(),
        })
    }

    fn parse_errors(errors: &[oxc::diagnostics::OxcDiagnostic], path: &Path) -> SluiceError {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        SluiceError::js_in(messages.join("\n"), path.to_path_buf())
    }

    /// Turn import/export declarations into `require`/`exports` code.
    ///
    /// Exports become getters installed before any dependency runs, and
    /// every read of an imported binding becomes a read from the required
    /// module, so bindings stay live and import cycles see hoisted
    /// functions. Line count is preserved so per-line mappings stay valid.
    fn rewrite_module_syntax(
        source: &str,
        path: &Path,
        source_type: SourceType,
    ) -> Result<(String, Vec<String>)> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type).parse();
        if !parsed.errors.is_empty() {
            return Err(Self::parse_errors(&parsed.errors, path));
        }
        let program = &parsed.program;
        let semantic = SemanticBuilder::new().build(program).semantic;

        let imports = import_bindings(&program.body);

        let mut edits: Vec<Edit> = Vec::new();
        let mut requires: Vec<String> = Vec::new();
        let mut getters: Vec<(String, String)> = Vec::new();
        let mut specifiers: Vec<String> = Vec::new();
        let mut has_module_syntax = false;

        for (index, statement) in program.body.iter().enumerate() {
            match statement {
                Statement::ImportDeclaration(import) => {
                    has_module_syntax = true;
                    let specifier = import.source.value.as_str();
                    remember(specifier, &mut specifiers);

                    let binds = import.specifiers.as_ref().is_some_and(|list| !list.is_empty());
                    requires.push(if binds {
                        format!("var {} = require({});", module_temp(index), quote(specifier))
                    } else {
                        format!("require({});", quote(specifier))
                    });
                    edits.push(Edit::blank(source, import.span));
                }
                Statement::ExportNamedDeclaration(export) => {
                    has_module_syntax = true;
                    if let Some(declaration) = &export.declaration {
                        let start = export.span.start;
                        edits.push(Edit::replace(source, start, declaration.span().start, String::new()));
                        for name in declared_names(declaration) {
                            getters.push((name.clone(), name));
                        }
                    } else if let Some(from) = &export.source {
                        let specifier = from.value.as_str();
                        remember(specifier, &mut specifiers);
                        let temp = module_temp(index);
                        requires.push(format!("var {} = require({});", temp, quote(specifier)));
                        for item in &export.specifiers {
                            let local = item.local.name();
                            let read = if local.as_str() == "default" {
                                format!("__sluiceDefault({})", temp)
                            } else {
                                member(&temp, local.as_str())
                            };
                            getters.push((item.exported.name().to_string(), read));
                        }
                        edits.push(Edit::blank(source, export.span));
                    } else {
                        for item in &export.specifiers {
                            let read = match &item.local {
                                ModuleExportName::IdentifierReference(local) => {
                                    resolve_symbol(semantic.scoping(), local)
                                        .and_then(|symbol| imports.get(&symbol).cloned())
                                        .unwrap_or_else(|| local.name.to_string())
                                }
                                other => other.name().to_string(),
                            };
                            getters.push((item.exported.name().to_string(), read));
                        }
                        edits.push(Edit::blank(source, export.span));
                    }
                }
                Statement::ExportDefaultDeclaration(export) => {
                    has_module_syntax = true;
                    let declaration_start = export.declaration.span().start;
                    let strip = |replacement: &str| {
                        Edit::replace(source, export.span.start, declaration_start, replacement.to_string())
                    };

                    match &export.declaration {
                        ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                            edits.push(strip(""));
                            match &function.id {
                                Some(id) => getters.push(("default".to_string(), id.name.to_string())),
                                None => {
                                    let at = function.params.span.start;
                                    let spaced = source[..at as usize].ends_with(char::is_whitespace);
                                    let name = if spaced {
                                        DEFAULT_LOCAL.to_string()
                                    } else {
                                        format!(" {}", DEFAULT_LOCAL)
                                    };
                                    edits.push(Edit::insert(at, name));
                                    getters.push(("default".to_string(), DEFAULT_LOCAL.to_string()));
                                }
                            }
                        }
                        ExportDefaultDeclarationKind::ClassDeclaration(class) => match &class.id {
                            Some(id) => {
                                edits.push(strip(""));
                                getters.push(("default".to_string(), id.name.to_string()));
                            }
                            None => {
                                edits.push(strip(&format!("var {} = ", DEFAULT_LOCAL)));
                                edits.push(Edit::insert(export.span.end, ";".to_string()));
                                getters.push(("default".to_string(), DEFAULT_LOCAL.to_string()));
                            }
                        },
                        ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                            edits.push(Edit::blank(source, export.span));
                        }
                        _ => {
                            // `export default expr` exports the value, not a binding
                            edits.push(strip(&format!("var {} = ", DEFAULT_LOCAL)));
                            edits.push(Edit::insert(export.span.end, ";".to_string()));
                            getters.push(("default".to_string(), DEFAULT_LOCAL.to_string()));
                        }
                    }
                }
                Statement::ExportAllDeclaration(export) => {
                    has_module_syntax = true;
                    let specifier = export.source.value.as_str();
                    remember(specifier, &mut specifiers);
                    match &export.exported {
                        Some(name) => {
                            let temp = module_temp(index);
                            requires.push(format!("var {} = require({});", temp, quote(specifier)));
                            getters.push((name.name().to_string(), temp));
                        }
                        None => requires.push(format!(
                            "__sluiceReexport(exports, require({}));",
                            quote(specifier)
                        )),
                    }
                    edits.push(Edit::blank(source, export.span));
                }
                _ => {}
            }
        }

        let mut references = ReferenceRewriter {
            scoping: semantic.scoping(),
            imports: &imports,
            edits: Vec::new(),
            requires: Vec::new(),
        };
        references.visit_program(program);
        for specifier in &references.requires {
            remember(specifier, &mut specifiers);
        }

        let mut all_edits = Vec::with_capacity(edits.len() + references.edits.len() + 2);
        if has_module_syntax {
            // Header goes first so it stays ahead of anything else at offset 0
            all_edits.push(Edit::insert(0, module_header(&getters, &requires)));
        }
        if let Some(hashbang) = &program.hashbang {
            all_edits.push(Edit::blank(source, hashbang.span));
        }
        all_edits.extend(edits);
        all_edits.extend(references.edits);

        Ok((apply_edits(source, all_edits), specifiers))
    }

    /// Lower syntax to the configured target and print with a source map
    fn lower(
        &self,
        source: &str,
        path: &Path,
        display_path: &str,
        source_type: SourceType,
    ) -> Result<(String, Option<String>, Vec<String>)> {
        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type).parse();
        if !parsed.errors.is_empty() {
            return Err(Self::parse_errors(&parsed.errors, path));
        }
        let mut program = parsed.program;

        let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();

        let mut options = TransformOptions::from_target(&self.target)
            .map_err(|e| SluiceError::config(format!("invalid js target '{}': {}", self.target, e)))?;
        options.helper_loader.mode = HelperLoaderMode::External;

        let transformed = Transformer::new(&allocator, path, &options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(Self::parse_errors(&transformed.errors, path));
        }

        let mut collector = HelperCollector::default();
        collector.visit_program(&program);
        if let Some(missing) = collector.names.iter().find(|name| !runtime_helpers::is_available(name)) {
            return Err(SluiceError::js_in(
                format!(
                    "lowering to '{}' needs the '{}' helper, which sluice does not bundle; raise js.target",
                    self.target, missing
                ),
                path.to_path_buf(),
            ));
        }

        let printed = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: Some(Path::new(display_path).to_path_buf()),
                ..CodegenOptions::default()
            })
            .build(&program);

        Ok((
            printed.code,
            printed.map.map(|map| map.to_json_string()),
            collector.names.into_iter().collect(),
        ))
    }
}

impl Edit {
    /// Replacement padded with the newlines it removes
    fn replace(source: &str, start: u32, end: u32, replacement: String) -> Self {
        let (start, end) = (start as usize, end as usize);
        let removed_lines = source[start..end].matches('\n').count();
        let mut replacement = replacement;
        replacement.push_str(&"\n".repeat(removed_lines));
        Self {
            start,
            end,
            replacement,
        }
    }

    fn blank(source: &str, span: Span) -> Self {
        Self::replace(source, span.start, span.end, String::new())
    }

    fn insert(at: u32, text: String) -> Self {
        Self {
            start: at as usize,
            end: at as usize,
            replacement: text,
        }
    }
}

/// Edits must not overlap; the sort is stable so equal offsets keep push order
fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| edit.start);

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in edits {
        if edit.start < cursor {
            continue;
        }
        output.push_str(&source[cursor..edit.start]);
        output.push_str(&edit.replacement);
        cursor = edit.end;
    }
    output.push_str(&source[cursor..]);
    output
}

/// Single-line prologue: export getters, then the requires in source order
fn module_header(getters: &[(String, String)], requires: &[String]) -> String {
    let mut header = String::from(
        "\"use strict\"; Object.defineProperty(exports, \"__esModule\", { value: true });",
    );
    if !getters.is_empty() {
        let entries: Vec<String> = getters
            .iter()
            .map(|(name, read)| format!("{}: function () {{ return {}; }}", quote(name), read))
            .collect();
        header.push_str(&format!(" __sluiceExport(exports, {{ {} }});", entries.join(", ")));
    }
    for require in requires {
        header.push(' ');
        header.push_str(require);
    }
    header.push(' ');
    header
}

/// How each imported binding is read, keyed by its symbol
fn import_bindings(body: &[Statement<'_>]) -> HashMap<SymbolId, String> {
    let mut bindings = HashMap::new();

    for (index, statement) in body.iter().enumerate() {
        let Statement::ImportDeclaration(import) = statement else {
            continue;
        };
        let Some(list) = &import.specifiers else {
            continue;
        };

        let temp = module_temp(index);
        for item in list {
            let (local, read): (&BindingIdentifier<'_>, String) = match item {
                ImportDeclarationSpecifier::ImportSpecifier(named) => {
                    (&named.local, member(&temp, named.imported.name().as_str()))
                }
                ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                    (&default.local, format!("__sluiceDefault({})", temp))
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                    (&namespace.local, temp.clone())
                }
            };
            if let Some(symbol) = local.symbol_id.get() {
                bindings.insert(symbol, read);
            }
        }
    }

    bindings
}

fn resolve_symbol(scoping: &Scoping, ident: &IdentifierReference<'_>) -> Option<SymbolId> {
    let reference_id = ident.reference_id.get()?;
    scoping.get_reference(reference_id).symbol_id()
}

/// Rewrites reads of imported bindings and collects `require("...")` calls
struct ReferenceRewriter<'s> {
    scoping: &'s Scoping,
    imports: &'s HashMap<SymbolId, String>,
    edits: Vec<Edit>,
    requires: Vec<String>,
}

impl<'s> ReferenceRewriter<'s> {
    fn import_read(&self, ident: &IdentifierReference<'_>) -> Option<&'s str> {
        let symbol = resolve_symbol(self.scoping, ident)?;
        self.imports.get(&symbol).map(String::as_str)
    }

    fn replace(&mut self, span: Span, replacement: String) {
        self.edits.push(Edit {
            start: span.start as usize,
            end: span.end as usize,
            replacement,
        });
    }
}

impl<'a> Visit<'a> for ReferenceRewriter<'_> {
    fn visit_import_declaration(&mut self, _it: &ImportDeclaration<'a>) {}

    fn visit_export_all_declaration(&mut self, _it: &ExportAllDeclaration<'a>) {}

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(declaration) = &it.declaration {
            self.visit_declaration(declaration);
        }
    }

    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        if let Some(read) = self.import_read(it) {
            self.replace(it.span, read.to_string());
        }
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee {
            // Imported functions are called without a `this`
            if let Some(read) = self.import_read(callee) {
                self.replace(callee.span, format!("(0, {})", read));
                self.visit_arguments(&it.arguments);
                return;
            }

            if callee.name == "require" && resolve_symbol(self.scoping, callee).is_none() {
                if let [Argument::StringLiteral(specifier)] = &it.arguments[..] {
                    self.requires.push(specifier.value.to_string());
                }
            }
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_tagged_template_expression(&mut self, it: &TaggedTemplateExpression<'a>) {
        if let Expression::Identifier(tag) = &it.tag {
            if let Some(read) = self.import_read(tag) {
                self.replace(tag.span, format!("(0, {})", read));
                self.visit_template_literal(&it.quasi);
                return;
            }
        }
        walk::walk_tagged_template_expression(self, it);
    }

    fn visit_object_property(&mut self, it: &ObjectProperty<'a>) {
        if it.shorthand {
            if let Expression::Identifier(value) = &it.value {
                if let Some(read) = self.import_read(value) {
                    self.replace(it.span, format!("{}: {}", value.name, read));
                    return;
                }
            }
        }
        walk::walk_object_property(self, it);
    }
}

/// Names of the `babelHelpers.*` members used after lowering
#[derive(Default)]
struct HelperCollector {
    names: BTreeSet<String>,
}

impl<'a> Visit<'a> for HelperCollector {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if let Expression::Identifier(object) = &it.object {
            if object.name == "babelHelpers" {
                self.names.insert(it.property.name.to_string());
            }
        }
        walk::walk_static_member_expression(self, it);
    }
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(variables) => variables
            .declarations
            .iter()
            .flat_map(|declarator| declarator.id.get_binding_identifiers())
            .map(|ident| ident.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(function) => {
            function.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(class) => class.id.iter().map(|id| id.name.to_string()).collect(),
        Declaration::TSEnumDeclaration(ts_enum) => vec![ts_enum.id.name.to_string()],
        _ => Vec::new(),
    }
}

fn module_temp(statement_index: usize) -> String {
    format!("__sluice_m{}", statement_index)
}

fn member(object: &str, name: &str) -> String {
    if is_identifier_name(name) {
        format!("{}.{}", object, name)
    } else {
        format!("{}[{}]", object, quote(name))
    }
}

fn remember(specifier: &str, specifiers: &mut Vec<String>) {
    if !specifiers.iter().any(|s| s == specifier) {
        specifiers.push(specifier.to_string());
    }
}

fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}
