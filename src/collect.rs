//! Dependency collection and call-site rewriting.
//!
//! One traversal over the module AST discovers every static dependency
//! site, folds its specifier, interns the dependency, and replaces the
//! site with the canonical indexed form addressing the runtime
//! dependency map. Static import/export declarations are recorded but
//! left in place for a downstream pass.

use crate::error::InvalidRequireCallError;
use crate::location::LineIndex;
use crate::options::{CollectorOptions, DynamicRequiresPolicy};
use crate::registry::{Dependency, DependencyRegistry};
use crate::scope::{ScopeTracker, RECOGNIZED_INTRINSICS, REQUIRE_NAME};
use crate::static_eval::{fold_specifier, FoldCause, FoldError};
use oxc_allocator::{Allocator, Box as oxc_box, CloneIn};
use oxc_ast::{ast::*, AstBuilder};
use oxc_ast_visit::walk_mut::{
    walk_arrow_function_expression, walk_block_statement, walk_catch_clause,
    walk_export_named_declaration, walk_expression, walk_for_in_statement, walk_for_of_statement,
    walk_for_statement, walk_function, walk_program, walk_variable_declaration,
};
use oxc_ast_visit::{Visit, VisitMut};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_span::{SourceType, Span, SPAN};
use oxc_syntax::number::NumberBase;
use oxc_syntax::scope::ScopeFlags;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ═══════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Summary returned by the AST-level pass. Dependency indices are
/// implied by list position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectResult {
    pub dependencies: Vec<Dependency>,
    pub dependency_map_name: String,
}

/// Output of the source-level convenience entry: the rewritten module
/// text plus the pass summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCollectOutput {
    pub code: String,
    pub dependencies: Vec<Dependency>,
    pub dependency_map_name: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER INVENTORY
// Read-only pass backing the fresh dependency-map name.
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct IdentifierInventory {
    names: HashSet<String>,
}

impl<'a> Visit<'a> for IdentifierInventory {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }

    fn visit_binding_identifier(&mut self, ident: &BindingIdentifier<'a>) {
        self.names.insert(ident.name.to_string());
    }
}

fn allocate_dependency_map_name(program: &Program) -> String {
    let mut inventory = IdentifierInventory::default();
    inventory.visit_program(program);

    let mut name = "_dependencyMap".to_string();
    let mut attempt = 1u32;
    while inventory.names.contains(&name) {
        attempt += 1;
        name = format!("_dependencyMap{}", attempt);
    }
    name
}

// ═══════════════════════════════════════════════════════════════════════════════
// SITE CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SiteKind {
    SyncRequire,
    DynamicImport,
    JsResource,
    ConditionalSplit,
    Prefetch,
}

impl SiteKind {
    fn is_prefetch(self) -> bool {
        matches!(self, SiteKind::Prefetch)
    }
}

enum SiteFailure {
    Arity(Span),
    Fold(FoldError),
}

/// Everything `apply_site` needs, detached from the borrowed node so the
/// node slot can be overwritten.
struct SitePlan<'a> {
    kind: SiteKind,
    span: Span,
    specifier: Result<String, SiteFailure>,
    /// Original specifier argument, preserved for the runtime-throw
    /// rewrite.
    fallback_arg: Option<Expression<'a>>,
}

const RUNTIME_THROW_TEMPLATE: &str = "(function (line) { throw new Error('Dynamic require defined at line ' + line + '; not supported by Metro'); })()";

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

pub struct DependencyCollector<'a, 'opts> {
    ast: AstBuilder<'a>,
    options: &'opts CollectorOptions,
    scopes: ScopeTracker,
    registry: DependencyRegistry,
    lines: LineIndex,
    dependency_map_name: String,
    error: Option<InvalidRequireCallError>,
}

impl<'a, 'opts> DependencyCollector<'a, 'opts> {
    fn plan_site(&self, expr: &Expression<'a>) -> Option<SitePlan<'a>> {
        match expr {
            Expression::ImportExpression(import) => Some(SitePlan {
                kind: SiteKind::DynamicImport,
                span: import.span,
                specifier: fold_specifier(&import.source, &self.scopes).map_err(SiteFailure::Fold),
                fallback_arg: None,
            }),
            Expression::CallExpression(call) => {
                let name = match &call.callee {
                    Expression::Identifier(id) => id.name.as_str(),
                    _ => return None,
                };
                let kind = if name == REQUIRE_NAME {
                    SiteKind::SyncRequire
                } else if RECOGNIZED_INTRINSICS.contains(name) {
                    match name {
                        "__jsResource" => SiteKind::JsResource,
                        "__conditionallySplitJSResource" => SiteKind::ConditionalSplit,
                        _ => SiteKind::Prefetch,
                    }
                } else {
                    return None;
                };
                if self.scopes.is_shadowed(name) {
                    return None;
                }
                Some(self.plan_call(kind, call))
            }
            _ => None,
        }
    }

    fn plan_call(&self, kind: SiteKind, call: &CallExpression<'a>) -> SitePlan<'a> {
        let span = call.span;
        let args = &call.arguments;
        let max_args = if kind == SiteKind::ConditionalSplit { 2 } else { 1 };

        let Some(first) = args.first().and_then(|arg| arg.as_expression()) else {
            // Zero arguments, or a spread in specifier position.
            return SitePlan {
                kind,
                span,
                specifier: Err(SiteFailure::Arity(span)),
                fallback_arg: None,
            };
        };

        let specifier = match fold_specifier(first, &self.scopes) {
            Ok(value) if args.len() <= max_args => Ok(value),
            Ok(_) => Err(SiteFailure::Arity(span)),
            Err(fold_err) => {
                if kind == SiteKind::SyncRequire && args.len() == 2 {
                    // Rewritten-form recovery: `require(<map access>, "name")`
                    // keeps re-collection of the pass's own sync output
                    // stable.
                    match args[1].as_expression() {
                        Some(Expression::StringLiteral(hint)) => Ok(hint.value.to_string()),
                        _ => Err(SiteFailure::Arity(span)),
                    }
                } else if args.len() > max_args {
                    Err(SiteFailure::Arity(span))
                } else {
                    Err(SiteFailure::Fold(fold_err))
                }
            }
        };

        let wants_runtime_throw = kind == SiteKind::SyncRequire
            && self.options.dynamic_requires == DynamicRequiresPolicy::ThrowAtRuntime
            && matches!(
                specifier,
                Err(SiteFailure::Fold(FoldError {
                    cause: FoldCause::NonString,
                    ..
                }))
            );
        let fallback_arg = wants_runtime_throw.then(|| first.clone_in(self.ast.allocator));

        SitePlan {
            kind,
            span,
            specifier,
            fallback_arg,
        }
    }

    fn apply_site(&mut self, expr: &mut Expression<'a>, plan: SitePlan<'a>) {
        match plan.specifier {
            Ok(name) => {
                let loc = self.lines.span(plan.span);
                if plan.kind == SiteKind::SyncRequire {
                    let index = self.registry.register(&name, false, false, Some(loc));
                    *expr = self.indexed_require(&name, index);
                    return;
                }

                // The dependency is interned before the loader so first
                // discovery keeps its index.
                let index = self
                    .registry
                    .register(&name, true, plan.kind.is_prefetch(), Some(loc));
                let loader = self
                    .registry
                    .register_async_loader(&self.options.async_require_module_path);
                let callee = match plan.kind {
                    SiteKind::DynamicImport => self.loader_require(loader),
                    SiteKind::Prefetch => self.loader_method(loader, "prefetch"),
                    _ => self.loader_method(loader, "resource"),
                };
                *expr = self.indexed_call(callee, index, &name);
            }
            Err(failure) => {
                if let Some(mut original) = plan.fallback_arg {
                    // The preserved argument may itself contain
                    // collectible sites.
                    self.visit_expression(&mut original);
                    *expr = self.runtime_throw(original);
                } else {
                    self.fail(failure);
                }
            }
        }
    }

    fn fail(&mut self, failure: SiteFailure) {
        if self.error.is_some() {
            return;
        }
        self.error = Some(match failure {
            SiteFailure::Arity(span) => InvalidRequireCallError::bad_arity(self.lines.span(span)),
            SiteFailure::Fold(err) => {
                let loc = self.lines.span(err.span);
                match err.cause {
                    FoldCause::DynamicInterpolation => {
                        InvalidRequireCallError::dynamic_interpolation(loc)
                    }
                    FoldCause::TaggedTemplate => InvalidRequireCallError::tagged_template(loc),
                    FoldCause::NonString => InvalidRequireCallError::non_string_argument(loc),
                }
            }
        });
    }

    // ── replacement node construction ──────────────────────────────────

    fn map_access(&self, index: usize) -> Expression<'a> {
        let map: &'a str = self.ast.allocator.alloc_str(&self.dependency_map_name);
        let index_expr =
            self.ast
                .expression_numeric_literal(SPAN, index as f64, None, NumberBase::Decimal);
        Expression::from(self.ast.member_expression_computed(
            SPAN,
            self.ast.expression_identifier(SPAN, map),
            index_expr,
            false,
        ))
    }

    fn indexed_args(&self, index: usize, name: &str) -> oxc_allocator::Vec<'a, Argument<'a>> {
        let mut args = self.ast.vec();
        args.push(Argument::from(self.map_access(index)));
        if self.options.keep_require_names {
            let hint: &'a str = self.ast.allocator.alloc_str(name);
            args.push(Argument::from(
                self.ast.expression_string_literal(SPAN, hint, None),
            ));
        }
        args
    }

    /// `require(M[index], "name")`
    fn indexed_require(&self, name: &str, index: usize) -> Expression<'a> {
        let callee = self.ast.expression_identifier(SPAN, REQUIRE_NAME);
        self.indexed_call(callee, index, name)
    }

    /// `require(M[loader], "<asyncRequireModulePath>")`
    fn loader_require(&self, loader_index: usize) -> Expression<'a> {
        self.indexed_require(&self.options.async_require_module_path, loader_index)
    }

    /// `require(M[loader], ...).<method>`
    fn loader_method(&self, loader_index: usize, method: &'static str) -> Expression<'a> {
        Expression::from(self.ast.member_expression_static(
            SPAN,
            self.loader_require(loader_index),
            self.ast.identifier_name(SPAN, method),
            false,
        ))
    }

    fn indexed_call(&self, callee: Expression<'a>, index: usize, name: &str) -> Expression<'a> {
        self.ast.expression_call(
            SPAN,
            callee,
            None::<oxc_box<TSTypeParameterInstantiation>>,
            self.indexed_args(index, name),
            false,
        )
    }

    /// The canonical runtime-throw form for unresolvable sync requires,
    /// with the untouched original argument applied to it.
    fn runtime_throw(&self, argument: Expression<'a>) -> Expression<'a> {
        let source: &'a str = self.ast.allocator.alloc_str(RUNTIME_THROW_TEMPLATE);
        let mut iife = Parser::new(self.ast.allocator, source, SourceType::default())
            .parse_expression()
            .unwrap();
        if let Expression::CallExpression(call) = &mut iife {
            call.arguments.push(Argument::from(argument));
        }
        iife
    }

    // ── const-string environment ───────────────────────────────────────

    fn record_const_strings(&mut self, decl: &VariableDeclaration<'a>) {
        for declarator in &decl.declarations {
            if let BindingPatternKind::BindingIdentifier(id) = &declarator.id.kind {
                if let Some(init) = &declarator.init {
                    if let Ok(value) = fold_specifier(init, &self.scopes) {
                        self.scopes.declare_const_string(id.name.as_str(), value);
                    }
                }
            }
        }
    }

    /// Const initializers of the frame's direct statements, folded at
    /// frame entry so hoisted functions see bindings declared later in
    /// the same body.
    fn prefold_const_strings(&mut self, stmts: &[Statement<'a>]) {
        for stmt in stmts {
            match stmt {
                Statement::VariableDeclaration(decl)
                    if decl.kind == VariableDeclarationKind::Const =>
                {
                    self.record_const_strings(decl);
                }
                Statement::ExportNamedDeclaration(export) => {
                    if let Some(Declaration::VariableDeclaration(decl)) = &export.declaration {
                        if decl.kind == VariableDeclarationKind::Const {
                            self.record_const_strings(decl);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

impl<'a, 'opts> VisitMut<'a> for DependencyCollector<'a, 'opts> {
    fn visit_program(&mut self, program: &mut Program<'a>) {
        self.scopes.push_frame();
        self.scopes.declare_function_scope(&program.body);
        self.scopes.declare_import_bindings(&program.body);
        self.prefold_const_strings(&program.body);
        walk_program(self, program);
        self.scopes.pop_frame();
    }

    fn visit_function(&mut self, func: &mut Function<'a>, flags: ScopeFlags) {
        self.scopes.push_frame();
        if let Some(id) = &func.id {
            self.scopes.declare(id.name.as_str());
        }
        for param in &func.params.items {
            self.scopes.declare_pattern(&param.pattern);
        }
        if let Some(body) = &func.body {
            self.scopes.declare_function_scope(&body.statements);
            self.prefold_const_strings(&body.statements);
        }
        walk_function(self, func, flags);
        self.scopes.pop_frame();
    }

    fn visit_arrow_function_expression(&mut self, arrow: &mut ArrowFunctionExpression<'a>) {
        self.scopes.push_frame();
        for param in &arrow.params.items {
            self.scopes.declare_pattern(&param.pattern);
        }
        self.scopes.declare_function_scope(&arrow.body.statements);
        self.prefold_const_strings(&arrow.body.statements);
        walk_arrow_function_expression(self, arrow);
        self.scopes.pop_frame();
    }

    fn visit_block_statement(&mut self, block: &mut BlockStatement<'a>) {
        self.scopes.push_frame();
        self.scopes.declare_block_scope(&block.body);
        walk_block_statement(self, block);
        self.scopes.pop_frame();
    }

    fn visit_catch_clause(&mut self, clause: &mut CatchClause<'a>) {
        self.scopes.push_frame();
        if let Some(param) = &clause.param {
            self.scopes.declare_pattern(&param.pattern);
        }
        walk_catch_clause(self, clause);
        self.scopes.pop_frame();
    }

    fn visit_for_statement(&mut self, stmt: &mut ForStatement<'a>) {
        self.scopes.push_frame();
        if let Some(ForStatementInit::VariableDeclaration(var)) = &stmt.init {
            for declarator in &var.declarations {
                self.scopes.declare_pattern(&declarator.id);
            }
            // A for-head `const` is still single-assignment; its folded
            // initializer belongs to the for-head frame.
            if var.kind == VariableDeclarationKind::Const {
                self.record_const_strings(var);
            }
        }
        walk_for_statement(self, stmt);
        self.scopes.pop_frame();
    }

    fn visit_for_in_statement(&mut self, stmt: &mut ForInStatement<'a>) {
        self.scopes.push_frame();
        if let ForStatementLeft::VariableDeclaration(var) = &stmt.left {
            for declarator in &var.declarations {
                self.scopes.declare_pattern(&declarator.id);
            }
        }
        walk_for_in_statement(self, stmt);
        self.scopes.pop_frame();
    }

    fn visit_for_of_statement(&mut self, stmt: &mut ForOfStatement<'a>) {
        self.scopes.push_frame();
        if let ForStatementLeft::VariableDeclaration(var) = &stmt.left {
            for declarator in &var.declarations {
                self.scopes.declare_pattern(&declarator.id);
            }
        }
        walk_for_of_statement(self, stmt);
        self.scopes.pop_frame();
    }

    fn visit_variable_declaration(&mut self, decl: &mut VariableDeclaration<'a>) {
        walk_variable_declaration(self, decl);
        if decl.kind == VariableDeclarationKind::Const {
            self.record_const_strings(decl);
        }
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if self.error.is_some() {
            return;
        }
        if let Some(plan) = self.plan_site(expr) {
            // Replacement nodes are not re-walked; the originals they
            // absorb were handled above.
            self.apply_site(expr, plan);
            return;
        }
        walk_expression(self, expr);
    }

    fn visit_import_declaration(&mut self, decl: &mut ImportDeclaration<'a>) {
        if self.error.is_some() {
            return;
        }
        let loc = self.lines.span(decl.span);
        self.registry
            .register(decl.source.value.as_str(), false, false, Some(loc));
    }

    fn visit_export_named_declaration(&mut self, decl: &mut ExportNamedDeclaration<'a>) {
        if self.error.is_some() {
            return;
        }
        if let Some(source) = &decl.source {
            let loc = self.lines.span(decl.span);
            self.registry
                .register(source.value.as_str(), false, false, Some(loc));
        }
        walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &mut ExportAllDeclaration<'a>) {
        if self.error.is_some() {
            return;
        }
        let loc = self.lines.span(decl.span);
        self.registry
            .register(decl.source.value.as_str(), false, false, Some(loc));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Run the pass over an already-parsed module, mutating it in place.
/// On error the AST may be partially rewritten and must be discarded.
pub fn collect_dependencies<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    source_text: &str,
    options: &CollectorOptions,
) -> Result<CollectResult, InvalidRequireCallError> {
    let dependency_map_name = allocate_dependency_map_name(program);
    let mut collector = DependencyCollector {
        ast: AstBuilder::new(allocator),
        options,
        scopes: ScopeTracker::new(),
        registry: DependencyRegistry::new(),
        lines: LineIndex::new(source_text),
        dependency_map_name: dependency_map_name.clone(),
        error: None,
    };
    collector.visit_program(program);

    if let Some(error) = collector.error {
        return Err(error);
    }
    Ok(CollectResult {
        dependencies: collector.registry.snapshot(),
        dependency_map_name,
    })
}

/// Parse, collect, and serialize in one step.
pub fn collect_from_source(
    source: &str,
    options: &CollectorOptions,
) -> Result<SourceCollectOutput, InvalidRequireCallError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_typescript(true).with_module(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(first) = ret.errors.first() {
        return Err(InvalidRequireCallError::parse(&format!("{:?}", first)));
    }

    let mut program = ret.program;
    let result = collect_dependencies(&allocator, &mut program, source, options)?;
    let code = Codegen::new().build(&program).code;
    Ok(SourceCollectOutput {
        code,
        dependencies: result.dependencies,
        dependency_map_name: result.dependency_map_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_and_inventory(source: &str) -> String {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(&allocator, source, source_type).parse();
        assert!(ret.errors.is_empty());
        allocate_dependency_map_name(&ret.program)
    }

    #[test]
    fn test_map_name_defaults_to_first_candidate() {
        assert_eq!(parse_and_inventory("const a = 1;"), "_dependencyMap");
    }

    #[test]
    fn test_map_name_skips_taken_candidates() {
        assert_eq!(
            parse_and_inventory("const _dependencyMap = 1;"),
            "_dependencyMap2"
        );
        assert_eq!(
            parse_and_inventory("let _dependencyMap; _dependencyMap2();"),
            "_dependencyMap3"
        );
    }

    #[test]
    fn test_map_name_sees_references_in_nested_scopes() {
        assert_eq!(
            parse_and_inventory("function f() { return _dependencyMap; }"),
            "_dependencyMap2"
        );
    }
}
