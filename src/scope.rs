//! Lexical scope tracking for the collection pass.
//!
//! The pass only ever needs one predicate: "is this bare name bound by
//! user code at the current site?". A stack of frames is maintained as
//! the traversal enters and leaves program, function, block, catch, and
//! for-head scopes. Hoisted bindings (`var`, function declarations) are
//! attached to the nearest function-or-program frame at frame entry, not
//! at their textual position; `let`/`const`/class bindings attach to
//! their block frame; import bindings attach to the program frame.
//!
//! Each frame also carries the const-string environment the specifier
//! evaluator reads: `const` bindings whose initializer folded to a
//! string.

use lazy_static::lazy_static;
use oxc_ast::ast::{
    BindingPattern, BindingPatternKind, Declaration, ForStatementInit, ForStatementLeft,
    ImportDeclarationSpecifier, Statement, VariableDeclarationKind,
};
use std::collections::{HashMap, HashSet};

lazy_static! {
    /// Intrinsic callee names that introduce asynchronous dependencies.
    /// Dynamic `import` is syntactic and not part of this set.
    pub static ref RECOGNIZED_INTRINSICS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("__jsResource");
        s.insert("__conditionallySplitJSResource");
        s.insert("__prefetchImport");
        s
    };
}

/// The sync dependency builtin.
pub const REQUIRE_NAME: &str = "require";

#[derive(Default)]
struct Frame {
    bindings: HashSet<String>,
    const_strings: HashMap<String, String>,
}

#[derive(Default)]
pub struct ScopeTracker {
    frames: Vec<Frame>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop_frame(&mut self) {
        self.frames.pop();
    }

    pub fn declare(&mut self, name: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.to_string());
        }
    }

    pub fn declare_const_string(&mut self, name: &str, value: String) {
        if let Some(frame) = self.frames.last_mut() {
            frame.const_strings.insert(name.to_string(), value);
        }
    }

    /// True iff any enclosing frame binds `name`. A built-in resolves at
    /// a site iff this is false.
    pub fn is_shadowed(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.bindings.contains(name))
    }

    /// Innermost visible const-string value for `name`. A frame that
    /// binds `name` without a recorded const-string (parameter, `let`,
    /// `var`, non-foldable `const`) masks any outer value: the name no
    /// longer refers to a provably single-assignment string there.
    pub fn const_string(&self, name: &str) -> Option<&str> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.const_strings.get(name) {
                return Some(value.as_str());
            }
            if frame.bindings.contains(name) {
                return None;
            }
        }
        None
    }

    pub fn declare_pattern(&mut self, pattern: &BindingPattern) {
        let mut names = Vec::new();
        collect_pattern_names(pattern, &mut names);
        for name in names {
            self.declare(&name);
        }
    }

    /// Bindings the current frame owns when it is a function-or-program
    /// frame: `var` declarations and function declarations anywhere in
    /// the statements (not crossing into nested functions), plus the
    /// direct lexical declarations of the body itself.
    pub fn declare_function_scope(&mut self, stmts: &[Statement]) {
        let mut names = Vec::new();
        hoisted_names(stmts, &mut names);
        direct_lexical_names(stmts, &mut names);
        for name in names {
            self.declare(&name);
        }
    }

    /// Bindings a block frame owns: its direct `let`/`const`/class and
    /// function declarations.
    pub fn declare_block_scope(&mut self, stmts: &[Statement]) {
        let mut names = Vec::new();
        direct_lexical_names(stmts, &mut names);
        for name in names {
            self.declare(&name);
        }
    }

    /// Import specifier locals, attached to the program frame.
    pub fn declare_import_bindings(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            if let Statement::ImportDeclaration(import) = stmt {
                if let Some(specifiers) = &import.specifiers {
                    for specifier in specifiers {
                        let local = match specifier {
                            ImportDeclarationSpecifier::ImportSpecifier(s) => &s.local,
                            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => &s.local,
                            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => &s.local,
                        };
                        self.declare(local.name.as_str());
                    }
                }
            }
        }
    }
}

pub fn collect_pattern_names(pattern: &BindingPattern, names: &mut Vec<String>) {
    match &pattern.kind {
        BindingPatternKind::BindingIdentifier(id) => {
            names.push(id.name.to_string());
        }
        BindingPatternKind::ObjectPattern(obj) => {
            for prop in &obj.properties {
                collect_pattern_names(&prop.value, names);
            }
            if let Some(rest) = &obj.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPatternKind::ArrayPattern(arr) => {
            for elem in arr.elements.iter().flatten() {
                collect_pattern_names(elem, names);
            }
            if let Some(rest) = &arr.rest {
                collect_pattern_names(&rest.argument, names);
            }
        }
        BindingPatternKind::AssignmentPattern(assign) => {
            collect_pattern_names(&assign.left, names);
        }
    }
}

fn declaration_names(decl: &Declaration, hoisted_only: bool, names: &mut Vec<String>) {
    match decl {
        Declaration::VariableDeclaration(var) => {
            let is_var = var.kind == VariableDeclarationKind::Var;
            if is_var == hoisted_only {
                for declarator in &var.declarations {
                    collect_pattern_names(&declarator.id, names);
                }
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                names.push(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if !hoisted_only {
                if let Some(id) = &class.id {
                    names.push(id.name.to_string());
                }
            }
        }
        _ => {}
    }
}

/// `var` and function-declaration names reachable from `stmts` without
/// crossing a function boundary.
fn hoisted_names(stmts: &[Statement], names: &mut Vec<String>) {
    for stmt in stmts {
        hoisted_names_in_statement(stmt, names);
    }
}

fn hoisted_names_in_statement(stmt: &Statement, names: &mut Vec<String>) {
    match stmt {
        Statement::VariableDeclaration(var) => {
            if var.kind == VariableDeclarationKind::Var {
                for declarator in &var.declarations {
                    collect_pattern_names(&declarator.id, names);
                }
            }
        }
        Statement::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                names.push(id.name.to_string());
            }
        }
        Statement::BlockStatement(block) => hoisted_names(&block.body, names),
        Statement::IfStatement(if_stmt) => {
            hoisted_names_in_statement(&if_stmt.consequent, names);
            if let Some(alternate) = &if_stmt.alternate {
                hoisted_names_in_statement(alternate, names);
            }
        }
        Statement::ForStatement(for_stmt) => {
            if let Some(ForStatementInit::VariableDeclaration(var)) = &for_stmt.init {
                if var.kind == VariableDeclarationKind::Var {
                    for declarator in &var.declarations {
                        collect_pattern_names(&declarator.id, names);
                    }
                }
            }
            hoisted_names_in_statement(&for_stmt.body, names);
        }
        Statement::ForInStatement(for_stmt) => {
            if let ForStatementLeft::VariableDeclaration(var) = &for_stmt.left {
                if var.kind == VariableDeclarationKind::Var {
                    for declarator in &var.declarations {
                        collect_pattern_names(&declarator.id, names);
                    }
                }
            }
            hoisted_names_in_statement(&for_stmt.body, names);
        }
        Statement::ForOfStatement(for_stmt) => {
            if let ForStatementLeft::VariableDeclaration(var) = &for_stmt.left {
                if var.kind == VariableDeclarationKind::Var {
                    for declarator in &var.declarations {
                        collect_pattern_names(&declarator.id, names);
                    }
                }
            }
            hoisted_names_in_statement(&for_stmt.body, names);
        }
        Statement::WhileStatement(while_stmt) => {
            hoisted_names_in_statement(&while_stmt.body, names);
        }
        Statement::DoWhileStatement(do_stmt) => {
            hoisted_names_in_statement(&do_stmt.body, names);
        }
        Statement::TryStatement(try_stmt) => {
            hoisted_names(&try_stmt.block.body, names);
            if let Some(handler) = &try_stmt.handler {
                hoisted_names(&handler.body.body, names);
            }
            if let Some(finalizer) = &try_stmt.finalizer {
                hoisted_names(&finalizer.body, names);
            }
        }
        Statement::SwitchStatement(switch) => {
            for case in &switch.cases {
                hoisted_names(&case.consequent, names);
            }
        }
        Statement::LabeledStatement(labeled) => {
            hoisted_names_in_statement(&labeled.body, names);
        }
        Statement::ExportNamedDeclaration(export) => {
            if let Some(decl) = &export.declaration {
                declaration_names(decl, true, names);
            }
        }
        _ => {}
    }
}

/// Direct `let`/`const`/class/function names of `stmts`, without
/// descending into nested statements.
fn direct_lexical_names(stmts: &[Statement], names: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Statement::VariableDeclaration(var) => {
                if var.kind != VariableDeclarationKind::Var {
                    for declarator in &var.declarations {
                        collect_pattern_names(&declarator.id, names);
                    }
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    names.push(id.name.to_string());
                }
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    names.push(id.name.to_string());
                }
            }
            Statement::ExportNamedDeclaration(export) => {
                if let Some(decl) = &export.declaration {
                    declaration_names(decl, false, names);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_lookup_walks_all_frames() {
        let mut scopes = ScopeTracker::new();
        scopes.push_frame();
        scopes.declare("require");
        scopes.push_frame();
        assert!(scopes.is_shadowed("require"));
        assert!(!scopes.is_shadowed("__prefetchImport"));
        scopes.pop_frame();
        scopes.pop_frame();
        assert!(!scopes.is_shadowed("require"));
    }

    #[test]
    fn test_const_string_prefers_innermost_binding() {
        let mut scopes = ScopeTracker::new();
        scopes.push_frame();
        scopes.declare_const_string("v", "outer".to_string());
        scopes.push_frame();
        scopes.declare_const_string("v", "inner".to_string());
        assert_eq!(scopes.const_string("v"), Some("inner"));
        scopes.pop_frame();
        assert_eq!(scopes.const_string("v"), Some("outer"));
    }

    #[test]
    fn test_non_const_binding_masks_outer_const_string() {
        let mut scopes = ScopeTracker::new();
        scopes.push_frame();
        scopes.declare("v");
        scopes.declare_const_string("v", "outer".to_string());
        scopes.push_frame();
        scopes.declare("v");
        assert_eq!(scopes.const_string("v"), None);
        scopes.pop_frame();
        assert_eq!(scopes.const_string("v"), Some("outer"));
    }

    #[test]
    fn test_recognized_intrinsics_is_the_closed_set() {
        assert!(RECOGNIZED_INTRINSICS.contains("__jsResource"));
        assert!(RECOGNIZED_INTRINSICS.contains("__conditionallySplitJSResource"));
        assert!(RECOGNIZED_INTRINSICS.contains("__prefetchImport"));
        assert_eq!(RECOGNIZED_INTRINSICS.len(), 3);
        assert!(!RECOGNIZED_INTRINSICS.contains(REQUIRE_NAME));
    }
}
