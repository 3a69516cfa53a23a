//! Scope-resolution pass run before code generation.
//!
//! Populates the [`SymbolTable`] and reports semantic errors that depend on
//! where a statement appears. The traversal order here is mirrored exactly by
//! the compiler, which replays the resulting scope tree.

use crate::{
    ast::{ClassDecl, CodeLoc, CompilationUnit, Expr, ExprLoc, FunctionDecl, Stmt, StmtLoc},
    compile_error::{CompileErrorKind, ErrorLog},
    symbol::SymbolTable,
};

/// Runs scope analysis over a whole compilation unit.
pub fn analyse(unit: &CompilationUnit, symbols: &mut SymbolTable, errors: &mut ErrorLog) {
    let mut analyser = Analyser {
        symbols,
        errors,
        in_function: false,
    };
    for stmt in &unit.stmts {
        analyser.root_stmt(stmt);
    }
}

struct Analyser<'a> {
    symbols: &'a mut SymbolTable,
    errors: &'a mut ErrorLog,
    in_function: bool,
}

impl Analyser<'_> {
    fn root_stmt(&mut self, stmt: &StmtLoc) {
        match &stmt.stmt {
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.root_stmt(stmt);
                }
            }
            Stmt::Function(decl) => {
                self.symbols.add_symbol(&decl.name);
                self.function(decl, true);
            }
            Stmt::Class(decl) => {
                self.symbols.add_symbol(&decl.name);
                self.class(decl);
            }
            Stmt::Enum(decl) => {
                self.symbols.add_symbol(&decl.name);
            }
            Stmt::Interface(decl) => {
                self.symbols.add_symbol(&decl.name);
            }
            Stmt::Use(_) => {}
            other => {
                let keyword = statement_keyword(other);
                self.errors
                    .add(stmt.loc, CompileErrorKind::StatementNotAllowedOutsideFunction(keyword));
            }
        }
    }

    fn function(&mut self, decl: &FunctionDecl, boundary: bool) {
        self.symbols.begin_scope(boundary);
        self.parameters(decl);
        let saved = std::mem::replace(&mut self.in_function, true);
        for stmt in &decl.body {
            self.stmt(stmt);
        }
        self.in_function = saved;
        self.symbols.end_scope(boundary);
    }

    fn parameters(&mut self, decl: &FunctionDecl) {
        let names = decl.params.iter().chain(&decl.varargs).chain(&decl.kwargs);
        let mut seen: Vec<&str> = Vec::new();
        for name in names {
            if seen.contains(&name.as_str()) {
                self.errors
                    .add(decl.loc, CompileErrorKind::DuplicateDefinition(name.clone()));
            }
            seen.push(name);
            self.symbols.add_symbol(name);
        }
    }

    fn class(&mut self, decl: &ClassDecl) {
        match &decl.constructor {
            Some(ctor) => self.function(ctor, true),
            None => {
                self.symbols.begin_scope(true);
                self.symbols.end_scope(true);
            }
        }

        // field initializers share one method
        self.symbols.begin_scope(true);
        let saved = std::mem::replace(&mut self.in_function, true);
        for member in &decl.members {
            if let Stmt::Expr(ExprLoc {
                expr: Expr::Assign { target, op, value },
                loc,
            }) = &member.stmt
            {
                if matches!(target.expr, Expr::Name(_)) && op.is_none() {
                    self.expr(value);
                } else {
                    self.errors.add(*loc, CompileErrorKind::InvalidFieldInitializer);
                }
            }
        }
        self.in_function = saved;
        self.symbols.end_scope(true);

        for member in &decl.members {
            match &member.stmt {
                Stmt::Function(func) => self.function(func, true),
                Stmt::Class(nested) => self.class(nested),
                Stmt::Enum(_) => {}
                Stmt::Expr(ExprLoc {
                    expr: Expr::Assign { .. },
                    ..
                }) => {}
                _ => self.errors.add(member.loc, CompileErrorKind::InvalidClassMember),
            }
        }
    }

    fn stmt(&mut self, stmt: &StmtLoc) {
        match &stmt.stmt {
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Block(stmts) => {
                self.symbols.begin_scope(false);
                for stmt in stmts {
                    self.stmt(stmt);
                }
                self.symbols.end_scope(false);
            }
            Stmt::If {
                condition,
                body,
                orelse,
            } => {
                self.expr(condition);
                self.stmt(body);
                if let Some(orelse) = orelse {
                    self.stmt(orelse);
                }
            }
            Stmt::While { condition, body } => {
                self.expr(condition);
                self.stmt(body);
            }
            Stmt::DoWhile { body, condition } => {
                self.stmt(body);
                self.expr(condition);
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                self.symbols.begin_scope(false);
                if let Some(init) = init {
                    self.stmt(init);
                }
                if let Some(condition) = condition {
                    self.expr(condition);
                }
                self.stmt(body);
                if let Some(step) = step {
                    self.expr(step);
                }
                self.symbols.end_scope(false);
            }
            Stmt::Foreach { item, iterable, body } => {
                self.expr(iterable);
                self.symbols.begin_scope(false);
                self.symbols.add_symbol(item);
                self.stmt(body);
                self.symbols.end_scope(false);
            }
            Stmt::Given { value, cases, default } => {
                self.expr(value);
                for case in cases {
                    for value in &case.values {
                        self.expr(value);
                    }
                    self.stmt(&case.body);
                }
                if let Some(default) = default {
                    self.stmt(default);
                }
            }
            Stmt::Break | Stmt::Continue | Stmt::Return(None) => {}
            Stmt::Return(Some(expr)) | Stmt::Raise(expr) => self.expr(expr),
            Stmt::Try { body, handler } => {
                self.stmt(body);
                self.symbols.begin_scope(false);
                if let Some(binding) = &handler.binding {
                    self.symbols.add_symbol(binding);
                }
                for ty in &handler.types {
                    self.expr(ty);
                }
                self.stmt(&handler.body);
                self.symbols.end_scope(false);
            }
            Stmt::Function(decl) => {
                self.symbols.add_symbol(&decl.name);
                self.function(decl, false);
            }
            Stmt::Class(_) => self.declaration_in_function(stmt.loc, "class"),
            Stmt::Enum(_) => self.declaration_in_function(stmt.loc, "enum"),
            Stmt::Interface(_) => self.declaration_in_function(stmt.loc, "interface"),
            Stmt::Use(_) => self.declaration_in_function(stmt.loc, "use"),
        }
    }

    fn declaration_in_function(&mut self, loc: CodeLoc, keyword: &'static str) {
        self.errors
            .add(loc, CompileErrorKind::DeclarationNotAllowedInFunction(keyword));
    }

    fn expr(&mut self, expr: &ExprLoc) {
        match &expr.expr {
            Expr::Null
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Name(_)
            | Expr::SelfRef => {}
            Expr::Attribute { target, .. } => self.expr(target),
            Expr::Index { target, index } => {
                self.expr(target);
                self.expr(index);
            }
            Expr::Call { callee, args, keywords } => {
                for arg in args {
                    self.expr(arg);
                }
                for (_, value) in keywords {
                    self.expr(value);
                }
                self.expr(callee);
            }
            Expr::SuperCall { args } | Expr::List(args) | Expr::Tuple(args) => {
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Binary { left, right, .. }
            | Expr::NullCoalesce { left, right }
            | Expr::Is {
                value: left,
                ty: right,
            }
            | Expr::As {
                value: left,
                ty: right,
            } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Assign { target, op, value } => {
                if op.is_some() {
                    self.assign_target(target);
                }
                self.expr(value);
                self.assign_target(target);
            }
            Expr::Hash(pairs) => {
                for (key, value) in pairs {
                    self.expr(key);
                    self.expr(value);
                }
            }
            Expr::Lambda(decl) => {
                let boundary = !self.in_function;
                self.function(decl, boundary);
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                self.expr(condition);
                self.expr(then);
                self.expr(otherwise);
            }
        }
    }

    /// Visits the sub-expressions of an assignment target, declaring a bare
    /// name on its first assignment.
    fn assign_target(&mut self, target: &ExprLoc) {
        match &target.expr {
            Expr::Name(name) => {
                if !self.symbols.is_defined(name) {
                    self.symbols.add_symbol(name);
                }
            }
            Expr::Attribute { target, .. } => self.expr(target),
            Expr::Index { target, index } => {
                self.expr(target);
                self.expr(index);
            }
            _ => self.errors.add(target.loc, CompileErrorKind::InvalidAssignmentTarget),
        }
    }
}

fn statement_keyword(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::If { .. } => "if",
        Stmt::While { .. } => "while",
        Stmt::DoWhile { .. } => "do",
        Stmt::For { .. } => "for",
        Stmt::Foreach { .. } => "foreach",
        Stmt::Given { .. } => "given",
        Stmt::Break => "break",
        Stmt::Continue => "continue",
        Stmt::Return(_) => "return",
        Stmt::Raise(_) => "raise",
        Stmt::Try { .. } => "try",
        Stmt::Expr(_) => "expression",
        Stmt::Block(_) => "block",
        Stmt::Function(_) => "func",
        Stmt::Class(_) => "class",
        Stmt::Enum(_) => "enum",
        Stmt::Interface(_) => "interface",
        Stmt::Use(_) => "use",
    }
}
