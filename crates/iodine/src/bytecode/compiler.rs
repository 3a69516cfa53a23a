//! AST to bytecode compiler.
//!
//! Compilation runs in two passes over the same tree. [`analyse`] first
//! builds the scope tree in the [`SymbolTable`]; code generation then
//! replays that tree with `enter_scope`/`exit_scope`, visiting every
//! scope-creating node in exactly the order the analyser did. A local's slot
//! is therefore known at its first use even if it is assigned later.
//!
//! Each function, method, constructor and class initializer becomes its own
//! [`Method`]. The module's top-level statements become its initializer, and
//! top-level declarations are bound as module attributes at compile time.

use std::{
    mem,
    path::Path,
    rc::{Rc, Weak},
};

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;

use super::{
    builder::{CodeBuilder, JumpLabel},
    code::Method,
    op::{BinaryOp, Opcode, UnaryOp},
};
use crate::{
    analysis::analyse,
    ast::{
        ClassDecl, CodeLoc, CompilationUnit, EnumDecl, Expr, ExprLoc, FunctionDecl, InterfaceDecl, Stmt, StmtLoc,
        UseDecl,
    },
    compile_error::{CompileErrorKind, ErrorLog},
    symbol::{SymbolKind, SymbolTable},
    types::{AttrMap, Class, Enum, Interface, Module},
    value::Value,
};

/// Compiles a parsed source file into a module.
///
/// `name` is the module's name; `file` is the path it was loaded from, used to
/// resolve relative imports. Returns every error found if analysis or code
/// generation reported any.
pub fn compile_module(name: &str, file: &str, unit: &CompilationUnit) -> Result<Rc<Module>, ErrorLog> {
    let mut symbols = SymbolTable::new();
    let mut errors = ErrorLog::new();
    analyse(unit, &mut symbols, &mut errors);
    if errors.error_count() > 0 {
        return Err(errors);
    }

    symbols.reset();
    let module = Rc::new_cyclic(|weak: &Weak<Module>| {
        let mut compiler = Compiler::new(weak.clone(), file, &mut symbols, &mut errors);
        for stmt in &unit.stmts {
            compiler.root_stmt(stmt);
        }
        compiler.finish(name, file)
    });
    if errors.error_count() > 0 {
        return Err(errors);
    }
    Ok(module)
}

#[derive(Debug)]
struct LoopCtx {
    breaks: Vec<JumpLabel>,
    continues: Vec<JumpLabel>,
    /// Protected regions open when the loop started.
    handler_depth: usize,
}

/// Per-method emission state.
#[derive(Debug, Default)]
struct MethodCtx {
    code: CodeBuilder,
    loops: Vec<LoopCtx>,
    /// Protected regions currently open in this method.
    handler_depth: usize,
    in_function: bool,
    /// Base class names when compiling a constructor.
    bases: Option<Vec<String>>,
}

struct Compiler<'a> {
    module: Weak<Module>,
    /// Directory of the source file, for relative imports.
    directory: String,
    symbols: &'a mut SymbolTable,
    errors: &'a mut ErrorLog,
    current: MethodCtx,
    outer: Vec<MethodCtx>,
    constants: Vec<Value>,
    /// Interned string constants.
    strings: AHashMap<String, u32>,
    attributes: AttrMap,
    imports: Vec<String>,
}

impl<'a> Compiler<'a> {
    fn new(module: Weak<Module>, file: &str, symbols: &'a mut SymbolTable, errors: &'a mut ErrorLog) -> Self {
        let directory = Path::new(file)
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            module,
            directory,
            symbols,
            errors,
            current: MethodCtx::default(),
            outer: Vec::new(),
            constants: Vec::new(),
            strings: AHashMap::new(),
            attributes: AttrMap::default(),
            imports: Vec::new(),
        }
    }

    fn finish(mut self, name: &str, file: &str) -> Module {
        self.code().emit(Opcode::LoadNull);
        let root = mem::take(&mut self.current);
        let initializer = Method {
            module: self.module.clone(),
            name: "<module>".to_owned(),
            is_instance_method: false,
            parameters: IndexMap::new(),
            arity: 0,
            local_count: 0,
            variadic: false,
            accepts_keyword_args: false,
            body: root.code.build(),
        };
        Module {
            name: name.to_owned(),
            file: file.to_owned(),
            constant_pool: self.constants,
            attributes: std::cell::RefCell::new(self.attributes),
            initializer: Rc::new(initializer),
            imports: self.imports,
        }
    }

    fn code(&mut self) -> &mut CodeBuilder {
        &mut self.current.code
    }

    fn error(&mut self, loc: CodeLoc, kind: CompileErrorKind) {
        self.errors.add(loc, kind);
    }

    /// Converts a count or index to an operand, reporting overflow.
    fn operand(&mut self, value: usize, what: &'static str) -> u32 {
        u32::try_from(value).unwrap_or_else(|_| {
            let loc = self.current.code.location();
            self.error(loc, CompileErrorKind::TooManyOperands(what));
            0
        })
    }

    fn define_constant(&mut self, value: Value) -> u32 {
        if let Value::Str(s) = &value
            && let Some(&index) = self.strings.get(&**s)
        {
            return index;
        }
        let index = self.operand(self.constants.len(), "constants");
        if let Value::Str(s) = &value {
            self.strings.insert(s.to_string(), index);
        }
        self.constants.push(value);
        index
    }

    fn name_constant(&mut self, name: &str) -> u32 {
        self.define_constant(Value::from(name))
    }

    fn push_method(&mut self, loc: CodeLoc, bases: Option<Vec<String>>) {
        let mut code = CodeBuilder::new();
        code.set_location(loc);
        let ctx = MethodCtx {
            code,
            in_function: true,
            bases,
            ..MethodCtx::default()
        };
        self.outer.push(mem::replace(&mut self.current, ctx));
    }

    fn pop_method(&mut self) -> MethodCtx {
        let parent = self.outer.pop().unwrap_or_default();
        mem::replace(&mut self.current, parent)
    }

    fn bind_attribute(&mut self, loc: CodeLoc, name: &str, value: Value) {
        if self.attributes.contains_key(name) {
            self.error(loc, CompileErrorKind::DuplicateDefinition(name.to_owned()));
        } else {
            self.attributes.insert(name.to_owned(), value);
        }
    }

    // --- declarations ---

    fn root_stmt(&mut self, stmt: &StmtLoc) {
        self.code().set_location(stmt.loc);
        match &stmt.stmt {
            Stmt::Expr(expr) => {
                self.expr(expr);
                self.code().emit(Opcode::Pop);
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    self.root_stmt(stmt);
                }
            }
            Stmt::Function(decl) => {
                let method = self.compile_method(&decl.name, Some(decl), false, None);
                self.bind_attribute(decl.loc, &decl.name, Value::Method(method));
            }
            Stmt::Class(decl) => {
                let class = self.compile_class(decl);
                self.bind_attribute(decl.loc, &decl.name, Value::Class(class));
            }
            Stmt::Enum(decl) => {
                let value = self.compile_enum(decl);
                self.bind_attribute(decl.loc, &decl.name, value);
            }
            Stmt::Interface(decl) => {
                let value = compile_interface(decl);
                self.bind_attribute(decl.loc, &decl.name, value);
            }
            Stmt::Use(decl) => self.compile_use(decl),
            // rejected during analysis
            _ => {}
        }
    }

    /// Compiles a function body into a method. `bases` is set for class constructors.
    fn compile_method(
        &mut self,
        name: &str,
        decl: Option<&FunctionDecl>,
        is_instance_method: bool,
        bases: Option<&[String]>,
    ) -> Rc<Method> {
        self.symbols.enter_scope();

        let mut parameters = IndexMap::new();
        if let Some(decl) = decl {
            for param in decl.params.iter().chain(&decl.varargs).chain(&decl.kwargs) {
                if let Some(symbol) = self.symbols.lookup(param) {
                    parameters.insert(param.clone(), symbol.index);
                }
            }
        }

        let loc = decl.map_or_else(|| self.current.code.location(), |d| d.loc);
        self.push_method(loc, bases.map(<[String]>::to_vec));

        let body = decl.map_or(&[][..], |d| d.body.as_slice());
        if let Some(bases) = bases
            && !starts_with_super_call(body)
        {
            for base in bases {
                self.base_lookup(base);
                self.code().emit_arg(Opcode::InvokeSuper, 0);
            }
        }
        for stmt in body {
            self.stmt(stmt);
        }
        self.code().emit(Opcode::LoadNull);

        let local_count = self.symbols.local_count();
        let ctx = self.pop_method();
        self.symbols.exit_scope();

        Rc::new(Method {
            module: self.module.clone(),
            name: name.to_owned(),
            is_instance_method,
            parameters,
            arity: decl.map_or(0, |d| d.params.len()),
            local_count,
            variadic: decl.is_some_and(|d| d.varargs.is_some()),
            accepts_keyword_args: decl.is_some_and(|d| d.kwargs.is_some()),
            body: ctx.code.build(),
        })
    }

    fn compile_class(&mut self, decl: &ClassDecl) -> Rc<Class> {
        let constructor = self.compile_method(&decl.name, decl.constructor.as_ref(), true, Some(&decl.bases));

        let mut seen: AHashSet<&str> = AHashSet::new();

        // field initializers: `value; LoadSelf; StoreAttribute name`, run once with self = class
        self.symbols.enter_scope();
        self.push_method(decl.loc, None);
        let mut has_fields = false;
        for member in &decl.members {
            if let Stmt::Expr(ExprLoc {
                expr: Expr::Assign { target, value, .. },
                loc,
            }) = &member.stmt
                && let Expr::Name(name) = &target.expr
            {
                if !seen.insert(name.as_str()) {
                    self.error(*loc, CompileErrorKind::DuplicateDefinition(name.clone()));
                }
                has_fields = true;
                self.code().set_location(*loc);
                self.expr(value);
                self.code().emit(Opcode::LoadSelf);
                let index = self.name_constant(name);
                self.code().emit_arg(Opcode::StoreAttribute, index);
            }
        }
        self.code().emit(Opcode::LoadNull);
        let local_count = self.symbols.local_count();
        let ctx = self.pop_method();
        self.symbols.exit_scope();
        let initializer = has_fields.then(|| {
            Rc::new(Method {
                module: self.module.clone(),
                name: format!("{}.<fields>", decl.name),
                is_instance_method: true,
                parameters: IndexMap::new(),
                arity: 0,
                local_count,
                variadic: false,
                accepts_keyword_args: false,
                body: ctx.code.build(),
            })
        });

        let mut instance_methods = AttrMap::default();
        let mut attributes = AttrMap::default();
        for member in &decl.members {
            match &member.stmt {
                Stmt::Function(func) => {
                    let method = self.compile_method(&func.name, Some(func), !func.is_static, None);
                    if !seen.insert(func.name.as_str()) {
                        self.error(func.loc, CompileErrorKind::DuplicateDefinition(func.name.clone()));
                    } else if func.is_static {
                        attributes.insert(func.name.clone(), Value::Method(method));
                    } else {
                        instance_methods.insert(func.name.clone(), Value::Method(method));
                    }
                }
                Stmt::Class(nested) => {
                    let class = self.compile_class(nested);
                    if seen.insert(nested.name.as_str()) {
                        attributes.insert(nested.name.clone(), Value::Class(class));
                    } else {
                        self.error(nested.loc, CompileErrorKind::DuplicateDefinition(nested.name.clone()));
                    }
                }
                Stmt::Enum(nested) => {
                    let value = self.compile_enum(nested);
                    if seen.insert(nested.name.as_str()) {
                        attributes.insert(nested.name.clone(), value);
                    } else {
                        self.error(nested.loc, CompileErrorKind::DuplicateDefinition(nested.name.clone()));
                    }
                }
                _ => {}
            }
        }

        Rc::new(Class::new(
            decl.name.clone(),
            constructor,
            initializer,
            instance_methods,
            attributes,
            decl.bases.clone(),
        ))
    }

    /// Unvalued members count down from -1 regardless of position.
    fn compile_enum(&mut self, decl: &EnumDecl) -> Value {
        let mut members = IndexMap::new();
        let mut next_auto = -1;
        for member in &decl.members {
            let value = match &member.value {
                None => {
                    let value = next_auto;
                    next_auto -= 1;
                    value
                }
                Some(expr) => {
                    if let Some(value) = enum_literal(expr) {
                        value
                    } else {
                        self.error(member.loc, CompileErrorKind::MalformedEnumValue(member.name.clone()));
                        continue;
                    }
                }
            };
            if members.insert(member.name.clone(), value).is_some() {
                self.error(member.loc, CompileErrorKind::DuplicateDefinition(member.name.clone()));
            }
        }
        Value::Enum(Rc::new(Enum::new(decl.name.clone(), members)))
    }

    fn compile_use(&mut self, decl: &UseDecl) {
        self.code().set_location(decl.loc);
        let module = if decl.relative {
            let relative = decl.module.trim_start_matches(['/', '\\']);
            Path::new(&self.directory).join(relative).to_string_lossy().into_owned()
        } else {
            decl.module.clone()
        };
        let index = self.name_constant(&module);
        if decl.wildcard {
            self.code().emit_arg(Opcode::ImportAll, index);
        } else if !decl.names.is_empty() {
            let names = decl.names.iter().map(|n| Value::from(n.as_str())).collect();
            let names = self.define_constant(Value::new_tuple(names));
            self.code().emit_arg(Opcode::LoadConst, names);
            self.code().emit_arg(Opcode::ImportFrom, index);
            self.code().emit_arg(Opcode::Import, index);
        } else {
            self.code().emit_arg(Opcode::Import, index);
        }
        if !self.imports.contains(&module) {
            self.imports.push(module);
        }
    }

    // --- statements ---

    fn stmt(&mut self, stmt: &StmtLoc) {
        self.code().set_location(stmt.loc);
        match &stmt.stmt {
            Stmt::Expr(expr) => {
                self.expr(expr);
                self.code().emit(Opcode::Pop);
            }
            Stmt::Block(stmts) => {
                self.symbols.enter_scope();
                for stmt in stmts {
                    self.stmt(stmt);
                }
                self.symbols.exit_scope();
            }
            Stmt::If {
                condition,
                body,
                orelse,
            } => {
                self.expr(condition);
                let else_jump = self.code().emit_jump(Opcode::JumpIfFalse);
                self.stmt(body);
                if let Some(orelse) = orelse {
                    let end_jump = self.code().emit_jump(Opcode::Jump);
                    self.code().patch_jump(else_jump);
                    self.stmt(orelse);
                    self.code().patch_jump(end_jump);
                } else {
                    self.code().patch_jump(else_jump);
                }
            }
            Stmt::While { condition, body } => {
                let top = self.code().current_offset();
                self.expr(condition);
                let exit = self.code().emit_jump(Opcode::JumpIfFalse);
                self.begin_loop();
                self.stmt(body);
                self.code().emit_jump_to(Opcode::Jump, top);
                self.code().patch_jump(exit);
                let end = self.code().current_offset();
                self.end_loop(top, end);
            }
            Stmt::DoWhile { body, condition } => {
                let top = self.code().current_offset();
                self.begin_loop();
                self.stmt(body);
                let continue_target = self.code().current_offset();
                self.expr(condition);
                self.code().emit_jump_to(Opcode::JumpIfTrue, top);
                let end = self.code().current_offset();
                self.end_loop(continue_target, end);
            }
            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                self.symbols.enter_scope();
                if let Some(init) = init {
                    self.stmt(init);
                }
                let top = self.code().current_offset();
                let exit = condition.as_ref().map(|condition| {
                    self.expr(condition);
                    self.code().emit_jump(Opcode::JumpIfFalse)
                });
                self.begin_loop();
                self.stmt(body);
                let continue_target = self.code().current_offset();
                if let Some(step) = step {
                    self.expr(step);
                    self.code().emit(Opcode::Pop);
                }
                self.code().emit_jump_to(Opcode::Jump, top);
                if let Some(exit) = exit {
                    self.code().patch_jump(exit);
                }
                let end = self.code().current_offset();
                self.end_loop(continue_target, end);
                self.symbols.exit_scope();
            }
            Stmt::Foreach { item, iterable, body } => {
                self.expr(iterable);
                self.code().emit(Opcode::GetIter);
                self.code().emit(Opcode::Dup);
                self.code().emit(Opcode::IterReset);
                self.symbols.enter_scope();
                let top = self.code().current_offset();
                self.code().emit(Opcode::Dup);
                self.code().emit(Opcode::IterMoveNext);
                let exit = self.code().emit_jump(Opcode::JumpIfFalse);
                self.code().emit(Opcode::Dup);
                self.code().emit(Opcode::IterGetNext);
                self.store_name(item);
                self.begin_loop();
                self.stmt(body);
                self.code().emit_jump_to(Opcode::Jump, top);
                self.code().patch_jump(exit);
                let end = self.code().current_offset();
                self.end_loop(top, end);
                self.symbols.exit_scope();
                // the iterator
                self.code().emit(Opcode::Pop);
            }
            Stmt::Given { value, cases, default } => {
                self.expr(value);
                let mut ends = Vec::with_capacity(cases.len());
                for case in cases {
                    let mut matched = Vec::with_capacity(case.values.len());
                    for candidate in &case.values {
                        self.code().emit(Opcode::Dup);
                        self.expr(candidate);
                        self.code().emit_arg(Opcode::BinOp, BinaryOp::Equals as u32);
                        matched.push(self.code().emit_jump(Opcode::JumpIfTrue));
                    }
                    let next_case = self.code().emit_jump(Opcode::Jump);
                    for label in matched {
                        self.code().patch_jump(label);
                    }
                    self.code().emit(Opcode::Pop);
                    self.stmt(&case.body);
                    ends.push(self.code().emit_jump(Opcode::Jump));
                    self.code().patch_jump(next_case);
                    // the next case starts with the subject still on the stack
                    self.code().adjust_stack(1);
                }
                self.code().emit(Opcode::Pop);
                if let Some(default) = default {
                    self.stmt(default);
                }
                for label in ends {
                    self.code().patch_jump(label);
                }
            }
            Stmt::Break => self.loop_jump(stmt.loc, true),
            Stmt::Continue => self.loop_jump(stmt.loc, false),
            Stmt::Return(value) => {
                match value {
                    Some(value) => self.expr(value),
                    None => self.code().emit(Opcode::LoadNull),
                }
                for _ in 0..self.current.handler_depth {
                    self.code().emit(Opcode::PopExceptionHandler);
                }
                self.code().emit(Opcode::Return);
                self.code().adjust_stack(-1);
            }
            Stmt::Raise(value) => {
                self.expr(value);
                self.code().emit(Opcode::Raise);
            }
            Stmt::Try { body, handler } => {
                let handler_label = self.code().emit_jump(Opcode::PushExceptionHandler);
                self.current.handler_depth += 1;
                self.stmt(body);
                self.current.handler_depth -= 1;
                self.code().emit(Opcode::PopExceptionHandler);
                let end = self.code().emit_jump(Opcode::Jump);

                self.code().patch_jump(handler_label);
                self.symbols.enter_scope();
                if !handler.types.is_empty() {
                    let mut matched = Vec::with_capacity(handler.types.len());
                    for ty in &handler.types {
                        self.code().emit(Opcode::LoadException);
                        self.expr(ty);
                        self.code().emit(Opcode::InstanceOf);
                        matched.push(self.code().emit_jump(Opcode::JumpIfTrue));
                    }
                    self.code().emit(Opcode::LoadException);
                    self.code().emit(Opcode::Raise);
                    for label in matched {
                        self.code().patch_jump(label);
                    }
                }
                if let Some(binding) = &handler.binding {
                    self.code().emit(Opcode::LoadException);
                    self.store_name(binding);
                }
                self.stmt(&handler.body);
                self.symbols.exit_scope();
                self.code().patch_jump(end);
            }
            Stmt::Function(decl) => {
                let method = self.compile_method(&decl.name, Some(decl), false, None);
                let index = self.define_constant(Value::Method(method));
                self.code().set_location(decl.loc);
                self.code().emit_arg(Opcode::LoadConst, index);
                self.code().emit(Opcode::BuildClosure);
                self.store_name(&decl.name);
            }
            // rejected during analysis
            Stmt::Class(_) | Stmt::Enum(_) | Stmt::Interface(_) | Stmt::Use(_) => {}
        }
    }

    fn begin_loop(&mut self) {
        let handler_depth = self.current.handler_depth;
        self.current.loops.push(LoopCtx {
            breaks: Vec::new(),
            continues: Vec::new(),
            handler_depth,
        });
    }

    fn end_loop(&mut self, continue_target: u32, break_target: u32) {
        if let Some(ctx) = self.current.loops.pop() {
            for label in ctx.continues {
                self.code().patch_jump_to(label, continue_target);
            }
            for label in ctx.breaks {
                self.code().patch_jump_to(label, break_target);
            }
        }
    }

    fn loop_jump(&mut self, loc: CodeLoc, is_break: bool) {
        let Some(loop_depth) = self.current.loops.last().map(|l| l.handler_depth) else {
            let kind = if is_break {
                CompileErrorKind::BreakOutsideLoop
            } else {
                CompileErrorKind::ContinueOutsideLoop
            };
            self.error(loc, kind);
            return;
        };
        for _ in loop_depth..self.current.handler_depth {
            self.code().emit(Opcode::PopExceptionHandler);
        }
        let label = self.code().emit_jump(Opcode::Jump);
        if let Some(ctx) = self.current.loops.last_mut() {
            if is_break {
                ctx.breaks.push(label);
            } else {
                ctx.continues.push(label);
            }
        }
    }

    // --- expressions ---

    fn expr(&mut self, expr: &ExprLoc) {
        self.code().set_location(expr.loc);
        match &expr.expr {
            Expr::Null => self.code().emit(Opcode::LoadNull),
            Expr::Bool(true) => self.code().emit(Opcode::LoadTrue),
            Expr::Bool(false) => self.code().emit(Opcode::LoadFalse),
            Expr::Int(i) => self.load_constant(Value::Int(*i)),
            Expr::Float(f) => self.load_constant(Value::Float(*f)),
            Expr::Str(s) => self.load_constant(Value::from(s.as_str())),
            Expr::Name(name) => self.load_name(name),
            Expr::SelfRef => self.code().emit(Opcode::LoadSelf),
            Expr::Attribute { target, name } => {
                self.expr(target);
                let index = self.name_constant(name);
                self.code().emit_arg(Opcode::LoadAttribute, index);
            }
            Expr::Index { target, index } => {
                self.expr(target);
                self.expr(index);
                self.code().emit(Opcode::LoadIndex);
            }
            Expr::Call { callee, args, keywords } => {
                for arg in args {
                    self.expr(arg);
                }
                let mut argc = args.len();
                if !keywords.is_empty() {
                    for (name, value) in keywords {
                        let index = self.name_constant(name);
                        self.code().emit_arg(Opcode::LoadConst, index);
                        self.expr(value);
                    }
                    let pairs = self.operand(keywords.len(), "keyword arguments");
                    self.code().emit_arg(Opcode::BuildHash, pairs);
                    argc += 1;
                }
                self.expr(callee);
                let argc = self.operand(argc, "arguments");
                self.code().set_location(expr.loc);
                self.code().emit_arg(Opcode::Invoke, argc);
            }
            Expr::SuperCall { args } => self.super_call(expr.loc, args),
            Expr::Binary { op, left, right } => match op {
                BinaryOp::BoolAnd | BinaryOp::BoolOr => {
                    self.expr(left);
                    self.code().emit(Opcode::Dup);
                    let jump = if *op == BinaryOp::BoolAnd {
                        Opcode::JumpIfFalse
                    } else {
                        Opcode::JumpIfTrue
                    };
                    let short_circuit = self.code().emit_jump(jump);
                    self.code().emit(Opcode::Pop);
                    self.expr(right);
                    self.code().patch_jump(short_circuit);
                }
                _ => {
                    self.expr(left);
                    self.expr(right);
                    self.code().set_location(expr.loc);
                    self.code().emit_arg(Opcode::BinOp, *op as u32);
                }
            },
            Expr::Unary { op, operand } => {
                self.expr(operand);
                self.code().emit_arg(Opcode::UnaryOp, *op as u32);
            }
            Expr::Assign { target, op, value } => {
                if let Some(op) = op {
                    self.load_target(target);
                    self.expr(value);
                    self.code().emit_arg(Opcode::BinOp, *op as u32);
                } else {
                    self.expr(value);
                }
                self.code().emit(Opcode::Dup);
                self.store_target(target);
            }
            Expr::List(items) => {
                for item in items {
                    self.expr(item);
                }
                let count = self.operand(items.len(), "list elements");
                self.code().emit_arg(Opcode::BuildList, count);
            }
            Expr::Tuple(items) => {
                for item in items {
                    self.expr(item);
                }
                let count = self.operand(items.len(), "tuple elements");
                self.code().emit_arg(Opcode::BuildTuple, count);
            }
            Expr::Hash(pairs) => {
                for (key, value) in pairs {
                    self.expr(key);
                    self.expr(value);
                }
                let count = self.operand(pairs.len(), "hash entries");
                self.code().emit_arg(Opcode::BuildHash, count);
            }
            Expr::Lambda(decl) => {
                let in_function = self.current.in_function;
                let method = self.compile_method(&decl.name, Some(decl), false, None);
                let index = self.define_constant(Value::Method(method));
                self.code().set_location(expr.loc);
                self.code().emit_arg(Opcode::LoadConst, index);
                if in_function {
                    self.code().emit(Opcode::BuildClosure);
                }
            }
            Expr::Is { value, ty } => {
                self.expr(value);
                self.expr(ty);
                self.code().emit(Opcode::InstanceOf);
            }
            Expr::As { value, ty } => {
                self.expr(value);
                self.expr(ty);
                self.code().emit(Opcode::DynamicCast);
            }
            Expr::NullCoalesce { left, right } => {
                self.expr(left);
                let done = self.code().emit_jump(Opcode::NullCoalesce);
                self.expr(right);
                self.code().patch_jump(done);
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                self.expr(condition);
                let else_jump = self.code().emit_jump(Opcode::JumpIfFalse);
                self.expr(then);
                let end = self.code().emit_jump(Opcode::Jump);
                self.code().patch_jump(else_jump);
                self.expr(otherwise);
                self.code().patch_jump(end);
                // only one branch runs
                self.code().adjust_stack(-1);
            }
        }
    }

    fn load_constant(&mut self, value: Value) {
        let index = self.define_constant(value);
        self.code().emit_arg(Opcode::LoadConst, index);
    }

    fn load_name(&mut self, name: &str) {
        match self.symbols.lookup(name) {
            Some(symbol) if symbol.kind == SymbolKind::Local => {
                let slot = self.operand(symbol.index, "locals");
                self.code().emit_arg(Opcode::LoadLocal, slot);
            }
            _ => {
                let index = self.name_constant(name);
                self.code().emit_arg(Opcode::LoadGlobal, index);
            }
        }
    }

    fn store_name(&mut self, name: &str) {
        match self.symbols.lookup(name) {
            Some(symbol) if symbol.kind == SymbolKind::Local => {
                let slot = self.operand(symbol.index, "locals");
                self.code().emit_arg(Opcode::StoreLocal, slot);
            }
            _ => {
                let index = self.name_constant(name);
                self.code().emit_arg(Opcode::StoreGlobal, index);
            }
        }
    }

    /// Pushes the current value of an assignment target.
    fn load_target(&mut self, target: &ExprLoc) {
        match &target.expr {
            Expr::Name(_) | Expr::Attribute { .. } | Expr::Index { .. } => self.expr(target),
            // rejected during analysis
            _ => self.code().emit(Opcode::LoadNull),
        }
    }

    /// Pops the value on top of the stack into an assignment target.
    fn store_target(&mut self, target: &ExprLoc) {
        match &target.expr {
            Expr::Name(name) => self.store_name(name),
            Expr::Attribute { target, name } => {
                self.expr(target);
                let index = self.name_constant(name);
                self.code().emit_arg(Opcode::StoreAttribute, index);
            }
            Expr::Index { target, index } => {
                self.expr(target);
                self.expr(index);
                self.code().emit(Opcode::StoreIndex);
            }
            // rejected during analysis
            _ => self.code().emit(Opcode::Pop),
        }
    }

    /// `super(args)` runs the first base's constructor; evaluates to null.
    fn super_call(&mut self, loc: CodeLoc, args: &[ExprLoc]) {
        for arg in args {
            self.expr(arg);
        }
        let base = self.current.bases.as_ref().and_then(|bases| bases.first().cloned());
        let Some(base) = base else {
            self.error(loc, CompileErrorKind::SuperCallOutsideConstructor);
            return;
        };
        self.base_lookup(&base);
        let argc = self.operand(args.len(), "arguments");
        self.code().set_location(loc);
        self.code().emit_arg(Opcode::InvokeSuper, argc);
        self.code().emit(Opcode::LoadNull);
    }

    /// `LoadGlobal` of the first segment, then `LoadAttribute` per dotted segment.
    fn base_lookup(&mut self, name: &str) {
        let mut segments = name.split('.');
        if let Some(first) = segments.next() {
            let index = self.name_constant(first);
            self.code().emit_arg(Opcode::LoadGlobal, index);
        }
        for segment in segments {
            let index = self.name_constant(segment);
            self.code().emit_arg(Opcode::LoadAttribute, index);
        }
    }
}

fn compile_interface(decl: &InterfaceDecl) -> Value {
    Value::Interface(Rc::new(Interface::new(decl.name.clone(), decl.methods.clone())))
}

fn starts_with_super_call(body: &[StmtLoc]) -> bool {
    matches!(
        body.first(),
        Some(StmtLoc {
            stmt: Stmt::Expr(ExprLoc {
                expr: Expr::SuperCall { .. },
                ..
            }),
            ..
        })
    )
}

/// An integer literal, optionally negated.
fn enum_literal(expr: &ExprLoc) -> Option<i64> {
    match &expr.expr {
        Expr::Int(i) => Some(*i),
        Expr::Unary {
            op: UnaryOp::Negate,
            operand,
        } => match operand.expr {
            Expr::Int(i) => i.checked_neg(),
            _ => None,
        },
        _ => None,
    }
}
