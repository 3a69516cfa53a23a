//! AST node contract consumed by the analyser and the bytecode compiler.
//!
//! The front end (scanner and parser) lives outside this crate. It hands over a
//! [`CompilationUnit`] whose nodes follow the fixed shapes below; the compiler
//! performs no further syntax validation.
//!
//! Helper constructors (`ExprLoc::int`, `StmtLoc::expr`, ...) keep hand-built
//! trees short in tests and embedders.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bytecode::{BinaryOp, UnaryOp};

/// A line/column position in source code, attached to every node and emitted instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An expression with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprLoc {
    pub loc: CodeLoc,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A bare identifier, resolved to a local slot or a global name at compile time.
    Name(String),
    /// The receiver of the executing method.
    SelfRef,
    Attribute {
        target: Box<ExprLoc>,
        name: String,
    },
    Index {
        target: Box<ExprLoc>,
        index: Box<ExprLoc>,
    },
    /// A call. Keyword arguments travel as one trailing hash argument.
    Call {
        callee: Box<ExprLoc>,
        args: Vec<ExprLoc>,
        keywords: Vec<(String, ExprLoc)>,
    },
    /// `super(args)`; only valid as a statement inside a class constructor.
    SuperCall {
        args: Vec<ExprLoc>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprLoc>,
        right: Box<ExprLoc>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ExprLoc>,
    },
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        target: Box<ExprLoc>,
        op: Option<BinaryOp>,
        value: Box<ExprLoc>,
    },
    List(Vec<ExprLoc>),
    Tuple(Vec<ExprLoc>),
    Hash(Vec<(ExprLoc, ExprLoc)>),
    Lambda(Box<FunctionDecl>),
    /// `value is Type`
    Is {
        value: Box<ExprLoc>,
        ty: Box<ExprLoc>,
    },
    /// `value as Type`
    As {
        value: Box<ExprLoc>,
        ty: Box<ExprLoc>,
    },
    /// `left ?? right`
    NullCoalesce {
        left: Box<ExprLoc>,
        right: Box<ExprLoc>,
    },
    Ternary {
        condition: Box<ExprLoc>,
        then: Box<ExprLoc>,
        otherwise: Box<ExprLoc>,
    },
}

/// A statement with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtLoc {
    pub loc: CodeLoc,
    pub stmt: Stmt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(ExprLoc),
    Block(Vec<StmtLoc>),
    /// Children: condition, then-branch, else-branch (absent means empty).
    If {
        condition: ExprLoc,
        body: Box<StmtLoc>,
        orelse: Option<Box<StmtLoc>>,
    },
    While {
        condition: ExprLoc,
        body: Box<StmtLoc>,
    },
    DoWhile {
        body: Box<StmtLoc>,
        condition: ExprLoc,
    },
    For {
        init: Option<Box<StmtLoc>>,
        condition: Option<ExprLoc>,
        step: Option<ExprLoc>,
        body: Box<StmtLoc>,
    },
    Foreach {
        item: String,
        iterable: ExprLoc,
        body: Box<StmtLoc>,
    },
    Given {
        value: ExprLoc,
        cases: Vec<WhenCase>,
        default: Option<Box<StmtLoc>>,
    },
    Break,
    Continue,
    Return(Option<ExprLoc>),
    Raise(ExprLoc),
    Try {
        body: Box<StmtLoc>,
        handler: ExceptClause,
    },
    Function(FunctionDecl),
    Class(ClassDecl),
    Enum(EnumDecl),
    Interface(InterfaceDecl),
    Use(UseDecl),
}

/// One `when v1, v2 { ... }` arm of a `given` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenCase {
    pub values: Vec<ExprLoc>,
    pub body: StmtLoc,
}

/// `except (binding as T1, T2) { body }`; an empty `types` list catches everything.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptClause {
    pub binding: Option<String>,
    pub types: Vec<ExprLoc>,
    pub body: Box<StmtLoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub loc: CodeLoc,
    pub name: String,
    /// Positional parameters in declaration order.
    pub params: Vec<String>,
    /// Trailing `*args` parameter, bound to a tuple of the surplus arguments.
    pub varargs: Option<String>,
    /// Trailing `**kwargs` parameter, bound to a hash map.
    pub kwargs: Option<String>,
    /// Static methods attach to the class attribute table instead of the instance-method table.
    pub is_static: bool,
    pub body: Vec<StmtLoc>,
}

impl FunctionDecl {
    #[must_use]
    pub fn new(name: impl Into<String>, params: &[&str], body: Vec<StmtLoc>) -> Self {
        Self {
            loc: CodeLoc::default(),
            name: name.into(),
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            varargs: None,
            kwargs: None,
            is_static: false,
            body,
        }
    }

    #[must_use]
    pub fn with_varargs(mut self, name: impl Into<String>) -> Self {
        self.varargs = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_kwargs(mut self, name: impl Into<String>) -> Self {
        self.kwargs = Some(name.into());
        self
    }

    #[must_use]
    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub loc: CodeLoc,
    pub name: String,
    /// Base class names; dotted names (`mod.Base`) are looked up segment by segment.
    pub bases: Vec<String>,
    pub constructor: Option<FunctionDecl>,
    /// Methods, nested classes and enums, and `name = expr` field initializers.
    pub members: Vec<StmtLoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub loc: CodeLoc,
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub loc: CodeLoc,
    pub name: String,
    pub value: Option<ExprLoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub loc: CodeLoc,
    pub name: String,
    pub methods: Vec<InterfaceMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMethod {
    pub name: String,
    pub arity: usize,
}

/// `use module`, `use a, b from module`, `use * from module`.
#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    pub loc: CodeLoc,
    pub module: String,
    /// A leading path separator in source: resolved against the importing file's directory.
    pub relative: bool,
    pub names: Vec<String>,
    pub wildcard: bool,
}

/// The root of a parsed source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilationUnit {
    pub stmts: Vec<StmtLoc>,
}

impl CompilationUnit {
    #[must_use]
    pub fn new(stmts: Vec<StmtLoc>) -> Self {
        Self { stmts }
    }
}

impl ExprLoc {
    #[must_use]
    pub fn new(expr: Expr) -> Self {
        Self {
            loc: CodeLoc::default(),
            expr,
        }
    }

    #[must_use]
    pub fn at(mut self, loc: CodeLoc) -> Self {
        self.loc = loc;
        self
    }

    #[must_use]
    pub fn null() -> Self {
        Self::new(Expr::Null)
    }

    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::new(Expr::Bool(value))
    }

    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::new(Expr::Int(value))
    }

    #[must_use]
    pub fn float(value: f64) -> Self {
        Self::new(Expr::Float(value))
    }

    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::new(Expr::Str(value.into()))
    }

    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::new(Expr::Name(name.into()))
    }

    #[must_use]
    pub fn self_ref() -> Self {
        Self::new(Expr::SelfRef)
    }

    #[must_use]
    pub fn attr(self, name: impl Into<String>) -> Self {
        Self::new(Expr::Attribute {
            target: Box::new(self),
            name: name.into(),
        })
    }

    #[must_use]
    pub fn index(self, index: Self) -> Self {
        Self::new(Expr::Index {
            target: Box::new(self),
            index: Box::new(index),
        })
    }

    #[must_use]
    pub fn call(self, args: Vec<Self>) -> Self {
        Self::new(Expr::Call {
            callee: Box::new(self),
            args,
            keywords: Vec::new(),
        })
    }

    #[must_use]
    pub fn call_kw(self, args: Vec<Self>, keywords: Vec<(&str, Self)>) -> Self {
        Self::new(Expr::Call {
            callee: Box::new(self),
            args,
            keywords: keywords.into_iter().map(|(k, v)| (k.to_owned(), v)).collect(),
        })
    }

    #[must_use]
    pub fn super_call(args: Vec<Self>) -> Self {
        Self::new(Expr::SuperCall { args })
    }

    #[must_use]
    pub fn binary(self, op: BinaryOp, right: Self) -> Self {
        Self::new(Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        })
    }

    #[must_use]
    pub fn unary(op: UnaryOp, operand: Self) -> Self {
        Self::new(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    #[must_use]
    pub fn assign(self, value: Self) -> Self {
        Self::new(Expr::Assign {
            target: Box::new(self),
            op: None,
            value: Box::new(value),
        })
    }

    #[must_use]
    pub fn assign_op(self, op: BinaryOp, value: Self) -> Self {
        Self::new(Expr::Assign {
            target: Box::new(self),
            op: Some(op),
            value: Box::new(value),
        })
    }

    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::new(Expr::List(items))
    }

    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::new(Expr::Tuple(items))
    }

    #[must_use]
    pub fn hash(pairs: Vec<(Self, Self)>) -> Self {
        Self::new(Expr::Hash(pairs))
    }

    #[must_use]
    pub fn lambda(params: &[&str], body: Vec<StmtLoc>) -> Self {
        Self::new(Expr::Lambda(Box::new(FunctionDecl::new("<lambda>", params, body))))
    }

    #[must_use]
    pub fn is(self, ty: Self) -> Self {
        Self::new(Expr::Is {
            value: Box::new(self),
            ty: Box::new(ty),
        })
    }

    #[must_use]
    pub fn cast(self, ty: Self) -> Self {
        Self::new(Expr::As {
            value: Box::new(self),
            ty: Box::new(ty),
        })
    }

    #[must_use]
    pub fn or_else(self, right: Self) -> Self {
        Self::new(Expr::NullCoalesce {
            left: Box::new(self),
            right: Box::new(right),
        })
    }

    #[must_use]
    pub fn ternary(condition: Self, then: Self, otherwise: Self) -> Self {
        Self::new(Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }
}

impl StmtLoc {
    #[must_use]
    pub fn new(stmt: Stmt) -> Self {
        Self {
            loc: CodeLoc::default(),
            stmt,
        }
    }

    #[must_use]
    pub fn at(mut self, loc: CodeLoc) -> Self {
        self.loc = loc;
        self
    }

    #[must_use]
    pub fn expr(expr: ExprLoc) -> Self {
        let loc = expr.loc;
        Self::new(Stmt::Expr(expr)).at(loc)
    }

    #[must_use]
    pub fn block(stmts: Vec<Self>) -> Self {
        Self::new(Stmt::Block(stmts))
    }

    #[must_use]
    pub fn if_else(condition: ExprLoc, body: Vec<Self>, orelse: Option<Vec<Self>>) -> Self {
        Self::new(Stmt::If {
            condition,
            body: Box::new(Self::block(body)),
            orelse: orelse.map(|stmts| Box::new(Self::block(stmts))),
        })
    }

    #[must_use]
    pub fn while_loop(condition: ExprLoc, body: Vec<Self>) -> Self {
        Self::new(Stmt::While {
            condition,
            body: Box::new(Self::block(body)),
        })
    }

    #[must_use]
    pub fn do_while(body: Vec<Self>, condition: ExprLoc) -> Self {
        Self::new(Stmt::DoWhile {
            body: Box::new(Self::block(body)),
            condition,
        })
    }

    #[must_use]
    pub fn for_loop(init: Option<Self>, condition: Option<ExprLoc>, step: Option<ExprLoc>, body: Vec<Self>) -> Self {
        Self::new(Stmt::For {
            init: init.map(Box::new),
            condition,
            step,
            body: Box::new(Self::block(body)),
        })
    }

    #[must_use]
    pub fn foreach(item: &str, iterable: ExprLoc, body: Vec<Self>) -> Self {
        Self::new(Stmt::Foreach {
            item: item.to_owned(),
            iterable,
            body: Box::new(Self::block(body)),
        })
    }

    #[must_use]
    pub fn ret(value: Option<ExprLoc>) -> Self {
        Self::new(Stmt::Return(value))
    }

    #[must_use]
    pub fn raise(value: ExprLoc) -> Self {
        Self::new(Stmt::Raise(value))
    }

    #[must_use]
    pub fn try_except(body: Vec<Self>, binding: Option<&str>, types: Vec<ExprLoc>, handler: Vec<Self>) -> Self {
        Self::new(Stmt::Try {
            body: Box::new(Self::block(body)),
            handler: ExceptClause {
                binding: binding.map(str::to_owned),
                types,
                body: Box::new(Self::block(handler)),
            },
        })
    }

    #[must_use]
    pub fn function(decl: FunctionDecl) -> Self {
        let loc = decl.loc;
        Self::new(Stmt::Function(decl)).at(loc)
    }
}
