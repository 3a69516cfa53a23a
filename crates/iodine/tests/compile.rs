//! Tests for the shape of compiled modules: constant pools, emitted opcodes
//! and compile-time diagnostics.

use iodine::{
    BinaryOp, CompileErrorKind, Opcode, Value, compile_module,
    ast::{
        ClassDecl, CodeLoc, CompilationUnit, EnumDecl, EnumMember, ExprLoc, FunctionDecl, InterfaceDecl,
        InterfaceMethod, Stmt, StmtLoc,
    },
};
use pretty_assertions::assert_eq;

fn compile(stmts: Vec<StmtLoc>) -> std::rc::Rc<iodine::Module> {
    compile_module("test", "test.id", &CompilationUnit::new(stmts)).unwrap()
}

fn compile_err(stmts: Vec<StmtLoc>) -> Vec<CompileErrorKind> {
    compile_module("test", "test.id", &CompilationUnit::new(stmts))
        .unwrap_err()
        .kinds()
}

fn function(name: &str, body: Vec<StmtLoc>) -> StmtLoc {
    StmtLoc::function(FunctionDecl::new(name, &[], body))
}

fn class(name: &str, bases: &[&str], constructor: Option<FunctionDecl>, members: Vec<StmtLoc>) -> StmtLoc {
    StmtLoc::new(Stmt::Class(ClassDecl {
        loc: CodeLoc::default(),
        name: name.to_owned(),
        bases: bases.iter().map(|b| (*b).to_owned()).collect(),
        constructor,
        members,
    }))
}

// === Constant pool ===

#[test]
fn literals_are_pooled_with_their_values() {
    let module = compile(vec![function(
        "main",
        vec![
            StmtLoc::expr(ExprLoc::int(42)),
            StmtLoc::expr(ExprLoc::float(2.5)),
            StmtLoc::expr(ExprLoc::str("hello")),
        ],
    )]);
    let main = module.method("main").unwrap();
    let loaded: Vec<String> = main
        .body()
        .iter()
        .filter(|instr| instr.op == Opcode::LoadConst)
        .map(|instr| module.constant(instr.arg as usize).unwrap().repr())
        .collect();
    assert_eq!(loaded, vec!["42", "2.5", r#""hello""#]);
}

#[test]
fn keyword_constants_have_dedicated_opcodes() {
    let module = compile(vec![function(
        "main",
        vec![
            StmtLoc::expr(ExprLoc::null()),
            StmtLoc::expr(ExprLoc::bool(true)),
            StmtLoc::expr(ExprLoc::bool(false)),
        ],
    )]);
    assert!(module.constants().iter().all(|c| !matches!(c, Value::Null | Value::Bool(_))));
    assert_eq!(
        module.method("main").unwrap().opcodes(),
        vec![
            Opcode::LoadNull,
            Opcode::Pop,
            Opcode::LoadTrue,
            Opcode::Pop,
            Opcode::LoadFalse,
            Opcode::Pop,
            Opcode::LoadNull,
        ]
    );
}

// === Expressions ===

#[test]
fn list_elements_are_pushed_left_to_right() {
    let module = compile(vec![function(
        "main",
        vec![StmtLoc::expr(ExprLoc::list(vec![
            ExprLoc::int(1),
            ExprLoc::int(2),
            ExprLoc::int(3),
        ]))],
    )]);
    let main = module.method("main").unwrap();
    let body = main.body();
    let build = body.iter().position(|i| i.op == Opcode::BuildList).unwrap();
    assert_eq!(body[build].arg, 3);
    let pushed: Vec<String> = body[..build]
        .iter()
        .map(|i| module.constant(i.arg as usize).unwrap().repr())
        .collect();
    assert_eq!(pushed, vec!["1", "2", "3"]);
}

#[test]
fn call_pushes_arguments_before_callee() {
    let module = compile(vec![function(
        "main",
        vec![StmtLoc::expr(
            ExprLoc::name("f").call(vec![ExprLoc::int(1), ExprLoc::int(2)]),
        )],
    )]);
    assert_eq!(
        module.method("main").unwrap().opcodes(),
        vec![
            Opcode::LoadConst,
            Opcode::LoadConst,
            Opcode::LoadGlobal,
            Opcode::Invoke,
            Opcode::Pop,
            Opcode::LoadNull,
        ]
    );
}

#[test]
fn keyword_arguments_become_a_trailing_hash() {
    let module = compile(vec![function(
        "main",
        vec![StmtLoc::expr(ExprLoc::name("f").call_kw(
            vec![ExprLoc::int(1)],
            vec![("a", ExprLoc::int(2)), ("b", ExprLoc::int(3))],
        ))],
    )]);
    let main = module.method("main").unwrap();
    let body = main.body();
    let hash = body.iter().find(|i| i.op == Opcode::BuildHash).unwrap();
    assert_eq!(hash.arg, 2);
    let invoke = body.iter().find(|i| i.op == Opcode::Invoke).unwrap();
    assert_eq!(invoke.arg, 2);
}

#[test]
fn short_circuit_operators_jump_over_the_right_operand() {
    let module = compile(vec![function(
        "main",
        vec![StmtLoc::expr(
            ExprLoc::name("a").binary(BinaryOp::BoolAnd, ExprLoc::name("b")),
        )],
    )]);
    let ops = module.method("main").unwrap().opcodes();
    assert_eq!(
        ops[..5],
        [
            Opcode::LoadGlobal,
            Opcode::Dup,
            Opcode::JumpIfFalse,
            Opcode::Pop,
            Opcode::LoadGlobal,
        ]
    );
    assert!(!ops.contains(&Opcode::BinOp));
}

#[test]
fn compound_assignment_loads_operates_and_stores() {
    let module = compile(vec![function(
        "main",
        vec![
            StmtLoc::expr(ExprLoc::name("x").assign(ExprLoc::int(1))),
            StmtLoc::expr(ExprLoc::name("x").assign_op(BinaryOp::Add, ExprLoc::int(2))),
        ],
    )]);
    let ops = module.method("main").unwrap().opcodes();
    assert_eq!(
        ops[4..9],
        [
            Opcode::LoadLocal,
            Opcode::LoadConst,
            Opcode::BinOp,
            Opcode::Dup,
            Opcode::StoreLocal,
        ]
    );
}

#[test]
fn nested_function_becomes_a_closure_and_root_lambda_does_not() {
    let module = compile(vec![
        function(
            "main",
            vec![StmtLoc::function(FunctionDecl::new("inner", &[], vec![]))],
        ),
        StmtLoc::expr(ExprLoc::name("f").assign(ExprLoc::lambda(&[], vec![]))),
    ]);
    let main_ops = module.method("main").unwrap().opcodes();
    assert_eq!(main_ops[..3], [Opcode::LoadConst, Opcode::BuildClosure, Opcode::StoreLocal]);
    let root_ops = module.initializer().opcodes();
    assert!(!root_ops.contains(&Opcode::BuildClosure));
    assert!(root_ops.contains(&Opcode::StoreGlobal));
}

// === Statements ===

#[test]
fn try_except_pushes_and_pops_a_handler() {
    let module = compile(vec![function(
        "main",
        vec![StmtLoc::try_except(
            vec![StmtLoc::expr(ExprLoc::int(1))],
            Some("e"),
            vec![ExprLoc::name("TypeError")],
            vec![],
        )],
    )]);
    let main = module.method("main").unwrap();
    let body = main.body();
    assert_eq!(body[0].op, Opcode::PushExceptionHandler);
    let pop = body.iter().position(|i| i.op == Opcode::PopExceptionHandler).unwrap();
    assert_eq!(body[pop + 1].op, Opcode::Jump);
    let handler = body[0].arg as usize;
    assert_eq!(handler, pop + 2);
    // type test, then a re-raise when nothing matched
    assert_eq!(
        main.opcodes()[handler..handler + 6],
        [
            Opcode::LoadException,
            Opcode::LoadGlobal,
            Opcode::InstanceOf,
            Opcode::JumpIfTrue,
            Opcode::LoadException,
            Opcode::Raise,
        ]
    );
}

#[test]
fn return_inside_try_pops_the_handler_first() {
    let module = compile(vec![function(
        "main",
        vec![StmtLoc::try_except(
            vec![StmtLoc::ret(Some(ExprLoc::int(1)))],
            None,
            vec![],
            vec![],
        )],
    )]);
    let ops = module.method("main").unwrap().opcodes();
    assert_eq!(
        ops[1..4],
        [Opcode::LoadConst, Opcode::PopExceptionHandler, Opcode::Return]
    );
}

#[test]
fn constructor_without_super_call_invokes_every_base() {
    let module = compile(vec![
        class("A", &[], None, vec![]),
        class("B", &[], None, vec![]),
        class("C", &["A", "B"], Some(FunctionDecl::new("C", &[], vec![])), vec![]),
    ]);
    let Some(Value::Class(c)) = module.attribute("C") else {
        panic!("C not bound");
    };
    assert_eq!(
        c.constructor().opcodes(),
        vec![
            Opcode::LoadGlobal,
            Opcode::InvokeSuper,
            Opcode::LoadGlobal,
            Opcode::InvokeSuper,
            Opcode::LoadNull,
        ]
    );
}

#[test]
fn explicit_super_call_replaces_the_automatic_one() {
    let ctor = FunctionDecl::new(
        "B",
        &["x"],
        vec![StmtLoc::expr(ExprLoc::super_call(vec![ExprLoc::name("x")]))],
    );
    let module = compile(vec![class("A", &[], None, vec![]), class("B", &["A"], Some(ctor), vec![])]);
    let Some(Value::Class(b)) = module.attribute("B") else {
        panic!("B not bound");
    };
    let ops = b.constructor().opcodes();
    assert_eq!(ops.iter().filter(|op| **op == Opcode::InvokeSuper).count(), 1);
    let body = b.constructor().body();
    let invoke = body.iter().find(|i| i.op == Opcode::InvokeSuper).unwrap();
    assert_eq!(invoke.arg, 1);
}

#[test]
fn static_members_are_class_attributes() {
    let module = compile(vec![class(
        "Util",
        &[],
        None,
        vec![
            StmtLoc::function(FunctionDecl::new("make", &[], vec![]).into_static()),
            StmtLoc::function(FunctionDecl::new("run", &[], vec![])),
        ],
    )]);
    let Some(Value::Class(util)) = module.attribute("Util") else {
        panic!("Util not bound");
    };
    assert_eq!(util.instance_method_names(), vec!["run".to_owned()]);
    assert!(util.find_attribute("make").is_some());
}

#[test]
fn declarations_become_module_attributes() {
    let module = compile(vec![
        function("main", vec![]),
        StmtLoc::new(Stmt::Interface(InterfaceDecl {
            loc: CodeLoc::default(),
            name: "Shape".to_owned(),
            methods: vec![InterfaceMethod {
                name: "area".to_owned(),
                arity: 0,
            }],
        })),
        StmtLoc::new(Stmt::Enum(EnumDecl {
            loc: CodeLoc::default(),
            name: "Color".to_owned(),
            members: vec![EnumMember {
                loc: CodeLoc::default(),
                name: "Red".to_owned(),
                value: Some(ExprLoc::unary(iodine::UnaryOp::Negate, ExprLoc::int(7))),
            }],
        })),
    ]);
    assert_eq!(
        module.attribute_names(),
        vec!["main".to_owned(), "Shape".to_owned(), "Color".to_owned()]
    );
    let Some(Value::Enum(color)) = module.attribute("Color") else {
        panic!("Color not bound");
    };
    assert_eq!(color.member("Red"), Some(-7));
}

#[test]
fn instructions_carry_source_locations() {
    let stmt = StmtLoc::expr(ExprLoc::name("f").call(vec![]).at(CodeLoc::new(3, 5))).at(CodeLoc::new(3, 1));
    let module = compile(vec![function("main", vec![stmt])]);
    let main = module.method("main").unwrap();
    let invoke = main.body().iter().find(|i| i.op == Opcode::Invoke).unwrap();
    assert_eq!(invoke.loc, CodeLoc::new(3, 5));
}

// === Diagnostics ===

#[test]
fn control_flow_at_root_is_rejected() {
    let errors = compile_err(vec![StmtLoc::while_loop(ExprLoc::bool(true), vec![])]);
    assert_eq!(errors, vec![CompileErrorKind::StatementNotAllowedOutsideFunction("while")]);
}

#[test]
fn declarations_inside_functions_are_rejected() {
    let errors = compile_err(vec![function("main", vec![class("Inner", &[], None, vec![])])]);
    assert_eq!(errors, vec![CompileErrorKind::DeclarationNotAllowedInFunction("class")]);
}

#[test]
fn duplicate_top_level_names_are_rejected() {
    let errors = compile_err(vec![function("f", vec![]), function("f", vec![])]);
    assert_eq!(errors, vec![CompileErrorKind::DuplicateDefinition("f".to_owned())]);
}

#[test]
fn duplicate_parameters_are_rejected() {
    let errors = compile_err(vec![StmtLoc::function(FunctionDecl::new("f", &["a", "a"], vec![]))]);
    assert_eq!(errors, vec![CompileErrorKind::DuplicateDefinition("a".to_owned())]);
}

#[test]
fn assignment_to_a_call_is_rejected() {
    let errors = compile_err(vec![function(
        "main",
        vec![StmtLoc::expr(ExprLoc::name("f").call(vec![]).assign(ExprLoc::int(1)))],
    )]);
    assert_eq!(errors, vec![CompileErrorKind::InvalidAssignmentTarget]);
}

#[test]
fn super_outside_constructor_is_rejected() {
    let errors = compile_err(vec![function("main", vec![StmtLoc::expr(ExprLoc::super_call(vec![]))])]);
    assert_eq!(errors, vec![CompileErrorKind::SuperCallOutsideConstructor]);
}

#[test]
fn non_literal_enum_values_are_rejected() {
    let errors = compile_err(vec![StmtLoc::new(Stmt::Enum(EnumDecl {
        loc: CodeLoc::default(),
        name: "E".to_owned(),
        members: vec![EnumMember {
            loc: CodeLoc::default(),
            name: "A".to_owned(),
            value: Some(ExprLoc::str("a")),
        }],
    }))]);
    assert_eq!(errors, vec![CompileErrorKind::MalformedEnumValue("A".to_owned())]);
}

#[test]
fn continue_outside_loop_is_rejected_with_its_location() {
    let result = compile_module(
        "test",
        "test.id",
        &CompilationUnit::new(vec![function(
            "main",
            vec![StmtLoc::new(Stmt::Continue).at(CodeLoc::new(2, 4))],
        )]),
    );
    let errors = result.unwrap_err();
    let error = errors.iter().next().unwrap();
    assert_eq!(error.kind, CompileErrorKind::ContinueOutsideLoop);
    assert_eq!(error.loc, CodeLoc::new(2, 4));
}
