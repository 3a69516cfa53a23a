//! Tests for the host-facing API: running entry points, calling functions
//! with [`Object`] arguments, natives, printing and tracing.

use std::rc::Rc;

use iodine::{
    BinaryOp, CollectStringPrint, Engine, ExcType, Module, NoPrint, Object, Opcode, ProfilingTracer, RunResult,
    Value, Vm, builtin_names, compile_module,
    ast::{ClassDecl, CodeLoc, CompilationUnit, ExprLoc, FunctionDecl, Stmt, StmtLoc},
    types::{ArgValues, NativeFunction},
};
use pretty_assertions::assert_eq;

fn module(stmts: Vec<StmtLoc>) -> Rc<Module> {
    compile_module("main", "main.id", &CompilationUnit::new(stmts)).unwrap()
}

fn func(name: &str, params: &[&str], body: Vec<StmtLoc>) -> StmtLoc {
    StmtLoc::function(FunctionDecl::new(name, params, body))
}

fn ret(value: ExprLoc) -> StmtLoc {
    StmtLoc::ret(Some(value))
}

fn call(name: &str, args: Vec<ExprLoc>) -> ExprLoc {
    ExprLoc::name(name).call(args)
}

fn printed(body: Vec<StmtLoc>) -> String {
    let print = CollectStringPrint::new();
    let mut engine = Engine::new().with_print(print.clone());
    engine.run_main(&module(vec![func("main", &[], body)]), vec![]).unwrap();
    print.output()
}

// === Entry points ===

#[test]
fn run_main_passes_arguments_as_a_list() {
    let main = module(vec![func("main", &["args"], vec![ret(call("len", vec![ExprLoc::name("args")]))])]);
    let result = Engine::new()
        .run_main(&main, vec![Object::from("a"), Object::from("b")])
        .unwrap();
    assert_eq!(result, Object::Int(2));
}

#[test]
fn run_main_without_main_returns_module_result() {
    let main = module(vec![StmtLoc::expr(ExprLoc::name("x").assign(ExprLoc::int(1)))]);
    let mut engine = Engine::new();
    assert_eq!(engine.run_main(&main, vec![]).unwrap(), Object::Null);
    assert_eq!(engine.global("x"), Some(Object::Int(1)));
}

#[test]
fn call_converts_objects_both_ways() {
    let stmts = vec![func(
        "describe",
        &["items", "table"],
        vec![ret(ExprLoc::tuple(vec![
            call("len", vec![ExprLoc::name("items")]),
            ExprLoc::name("table").index(ExprLoc::str("k")),
        ]))],
    )];
    let mut engine = Engine::new();
    engine.run_module(&module(stmts)).unwrap();
    let result = engine
        .call(
            "describe",
            vec![
                Object::List(vec![Object::Int(1), Object::Null]),
                Object::Map(vec![(Object::from("k"), Object::Float(0.5))]),
            ],
        )
        .unwrap();
    assert_eq!(result, Object::Tuple(vec![Object::Int(2), Object::Float(0.5)]));
}

#[test]
fn calling_an_unknown_function_is_a_name_error() {
    let err = Engine::new().call("missing", vec![]).unwrap_err();
    assert_eq!(err.exc_type, ExcType::NameError);
    assert!(err.trace.is_empty());
}

#[test]
fn repr_objects_are_rejected_as_input() {
    let mut engine = Engine::new();
    let err = engine.call("print", vec![Object::Repr("<x>".to_owned())]).unwrap_err();
    assert_eq!(err.exc_type, ExcType::TypeError);
}

#[test]
fn results_without_data_form_come_back_as_repr() {
    let stmts = vec![
        StmtLoc::new(Stmt::Class(ClassDecl {
            loc: CodeLoc::default(),
            name: "Thing".to_owned(),
            bases: vec![],
            constructor: None,
            members: vec![],
        })),
        func("make", &[], vec![ret(call("Thing", vec![]))]),
    ];
    let mut engine = Engine::new();
    engine.run_module(&module(stmts)).unwrap();
    assert_eq!(engine.call("make", vec![]).unwrap(), Object::Repr("<Thing object>".to_owned()));
    assert_eq!(engine.global("Thing"), Some(Object::Repr("<class Thing>".to_owned())));
}

// === Natives installed by the host ===

fn native_greet(vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let who = vm.to_display(&args[0])?;
    Ok(Value::from(format!("hello, {who}")))
}

#[test]
fn host_natives_are_callable_from_bytecode() {
    let mut engine = Engine::new();
    engine
        .vm()
        .set_global("greet", NativeFunction::new("greet", Some(1), native_greet).into_value());
    let main = module(vec![func("main", &[], vec![ret(call("greet", vec![ExprLoc::str("iodine")]))])]);
    assert_eq!(engine.run_main(&main, vec![]).unwrap(), Object::from("hello, iodine"));

    let err = engine.call("greet", vec![]).unwrap_err();
    assert_eq!(err.exc_type, ExcType::ArgumentError);
    assert_eq!(err.message, "greet() takes 1 argument(s) but 0 were given");
}

fn native_apply(vm: &mut Vm, _this: Option<Value>, args: ArgValues) -> RunResult<Value> {
    let mut args = args.into_iter();
    let callee = args.next().unwrap_or(Value::Null);
    vm.call_value(&callee, args.collect())
}

#[test]
fn natives_can_call_back_into_closures() {
    let mut engine = Engine::new();
    engine
        .vm()
        .set_global("apply", NativeFunction::new("apply", None, native_apply).into_value());
    let body = vec![
        StmtLoc::expr(ExprLoc::name("base").assign(ExprLoc::int(10))),
        ret(call(
            "apply",
            vec![
                ExprLoc::lambda(&["x"], vec![ret(ExprLoc::name("x").binary(BinaryOp::Add, ExprLoc::name("base")))]),
                ExprLoc::int(5),
            ],
        )),
    ];
    let main = module(vec![func("main", &[], body)]);
    assert_eq!(engine.run_main(&main, vec![]).unwrap(), Object::Int(15));
}

// === Built-in functions ===

#[test]
fn print_separates_arguments_with_spaces() {
    let args = vec![
        ExprLoc::int(1),
        ExprLoc::str("a"),
        ExprLoc::list(vec![ExprLoc::int(1), ExprLoc::str("b")]),
        ExprLoc::null(),
        ExprLoc::float(2.5),
    ];
    let output = printed(vec![StmtLoc::expr(call("print", args))]);
    assert_eq!(output, "1 a [1, \"b\"] null 2.5\n");
}

#[test]
fn print_without_arguments_prints_a_newline() {
    assert_eq!(printed(vec![StmtLoc::expr(call("print", vec![]))]), "\n");
}

#[test]
fn builtin_conversions() {
    let body = vec![ret(ExprLoc::tuple(vec![
        call("repr", vec![ExprLoc::str("q")]),
        call("str", vec![ExprLoc::int(12)]),
        call("Int", vec![ExprLoc::str(" 42 ")]),
        call("Float", vec![ExprLoc::int(3)]),
        call("List", vec![call("range", vec![ExprLoc::int(0), ExprLoc::int(10), ExprLoc::int(4)])]),
        call("len", vec![ExprLoc::str("héllo")]),
    ]))];
    let result = Engine::new().run_main(&module(vec![func("main", &[], body)]), vec![]).unwrap();
    assert_eq!(
        result,
        Object::Tuple(vec![
            Object::from("\"q\""),
            Object::from("12"),
            Object::Int(42),
            Object::Float(3.0),
            Object::List(vec![Object::Int(0), Object::Int(4), Object::Int(8)]),
            Object::Int(5),
        ])
    );
}

#[test]
fn typeof_distinguishes_instances_and_builtins() {
    let stmts = vec![
        StmtLoc::new(Stmt::Class(ClassDecl {
            loc: CodeLoc::default(),
            name: "Box".to_owned(),
            bases: vec![],
            constructor: None,
            members: vec![],
        })),
        func(
            "main",
            &[],
            vec![ret(ExprLoc::tuple(vec![
                call("typeof", vec![call("Box", vec![])]).binary(BinaryOp::Equals, ExprLoc::name("Box")),
                call("typeof", vec![ExprLoc::int(1)]).binary(BinaryOp::Equals, ExprLoc::name("Int")),
                call("typeof", vec![ExprLoc::str("s")]).binary(BinaryOp::Equals, ExprLoc::name("Int")),
            ]))],
        ),
    ];
    let result = Engine::new().run_main(&module(stmts), vec![]).unwrap();
    assert_eq!(
        result,
        Object::Tuple(vec![Object::Bool(true), Object::Bool(true), Object::Bool(false)])
    );
}

#[test]
fn hash_is_consistent_with_equality() {
    let body = vec![ret(ExprLoc::tuple(vec![
        call("hash", vec![ExprLoc::str("key")]).binary(BinaryOp::Equals, call("hash", vec![ExprLoc::str("key")])),
        call("hash", vec![ExprLoc::int(1)]).binary(BinaryOp::Equals, call("hash", vec![ExprLoc::float(1.0)])),
    ]))];
    let result = Engine::new().run_main(&module(vec![func("main", &[], body)]), vec![]).unwrap();
    assert_eq!(result, Object::Tuple(vec![Object::Bool(true), Object::Bool(true)]));

    let unhashable = vec![ret(call("hash", vec![ExprLoc::list(vec![])]))];
    let err = Engine::new()
        .run_main(&module(vec![func("main", &[], unhashable)]), vec![])
        .unwrap_err();
    assert_eq!(err.exc_type, ExcType::TypeError);
}

#[test]
fn builtin_names_cover_natives_types_and_exceptions() {
    let names = builtin_names();
    for expected in ["print", "len", "range", "Int", "HashMap", "Exception", "KeyNotFound"] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    let vm = Vm::default();
    for name in &names {
        assert!(vm.global(name).is_some(), "{name} not installed");
    }
}

// === Output and tracing ===

#[test]
fn no_print_discards_output() {
    let main = module(vec![func("main", &[], vec![StmtLoc::expr(call("print", vec![ExprLoc::int(1)]))])]);
    let mut engine = Engine::new().with_print(NoPrint);
    assert_eq!(engine.run_main(&main, vec![]).unwrap(), Object::Null);
}

#[test]
fn profiling_tracer_counts_calls_and_depth() {
    let fact = func(
        "fact",
        &["n"],
        vec![
            StmtLoc::if_else(
                ExprLoc::name("n").binary(BinaryOp::LessThanOrEqu, ExprLoc::int(1)),
                vec![ret(ExprLoc::int(1))],
                None,
            ),
            ret(ExprLoc::name("n").binary(
                BinaryOp::Mul,
                call("fact", vec![ExprLoc::name("n").binary(BinaryOp::Sub, ExprLoc::int(1))]),
            )),
        ],
    );
    let main = module(vec![fact, func("main", &[], vec![ret(call("fact", vec![ExprLoc::int(5)]))])]);
    let tracer = ProfilingTracer::new();
    let mut engine = Engine::new().with_tracer(tracer.clone());
    assert_eq!(engine.run_main(&main, vec![]).unwrap(), Object::Int(120));

    let report = tracer.report();
    // module initializer, main, and five calls to fact
    assert_eq!(report.total_calls, 7);
    assert_eq!(report.max_depth, 6);
    assert_eq!(report.total_raises, 0);
    let invokes = report
        .opcode_counts
        .iter()
        .find(|(op, _)| *op == Opcode::Invoke)
        .map(|(_, count)| *count);
    assert_eq!(invokes, Some(5));
    assert!(report.to_string().starts_with("=== VM Profiling Report ==="));
}

#[test]
fn results_serialize_to_natural_json() {
    let body = vec![ret(ExprLoc::hash(vec![
        (ExprLoc::str("items"), ExprLoc::list(vec![ExprLoc::int(1), ExprLoc::bool(true)])),
        (ExprLoc::str("pair"), ExprLoc::tuple(vec![ExprLoc::null()])),
    ]))];
    let result = Engine::new().run_main(&module(vec![func("main", &[], body)]), vec![]).unwrap();
    assert_eq!(
        result.to_json_value(),
        serde_json::json!({"items": [1, true], "pair": {"$tuple": [null]}})
    );
}
