//! End-to-end tests: hand-built trees compiled and run through an [`Engine`].

use std::rc::Rc;

use iodine::{
    BinaryOp, CollectStringPrint, Engine, ExcType, Module, Object, Opcode, RecordingTracer, TraceEvent, UnaryOp,
    compile_module,
    ast::{
        ClassDecl, CodeLoc, CompilationUnit, EnumDecl, EnumMember, ExprLoc, FunctionDecl, InterfaceDecl,
        InterfaceMethod, Stmt, StmtLoc, WhenCase,
    },
};
use pretty_assertions::assert_eq;

fn module(stmts: Vec<StmtLoc>) -> Rc<Module> {
    compile_module("main", "main.id", &CompilationUnit::new(stmts)).unwrap()
}

/// Runs `main` defined with `body` alongside the other top-level declarations.
fn run_with(decls: Vec<StmtLoc>, body: Vec<StmtLoc>) -> Object {
    let mut stmts = decls;
    stmts.push(func("main", &[], body));
    Engine::new().run_main(&module(stmts), vec![]).unwrap()
}

fn run(body: Vec<StmtLoc>) -> Object {
    run_with(vec![], body)
}

fn func(name: &str, params: &[&str], body: Vec<StmtLoc>) -> StmtLoc {
    StmtLoc::function(FunctionDecl::new(name, params, body))
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

fn name(n: &str) -> ExprLoc {
    ExprLoc::name(n)
}

fn int(i: i64) -> ExprLoc {
    ExprLoc::int(i)
}

fn set(target: &str, value: ExprLoc) -> StmtLoc {
    StmtLoc::expr(name(target).assign(value))
}

fn add_to(target: &str, value: ExprLoc) -> StmtLoc {
    StmtLoc::expr(name(target).assign_op(BinaryOp::Add, value))
}

fn ret(value: ExprLoc) -> StmtLoc {
    StmtLoc::ret(Some(value))
}

fn self_attr(attr: &str) -> ExprLoc {
    ExprLoc::self_ref().attr(attr)
}

fn set_self(attr: &str, value: ExprLoc) -> StmtLoc {
    StmtLoc::expr(self_attr(attr).assign(value))
}

fn ints(values: &[i64]) -> Vec<Object> {
    values.iter().copied().map(Object::Int).collect()
}

// === Operators ===

#[test]
fn arithmetic_follows_tree_shape() {
    // 1 + 2 * 3 - 10 / 4 % 3
    let product = int(2).binary(BinaryOp::Mul, int(3));
    let remainder = int(10).binary(BinaryOp::Div, int(4)).binary(BinaryOp::Mod, int(3));
    let expr = int(1).binary(BinaryOp::Add, product).binary(BinaryOp::Sub, remainder);
    assert_eq!(run(vec![ret(expr)]), Object::Int(5));
}

#[test]
fn mixed_numbers_promote_to_float() {
    let expr = int(1).binary(BinaryOp::Add, ExprLoc::float(0.5));
    assert_eq!(run(vec![ret(expr)]), Object::Float(1.5));
}

#[test]
fn strings_concatenate_and_repeat() {
    let expr = ExprLoc::str("ab")
        .binary(BinaryOp::Add, ExprLoc::str("c"))
        .binary(BinaryOp::Mul, int(2));
    assert_eq!(run(vec![ret(expr)]), Object::from("abcabc"));
}

#[test]
fn comparisons_and_boolean_operators() {
    let expr = ExprLoc::tuple(vec![
        int(1).binary(BinaryOp::LessThan, int(2)),
        ExprLoc::str("a").binary(BinaryOp::Equals, ExprLoc::str("a")),
        ExprLoc::null().binary(BinaryOp::BoolOr, int(7)),
        int(0).binary(BinaryOp::BoolAnd, name("undefined")),
        ExprLoc::unary(iodine::UnaryOp::BoolNot, ExprLoc::bool(false)),
    ]);
    assert_eq!(
        run(vec![ret(expr)]),
        Object::Tuple(vec![
            Object::Bool(true),
            Object::Bool(true),
            Object::Int(7),
            Object::Int(0),
            Object::Bool(true),
        ])
    );
}

#[test]
fn ternary_coalesce_and_casts() {
    let expr = ExprLoc::tuple(vec![
        ExprLoc::null().or_else(int(5)),
        ExprLoc::ternary(ExprLoc::bool(true), int(1), int(2)),
        int(3).is(name("Int")),
        ExprLoc::str("x").cast(name("Int")),
    ]);
    assert_eq!(
        run(vec![ret(expr)]),
        Object::Tuple(vec![Object::Int(5), Object::Int(1), Object::Bool(true), Object::Null])
    );
}

// === Control flow ===

#[test]
fn while_loop_accumulates() {
    let body = vec![
        set("i", int(0)),
        set("total", int(0)),
        StmtLoc::while_loop(
            name("i").binary(BinaryOp::LessThan, int(10)),
            vec![add_to("i", int(1)), add_to("total", name("i"))],
        ),
        ret(name("total")),
    ];
    assert_eq!(run(body), Object::Int(55));
}

#[test]
fn for_loop_honours_break_and_continue() {
    let is_even = name("i").binary(BinaryOp::Mod, int(2)).binary(BinaryOp::Equals, int(0));
    let body = vec![
        set("total", int(0)),
        StmtLoc::for_loop(
            Some(set("i", int(0))),
            Some(name("i").binary(BinaryOp::LessThan, int(100))),
            Some(name("i").assign_op(BinaryOp::Add, int(1))),
            vec![
                StmtLoc::if_else(is_even, vec![StmtLoc::new(Stmt::Continue)], None),
                StmtLoc::if_else(
                    name("i").binary(BinaryOp::GreaterThan, int(9)),
                    vec![StmtLoc::new(Stmt::Break)],
                    None,
                ),
                add_to("total", name("i")),
            ],
        ),
        ret(name("total")),
    ];
    assert_eq!(run(body), Object::Int(25));
}

#[test]
fn do_while_runs_its_body_once() {
    let body = vec![
        set("n", int(0)),
        StmtLoc::do_while(vec![add_to("n", int(1))], ExprLoc::bool(false)),
        ret(name("n")),
    ];
    assert_eq!(run(body), Object::Int(1));
}

#[test]
fn foreach_over_builtin_iterables() {
    let body = vec![
        set("sum", int(0)),
        StmtLoc::foreach("x", ExprLoc::list(vec![int(1), int(2), int(3)]), vec![add_to("sum", name("x"))]),
        StmtLoc::foreach(
            "x",
            name("range").call(vec![int(1), int(4)]),
            vec![add_to("sum", name("x"))],
        ),
        set("text", ExprLoc::str("")),
        StmtLoc::foreach(
            "c",
            ExprLoc::str("abc"),
            vec![set("text", name("c").binary(BinaryOp::Add, name("text")))],
        ),
        StmtLoc::foreach(
            "k",
            ExprLoc::hash(vec![(ExprLoc::str("x"), int(1)), (ExprLoc::str("y"), int(2))]),
            vec![add_to("text", name("k"))],
        ),
        ret(ExprLoc::tuple(vec![name("sum"), name("text")])),
    ];
    assert_eq!(
        run(body),
        Object::Tuple(vec![Object::Int(12), Object::from("cbaxy")])
    );
}

#[test]
fn foreach_sees_items_appended_to_a_list() {
    let body = vec![
        set("items", ExprLoc::list(vec![int(1)])),
        StmtLoc::foreach(
            "x",
            name("items"),
            vec![StmtLoc::if_else(
                name("x").binary(BinaryOp::LessThan, int(3)),
                vec![StmtLoc::expr(
                    name("items")
                        .attr("append")
                        .call(vec![name("x").binary(BinaryOp::Add, int(1))]),
                )],
                None,
            )],
        ),
        ret(name("items")),
    ];
    assert_eq!(run(body), Object::List(ints(&[1, 2, 3])));
}

#[test]
fn given_selects_a_case_or_the_default() {
    let ret_str = |s: &str| StmtLoc::block(vec![ret(ExprLoc::str(s))]);
    let classify = func(
        "classify",
        &["n"],
        vec![StmtLoc::new(Stmt::Given {
            value: name("n"),
            cases: vec![
                WhenCase {
                    values: vec![int(1), int(2)],
                    body: ret_str("small"),
                },
                WhenCase {
                    values: vec![int(3)],
                    body: ret_str("three"),
                },
            ],
            default: Some(Box::new(ret_str("other"))),
        })],
    );
    let body = vec![ret(ExprLoc::tuple(vec![
        name("classify").call(vec![int(2)]),
        name("classify").call(vec![int(3)]),
        name("classify").call(vec![int(9)]),
    ]))];
    assert_eq!(
        run_with(vec![classify], body),
        Object::Tuple(vec![Object::from("small"), Object::from("three"), Object::from("other")])
    );
}

// === Functions and closures ===

#[test]
fn closures_share_variables_by_reference() {
    let increment = name("counter").assign(name("counter").binary(BinaryOp::Add, int(1)));
    let body = vec![
        set("counter", int(0)),
        set("inc", ExprLoc::lambda(&[], vec![StmtLoc::expr(increment)])),
        StmtLoc::expr(name("inc").call(vec![])),
        StmtLoc::expr(name("inc").call(vec![])),
        set("first", name("counter")),
        set("counter", int(10)),
        StmtLoc::expr(name("inc").call(vec![])),
        ret(ExprLoc::tuple(vec![name("first"), name("counter")])),
    ];
    assert_eq!(run(body), Object::Tuple(ints(&[2, 11])));
}

#[test]
fn closures_outlive_their_defining_call() {
    let make_counter = func(
        "makeCounter",
        &[],
        vec![
            set("n", int(0)),
            ret(ExprLoc::lambda(&[], vec![add_to("n", int(1)), ret(name("n"))])),
        ],
    );
    let body = vec![
        set("c", name("makeCounter").call(vec![])),
        StmtLoc::expr(name("c").call(vec![])),
        ret(name("c").call(vec![])),
    ];
    assert_eq!(run_with(vec![make_counter], body), Object::Int(2));
}

#[test]
fn variadic_and_keyword_parameters() {
    let f = StmtLoc::function(
        FunctionDecl::new(
            "f",
            &["a"],
            vec![ret(ExprLoc::tuple(vec![name("a"), name("rest"), name("opts")]))],
        )
        .with_varargs("rest")
        .with_kwargs("opts"),
    );
    let body = vec![ret(name("f").call_kw(vec![int(1), int(2), int(3)], vec![("k", int(4))]))];
    assert_eq!(
        run_with(vec![f], body),
        Object::Tuple(vec![
            Object::Int(1),
            Object::Tuple(ints(&[2, 3])),
            Object::Map(vec![(Object::from("k"), Object::Int(4))]),
        ])
    );
}

#[test]
fn recursion_computes_factorial() {
    let fact = func(
        "fact",
        &["n"],
        vec![
            StmtLoc::if_else(
                name("n").binary(BinaryOp::LessThanOrEqu, int(1)),
                vec![ret(int(1))],
                None,
            ),
            ret(name("n").binary(
                BinaryOp::Mul,
                name("fact").call(vec![name("n").binary(BinaryOp::Sub, int(1))]),
            )),
        ],
    );
    assert_eq!(
        run_with(vec![fact], vec![ret(name("fact").call(vec![int(10)]))]),
        Object::Int(3_628_800)
    );
}

// === Classes ===

fn point_class() -> StmtLoc {
    class(
        "Point",
        &[],
        Some(FunctionDecl::new(
            "Point",
            &["x", "y"],
            vec![set_self("x", name("x")), set_self("y", name("y"))],
        )),
        vec![func("sum", &[], vec![ret(self_attr("x").binary(BinaryOp::Add, self_attr("y")))])],
    )
}

#[test]
fn constructor_and_instance_methods() {
    let body = vec![
        set("p", name("Point").call(vec![int(2), int(3)])),
        ret(name("p").attr("sum").call(vec![])),
    ];
    assert_eq!(run_with(vec![point_class()], body), Object::Int(5));
}

#[test]
fn explicit_super_runs_the_base_constructor() {
    let animal = class(
        "Animal",
        &[],
        Some(FunctionDecl::new("Animal", &["name"], vec![set_self("name", name("name"))])),
        vec![func(
            "describe",
            &[],
            vec![ret(self_attr("name")
                .binary(BinaryOp::Add, ExprLoc::str(" says "))
                .binary(BinaryOp::Add, ExprLoc::self_ref().attr("sound").call(vec![])))],
        )],
    );
    let dog = class(
        "Dog",
        &["Animal"],
        Some(FunctionDecl::new(
            "Dog",
            &["name"],
            vec![StmtLoc::expr(ExprLoc::super_call(vec![name("name")]))],
        )),
        vec![func("sound", &[], vec![ret(ExprLoc::str("woof"))])],
    );
    let body = vec![
        set("d", name("Dog").call(vec![ExprLoc::str("rex")])),
        ret(ExprLoc::tuple(vec![
            name("d").attr("describe").call(vec![]),
            name("d").is(name("Animal")),
            name("d").is(name("Dog")),
        ])),
    ];
    assert_eq!(
        run_with(vec![animal, dog], body),
        Object::Tuple(vec![Object::from("rex says woof"), Object::Bool(true), Object::Bool(true)])
    );
}

#[test]
fn implicit_super_runs_when_constructor_is_missing() {
    let base = class(
        "Base",
        &[],
        Some(FunctionDecl::new("Base", &[], vec![set_self("ready", ExprLoc::bool(true))])),
        vec![],
    );
    let child = class("Child", &["Base"], None, vec![]);
    let body = vec![ret(name("Child").call(vec![]).attr("ready"))];
    assert_eq!(run_with(vec![base, child], body), Object::Bool(true));
}

#[test]
fn field_initializers_and_static_methods_live_on_the_class() {
    let config = class(
        "Config",
        &[],
        None,
        vec![
            set("level", int(3)),
            StmtLoc::function(
                FunctionDecl::new("twice", &["x"], vec![ret(name("x").binary(BinaryOp::Mul, int(2)))]).into_static(),
            ),
        ],
    );
    let body = vec![ret(ExprLoc::tuple(vec![
        name("Config").call(vec![]).attr("level"),
        name("Config").attr("level"),
        name("Config").attr("twice").call(vec![int(4)]),
    ]))];
    assert_eq!(run_with(vec![config], body), Object::Tuple(ints(&[3, 3, 8])));
}

#[test]
fn class_members_fall_through_to_declared_bases_before_construction() {
    let base = class(
        "Base",
        &[],
        None,
        vec![
            set("level", int(3)),
            StmtLoc::function(
                FunctionDecl::new("twice", &["x"], vec![ret(name("x").binary(BinaryOp::Mul, int(2)))]).into_static(),
            ),
        ],
    );
    let derived = class("Derived", &["Base"], None, vec![]);
    let body = vec![ret(ExprLoc::tuple(vec![
        name("Derived").attr("level"),
        name("Derived").attr("twice").call(vec![int(5)]),
    ]))];
    assert_eq!(run_with(vec![base, derived], body), Object::Tuple(ints(&[3, 10])));
}

#[test]
fn operator_overloads_and_to_string() {
    let vector = class(
        "Vec1",
        &[],
        Some(FunctionDecl::new("Vec1", &["n"], vec![set_self("n", name("n"))])),
        vec![
            func(
                "__add__",
                &["other"],
                vec![ret(name("Vec1").call(vec![self_attr("n").binary(BinaryOp::Add, name("other").attr("n"))]))],
            ),
            func(
                "toString",
                &[],
                vec![ret(ExprLoc::str("Vec1(").binary(BinaryOp::Add, name("Str").call(vec![self_attr("n")])))],
            ),
        ],
    );
    let body = vec![
        set("v", name("Vec1").call(vec![int(1)]).binary(BinaryOp::Add, name("Vec1").call(vec![int(2)]))),
        StmtLoc::expr(name("print").call(vec![name("v")])),
        ret(name("v").attr("n")),
    ];
    let print = CollectStringPrint::new();
    let mut stmts = vec![vector];
    stmts.push(func("main", &[], body));
    let mut engine = Engine::new().with_print(print.clone());
    let result = engine.run_main(&module(stmts), vec![]).unwrap();
    assert_eq!(result, Object::Int(3));
    assert_eq!(print.output(), "Vec1(3\n");
}

#[test]
fn instances_drive_foreach_through_iteration_hooks() {
    let countdown = class(
        "Countdown",
        &[],
        Some(FunctionDecl::new("Countdown", &["n"], vec![set_self("n", name("n"))])),
        vec![
            func(
                "__iterMoveNext__",
                &[],
                vec![
                    StmtLoc::expr(self_attr("n").assign_op(BinaryOp::Sub, int(1))),
                    ret(self_attr("n").binary(BinaryOp::GreaterThanOrEqu, int(0))),
                ],
            ),
            func("__iterGetNext__", &[], vec![ret(self_attr("n"))]),
        ],
    );
    let body = vec![
        set("out", ExprLoc::list(vec![])),
        StmtLoc::foreach(
            "x",
            name("Countdown").call(vec![int(3)]),
            vec![StmtLoc::expr(name("out").attr("append").call(vec![name("x")]))],
        ),
        ret(name("out")),
    ];
    assert_eq!(run_with(vec![countdown], body), Object::List(ints(&[2, 1, 0])));
}

#[test]
fn enums_and_interfaces() {
    let member = |n: &str, value: Option<ExprLoc>| EnumMember {
        loc: CodeLoc::default(),
        name: n.to_owned(),
        value,
    };
    let color = StmtLoc::new(Stmt::Enum(EnumDecl {
        loc: CodeLoc::default(),
        name: "Color".to_owned(),
        members: vec![member("Red", None), member("Green", Some(int(5))), member("Blue", None)],
    }));
    let shape = StmtLoc::new(Stmt::Interface(InterfaceDecl {
        loc: CodeLoc::default(),
        name: "Shape".to_owned(),
        methods: vec![InterfaceMethod {
            name: "area".to_owned(),
            arity: 0,
        }],
    }));
    let square = class("Square", &[], None, vec![func("area", &[], vec![ret(int(4))])]);
    let body = vec![ret(ExprLoc::tuple(vec![
        name("Color").attr("Red"),
        name("Color").attr("Green"),
        name("Color").attr("Blue"),
        name("Square").call(vec![]).is(name("Shape")),
        int(1).is(name("Shape")),
    ]))];
    assert_eq!(
        run_with(vec![color, shape, square], body),
        Object::Tuple(vec![
            Object::Int(-1),
            Object::Int(5),
            Object::Int(-2),
            Object::Bool(true),
            Object::Bool(false),
        ])
    );
}

// === Containers ===

#[test]
fn lists_and_maps_support_indexing_and_methods() {
    let body = vec![
        set("l", ExprLoc::list(vec![int(1)])),
        StmtLoc::expr(name("l").attr("append").call(vec![int(2)])),
        StmtLoc::expr(name("l").index(int(0)).assign(int(9))),
        set("m", ExprLoc::hash(vec![(ExprLoc::str("a"), int(1))])),
        StmtLoc::expr(name("m").index(ExprLoc::str("b")).assign(int(2))),
        ret(ExprLoc::tuple(vec![
            name("len").call(vec![name("l")]),
            name("l"),
            name("m").index(ExprLoc::str("a")).binary(BinaryOp::Add, name("m").index(ExprLoc::str("b"))),
            name("m").attr("getSize").call(vec![]),
            name("l").index(ExprLoc::unary(iodine::UnaryOp::Negate, int(1))),
        ])),
    ];
    assert_eq!(
        run(body),
        Object::Tuple(vec![
            Object::Int(2),
            Object::List(ints(&[9, 2])),
            Object::Int(3),
            Object::Int(2),
            Object::Int(2),
        ])
    );
}

#[test]
fn int_and_float_agree_only_when_exactly_equal() {
    // 2^53 + 1 has no exact float; 2^53 does
    let odd = 9_007_199_254_740_993;
    let even = 9_007_199_254_740_992;
    let float = || ExprLoc::float(9_007_199_254_740_992.0);
    let body = vec![
        set("m", ExprLoc::hash(vec![(float(), ExprLoc::str("float"))])),
        ret(ExprLoc::list(vec![
            int(odd).binary(BinaryOp::Equals, float()),
            int(even).binary(BinaryOp::Equals, float()),
            name("hash")
                .call(vec![int(even)])
                .binary(BinaryOp::Equals, name("hash").call(vec![float()])),
            name("m").index(int(even)),
        ])),
    ];
    assert_eq!(
        run(body),
        Object::List(vec![
            Object::Bool(false),
            Object::Bool(true),
            Object::Bool(true),
            Object::from("float"),
        ])
    );
}

#[test]
fn string_methods_are_bound_to_their_receiver() {
    let body = vec![ret(ExprLoc::tuple(vec![
        ExprLoc::str("abc").attr("toUpper").call(vec![]),
        ExprLoc::str("a,b").attr("split").call(vec![ExprLoc::str(",")]),
        ExprLoc::str("hello").index(int(1)),
    ]))];
    assert_eq!(
        run(body),
        Object::Tuple(vec![
            Object::from("ABC"),
            Object::List(vec![Object::from("a"), Object::from("b")]),
            Object::from("e"),
        ])
    );
}

// === Globals ===

#[test]
fn store_global_targets_ambient_table_unless_module_defines_the_name() {
    let stmts = vec![
        set("counter", int(0)),
        func("helper", &[], vec![]),
        func(
            "main",
            &[],
            vec![add_to("counter", int(1)), set("helper", int(5))],
        ),
    ];
    let module = module(stmts);
    let mut engine = Engine::new();
    engine.run_main(&module, vec![]).unwrap();
    assert_eq!(engine.vm().global("counter").map(|v| Object::from(&v)), Some(Object::Int(1)));
    assert!(engine.vm().global("helper").is_none());
    assert_eq!(module.attribute("helper").map(|v| Object::from(&v)), Some(Object::Int(5)));
    assert_eq!(engine.global("helper"), Some(Object::Int(5)));
}

#[test]
fn undefined_names_raise_name_error() {
    let result = Engine::new().run_main(&module(vec![func("main", &[], vec![ret(name("nope"))])]), vec![]);
    let err = result.unwrap_err();
    assert_eq!(err.exc_type, ExcType::NameError);
    assert_eq!(err.message, "name 'nope' is not defined");
}

// === Operand stack ===

#[test]
fn operators_and_iteration_replace_their_operands_with_one_result() {
    let body = vec![
        set("total", int(0)),
        StmtLoc::foreach(
            "x",
            ExprLoc::list(vec![int(1), int(2)]),
            vec![add_to("total", ExprLoc::unary(UnaryOp::Negate, name("x")))],
        ),
        ret(name("total").binary(BinaryOp::Mul, int(-1))),
    ];
    let tracer = RecordingTracer::new();
    let result = Engine::new()
        .with_tracer(tracer.clone())
        .run_main(&module(vec![func("main", &[], body)]), vec![])
        .unwrap();
    assert_eq!(result, Object::Int(3));

    let steps: Vec<(Opcode, usize)> = tracer
        .events()
        .into_iter()
        .filter_map(|event| match event {
            TraceEvent::Instruction {
                opcode, stack_depth, ..
            } => Some((opcode, stack_depth)),
            _ => None,
        })
        .collect();
    let mut checked = 0;
    for pair in steps.windows(2) {
        let ((opcode, before), (_, after)) = (pair[0], pair[1]);
        let consumed = match opcode {
            Opcode::BinOp => 2,
            Opcode::UnaryOp | Opcode::IterMoveNext => 1,
            _ => continue,
        };
        assert_eq!(after, before - consumed + 1, "{opcode} at depth {before}");
        checked += 1;
    }
    // three move-next steps, two negations, two additions, one product
    assert_eq!(checked, 8);
}
