//! Public interface for running compiled Iodine modules.

use std::rc::Rc;

use crate::{
    ast::CompilationUnit,
    bytecode::{Vm, compile_module},
    compile_error::ErrorLog,
    exception_private::ExcType,
    exception_public::UncaughtException,
    io::PrintWriter,
    loader::ModuleLoader,
    object::Object,
    resource::VmConfig,
    tracer::VmTracer,
    types::Module,
    value::Value,
};

/// Primary interface for executing Iodine code.
///
/// An engine owns one VM. Modules run through it share the ambient global
/// table and the module cache, so a host can run a module and then call into
/// it.
///
/// # Example
/// ```
/// use iodine::{
///     Engine, Object,
///     ast::{CompilationUnit, ExprLoc, StmtLoc},
/// };
///
/// let assign = ExprLoc::name("answer").assign(ExprLoc::int(42));
/// let unit = CompilationUnit::new(vec![StmtLoc::expr(assign)]);
/// let module = Engine::compile("main", "main.id", &unit).unwrap();
/// let mut engine = Engine::new();
/// engine.run_module(&module).unwrap();
/// assert_eq!(engine.global("answer"), Some(Object::Int(42)));
/// ```
#[derive(Debug, Default)]
pub struct Engine {
    vm: Vm,
    /// The module most recently run with `run_module` or `run_main`.
    main: Option<Rc<Module>>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: VmConfig) -> Self {
        Self {
            vm: Vm::new(config),
            main: None,
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.vm = self.vm.with_loader(loader);
        self
    }

    #[must_use]
    pub fn with_tracer(mut self, tracer: impl VmTracer + 'static) -> Self {
        self.vm = self.vm.with_tracer(tracer);
        self
    }

    #[must_use]
    pub fn with_print(mut self, print: impl PrintWriter + 'static) -> Self {
        self.vm = self.vm.with_print(print);
        self
    }

    /// Compiles a parsed file. See [`compile_module`].
    pub fn compile(name: &str, file: &str, unit: &CompilationUnit) -> Result<Rc<Module>, ErrorLog> {
        compile_module(name, file, unit)
    }

    /// Runs a module's top-level code.
    pub fn run_module(&mut self, module: &Rc<Module>) -> Result<Object, UncaughtException> {
        self.main = Some(module.clone());
        self.vm.run_module(module).map(|value| Object::from_value(&value))
    }

    /// Runs a module's top-level code, then its `main` function when it defines one.
    ///
    /// `main` receives `args` as a single list argument if it takes a parameter.
    pub fn run_main(&mut self, module: &Rc<Module>, args: Vec<Object>) -> Result<Object, UncaughtException> {
        let result = self.run_module(module)?;
        let Some(main) = module.attribute("main") else {
            return Ok(result);
        };
        let wants_args = match &main {
            Value::Method(method) => method.arity() > 0 || method.is_variadic(),
            _ => true,
        };
        let args = if wants_args {
            vec![Value::new_list(to_values(&args)?)]
        } else {
            Vec::new()
        };
        self.vm.call(&main, args).map(|value| Object::from_value(&value))
    }

    /// Calls a function defined by the last module run, or an ambient global.
    pub fn call(&mut self, name: &str, args: Vec<Object>) -> Result<Object, UncaughtException> {
        let callee = self.lookup(name).ok_or_else(|| {
            host_error(ExcType::NameError, format!("name '{name}' is not defined"))
        })?;
        let args = to_values(&args)?;
        self.vm.call(&callee, args).map(|value| Object::from_value(&value))
    }

    /// Reads a global: the last module's attribute first, then the ambient table.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Object> {
        self.lookup(name).map(|value| Object::from_value(&value))
    }

    /// The underlying VM, for hosts installing natives or globals.
    pub fn vm(&mut self) -> &mut Vm {
        &mut self.vm
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.main
            .as_ref()
            .and_then(|module| module.attribute(name))
            .or_else(|| self.vm.global(name))
    }
}

fn to_values(objects: &[Object]) -> Result<Vec<Value>, UncaughtException> {
    objects
        .iter()
        .map(|object| object.to_value().map_err(|e| host_error(ExcType::TypeError, e.to_string())))
        .collect()
}

/// An error detected on the host side before any code ran.
fn host_error(exc_type: ExcType, message: String) -> UncaughtException {
    UncaughtException {
        exc_type,
        type_name: exc_type.to_string(),
        message,
        trace: Vec::new(),
    }
}
