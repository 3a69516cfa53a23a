//! `use` statements: module loading, caching and name binding.

use std::{path::Path, rc::Rc};

use super::{Frame, Vm};
use crate::{
    exception_private::{ExcType, RunError, RunResult},
    types::{ArgValues, Module},
    value::Value,
};

impl Vm {
    /// Returns the cached module or asks the loader for it.
    ///
    /// A freshly loaded module is cached before its top-level code runs, so an
    /// import cycle sees the partially initialized module instead of looping.
    fn load_module(&mut self, name: &str) -> RunResult<Rc<Module>> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        let module = self
            .loader
            .load_module(name)
            .ok_or_else(|| RunError::new(ExcType::ImportError, format!("could not find module '{name}'")))?;
        self.modules.insert(name.to_owned(), module.clone());
        self.tracer.on_import(name);
        let initializer = module.initializer().clone();
        self.invoke_method(&initializer, None, ArgValues::new(), None, None)?;
        Ok(module)
    }

    /// `Import`: binds the module under the last component of its path.
    pub(super) fn import(&mut self, frame: &Frame, name: &str) -> RunResult<()> {
        let module = self.load_module(name)?;
        let binding = Path::new(name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(name);
        frame.module.set_attribute(binding, Value::Module(module));
        Ok(())
    }

    /// `ImportFrom`: copies the listed attributes into the importing module.
    pub(super) fn import_from(&mut self, frame: &Frame, name: &str, names: &Value) -> RunResult<()> {
        let module = self.load_module(name)?;
        let Value::Tuple(names) = names else {
            return Err(RunError::internal("ImportFrom expects a tuple of names"));
        };
        for item in names.iter() {
            let Value::Str(item) = item else {
                return Err(RunError::internal("ImportFrom names must be strings"));
            };
            let value = module.attribute(item).ok_or_else(|| {
                RunError::new(
                    ExcType::ImportError,
                    format!("cannot import name '{item}' from '{name}'"),
                )
            })?;
            frame.module.set_attribute(item, value);
        }
        Ok(())
    }

    /// `ImportAll`: copies every attribute of the module.
    pub(super) fn import_all(&mut self, frame: &Frame, name: &str) -> RunResult<()> {
        let module = self.load_module(name)?;
        for item in module.attribute_names() {
            if let Some(value) = module.attribute(&item) {
                frame.module.set_attribute(&item, value);
            }
        }
        Ok(())
    }
}
