//! Module resolution for `use` statements.
//!
//! The VM asks its [`ModuleLoader`] for a module by the name written in the
//! import (relative names already joined to the importing file's directory).
//! Loaded modules are cached by the VM, so a loader is consulted at most once
//! per name.

use std::{fmt, rc::Rc};

use ahash::AHashMap;

use crate::types::Module;

pub trait ModuleLoader: fmt::Debug {
    /// Returns the module registered under `name`, or `None` if it cannot be found.
    fn load_module(&mut self, name: &str) -> Option<Rc<Module>>;
}

/// Loader with no modules; every import fails with `ImportError`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load_module(&mut self, _name: &str) -> Option<Rc<Module>> {
        None
    }
}

/// In-memory registry of precompiled or native modules.
#[derive(Debug, Default)]
pub struct RegistryLoader {
    modules: AHashMap<String, Rc<Module>>,
}

impl RegistryLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under `name`, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, module: Rc<Module>) {
        self.modules.insert(name.into(), module);
    }

    #[must_use]
    pub fn with_module(mut self, name: impl Into<String>, module: Rc<Module>) -> Self {
        self.insert(name, module);
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }
}

impl ModuleLoader for RegistryLoader {
    fn load_module(&mut self, name: &str) -> Option<Rc<Module>> {
        self.modules.get(name).cloned()
    }
}
