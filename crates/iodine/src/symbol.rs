//! Lexical scopes and name resolution.
//!
//! Scopes form a tree. The analysis pass builds it with [`SymbolTable::begin_scope`]
//! and [`SymbolTable::end_scope`]; the compiler walks the same tree again with
//! [`SymbolTable::enter_scope`] and [`SymbolTable::exit_scope`], visiting scopes in
//! the order they were created. Because the tree is complete before code
//! generation starts, a name assigned later in a function already resolves to
//! its slot at the first use.
//!
//! A function-boundary scope owns local slot numbering: its parameters are added
//! first and get slots `0..n`, and every non-boundary (block) scope nested in it
//! continues the same counter. Symbols in the root scope are module globals.

use ahash::AHashMap;

/// How a resolved name is addressed at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A slot in the executing frame's locals.
    Local,
    /// A module attribute or ambient global, addressed by name.
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: String,
    pub index: usize,
    pub kind: SymbolKind,
}

type ScopeId = usize;

const ROOT: ScopeId = 0;

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
    symbols: AHashMap<String, Symbol>,
    function_boundary: bool,
    /// Slots handed out so far; only meaningful on function boundaries.
    local_count: usize,
    /// Replay cursor into `children`.
    next_child: usize,
}

impl Scope {
    fn new(parent: Option<ScopeId>, function_boundary: bool) -> Self {
        Self {
            parent,
            children: Vec::new(),
            symbols: AHashMap::new(),
            function_boundary,
            local_count: 0,
            next_child: 0,
        }
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, true)],
            current: ROOT,
        }
    }

    /// Opens a new scope nested in the current one.
    pub fn begin_scope(&mut self, is_function_boundary: bool) {
        let id = self.scopes.len();
        self.scopes.push(Scope::new(Some(self.current), is_function_boundary));
        self.scopes[self.current].children.push(id);
        self.current = id;
    }

    /// Closes the current scope, returning to its parent.
    pub fn end_scope(&mut self, is_function_boundary: bool) {
        let scope = &self.scopes[self.current];
        debug_assert_eq!(scope.function_boundary, is_function_boundary, "mismatched scope kinds");
        if let Some(parent) = scope.parent {
            self.current = parent;
        }
    }

    /// Declares `name` in the current scope.
    ///
    /// Redeclaring a name in the same scope returns the existing symbol so the
    /// slot stays the same.
    pub fn add_symbol(&mut self, name: &str) -> Symbol {
        if let Some(existing) = self.scopes[self.current].symbols.get(name) {
            return existing.clone();
        }
        let boundary = self.boundary_of(self.current);
        let index = self.scopes[boundary].local_count;
        self.scopes[boundary].local_count += 1;
        let kind = if boundary == ROOT {
            SymbolKind::Global
        } else {
            SymbolKind::Local
        };
        let symbol = Symbol {
            name: name.to_owned(),
            index,
            kind,
        };
        self.scopes[self.current].symbols.insert(name.to_owned(), symbol.clone());
        symbol
    }

    /// Resolves `name` through the current scope chain, innermost first.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if let Some(symbol) = self.scopes[id].symbols.get(name) {
                return Some(symbol.clone());
            }
            scope = self.scopes[id].parent;
        }
        None
    }

    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Slots allocated by the nearest enclosing function boundary.
    #[must_use]
    pub fn local_count(&self) -> usize {
        self.scopes[self.boundary_of(self.current)].local_count
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.current == ROOT
    }

    /// Rewinds to the root so the scope tree can be replayed.
    pub fn reset(&mut self) {
        self.current = ROOT;
        for scope in &mut self.scopes {
            scope.next_child = 0;
        }
    }

    /// Replays the next scope created under the current one during analysis.
    ///
    /// If analysis never created it, a fresh scope is opened instead so that
    /// code generation can continue best-effort.
    pub fn enter_scope(&mut self) {
        let scope = &mut self.scopes[self.current];
        if let Some(&child) = scope.children.get(scope.next_child) {
            scope.next_child += 1;
            self.current = child;
        } else {
            scope.next_child += 1;
            self.begin_scope(false);
        }
    }

    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.scopes[self.current].parent {
            self.current = parent;
        }
    }

    fn boundary_of(&self, mut id: ScopeId) -> ScopeId {
        loop {
            let scope = &self.scopes[id];
            match scope.parent {
                Some(parent) if !scope.function_boundary => id = parent,
                _ => return id,
            }
        }
    }
}
