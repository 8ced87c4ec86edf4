// src/sema/scope.rs
//
// Lexical scope tree. Each scope maps names to variables, types and error
// values, remembers its owning function and enclosing loop, and accumulates
// the per-function lists the backend consumes (declared variables, values
// needing stack storage, casts needing stack storage).

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{NodeId, Symbol};
use crate::sema::entities::{ErrorId, FnId, VarId};
use crate::sema::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Opaque handle the backend attaches to a scope's debug info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendScopeRef(pub u32);

/// Buffer a `c_import` block accumulates `@c_include`/`@c_define` lines into.
pub type CImportBuf = Rc<RefCell<String>>;

#[derive(Debug, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// The node that introduced this scope (fn def, block, loop, ...).
    pub node: Option<NodeId>,
    /// None at file scope.
    pub fn_entry: Option<FnId>,
    pub variables: FxHashMap<Symbol, VarId>,
    pub types: FxHashMap<Symbol, TypeId>,
    pub errors: FxHashMap<Symbol, ErrorId>,
    /// Innermost enclosing loop, for break/continue.
    pub parent_loop: Option<NodeId>,
    /// Present inside a `c_import` block.
    pub c_import_buf: Option<CImportBuf>,
    /// Variables declared in this scope, in order.
    pub variable_list: Vec<VarId>,
    /// Expressions whose value needs stack storage in this function.
    pub stack_value_nodes: Vec<NodeId>,
    /// Cast expressions that need a stack temporary.
    pub stack_cast_nodes: Vec<NodeId>,
    pub backend_scope: Option<BackendScopeRef>,
}

#[derive(Debug, Default)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope under `parent`, inheriting the loop and c_import
    /// context the way child block contexts do.
    pub fn new_scope(&mut self, parent: Option<ScopeId>, node: Option<NodeId>) -> ScopeId {
        let mut scope = Scope {
            parent,
            node,
            ..Scope::default()
        };
        if let Some(p) = parent {
            let parent_scope = self.get(p);
            scope.fn_entry = parent_scope.fn_entry;
            scope.parent_loop = parent_scope.parent_loop;
            scope.c_import_buf = parent_scope.c_import_buf.clone();
        }
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// First variable binding for `name`, walking all ancestor scopes.
    pub fn lookup_var(&self, scope: ScopeId, name: Symbol) -> Option<VarId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(&var) = s.variables.get(&name) {
                return Some(var);
            }
            current = s.parent;
        }
        None
    }

    /// Like `lookup_var`, but stops at the function boundary. Used to detect
    /// redeclaration inside a function without blocking shadowing of
    /// file-scope names.
    pub fn lookup_var_local(&self, scope: ScopeId, name: Symbol) -> Option<VarId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if s.fn_entry.is_none() {
                return None;
            }
            if let Some(&var) = s.variables.get(&name) {
                return Some(var);
            }
            current = s.parent;
        }
        None
    }

    /// First visible container or other named type.
    pub fn lookup_type(&self, scope: ScopeId, name: Symbol) -> Option<TypeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(&ty) = s.types.get(&name) {
                return Some(ty);
            }
            current = s.parent;
        }
        None
    }

    pub fn lookup_error(&self, scope: ScopeId, name: Symbol) -> Option<ErrorId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(&err) = s.errors.get(&name) {
                return Some(err);
            }
            current = s.parent;
        }
        None
    }

    pub fn fn_entry(&self, scope: ScopeId) -> Option<FnId> {
        self.get(scope).fn_entry
    }

    pub fn parent_loop(&self, scope: ScopeId) -> Option<NodeId> {
        self.get(scope).parent_loop
    }

    pub fn c_import_buf(&self, scope: ScopeId) -> Option<CImportBuf> {
        self.get(scope).c_import_buf.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parents() {
        let mut scopes = Scopes::new();
        let file = scopes.new_scope(None, None);
        let inner = scopes.new_scope(Some(file), None);
        let name = Symbol(7);
        scopes.get_mut(file).variables.insert(name, VarId(0));
        assert_eq!(scopes.lookup_var(inner, name), Some(VarId(0)));
    }

    #[test]
    fn local_lookup_stops_at_function_boundary() {
        let mut scopes = Scopes::new();
        let file = scopes.new_scope(None, None);
        let name = Symbol(7);
        scopes.get_mut(file).variables.insert(name, VarId(0));

        let fn_scope = scopes.new_scope(Some(file), None);
        scopes.get_mut(fn_scope).fn_entry = Some(FnId(0));
        let body = scopes.new_scope(Some(fn_scope), None);

        // A file-scope binding is visible but not "local".
        assert_eq!(scopes.lookup_var(body, name), Some(VarId(0)));
        assert_eq!(scopes.lookup_var_local(body, name), None);
    }

    #[test]
    fn child_inherits_loop_and_fn() {
        let mut scopes = Scopes::new();
        let fn_scope = scopes.new_scope(None, None);
        scopes.get_mut(fn_scope).fn_entry = Some(FnId(3));
        scopes.get_mut(fn_scope).parent_loop = Some(NodeId(9));
        let child = scopes.new_scope(Some(fn_scope), None);
        assert_eq!(scopes.fn_entry(child), Some(FnId(3)));
        assert_eq!(scopes.parent_loop(child), Some(NodeId(9)));
    }
}
