// src/sema/resolve.rs
//
// Declaration dependency resolver. Walks each top-level declaration for the
// identifiers it references, then drives resolution in an order that
// satisfies those dependencies: repeatedly pick the unresolved declaration
// with the lowest node id (source order) and recursively resolve what it
// needs first. A declaration revisited while its own dependencies are being
// resolved is part of a cycle; it is skipped here and the cycle surfaces
// later as an undeclared identifier or an infinite-size error.

use tracing::{debug, trace};

use crate::ast::{NodeId, NodeKind, Symbol, VisibMod};
use crate::errors::SemanticError;
use crate::sema::compilation::{Compilation, DeclState};
use crate::sema::entities::FileId;

impl Compilation {
    pub(crate) fn detect_top_level_deps(&mut self, file: FileId) {
        let Some(root) = self.entities.file(file).root else {
            return;
        };
        let NodeKind::Root { decls } = self.ast.node(root).kind.clone() else {
            return;
        };
        for decl in decls {
            self.detect_decl_deps(file, decl);
        }
    }

    fn detect_decl_deps(&mut self, file: FileId, node: NodeId) {
        match self.ast.node(node).kind.clone() {
            NodeKind::ContainerDecl {
                name,
                kind,
                visib,
                fields,
                fns,
            } => {
                let printable = self.sym_name(name);
                let container =
                    self.types
                        .new_container(kind, name, &printable, node, file);
                let collides = self.primitive_types.contains_key(&name)
                    || self
                        .scopes
                        .get(self.entities.file(file).scope)
                        .types
                        .contains_key(&name);
                if collides {
                    self.add_error(SemanticError::Redefinition { name: printable }, node);
                } else {
                    let ty = self.types.container(container).type_id;
                    let scope = self.entities.file(file).scope;
                    self.scopes.get_mut(scope).types.insert(name, ty);

                    if visib != VisibMod::Private {
                        self.propagate_type_to_importers(file, name, ty);
                    }
                }

                let mut state = DeclState {
                    name: Some(name),
                    file,
                    container: Some(container),
                    ..DeclState::default()
                };
                for field in &fields {
                    let NodeKind::StructField { type_expr, .. } =
                        self.ast.node(*field).kind.clone()
                    else {
                        continue;
                    };
                    self.collect_expr_deps(file, type_expr, &mut state.deps);
                }
                self.enqueue_or_resolve(file, node, name, state);

                // Member function definitions are handled independently.
                for fn_def in fns {
                    let NodeKind::FnDef { proto, .. } = self.ast.node(fn_def).kind else {
                        continue;
                    };
                    self.decl_state
                        .entry(proto)
                        .or_default()
                        .member_of = Some(container);
                    self.detect_decl_deps(file, fn_def);
                }
            }
            NodeKind::FnDef { proto, .. } => {
                self.decl_state.entry(proto).or_default().def_node = Some(node);
                self.detect_decl_deps(file, proto);
            }
            NodeKind::FnProto {
                name,
                params,
                return_type,
                ..
            } => {
                let mut state = std::mem::take(self.decl_state.entry(node).or_default());
                state.name = Some(name);
                state.file = file;
                for param in &params {
                    let NodeKind::ParamDecl { type_expr, .. } = self.ast.node(*param).kind else {
                        continue;
                    };
                    self.collect_expr_deps(file, type_expr, &mut state.deps);
                }
                self.collect_expr_deps(file, return_type, &mut state.deps);
                self.enqueue_or_resolve(file, node, name, state);
            }
            NodeKind::VarDecl {
                name,
                type_expr,
                init,
                ..
            } => {
                let mut state = DeclState {
                    name: Some(name),
                    file,
                    ..DeclState::default()
                };
                if let Some(ty) = type_expr {
                    self.collect_expr_deps(file, ty, &mut state.deps);
                }
                if let Some(init) = init {
                    self.collect_expr_deps(file, init, &mut state.deps);
                }
                self.enqueue_or_resolve(file, node, name, state);
            }
            NodeKind::CImport { body } => {
                let mut state = DeclState {
                    file,
                    ..DeclState::default()
                };
                self.collect_expr_deps(file, body, &mut state.deps);
                let synth = format!("c_import_{}", node.0);
                let name = self.ast.interner.intern(&synth);
                state.name = Some(name);
                self.enqueue_or_resolve(file, node, name, state);
            }
            // Error values never depend on other top-level declarations.
            NodeKind::ErrorValueDecl { .. } => {
                self.decl_state.insert(
                    node,
                    DeclState {
                        file,
                        ..DeclState::default()
                    },
                );
                self.resolve_top_level_decl(file, node);
            }
            // Importer edges were wired up in stage 1.
            NodeKind::Import { .. } => {}
            _ => panic!("non-declaration node at top level"),
        }
    }

    fn enqueue_or_resolve(&mut self, file: FileId, node: NodeId, name: Symbol, state: DeclState) {
        let has_deps = !state.deps.is_empty();
        self.decl_state.insert(node, state);
        if has_deps {
            trace!(name = %self.sym_name(name), "declaration enqueued");
            self.unresolved_decls.insert(name, node);
        } else {
            self.resolve_top_level_decl(file, node);
        }
    }

    /// Record every identifier reference in `node` that is neither a
    /// primitive type nor a type already bound in the file scope.
    fn collect_expr_deps(
        &mut self,
        file: FileId,
        node: NodeId,
        deps: &mut rustc_hash::FxHashSet<Symbol>,
    ) {
        match self.ast.node(node).kind.clone() {
            NodeKind::NumberLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::CharLiteral { .. }
            | NodeKind::BoolLiteral { .. }
            | NodeKind::NullLiteral
            | NodeKind::UndefinedLiteral
            | NodeKind::VoidLiteral
            | NodeKind::Goto { .. }
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Label { .. }
            | NodeKind::ErrorType => {}
            NodeKind::Symbol { name, override_type } => {
                if override_type.is_none()
                    && !self.primitive_types.contains_key(&name)
                    && !self
                        .scopes
                        .get(self.entities.file(file).scope)
                        .types
                        .contains_key(&name)
                {
                    deps.insert(name);
                }
            }
            NodeKind::BinOp { lhs, rhs, .. } => {
                self.collect_expr_deps(file, lhs, deps);
                self.collect_expr_deps(file, rhs, deps);
            }
            NodeKind::UnwrapErrExpr {
                operand, fallback, ..
            } => {
                self.collect_expr_deps(file, operand, deps);
                self.collect_expr_deps(file, fallback, deps);
            }
            NodeKind::Return { expr, .. } => {
                if let Some(expr) = expr {
                    self.collect_expr_deps(file, expr, deps);
                }
            }
            NodeKind::PrefixOp { operand, .. } => {
                self.collect_expr_deps(file, operand, deps);
            }
            NodeKind::Call { callee, args, .. } => {
                self.collect_expr_deps(file, callee, deps);
                for arg in args {
                    self.collect_expr_deps(file, arg, deps);
                }
            }
            NodeKind::ArrayAccess { array, index } => {
                self.collect_expr_deps(file, array, deps);
                self.collect_expr_deps(file, index, deps);
            }
            NodeKind::SliceExpr {
                array, start, end, ..
            } => {
                self.collect_expr_deps(file, array, deps);
                self.collect_expr_deps(file, start, deps);
                if let Some(end) = end {
                    self.collect_expr_deps(file, end, deps);
                }
            }
            NodeKind::FieldAccess { object, .. } => {
                self.collect_expr_deps(file, object, deps);
            }
            NodeKind::If {
                condition,
                then_block,
                else_node,
            } => {
                self.collect_expr_deps(file, condition, deps);
                self.collect_expr_deps(file, then_block, deps);
                if let Some(else_node) = else_node {
                    self.collect_expr_deps(file, else_node, deps);
                }
            }
            NodeKind::IfVar {
                type_expr,
                init,
                then_block,
                else_node,
                ..
            } => {
                if let Some(ty) = type_expr {
                    self.collect_expr_deps(file, ty, deps);
                }
                self.collect_expr_deps(file, init, deps);
                self.collect_expr_deps(file, then_block, deps);
                if let Some(else_node) = else_node {
                    self.collect_expr_deps(file, else_node, deps);
                }
            }
            NodeKind::While { condition, body } => {
                self.collect_expr_deps(file, condition, deps);
                self.collect_expr_deps(file, body, deps);
            }
            NodeKind::For { iterable, body, .. } => {
                self.collect_expr_deps(file, iterable, deps);
                self.collect_expr_deps(file, body, deps);
            }
            NodeKind::Block { statements } => {
                for stmt in statements {
                    self.collect_expr_deps(file, stmt, deps);
                }
            }
            NodeKind::VarDecl {
                type_expr, init, ..
            } => {
                if let Some(ty) = type_expr {
                    self.collect_expr_deps(file, ty, deps);
                }
                if let Some(init) = init {
                    self.collect_expr_deps(file, init, deps);
                }
            }
            NodeKind::ContainerInit {
                type_expr, entries, ..
            } => {
                self.collect_expr_deps(file, type_expr, deps);
                for entry in entries {
                    self.collect_expr_deps(file, entry, deps);
                }
            }
            NodeKind::FieldInit { value, .. } => {
                self.collect_expr_deps(file, value, deps);
            }
            NodeKind::ArrayType { size, child, .. } => {
                if let Some(size) = size {
                    self.collect_expr_deps(file, size, deps);
                }
                self.collect_expr_deps(file, child, deps);
            }
            NodeKind::Switch { scrutinee, prongs } => {
                self.collect_expr_deps(file, scrutinee, deps);
                for prong in prongs {
                    self.collect_expr_deps(file, prong, deps);
                }
            }
            NodeKind::SwitchProng { items, body, .. } => {
                for item in items {
                    self.collect_expr_deps(file, item, deps);
                }
                self.collect_expr_deps(file, body, deps);
            }
            NodeKind::Cast { operand, .. } => {
                self.collect_expr_deps(file, operand, deps);
            }
            NodeKind::Root { .. }
            | NodeKind::FnProto { .. }
            | NodeKind::FnDef { .. }
            | NodeKind::ParamDecl { .. }
            | NodeKind::ErrorValueDecl { .. }
            | NodeKind::ContainerDecl { .. }
            | NodeKind::StructField { .. }
            | NodeKind::Import { .. }
            | NodeKind::CImport { .. } => {
                panic!("declaration node inside an expression")
            }
        }
    }

    /// Drain the worklist: always pick the unresolved declaration with the
    /// lowest node id so resolution order is deterministic.
    pub(crate) fn resolve_remaining_decls(&mut self) {
        while !self.unresolved_decls.is_empty() {
            let decl_node = self
                .unresolved_decls
                .values()
                .copied()
                .min()
                .expect("worklist not empty");
            debug!(node = decl_node.0, "resolving worklist declaration");
            if let Some(state) = self.decl_state.get_mut(&decl_node) {
                state.in_current_deps = true;
            }
            let file = self.decl_state[&decl_node].file;
            self.recursive_resolve_decl(file, decl_node);
            if let Some(state) = self.decl_state.get_mut(&decl_node) {
                state.in_current_deps = false;
            }
        }
    }

    fn recursive_resolve_decl(&mut self, file: FileId, node: NodeId) {
        let deps: Vec<Symbol> = self.decl_state[&node].deps.iter().copied().collect();
        for dep in deps {
            let Some(&child) = self.unresolved_decls.get(&dep) else {
                continue;
            };
            if self.decl_state[&child].in_current_deps {
                // Dependency loop; the missing binding will produce an error
                // in the declaration that needs it.
                continue;
            }
            self.decl_state.get_mut(&child).unwrap().in_current_deps = true;
            let child_file = self.decl_state[&child].file;
            self.recursive_resolve_decl(child_file, child);
            self.decl_state.get_mut(&child).unwrap().in_current_deps = false;
        }
        self.resolve_top_level_decl(file, node);
    }

    pub(crate) fn resolve_top_level_decl(&mut self, file: FileId, node: NodeId) {
        match self.ast.node(node).kind.clone() {
            NodeKind::FnProto { .. } => self.preview_fn_proto(file, node),
            NodeKind::ContainerDecl { .. } => {
                let container = self.decl_state[&node]
                    .container
                    .expect("container declaration without record");
                self.resolve_container(container);
            }
            NodeKind::VarDecl { .. } => {
                let scope = self.entities.file(file).scope;
                self.analyze_var_decl_node(scope, node);
            }
            NodeKind::ErrorValueDecl { .. } => self.resolve_error_value_decl(file, node),
            NodeKind::CImport { .. } => self.resolve_c_import_decl(file, node),
            NodeKind::Import { .. } => return,
            _ => panic!("non-declaration node in resolver"),
        }

        // Satisfy the dependency: this name no longer blocks anyone.
        if let Some(name) = self.decl_state.get(&node).and_then(|s| s.name) {
            self.unresolved_decls.remove(&name);
        }
    }

    /// Run function-body analysis over a file's top-level declarations.
    pub(crate) fn analyze_file_fn_defs(&mut self, file: FileId) {
        let Some(root) = self.entities.file(file).root else {
            return;
        };
        let NodeKind::Root { decls } = self.ast.node(root).kind.clone() else {
            return;
        };
        for decl in decls {
            match self.ast.node(decl).kind.clone() {
                NodeKind::FnDef { .. } => self.analyze_fn_def(file, decl),
                NodeKind::ContainerDecl { fns, .. } => {
                    for fn_def in fns {
                        self.analyze_fn_def(file, fn_def);
                    }
                }
                _ => {}
            }
        }
    }

    fn propagate_type_to_importers(&mut self, file: FileId, name: Symbol, ty: crate::sema::types::TypeId) {
        let importers = self.entities.file(file).importers.clone();
        for (importer, import_node) in importers {
            let scope = self.entities.file(importer).scope;
            if self.scopes.get(scope).types.contains_key(&name) {
                self.add_error(
                    SemanticError::ImportOverridesDefinition {
                        kind: "type",
                        name: self.sym_name(name),
                    },
                    import_node,
                );
            } else {
                self.scopes.get_mut(scope).types.insert(name, ty);
            }
        }
    }
}
