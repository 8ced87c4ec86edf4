// src/sema/analyzer/mod.rs
//
// Expression analyzer. `analyze_expression` walks one node, assigns its
// type, attempts constant folding, then reconciles with the expected type by
// inserting an implicit-cast node when needed. Every error poisons the node
// with the invalid type and analysis continues; invalid is absorbing and
// contributes no further diagnostics downstream.

mod builtins;
mod call;
mod cast;
mod declarations;
mod expr;

use tracing::trace;

use crate::ast::{NodeId, NodeKind, ReturnKind};
use crate::errors::SemanticError;
use crate::sema::compilation::Compilation;
use crate::sema::scope::ScopeId;
use crate::sema::types::TypeId;
use crate::sema::value::ConstValue;

impl Compilation {
    /// Analyze one expression node against an optional expected type.
    ///
    /// When a coercion is required the node is rewritten in place into a
    /// synthetic cast whose operand carries the original content, so callers
    /// keep a valid id either way. Returns the reconciled type.
    pub(crate) fn analyze_expression(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        trace!(node = node.0, "analyze expression");
        let return_type = self.analyze_expression_raw(scope, expected, node);
        self.ast.ann_mut(node).scope = Some(scope);
        self.ast.set_type(node, return_type);
        self.resolve_type_compat(scope, node, expected, return_type)
    }

    fn analyze_expression_raw(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        match self.ast.node(node).kind.clone() {
            NodeKind::Block { .. } => self.analyze_block_expr(scope, expected, node),
            NodeKind::Return { .. } => self.analyze_return_expr(scope, expected, node),
            NodeKind::VarDecl { .. } => {
                self.analyze_var_decl_node(scope, node);
                self.types.prim.void
            }
            NodeKind::Goto { name } => {
                let fn_entry = self.scopes.fn_entry(scope);
                let label = fn_entry
                    .and_then(|f| self.entities.func(f).labels.get(&name).copied());
                match label {
                    Some(label_id) => {
                        self.entities.label_mut(label_id).used = true;
                    }
                    None => {
                        let name = self.sym_name(name);
                        self.add_error(SemanticError::UndeclaredLabel { name }, node);
                    }
                }
                self.types.prim.unreachable
            }
            NodeKind::Break => {
                match self.scopes.parent_loop(scope) {
                    Some(loop_node) => {
                        self.loops_with_break.insert(loop_node);
                    }
                    None => self.add_error(SemanticError::BreakOutsideLoop, node),
                }
                self.types.prim.unreachable
            }
            NodeKind::Continue => {
                if self.scopes.parent_loop(scope).is_none() {
                    self.add_error(SemanticError::ContinueOutsideLoop, node);
                }
                self.types.prim.unreachable
            }
            NodeKind::BinOp { .. } => self.analyze_bin_op_expr(scope, expected, node),
            NodeKind::UnwrapErrExpr { .. } => self.analyze_unwrap_err_expr(scope, node),
            NodeKind::Call { .. } => self.analyze_fn_call_expr(scope, expected, node),
            NodeKind::ArrayAccess { .. } => self.analyze_array_access_expr(scope, node),
            NodeKind::SliceExpr { .. } => self.analyze_slice_expr(scope, node),
            NodeKind::FieldAccess { .. } => self.analyze_field_access_expr(scope, node),
            NodeKind::ContainerInit { .. } => self.analyze_container_init_expr(scope, node),
            NodeKind::NumberLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::CharLiteral { .. }
            | NodeKind::BoolLiteral { .. }
            | NodeKind::NullLiteral
            | NodeKind::UndefinedLiteral
            | NodeKind::VoidLiteral => self.analyze_literal_expr(scope, expected, node),
            NodeKind::Symbol { .. } => self.analyze_symbol_expr(scope, node),
            NodeKind::PrefixOp { .. } => self.analyze_prefix_op_expr(scope, expected, node),
            NodeKind::If {
                condition,
                then_block,
                else_node,
            } => {
                self.analyze_expression(scope, Some(self.types.prim.bool_), condition);
                self.analyze_if_then_else(scope, expected, then_block, else_node, node)
            }
            NodeKind::IfVar { .. } => self.analyze_if_var_expr(scope, expected, node),
            NodeKind::While { .. } => self.analyze_while_expr(scope, node),
            NodeKind::For { .. } => self.analyze_for_expr(scope, node),
            NodeKind::Switch { .. } => self.analyze_switch_expr(scope, expected, node),
            NodeKind::ArrayType { .. } => self.analyze_array_type_expr(scope, node),
            NodeKind::ErrorType => {
                let pure_error = self.types.prim.pure_error;
                self.ast.set_const(node, ConstValue::ty(pure_error));
                self.types.prim.metatype
            }
            // A cast node is only revisited when analysis re-enters an
            // already-rewritten tree; its annotation is authoritative.
            NodeKind::Cast { .. } => self.ast.ty(node).unwrap_or(TypeId::INVALID),
            NodeKind::Root { .. }
            | NodeKind::FnProto { .. }
            | NodeKind::FnDef { .. }
            | NodeKind::ParamDecl { .. }
            | NodeKind::ErrorValueDecl { .. }
            | NodeKind::ContainerDecl { .. }
            | NodeKind::StructField { .. }
            | NodeKind::FieldInit { .. }
            | NodeKind::SwitchProng { .. }
            | NodeKind::Label { .. }
            | NodeKind::Import { .. }
            | NodeKind::CImport { .. } => {
                panic!("node kind is not an expression")
            }
        }
    }

    // ========================================================================
    // Blocks and control flow
    // ========================================================================

    fn analyze_block_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let NodeKind::Block { statements } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        let child_scope = self.scopes.new_scope(Some(scope), Some(node));
        let mut return_type = self.types.prim.void;

        let count = statements.len();
        for (i, stmt) in statements.into_iter().enumerate() {
            if let NodeKind::Label { name } = self.ast.node(stmt).kind.clone() {
                self.ast.ann_mut(stmt).scope = Some(child_scope);
                if let Some(fn_id) = self.scopes.fn_entry(child_scope)
                    && let Some(&label_id) = self.entities.func(fn_id).labels.get(&name)
                {
                    self.entities.label_mut(label_id).entered_from_fallthrough =
                        !self.types.is_unreachable(return_type);
                }
                // A label is a fresh entry point.
                return_type = self.types.prim.void;
                continue;
            }
            if self.types.is_unreachable(return_type) {
                if self.ast.is_void_expr(stmt) {
                    // {unreachable; void; void} is allowed.
                    let void = self.types.prim.void;
                    self.analyze_expression(child_scope, Some(void), stmt);
                    continue;
                }
                let report = self.first_executing_node(stmt);
                self.add_error(SemanticError::UnreachableCode, report);
                break;
            }
            let is_last = i + 1 == count;
            let passed_expected = if is_last { expected } else { None };
            return_type = self.analyze_expression(child_scope, passed_expected, stmt);
            if !is_last {
                if matches!(
                    self.types.kind(return_type),
                    crate::sema::types::TypeKind::MetaType
                ) {
                    self.add_error(SemanticError::ExpectedExpressionFoundType, stmt);
                } else if self.types.error_union_child(return_type).is_some() {
                    self.add_error(SemanticError::StatementIgnoresError, stmt);
                }
            }
        }
        return_type
    }

    fn analyze_return_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let Some(fn_id) = self.scopes.fn_entry(scope) else {
            self.add_error(SemanticError::ReturnOutsideFunction, node);
            return TypeId::INVALID;
        };

        let NodeKind::Return { kind, expr } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        let expr = match expr {
            Some(expr) => expr,
            None => {
                // A bare `return` returns void.
                let span = self.ast.span(node);
                let owner = self.ast.owner(node);
                let void_node = self.ast.push(NodeKind::VoidLiteral, span, owner);
                self.ast.node_mut(node).kind = NodeKind::Return {
                    kind,
                    expr: Some(void_node),
                };
                void_node
            }
        };

        let fn_ty = self.entities.func(fn_id).ty;
        let return_type = self
            .types
            .fn_sig(fn_ty)
            .map(|sig| sig.return_type)
            .unwrap_or(TypeId::INVALID);

        match kind {
            ReturnKind::Normal => {
                self.analyze_expression(scope, Some(return_type), expr);
                self.types.prim.unreachable
            }
            ReturnKind::ErrorPropagate => {
                let expected_err = expected
                    .filter(|t| !t.is_invalid())
                    .map(|t| self.types.error_union_of(t));
                let resolved = self.analyze_expression(scope, expected_err, expr);
                if resolved.is_invalid() {
                    resolved
                } else if let Some(child) = self.types.error_union_child(resolved) {
                    child
                } else {
                    let found = self.type_name(resolved);
                    self.add_error(SemanticError::ExpectedErrorType { found }, expr);
                    TypeId::INVALID
                }
            }
        }
    }

    fn analyze_if_then_else(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        then_block: NodeId,
        else_node: Option<NodeId>,
        parent_node: NodeId,
    ) -> TypeId {
        let then_type = self.analyze_expression(scope, expected, then_block);

        let else_type = match else_node {
            Some(else_node) => self.analyze_expression(scope, expected, else_node),
            None => {
                let void = self.types.prim.void;
                self.resolve_type_compat(scope, parent_node, expected, void)
            }
        };

        if expected.is_some() {
            if self.types.is_unreachable(then_type) {
                else_type
            } else {
                then_type
            }
        } else {
            self.resolve_peer_type_compat(
                scope,
                parent_node,
                &[(Some(then_block), then_type), (else_node, else_type)],
            )
        }
    }

    fn analyze_if_var_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let NodeKind::IfVar {
            name,
            is_const,
            type_expr,
            init,
            then_block,
            else_node,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };
        let child_scope = self.scopes.new_scope(Some(scope), Some(node));
        self.analyze_var_decl_raw(
            child_scope,
            node,
            name,
            is_const,
            crate::ast::VisibMod::Private,
            type_expr,
            Some(init),
            true,
        );
        self.analyze_if_then_else(child_scope, expected, then_block, else_node, node)
    }

    fn analyze_while_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::While { condition, body } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };

        let bool_ty = self.types.prim.bool_;
        let condition_type = self.analyze_expression(scope, Some(bool_ty), condition);

        let child_scope = self.scopes.new_scope(Some(scope), Some(node));
        self.scopes.get_mut(child_scope).parent_loop = Some(node);
        let void = self.types.prim.void;
        self.analyze_expression(child_scope, Some(void), body);

        if condition_type.is_invalid() {
            return TypeId::INVALID;
        }
        // A constant-true condition with no break never falls out of the
        // loop.
        if self.ast.const_val(condition).as_bool() == Some(true)
            && !self.loops_with_break.contains(&node)
        {
            return self.types.prim.unreachable;
        }
        void
    }

    fn analyze_for_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::For {
            elem_name,
            index_name,
            iterable,
            body,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };

        let iterable_type = self.analyze_expression(scope, None, iterable);
        let elem_type = if iterable_type.is_invalid() {
            iterable_type
        } else if let Some((child, _)) = self.types.array_info(iterable_type) {
            child
        } else if let Some((child, _)) = self.types.slice_child(iterable_type) {
            child
        } else {
            let ty = self.type_name(iterable_type);
            self.add_error(SemanticError::IterationOverNonArray { ty }, node);
            TypeId::INVALID
        };

        let child_scope = self.scopes.new_scope(Some(scope), Some(node));
        self.scopes.get_mut(child_scope).parent_loop = Some(node);

        let elem_var = self.add_local_var(child_scope, node, Some(elem_name), elem_type, true);
        self.ast.ann_mut(node).resolved_var = Some(elem_var);
        let isize_ty = self.types.prim.isize;
        // The backend always needs an index variable, named or not.
        self.add_local_var(child_scope, node, index_name, isize_ty, true);

        let void = self.types.prim.void;
        self.analyze_expression(child_scope, Some(void), body);
        void
    }

    fn analyze_switch_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let NodeKind::Switch { scrutinee, prongs } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };

        let scrutinee_type = self.analyze_expression(scope, None, scrutinee);
        if scrutinee_type.is_invalid() {
            return scrutinee_type;
        }
        if self.types.is_unreachable(scrutinee_type) {
            let report = self.first_executing_node(scrutinee);
            self.add_error(SemanticError::SwitchOnUnreachable, report);
            return TypeId::INVALID;
        }

        let mut else_prong = None;
        let mut peers: Vec<(Option<NodeId>, TypeId)> = Vec::with_capacity(prongs.len());
        for prong in prongs {
            let NodeKind::SwitchProng {
                items,
                binding,
                body,
            } = self.ast.node(prong).kind.clone()
            else {
                unreachable!()
            };

            if items.is_empty() {
                if else_prong.is_some() {
                    self.add_error(SemanticError::MultipleElseProngs, prong);
                } else {
                    else_prong = Some(prong);
                }
            } else {
                // Prong values must be constants in the scrutinee type.
                for item in items {
                    self.analyze_expression(scope, Some(scrutinee_type), item);
                    if !self.ast.const_val(item).ok {
                        self.add_error(SemanticError::UnableToResolveConstant, item);
                    }
                }
            }

            let child_scope = self.scopes.new_scope(Some(scope), Some(node));
            self.ast.ann_mut(prong).scope = Some(child_scope);
            if let Some(bind_name) = binding {
                let var = self.add_local_var(
                    child_scope,
                    prong,
                    Some(bind_name),
                    scrutinee_type,
                    true,
                );
                self.ast.ann_mut(prong).resolved_var = Some(var);
            }

            let prong_type = self.analyze_expression(child_scope, expected, body);
            peers.push((Some(body), prong_type));
        }

        if else_prong.is_none() {
            self.add_error(SemanticError::SwitchNotExhaustive, node);
        }

        match expected {
            Some(ty) => ty,
            None if peers.is_empty() => TypeId::INVALID,
            None => self.resolve_peer_type_compat(scope, node, &peers),
        }
    }

    // ========================================================================
    // Type-valued expressions
    // ========================================================================

    /// The type a type-valued expression resolves to. Must run after
    /// `analyze_expression` on the same node.
    pub(crate) fn resolve_type_from_node(&mut self, node: NodeId) -> TypeId {
        if let NodeKind::Symbol {
            override_type: Some(ty),
            ..
        } = self.ast.node(node).kind
        {
            return ty;
        }
        let ty = self.ast.ty(node).expect("node analyzed before resolve_type");
        if ty.is_invalid() {
            return TypeId::INVALID;
        }
        if !matches!(self.types.kind(ty), crate::sema::types::TypeKind::MetaType) {
            self.add_error(SemanticError::ExpectedTypeFoundExpression, node);
            return TypeId::INVALID;
        }
        match self.ast.const_val(node).as_type() {
            Some(t) => t,
            None => {
                self.add_error(SemanticError::UnableToResolveConstant, node);
                TypeId::INVALID
            }
        }
    }

    pub(crate) fn analyze_type_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        self.analyze_expression(scope, None, node);
        self.resolve_type_from_node(node)
    }

    /// The node whose source position best describes where evaluation of
    /// this expression begins.
    pub(crate) fn first_executing_node(&self, node: NodeId) -> NodeId {
        match &self.ast.node(node).kind {
            NodeKind::Call { callee, .. } => self.first_executing_node(*callee),
            NodeKind::BinOp { lhs, .. } => self.first_executing_node(*lhs),
            NodeKind::UnwrapErrExpr { operand, .. } => self.first_executing_node(*operand),
            NodeKind::ArrayAccess { array, .. } => self.first_executing_node(*array),
            NodeKind::SliceExpr { array, .. } => self.first_executing_node(*array),
            NodeKind::FieldAccess { object, .. } => self.first_executing_node(*object),
            _ => node,
        }
    }
}
