// src/sema/analyzer/expr.rs
//
// Per-node analysis for literals, symbols, operators, member access and
// aggregate literals.

use crate::ast::{BinOp, NodeId, NodeKind, NumLit, PrefixOp, Symbol};
use crate::errors::SemanticError;
use crate::sema::compilation::Compilation;
use crate::sema::number::{BigNum, NumError};
use crate::sema::scope::ScopeId;
use crate::sema::types::{TypeId, TypeKind};
use crate::sema::value::{ConstData, ConstValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LValPurpose {
    Assign,
    AddressOf,
}

impl Compilation {
    // ========================================================================
    // Literals
    // ========================================================================

    pub(super) fn analyze_literal_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        match self.ast.node(node).kind.clone() {
            NodeKind::NumberLiteral { value, overflow } => {
                if overflow {
                    self.add_error(SemanticError::NumberTooLarge, node);
                    return TypeId::INVALID;
                }
                match value {
                    NumLit::Int(v) => {
                        self.ast.set_const(node, ConstValue::num(BigNum::from_u64(v)));
                        self.types.prim.num_lit_int
                    }
                    NumLit::Float(v) => {
                        self.ast
                            .set_const(node, ConstValue::num(BigNum::from_f64(v)));
                        match expected {
                            Some(expected) => {
                                self.num_lit_fits(node, expected);
                                expected
                            }
                            None => self.types.prim.num_lit_float,
                        }
                    }
                }
            }
            NodeKind::StringLiteral { value, is_c } => {
                if is_c {
                    self.ast.set_const(node, ConstValue::c_string(&value));
                    self.types.pointer_to(self.types.prim.u8, true)
                } else {
                    self.ast.set_const(node, ConstValue::string_slice(&value));
                    self.types.array_of(self.types.prim.u8, value.len() as u64)
                }
            }
            NodeKind::CharLiteral { value } => {
                self.ast
                    .set_const(node, ConstValue::num(BigNum::from_u64(value as u64)));
                self.types.prim.num_lit_int
            }
            NodeKind::BoolLiteral { value } => {
                self.ast.set_const(node, ConstValue::bool_value(value));
                self.types.prim.bool_
            }
            NodeKind::NullLiteral => {
                let Some(expected) = expected else {
                    self.add_error(SemanticError::UnableToDetermineNullType, node);
                    return TypeId::INVALID;
                };
                if expected.is_invalid() {
                    return TypeId::INVALID;
                }
                if self.types.optional_child(expected).is_none() {
                    self.add_error(
                        SemanticError::TypeMismatch {
                            expected: self.type_name(expected),
                            found: "(null)".to_string(),
                        },
                        node,
                    );
                    return TypeId::INVALID;
                }
                self.ast.set_const(node, ConstValue::null());
                // The null value is materialized on the stack.
                self.scopes.get_mut(scope).stack_value_nodes.push(node);
                expected
            }
            NodeKind::UndefinedLiteral => {
                self.ast.set_const(node, ConstValue::undefined());
                expected.unwrap_or(self.types.prim.undef_lit)
            }
            NodeKind::VoidLiteral => {
                self.ast.set_const(node, ConstValue::void());
                self.types.prim.void
            }
            _ => unreachable!(),
        }
    }

    // ========================================================================
    // Symbols
    // ========================================================================

    pub(super) fn analyze_symbol_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::Symbol {
            name,
            override_type,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };

        if let Some(ty) = override_type {
            self.ast.set_const(node, ConstValue::ty(ty));
            return self.types.prim.metatype;
        }

        if let Some(&ty) = self.primitive_types.get(&name) {
            self.ast.set_const(node, ConstValue::ty(ty));
            return self.types.prim.metatype;
        }

        if let Some(var_id) = self.scopes.lookup_var(scope, name) {
            self.ast.ann_mut(node).resolved_var = Some(var_id);
            let var = self.entities.var(var_id);
            let var_ty = var.ty;
            if var.is_const
                && let NodeKind::VarDecl {
                    init: Some(init), ..
                } = self.ast.node(var.decl_node).kind
            {
                let init_const = self.ast.const_val(init).clone();
                if init_const.ok {
                    // Constant propagation: the symbol takes the value and
                    // the type of the initializer.
                    let init_ty = self.ast.ty(init).expect("initializer analyzed");
                    self.ast.set_const(node, init_const);
                    return init_ty;
                }
            }
            return var_ty;
        }

        if let Some(container_ty) = self.scopes.lookup_type(scope, name) {
            self.ast.set_const(node, ConstValue::ty(container_ty));
            return self.types.prim.metatype;
        }

        let file = self.ast.owner(node);
        if let Some(&fn_id) = self.entities.file(file).fn_table.get(&name) {
            self.ast.ann_mut(node).resolved_fn = Some(fn_id);
            self.ast.set_const(node, ConstValue::func(fn_id));
            return self.entities.func(fn_id).ty;
        }

        self.add_error(
            SemanticError::UndeclaredIdentifier {
                name: self.sym_name(name),
            },
            node,
        );
        TypeId::INVALID
    }

    // ========================================================================
    // Binary operators
    // ========================================================================

    pub(super) fn analyze_bin_op_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let NodeKind::BinOp { op, lhs, rhs } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };

        if op.is_assignment() {
            return self.analyze_assignment(scope, op, lhs, rhs);
        }
        match op {
            BinOp::BoolOr | BinOp::BoolAnd => self.analyze_logic_bin_op(scope, node, op, lhs, rhs),
            op if op.is_comparison() => self.analyze_comparison(scope, node, op, lhs, rhs),
            BinOp::BitOr
            | BinOp::BitXor
            | BinOp::BitAnd
            | BinOp::Shl
            | BinOp::Shr
            | BinOp::Add
            | BinOp::Sub
            | BinOp::Mul
            | BinOp::Div
            | BinOp::Mod => self.analyze_arith_bin_op(scope, expected, node, op, lhs, rhs),
            BinOp::UnwrapOptional => {
                let lhs_type = self.analyze_expression(scope, None, lhs);
                if lhs_type.is_invalid() {
                    return lhs_type;
                }
                let Some(child) = self.types.optional_child(lhs_type) else {
                    let found = self.type_name(lhs_type);
                    self.add_error(SemanticError::ExpectedOptionalType { found }, lhs);
                    return TypeId::INVALID;
                };
                self.analyze_expression(scope, Some(child), rhs);
                child
            }
            BinOp::StrCat => self.analyze_str_cat(scope, node, lhs, rhs),
            _ => unreachable!(),
        }
    }

    fn analyze_assignment(
        &mut self,
        scope: ScopeId,
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> TypeId {
        let expected_rhs_type = self.analyze_lvalue(scope, lhs, LValPurpose::Assign);
        if !self.is_op_allowed(expected_rhs_type, op) && !expected_rhs_type.is_invalid() {
            self.add_error(
                SemanticError::OperatorNotAllowed {
                    ty: self.type_name(expected_rhs_type),
                },
                lhs,
            );
        }
        self.analyze_expression(scope, Some(expected_rhs_type), rhs);
        self.types.prim.void
    }

    fn is_op_allowed(&self, ty: TypeId, op: BinOp) -> bool {
        match op {
            BinOp::Assign => true,
            BinOp::AssignTimes | BinOp::AssignDiv | BinOp::AssignMod => {
                self.types.is_int(ty) || self.types.is_float(ty)
            }
            BinOp::AssignPlus | BinOp::AssignMinus => {
                self.types.is_int(ty)
                    || self.types.is_float(ty)
                    || self.types.pointer_child(ty).is_some()
            }
            BinOp::AssignShl
            | BinOp::AssignShr
            | BinOp::AssignBitAnd
            | BinOp::AssignBitXor
            | BinOp::AssignBitOr => self.types.is_int(ty),
            BinOp::AssignBoolAnd | BinOp::AssignBoolOr => {
                matches!(self.types.kind(ty), TypeKind::Bool)
            }
            _ => unreachable!("not an assignment operator"),
        }
    }

    /// The type the right-hand side must coerce to when `lhs_node` is
    /// written through, or the pointed-at type when its address is taken.
    pub(super) fn analyze_lvalue(
        &mut self,
        scope: ScopeId,
        lhs_node: NodeId,
        purpose: LValPurpose,
    ) -> TypeId {
        match self.ast.node(lhs_node).kind.clone() {
            NodeKind::Symbol { name, .. } if purpose == LValPurpose::Assign => {
                let Some(var_id) = self.scopes.lookup_var(scope, name) else {
                    self.add_error(
                        SemanticError::UndeclaredIdentifier {
                            name: self.sym_name(name),
                        },
                        lhs_node,
                    );
                    return TypeId::INVALID;
                };
                self.ast.ann_mut(lhs_node).resolved_var = Some(var_id);
                self.ast.ann_mut(lhs_node).scope = Some(scope);
                let var = self.entities.var(var_id);
                if var.is_const {
                    self.add_error(SemanticError::CannotAssignToConstant, lhs_node);
                    return TypeId::INVALID;
                }
                let ty = var.ty;
                self.ast.set_type(lhs_node, ty);
                ty
            }
            NodeKind::Symbol { .. }
            | NodeKind::ArrayAccess { .. }
            | NodeKind::FieldAccess { .. } => self.analyze_expression(scope, None, lhs_node),
            NodeKind::PrefixOp {
                op: PrefixOp::Dereference,
                ..
            } if purpose == LValPurpose::Assign => {
                // `*x = ...` assigns through the pointer.
                self.analyze_expression(scope, None, lhs_node)
            }
            _ => match purpose {
                LValPurpose::Assign => {
                    self.add_error(SemanticError::InvalidAssignmentTarget, lhs_node);
                    TypeId::INVALID
                }
                LValPurpose::AddressOf => {
                    let ty = self.analyze_expression(scope, None, lhs_node);
                    if ty.is_invalid() || matches!(self.types.kind(ty), TypeKind::MetaType) {
                        ty
                    } else {
                        self.add_error(SemanticError::InvalidAddressOfTarget, lhs_node);
                        TypeId::INVALID
                    }
                }
            },
        }
    }

    fn analyze_logic_bin_op(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> TypeId {
        let bool_ty = self.types.prim.bool_;
        // Both sides are analyzed even though evaluation short-circuits;
        // short-circuiting is the backend's concern.
        let lhs_type = self.analyze_expression(scope, Some(bool_ty), lhs);
        let rhs_type = self.analyze_expression(scope, Some(bool_ty), rhs);
        if lhs_type.is_invalid() || rhs_type.is_invalid() {
            return TypeId::INVALID;
        }

        let (Some(a), Some(b)) = (
            self.ast.const_val(lhs).as_bool(),
            self.ast.const_val(rhs).as_bool(),
        ) else {
            return bool_ty;
        };
        let answer = match op {
            BinOp::BoolOr => a || b,
            BinOp::BoolAnd => a && b,
            _ => unreachable!(),
        };
        self.ast.set_const(node, ConstValue::bool_value(answer));
        bool_ty
    }

    fn analyze_comparison(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> TypeId {
        let lhs_type = self.analyze_expression(scope, None, lhs);
        let rhs_type = self.analyze_expression(scope, None, rhs);

        let resolved = self.resolve_peer_type_compat(
            scope,
            node,
            &[(Some(lhs), lhs_type), (Some(rhs), rhs_type)],
        );
        if resolved.is_invalid() {
            return TypeId::INVALID;
        }

        let bool_ty = self.types.prim.bool_;
        let lhs_val = self.ast.const_val(lhs).clone();
        let rhs_val = self.ast.const_val(rhs).clone();
        if !lhs_val.ok || !rhs_val.ok {
            return bool_ty;
        }

        let answer = match (&lhs_val.data, &rhs_val.data) {
            (ConstData::Num(a), ConstData::Num(b)) => {
                let ordering = a.compare(b);
                match op {
                    BinOp::CmpEq => ordering.is_eq(),
                    BinOp::CmpNotEq => ordering.is_ne(),
                    BinOp::CmpLessThan => ordering.is_lt(),
                    BinOp::CmpGreaterThan => ordering.is_gt(),
                    BinOp::CmpLessOrEq => ordering.is_le(),
                    BinOp::CmpGreaterOrEq => ordering.is_ge(),
                    _ => unreachable!(),
                }
            }
            (
                ConstData::EnumTag {
                    tag: a,
                    payload: pa,
                },
                ConstData::EnumTag {
                    tag: b,
                    payload: pb,
                },
            ) if matches!(op, BinOp::CmpEq | BinOp::CmpNotEq) => {
                // Tags with payloads are compared at runtime.
                if pa.is_some() || pb.is_some() {
                    return bool_ty;
                }
                let equal = a == b;
                if op == BinOp::CmpEq { equal } else { !equal }
            }
            (ConstData::Bool(a), ConstData::Bool(b))
                if matches!(op, BinOp::CmpEq | BinOp::CmpNotEq) =>
            {
                if op == BinOp::CmpEq { a == b } else { a != b }
            }
            _ => return bool_ty,
        };
        self.ast.set_const(node, ConstValue::bool_value(answer));
        bool_ty
    }

    fn analyze_arith_bin_op(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    ) -> TypeId {
        let lhs_type = self.analyze_expression(scope, expected, lhs);
        let rhs_type = self.analyze_expression(scope, expected, rhs);

        let resolved = self.resolve_peer_type_compat(
            scope,
            node,
            &[(Some(lhs), lhs_type), (Some(rhs), rhs_type)],
        );
        if resolved.is_invalid() {
            return resolved;
        }

        let int_only = matches!(
            op,
            BinOp::BitOr | BinOp::BitXor | BinOp::BitAnd | BinOp::Shl | BinOp::Shr
        );
        let allowed = if int_only {
            self.types.is_int(resolved)
                || matches!(self.types.kind(resolved), TypeKind::NumLitInt)
        } else {
            self.types.is_int(resolved)
                || self.types.is_float(resolved)
                || self.types.is_num_lit(resolved)
        };
        if !allowed {
            self.add_error(
                SemanticError::OperatorNotAllowed {
                    ty: self.type_name(resolved),
                },
                node,
            );
            return TypeId::INVALID;
        }

        let (Some(a), Some(b)) = (
            self.ast.const_val(lhs).as_num().cloned(),
            self.ast.const_val(rhs).as_num().cloned(),
        ) else {
            return resolved;
        };

        // Shifting an n-bit integer by n or more is always a bug.
        if matches!(op, BinOp::Shl | BinOp::Shr)
            && let Some((_, bits)) = self.types.int_info(resolved)
            && b.to_u64().is_some_and(|amount| amount >= bits)
        {
            self.add_error(
                SemanticError::ShiftTooLarge {
                    ty: self.type_name(resolved),
                },
                node,
            );
            return resolved;
        }

        let result = match op {
            BinOp::Add => a.add(&b),
            BinOp::Sub => a.sub(&b),
            BinOp::Mul => a.mul(&b),
            BinOp::Div => a.div(&b),
            BinOp::Mod => a.rem(&b),
            BinOp::BitOr => a.bit_or(&b),
            BinOp::BitAnd => a.bit_and(&b),
            BinOp::BitXor => a.bit_xor(&b),
            BinOp::Shl => a.shl(&b),
            BinOp::Shr => a.shr(&b),
            _ => unreachable!(),
        };
        match result {
            Ok(value) => {
                self.ast.set_const(node, ConstValue::num(value));
                self.num_lit_fits(node, resolved);
            }
            Err(NumError::DivisionByZero) => {
                self.add_error(SemanticError::DivisionByZero, node);
            }
            Err(_) => {
                self.add_error(SemanticError::ValueNotRepresentable, node);
            }
        }
        resolved
    }

    fn analyze_str_cat(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        lhs: NodeId,
        rhs: NodeId,
    ) -> TypeId {
        let str_type = self.types.slice_of(self.types.prim.u8, true);
        let lhs_type = self.analyze_expression(scope, Some(str_type), lhs);
        let rhs_type = self.analyze_expression(scope, Some(str_type), rhs);
        if lhs_type.is_invalid() || rhs_type.is_invalid() {
            return TypeId::INVALID;
        }

        let lhs_val = self.ast.const_val(lhs).clone();
        let rhs_val = self.ast.const_val(rhs).clone();
        let bad_node = if !lhs_val.ok {
            Some(lhs)
        } else if !rhs_val.ok {
            Some(rhs)
        } else {
            None
        };
        if let Some(bad) = bad_node {
            self.add_error(SemanticError::StrCatNotConstant, bad);
            return TypeId::INVALID;
        }

        let (lhs_ptr, lhs_len) = lhs_val.as_string_slice().expect("constant string slice");
        let (rhs_ptr, rhs_len) = rhs_val.as_string_slice().expect("constant string slice");
        let mut backing = Vec::with_capacity((lhs_len + rhs_len) as usize);
        backing.extend(lhs_ptr.iter().take(lhs_len as usize).cloned());
        backing.extend(rhs_ptr.iter().take(rhs_len as usize).cloned());
        let len = lhs_len + rhs_len;
        self.ast.set_const(
            node,
            ConstValue {
                ok: true,
                undef: false,
                data: ConstData::Struct(vec![
                    ConstValue {
                        ok: true,
                        undef: false,
                        data: ConstData::Ptr {
                            backing: std::rc::Rc::new(backing),
                            len,
                        },
                    },
                    ConstValue::int(len),
                ]),
            },
        );
        str_type
    }

    pub(super) fn analyze_unwrap_err_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::UnwrapErrExpr {
            operand,
            err_name,
            fallback,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };

        let lhs_type = self.analyze_expression(scope, None, operand);
        if lhs_type.is_invalid() {
            return lhs_type;
        }
        let Some(child) = self.types.error_union_child(lhs_type) else {
            let found = self.type_name(lhs_type);
            self.add_error(SemanticError::ExpectedErrorType { found }, operand);
            return TypeId::INVALID;
        };

        let fallback_scope = if let Some(err_name) = err_name {
            let child_scope = self.scopes.new_scope(Some(scope), Some(node));
            let pure_error = self.types.prim.pure_error;
            let var = self.add_local_var(child_scope, node, Some(err_name), pure_error, true);
            self.ast.ann_mut(node).resolved_var = Some(var);
            child_scope
        } else {
            scope
        };

        self.analyze_expression(fallback_scope, Some(child), fallback);
        child
    }

    // ========================================================================
    // Prefix operators
    // ========================================================================

    pub(super) fn analyze_prefix_op_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let NodeKind::PrefixOp { op, operand } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        match op {
            PrefixOp::BoolNot => {
                let bool_ty = self.types.prim.bool_;
                let ty = self.analyze_expression(scope, Some(bool_ty), operand);
                if ty.is_invalid() {
                    return bool_ty;
                }
                if let Some(value) = self.ast.const_val(operand).as_bool() {
                    self.ast.set_const(node, ConstValue::bool_value(!value));
                }
                bool_ty
            }
            PrefixOp::BitNot => {
                let ty = self.analyze_expression(scope, expected, operand);
                if ty.is_invalid() {
                    return ty;
                }
                if self.types.is_int(ty) || matches!(self.types.kind(ty), TypeKind::NumLitInt) {
                    ty
                } else {
                    self.add_error(
                        SemanticError::InvalidBinNotType {
                            ty: self.type_name(ty),
                        },
                        operand,
                    );
                    TypeId::INVALID
                }
            }
            PrefixOp::Negate => {
                let ty = self.analyze_expression(scope, expected, operand);
                if ty.is_invalid() {
                    return ty;
                }
                if self.types.is_signed_int(ty)
                    || self.types.is_float(ty)
                    || self.types.is_num_lit(ty)
                {
                    if let Some(value) = self.ast.const_val(operand).as_num().cloned() {
                        self.ast.set_const(node, ConstValue::num(value.negate()));
                    }
                    ty
                } else {
                    self.add_error(
                        SemanticError::InvalidNegationType {
                            ty: self.type_name(ty),
                        },
                        node,
                    );
                    TypeId::INVALID
                }
            }
            PrefixOp::AddressOf | PrefixOp::ConstAddressOf => {
                let is_const = op == PrefixOp::ConstAddressOf;
                let child_type = self.analyze_lvalue(scope, operand, LValPurpose::AddressOf);
                if child_type.is_invalid() {
                    return TypeId::INVALID;
                }
                if matches!(self.types.kind(child_type), TypeKind::MetaType) {
                    // `&T` on a type value names the pointer type.
                    let pointee = self.resolve_type_from_node(operand);
                    if pointee.is_invalid() {
                        return TypeId::INVALID;
                    }
                    if self.types.is_unreachable(pointee) {
                        self.add_error(SemanticError::PointerToUnreachable, node);
                        return TypeId::INVALID;
                    }
                    let ptr = self.types.pointer_to(pointee, is_const);
                    self.ast.set_const(node, ConstValue::ty(ptr));
                    return self.types.prim.metatype;
                }
                if self.types.is_num_lit(child_type) {
                    self.add_error(
                        SemanticError::AddressOfLiteral {
                            ty: self.type_name(child_type),
                        },
                        operand,
                    );
                    return TypeId::INVALID;
                }
                self.types.pointer_to(child_type, is_const)
            }
            PrefixOp::Dereference => {
                let ty = self.analyze_expression(scope, None, operand);
                if ty.is_invalid() {
                    return ty;
                }
                match self.types.pointer_child(ty) {
                    Some((child, _)) => child,
                    None => {
                        self.add_error(
                            SemanticError::DereferenceNonPointer {
                                ty: self.type_name(ty),
                            },
                            operand,
                        );
                        TypeId::INVALID
                    }
                }
            }
            PrefixOp::OptionalWrap => self.analyze_wrap_op(scope, node, operand, true),
            PrefixOp::ErrorWrap => self.analyze_wrap_op(scope, node, operand, false),
            PrefixOp::UnwrapError => {
                let ty = self.analyze_expression(scope, None, operand);
                if ty.is_invalid() {
                    return ty;
                }
                match self.types.error_union_child(ty) {
                    Some(child) => child,
                    None => {
                        let found = self.type_name(ty);
                        self.add_error(SemanticError::ExpectedErrorType { found }, operand);
                        TypeId::INVALID
                    }
                }
            }
        }
    }

    /// `?x` / `%x`: on a type value, builds the optional or error-union
    /// type; on a plain value, wraps it.
    fn analyze_wrap_op(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        operand: NodeId,
        optional: bool,
    ) -> TypeId {
        let wrapper = if optional { "optional" } else { "error" };
        let ty = self.analyze_expression(scope, None, operand);
        if ty.is_invalid() {
            return ty;
        }
        if matches!(self.types.kind(ty), TypeKind::MetaType) {
            let inner = self.resolve_type_from_node(operand);
            if inner.is_invalid() {
                return TypeId::INVALID;
            }
            if self.types.is_unreachable(inner) {
                self.add_error(SemanticError::CannotWrapUnreachable { wrapper }, node);
                return TypeId::INVALID;
            }
            let wrapped = if optional {
                self.types.optional_of(inner)
            } else {
                self.types.error_union_of(inner)
            };
            self.ast.set_const(node, ConstValue::ty(wrapped));
            return self.types.prim.metatype;
        }
        if self.types.is_unreachable(ty) {
            self.add_error(SemanticError::CannotWrapUnreachable { wrapper }, operand);
            return TypeId::INVALID;
        }
        if optional {
            self.types.optional_of(ty)
        } else {
            self.types.error_union_of(ty)
        }
    }

    // ========================================================================
    // Member access, indexing, slicing
    // ========================================================================

    pub(super) fn analyze_field_access_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::FieldAccess { object, field } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        let object_type = self.analyze_expression(scope, None, object);

        // Struct field, through at most one level of pointer.
        if let Some(container) = self.bare_struct_container(object_type) {
            if let Some(field_info) = self.types.find_field(container, field) {
                let field_ty = field_info.ty;
                let index = field_info.src_index;
                self.ast.ann_mut(node).resolved_field = Some(index);
                return field_ty;
            }
            self.add_error(
                SemanticError::NoMemberNamed {
                    field: self.sym_name(field),
                    ty: self.type_name(object_type),
                },
                node,
            );
            return TypeId::INVALID;
        }

        match self.types.kind(object_type).clone() {
            TypeKind::Array { child, .. } => {
                let field_name = self.sym_name(field);
                match field_name.as_str() {
                    "len" => self.types.prim.isize,
                    "ptr" => self.types.pointer_to(child, false),
                    _ => {
                        self.add_error(
                            SemanticError::NoMemberNamed {
                                field: field_name,
                                ty: self.type_name(object_type),
                            },
                            node,
                        );
                        TypeId::INVALID
                    }
                }
            }
            TypeKind::Slice { child, is_const } => {
                let field_name = self.sym_name(field);
                match field_name.as_str() {
                    "len" => self.types.prim.isize,
                    "ptr" => self.types.pointer_to(child, is_const),
                    _ => {
                        self.add_error(
                            SemanticError::NoMemberNamed {
                                field: field_name,
                                ty: self.type_name(object_type),
                            },
                            node,
                        );
                        TypeId::INVALID
                    }
                }
            }
            TypeKind::MetaType => {
                let target = self.resolve_type_from_node(object);
                if target.is_invalid() {
                    return TypeId::INVALID;
                }
                match self.types.kind(target) {
                    TypeKind::Enum(_) => {
                        self.analyze_enum_value_expr(scope, node, None, target, field)
                    }
                    TypeKind::PureError => self.analyze_error_literal(node, field),
                    _ => {
                        self.add_error(
                            SemanticError::FieldAccessNotSupported {
                                ty: self.type_name(target),
                            },
                            node,
                        );
                        TypeId::INVALID
                    }
                }
            }
            TypeKind::Invalid => TypeId::INVALID,
            _ => {
                self.add_error(
                    SemanticError::FieldAccessNotSupported {
                        ty: self.type_name(object_type),
                    },
                    node,
                );
                TypeId::INVALID
            }
        }
    }

    /// The struct container behind a value, dereferencing a pointer exactly
    /// once for method-call and field-access ergonomics.
    pub(super) fn bare_struct_container(
        &self,
        ty: TypeId,
    ) -> Option<crate::sema::types::ContainerId> {
        let bare = match self.types.pointer_child(ty) {
            Some((child, _)) => child,
            None => ty,
        };
        match self.types.kind(bare) {
            TypeKind::Struct(c) => Some(*c),
            _ => None,
        }
    }

    /// `EnumType.Variant` and `EnumType.Variant(payload)`.
    pub(super) fn analyze_enum_value_expr(
        &mut self,
        scope: ScopeId,
        field_access_node: NodeId,
        value_node: Option<NodeId>,
        enum_type: TypeId,
        field: Symbol,
    ) -> TypeId {
        let container = self
            .types
            .container_of(enum_type)
            .expect("enum type has a container");
        let Some(variant) = self.types.find_field(container, field).cloned() else {
            self.add_error(
                SemanticError::NoMemberNamed {
                    field: self.sym_name(field),
                    ty: self.type_name(enum_type),
                },
                field_access_node,
            );
            return enum_type;
        };

        self.ast.ann_mut(field_access_node).resolved_field = Some(variant.src_index);
        if let Some(value_node) = value_node {
            self.analyze_expression(scope, Some(variant.ty), value_node);
            // The constructed enum needs stack storage.
            self.scopes
                .get_mut(scope)
                .stack_value_nodes
                .push(field_access_node);
        } else if !matches!(self.types.kind(variant.ty), TypeKind::Void) {
            self.add_error(
                SemanticError::EnumValueRequiresParam {
                    enum_name: self.type_name(enum_type),
                    field: self.sym_name(field),
                    ty: self.type_name(variant.ty),
                },
                field_access_node,
            );
        } else {
            self.ast.set_const(
                field_access_node,
                ConstValue {
                    ok: true,
                    undef: false,
                    data: ConstData::EnumTag {
                        tag: variant.src_index as u64,
                        payload: None,
                    },
                },
            );
        }
        enum_type
    }

    /// `error.Name`.
    fn analyze_error_literal(&mut self, node: NodeId, err_name: Symbol) -> TypeId {
        let file = self.ast.owner(node);
        let file_scope = self.entities.file(file).scope;
        if let Some(err_id) = self.scopes.lookup_error(file_scope, err_name) {
            self.ast.ann_mut(node).resolved_error = Some(err_id);
            self.ast.set_const(node, ConstValue::pure_error(err_id));
            return self.types.prim.pure_error;
        }
        self.add_error(
            SemanticError::UndeclaredErrorValue {
                name: self.sym_name(err_name),
            },
            node,
        );
        let void = self.types.prim.void;
        self.types.error_union_of(void)
    }

    pub(super) fn analyze_array_access_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::ArrayAccess { array, index } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        let array_type = self.analyze_expression(scope, None, array);

        let return_type = if array_type.is_invalid() {
            TypeId::INVALID
        } else if let Some((child, _)) = self.types.array_info(array_type) {
            child
        } else if let Some((child, _)) = self.types.pointer_child(array_type) {
            child
        } else if let Some((child, _)) = self.types.slice_child(array_type) {
            child
        } else {
            self.add_error(
                SemanticError::ArrayAccessOfNonArray {
                    ty: self.type_name(array_type),
                },
                node,
            );
            TypeId::INVALID
        };

        let isize_ty = self.types.prim.isize;
        self.analyze_expression(scope, Some(isize_ty), index);
        return_type
    }

    pub(super) fn analyze_slice_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::SliceExpr {
            array,
            start,
            end,
            is_const,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };
        let array_type = self.analyze_expression(scope, None, array);

        let return_type = if array_type.is_invalid() {
            TypeId::INVALID
        } else if let Some((child, _)) = self.types.array_info(array_type) {
            self.types.slice_of(child, is_const)
        } else if let Some((child, _)) = self.types.pointer_child(array_type) {
            self.types.slice_of(child, is_const)
        } else if let Some((child, _)) = self.types.slice_child(array_type) {
            self.types.slice_of(child, is_const)
        } else {
            self.add_error(
                SemanticError::SliceOfNonArray {
                    ty: self.type_name(array_type),
                },
                node,
            );
            TypeId::INVALID
        };

        if !return_type.is_invalid() {
            // The slice header lives on the stack.
            self.scopes.get_mut(scope).stack_value_nodes.push(node);
        }

        let isize_ty = self.types.prim.isize;
        self.analyze_expression(scope, Some(isize_ty), start);
        if let Some(end) = end {
            self.analyze_expression(scope, Some(isize_ty), end);
        }
        return_type
    }

    // ========================================================================
    // Aggregate literals and array types
    // ========================================================================

    pub(super) fn analyze_container_init_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::ContainerInit {
            type_expr,
            kind,
            entries,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };

        let container_type = self.analyze_type_expr(scope, type_expr);
        if container_type.is_invalid() {
            return container_type;
        }

        let syntax = match kind {
            crate::ast::InitKind::Struct => "struct",
            crate::ast::InitKind::Array => "array",
        };

        match self.types.kind(container_type).clone() {
            TypeKind::Struct(container) if kind == crate::ast::InitKind::Struct => {
                self.scopes.get_mut(scope).stack_value_nodes.push(node);

                let field_count = self.types.container(container).fields.len();
                let mut field_use_counts = vec![0u32; field_count];
                let mut const_fields = vec![ConstValue::unknown(); field_count];
                let mut all_const = true;

                for entry in entries {
                    let NodeKind::FieldInit { name, value } = self.ast.node(entry).kind.clone()
                    else {
                        continue;
                    };
                    self.ast.ann_mut(entry).scope = Some(scope);

                    let Some(field) = self.types.find_field(container, name).cloned() else {
                        self.add_error(
                            SemanticError::NoMemberNamed {
                                field: self.sym_name(name),
                                ty: self.type_name(container_type),
                            },
                            entry,
                        );
                        continue;
                    };

                    let index = field.src_index as usize;
                    field_use_counts[index] += 1;
                    if field_use_counts[index] > 1 {
                        self.add_error(SemanticError::DuplicateField, entry);
                        continue;
                    }
                    self.ast.ann_mut(entry).resolved_field = Some(field.src_index);

                    self.analyze_expression(scope, Some(field.ty), value);
                    let value_const = self.ast.const_val(value).clone();
                    if value_const.ok {
                        const_fields[index] = value_const;
                    } else {
                        all_const = false;
                    }
                }

                for (index, &uses) in field_use_counts.iter().enumerate() {
                    if uses == 0 {
                        let name = self.types.container(container).fields[index].name;
                        self.add_error(
                            SemanticError::MissingField {
                                name: self.sym_name(name),
                            },
                            node,
                        );
                        all_const = false;
                    }
                }

                if all_const {
                    self.ast.set_const(
                        node,
                        ConstValue {
                            ok: true,
                            undef: false,
                            data: ConstData::Struct(const_fields),
                        },
                    );
                }
                container_type
            }
            TypeKind::Slice { child, .. } if kind == crate::ast::InitKind::Array => {
                let elem_count = entries.len() as u64;
                let mut const_elems = Vec::with_capacity(entries.len());
                let mut all_const = true;

                for entry in entries {
                    self.analyze_expression(scope, Some(child), entry);
                    let elem_const = self.ast.const_val(entry).clone();
                    if elem_const.ok {
                        const_elems.push(elem_const);
                    } else {
                        all_const = false;
                    }
                }

                if all_const {
                    self.ast.set_const(
                        node,
                        ConstValue {
                            ok: true,
                            undef: false,
                            data: ConstData::Array(std::rc::Rc::new(const_elems)),
                        },
                    );
                }

                self.scopes.get_mut(scope).stack_value_nodes.push(node);
                self.types.array_of(child, elem_count)
            }
            TypeKind::Void => {
                if entries.is_empty() {
                    self.ast.set_const(node, ConstValue::void());
                    self.types.prim.void
                } else {
                    self.add_error(SemanticError::VoidExpectsNoArguments, node);
                    TypeId::INVALID
                }
            }
            TypeKind::Unreachable => {
                if entries.is_empty() {
                    container_type
                } else {
                    self.add_error(SemanticError::UnreachableExpectsNoArguments, node);
                    TypeId::INVALID
                }
            }
            _ => {
                self.add_error(
                    SemanticError::InitSyntaxNotSupported {
                        ty: self.type_name(container_type),
                        syntax,
                    },
                    node,
                );
                TypeId::INVALID
            }
        }
    }

    pub(super) fn analyze_array_type_expr(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::ArrayType {
            size,
            child,
            is_const,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };

        let child_type = self.analyze_type_expr(scope, child);
        if self.types.is_unreachable(child_type) {
            self.add_error(SemanticError::ArrayOfUnreachable, node);
            return TypeId::INVALID;
        }
        if child_type.is_invalid() {
            return TypeId::INVALID;
        }

        if let Some(size) = size {
            let isize_ty = self.types.prim.isize;
            let size_type = self.analyze_expression(scope, Some(isize_ty), size);
            if size_type.is_invalid() {
                return TypeId::INVALID;
            }
            if let Some(len) = self.ast.const_val(size).as_num().cloned() {
                if len.is_negative() {
                    self.add_error(
                        SemanticError::NegativeArraySize {
                            size: len.to_string(),
                        },
                        size,
                    );
                    return TypeId::INVALID;
                }
                let array = self
                    .types
                    .array_of(child_type, len.to_u64().expect("non-negative length"));
                self.ast.set_const(node, ConstValue::ty(array));
                return self.types.prim.metatype;
            }
        }
        let slice = self.types.slice_of(child_type, is_const);
        self.ast.set_const(node, ConstValue::ty(slice));
        self.types.prim.metatype
    }
}
