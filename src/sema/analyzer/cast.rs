// src/sema/analyzer/cast.rs
//
// Coercion and cast classification. Implicit coercions are reconciled in
// `resolve_type_compat`, which rewrites the node into a synthetic cast when
// one is needed. Explicit casts (a call whose callee is a type) select
// exactly one CastKind from the fixed set; the backend never re-decides.

use crate::ast::{CastKind, NodeId, NodeKind};
use crate::errors::SemanticError;
use crate::sema::compilation::Compilation;
use crate::sema::number::BigNum;
use crate::sema::scope::ScopeId;
use crate::sema::types::{TypeId, TypeKind};
use crate::sema::value::{ConstData, ConstValue};

impl Compilation {
    /// Exact type match, allowing non-const to const through any level of
    /// pointer, slice, optional and error-union nesting.
    pub(crate) fn types_match_const_only(&self, expected: TypeId, actual: TypeId) -> bool {
        if expected == actual {
            return true;
        }
        match (self.types.kind(expected), self.types.kind(actual)) {
            (
                TypeKind::Pointer {
                    child: exp_child,
                    is_const: exp_const,
                },
                TypeKind::Pointer {
                    child: act_child,
                    is_const: act_const,
                },
            ) if !*act_const || *exp_const => self.types_match_const_only(*exp_child, *act_child),
            (
                TypeKind::Slice {
                    child: exp_child,
                    is_const: exp_const,
                },
                TypeKind::Slice {
                    child: act_child,
                    is_const: act_const,
                },
            ) if !*act_const || *exp_const => self.types_match_const_only(*exp_child, *act_child),
            (
                TypeKind::Optional { child: exp_child },
                TypeKind::Optional { child: act_child },
            ) => self.types_match_const_only(*exp_child, *act_child),
            (
                TypeKind::ErrorUnion { child: exp_child },
                TypeKind::ErrorUnion { child: act_child },
            ) => self.types_match_const_only(*exp_child, *act_child),
            _ => false,
        }
    }

    /// Whether the numeric literal held by `literal_node` fits `other_type`.
    /// Emits the out-of-range diagnostic itself when it does not.
    pub(crate) fn num_lit_fits(&mut self, literal_node: NodeId, other_type: TypeId) -> bool {
        if other_type.is_invalid() {
            return false;
        }
        let num = self
            .ast
            .const_val(literal_node)
            .as_num()
            .cloned()
            .expect("numeric literal without constant value");
        match self.types.kind(other_type) {
            TypeKind::Float { .. } => return true,
            TypeKind::Int { signed, bits, .. } if num.is_int() => {
                if num.fits_in_bits(*bits, *signed) {
                    return true;
                }
            }
            TypeKind::NumLitFloat if num.is_float() => return true,
            TypeKind::NumLitInt if num.is_int() => return true,
            _ => {}
        }

        let kind = if num.is_float() { "float" } else { "integer" };
        let ty = self.type_name(other_type);
        self.add_error(
            SemanticError::NumLitNotCastable {
                kind,
                value: num.to_string(),
                ty,
            },
            literal_node,
        );
        false
    }

    /// The full implicit-coercion relation. Sets `reported` when a failure
    /// already produced its own diagnostic.
    fn types_match_with_implicit_cast(
        &mut self,
        expected: TypeId,
        actual: TypeId,
        literal_node: NodeId,
        reported: &mut bool,
    ) -> bool {
        if self.types_match_const_only(expected, actual) {
            return true;
        }

        // Non-optional T to optional T.
        if let Some(child) = self.types.optional_child(expected) {
            if self.types_match_const_only(child, actual) {
                return true;
            }
            if self.types.is_num_lit(actual) {
                if self.num_lit_fits(literal_node, child) {
                    return true;
                }
                *reported = true;
                return false;
            }
        }

        // T to error-union T, and pure error to any error union.
        if let Some(child) = self.types.error_union_child(expected) {
            if matches!(self.types.kind(actual), TypeKind::PureError) {
                return true;
            }
            if self.types_match_const_only(child, actual) {
                return true;
            }
            if self.types.is_num_lit(actual) {
                if self.num_lit_fits(literal_node, child) {
                    return true;
                }
                *reported = true;
                return false;
            }
        }

        // Integer widening of matching signedness.
        if let (Some((exp_signed, exp_bits)), Some((act_signed, act_bits))) = (
            self.types.int_info(expected),
            self.types.int_info(actual),
        ) && exp_signed == act_signed
            && exp_bits >= act_bits
        {
            return true;
        }

        // Fixed-size array to slice of the same child.
        if let (Some((slice_child, _)), Some((array_child, _))) = (
            self.types.slice_child(expected),
            self.types.array_info(actual),
        ) && self.types_match_const_only(slice_child, array_child)
        {
            return true;
        }

        // Numeric literal to any numeric type it fits in.
        if self.types.is_num_lit(actual) {
            if self.num_lit_fits(literal_node, expected) {
                return true;
            }
            *reported = true;
        }

        false
    }

    /// Reconcile a node's type with the expected type, inserting an implicit
    /// cast when the coercion is legal.
    pub(crate) fn resolve_type_compat(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        expected: Option<TypeId>,
        actual: TypeId,
    ) -> TypeId {
        let Some(expected) = expected else {
            // Anything will do.
            return actual;
        };
        if expected == actual {
            return expected;
        }
        if expected.is_invalid() || actual.is_invalid() {
            return TypeId::INVALID;
        }
        if self.types.is_unreachable(actual) {
            return actual;
        }

        let mut reported = false;
        if self.types_match_with_implicit_cast(expected, actual, node, &mut reported) {
            return self.insert_implicit_cast(scope, expected, node);
        }

        if !reported {
            let report = self.first_executing_node(node);
            self.add_error(
                SemanticError::TypeMismatch {
                    expected: self.type_name(expected),
                    found: self.type_name(actual),
                },
                report,
            );
        }
        TypeId::INVALID
    }

    /// Rewrite `node` into a cast to `wanted` around its current content.
    fn insert_implicit_cast(&mut self, scope: ScopeId, wanted: TypeId, node: NodeId) -> TypeId {
        let inner = self.ast.wrap_in_cast(node, wanted);
        let actual = self.ast.ty(inner).expect("coerced node was analyzed");
        let Ok(kind) = self.classify_cast(scope, wanted, actual, inner) else {
            unreachable!("implicit coercion admitted an unclassifiable cast");
        };
        self.ast.ann_mut(node).cast_kind = Some(kind);
        self.ast.set_type(node, wanted);
        self.ast.ann_mut(node).scope = Some(scope);
        self.eval_const_cast(node, kind, inner);
        wanted
    }

    /// Explicit cast `T(expr)`: the call's callee resolved to a type.
    pub(crate) fn analyze_cast_call(&mut self, scope: ScopeId, node: NodeId) -> TypeId {
        let NodeKind::Call { callee, args, .. } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        if args.len() != 1 {
            self.add_error(SemanticError::CastArgCount, callee);
            return TypeId::INVALID;
        }
        let operand = args[0];

        let wanted = self.resolve_type_from_node(callee);
        let actual = self.analyze_expression(scope, None, operand);
        if wanted.is_invalid() || actual.is_invalid() {
            return TypeId::INVALID;
        }

        match self.classify_cast(scope, wanted, actual, operand) {
            Ok(kind) => {
                self.ast.ann_mut(node).cast_kind = Some(kind);
                self.eval_const_cast(node, kind, operand);
                wanted
            }
            Err(reported) => {
                if !reported {
                    self.add_error(
                        SemanticError::InvalidCast {
                            from: self.type_name(actual),
                            to: self.type_name(wanted),
                        },
                        node,
                    );
                }
                TypeId::INVALID
            }
        }
    }

    /// Select the cast kind for `actual` -> `wanted`, in fixed priority
    /// order. `Err(true)` means a diagnostic was already emitted; the caller
    /// reports "invalid cast" on `Err(false)`.
    fn classify_cast(
        &mut self,
        scope: ScopeId,
        wanted: TypeId,
        actual: TypeId,
        expr_node: NodeId,
    ) -> Result<CastKind, bool> {
        // Explicit match or non-const to const.
        if self.types_match_const_only(wanted, actual) {
            return Ok(CastKind::Noop);
        }

        let wanted_pointer_sized_int = matches!(
            self.types.kind(wanted),
            TypeKind::Int {
                pointer_sized: true,
                ..
            }
        );
        let actual_pointer_sized_int = matches!(
            self.types.kind(actual),
            TypeKind::Int {
                pointer_sized: true,
                ..
            }
        );

        // Pointer to isize or usize.
        if wanted_pointer_sized_int && self.types.pointer_child(actual).is_some() {
            return Ok(CastKind::PtrToInt);
        }

        // isize or usize to pointer.
        if self.types.pointer_child(wanted).is_some() && actual_pointer_sized_int {
            return Ok(CastKind::IntToPtr);
        }

        // Any integer to any other integer.
        if self.types.is_int(wanted) && self.types.is_int(actual) {
            return Ok(CastKind::IntWidenOrShorten);
        }

        // Fixed-size array to slice.
        if let (Some((slice_child, _)), Some((array_child, _))) = (
            self.types.slice_child(wanted),
            self.types.array_info(actual),
        ) && self.types_match_const_only(slice_child, array_child)
        {
            self.scopes.get_mut(scope).stack_cast_nodes.push(expr_node);
            return Ok(CastKind::ArrayToSlice);
        }

        // Pointer reinterpretation.
        if self.types.pointer_child(wanted).is_some() && self.types.pointer_child(actual).is_some()
        {
            return Ok(CastKind::PointerReinterpret);
        }

        // Child of optional to optional, also from a fitting literal.
        if let Some(child) = self.types.optional_child(wanted) {
            if self.types_match_const_only(child, actual) {
                self.scopes.get_mut(scope).stack_cast_nodes.push(expr_node);
                return Ok(CastKind::OptionalWrap);
            }
            if self.types.is_num_lit(actual) {
                if self.num_lit_fits(expr_node, child) {
                    self.scopes.get_mut(scope).stack_cast_nodes.push(expr_node);
                    return Ok(CastKind::OptionalWrap);
                }
                return Err(true);
            }
        }

        // Child of error union to error union, also from a fitting literal.
        if let Some(child) = self.types.error_union_child(wanted) {
            if self.types_match_const_only(child, actual) {
                self.scopes.get_mut(scope).stack_cast_nodes.push(expr_node);
                return Ok(CastKind::ErrorWrap);
            }
            if self.types.is_num_lit(actual) {
                if self.num_lit_fits(expr_node, child) {
                    self.scopes.get_mut(scope).stack_cast_nodes.push(expr_node);
                    return Ok(CastKind::ErrorWrap);
                }
                return Err(true);
            }
        }

        // Pure error to error union.
        if self.types.error_union_child(wanted).is_some()
            && matches!(self.types.kind(actual), TypeKind::PureError)
        {
            return Ok(CastKind::PureErrorWrap);
        }

        // Number literal to any other type it fits in.
        if self.types.is_num_lit(actual) {
            return if self.num_lit_fits(expr_node, wanted) {
                Ok(CastKind::Noop)
            } else {
                Err(true)
            };
        }

        // A payload-free error channel to an integer wide enough for every
        // declared error value.
        let actual_is_void_err = self
            .types
            .error_union_child(actual)
            .is_some_and(|child| self.types.size_bits(child) == 0);
        let actual_is_pure_err = matches!(self.types.kind(actual), TypeKind::PureError);
        if (actual_is_void_err || actual_is_pure_err) && self.types.is_int(wanted) {
            let (signed, bits) = self.types.int_info(wanted).expect("integer type");
            let count = BigNum::from_u64(self.error_value_count as u64);
            if count.fits_in_bits(bits, signed) {
                return Ok(CastKind::ErrToInt);
            }
            let ty = self.type_name(wanted);
            self.add_error(SemanticError::TooManyErrorValues { ty }, expr_node);
            return Err(true);
        }

        Err(false)
    }

    /// Propagate a constant value through a classified cast.
    fn eval_const_cast(&mut self, node: NodeId, kind: CastKind, inner: NodeId) {
        let other = self.ast.const_val(inner).clone();
        if !other.ok {
            return;
        }
        match kind {
            CastKind::Noop | CastKind::IntWidenOrShorten | CastKind::PointerReinterpret => {
                self.ast.set_const(node, other);
            }
            // Not computable at analysis time.
            CastKind::PtrToInt | CastKind::IntToPtr => {}
            CastKind::ArrayToSlice => {
                let Some((_, len)) = self
                    .ast
                    .ty(inner)
                    .and_then(|ty| self.types.array_info(ty))
                else {
                    return;
                };
                let ConstData::Array(backing) = other.data else {
                    return;
                };
                self.ast.set_const(
                    node,
                    ConstValue {
                        ok: true,
                        undef: false,
                        data: ConstData::Struct(vec![
                            ConstValue {
                                ok: true,
                                undef: false,
                                data: ConstData::Ptr { backing, len },
                            },
                            ConstValue::int(len),
                        ]),
                    },
                );
            }
            CastKind::OptionalWrap => {
                self.ast.set_const(
                    node,
                    ConstValue {
                        ok: true,
                        undef: false,
                        data: ConstData::Optional(Some(Box::new(other))),
                    },
                );
            }
            CastKind::ErrorWrap => {
                self.ast.set_const(
                    node,
                    ConstValue {
                        ok: true,
                        undef: false,
                        data: ConstData::ErrUnion {
                            err: None,
                            payload: Some(Box::new(other)),
                        },
                    },
                );
            }
            CastKind::PureErrorWrap => {
                let ConstData::PureError(err) = other.data else {
                    return;
                };
                self.ast.set_const(
                    node,
                    ConstValue {
                        ok: true,
                        undef: false,
                        data: ConstData::ErrUnion {
                            err: Some(err),
                            payload: None,
                        },
                    },
                );
            }
            CastKind::ErrToInt => {
                let value = match other.data {
                    ConstData::PureError(err) => self.entities.error_value(err).value as u64,
                    ConstData::ErrUnion { err, .. } => err
                        .map(|e| self.entities.error_value(e).value as u64)
                        .unwrap_or(0),
                    _ => return,
                };
                self.ast.set_const(node, ConstValue::int(value));
            }
        }
    }

    // ========================================================================
    // Peer-type unification
    // ========================================================================

    /// Compute the common type of sibling expressions (branches of `if`,
    /// prongs of `switch`, binary operands). Commutative over its inputs.
    fn determine_peer_type(
        &mut self,
        parent_node: NodeId,
        peers: &[(Option<NodeId>, TypeId)],
    ) -> TypeId {
        assert!(!peers.is_empty());
        let (mut prev_node, mut prev_type) = peers[0];
        if prev_type.is_invalid() {
            return prev_type;
        }
        for &(cur_node, cur_type) in &peers[1..] {
            if cur_type.is_invalid() {
                return cur_type;
            }
            if self.types_match_const_only(prev_type, cur_type) {
                continue;
            }
            if self.types_match_const_only(cur_type, prev_type) {
                prev_type = cur_type;
                prev_node = cur_node;
                continue;
            }
            // Unreachable is absorbed by any peer.
            if self.types.is_unreachable(prev_type) {
                prev_type = cur_type;
                prev_node = cur_node;
                continue;
            }
            if self.types.is_unreachable(cur_type) {
                continue;
            }
            if let (Some((prev_signed, prev_bits)), Some((cur_signed, cur_bits))) = (
                self.types.int_info(prev_type),
                self.types.int_info(cur_type),
            ) && prev_signed == cur_signed
            {
                if cur_bits > prev_bits {
                    prev_type = cur_type;
                    prev_node = cur_node;
                }
                continue;
            }
            if let (
                TypeKind::Float { bits: prev_bits },
                TypeKind::Float { bits: cur_bits },
            ) = (self.types.kind(prev_type), self.types.kind(cur_type))
            {
                if cur_bits > prev_bits {
                    prev_type = cur_type;
                    prev_node = cur_node;
                }
                continue;
            }
            if let Some(child) = self.types.error_union_child(prev_type)
                && self.types_match_const_only(child, cur_type)
            {
                continue;
            }
            if let Some(child) = self.types.error_union_child(cur_type)
                && self.types_match_const_only(child, prev_type)
            {
                prev_type = cur_type;
                prev_node = cur_node;
                continue;
            }
            if self.types.is_num_lit(prev_type) {
                let literal = prev_node.expect("numeric literal peer has a node");
                if self.num_lit_fits(literal, cur_type) {
                    prev_type = cur_type;
                    prev_node = cur_node;
                    continue;
                }
                return TypeId::INVALID;
            }
            if self.types.is_num_lit(cur_type) {
                let literal = cur_node.expect("numeric literal peer has a node");
                if self.num_lit_fits(literal, prev_type) {
                    continue;
                }
                return TypeId::INVALID;
            }

            self.add_error(
                SemanticError::IncompatibleTypes {
                    left: self.type_name(prev_type),
                    right: self.type_name(cur_type),
                },
                parent_node,
            );
            return TypeId::INVALID;
        }
        prev_type
    }

    /// Unify the peers and coerce each of them to the common type.
    pub(crate) fn resolve_peer_type_compat(
        &mut self,
        scope: ScopeId,
        parent_node: NodeId,
        peers: &[(Option<NodeId>, TypeId)],
    ) -> TypeId {
        let peer_type = self.determine_peer_type(parent_node, peers);
        if peer_type.is_invalid() {
            return peer_type;
        }
        for &(node, ty) in peers {
            let Some(node) = node else {
                continue;
            };
            self.resolve_type_compat(scope, node, Some(peer_type), ty);
        }
        peer_type
    }
}
