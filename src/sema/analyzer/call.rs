// src/sema/analyzer/call.rs
//
// Call analysis. A call expression is one of: an explicit cast (callee is a
// type), a builtin call, a method call through a container's method table,
// an ordinary function call, or a call through a function pointer.

use crate::ast::{NodeId, NodeKind};
use crate::errors::SemanticError;
use crate::sema::compilation::Compilation;
use crate::sema::entities::FnId;
use crate::sema::scope::ScopeId;
use crate::sema::types::{TypeId, TypeKind};

impl Compilation {
    pub(super) fn analyze_fn_call_expr(
        &mut self,
        scope: ScopeId,
        expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let NodeKind::Call {
            callee,
            args,
            is_builtin,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };

        if is_builtin {
            return self.analyze_builtin_call(scope, expected, node);
        }

        // Method-style call: the callee is a field access.
        if let NodeKind::FieldAccess { object, field } = self.ast.node(callee).kind.clone() {
            self.ast.ann_mut(callee).scope = Some(scope);
            let object_type = self.analyze_expression(scope, None, object);

            if let Some(container) = self.bare_struct_container(object_type) {
                let method = self.types.container(container).methods.get(&field).copied();
                return match method {
                    Some(fn_id) => {
                        self.ast.ann_mut(callee).resolved_fn = Some(fn_id);
                        self.analyze_fn_call_raw(scope, node, fn_id, true, &args)
                    }
                    None => {
                        self.add_error(
                            SemanticError::NoFunctionNamed {
                                name: self.sym_name(field),
                                ty: self.type_name(object_type),
                            },
                            callee,
                        );
                        // Still analyze the arguments, without expectations.
                        for arg in args {
                            self.analyze_expression(scope, None, arg);
                        }
                        TypeId::INVALID
                    }
                };
            }
            if object_type.is_invalid() {
                return object_type;
            }
            if matches!(self.types.kind(object_type), TypeKind::MetaType) {
                let target = self.resolve_type_from_node(object);
                if target.is_invalid() {
                    return TypeId::INVALID;
                }
                if matches!(self.types.kind(target), TypeKind::Enum(_)) {
                    if args.len() > 1 {
                        let report = self.first_executing_node(args[1]);
                        self.add_error(SemanticError::EnumValueParamCount, report);
                        return target;
                    }
                    return self.analyze_enum_value_expr(
                        scope,
                        callee,
                        args.first().copied(),
                        target,
                        field,
                    );
                }
                self.add_error(SemanticError::MemberRefBaseNotContainer, object);
                return TypeId::INVALID;
            }
            self.add_error(SemanticError::MemberRefBaseNotContainer, object);
            return TypeId::INVALID;
        }

        let invoke_type = self.analyze_expression(scope, None, callee);
        if invoke_type.is_invalid() {
            return TypeId::INVALID;
        }

        // A constant callee is either a type (cast) or a known function.
        let callee_const = self.ast.const_val(callee).clone();
        if callee_const.ok {
            if matches!(self.types.kind(invoke_type), TypeKind::MetaType) {
                return self.analyze_cast_call(scope, node);
            }
            if let Some(fn_id) = callee_const.as_fn() {
                return self.analyze_fn_call_raw(scope, node, fn_id, false, &args);
            }
            self.add_error(
                SemanticError::NotAFunction {
                    ty: self.type_name(invoke_type),
                },
                callee,
            );
            return TypeId::INVALID;
        }

        // Function pointer.
        match self.types.fn_sig(invoke_type) {
            Some(sig) => {
                let return_type = sig.return_type;
                for (i, arg) in args.iter().enumerate() {
                    let expected_param = self
                        .types
                        .fn_sig(invoke_type)
                        .and_then(|sig| sig.params.get(i).copied())
                        .filter(|t| !t.is_invalid());
                    self.analyze_expression(scope, expected_param, *arg);
                }
                return_type
            }
            None => {
                self.add_error(
                    SemanticError::NotAFunction {
                        ty: self.type_name(invoke_type),
                    },
                    callee,
                );
                TypeId::INVALID
            }
        }
    }

    /// Analyze a call to a known function. For a method call the object
    /// expression is already analyzed and becomes the implicit first
    /// argument.
    fn analyze_fn_call_raw(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        fn_id: FnId,
        has_self: bool,
        args: &[NodeId],
    ) -> TypeId {
        self.ast.ann_mut(node).resolved_fn = Some(fn_id);
        let fn_ty = self.entities.func(fn_id).ty;
        let Some(sig) = self.types.fn_sig(fn_ty).cloned() else {
            // The prototype failed to resolve; arguments still get a pass.
            for arg in args {
                self.analyze_expression(scope, None, *arg);
            }
            return TypeId::INVALID;
        };

        let self_offset = has_self as usize;
        let expected_count = sig.params.len();
        let actual_count = args.len() + self_offset;
        if sig.is_var_args {
            if actual_count < expected_count {
                self.add_error(
                    SemanticError::WrongArgCountAtLeast {
                        expected: expected_count,
                        found: actual_count,
                    },
                    node,
                );
            }
        } else if expected_count != actual_count {
            self.add_error(
                SemanticError::WrongArgCount {
                    expected: expected_count,
                    found: actual_count,
                },
                node,
            );
        }

        for (i, arg) in args.iter().enumerate() {
            let expected_param = sig
                .params
                .get(i + self_offset)
                .copied()
                .filter(|t| !t.is_invalid());
            self.analyze_expression(scope, expected_param, *arg);
        }

        let return_type = sig.return_type;
        if return_type.is_invalid() {
            return return_type;
        }
        if self.types.handle_is_ptr(return_type) {
            // The aggregate return value needs stack storage at the call
            // site.
            self.scopes.get_mut(scope).stack_value_nodes.push(node);
        }
        return_type
    }
}
