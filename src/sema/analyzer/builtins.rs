// src/sema/analyzer/builtins.rs
//
// Builtin function calls. Every builtin has a fixed arity; most operate on
// a type argument and produce a compile-time constant.

use crate::ast::{NodeId, NodeKind};
use crate::errors::SemanticError;
use crate::sema::compilation::{BuiltinFnId, Compilation};
use crate::sema::number::BigNum;
use crate::sema::scope::ScopeId;
use crate::sema::types::{TypeId, TypeKind};
use crate::sema::value::ConstValue;

impl Compilation {
    pub(super) fn analyze_builtin_call(
        &mut self,
        scope: ScopeId,
        _expected: Option<TypeId>,
        node: NodeId,
    ) -> TypeId {
        let NodeKind::Call { callee, args, .. } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        let NodeKind::Symbol { name, .. } = self.ast.node(callee).kind else {
            self.add_error(
                SemanticError::InvalidBuiltin {
                    name: "<expression>".to_string(),
                },
                node,
            );
            return TypeId::INVALID;
        };

        let Some(builtin) = self.builtin_fns.get(&name).copied() else {
            self.add_error(
                SemanticError::InvalidBuiltin {
                    name: self.sym_name(name),
                },
                node,
            );
            return TypeId::INVALID;
        };

        if builtin.param_count != args.len() {
            self.add_error(
                SemanticError::WrongArgCount {
                    expected: builtin.param_count,
                    found: args.len(),
                },
                node,
            );
            return TypeId::INVALID;
        }

        match builtin.id {
            BuiltinFnId::AddWithOverflow
            | BuiltinFnId::SubWithOverflow
            | BuiltinFnId::MulWithOverflow => self.analyze_overflow_builtin(scope, node, &args),
            BuiltinFnId::Memcpy => self.analyze_memcpy(scope, &args),
            BuiltinFnId::Memset => self.analyze_memset(scope, &args),
            BuiltinFnId::Sizeof => {
                let type_entry = self.analyze_type_expr(scope, args[0]);
                if type_entry.is_invalid() {
                    return TypeId::INVALID;
                }
                if self.types.is_unreachable(type_entry) {
                    let report = self.first_executing_node(args[0]);
                    self.add_error(
                        SemanticError::NoSizeAvailable {
                            ty: self.type_name(type_entry),
                        },
                        report,
                    );
                    return TypeId::INVALID;
                }
                let size_bytes = self.types.size_bits(type_entry) / 8;
                self.ast.set_const(node, ConstValue::int(size_bytes));
                self.types.prim.num_lit_int
            }
            BuiltinFnId::MaxValue => self.analyze_min_max_value(scope, node, args[0], true),
            BuiltinFnId::MinValue => self.analyze_min_max_value(scope, node, args[0], false),
            BuiltinFnId::MemberCount => {
                let type_entry = self.analyze_type_expr(scope, args[0]);
                if type_entry.is_invalid() {
                    return type_entry;
                }
                if let TypeKind::Enum(container) = self.types.kind(type_entry) {
                    let count = self.types.container(*container).fields.len() as u64;
                    self.ast.set_const(node, ConstValue::int(count));
                    return self.types.prim.num_lit_int;
                }
                self.add_error(
                    SemanticError::NoMemberCount {
                        ty: self.type_name(type_entry),
                    },
                    node,
                );
                TypeId::INVALID
            }
            BuiltinFnId::Typeof => {
                let type_entry = self.analyze_expression(scope, None, args[0]);
                match self.types.kind(type_entry) {
                    TypeKind::Invalid => type_entry,
                    TypeKind::NumLitInt | TypeKind::NumLitFloat | TypeKind::UndefLit => {
                        self.add_error(
                            SemanticError::TypeofNotEligible {
                                ty: self.type_name(type_entry),
                            },
                            args[0],
                        );
                        TypeId::INVALID
                    }
                    _ => {
                        self.ast.set_const(node, ConstValue::ty(type_entry));
                        self.types.prim.metatype
                    }
                }
            }
            BuiltinFnId::CInclude => {
                self.analyze_c_import_directive(scope, node, args[0], "c_include")
            }
            BuiltinFnId::CDefine => {
                // Both the macro name and its replacement must be constant
                // strings.
                let name_text =
                    self.analyze_c_import_directive_string(scope, node, args[0], "c_define");
                let value_text =
                    self.analyze_c_import_directive_string(scope, node, args[1], "c_define");
                if let (Some(name_text), Some(value_text), Some(buf)) = (
                    name_text,
                    value_text,
                    self.scopes.c_import_buf(scope),
                ) {
                    buf.borrow_mut()
                        .push_str(&format!("#define {} {}\n", name_text, value_text));
                }
                self.types.prim.void
            }
            BuiltinFnId::CUndef => {
                let name_text =
                    self.analyze_c_import_directive_string(scope, node, args[0], "c_undef");
                if let (Some(name_text), Some(buf)) = (name_text, self.scopes.c_import_buf(scope)) {
                    buf.borrow_mut().push_str(&format!("#undef {}\n", name_text));
                }
                self.types.prim.void
            }
        }
    }

    fn analyze_overflow_builtin(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        args: &[NodeId],
    ) -> TypeId {
        let bool_ty = self.types.prim.bool_;
        let int_type = self.analyze_type_expr(scope, args[0]);
        if int_type.is_invalid() {
            return bool_ty;
        }
        if !self.types.is_int(int_type) {
            self.add_error(
                SemanticError::ExpectedIntegerType {
                    found: self.type_name(int_type),
                },
                args[0],
            );
            return bool_ty;
        }

        self.analyze_expression(scope, Some(int_type), args[1]);
        self.analyze_expression(scope, Some(int_type), args[2]);

        // The result pointer's pointee alignment must match the operand
        // type's.
        let result_type = self.analyze_expression(scope, None, args[3]);
        if result_type.is_invalid() {
            return bool_ty;
        }
        match self.types.pointer_child(result_type) {
            None => {
                self.add_error(
                    SemanticError::ExpectedPointerArgument {
                        found: self.type_name(result_type),
                    },
                    args[3],
                );
            }
            Some((pointee, _)) => {
                let pointee_align = self.types.align_bits(pointee);
                let wanted_align = self.types.align_bits(int_type);
                if pointee_align != wanted_align {
                    self.add_error(
                        SemanticError::MisalignedOverflowResult {
                            found: self.type_name(result_type),
                            found_align: pointee_align / 8,
                            ty: self.type_name(int_type),
                            align: wanted_align / 8,
                        },
                        args[3],
                    );
                }
            }
        }
        bool_ty
    }

    fn analyze_memcpy(&mut self, scope: ScopeId, args: &[NodeId]) -> TypeId {
        let dest_type = self.analyze_expression(scope, None, args[0]);
        let src_type = self.analyze_expression(scope, None, args[1]);
        let isize_ty = self.types.prim.isize;
        self.analyze_expression(scope, Some(isize_ty), args[2]);

        if !dest_type.is_invalid() && self.types.pointer_child(dest_type).is_none() {
            self.add_error(
                SemanticError::ExpectedPointerArgument {
                    found: self.type_name(dest_type),
                },
                args[0],
            );
        }
        if !src_type.is_invalid() && self.types.pointer_child(src_type).is_none() {
            self.add_error(
                SemanticError::ExpectedPointerArgument {
                    found: self.type_name(src_type),
                },
                args[1],
            );
        }
        if let (Some((dest_child, _)), Some((src_child, _))) = (
            self.types.pointer_child(dest_type),
            self.types.pointer_child(src_type),
        ) {
            let dest_align = self.types.align_bits(dest_child);
            let src_align = self.types.align_bits(src_child);
            if dest_align != src_align {
                self.add_error(
                    SemanticError::MisalignedMemcpy {
                        dest: self.type_name(dest_type),
                        dest_align: dest_align / 8,
                        src: self.type_name(src_type),
                        src_align: src_align / 8,
                    },
                    args[0],
                );
            }
        }
        self.types.prim.void
    }

    fn analyze_memset(&mut self, scope: ScopeId, args: &[NodeId]) -> TypeId {
        let dest_type = self.analyze_expression(scope, None, args[0]);
        let u8_ty = self.types.prim.u8;
        let isize_ty = self.types.prim.isize;
        self.analyze_expression(scope, Some(u8_ty), args[1]);
        self.analyze_expression(scope, Some(isize_ty), args[2]);

        if !dest_type.is_invalid() && self.types.pointer_child(dest_type).is_none() {
            self.add_error(
                SemanticError::ExpectedPointerArgument {
                    found: self.type_name(dest_type),
                },
                args[0],
            );
        }
        self.types.prim.void
    }

    fn analyze_min_max_value(
        &mut self,
        scope: ScopeId,
        node: NodeId,
        type_node: NodeId,
        is_max: bool,
    ) -> TypeId {
        let type_entry = self.analyze_type_expr(scope, type_node);
        if type_entry.is_invalid() {
            return TypeId::INVALID;
        }
        if let Some((signed, bits)) = self.types.int_info(type_entry) {
            let one = num_bigint::BigInt::from(1u8);
            let value = match (is_max, signed) {
                (true, true) => (&one << (bits - 1) as usize) - 1,
                (true, false) => (&one << bits as usize) - 1,
                (false, true) => -(&one << (bits - 1) as usize),
                (false, false) => num_bigint::BigInt::from(0u8),
            };
            self.ast.set_const(node, ConstValue::num(BigNum::Int(value)));
            return type_entry;
        }
        if matches!(self.types.kind(type_entry), TypeKind::Bool) {
            self.ast.set_const(node, ConstValue::bool_value(is_max));
            return type_entry;
        }
        let ty = self.type_name(type_entry);
        let error = if is_max {
            SemanticError::NoMaxValue { ty }
        } else {
            SemanticError::NoMinValue { ty }
        };
        self.add_error(error, node);
        TypeId::INVALID
    }

    /// `@c_include("header.h")`: append an include line to the enclosing
    /// c_import buffer.
    fn analyze_c_import_directive(
        &mut self,
        scope: ScopeId,
        report_node: NodeId,
        str_node: NodeId,
        name: &'static str,
    ) -> TypeId {
        let Some(text) =
            self.analyze_c_import_directive_string(scope, report_node, str_node, name)
        else {
            return self.types.prim.void;
        };
        if let Some(buf) = self.scopes.c_import_buf(scope) {
            buf.borrow_mut()
                .push_str(&format!("#include <{}>\n", text));
        }
        self.types.prim.void
    }

    /// Shared argument handling for the C-import directives: the argument
    /// must be a constant string inside a c_import block.
    fn analyze_c_import_directive_string(
        &mut self,
        scope: ScopeId,
        report_node: NodeId,
        str_node: NodeId,
        name: &'static str,
    ) -> Option<String> {
        if self.scopes.c_import_buf(scope).is_none() {
            self.add_error(SemanticError::BuiltinOutsideCImport { name }, report_node);
            return None;
        }

        let str_type = self.types.slice_of(self.types.prim.u8, true);
        let resolved = self.analyze_expression(scope, Some(str_type), str_node);
        if resolved.is_invalid() {
            return None;
        }

        let const_val = self.ast.const_val(str_node).clone();
        if !const_val.ok {
            self.add_error(SemanticError::BuiltinRequiresConstant { name }, str_node);
            return None;
        }
        let (backing, len) = const_val.as_string_slice()?;
        let bytes: Vec<u8> = backing
            .iter()
            .take(len as usize)
            .filter_map(|c| c.as_num().and_then(|n| n.to_u64()).map(|b| b as u8))
            .collect();
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
