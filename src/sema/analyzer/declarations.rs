// src/sema/analyzer/declarations.rs
//
// Top-level declaration resolution: function prototypes, struct/enum field
// resolution with the infinite-size cycle guard, variable declarations,
// error values, C imports and function-body analysis.

use tracing::debug;

use crate::ast::{ContainerKind, NodeId, NodeKind, Symbol, VisibMod};
use crate::errors::SemanticError;
use crate::sema::compilation::Compilation;
use crate::sema::entities::{ErrorValue, FileId, FnEntry, FnId, Label, VarId, Variable};
use crate::sema::scope::ScopeId;
use crate::sema::types::{ContainerField, ContainerId, FnSig, TypeId, TypeIdVec, TypeKind};

impl Compilation {
    // ========================================================================
    // Function prototypes
    // ========================================================================

    pub(crate) fn preview_fn_proto(&mut self, file: FileId, node: NodeId) {
        let NodeKind::FnProto {
            name,
            visib,
            is_extern,
            is_var_args,
            is_inline,
            ..
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };
        let state = self.decl_state.get(&node);
        let member_of = state.and_then(|s| s.member_of);
        let def_node = state.and_then(|s| s.def_node);

        let is_internal = visib != VisibMod::Export;
        let is_c_compat = !is_internal || is_extern;
        let is_pub = visib != VisibMod::Private;

        let already_defined = match member_of {
            Some(container) => self.types.container(container).methods.contains_key(&name),
            None => self.entities.file(file).fn_table.contains_key(&name),
        };
        if already_defined {
            self.add_error(
                SemanticError::Redefinition {
                    name: self.sym_name(name),
                },
                node,
            );
            return;
        }
        if !is_extern && is_var_args {
            self.add_error(SemanticError::VariadicOnlyExtern, node);
        }

        let symbol_name = match member_of {
            Some(container) => format!(
                "{}_{}",
                self.type_name(self.types.container(container).type_id),
                self.sym_name(name)
            ),
            None => self.sym_name(name),
        };

        let fn_id = self.entities.add_fn(FnEntry {
            proto_node: node,
            def_node,
            file,
            symbol_name,
            ty: TypeId::INVALID,
            member_of,
            labels: rustc_hash::FxHashMap::default(),
            is_extern,
            is_inline,
            internal_linkage: !is_c_compat,
            skip: false,
            all_scopes: Vec::new(),
            implicit_return_type: None,
        });
        self.ast.ann_mut(node).resolved_fn = Some(fn_id);

        match member_of {
            Some(container) => {
                self.types
                    .container_mut(container)
                    .methods
                    .insert(name, fn_id);
            }
            None => {
                self.entities.file_mut(file).fn_table.insert(name, fn_id);
            }
        }

        self.resolve_function_proto(file, node, fn_id);

        if let Some(def_node) = def_node
            && !self.entities.func(fn_id).skip
            && let NodeKind::FnDef { body, .. } = self.ast.node(def_node).kind
        {
            self.preview_function_labels(fn_id, body);
        }

        if is_pub && member_of.is_none() {
            let importers = self.entities.file(file).importers.clone();
            for (importer, import_node) in importers {
                if self.entities.file(importer).fn_table.contains_key(&name) {
                    self.add_error(
                        SemanticError::ImportOverridesDefinition {
                            kind: "function",
                            name: self.sym_name(name),
                        },
                        import_node,
                    );
                } else {
                    self.entities
                        .file_mut(importer)
                        .fn_table
                        .insert(name, fn_id);
                }
            }
        }
    }

    fn resolve_function_proto(&mut self, file: FileId, node: NodeId, fn_id: FnId) {
        let NodeKind::FnProto {
            params,
            return_type,
            is_var_args,
            is_extern,
            is_inline,
            is_naked,
            visib,
            ..
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };
        let file_scope = self.entities.file(file).scope;

        // Parameters and return type are analyzed in source order so the
        // error messages come out in the best order.
        let mut param_types: TypeIdVec = TypeIdVec::new();
        let mut skip = false;
        for param in &params {
            let NodeKind::ParamDecl { type_expr, .. } = self.ast.node(*param).kind else {
                continue;
            };
            let ty = self.analyze_type_expr(file_scope, type_expr);
            if self.types.is_unreachable(ty) {
                self.add_error(SemanticError::UnreachableParamNotAllowed, type_expr);
                skip = true;
            } else if ty.is_invalid() {
                skip = true;
            }
            param_types.push(ty);
        }

        let return_ty = self.analyze_type_expr(file_scope, return_type);
        if return_ty.is_invalid() {
            skip = true;
        }

        if skip {
            self.entities.func_mut(fn_id).skip = true;
            return;
        }

        let mut type_name = String::new();
        if visib == VisibMod::Export {
            type_name.push_str("export ");
        }
        if is_inline {
            type_name.push_str("inline ");
        }
        if is_naked {
            type_name.push_str("naked ");
        }
        type_name.push_str("fn(");
        for (i, &param_ty) in param_types.iter().enumerate() {
            if i > 0 {
                type_name.push_str(", ");
            }
            type_name.push_str(self.types.name(param_ty));
        }
        if is_var_args {
            if !param_types.is_empty() {
                type_name.push_str(", ");
            }
            type_name.push_str("...");
        }
        type_name.push(')');
        if !matches!(self.types.kind(return_ty), TypeKind::Void) {
            type_name.push(' ');
            type_name.push_str(self.types.name(return_ty));
        }

        let sig = FnSig {
            params: param_types,
            return_type: return_ty,
            is_var_args,
            is_extern,
            is_naked,
        };
        let fn_ty = self.types.fn_type(sig, type_name);
        self.entities.func_mut(fn_id).ty = fn_ty;
    }

    /// Labels live in a per-function flat table because goto must cross
    /// block boundaries.
    fn preview_function_labels(&mut self, fn_id: FnId, body: NodeId) {
        let NodeKind::Block { statements } = self.ast.node(body).kind.clone() else {
            return;
        };
        for stmt in statements {
            let NodeKind::Label { name } = self.ast.node(stmt).kind else {
                continue;
            };
            let label_id = self.entities.add_label(Label {
                node: stmt,
                used: false,
                entered_from_fallthrough: false,
            });
            self.entities.func_mut(fn_id).labels.insert(name, label_id);
        }
    }

    // ========================================================================
    // Containers
    // ========================================================================

    pub(crate) fn resolve_container(&mut self, container: ContainerId) {
        let (decl_node, kind, embedded, reported, complete) = {
            let record = self.types.container(container);
            (
                record.decl_node,
                record.kind,
                record.embedded_in_current,
                record.reported_infinite_err,
                record.complete,
            )
        };
        let kind_str = match kind {
            ContainerKind::Struct => "struct",
            ContainerKind::Enum => "enum",
        };

        if embedded {
            // The container reached itself by value while resolving its own
            // fields: it cannot have a finite size.
            if !reported {
                let c = self.types.container_mut(container);
                c.reported_infinite_err = true;
                c.is_invalid = true;
                self.add_error(SemanticError::InfiniteSize { kind: kind_str }, decl_node);
            }
            return;
        }
        if complete {
            return;
        }

        let NodeKind::ContainerDecl {
            fields: field_nodes,
            ..
        } = self.ast.node(decl_node).kind.clone()
        else {
            unreachable!()
        };
        let file_scope = self.entities.file(self.types.container(container).file).scope;

        self.types.container_mut(container).embedded_in_current = true;

        let mut fields = Vec::with_capacity(field_nodes.len());
        let mut gen_index = 0i32;
        for (i, field_node) in field_nodes.iter().enumerate() {
            let NodeKind::StructField { name, type_expr } = self.ast.node(*field_node).kind.clone()
            else {
                continue;
            };
            let field_ty = self.analyze_type_expr(file_scope, type_expr);

            match self.types.kind(field_ty) {
                TypeKind::Struct(inner) => {
                    let inner = *inner;
                    self.resolve_container(inner);
                }
                TypeKind::Enum(inner) => {
                    let inner = *inner;
                    self.resolve_container(inner);
                }
                TypeKind::Invalid => {
                    self.types.container_mut(container).is_invalid = true;
                }
                _ => {}
            }

            let generates_code = !field_ty.is_invalid() && self.types.size_bits(field_ty) > 0;
            fields.push(ContainerField {
                name,
                ty: field_ty,
                src_index: i as u32,
                gen_index: if generates_code { gen_index } else { -1 },
            });
            if generates_code {
                gen_index += 1;
            }
        }

        {
            let c = self.types.container_mut(container);
            c.embedded_in_current = false;
            c.complete = true;
            c.fields = fields;
        }

        if self.types.container(container).is_invalid {
            return;
        }

        let type_id = self.types.container(container).type_id;
        match kind {
            ContainerKind::Struct => {
                let mut total_size = 0u64;
                let mut align = 0u64;
                for field in &self.types.container(container).fields {
                    let field_size = self.types.size_bits(field.ty);
                    total_size += field_size;
                    if align == 0 {
                        align = self.types.align_bits(field.ty);
                    }
                }
                let entry = self.types.entry_mut(type_id);
                entry.size_bits = total_size;
                entry.align_bits = align;
            }
            ContainerKind::Enum => {
                let field_count = self.types.container(container).fields.len() as u64;
                let tag_type = self.types.smallest_uint_for(field_count);
                let tag_bits = self.types.size_bits(tag_type);
                let biggest_member = self
                    .types
                    .container(container)
                    .fields
                    .iter()
                    .map(|f| self.types.size_bits(f.ty))
                    .max()
                    .unwrap_or(0);
                self.types.container_mut(container).tag_type = Some(tag_type);
                let entry = self.types.entry_mut(type_id);
                entry.size_bits = tag_bits + biggest_member;
                entry.align_bits = tag_bits;
            }
        }
        debug!(
            name = %self.type_name(type_id),
            size_bits = self.types.size_bits(type_id),
            "container resolved"
        );
    }

    // ========================================================================
    // Error values
    // ========================================================================

    pub(crate) fn resolve_error_value_decl(&mut self, file: FileId, node: NodeId) {
        let NodeKind::ErrorValueDecl { name, visib } = self.ast.node(node).kind.clone() else {
            unreachable!()
        };
        // Values are 1-based; zero is reserved for "no error".
        let value = self.entities.error_values.len() as u32 + 1;
        let err_id = self.entities.add_error_value(ErrorValue {
            name,
            value,
            decl_node: node,
        });
        self.ast.ann_mut(node).resolved_error = Some(err_id);

        let file_scope = self.entities.file(file).scope;
        if self.scopes.get(file_scope).errors.contains_key(&name) {
            self.add_error(
                SemanticError::RedefinitionOfError {
                    name: self.sym_name(name),
                },
                node,
            );
        } else {
            self.scopes.get_mut(file_scope).errors.insert(name, err_id);
        }

        if visib != VisibMod::Private {
            let importers = self.entities.file(file).importers.clone();
            for (importer, import_node) in importers {
                let importer_scope = self.entities.file(importer).scope;
                if self.scopes.get(importer_scope).errors.contains_key(&name) {
                    self.add_error(
                        SemanticError::ImportOverridesDefinition {
                            kind: "error",
                            name: self.sym_name(name),
                        },
                        import_node,
                    );
                } else {
                    self.scopes
                        .get_mut(importer_scope)
                        .errors
                        .insert(name, err_id);
                }
            }
        }
    }

    // ========================================================================
    // C imports
    // ========================================================================

    pub(crate) fn resolve_c_import_decl(&mut self, file: FileId, node: NodeId) {
        let NodeKind::CImport { body } = self.ast.node(node).kind else {
            unreachable!()
        };

        let parent_scope = self.entities.file(file).scope;
        let child_scope = self.scopes.new_scope(Some(parent_scope), Some(node));
        let buf = crate::sema::scope::CImportBuf::default();
        self.scopes.get_mut(child_scope).c_import_buf = Some(buf.clone());

        let void = self.types.prim.void;
        let resolved = self.analyze_expression(child_scope, Some(void), body);
        if resolved.is_invalid() {
            return;
        }

        let Some(mut importer) = self.c_importer.take() else {
            // No importer wired up: nothing to splice in.
            return;
        };
        let buffer = buf.borrow().clone();
        let path = format!("c_import_{}", node.0);
        let child_file = self.add_file(&path, &buffer);
        self.entities.file_mut(child_file).c_import_node = Some(node);
        self.entities.file_mut(child_file).importers.push((file, node));

        let include_paths = self.options.include_paths.clone();
        let warnings = self.options.c_import_warnings;
        let result = importer.import(&mut self.ast, child_file, &buffer, &include_paths, warnings);
        self.c_importer = Some(importer);

        match result {
            Ok(header) => {
                self.set_root(child_file, header.root);
                self.detect_top_level_deps(child_file);
            }
            Err(notes) => {
                self.add_error_with_notes(SemanticError::CImportFailed, node, notes);
            }
        }
    }

    // ========================================================================
    // Variables
    // ========================================================================

    pub(crate) fn analyze_var_decl_node(&mut self, scope: ScopeId, node: NodeId) -> VarId {
        let NodeKind::VarDecl {
            name,
            visib,
            is_const,
            type_expr,
            init,
        } = self.ast.node(node).kind.clone()
        else {
            unreachable!()
        };
        self.analyze_var_decl_raw(scope, node, name, is_const, visib, type_expr, init, false)
    }

    /// Shared by ordinary declarations and `if-var`, whose initializer must
    /// be an optional that the bound variable unwraps.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn analyze_var_decl_raw(
        &mut self,
        scope: ScopeId,
        source_node: NodeId,
        name: Symbol,
        is_const: bool,
        visib: VisibMod,
        type_expr: Option<NodeId>,
        init: Option<NodeId>,
        expr_is_optional: bool,
    ) -> VarId {
        let is_export = visib == VisibMod::Export;

        let mut explicit_type = None;
        if let Some(type_node) = type_expr {
            let mut ty = self.analyze_type_expr(scope, type_node);
            if self.types.is_unreachable(ty) {
                self.add_error(SemanticError::UnreachableVariableNotAllowed, type_node);
                ty = TypeId::INVALID;
            }
            explicit_type = Some(ty);
        }

        let implicit_type;
        if let Some(init_node) = init {
            let mut ty = self.analyze_expression(scope, explicit_type, init_node);
            if ty.is_invalid() {
                // Keep the poison value.
            } else if expr_is_optional {
                match self.types.optional_child(ty) {
                    Some(child) => ty = child,
                    None => {
                        let found = self.type_name(ty);
                        self.add_error(SemanticError::ExpectedOptionalType { found }, init_node);
                        ty = TypeId::INVALID;
                    }
                }
            } else if self.types.is_unreachable(ty) {
                self.add_error(SemanticError::VariableInitUnreachable, source_node);
                ty = TypeId::INVALID;
            } else if (!is_const || is_export) && self.types.is_num_lit(ty) {
                self.add_error(SemanticError::UnableToInferType, source_node);
                ty = TypeId::INVALID;
            } else if matches!(self.types.kind(ty), TypeKind::MetaType) && !is_const {
                self.add_error(SemanticError::TypeVariableMustBeConstant, source_node);
                ty = TypeId::INVALID;
            }
            if !ty.is_invalid() && self.scopes.fn_entry(scope).is_none() {
                // File-scope initializers must be compile-time known.
                if !self.ast.const_val(init_node).ok {
                    let report = self.first_executing_node(init_node);
                    self.add_error(SemanticError::GlobalInitializerNotConstant, report);
                }
            }
            implicit_type = Some(ty);
        } else {
            self.add_error(SemanticError::VariablesMustBeInitialized, source_node);
            implicit_type = Some(TypeId::INVALID);
        }

        // A poisoned initializer poisons the variable even when the
        // declaration names a type.
        let ty = match (explicit_type, implicit_type) {
            (_, Some(t)) if t.is_invalid() => TypeId::INVALID,
            (Some(t), _) => t,
            (None, Some(t)) => t,
            (None, None) => TypeId::INVALID,
        };

        let var = self.add_local_var(scope, source_node, Some(name), ty, is_const);
        self.ast.ann_mut(source_node).resolved_var = Some(var);

        if visib != VisibMod::Private && self.scopes.fn_entry(scope).is_none() {
            let file = self.ast.owner(source_node);
            let importers = self.entities.file(file).importers.clone();
            for (importer, import_node) in importers {
                let importer_scope = self.entities.file(importer).scope;
                if self
                    .scopes
                    .get(importer_scope)
                    .variables
                    .contains_key(&name)
                {
                    self.add_error(
                        SemanticError::ImportOverridesDefinition {
                            kind: "variable",
                            name: self.sym_name(name),
                        },
                        import_node,
                    );
                } else {
                    self.scopes
                        .get_mut(importer_scope)
                        .variables
                        .insert(name, var);
                }
            }
        }

        var
    }

    /// Bind a variable in `scope`, diagnosing redeclaration within the
    /// function and shadowing of primitive or container types. Pass no name
    /// to make the variable anonymous (invisible to the programmer).
    pub(crate) fn add_local_var(
        &mut self,
        scope: ScopeId,
        source_node: NodeId,
        name: Option<Symbol>,
        type_entry: TypeId,
        is_const: bool,
    ) -> VarId {
        let mut ty = type_entry;
        if let Some(name) = name {
            let existing = if self.scopes.fn_entry(scope).is_some() {
                self.scopes.lookup_var_local(scope, name)
            } else {
                self.scopes.lookup_var(scope, name)
            };
            if existing.is_some() {
                self.add_error(
                    SemanticError::RedeclaredVariable {
                        name: self.sym_name(name),
                    },
                    source_node,
                );
                ty = TypeId::INVALID;
            } else {
                let shadowed = self
                    .primitive_types
                    .get(&name)
                    .copied()
                    .or_else(|| self.scopes.lookup_type(scope, name));
                if let Some(shadowed) = shadowed {
                    self.add_error(
                        SemanticError::VariableShadowsType {
                            type_name: self.type_name(shadowed),
                        },
                        source_node,
                    );
                    ty = TypeId::INVALID;
                }
            }
        }

        let var = self.entities.add_var(Variable {
            name: name.unwrap_or(Symbol(u32::MAX)),
            ty,
            is_const,
            decl_node: source_node,
            src_arg_index: None,
        });
        let scope_data = self.scopes.get_mut(scope);
        if let Some(name) = name {
            scope_data.variables.insert(name, var);
        }
        scope_data.variable_list.push(var);
        var
    }

    // ========================================================================
    // Function bodies
    // ========================================================================

    pub(crate) fn analyze_fn_def(&mut self, file: FileId, node: NodeId) {
        let NodeKind::FnDef { proto, body } = self.ast.node(node).kind else {
            unreachable!()
        };
        let Some(fn_id) = self.ast.ann(proto).resolved_fn else {
            // The prototype was rejected (redefinition); nothing to do.
            return;
        };
        if self.entities.func(fn_id).skip {
            // An error in the prototype prevents analyzing the body.
            return;
        }

        let file_scope = self.entities.file(file).scope;
        let fn_scope = self.scopes.new_scope(Some(file_scope), Some(node));
        self.scopes.get_mut(fn_scope).fn_entry = Some(fn_id);
        self.entities.func_mut(fn_id).all_scopes.push(fn_scope);
        self.ast.ann_mut(node).scope = Some(fn_scope);

        let NodeKind::FnProto { params, .. } = self.ast.node(proto).kind.clone() else {
            unreachable!()
        };
        let sig = self
            .types
            .fn_sig(self.entities.func(fn_id).ty)
            .cloned()
            .expect("resolved prototype has a function type");

        // Parameters become constant locals.
        for (i, param) in params.iter().enumerate() {
            let NodeKind::ParamDecl { name, .. } = self.ast.node(*param).kind else {
                continue;
            };
            let param_ty = sig.params.get(i).copied().unwrap_or(TypeId::INVALID);
            let var = self.add_local_var(fn_scope, *param, Some(name), param_ty, true);
            self.entities.var_mut(var).src_arg_index = Some(i as u32);
            self.ast.ann_mut(*param).resolved_var = Some(var);
        }

        let expected = sig.return_type;
        let block_return_type = self.analyze_expression(fn_scope, Some(expected), body);
        self.entities.func_mut(fn_id).implicit_return_type = Some(block_return_type);

        // Anything labeled but never jumped to is suspicious.
        let labels: Vec<_> = self.entities.func(fn_id).labels.values().copied().collect();
        for label_id in labels {
            let label = self.entities.label(label_id);
            if !label.used {
                let label_node = label.node;
                let NodeKind::Label { name } = self.ast.node(label_node).kind else {
                    continue;
                };
                self.add_warning(
                    crate::errors::SemanticWarning::UnusedLabel {
                        name: self.sym_name(name),
                    },
                    label_node,
                );
            }
        }
    }
}
