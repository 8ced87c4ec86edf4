// src/sema/compilation.rs
//
// The per-compilation context: AST, type registry, scopes, entity arenas,
// diagnostics and the worklist state of the declaration resolver. Explicitly
// passed everywhere so the analyzer is re-entrant across compilations.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::ast::{Ast, NodeId, NodeKind, Symbol};
use crate::errors::{ColorMode, Diagnostic, DiagnosticList, Severity};
use crate::sema::cimport::CImporter;
use crate::sema::entities::{Entities, FileEntry, FileId};
use crate::sema::scope::{ScopeId, Scopes};
use crate::sema::types::{ContainerId, TypeId, TypeRegistry};

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub pointer_bits: u64,
    pub color: ColorMode,
    /// Forwarded to the C importer.
    pub c_import_warnings: bool,
    pub include_paths: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            pointer_bits: 64,
            color: ColorMode::Auto,
            c_import_warnings: false,
            include_paths: Vec::new(),
        }
    }
}

/// Builtin functions, all with fixed arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinFnId {
    Memcpy,
    Memset,
    Sizeof,
    MaxValue,
    MinValue,
    MemberCount,
    Typeof,
    AddWithOverflow,
    SubWithOverflow,
    MulWithOverflow,
    CInclude,
    CDefine,
    CUndef,
}

#[derive(Debug, Clone, Copy)]
pub struct BuiltinFn {
    pub id: BuiltinFnId,
    pub param_count: usize,
}

/// Worklist state of one top-level declaration.
#[derive(Debug)]
pub struct DeclState {
    pub name: Option<Symbol>,
    pub file: FileId,
    pub deps: FxHashSet<Symbol>,
    /// Set while the resolver is descending through this declaration's
    /// dependencies; a revisit means the cycle cannot be broken here.
    pub in_current_deps: bool,
    /// For container declarations: their resolution record.
    pub container: Option<ContainerId>,
    /// For fn prototypes: the container whose method table owns them.
    pub member_of: Option<ContainerId>,
    /// For fn prototypes: the definition node, when one exists.
    pub def_node: Option<NodeId>,
}

impl Default for DeclState {
    fn default() -> Self {
        Self {
            name: None,
            file: FileId(0),
            deps: FxHashSet::default(),
            in_current_deps: false,
            container: None,
            member_of: None,
            def_node: None,
        }
    }
}

pub struct Compilation {
    pub ast: Ast,
    pub types: TypeRegistry,
    pub scopes: Scopes,
    pub entities: Entities,
    pub diagnostics: DiagnosticList,
    pub options: CompileOptions,
    pub c_importer: Option<Box<dyn CImporter>>,

    /// Builtin primitive type names, checked ahead of scope lookups.
    pub(crate) primitive_types: FxHashMap<Symbol, TypeId>,
    pub(crate) builtin_fns: FxHashMap<Symbol, BuiltinFn>,
    /// Absolute import path -> compiled file.
    pub(crate) import_map: FxHashMap<String, FileId>,
    /// Top-level declarations still waiting on dependencies, by name.
    pub(crate) unresolved_decls: FxHashMap<Symbol, NodeId>,
    pub(crate) decl_state: FxHashMap<NodeId, DeclState>,
    /// Loops observed to contain a break; a constant-true `while` without
    /// one has type `unreachable`.
    pub(crate) loops_with_break: FxHashSet<NodeId>,
    pub(crate) error_value_count: u32,
    analyzed: bool,
}

impl Compilation {
    pub fn new(options: CompileOptions) -> Self {
        let mut ast = Ast::new();
        let types = TypeRegistry::new(options.pointer_bits);

        let mut primitive_types = FxHashMap::default();
        let prim = types.prim;
        for (name, ty) in [
            ("i8", prim.i8),
            ("i16", prim.i16),
            ("i32", prim.i32),
            ("i64", prim.i64),
            ("u8", prim.u8),
            ("u16", prim.u16),
            ("u32", prim.u32),
            ("u64", prim.u64),
            ("isize", prim.isize),
            ("usize", prim.usize),
            ("f32", prim.f32),
            ("f64", prim.f64),
            ("bool", prim.bool_),
            ("void", prim.void),
            ("unreachable", prim.unreachable),
            ("type", prim.metatype),
            ("error", prim.pure_error),
        ] {
            primitive_types.insert(ast.interner.intern(name), ty);
        }

        let mut builtin_fns = FxHashMap::default();
        for (name, id, param_count) in [
            ("memcpy", BuiltinFnId::Memcpy, 3),
            ("memset", BuiltinFnId::Memset, 3),
            ("sizeof", BuiltinFnId::Sizeof, 1),
            ("max_value", BuiltinFnId::MaxValue, 1),
            ("min_value", BuiltinFnId::MinValue, 1),
            ("member_count", BuiltinFnId::MemberCount, 1),
            ("typeof", BuiltinFnId::Typeof, 1),
            ("add_with_overflow", BuiltinFnId::AddWithOverflow, 4),
            ("sub_with_overflow", BuiltinFnId::SubWithOverflow, 4),
            ("mul_with_overflow", BuiltinFnId::MulWithOverflow, 4),
            ("c_include", BuiltinFnId::CInclude, 1),
            ("c_define", BuiltinFnId::CDefine, 2),
            ("c_undef", BuiltinFnId::CUndef, 1),
        ] {
            builtin_fns.insert(ast.interner.intern(name), BuiltinFn { id, param_count });
        }

        Self {
            ast,
            types,
            scopes: Scopes::new(),
            entities: Entities::default(),
            diagnostics: DiagnosticList::new(),
            options,
            c_importer: None,
            primitive_types,
            builtin_fns,
            import_map: FxHashMap::default(),
            unresolved_decls: FxHashMap::default(),
            decl_state: FxHashMap::default(),
            loops_with_break: FxHashSet::default(),
            // Zero is reserved for "no error".
            error_value_count: 1,
            analyzed: false,
        }
    }

    /// Register a source file. The caller builds its AST afterwards and
    /// hands the root over with `set_root`.
    pub fn add_file(&mut self, path: &str, source: &str) -> FileId {
        let id = FileId(self.entities.files.len() as u32);
        let scope = self.scopes.new_scope(None, None);
        let mut line_offsets = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_offsets.push(i + 1);
            }
        }
        self.entities.files.push(FileEntry {
            path: path.to_string(),
            source: source.to_string(),
            line_offsets,
            root: None,
            scope,
            importers: Vec::new(),
            fn_table: FxHashMap::default(),
            c_import_node: None,
        });
        self.import_map.insert(path.to_string(), id);
        id
    }

    pub fn set_root(&mut self, file: FileId, root: NodeId) {
        self.entities.file_mut(file).root = Some(root);
        self.scopes.get_mut(self.entities.file(file).scope).node = Some(root);
    }

    pub fn file_scope(&self, file: FileId) -> ScopeId {
        self.entities.file(file).scope
    }

    /// Run semantic analysis over every registered file. Idempotent: a
    /// second call leaves annotations and diagnostics untouched.
    pub fn analyze(&mut self) {
        if self.analyzed {
            return;
        }
        self.analyzed = true;

        // Stage 1: wire up importer edges and count error values, so the
        // pure-error tag can be sized before anything resolves.
        let files: Vec<FileId> = (0..self.entities.files.len() as u32).map(FileId).collect();
        for &file in &files {
            let Some(root) = self.entities.file(file).root else {
                continue;
            };
            let NodeKind::Root { decls } = self.ast.node(root).kind.clone() else {
                panic!("file root is not a Root node");
            };
            for decl in decls {
                match self.ast.node(decl).kind.clone() {
                    NodeKind::Import { path, .. } => {
                        if let Some(&target) = self.import_map.get(&path) {
                            self.entities.file_mut(target).importers.push((file, decl));
                        } else {
                            self.add_error(
                                crate::errors::SemanticError::ImportNotFound { path },
                                decl,
                            );
                        }
                    }
                    NodeKind::ErrorValueDecl { .. } => {
                        self.error_value_count += 1;
                    }
                    _ => {}
                }
            }
        }
        self.types.size_pure_error_tag(self.error_value_count);
        debug!(
            error_values = self.error_value_count,
            "sized pure-error tag"
        );

        // Stage 2: collect each declaration's dependency set; declarations
        // with no dependencies resolve on the spot.
        for &file in &files {
            self.detect_top_level_deps(file);
        }

        // Stage 3: drain the worklist in source order.
        self.resolve_remaining_decls();

        // Stage 4: analyze function bodies, including any files a C import
        // spliced in during stage 3.
        for index in 0..self.entities.files.len() {
            self.analyze_file_fn_defs(FileId(index as u32));
        }
    }

    /// Whether the compilation produced at least one error. No code is
    /// emitted when this is true.
    pub fn failed(&self) -> bool {
        self.diagnostics.has_errors()
    }

    // ========================================================================
    // Diagnostic helpers
    // ========================================================================

    pub(crate) fn diag_at(&self, severity: Severity, node: NodeId, message: String) -> Diagnostic {
        let span = self.ast.span(node);
        let file = self.entities.file(self.ast.owner(node));
        Diagnostic {
            path: file.path.clone(),
            line: span.line,
            column: span.column,
            offset: span.offset as usize,
            severity,
            message,
            source_line: crate::errors::line_from_source(&file.source, span.line),
            notes: Vec::new(),
        }
    }

    pub(crate) fn add_error(&mut self, error: crate::errors::SemanticError, node: NodeId) {
        let diag = self.diag_at(Severity::Error, node, error.to_string());
        self.diagnostics.push(diag);
    }

    pub(crate) fn add_warning(&mut self, warning: crate::errors::SemanticWarning, node: NodeId) {
        let diag = self.diag_at(Severity::Warning, node, warning.to_string());
        self.diagnostics.push(diag);
    }

    pub(crate) fn add_error_with_notes(
        &mut self,
        error: crate::errors::SemanticError,
        node: NodeId,
        notes: Vec<Diagnostic>,
    ) {
        let mut diag = self.diag_at(Severity::Error, node, error.to_string());
        diag.notes = notes;
        self.diagnostics.push(diag);
    }

    pub(crate) fn type_name(&self, ty: TypeId) -> String {
        self.types.name(ty).to_string()
    }

    pub(crate) fn sym_name(&self, sym: Symbol) -> String {
        self.ast.interner.resolve(sym).to_string()
    }
}
