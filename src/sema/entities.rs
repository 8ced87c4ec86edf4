// src/sema/entities.rs
//
// Arenas for the long-lived analysis records: compiled files, functions,
// variables, error values and labels. Everything is addressed by a Copy id
// so cyclic references stay cheap and cycle-guard state lives on the record.

use rustc_hash::FxHashMap;

use crate::ast::{NodeId, Symbol};
use crate::sema::scope::ScopeId;
use crate::sema::types::{ContainerId, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FnId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

/// One source file handed to the compilation, together with the per-file
/// tables the resolver fills in.
#[derive(Debug)]
pub struct FileEntry {
    pub path: String,
    pub source: String,
    pub line_offsets: Vec<usize>,
    /// Set once the parser has produced the file's root node.
    pub root: Option<NodeId>,
    pub scope: ScopeId,
    /// Files that import this one, with the import node for diagnostics.
    pub importers: Vec<(FileId, NodeId)>,
    pub fn_table: FxHashMap<Symbol, FnId>,
    /// Set when this file was synthesized from a C import.
    pub c_import_node: Option<NodeId>,
}

/// A function prototype (and optional definition) known to the compilation.
#[derive(Debug)]
pub struct FnEntry {
    pub proto_node: NodeId,
    pub def_node: Option<NodeId>,
    pub file: FileId,
    pub symbol_name: String,
    /// Function type; invalid until the prototype resolves.
    pub ty: TypeId,
    pub member_of: Option<ContainerId>,
    pub labels: FxHashMap<Symbol, LabelId>,
    pub is_extern: bool,
    pub is_inline: bool,
    pub internal_linkage: bool,
    /// Analysis failed in a way that prevents using this function.
    pub skip: bool,
    /// Every scope created inside the definition, in pre-order; the backend
    /// walks these.
    pub all_scopes: Vec<ScopeId>,
    /// Implicit return type of the body, recorded after analysis.
    pub implicit_return_type: Option<TypeId>,
}

#[derive(Debug)]
pub struct Variable {
    pub name: Symbol,
    pub ty: TypeId,
    pub is_const: bool,
    pub decl_node: NodeId,
    /// Parameter index when this variable is a function parameter.
    pub src_arg_index: Option<u32>,
}

#[derive(Debug)]
pub struct ErrorValue {
    pub name: Symbol,
    pub value: u32,
    pub decl_node: NodeId,
}

#[derive(Debug)]
pub struct Label {
    pub node: NodeId,
    pub used: bool,
    /// Whether control can fall through into the label from the statement
    /// above it; the backend needs this for block placement.
    pub entered_from_fallthrough: bool,
}

/// Arena storage for all entity records of one compilation.
#[derive(Debug, Default)]
pub struct Entities {
    pub files: Vec<FileEntry>,
    pub fns: Vec<FnEntry>,
    pub vars: Vec<Variable>,
    pub error_values: Vec<ErrorValue>,
    pub labels: Vec<Label>,
}

impl Entities {
    pub fn file(&self, id: FileId) -> &FileEntry {
        &self.files[id.0 as usize]
    }

    pub fn file_mut(&mut self, id: FileId) -> &mut FileEntry {
        &mut self.files[id.0 as usize]
    }

    pub fn add_fn(&mut self, entry: FnEntry) -> FnId {
        let id = FnId(self.fns.len() as u32);
        self.fns.push(entry);
        id
    }

    pub fn func(&self, id: FnId) -> &FnEntry {
        &self.fns[id.0 as usize]
    }

    pub fn func_mut(&mut self, id: FnId) -> &mut FnEntry {
        &mut self.fns[id.0 as usize]
    }

    pub fn add_var(&mut self, var: Variable) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(var);
        id
    }

    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0 as usize]
    }

    pub fn var_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id.0 as usize]
    }

    pub fn add_error_value(&mut self, err: ErrorValue) -> ErrorId {
        let id = ErrorId(self.error_values.len() as u32);
        self.error_values.push(err);
        id
    }

    pub fn error_value(&self, id: ErrorId) -> &ErrorValue {
        &self.error_values[id.0 as usize]
    }

    pub fn add_label(&mut self, label: Label) -> LabelId {
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(label);
        id
    }

    pub fn label(&self, id: LabelId) -> &Label {
        &self.labels[id.0 as usize]
    }

    pub fn label_mut(&mut self, id: LabelId) -> &mut Label {
        &mut self.labels[id.0 as usize]
    }
}
