// src/sema/mod.rs
pub mod analyzer;
pub mod cimport;
pub mod compilation;
pub mod entities;
pub mod number;
pub mod resolve;
pub mod scope;
pub mod types;
pub mod value;

pub use cimport::{CImporter, ParsedHeader};
pub use compilation::{BuiltinFnId, Compilation, CompileOptions};
pub use entities::{ErrorId, FileId, FnId, LabelId, VarId};
pub use number::BigNum;
pub use scope::{Scope, ScopeId, Scopes};
pub use types::{Container, ContainerId, TypeId, TypeKind, TypeRegistry};
pub use value::{ConstData, ConstValue};
