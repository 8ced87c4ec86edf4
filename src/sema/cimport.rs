// src/sema/cimport.rs
//
// Interface to the external C-header importer. The analyzer synthesizes a C
// source buffer from the `@c_include`/`@c_define` constants inside a
// `c_import` block, hands it over, and splices the returned declarations in
// as an ordinary imported file.

use crate::ast::{Ast, NodeId};
use crate::errors::Diagnostic;
use crate::sema::entities::FileId;

/// Result of a successful header import: a root node whose declarations were
/// appended to the given AST by the importer.
#[derive(Debug, Clone, Copy)]
pub struct ParsedHeader {
    pub root: NodeId,
}

pub trait CImporter {
    /// Translate the synthesized C source in `buffer` into declarations.
    ///
    /// The analyzer has already registered `file` as the synthetic file the
    /// declarations belong to; every appended node must be owned by it. On
    /// success the importer returns the root of what it appended to `ast`;
    /// on failure it returns its own diagnostics, which the analyzer
    /// attaches as notes under a single "C import failed" error.
    fn import(
        &mut self,
        ast: &mut Ast,
        file: FileId,
        buffer: &str,
        include_paths: &[String],
        warnings: bool,
    ) -> Result<ParsedHeader, Vec<Diagnostic>>;
}
