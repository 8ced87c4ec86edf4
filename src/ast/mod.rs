// src/ast/mod.rs
//
// The parser-facing AST: an arena of nodes addressed by NodeId, plus the
// annotation slots the analyzer fills in and the backend reads. The parser
// (or the test builder) appends nodes in source order, so NodeId order is
// creation order and doubles as the determinism index for the top-level
// declaration worklist.

mod build;

pub use build::NodeBuilder;

use crate::sema::entities::{ErrorId, FileId, FnId, VarId};
use crate::sema::scope::ScopeId;
use crate::sema::types::TypeId;
use crate::sema::value::ConstValue;

/// Interned identifier handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(pub u32);

/// Handle to a node in the AST arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque handle the backend attaches to a constant expression value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendValueRef(pub u32);

/// Source position of a node. Lines and columns are 0-based; diagnostics
/// render them 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            offset: 0,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Simple string interner shared by the parser and the analyzer.
#[derive(Debug, Default)]
pub struct Interner {
    names: Vec<String>,
    lookup: rustc_hash::FxHashMap<String, Symbol>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(&sym) = self.lookup.get(name) {
            return sym;
        }
        let sym = Symbol(self.names.len() as u32);
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.names[sym.0 as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibMod {
    Private,
    Pub,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Assign,
    AssignTimes,
    AssignDiv,
    AssignMod,
    AssignPlus,
    AssignMinus,
    AssignShl,
    AssignShr,
    AssignBitAnd,
    AssignBitXor,
    AssignBitOr,
    AssignBoolAnd,
    AssignBoolOr,
    BoolOr,
    BoolAnd,
    CmpEq,
    CmpNotEq,
    CmpLessThan,
    CmpGreaterThan,
    CmpLessOrEq,
    CmpGreaterOrEq,
    BitOr,
    BitXor,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `a ?? b` - unwrap an optional with a fallback.
    UnwrapOptional,
    /// `a ++ b` - compile-time string concatenation.
    StrCat,
}

impl BinOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinOp::Assign
                | BinOp::AssignTimes
                | BinOp::AssignDiv
                | BinOp::AssignMod
                | BinOp::AssignPlus
                | BinOp::AssignMinus
                | BinOp::AssignShl
                | BinOp::AssignShr
                | BinOp::AssignBitAnd
                | BinOp::AssignBitXor
                | BinOp::AssignBitOr
                | BinOp::AssignBoolAnd
                | BinOp::AssignBoolOr
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::CmpEq
                | BinOp::CmpNotEq
                | BinOp::CmpLessThan
                | BinOp::CmpGreaterThan
                | BinOp::CmpLessOrEq
                | BinOp::CmpGreaterOrEq
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    BoolNot,
    BitNot,
    Negate,
    AddressOf,
    ConstAddressOf,
    Dereference,
    /// `?x` - wrap in an optional (or build `?T` from a type).
    OptionalWrap,
    /// `%x` - wrap in an error union (or build `%T` from a type).
    ErrorWrap,
    /// `%%x` - assert an error union holds a payload.
    UnwrapError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    /// `return e`
    Normal,
    /// `%return e` - return the error if `e` holds one, else unwrap.
    ErrorPropagate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Struct,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    Struct,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumLit {
    Int(u64),
    Float(f64),
}

/// The cast kind the analyzer selects for an explicit or inserted cast.
/// The backend picks its code path from this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Noop,
    PtrToInt,
    IntToPtr,
    IntWidenOrShorten,
    ArrayToSlice,
    PointerReinterpret,
    OptionalWrap,
    ErrorWrap,
    PureErrorWrap,
    ErrToInt,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root {
        decls: Vec<NodeId>,
    },
    FnProto {
        name: Symbol,
        visib: VisibMod,
        params: Vec<NodeId>,
        return_type: NodeId,
        is_var_args: bool,
        is_extern: bool,
        is_inline: bool,
        is_naked: bool,
    },
    FnDef {
        proto: NodeId,
        body: NodeId,
    },
    ParamDecl {
        name: Symbol,
        type_expr: NodeId,
    },
    Block {
        statements: Vec<NodeId>,
    },
    Return {
        kind: ReturnKind,
        expr: Option<NodeId>,
    },
    VarDecl {
        name: Symbol,
        visib: VisibMod,
        is_const: bool,
        type_expr: Option<NodeId>,
        init: Option<NodeId>,
    },
    ErrorValueDecl {
        name: Symbol,
        visib: VisibMod,
    },
    BinOp {
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    /// `lhs %% rhs` / `lhs %% |err| rhs` - run `rhs` when `lhs` holds an error.
    UnwrapErrExpr {
        operand: NodeId,
        err_name: Option<Symbol>,
        fallback: NodeId,
    },
    PrefixOp {
        op: PrefixOp,
        operand: NodeId,
    },
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
        is_builtin: bool,
    },
    ArrayAccess {
        array: NodeId,
        index: NodeId,
    },
    SliceExpr {
        array: NodeId,
        start: NodeId,
        end: Option<NodeId>,
        is_const: bool,
    },
    FieldAccess {
        object: NodeId,
        field: Symbol,
    },
    ContainerDecl {
        name: Symbol,
        kind: ContainerKind,
        visib: VisibMod,
        fields: Vec<NodeId>,
        fns: Vec<NodeId>,
    },
    StructField {
        name: Symbol,
        type_expr: NodeId,
    },
    ContainerInit {
        type_expr: NodeId,
        kind: InitKind,
        entries: Vec<NodeId>,
    },
    FieldInit {
        name: Symbol,
        value: NodeId,
    },
    ArrayType {
        size: Option<NodeId>,
        child: NodeId,
        is_const: bool,
    },
    /// The `error` keyword used as a type expression.
    ErrorType,
    NumberLiteral {
        value: NumLit,
        /// The literal did not fit a u64/f64 while lexing.
        overflow: bool,
    },
    StringLiteral {
        value: Vec<u8>,
        is_c: bool,
    },
    CharLiteral {
        value: u8,
    },
    BoolLiteral {
        value: bool,
    },
    NullLiteral,
    UndefinedLiteral,
    Symbol {
        name: Symbol,
        /// Parser-installed type alias; resolves ahead of any lookup.
        override_type: Option<TypeId>,
    },
    If {
        condition: NodeId,
        then_block: NodeId,
        else_node: Option<NodeId>,
    },
    IfVar {
        name: Symbol,
        is_const: bool,
        type_expr: Option<NodeId>,
        init: NodeId,
        then_block: NodeId,
        else_node: Option<NodeId>,
    },
    While {
        condition: NodeId,
        body: NodeId,
    },
    For {
        elem_name: Symbol,
        index_name: Option<Symbol>,
        iterable: NodeId,
        body: NodeId,
    },
    Switch {
        scrutinee: NodeId,
        prongs: Vec<NodeId>,
    },
    SwitchProng {
        /// Empty for the `else` prong.
        items: Vec<NodeId>,
        binding: Option<Symbol>,
        body: NodeId,
    },
    Label {
        name: Symbol,
    },
    Goto {
        name: Symbol,
    },
    Break,
    Continue,
    Import {
        path: String,
        visib: VisibMod,
    },
    CImport {
        body: NodeId,
    },
    /// Synthetic: inserted by the analyzer when an implicit coercion is
    /// required. Never produced by the parser.
    Cast {
        target: TypeId,
        operand: NodeId,
    },
    /// Synthetic: stands in for an elided `void` expression (e.g. a bare
    /// `return`). Never produced by the parser.
    VoidLiteral,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub owner: FileId,
}

/// Analyzer-populated annotation slots for one node. The backend reads these
/// and never writes anything except `backend`.
#[derive(Debug, Clone, Default)]
pub struct ExprAnn {
    pub ty: Option<TypeId>,
    pub const_val: ConstValue,
    pub scope: Option<ScopeId>,
    pub cast_kind: Option<CastKind>,
    pub resolved_fn: Option<FnId>,
    pub resolved_var: Option<VarId>,
    pub resolved_field: Option<u32>,
    pub resolved_error: Option<ErrorId>,
    pub backend: Option<BackendValueRef>,
}

/// Arena of AST nodes plus their annotation slots.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    anns: Vec<ExprAnn>,
    pub interner: Interner,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind, span: Span, owner: FileId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, span, owner });
        self.anns.push(ExprAnn::default());
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn ann(&self, id: NodeId) -> &ExprAnn {
        &self.anns[id.index()]
    }

    pub fn ann_mut(&mut self, id: NodeId) -> &mut ExprAnn {
        &mut self.anns[id.index()]
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.node(id).span
    }

    pub fn owner(&self, id: NodeId) -> FileId {
        self.node(id).owner
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_type(&mut self, id: NodeId, ty: TypeId) {
        self.anns[id.index()].ty = Some(ty);
    }

    pub fn ty(&self, id: NodeId) -> Option<TypeId> {
        self.anns[id.index()].ty
    }

    pub fn set_const(&mut self, id: NodeId, value: ConstValue) {
        self.anns[id.index()].const_val = value;
    }

    pub fn const_val(&self, id: NodeId) -> &ConstValue {
        &self.anns[id.index()].const_val
    }

    /// Replace `id` with a synthetic cast whose operand is the old content.
    ///
    /// The node's kind and annotations move to a fresh arena slot; the
    /// original slot becomes `Cast { target, operand: fresh }`. Parents keep
    /// referring to `id`, which now names the cast, so no parent back-pointer
    /// has to be maintained. Returns the id now holding the original content.
    pub fn wrap_in_cast(&mut self, id: NodeId, target: TypeId) -> NodeId {
        let span = self.nodes[id.index()].span;
        let owner = self.nodes[id.index()].owner;
        let inner = NodeId(self.nodes.len() as u32);
        let old_kind = std::mem::replace(
            &mut self.nodes[id.index()].kind,
            NodeKind::Cast {
                target,
                operand: inner,
            },
        );
        let old_ann = std::mem::take(&mut self.anns[id.index()]);
        self.nodes.push(Node {
            kind: old_kind,
            span,
            owner,
        });
        self.anns.push(old_ann);
        inner
    }

    /// Whether a node is an explicitly-void expression, permitted after an
    /// unreachable-typed statement in a block.
    pub fn is_void_expr(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::VoidLiteral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_order_is_creation_order() {
        let mut ast = Ast::new();
        let file = FileId(0);
        let a = ast.push(NodeKind::NullLiteral, Span::none(), file);
        let b = ast.push(NodeKind::Break, Span::none(), file);
        assert!(a < b);
    }

    #[test]
    fn interner_deduplicates() {
        let mut interner = Interner::new();
        let a = interner.intern("len");
        let b = interner.intern("len");
        let c = interner.intern("ptr");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(interner.resolve(a), "len");
    }

    #[test]
    fn wrap_in_cast_moves_content() {
        let mut ast = Ast::new();
        let file = FileId(0);
        let lit = ast.push(
            NodeKind::NumberLiteral {
                value: NumLit::Int(3),
                overflow: false,
            },
            Span::new(4, 11),
            file,
        );
        ast.set_type(lit, TypeId::INVALID);

        let inner = ast.wrap_in_cast(lit, TypeId::INVALID);

        // The original slot now names the cast; the content moved.
        assert!(matches!(
            ast.node(lit).kind,
            NodeKind::Cast { operand, .. } if operand == inner
        ));
        assert!(matches!(
            ast.node(inner).kind,
            NodeKind::NumberLiteral { .. }
        ));
        // Annotations followed the content.
        assert_eq!(ast.ty(inner), Some(TypeId::INVALID));
        assert_eq!(ast.ty(lit), None);
        // Position is preserved on both.
        assert_eq!(ast.span(lit), ast.span(inner));
    }
}
