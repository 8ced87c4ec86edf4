// src/ast/build.rs
//
// Node construction API. The parser drives this to produce the AST the
// analyzer consumes; tests use it directly.

use super::{
    Ast, BinOp, ContainerKind, InitKind, NodeId, NodeKind, NumLit, PrefixOp, ReturnKind, Span,
    Symbol, VisibMod,
};
use crate::sema::entities::FileId;

pub struct NodeBuilder<'a> {
    ast: &'a mut Ast,
    file: FileId,
    span: Span,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(ast: &'a mut Ast, file: FileId) -> Self {
        Self {
            ast,
            file,
            span: Span::none(),
        }
    }

    /// Set the position stamped on subsequently built nodes.
    pub fn at(&mut self, line: u32, column: u32) -> &mut Self {
        self.span = Span::new(line, column);
        self
    }

    pub fn sym(&mut self, name: &str) -> Symbol {
        self.ast.interner.intern(name)
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.ast.push(kind, self.span, self.file)
    }

    // ------------------------------------------------------------------
    // Literals
    // ------------------------------------------------------------------

    pub fn int(&mut self, value: u64) -> NodeId {
        self.push(NodeKind::NumberLiteral {
            value: NumLit::Int(value),
            overflow: false,
        })
    }

    pub fn float(&mut self, value: f64) -> NodeId {
        self.push(NodeKind::NumberLiteral {
            value: NumLit::Float(value),
            overflow: false,
        })
    }

    pub fn overflowed_int(&mut self) -> NodeId {
        self.push(NodeKind::NumberLiteral {
            value: NumLit::Int(0),
            overflow: true,
        })
    }

    pub fn boolean(&mut self, value: bool) -> NodeId {
        self.push(NodeKind::BoolLiteral { value })
    }

    pub fn string(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::StringLiteral {
            value: text.as_bytes().to_vec(),
            is_c: false,
        })
    }

    pub fn c_string(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::StringLiteral {
            value: text.as_bytes().to_vec(),
            is_c: true,
        })
    }

    pub fn char_lit(&mut self, value: u8) -> NodeId {
        self.push(NodeKind::CharLiteral { value })
    }

    pub fn null_lit(&mut self) -> NodeId {
        self.push(NodeKind::NullLiteral)
    }

    pub fn undefined_lit(&mut self) -> NodeId {
        self.push(NodeKind::UndefinedLiteral)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn symbol(&mut self, name: &str) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::Symbol {
            name,
            override_type: None,
        })
    }

    pub fn bin(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(NodeKind::BinOp { op, lhs, rhs })
    }

    pub fn prefix(&mut self, op: PrefixOp, operand: NodeId) -> NodeId {
        self.push(NodeKind::PrefixOp { op, operand })
    }

    pub fn call(&mut self, callee: NodeId, args: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Call {
            callee,
            args,
            is_builtin: false,
        })
    }

    pub fn builtin(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let callee = self.symbol(name);
        self.push(NodeKind::Call {
            callee,
            args,
            is_builtin: true,
        })
    }

    pub fn field(&mut self, object: NodeId, name: &str) -> NodeId {
        let field = self.sym(name);
        self.push(NodeKind::FieldAccess { object, field })
    }

    pub fn index(&mut self, array: NodeId, index: NodeId) -> NodeId {
        self.push(NodeKind::ArrayAccess { array, index })
    }

    pub fn slice(
        &mut self,
        array: NodeId,
        start: NodeId,
        end: Option<NodeId>,
        is_const: bool,
    ) -> NodeId {
        self.push(NodeKind::SliceExpr {
            array,
            start,
            end,
            is_const,
        })
    }

    pub fn unwrap_err(
        &mut self,
        operand: NodeId,
        err_name: Option<&str>,
        fallback: NodeId,
    ) -> NodeId {
        let err_name = err_name.map(|n| self.sym(n));
        self.push(NodeKind::UnwrapErrExpr {
            operand,
            err_name,
            fallback,
        })
    }

    // ------------------------------------------------------------------
    // Statements and control flow
    // ------------------------------------------------------------------

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Block { statements })
    }

    pub fn ret(&mut self, expr: Option<NodeId>) -> NodeId {
        self.push(NodeKind::Return {
            kind: ReturnKind::Normal,
            expr,
        })
    }

    pub fn ret_err(&mut self, expr: NodeId) -> NodeId {
        self.push(NodeKind::Return {
            kind: ReturnKind::ErrorPropagate,
            expr: Some(expr),
        })
    }

    pub fn var_decl(
        &mut self,
        name: &str,
        is_const: bool,
        type_expr: Option<NodeId>,
        init: Option<NodeId>,
    ) -> NodeId {
        self.var_decl_with_visib(name, VisibMod::Private, is_const, type_expr, init)
    }

    pub fn var_decl_with_visib(
        &mut self,
        name: &str,
        visib: VisibMod,
        is_const: bool,
        type_expr: Option<NodeId>,
        init: Option<NodeId>,
    ) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::VarDecl {
            name,
            visib,
            is_const,
            type_expr,
            init,
        })
    }

    pub fn error_value_decl(&mut self, name: &str, visib: VisibMod) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::ErrorValueDecl { name, visib })
    }

    pub fn if_expr(
        &mut self,
        condition: NodeId,
        then_block: NodeId,
        else_node: Option<NodeId>,
    ) -> NodeId {
        self.push(NodeKind::If {
            condition,
            then_block,
            else_node,
        })
    }

    pub fn if_var(
        &mut self,
        name: &str,
        init: NodeId,
        then_block: NodeId,
        else_node: Option<NodeId>,
    ) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::IfVar {
            name,
            is_const: true,
            type_expr: None,
            init,
            then_block,
            else_node,
        })
    }

    pub fn while_expr(&mut self, condition: NodeId, body: NodeId) -> NodeId {
        self.push(NodeKind::While { condition, body })
    }

    pub fn for_expr(
        &mut self,
        elem_name: &str,
        index_name: Option<&str>,
        iterable: NodeId,
        body: NodeId,
    ) -> NodeId {
        let elem_name = self.sym(elem_name);
        let index_name = index_name.map(|n| self.sym(n));
        self.push(NodeKind::For {
            elem_name,
            index_name,
            iterable,
            body,
        })
    }

    pub fn switch(&mut self, scrutinee: NodeId, prongs: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Switch { scrutinee, prongs })
    }

    pub fn prong(&mut self, items: Vec<NodeId>, binding: Option<&str>, body: NodeId) -> NodeId {
        let binding = binding.map(|n| self.sym(n));
        self.push(NodeKind::SwitchProng {
            items,
            binding,
            body,
        })
    }

    pub fn else_prong(&mut self, body: NodeId) -> NodeId {
        self.prong(Vec::new(), None, body)
    }

    pub fn label(&mut self, name: &str) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::Label { name })
    }

    pub fn goto(&mut self, name: &str) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::Goto { name })
    }

    pub fn brk(&mut self) -> NodeId {
        self.push(NodeKind::Break)
    }

    pub fn cont(&mut self) -> NodeId {
        self.push(NodeKind::Continue)
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    pub fn param(&mut self, name: &str, type_expr: NodeId) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::ParamDecl { name, type_expr })
    }

    pub fn fn_proto(&mut self, name: &str, params: Vec<NodeId>, return_type: NodeId) -> NodeId {
        self.fn_proto_full(
            name,
            VisibMod::Private,
            params,
            return_type,
            false,
            false,
        )
    }

    pub fn fn_proto_full(
        &mut self,
        name: &str,
        visib: VisibMod,
        params: Vec<NodeId>,
        return_type: NodeId,
        is_var_args: bool,
        is_extern: bool,
    ) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::FnProto {
            name,
            visib,
            params,
            return_type,
            is_var_args,
            is_extern,
            is_inline: false,
            is_naked: false,
        })
    }

    pub fn fn_def(&mut self, proto: NodeId, body: NodeId) -> NodeId {
        self.push(NodeKind::FnDef { proto, body })
    }

    pub fn container(
        &mut self,
        name: &str,
        kind: ContainerKind,
        fields: Vec<NodeId>,
        fns: Vec<NodeId>,
    ) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::ContainerDecl {
            name,
            kind,
            visib: VisibMod::Private,
            fields,
            fns,
        })
    }

    pub fn struct_field(&mut self, name: &str, type_expr: NodeId) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::StructField { name, type_expr })
    }

    pub fn container_init(
        &mut self,
        type_expr: NodeId,
        kind: InitKind,
        entries: Vec<NodeId>,
    ) -> NodeId {
        self.push(NodeKind::ContainerInit {
            type_expr,
            kind,
            entries,
        })
    }

    pub fn field_init(&mut self, name: &str, value: NodeId) -> NodeId {
        let name = self.sym(name);
        self.push(NodeKind::FieldInit { name, value })
    }

    pub fn array_type(&mut self, size: Option<NodeId>, child: NodeId, is_const: bool) -> NodeId {
        self.push(NodeKind::ArrayType {
            size,
            child,
            is_const,
        })
    }

    pub fn error_type(&mut self) -> NodeId {
        self.push(NodeKind::ErrorType)
    }

    pub fn import(&mut self, path: &str, visib: VisibMod) -> NodeId {
        self.push(NodeKind::Import {
            path: path.to_string(),
            visib,
        })
    }

    pub fn c_import(&mut self, body: NodeId) -> NodeId {
        self.push(NodeKind::CImport { body })
    }

    pub fn root(&mut self, decls: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Root { decls })
    }
}
