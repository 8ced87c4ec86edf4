// tests/analyzer_scenarios.rs
//
// End-to-end analysis scenarios: build a file's AST, run the full analysis,
// then inspect annotations and diagnostics.

use marten::ast::{BinOp, CastKind, InitKind, NodeBuilder};
use marten::sema::{BigNum, Compilation, CompileOptions, ConstData};

fn compilation() -> Compilation {
    Compilation::new(CompileOptions::default())
}

#[test]
fn basic_typing_and_folding() {
    // fn f() -> i32 { return 1 + 2; }
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> i32 { return 1 + 2; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("i32");
    let one = b.int(1);
    let two = b.int(2);
    let sum = b.bin(BinOp::Add, one, two);
    let ret = b.ret(Some(sum));
    let body = b.block(vec![ret]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();

    assert!(!comp.failed(), "analysis should succeed");
    // The `+` node is coerced to i32 and folds to 3.
    assert_eq!(comp.ast.ty(sum), Some(comp.types.prim.i32));
    assert_eq!(
        comp.ast.const_val(sum).as_num(),
        Some(&BigNum::from_u64(3))
    );
    // `return` and the function body are unreachable-typed.
    assert!(comp.types.is_unreachable(comp.ast.ty(ret).unwrap()));
    assert!(comp.types.is_unreachable(comp.ast.ty(body).unwrap()));
}

#[test]
fn integer_overflow_rejection() {
    // const x: u8 = 300;
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "const x: u8 = 300;");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let u8_ty = b.symbol("u8");
    let lit = b.at(0, 14).int(300);
    let decl = b.at(0, 0).var_decl("x", true, Some(u8_ty), Some(lit));
    let root = b.root(vec![decl]);
    comp.set_root(file, root);

    comp.analyze();

    assert_eq!(comp.diagnostics.len(), 1);
    let diag = comp.diagnostics.iter().next().unwrap();
    assert_eq!(
        diag.message,
        "integer value 300 cannot be implicitly casted to type 'u8'"
    );
    // Reported at the literal's position.
    assert_eq!((diag.line, diag.column), (0, 14));
    // The variable itself is poisoned.
    let var = comp.ast.ann(decl).resolved_var.unwrap();
    assert!(comp.entities.var(var).ty.is_invalid());
}

#[test]
fn infinite_struct_detected_once() {
    // struct S { next: S, }
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "struct S { next: S, }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let s_ref = b.symbol("S");
    let field = b.struct_field("next", s_ref);
    let decl = b.container("S", marten::ast::ContainerKind::Struct, vec![field], vec![]);
    let root = b.root(vec![decl]);
    comp.set_root(file, root);

    comp.analyze();

    // Exactly one diagnostic, no cascading field errors.
    assert_eq!(comp.diagnostics.len(), 1);
    assert_eq!(
        comp.diagnostics.iter().next().unwrap().message,
        "struct has infinite size"
    );
    let container = comp
        .types
        .container_of(comp.ast.const_val(s_ref).as_type().unwrap())
        .unwrap();
    assert!(comp.types.container(container).is_invalid);
}

#[test]
fn peer_type_of_if_branches() {
    // fn g(c: bool) -> i32 { if (c) 1 else 2 }
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn g(c: bool) -> i32 { if (c) 1 else 2 }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let bool_ty = b.symbol("bool");
    let c_param = b.param("c", bool_ty);
    let ret_ty = b.symbol("i32");
    let cond = b.symbol("c");
    let then_lit = b.int(1);
    let else_lit = b.int(2);
    let if_node = b.if_expr(cond, then_lit, Some(else_lit));
    let body = b.block(vec![if_node]);
    let proto = b.fn_proto("g", vec![c_param], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();

    assert!(!comp.failed());
    assert_eq!(comp.ast.ty(if_node), Some(comp.types.prim.i32));
    // The condition is dynamic, so the if has no constant value.
    assert!(!comp.ast.const_val(if_node).ok);
}

#[test]
fn implicit_array_to_slice() {
    // const a = [1, 2, 3]; const s: []const i32 = a;
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "const a = [1,2,3]; const s: []const i32 = a;");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let elem_ty = b.symbol("i32");
    let arr_ty = b.array_type(None, elem_ty, false);
    let e1 = b.int(1);
    let e2 = b.int(2);
    let e3 = b.int(3);
    let init = b.container_init(arr_ty, InitKind::Array, vec![e1, e2, e3]);
    let a_decl = b.var_decl("a", true, None, Some(init));

    let elem_ty2 = b.symbol("i32");
    let slice_ty = b.array_type(None, elem_ty2, true);
    let a_ref = b.symbol("a");
    let s_decl = b.var_decl("s", true, Some(slice_ty), Some(a_ref));
    let root = b.root(vec![a_decl, s_decl]);
    comp.set_root(file, root);

    comp.analyze();

    assert!(!comp.failed());
    // `a` coerces through an inserted array-to-slice cast...
    assert_eq!(comp.ast.ann(a_ref).cast_kind, Some(CastKind::ArrayToSlice));
    let i32_slice = comp.types.slice_of(comp.types.prim.i32, true);
    assert_eq!(comp.ast.ty(a_ref), Some(i32_slice));
    // ...whose constant len is 3 and whose ptr aliases a's backing array.
    let (slice_backing, len) = comp.ast.const_val(a_ref).as_string_slice().unwrap();
    assert_eq!(len, 3);
    let ConstData::Array(array_backing) = &comp.ast.const_val(init).data else {
        panic!("array literal should hold a constant array");
    };
    assert!(std::rc::Rc::ptr_eq(slice_backing, array_backing));
}

#[test]
fn dependency_order_between_file_consts() {
    // const a = b + 1; const b = 2;
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "const a = b + 1; const b = 2;");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let b_ref = b.symbol("b");
    let one = b.int(1);
    let sum = b.bin(BinOp::Add, b_ref, one);
    let a_decl = b.var_decl("a", true, None, Some(sum));
    let two = b.int(2);
    let b_decl = b.var_decl("b", true, None, Some(two));
    let root = b.root(vec![a_decl, b_decl]);
    comp.set_root(file, root);

    comp.analyze();

    // `b` resolved first, so `a` saw it: no undeclared-identifier error.
    assert!(comp.diagnostics.is_empty());
    assert_eq!(
        comp.ast.const_val(sum).as_num(),
        Some(&BigNum::from_u64(3))
    );
}

#[test]
fn analysis_is_idempotent() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "const x: u8 = 300;");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let u8_ty = b.symbol("u8");
    let lit = b.int(300);
    let decl = b.var_decl("x", true, Some(u8_ty), Some(lit));
    let root = b.root(vec![decl]);
    comp.set_root(file, root);

    comp.analyze();
    let diag_count = comp.diagnostics.len();
    let lit_ty = comp.ast.ty(lit);

    comp.analyze();

    assert_eq!(comp.diagnostics.len(), diag_count);
    assert_eq!(comp.ast.ty(lit), lit_ty);
}

#[test]
fn invalid_type_is_absorbing() {
    // fn f() -> i32 { return y + 1; } - one diagnostic, not a cascade.
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> i32 { return y + 1; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("i32");
    let y_ref = b.symbol("y");
    let one = b.int(1);
    let sum = b.bin(BinOp::Add, y_ref, one);
    let ret = b.ret(Some(sum));
    let body = b.block(vec![ret]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();

    assert_eq!(comp.diagnostics.len(), 1);
    assert_eq!(
        comp.diagnostics.iter().next().unwrap().message,
        "use of undeclared identifier 'y'"
    );
    assert!(comp.ast.ty(sum).unwrap().is_invalid());
}

#[test]
fn peer_unification_is_commutative() {
    // The peer of (i32, i64) is i64 regardless of operand order.
    for flipped in [false, true] {
        let mut comp = compilation();
        let file = comp.add_file("main.mar", "fn h(c: bool, a: i32, b: i64) -> void {}");
        let mut builder = NodeBuilder::new(&mut comp.ast, file);
        let bool_ty = builder.symbol("bool");
        let i32_ty = builder.symbol("i32");
        let i64_ty = builder.symbol("i64");
        let void_ty = builder.symbol("void");
        let c_param = builder.param("c", bool_ty);
        let a_param = builder.param("a", i32_ty);
        let b_param = builder.param("b", i64_ty);

        let cond = builder.symbol("c");
        let (then_name, else_name) = if flipped { ("b", "a") } else { ("a", "b") };
        let then_ref = builder.symbol(then_name);
        let else_ref = builder.symbol(else_name);
        let if_node = builder.if_expr(cond, then_ref, Some(else_ref));
        let r_decl = builder.var_decl("r", true, None, Some(if_node));
        let body = builder.block(vec![r_decl]);
        let proto = builder.fn_proto("h", vec![c_param, a_param, b_param], void_ty);
        let def = builder.fn_def(proto, body);
        let root = builder.root(vec![def]);
        comp.set_root(file, root);

        comp.analyze();

        assert!(!comp.failed());
        let var = comp.ast.ann(r_decl).resolved_var.unwrap();
        assert_eq!(comp.entities.var(var).ty, comp.types.prim.i64);
    }
}
