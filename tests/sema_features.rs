// tests/sema_features.rs
//
// Feature-level analysis tests: control flow, aggregates, error values,
// builtins, scopes and imports.

use marten::ast::{
    Ast, BinOp, CastKind, ContainerKind, InitKind, NodeBuilder, PrefixOp, VisibMod,
};
use marten::errors::Diagnostic;
use marten::sema::{
    BigNum, CImporter, Compilation, CompileOptions, ConstData, FileId, ParsedHeader,
};

fn compilation() -> Compilation {
    Compilation::new(CompileOptions::default())
}

fn messages(comp: &Compilation) -> Vec<String> {
    comp.diagnostics.iter().map(|d| d.message.clone()).collect()
}

#[test]
fn assignment_to_constant_rejected() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { const x = 1; x = 2; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let void_ty = b.symbol("void");
    let one = b.int(1);
    let decl = b.var_decl("x", true, None, Some(one));
    let x_ref = b.symbol("x");
    let two = b.int(2);
    let assign = b.bin(BinOp::Assign, x_ref, two);
    let body = b.block(vec![decl, assign]);
    let proto = b.fn_proto("f", vec![], void_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["cannot assign to constant"]);
}

#[test]
fn mutable_assignment_allowed() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { var x: i32 = 1; x = 2; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let void_ty = b.symbol("void");
    let i32_ty = b.symbol("i32");
    let one = b.int(1);
    let decl = b.var_decl("x", false, Some(i32_ty), Some(one));
    let x_ref = b.symbol("x");
    let two = b.int(2);
    let assign = b.bin(BinOp::Assign, x_ref, two);
    let body = b.block(vec![decl, assign]);
    let proto = b.fn_proto("f", vec![], void_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty());
}

#[test]
fn unreachable_code_reported() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { return; 1; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let void_ty = b.symbol("void");
    let ret = b.ret(None);
    let dead = b.int(1);
    let body = b.block(vec![ret, dead]);
    let proto = b.fn_proto("f", vec![], void_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["unreachable code"]);
}

#[test]
fn break_outside_loop_reported() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { break; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let void_ty = b.symbol("void");
    let brk = b.brk();
    let body = b.block(vec![brk]);
    let proto = b.fn_proto("f", vec![], void_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["'break' expression outside loop"]);
}

#[test]
fn while_true_without_break_is_unreachable() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> unreachable { while (true) {} }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("unreachable");
    let cond = b.boolean(true);
    let loop_body = b.block(vec![]);
    let while_node = b.while_expr(cond, loop_body);
    let body = b.block(vec![while_node]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty());
    assert!(comp.types.is_unreachable(comp.ast.ty(while_node).unwrap()));
}

#[test]
fn while_true_with_break_is_void() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { while (true) { break; } }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("void");
    let cond = b.boolean(true);
    let brk = b.brk();
    let loop_body = b.block(vec![brk]);
    let while_node = b.while_expr(cond, loop_body);
    let body = b.block(vec![while_node]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty());
    assert_eq!(comp.ast.ty(while_node), Some(comp.types.prim.void));
}

#[test]
fn switch_requires_else_prong() {
    for with_else in [true, false] {
        let mut comp = compilation();
        let file = comp.add_file("main.mar", "fn f(x: i32) -> i32 { switch (x) { ... } }");
        let mut b = NodeBuilder::new(&mut comp.ast, file);
        let i32_param_ty = b.symbol("i32");
        let x_param = b.param("x", i32_param_ty);
        let ret_ty = b.symbol("i32");
        let scrutinee = b.symbol("x");
        let item = b.int(1);
        let prong_body = b.int(10);
        let prong = b.prong(vec![item], None, prong_body);
        let mut prongs = vec![prong];
        if with_else {
            let else_body = b.int(20);
            prongs.push(b.else_prong(else_body));
        }
        let switch = b.switch(scrutinee, prongs);
        let body = b.block(vec![switch]);
        let proto = b.fn_proto("f", vec![x_param], ret_ty);
        let def = b.fn_def(proto, body);
        let root = b.root(vec![def]);
        comp.set_root(file, root);

        comp.analyze();
        if with_else {
            assert!(comp.diagnostics.is_empty());
            assert_eq!(comp.ast.ty(switch), Some(comp.types.prim.i32));
        } else {
            assert_eq!(messages(&comp), vec!["switch must handle all possibilities"]);
        }
    }
}

#[test]
fn switch_prongs_must_be_constant() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f(x: i32, y: i32) -> i32 { switch (x) ... }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_a = b.symbol("i32");
    let x_param = b.param("x", i32_a);
    let i32_b = b.symbol("i32");
    let y_param = b.param("y", i32_b);
    let ret_ty = b.symbol("i32");
    let scrutinee = b.symbol("x");
    let item = b.symbol("y");
    let prong_body = b.int(10);
    let prong = b.prong(vec![item], None, prong_body);
    let else_body = b.int(20);
    let else_prong = b.else_prong(else_body);
    let switch = b.switch(scrutinee, vec![prong, else_prong]);
    let body = b.block(vec![switch]);
    let proto = b.fn_proto("f", vec![x_param, y_param], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["unable to resolve constant expression"]);
}

#[test]
fn constant_string_concatenation() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "const s = \"abc\" ++ \"def\";");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let lhs = b.string("abc");
    let rhs = b.string("def");
    let cat = b.bin(BinOp::StrCat, lhs, rhs);
    let decl = b.var_decl("s", true, None, Some(cat));
    let root = b.root(vec![decl]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty());
    let expected_ty = comp.types.slice_of(comp.types.prim.u8, true);
    assert_eq!(comp.ast.ty(cat), Some(expected_ty));
    let (backing, len) = comp.ast.const_val(cat).as_string_slice().unwrap();
    assert_eq!(len, 6);
    let bytes: Vec<u8> = backing
        .iter()
        .map(|c| c.as_num().unwrap().to_u64().unwrap() as u8)
        .collect();
    assert_eq!(&bytes, b"abcdef");
}

#[test]
fn string_concat_requires_constants() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f(s: []const u8) -> void { s ++ \"x\"; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let u8_ty = b.symbol("u8");
    let slice_ty = b.array_type(None, u8_ty, true);
    let s_param = b.param("s", slice_ty);
    let void_ty = b.symbol("void");
    let s_ref = b.symbol("s");
    let x_lit = b.string("x");
    let cat = b.bin(BinOp::StrCat, s_ref, x_lit);
    let body = b.block(vec![cat]);
    let proto = b.fn_proto("f", vec![s_param], void_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(
        messages(&comp),
        vec!["string concatenation requires constant expression"]
    );
}

#[test]
fn enum_variants_and_member_count() {
    let mut comp = compilation();
    let file = comp.add_file(
        "main.mar",
        "enum E { a, b, c: i32 } const t = E.a; const n = @member_count(E);",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let void_a = b.symbol("void");
    let fa = b.struct_field("a", void_a);
    let void_b = b.symbol("void");
    let fb = b.struct_field("b", void_b);
    let i32_ty = b.symbol("i32");
    let fc = b.struct_field("c", i32_ty);
    let decl = b.container("E", ContainerKind::Enum, vec![fa, fb, fc], vec![]);

    let e_ref = b.symbol("E");
    let variant = b.field(e_ref, "a");
    let t_decl = b.var_decl("t", true, None, Some(variant));

    let e_ref2 = b.symbol("E");
    let count = b.builtin("member_count", vec![e_ref2]);
    let n_decl = b.var_decl("n", true, None, Some(count));

    let root = b.root(vec![decl, t_decl, n_decl]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    // E.a is the tag constant 0.
    assert!(matches!(
        comp.ast.const_val(variant).data,
        ConstData::EnumTag { tag: 0, payload: None }
    ));
    assert_eq!(
        comp.ast.const_val(count).as_num(),
        Some(&BigNum::from_u64(3))
    );
}

#[test]
fn enum_payload_variant_requires_parameter() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "enum E { c: i32 } const t = E.c;");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_ty = b.symbol("i32");
    let fc = b.struct_field("c", i32_ty);
    let decl = b.container("E", ContainerKind::Enum, vec![fc], vec![]);
    let e_ref = b.symbol("E");
    let variant = b.field(e_ref, "c");
    let t_decl = b.var_decl("t", true, None, Some(variant));
    let root = b.root(vec![decl, t_decl]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(
        messages(&comp)
            .iter()
            .any(|m| m == "enum value 'E.c' requires parameter of type 'i32'"),
        "got: {:?}",
        messages(&comp)
    );
}

#[test]
fn error_values_and_wrapping() {
    // error NotFound; error OutOfMem; fn f() -> %void { return error.NotFound; }
    let mut comp = compilation();
    let file = comp.add_file(
        "main.mar",
        "error NotFound; error OutOfMem; fn f() -> %void { return error.NotFound; }",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let e1 = b.error_value_decl("NotFound", VisibMod::Private);
    let e2 = b.error_value_decl("OutOfMem", VisibMod::Private);

    let void_ty = b.symbol("void");
    let ret_ty = b.prefix(PrefixOp::ErrorWrap, void_ty);
    let err_kw = b.error_type();
    let err_lit = b.field(err_kw, "NotFound");
    let ret = b.ret(Some(err_lit));
    let body = b.block(vec![ret]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![e1, e2, def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    // The pure error coerced into the %void return channel.
    assert_eq!(comp.ast.ann(err_lit).cast_kind, Some(CastKind::PureErrorWrap));
    let err_union = comp.types.error_union_of(comp.types.prim.void);
    assert_eq!(comp.ast.ty(err_lit), Some(err_union));
    assert!(matches!(
        comp.ast.const_val(err_lit).data,
        ConstData::ErrUnion { err: Some(_), payload: None }
    ));
}

#[test]
fn error_to_int_cast_folds() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "error NotFound; const x = i32(error.NotFound);");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let e1 = b.error_value_decl("NotFound", VisibMod::Private);
    let i32_ref = b.symbol("i32");
    let err_kw = b.error_type();
    let err_lit = b.field(err_kw, "NotFound");
    let cast = b.call(i32_ref, vec![err_lit]);
    let decl = b.var_decl("x", true, None, Some(cast));
    let root = b.root(vec![e1, decl]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    assert_eq!(comp.ast.ann(cast).cast_kind, Some(CastKind::ErrToInt));
    // Error values are numbered from 1.
    assert_eq!(
        comp.ast.const_val(cast).as_num(),
        Some(&BigNum::from_u64(1))
    );
}

#[test]
fn unwrap_error_with_binding() {
    let mut comp = compilation();
    let file = comp.add_file(
        "main.mar",
        "fn f() -> i32 { const v: %i32 = 5; return v %% |e| 0; }",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("i32");
    let i32_ty = b.symbol("i32");
    let eu_ty = b.prefix(PrefixOp::ErrorWrap, i32_ty);
    let five = b.int(5);
    let v_decl = b.var_decl("v", true, Some(eu_ty), Some(five));
    let v_ref = b.symbol("v");
    let zero = b.int(0);
    let unwrap = b.unwrap_err(v_ref, Some("e"), zero);
    let ret = b.ret(Some(unwrap));
    let body = b.block(vec![v_decl, ret]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    assert_eq!(comp.ast.ty(unwrap), Some(comp.types.prim.i32));
    // The 5 was wrapped into the error union.
    assert_eq!(comp.ast.ann(five).cast_kind, Some(CastKind::ErrorWrap));
}

#[test]
fn struct_method_call() {
    let mut comp = compilation();
    let file = comp.add_file(
        "main.mar",
        "struct S { x: i32, fn get(s: S) -> i32 { return s.x; } } ...",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_field = b.symbol("i32");
    let x_field = b.struct_field("x", i32_field);

    let s_param_ty = b.symbol("S");
    let s_param = b.param("s", s_param_ty);
    let get_ret = b.symbol("i32");
    let s_ref = b.symbol("s");
    let x_access = b.field(s_ref, "x");
    let get_ret_stmt = b.ret(Some(x_access));
    let get_body = b.block(vec![get_ret_stmt]);
    let get_proto = b.fn_proto("get", vec![s_param], get_ret);
    let get_def = b.fn_def(get_proto, get_body);

    let s_decl = b.container("S", ContainerKind::Struct, vec![x_field], vec![get_def]);

    let main_ret = b.symbol("i32");
    let s_ty_ref = b.symbol("S");
    let one = b.int(1);
    let x_init = b.field_init("x", one);
    let p_init = b.container_init(s_ty_ref, InitKind::Struct, vec![x_init]);
    let p_decl = b.var_decl("p", true, None, Some(p_init));
    let p_ref = b.symbol("p");
    let get_access = b.field(p_ref, "get");
    let call = b.call(get_access, vec![]);
    let main_ret_stmt = b.ret(Some(call));
    let main_body = b.block(vec![p_decl, main_ret_stmt]);
    let main_proto = b.fn_proto("main", vec![], main_ret);
    let main_def = b.fn_def(main_proto, main_body);

    let root = b.root(vec![s_decl, main_def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    assert_eq!(comp.ast.ty(call), Some(comp.types.prim.i32));
    assert!(comp.ast.ann(call).resolved_fn.is_some());
    // The field access resolved to field 0 of S.
    assert_eq!(comp.ast.ann(x_access).resolved_field, Some(0));
}

#[test]
fn missing_and_duplicate_struct_fields() {
    let mut comp = compilation();
    let file = comp.add_file(
        "main.mar",
        "struct P { x: i32, y: i32 } const a = P{x: 1, x: 2};",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_a = b.symbol("i32");
    let fx = b.struct_field("x", i32_a);
    let i32_b = b.symbol("i32");
    let fy = b.struct_field("y", i32_b);
    let p_decl = b.container("P", ContainerKind::Struct, vec![fx, fy], vec![]);

    let p_ref = b.symbol("P");
    let one = b.int(1);
    let init_x1 = b.field_init("x", one);
    let two = b.int(2);
    let init_x2 = b.field_init("x", two);
    let init = b.container_init(p_ref, InitKind::Struct, vec![init_x1, init_x2]);
    let a_decl = b.var_decl("a", true, None, Some(init));
    let root = b.root(vec![p_decl, a_decl]);
    comp.set_root(file, root);

    comp.analyze();
    let msgs = messages(&comp);
    assert!(msgs.contains(&"duplicate field".to_string()), "got: {:?}", msgs);
    assert!(msgs.contains(&"missing field: 'y'".to_string()), "got: {:?}", msgs);
}

#[test]
fn unused_label_warns_and_goto_resolves() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { top: } fn g() -> void { ... }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);

    let f_ret = b.symbol("void");
    let label = b.label("top");
    let f_body = b.block(vec![label]);
    let f_proto = b.fn_proto("f", vec![], f_ret);
    let f_def = b.fn_def(f_proto, f_body);

    let g_ret = b.symbol("void");
    let g_label = b.label("again");
    let g_goto = b.goto("again");
    let g_body = b.block(vec![g_label, g_goto]);
    let g_proto = b.fn_proto("g", vec![], g_ret);
    let g_def = b.fn_def(g_proto, g_body);

    let root = b.root(vec![f_def, g_def]);
    comp.set_root(file, root);

    comp.analyze();
    // One warning for f's unused label; g's label is used.
    assert_eq!(messages(&comp), vec!["label 'top' defined but not used"]);
    assert!(!comp.diagnostics.has_errors());
}

#[test]
fn goto_undeclared_label() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { goto nowhere; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("void");
    let goto = b.goto("nowhere");
    let body = b.block(vec![goto]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["use of undeclared label 'nowhere'"]);
}

#[test]
fn pub_function_visible_to_importer() {
    let mut comp = compilation();
    let lib = comp.add_file("lib.mar", "pub fn foo() -> i32 { return 1; }");
    let mut b = NodeBuilder::new(&mut comp.ast, lib);
    let foo_ret = b.symbol("i32");
    let one = b.int(1);
    let foo_ret_stmt = b.ret(Some(one));
    let foo_body = b.block(vec![foo_ret_stmt]);
    let foo_proto = b.fn_proto_full("foo", VisibMod::Pub, vec![], foo_ret, false, false);
    let foo_def = b.fn_def(foo_proto, foo_body);
    let lib_root = b.root(vec![foo_def]);
    comp.set_root(lib, lib_root);

    let main = comp.add_file("main.mar", "import \"lib.mar\"; fn main() -> i32 { ... }");
    let mut b = NodeBuilder::new(&mut comp.ast, main);
    let import = b.import("lib.mar", VisibMod::Private);
    let main_ret = b.symbol("i32");
    let foo_ref = b.symbol("foo");
    let call = b.call(foo_ref, vec![]);
    let ret = b.ret(Some(call));
    let body = b.block(vec![ret]);
    let proto = b.fn_proto("main", vec![], main_ret);
    let def = b.fn_def(proto, body);
    let main_root = b.root(vec![import, def]);
    comp.set_root(main, main_root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    assert_eq!(comp.ast.ty(call), Some(comp.types.prim.i32));
}

#[test]
fn import_of_missing_file_reported() {
    let mut comp = compilation();
    let main = comp.add_file("main.mar", "import \"nope.mar\";");
    let mut b = NodeBuilder::new(&mut comp.ast, main);
    let import = b.import("nope.mar", VisibMod::Private);
    let root = b.root(vec![import]);
    comp.set_root(main, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["unable to find 'nope.mar'"]);
}

#[test]
fn optional_coercions() {
    let mut comp = compilation();
    let file = comp.add_file(
        "main.mar",
        "const o: ?i32 = 5; fn f(x: ?i32) -> i32 { return x ?? 0; }",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_a = b.symbol("i32");
    let opt_ty = b.prefix(PrefixOp::OptionalWrap, i32_a);
    let five = b.int(5);
    let o_decl = b.var_decl("o", true, Some(opt_ty), Some(five));

    let i32_b = b.symbol("i32");
    let param_ty = b.prefix(PrefixOp::OptionalWrap, i32_b);
    let x_param = b.param("x", param_ty);
    let ret_ty = b.symbol("i32");
    let x_ref = b.symbol("x");
    let zero = b.int(0);
    let unwrap = b.bin(BinOp::UnwrapOptional, x_ref, zero);
    let ret = b.ret(Some(unwrap));
    let body = b.block(vec![ret]);
    let proto = b.fn_proto("f", vec![x_param], ret_ty);
    let def = b.fn_def(proto, body);

    let root = b.root(vec![o_decl, def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    assert_eq!(comp.ast.ann(five).cast_kind, Some(CastKind::OptionalWrap));
    assert!(matches!(
        comp.ast.const_val(five).data,
        ConstData::Optional(Some(_))
    ));
    assert_eq!(comp.ast.ty(unwrap), Some(comp.types.prim.i32));
}

#[test]
fn if_var_unwraps_optional() {
    // fn f(x: ?i32) -> i32 { if var v = x { v } else { 0 } }
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f(x: ?i32) -> i32 { if var v = x ... }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_a = b.symbol("i32");
    let param_ty = b.prefix(PrefixOp::OptionalWrap, i32_a);
    let x_param = b.param("x", param_ty);
    let ret_ty = b.symbol("i32");
    let x_ref = b.symbol("x");
    let v_ref = b.symbol("v");
    let zero = b.int(0);
    let if_var = b.if_var("v", x_ref, v_ref, Some(zero));
    let body = b.block(vec![if_var]);
    let proto = b.fn_proto("f", vec![x_param], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    // The binding takes the optional's payload type.
    let var = comp.ast.ann(if_var).resolved_var.unwrap();
    assert_eq!(comp.entities.var(var).ty, comp.types.prim.i32);
    assert_eq!(comp.ast.ty(v_ref), Some(comp.types.prim.i32));
}

#[test]
fn for_loop_binds_element_and_index() {
    // fn f(s: []i32) -> void { for (e, i in s) { s[i]; } }
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f(s: []i32) -> void { for ... }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_a = b.symbol("i32");
    let slice_ty = b.array_type(None, i32_a, false);
    let s_param = b.param("s", slice_ty);
    let ret_ty = b.symbol("void");
    let s_ref = b.symbol("s");
    let s_ref2 = b.symbol("s");
    let i_ref = b.symbol("i");
    let access = b.index(s_ref2, i_ref);
    let t_decl = b.var_decl("t", true, None, Some(access));
    let loop_body = b.block(vec![t_decl]);
    let for_node = b.for_expr("e", Some("i"), s_ref, loop_body);
    let body = b.block(vec![for_node]);
    let proto = b.fn_proto("f", vec![s_param], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    // The element variable has the slice's child type.
    let elem = comp.ast.ann(for_node).resolved_var.unwrap();
    assert_eq!(comp.entities.var(elem).ty, comp.types.prim.i32);
    // Indexing yields the child type; the index is an isize.
    assert_eq!(comp.ast.ty(access), Some(comp.types.prim.i32));
    assert_eq!(comp.ast.ty(i_ref), Some(comp.types.prim.isize));
}

#[test]
fn slicing_an_array_produces_a_slice() {
    // fn f() -> void { var a: [3]i32 = undefined; const s = a[0..2]; }
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { var a: [3]i32 = undefined; ... }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("void");
    let i32_a = b.symbol("i32");
    let three = b.int(3);
    let arr_ty = b.array_type(Some(three), i32_a, false);
    let undef = b.undefined_lit();
    let a_decl = b.var_decl("a", false, Some(arr_ty), Some(undef));
    let a_ref = b.symbol("a");
    let start = b.int(0);
    let end = b.int(2);
    let slice = b.slice(a_ref, start, Some(end), false);
    let s_decl = b.var_decl("s", true, None, Some(slice));
    let body = b.block(vec![a_decl, s_decl]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    let expected_ty = comp.types.slice_of(comp.types.prim.i32, false);
    assert_eq!(comp.ast.ty(slice), Some(expected_ty));
}

#[test]
fn sizeof_and_min_max_fold() {
    let mut comp = compilation();
    let file = comp.add_file(
        "main.mar",
        "const s = @sizeof(i32); const m = @max_value(u8); const n = @min_value(i8);",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let i32_ref = b.symbol("i32");
    let size = b.builtin("sizeof", vec![i32_ref]);
    let s_decl = b.var_decl("s", true, None, Some(size));
    let u8_ref = b.symbol("u8");
    let max = b.builtin("max_value", vec![u8_ref]);
    let m_decl = b.var_decl("m", true, None, Some(max));
    let i8_ref = b.symbol("i8");
    let min = b.builtin("min_value", vec![i8_ref]);
    let n_decl = b.var_decl("n", true, None, Some(min));
    let root = b.root(vec![s_decl, m_decl, n_decl]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    assert_eq!(comp.ast.const_val(size).as_num(), Some(&BigNum::from_u64(4)));
    assert_eq!(comp.ast.const_val(max).as_num(), Some(&BigNum::from_u64(255)));
    assert_eq!(comp.ast.const_val(min).as_num(), Some(&BigNum::from_i64(-128)));
}

#[test]
fn overflow_builtin_checks_result_alignment() {
    for misaligned in [false, true] {
        let mut comp = compilation();
        let file = comp.add_file("main.mar", "fn f(a: i32, b: i32) -> bool { ... }");
        let mut builder = NodeBuilder::new(&mut comp.ast, file);
        let i32_a = builder.symbol("i32");
        let a_param = builder.param("a", i32_a);
        let i32_b = builder.symbol("i32");
        let b_param = builder.param("b", i32_b);
        let ret_ty = builder.symbol("bool");

        let r_ty = builder.symbol(if misaligned { "i16" } else { "i32" });
        let zero = builder.int(0);
        let r_decl = builder.var_decl("r", false, Some(r_ty), Some(zero));
        let i32_arg = builder.symbol("i32");
        let a_ref = builder.symbol("a");
        let b_ref = builder.symbol("b");
        let r_ref = builder.symbol("r");
        let r_addr = builder.prefix(PrefixOp::AddressOf, r_ref);
        let call = builder.builtin("add_with_overflow", vec![i32_arg, a_ref, b_ref, r_addr]);
        let ret = builder.ret(Some(call));
        let body = builder.block(vec![r_decl, ret]);
        let proto = builder.fn_proto("f", vec![a_param, b_param], ret_ty);
        let def = builder.fn_def(proto, body);
        let root = builder.root(vec![def]);
        comp.set_root(file, root);

        comp.analyze();
        if misaligned {
            assert_eq!(comp.diagnostics.len(), 1);
            assert!(
                messages(&comp)[0].starts_with("misaligned result pointer"),
                "got: {:?}",
                messages(&comp)
            );
        } else {
            assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
            assert_eq!(comp.ast.ty(call), Some(comp.types.prim.bool_));
        }
    }
}

#[test]
fn variable_shadowing_primitive_type() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { const i32 = 5; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("void");
    let five = b.int(5);
    let decl = b.var_decl("i32", true, None, Some(five));
    let body = b.block(vec![decl]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["variable shadows type 'i32'"]);
}

#[test]
fn division_by_zero_in_constant() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { const x = 1 / 0; }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("void");
    let one = b.int(1);
    let zero = b.int(0);
    let div = b.bin(BinOp::Div, one, zero);
    let decl = b.var_decl("x", true, None, Some(div));
    let body = b.block(vec![decl]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(messages(&comp), vec!["division by zero"]);
}

#[test]
fn c_include_outside_c_import_rejected() {
    let mut comp = compilation();
    let file = comp.add_file("main.mar", "fn f() -> void { @c_include(\"stdio.h\"); }");
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let ret_ty = b.symbol("void");
    let header = b.string("stdio.h");
    let call = b.builtin("c_include", vec![header]);
    let body = b.block(vec![call]);
    let proto = b.fn_proto("f", vec![], ret_ty);
    let def = b.fn_def(proto, body);
    let root = b.root(vec![def]);
    comp.set_root(file, root);

    comp.analyze();
    assert_eq!(
        messages(&comp),
        vec!["@c_include valid only in c_import blocks"]
    );
}

/// Importer that synthesizes `extern fn puts(s: &const u8) -> i32` and
/// records the buffer it was handed.
struct FakeImporter {
    seen_buffer: std::rc::Rc<std::cell::RefCell<String>>,
}

impl CImporter for FakeImporter {
    fn import(
        &mut self,
        ast: &mut Ast,
        file: FileId,
        buffer: &str,
        _include_paths: &[String],
        _warnings: bool,
    ) -> Result<ParsedHeader, Vec<Diagnostic>> {
        *self.seen_buffer.borrow_mut() = buffer.to_string();
        let mut b = NodeBuilder::new(ast, file);
        let u8_ty = b.symbol("u8");
        let ptr_ty = b.prefix(PrefixOp::ConstAddressOf, u8_ty);
        let s_param = b.param("s", ptr_ty);
        let ret_ty = b.symbol("i32");
        let proto = b.fn_proto_full("puts", VisibMod::Pub, vec![s_param], ret_ty, false, true);
        let root = b.root(vec![proto]);
        Ok(ParsedHeader { root })
    }
}

#[test]
fn c_import_splices_header_declarations() {
    let mut comp = compilation();
    let seen_buffer = std::rc::Rc::new(std::cell::RefCell::new(String::new()));
    comp.c_importer = Some(Box::new(FakeImporter {
        seen_buffer: seen_buffer.clone(),
    }));

    let file = comp.add_file(
        "main.mar",
        "c_import { @c_include(\"stdio.h\"); } fn main() -> i32 { return puts(c\"hi\"); }",
    );
    let mut b = NodeBuilder::new(&mut comp.ast, file);
    let header = b.string("stdio.h");
    let include = b.builtin("c_include", vec![header]);
    let c_block = b.block(vec![include]);
    let c_import = b.c_import(c_block);

    let main_ret = b.symbol("i32");
    let puts_ref = b.symbol("puts");
    let arg = b.c_string("hi");
    let call = b.call(puts_ref, vec![arg]);
    let ret = b.ret(Some(call));
    let body = b.block(vec![ret]);
    let proto = b.fn_proto("main", vec![], main_ret);
    let def = b.fn_def(proto, body);

    let root = b.root(vec![c_import, def]);
    comp.set_root(file, root);

    comp.analyze();
    assert!(comp.diagnostics.is_empty(), "got: {:?}", messages(&comp));
    assert_eq!(&*seen_buffer.borrow(), "#include <stdio.h>\n");
    assert_eq!(comp.ast.ty(call), Some(comp.types.prim.i32));
}
