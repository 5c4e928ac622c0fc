use ccomp::error::{Failure, ParseError};
use ccomp::grammer::ast::{Ast, BinaryOp, NodeId, NodeKind, Type};

fn parse(code: &str) -> Ast {
    let tokens = ccomp::lex(code).unwrap();
    match ccomp::parse(tokens) {
        Ok(ast) => ast,
        Err(failure) => panic!("{code}\n{:?}", failure.diagnostics()),
    }
}

fn errors(code: &str) -> Vec<ParseError> {
    let tokens = ccomp::lex(code).unwrap();
    match ccomp::parse(tokens) {
        Ok(_) => panic!("expected a syntax error:\n{code}"),
        Err(Failure::Parse(errors)) => errors,
        Err(other) => panic!("unexpected failure {other:?}"),
    }
}

/// Initializer of the first top level variable
fn init(ast: &Ast) -> NodeId {
    match ast.kind(ast.decls()[0]) {
        NodeKind::Var { init: Some(init), .. } => *init,
        other => panic!("not an initialized variable: {other:?}"),
    }
}

fn binary(ast: &Ast, id: NodeId) -> (BinaryOp, NodeId, NodeId) {
    match ast.kind(id) {
        NodeKind::Binary(op, l, r) => (*op, *l, *r),
        other => panic!("not a binary expression: {other:?}"),
    }
}

#[test]
fn subtraction_is_left_associative() {
    let ast = parse("int x = a - b - c;");
    let (op, l, r) = binary(&ast, init(&ast));
    assert_eq!(op, BinaryOp::Sub);
    assert_eq!(ast.kind(r), &NodeKind::Ident(format!("c")));
    let (op, l, r) = binary(&ast, l);
    assert_eq!(op, BinaryOp::Sub);
    assert_eq!(ast.kind(l), &NodeKind::Ident(format!("a")));
    assert_eq!(ast.kind(r), &NodeKind::Ident(format!("b")));
}

#[test]
fn multiplication_binds_tighter() {
    let ast = parse("int x = 1 + 2 * 3 == 7;");
    let (op, l, _) = binary(&ast, init(&ast));
    assert_eq!(op, BinaryOp::Eq);
    let (op, l, r) = binary(&ast, l);
    assert_eq!(op, BinaryOp::Add);
    assert_eq!(ast.kind(l), &NodeKind::IntLit(1));
    assert_eq!(binary(&ast, r).0, BinaryOp::Mul);
}

#[test]
fn assignment_is_right_associative() {
    let ast = parse("int f() { a = b += 1; }");
    let NodeKind::Function { body: Some(body), .. } = ast.kind(ast.decls()[0]) else {
        panic!("expected a function");
    };
    let NodeKind::Block(stmts) = ast.kind(*body) else {
        panic!("expected a block");
    };
    let NodeKind::Expr(Some(expr)) = ast.kind(stmts[0]) else {
        panic!("expected an expression statement");
    };
    let NodeKind::Assign(None, _, value) = ast.kind(*expr) else {
        panic!("expected a plain assignment");
    };
    assert!(matches!(ast.kind(*value), NodeKind::Assign(Some(BinaryOp::Add), ..)));
}

#[test]
fn ternary_nests_to_the_right() {
    let ast = parse("int x = a ? 1 : b ? 2 : 3;");
    let NodeKind::Ternary(_, _, els) = ast.kind(init(&ast)) else {
        panic!("expected a conditional");
    };
    assert!(matches!(ast.kind(*els), NodeKind::Ternary(..)));
}

#[test]
fn array_sizes_come_from_initializers() {
    let ast = parse("int a[] = {1, 2, 3}; char s[] = \"abc\"; int b[4];");
    let types: Vec<Type> = ast
        .decls()
        .iter()
        .map(|&decl| match ast.kind(decl) {
            NodeKind::Var { ty, .. } => ty.clone(),
            other => panic!("{other:?}"),
        })
        .collect();
    assert_eq!(
        types,
        vec![
            Type::Array(Box::new(Type::Int), 3),
            Type::Array(Box::new(Type::Char), 4),
            Type::Array(Box::new(Type::Int), 4),
        ]
    );
}

#[test]
fn typedef_names_are_types() {
    let ast = parse("typedef int num; num x = 3;");
    let typedef = ast.kind(ast.decls()[0]);
    assert!(matches!(typedef, NodeKind::Typedef(name, Type::Int) if name == "num"));
    assert!(matches!(ast.kind(ast.decls()[1]), NodeKind::Var { ty: Type::Int, .. }));
}

#[test]
fn prototypes_and_declarator_lists() {
    let ast = parse("int f(void); int *p, q;");
    assert!(matches!(
        ast.kind(ast.decls()[0]),
        NodeKind::Function { params, body: None, .. } if params.is_empty()
    ));
    let NodeKind::Decls(decls) = ast.kind(ast.decls()[1]) else {
        panic!("expected a declarator list");
    };
    assert!(matches!(ast.kind(decls[0]), NodeKind::Var { ty: Type::Pointer(_), .. }));
    assert!(matches!(ast.kind(decls[1]), NodeKind::Var { ty: Type::Int, .. }));
}

#[test]
fn statements() {
    let ast = parse(
        "int main() {
            for (int i = 0; i < 3; i++) { if (i) continue; else break; }
            while (1) ;
            switch (x) { case 1: y = 2; case 2: break; default: ; }
            return;
        }",
    );
    let NodeKind::Function { body: Some(body), .. } = ast.kind(ast.decls()[0]) else {
        panic!("expected a function");
    };
    let NodeKind::Block(stmts) = ast.kind(*body) else {
        panic!("expected a block");
    };
    assert!(matches!(
        ast.kind(stmts[0]),
        NodeKind::For { init: Some(_), cond: Some(_), step: Some(_), .. }
    ));
    assert!(matches!(ast.kind(stmts[1]), NodeKind::While(..)));
    let NodeKind::Switch(_, cases) = ast.kind(stmts[2]) else {
        panic!("expected a switch");
    };
    assert_eq!(cases.len(), 3);
    assert!(matches!(ast.kind(cases[2]), NodeKind::Case(None, _)));
    assert_eq!(ast.kind(stmts[3]), &NodeKind::Return(None));
}

#[test]
fn struct_bodies_are_skipped() {
    let ast = parse("struct point { int x; int y; }; int main() { return 0; }");
    assert!(matches!(ast.kind(ast.decls()[0]), NodeKind::Struct(name) if name == "point"));
    assert!(matches!(ast.kind(ast.decls()[1]), NodeKind::Function { .. }));
}

#[test]
fn error_points_at_the_offending_token() {
    let errors = errors("int main(){return 1+;}");
    assert_eq!(errors.len(), 1);
    assert_eq!((errors[0].pos.line, errors[0].pos.col), (1, 21));
    assert_eq!(errors[0].to_string(), "expected expression, found `;`");
}

#[test]
fn recovery_collects_every_error() {
    let errors = errors(
        "int main() {
            int x = ;
            int y = 1 +;
            return 0;
        }",
    );
    let lines: Vec<usize> = errors.iter().map(|e| e.pos.line).collect();
    assert_eq!(lines, vec![2, 3]);
}

#[test]
fn missing_brace_reports_end_of_file() {
    let errors = errors("int main() { return 0;");
    assert_eq!(errors.last().map(|e| e.found.as_str()), Some("end of file"));
}
