use ccomp::error::{Failure, TypeError};
use ccomp::grammer::ast::{Ast, NodeKind, Type};

fn check(code: &str) -> Result<Ast, TypeError> {
    let tokens = ccomp::lex(code).unwrap();
    let mut ast = ccomp::parse(tokens).unwrap();
    match ccomp::check(&mut ast) {
        Ok(()) => Ok(ast),
        Err(Failure::Type(err)) => Err(err),
        Err(other) => panic!("unexpected failure {other:?}"),
    }
}

fn error(code: &str) -> TypeError {
    match check(code) {
        Ok(_) => panic!("expected a type error:\n{code}"),
        Err(err) => err,
    }
}

macro_rules! accepts {
    ($name:ident, $code:expr) => {
        #[test]
        fn $name() {
            if let Err(err) = check($code) {
                panic!("{err} at {}", err.pos());
            }
        }
    };
}

macro_rules! rejects {
    ($name:ident, $code:expr, $pat:pat $(if $guard:expr)?) => {
        #[test]
        fn $name() {
            let err = error($code);
            assert!(matches!(err, $pat $(if $guard)?), "{err:?}");
        }
    };
}

accepts!(
    arithmetic_and_calls,
    "int add(int a, int b) { return a + b; }
     int main() { int x = add(1, 2) * 3; return x % 2; }"
);
accepts!(
    shadowing_in_inner_block,
    "int main() { int x = 1; { int x = 2; x = x + 1; } return x; }"
);
accepts!(
    pointers_and_arrays,
    "int main() { int a[3]; int *p = a + 1; *p = 4; p[1] = *p; return p - a; }"
);
accepts!(
    builtins_are_predeclared,
    "int main() { int *p = malloc(8); putchar('x'); free(p); return 0; }"
);
accepts!(
    prototype_then_definition,
    "int twice(int n); int main() { return twice(2); } int twice(int n) { return n * 2; }"
);
accepts!(
    switch_with_constant_labels,
    "int main() {
        int x = 2;
        switch (x) { case 1 + 1: break; case 'a': x = 0; default: break; }
        return x;
     }"
);
accepts!(
    loops_allow_break_and_continue,
    "int main() {
        int i;
        for (i = 0; i < 9; i++) { if (i > 3) break; continue; }
        while (i) i--;
        return i;
     }"
);
accepts!(
    typedefs_and_enums,
    "typedef int num; enum color { RED }; num main() { bool b = true; return b ? 1 : 0; }"
);

rejects!(
    block_scope_ends_with_block,
    "int main() { { int x = 1; } return x; }",
    TypeError::Undeclared(ref name, _) if name == "x"
);
rejects!(
    duplicate_in_same_scope,
    "int main() { int x = 1; int x = 2; return x; }",
    TypeError::Duplicate(ref name, _) if name == "x"
);
rejects!(
    duplicate_function,
    "int f() { return 0; } int f() { return 1; }",
    TypeError::Duplicate(..)
);
rejects!(
    float_index,
    "int main() { int a[3]; return a[1.5]; }",
    TypeError::Incompatible { found: Type::Float, .. }
);
rejects!(
    void_function_returns_value,
    "void f() { return 1; }",
    TypeError::Incompatible { .. } | TypeError::Misplaced(..)
);
rejects!(
    wrong_argument_count,
    "int f(int a) { return a; } int main() { return f(1, 2); }",
    TypeError::ArgCount { expected: 1, found: 2, .. }
);
rejects!(
    calling_a_variable,
    "int x; int main() { return x(); }",
    TypeError::NotCallable(..)
);
rejects!(
    break_outside_loop,
    "int main() { break; return 0; }",
    TypeError::Misplaced(..)
);
rejects!(
    assign_to_literal,
    "int main() { 1 = 2; return 0; }",
    TypeError::Misplaced(..)
);
rejects!(
    duplicate_case_label,
    "int main() { switch (1) { case 2: break; case 1 + 1: break; } return 0; }",
    TypeError::Misplaced(..)
);
rejects!(
    bitwise_on_float,
    "int main() { float f = 1.0; return f & 1; }",
    TypeError::InvalidOperand { .. }
);
rejects!(
    mismatched_pointer_levels,
    "int main() { int x; int *p = &x; int **q = p; return 0; }",
    TypeError::Incompatible { .. }
);
rejects!(
    void_variable,
    "int main() { void v; return 0; }",
    TypeError::Misplaced(..)
);

rejects!(
    char_index,
    "int main() { int a[100]; return a['c']; }",
    TypeError::Incompatible { found: Type::Char, .. }
);
rejects!(
    bitwise_on_char,
    "int main() { char c = 'a'; return c & 1; }",
    TypeError::InvalidOperand { ty: Type::Char, .. }
);
rejects!(
    shift_of_bool,
    "int main() { bool b = true; return b << 1; }",
    TypeError::InvalidOperand { ty: Type::Bool, .. }
);
rejects!(
    complement_of_char,
    "int main() { char c = 'a'; return ~c; }",
    TypeError::InvalidOperand { ty: Type::Char, .. }
);
rejects!(
    pointer_plus_char,
    "int main() { int a[3]; int *p = a + 'c'; return 0; }",
    TypeError::InvalidOperand { ty: Type::Char, .. }
);
rejects!(
    compound_on_bool,
    "int main() { bool b = true; b += 1; return 0; }",
    TypeError::InvalidOperand { ty: Type::Bool, .. }
);
rejects!(
    compound_on_double,
    "int main() { double d = 1.0; d *= 2; return 0; }",
    TypeError::InvalidOperand { ty: Type::Double, .. }
);
rejects!(
    compound_shift_of_char,
    "int main() { char c = 'a'; c <<= 1; return 0; }",
    TypeError::InvalidOperand { ty: Type::Char, .. }
);
accepts!(
    compound_on_char_and_float,
    "int main() {
        char c = 'a'; c += 1;
        float f = 1.0; f -= c;
        int n = 6; n &= 3; n <<= 1;
        return n;
     }"
);
accepts!(
    enum_constants_are_int,
    "enum color { RED }; int main() { enum color c; int a[2]; return a[c] | c; }"
);

#[test]
fn mixed_arithmetic_promotes() {
    let ast = check("int x = 1.5 + 'a';").unwrap();
    let NodeKind::Var { init: Some(init), .. } = ast.kind(ast.decls()[0]) else {
        panic!("expected an initialized variable");
    };
    assert_eq!(ast.ty(*init), Some(&Type::Float));
}

#[test]
fn comparisons_are_int() {
    let ast = check("char a = 'x'; int b = a < 'y';").unwrap();
    let NodeKind::Var { init: Some(init), .. } = ast.kind(ast.decls()[1]) else {
        panic!("expected an initialized variable");
    };
    assert_eq!(ast.ty(*init), Some(&Type::Int));
}
