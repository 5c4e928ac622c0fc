use crate::grammer::ast::{Ast, BinaryOp, NodeId, NodeKind, UnaryOp};

/// Fold an integer constant expression. `None` if any part is not constant,
/// or on division by zero.
pub fn constant(ast: &Ast, id: NodeId) -> Option<i64> {
    match ast.kind(id) {
        NodeKind::IntLit(v) => Some(*v),
        NodeKind::CharLit(ch) => Some(*ch as i64),
        NodeKind::BoolLit(b) => Some(*b as i64),
        NodeKind::Unary(op, x) => {
            let x = constant(ast, *x)?;
            match op {
                UnaryOp::Pos => Some(x),
                UnaryOp::Neg => Some(x.wrapping_neg()),
                UnaryOp::BitNot => Some(!x),
                UnaryOp::Not => Some((x == 0) as i64),
                _ => None,
            }
        }
        NodeKind::Binary(op, l, r) => {
            let (l, r) = (constant(ast, *l)?, constant(ast, *r)?);
            Some(match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => l.checked_div(r)?,
                BinaryOp::Mod => l.checked_rem(r)?,
                BinaryOp::And => l & r,
                BinaryOp::Or => l | r,
                BinaryOp::Xor => l ^ r,
                BinaryOp::Shl => l.wrapping_shl(r as u32),
                BinaryOp::Shr => l.wrapping_shr(r as u32),
                BinaryOp::Eq => (l == r) as i64,
                BinaryOp::Ne => (l != r) as i64,
                BinaryOp::Lt => (l < r) as i64,
                BinaryOp::Le => (l <= r) as i64,
                BinaryOp::Gt => (l > r) as i64,
                BinaryOp::Ge => (l >= r) as i64,
                BinaryOp::LogAnd => (l != 0 && r != 0) as i64,
                BinaryOp::LogOr => (l != 0 || r != 0) as i64,
            })
        }
        NodeKind::Ternary(c, t, e) => match constant(ast, *c)? {
            0 => constant(ast, *e),
            _ => constant(ast, *t),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammer::{lexer::Lexer, parser::parse};

    fn fold(expr: &str) -> Option<i64> {
        let ast = parse(Lexer::new(&format!("int x = {expr};")).parse()).unwrap();
        match ast.kind(ast.decls()[0]) {
            NodeKind::Var { init: Some(init), .. } => constant(&ast, *init),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn folds_integer_expressions() {
        assert_eq!(fold("1 + 2 * 3"), Some(7));
        assert_eq!(fold("-'a'"), Some(-97));
        assert_eq!(fold("1 << 4 | 1"), Some(17));
        assert_eq!(fold("3 > 2 ? 10 : 20"), Some(10));
    }

    #[test]
    fn rejects_non_constants() {
        assert_eq!(fold("1 / 0"), None);
        assert_eq!(fold("y + 1"), None);
    }
}
