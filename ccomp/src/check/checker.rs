use super::constant::constant;
use super::scope::{Scopes, Symbol, SymbolKind};
use crate::error::TypeError;
use crate::grammer::ast::{Ast, BinaryOp, NodeId, NodeKind, Param, Type, UnaryOp};
use crate::grammer::token::Pos;
use std::collections::BTreeSet;

/// Check the whole program and record every expression's type in the arena.
/// The first failure aborts.
pub fn check(ast: &mut Ast) -> Result<(), TypeError> {
    let decls = ast.decls().to_vec();
    let mut checker = Checker::new(ast);
    for decl in decls {
        checker.check_decl(decl)?;
    }
    Ok(())
}

/// Structurally equal, both numeric, or related through pointer decay.
pub fn compatible(a: &Type, b: &Type) -> bool {
    if a == b || (a.is_numeric() && b.is_numeric()) {
        return true;
    }
    match (a, b) {
        (Type::Pointer(x), Type::Pointer(y)) => **x == Type::Void || **y == Type::Void || x == y,
        (Type::Pointer(p), Type::Array(e, _)) | (Type::Array(e, _), Type::Pointer(p)) => {
            **p == Type::Void || p == e
        }
        (Type::Array(x, _), Type::Array(y, _)) => x == y,
        _ => false,
    }
}

/// Promotion order: double > float > int > char > bool
pub fn common(a: &Type, b: &Type) -> Type {
    let rank = |ty: &Type| match ty {
        Type::Double => 5,
        Type::Float => 4,
        Type::Int | Type::Enum(_) => 3,
        Type::Char => 2,
        Type::Bool => 1,
        _ => 0,
    };
    match rank(a) >= rank(b) {
        true => promote(a),
        false => promote(b),
    }
}

fn promote(ty: &Type) -> Type {
    match ty {
        Type::Enum(_) => Type::Int,
        other => other.clone(),
    }
}

struct Checker<'a> {
    ast: &'a mut Ast,
    scopes: Scopes,
    ret: Option<Type>,
    loops: usize,
    switches: usize,
}

impl<'a> Checker<'a> {
    fn new(ast: &'a mut Ast) -> Self {
        Checker { ast, scopes: Scopes::new(), ret: None, loops: 0, switches: 0 }
    }

    fn declare(&mut self, symbol: Symbol, pos: Pos) -> Result<(), TypeError> {
        let name = symbol.name.clone();
        match self.scopes.declare(symbol) {
            true => Ok(()),
            false => Err(TypeError::Duplicate(name, pos)),
        }
    }

    fn typed(&mut self, id: NodeId, ty: Type) -> Result<Type, TypeError> {
        self.ast.set_ty(id, ty.clone());
        Ok(ty)
    }
}

// ----------------------------------------------------------------------------
// Declarations
// ----------------------------------------------------------------------------

impl<'a> Checker<'a> {
    fn check_decl(&mut self, id: NodeId) -> Result<(), TypeError> {
        let pos = self.ast.pos(id);
        match self.ast.kind(id).clone() {
            NodeKind::Function { name, ret, params, body } => {
                self.check_function(id, name, ret, params, body)
            }
            NodeKind::Var { name, ty, init } => self.check_var(id, name, ty, init),
            NodeKind::Decls(decls) => {
                for decl in decls {
                    self.check_decl(decl)?;
                }
                Ok(())
            }
            NodeKind::Struct(name) => {
                let ty = Type::Struct(name.clone());
                let symbol = Symbol::new(&name, SymbolKind::Struct, ty, Some(id));
                self.declare(symbol, pos)
            }
            NodeKind::Enum(name) => {
                let ty = Type::Enum(name.clone());
                let symbol = Symbol::new(&name, SymbolKind::Enum, ty, Some(id));
                self.declare(symbol, pos)
            }
            NodeKind::Typedef(name, ty) => {
                self.declare(Symbol::new(name, SymbolKind::Typedef, ty, Some(id)), pos)
            }
            _ => Err(TypeError::Misplaced("expected a declaration".to_string(), pos)),
        }
    }

    fn check_function(
        &mut self,
        id: NodeId,
        name: String,
        ret: Type,
        params: Vec<Param>,
        body: Option<NodeId>,
    ) -> Result<(), TypeError> {
        let pos = self.ast.pos(id);
        let param_types = params.iter().map(|p| p.ty.clone()).collect();
        let ty = Type::Function(Box::new(ret.clone()), param_types);
        self.ast.set_ty(id, ty.clone());
        let symbol = Symbol::new(&name, SymbolKind::Function, ty.clone(), Some(id));

        // A prototype may be repeated, and completed once by a definition
        match self.scopes.lookup_local(&name) {
            None => self.scopes.define(symbol),
            Some(prev) if prev.kind == SymbolKind::Function && prev.ty == ty => {
                let defined = prev.node.is_some_and(|node| {
                    matches!(self.ast.kind(node), NodeKind::Function { body: Some(_), .. })
                });
                if defined && body.is_some() {
                    return Err(TypeError::Duplicate(name, pos));
                }
                if !defined {
                    self.scopes.define(symbol);
                }
            }
            Some(_) => return Err(TypeError::Duplicate(name, pos)),
        }

        let Some(body) = body else {
            return Ok(());
        };

        // Parameters share the frame of the body block
        self.scopes.enter();
        self.ret = Some(ret);
        let result = self.check_body(id, &params, body);
        self.ret = None;
        self.scopes.leave();
        result
    }

    fn check_body(
        &mut self,
        func: NodeId,
        params: &[Param],
        body: NodeId,
    ) -> Result<(), TypeError> {
        let pos = self.ast.pos(func);
        for param in params {
            if let Some(name) = &param.name {
                let symbol = Symbol::new(name, SymbolKind::Variable, param.ty.clone(), Some(func));
                self.declare(symbol, pos)?;
            }
        }
        match self.ast.kind(body).clone() {
            NodeKind::Block(stmts) => {
                for stmt in stmts {
                    self.check_stmt(stmt)?;
                }
                Ok(())
            }
            _ => self.check_stmt(body),
        }
    }

    fn check_var(
        &mut self,
        id: NodeId,
        name: String,
        ty: Type,
        init: Option<NodeId>,
    ) -> Result<(), TypeError> {
        let pos = self.ast.pos(id);
        if ty == Type::Void {
            return Err(TypeError::Misplaced(format!("variable `{name}` declared void"), pos));
        }
        if let Some(init) = init {
            self.check_init(&ty, init)?;
        }
        self.ast.set_ty(id, ty.clone());
        self.declare(Symbol::new(name, SymbolKind::Variable, ty, Some(id)), pos)
    }

    fn check_init(&mut self, ty: &Type, init: NodeId) -> Result<(), TypeError> {
        let pos = self.ast.pos(init);
        match self.ast.kind(init).clone() {
            NodeKind::InitList(items) => {
                let Type::Array(elem, size) = ty else {
                    return Err(TypeError::Misplaced(format!("initializer list for `{ty}`"), pos));
                };
                if items.len() > *size {
                    return Err(TypeError::Misplaced("too many initializers".to_string(), pos));
                }
                for item in items {
                    let found = self.check_expr(item)?;
                    if !compatible(elem, &found) {
                        let pos = self.ast.pos(item);
                        let expected = (**elem).clone();
                        return Err(TypeError::Incompatible { expected, found, pos });
                    }
                }
                self.ast.set_ty(init, ty.clone());
                Ok(())
            }
            _ => {
                let found = self.check_expr(init)?;
                match compatible(ty, &found) {
                    true => Ok(()),
                    false => Err(TypeError::Incompatible { expected: ty.clone(), found, pos }),
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------------

impl<'a> Checker<'a> {
    fn check_stmt(&mut self, id: NodeId) -> Result<(), TypeError> {
        let pos = self.ast.pos(id);
        match self.ast.kind(id).clone() {
            NodeKind::Block(stmts) => {
                self.scopes.enter();
                let result = stmts.into_iter().try_for_each(|stmt| self.check_stmt(stmt));
                self.scopes.leave();
                result
            }
            NodeKind::If(cond, then, els) => {
                self.check_cond(cond)?;
                self.check_stmt(then)?;
                match els {
                    Some(els) => self.check_stmt(els),
                    None => Ok(()),
                }
            }
            NodeKind::While(cond, body) => {
                self.check_cond(cond)?;
                self.check_loop(body)
            }
            NodeKind::For { init, cond, step, body } => {
                self.scopes.enter();
                let result = self.check_for(init, cond, step, body);
                self.scopes.leave();
                result
            }
            NodeKind::Switch(cond, cases) => {
                let ty = self.check_expr(cond)?;
                if !ty.is_integer() {
                    return Err(TypeError::InvalidOperand { op: "switch".to_string(), ty, pos });
                }
                self.scopes.enter();
                self.switches += 1;
                let result = self.check_cases(&cases);
                self.switches -= 1;
                self.scopes.leave();
                result
            }
            NodeKind::Case(..) => {
                Err(TypeError::Misplaced("`case` outside of a switch".to_string(), pos))
            }
            NodeKind::Return(value) => self.check_return(value, pos),
            NodeKind::Break if self.loops + self.switches == 0 => {
                Err(TypeError::Misplaced("`break` outside of a loop or switch".to_string(), pos))
            }
            NodeKind::Continue if self.loops == 0 => {
                Err(TypeError::Misplaced("`continue` outside of a loop".to_string(), pos))
            }
            NodeKind::Break | NodeKind::Continue => Ok(()),
            NodeKind::Expr(expr) => {
                if let Some(expr) = expr {
                    self.check_expr(expr)?;
                }
                Ok(())
            }
            NodeKind::Function { name, .. } => {
                let msg = format!("function `{name}` defined inside a function");
                Err(TypeError::Misplaced(msg, pos))
            }
            _ => self.check_decl(id),
        }
    }

    fn check_cond(&mut self, cond: NodeId) -> Result<(), TypeError> {
        let ty = self.check_expr(cond)?;
        match ty.is_scalar() {
            true => Ok(()),
            false => {
                let op = "condition".to_string();
                Err(TypeError::InvalidOperand { op, ty, pos: self.ast.pos(cond) })
            }
        }
    }

    fn check_loop(&mut self, body: NodeId) -> Result<(), TypeError> {
        self.loops += 1;
        let result = self.check_stmt(body);
        self.loops -= 1;
        result
    }

    fn check_for(
        &mut self,
        init: Option<NodeId>,
        cond: Option<NodeId>,
        step: Option<NodeId>,
        body: NodeId,
    ) -> Result<(), TypeError> {
        if let Some(init) = init {
            match self.ast.kind(init) {
                NodeKind::Var { .. } | NodeKind::Decls(_) => self.check_decl(init)?,
                _ => {
                    self.check_expr(init)?;
                }
            }
        }
        if let Some(cond) = cond {
            self.check_cond(cond)?;
        }
        if let Some(step) = step {
            self.check_expr(step)?;
        }
        self.check_loop(body)
    }

    fn check_cases(&mut self, cases: &[NodeId]) -> Result<(), TypeError> {
        let mut seen = BTreeSet::new();
        let mut default = false;
        for &case in cases {
            let pos = self.ast.pos(case);
            let NodeKind::Case(value, body) = self.ast.kind(case).clone() else {
                return Err(TypeError::Misplaced("expected `case` or `default`".to_string(), pos));
            };
            match value {
                Some(value) => {
                    let ty = self.check_expr(value)?;
                    let Some(label) = constant(self.ast, value).filter(|_| ty.is_integer()) else {
                        let msg = "case label is not an integer constant".to_string();
                        return Err(TypeError::Misplaced(msg, self.ast.pos(value)));
                    };
                    if !seen.insert(label) {
                        let msg = format!("duplicate case value `{label}`");
                        return Err(TypeError::Misplaced(msg, pos));
                    }
                }
                None if default => {
                    return Err(TypeError::Misplaced("multiple `default` labels".to_string(), pos));
                }
                None => default = true,
            }
            for stmt in body {
                self.check_stmt(stmt)?;
            }
        }
        Ok(())
    }

    fn check_return(&mut self, value: Option<NodeId>, pos: Pos) -> Result<(), TypeError> {
        let Some(expected) = self.ret.clone() else {
            return Err(TypeError::Misplaced("`return` outside of a function".to_string(), pos));
        };
        let Some(value) = value else {
            return Ok(());
        };
        let found = self.check_expr(value)?;
        let ok = match expected {
            Type::Void => false,
            _ => compatible(&expected, &found),
        };
        match ok {
            true => Ok(()),
            false => Err(TypeError::Incompatible { expected, found, pos: self.ast.pos(value) }),
        }
    }
}

// ----------------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------------

fn invalid(op: impl ToString, ty: &Type, pos: Pos) -> TypeError {
    TypeError::InvalidOperand { op: op.to_string(), ty: ty.clone(), pos }
}

impl<'a> Checker<'a> {
    fn check_expr(&mut self, id: NodeId) -> Result<Type, TypeError> {
        let pos = self.ast.pos(id);
        let ty = match self.ast.kind(id).clone() {
            NodeKind::IntLit(_) => Type::Int,
            NodeKind::FloatLit(_) => Type::Float,
            NodeKind::CharLit(_) => Type::Char,
            NodeKind::BoolLit(_) => Type::Bool,
            NodeKind::StrLit(text) => Type::Array(Box::new(Type::Char), text.chars().count() + 1),

            NodeKind::Ident(name) => match self.scopes.lookup(&name) {
                Some(Symbol { kind: SymbolKind::Variable | SymbolKind::Function, ty, .. }) => {
                    ty.clone()
                }
                Some(_) => {
                    let msg = format!("`{name}` is a type, not a value");
                    return Err(TypeError::Misplaced(msg, pos));
                }
                None => return Err(TypeError::Undeclared(name, pos)),
            },

            NodeKind::Binary(op, l, r) => {
                let lt = self.check_expr(l)?;
                let rt = self.check_expr(r)?;
                self.check_binary(op, &lt, &rt, pos)?
            }

            NodeKind::Unary(op, x) => {
                let ty = self.check_expr(x)?;
                self.check_unary(op, x, ty, pos)?
            }

            NodeKind::Postfix(op, x) => {
                let ty = self.check_expr(x)?;
                self.check_step(op, x, ty, pos)?
            }

            NodeKind::Assign(op, target, value) => {
                let tt = self.check_expr(target)?;
                let vt = self.check_expr(value)?;
                if !self.is_lvalue(target) {
                    let msg = "left side of assignment is not assignable".to_string();
                    return Err(TypeError::Misplaced(msg, pos));
                }
                // Compound assignment takes int, char or float; the bitwise forms int only
                if let Some(op) = op {
                    let bad = [&tt, &vt]
                        .into_iter()
                        .find(|ty| !ty.is_arithmetic() || (op.is_bitwise() && !ty.is_int()));
                    if let Some(ty) = bad {
                        return Err(invalid(format!("{op}="), ty, pos));
                    }
                }
                if !compatible(&tt, &vt) {
                    return Err(TypeError::Incompatible { expected: tt, found: vt, pos });
                }
                tt
            }

            NodeKind::Ternary(c, t, e) => {
                self.check_cond(c)?;
                let tt = self.check_expr(t)?;
                let et = self.check_expr(e)?;
                if !compatible(&tt, &et) {
                    return Err(TypeError::Incompatible { expected: tt, found: et, pos });
                }
                match tt.is_numeric() && et.is_numeric() {
                    true => common(&tt, &et),
                    false => tt,
                }
            }

            NodeKind::Call(callee, args) => self.check_call(callee, &args, pos)?,

            NodeKind::Index(base, index) => {
                let bt = self.check_expr(base)?;
                let it = self.check_expr(index)?;
                let Some(elem) = bt.elem() else {
                    return Err(invalid("[]", &bt, pos));
                };
                if !it.is_int() {
                    let pos = self.ast.pos(index);
                    return Err(TypeError::Incompatible { expected: Type::Int, found: it, pos });
                }
                elem.clone()
            }

            // Member lists are not recorded, so every field reads as int
            NodeKind::Member(base, _, _) => {
                self.check_expr(base)?;
                Type::Int
            }

            _ => return Err(TypeError::Misplaced("expected an expression".to_string(), pos)),
        };
        self.typed(id, ty)
    }

    fn check_binary(
        &self,
        op: BinaryOp,
        lt: &Type,
        rt: &Type,
        pos: Pos,
    ) -> Result<Type, TypeError> {
        use BinaryOp::*;
        match op {
            LogAnd | LogOr => Ok(Type::Int),

            _ if op.is_comparison() => {
                let pointer_vs_int = (lt.is_pointer_like() && rt.is_integer())
                    || (lt.is_integer() && rt.is_pointer_like());
                match compatible(lt, rt) || pointer_vs_int {
                    true => Ok(Type::Int),
                    false => {
                        let (expected, found) = (lt.clone(), rt.clone());
                        Err(TypeError::Incompatible { expected, found, pos })
                    }
                }
            }

            _ if op.is_bitwise() => match (lt.is_int(), rt.is_int()) {
                (true, true) => Ok(Type::Int),
                (false, _) => Err(invalid(op, lt, pos)),
                (_, false) => Err(invalid(op, rt, pos)),
            },

            // Pointer arithmetic
            Add | Sub if lt.is_pointer_like() || rt.is_pointer_like() => {
                match (lt.elem(), rt.elem()) {
                    (Some(elem), None) if rt.is_int() => Ok(Type::pointer(elem.clone())),
                    (None, Some(elem)) if op == Add && lt.is_int() => {
                        Ok(Type::pointer(elem.clone()))
                    }
                    (Some(_), Some(_)) if op == Sub && compatible(lt, rt) => Ok(Type::Int),
                    (Some(_), _) => Err(invalid(op, rt, pos)),
                    _ => Err(invalid(op, lt, pos)),
                }
            }

            _ => {
                if !lt.is_numeric() {
                    return Err(invalid(op, lt, pos));
                }
                if !rt.is_numeric() {
                    return Err(invalid(op, rt, pos));
                }
                Ok(common(lt, rt))
            }
        }
    }

    fn check_unary(&self, op: UnaryOp, x: NodeId, ty: Type, pos: Pos) -> Result<Type, TypeError> {
        match op {
            UnaryOp::Pos | UnaryOp::Neg if ty.is_numeric() => Ok(promote(&ty)),
            UnaryOp::Not if ty.is_scalar() => Ok(Type::Int),
            UnaryOp::BitNot if ty.is_int() => Ok(Type::Int),
            UnaryOp::Deref => match ty.elem() {
                Some(Type::Void) | None => Err(invalid(op, &ty, pos)),
                Some(elem) => Ok(elem.clone()),
            },
            UnaryOp::Addr => Ok(Type::pointer(ty)),
            UnaryOp::PreInc | UnaryOp::PreDec => self.check_step(op, x, ty, pos),
            _ => Err(invalid(op, &ty, pos)),
        }
    }

    /// `++` and `--` in either position
    fn check_step(
        &self,
        op: impl ToString,
        x: NodeId,
        ty: Type,
        pos: Pos,
    ) -> Result<Type, TypeError> {
        if !(ty.is_numeric() || matches!(ty, Type::Pointer(_))) {
            return Err(invalid(op, &ty, pos));
        }
        if !self.is_lvalue(x) {
            let msg = format!("operand of `{}` is not assignable", op.to_string());
            return Err(TypeError::Misplaced(msg, pos));
        }
        Ok(ty)
    }

    fn check_call(&mut self, callee: NodeId, args: &[NodeId], pos: Pos) -> Result<Type, TypeError> {
        let name = match self.ast.kind(callee) {
            NodeKind::Ident(name) => name.clone(),
            _ => "expression".to_string(),
        };
        let Type::Function(ret, params) = self.check_expr(callee)? else {
            return Err(TypeError::NotCallable(name, pos));
        };
        if args.len() != params.len() {
            let (expected, found) = (params.len(), args.len());
            return Err(TypeError::ArgCount { name, expected, found, pos });
        }
        for (&arg, param) in args.iter().zip(params.iter()) {
            let found = self.check_expr(arg)?;
            if !compatible(param, &found) {
                let pos = self.ast.pos(arg);
                return Err(TypeError::Incompatible { expected: param.clone(), found, pos });
            }
        }
        Ok(*ret)
    }

    fn is_lvalue(&self, id: NodeId) -> bool {
        match self.ast.kind(id) {
            NodeKind::Ident(_) | NodeKind::Index(..) | NodeKind::Member(..) => {
                !matches!(self.ast.ty(id), Some(Type::Array(..) | Type::Function(..)))
            }
            NodeKind::Unary(UnaryOp::Deref, _) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_types_are_compatible() {
        assert!(compatible(&Type::Int, &Type::Float));
        assert!(compatible(&Type::Char, &Type::Bool));
        assert!(!compatible(&Type::Int, &Type::pointer(Type::Int)));
    }

    #[test]
    fn arrays_decay_to_pointers() {
        let array = Type::Array(Box::new(Type::Int), 4);
        assert!(compatible(&Type::pointer(Type::Int), &array));
        assert!(compatible(&Type::pointer(Type::Void), &Type::pointer(Type::Char)));
        assert!(!compatible(&Type::pointer(Type::Char), &array));
    }

    #[test]
    fn promotion_order() {
        assert_eq!(common(&Type::Float, &Type::Char), Type::Float);
        assert_eq!(common(&Type::Char, &Type::Int), Type::Int);
        assert_eq!(common(&Type::Bool, &Type::Char), Type::Char);
        assert_eq!(common(&Type::Int, &Type::Double), Type::Double);
    }
}
