use super::{
    add_imm, branch, cmp, constant_into, function_label, label, loadi, mem, mov, rrr, unary, Code,
    Codegen, Line, Place,
};
use crate::error::CodegenError;
use crate::grammer::ast::{BinaryOp, NodeId, NodeKind, PostfixOp, Type, UnaryOp};
use arch::abi;
use arch::inst::{Imm, Inst};
use arch::op::OpKind;
use arch::reg::Reg;
use itertools::chain;

/// An assignable location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Word at `FP + offset`
    Frame(i64),
    /// Word at the address held in a register
    Addr(Reg),
}

fn arith(op: BinaryOp) -> OpKind {
    match op {
        BinaryOp::Add => OpKind::ADD,
        BinaryOp::Sub => OpKind::SUB,
        BinaryOp::Mul => OpKind::MUL,
        BinaryOp::Div => OpKind::DIV,
        BinaryOp::Mod => OpKind::MOD,
        BinaryOp::And => OpKind::AND,
        BinaryOp::Or => OpKind::OR,
        BinaryOp::Xor => OpKind::XOR,
        BinaryOp::Shl => OpKind::SHL,
        _ => OpKind::SHR,
    }
}

/// Branch taken when the comparison holds. `>` compares with swapped operands.
fn jump(op: BinaryOp) -> OpKind {
    match op {
        BinaryOp::Eq => OpKind::JZ,
        BinaryOp::Ne => OpKind::JNZ,
        BinaryOp::Le => OpKind::JLE,
        BinaryOp::Ge => OpKind::JGE,
        _ => OpKind::JLT,
    }
}

/// `r = r * 4`
fn scale(r: Reg) -> Code {
    vec![
        loadi(abi::SCRATCH, Imm::Lit(abi::WORD as i64)),
        rrr(OpKind::MUL, r, r, abi::SCRATCH),
    ]
}

fn load(access: Access, rd: Reg) -> Code {
    match access {
        Access::Frame(offset) => mem(OpKind::LOAD, rd, Reg::FP, offset),
        Access::Addr(addr) => mem(OpKind::LOAD, rd, addr, 0),
    }
}

fn store(access: Access, rs: Reg) -> Code {
    match access {
        Access::Frame(offset) => mem(OpKind::STORE, rs, Reg::FP, offset),
        Access::Addr(addr) => mem(OpKind::STORE, rs, addr, 0),
    }
}

impl<'a> Codegen<'a> {
    pub(crate) fn unsupported(&self, what: impl Into<String>, id: NodeId) -> CodegenError {
        CodegenError::Unsupported(what.into(), self.ast.pos(id))
    }

    fn ty(&self, id: NodeId) -> Type {
        self.ast.ty(id).cloned().unwrap_or(Type::Int)
    }

    /// Evaluate into a fresh temporary
    pub(crate) fn expr(&mut self, id: NodeId) -> Result<(Code, Reg), CodegenError> {
        let ast = self.ast;
        if ast.ty(id).is_some_and(Type::is_float) {
            return Err(self.unsupported("floating-point value", id));
        }
        match ast.kind(id) {
            NodeKind::IntLit(v) => Ok(self.constant(*v)),
            NodeKind::CharLit(ch) => Ok(self.constant(*ch as i64)),
            NodeKind::BoolLit(b) => Ok(self.constant(*b as i64)),
            NodeKind::FloatLit(_) => Err(self.unsupported("floating-point value", id)),

            NodeKind::StrLit(text) => {
                let name = self.string(text);
                let d = self.temps.alloc();
                Ok((vec![loadi(d, Imm::label(name))], d))
            }

            NodeKind::Ident(name) => self.name(name, id),
            NodeKind::Binary(op, l, r) => self.binary(*op, *l, *r),
            NodeKind::Unary(op, x) => self.unary(*op, *x, id),
            NodeKind::Postfix(op, x) => self.step(*x, *op == PostfixOp::Inc, true),
            NodeKind::Assign(op, target, value) => self.assign(*op, *target, *value),
            NodeKind::Ternary(c, t, e) => self.ternary(*c, *t, *e),
            NodeKind::Call(callee, args) => self.call(*callee, args, id),

            NodeKind::Index(..) | NodeKind::Member(..) => {
                let (code, access) = self.lvalue(id)?;
                let d = self.temps.alloc();
                Ok((chain!(code, load(access, d)).collect(), d))
            }

            _ => Err(self.unsupported("expression", id)),
        }
    }

    fn constant(&mut self, v: i64) -> (Code, Reg) {
        let d = self.temps.alloc();
        (constant_into(d, v), d)
    }

    fn name(&mut self, name: &str, id: NodeId) -> Result<(Code, Reg), CodegenError> {
        let d = self.temps.alloc();
        let code = match self.place(name) {
            Some(Place::Frame(offset, _)) => mem(OpKind::LOAD, d, Reg::FP, offset),
            // An array name is its address
            Some(Place::Global(label, Type::Array(..))) | Some(Place::Function(label)) => {
                vec![loadi(d, Imm::label(label))]
            }
            Some(Place::Global(label, _)) => vec![
                loadi(d, Imm::label(label)),
                Line::Inst(Inst::MEM(OpKind::LOAD, d, d, Imm::Lit(0))),
            ],
            None => return Err(self.unsupported(format!("`{name}` used as a value"), id)),
        };
        Ok((code, d))
    }

    /// Location of an assignable expression
    pub(crate) fn lvalue(&mut self, id: NodeId) -> Result<(Code, Access), CodegenError> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Ident(name) => match self.place(name) {
                Some(Place::Frame(offset, _)) => Ok((Vec::new(), Access::Frame(offset))),
                Some(Place::Global(label, _)) | Some(Place::Function(label)) => {
                    let a = self.temps.alloc();
                    Ok((vec![loadi(a, Imm::label(label))], Access::Addr(a)))
                }
                None => Err(self.unsupported(format!("`{name}` is not assignable"), id)),
            },

            // base + index * 4
            NodeKind::Index(base, index) => {
                let (bc, b) = self.expr(*base)?;
                let (ic, i) = self.expr(*index)?;
                let code = chain!(bc, ic, scale(i), vec![rrr(OpKind::ADD, b, b, i)]).collect();
                Ok((code, Access::Addr(b)))
            }

            NodeKind::Unary(UnaryOp::Deref, x) => {
                let (code, addr) = self.expr(*x)?;
                Ok((code, Access::Addr(addr)))
            }

            NodeKind::Member(..) => Err(self.unsupported("struct member access", id)),
            _ => Err(self.unsupported("address of a value that is not an lvalue", id)),
        }
    }

    fn address(&mut self, x: NodeId) -> Result<(Code, Reg), CodegenError> {
        if matches!(self.ty(x), Type::Array(..)) {
            return self.expr(x);
        }
        match self.lvalue(x)? {
            (code, Access::Addr(a)) => Ok((code, a)),
            (code, Access::Frame(offset)) => {
                let d = self.temps.alloc();
                Ok((chain!(code, add_imm(d, Reg::FP, offset)).collect(), d))
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, l: NodeId, r: NodeId) -> Result<(Code, Reg), CodegenError> {
        if op.is_logical() {
            return self.logical(op, l, r);
        }
        let (lt, rt) = (self.ty(l), self.ty(r));
        let (lc, a) = self.expr(l)?;
        let (rc, b) = self.expr(r)?;

        // CMP a, b; LOADI d, #1; Jcc done; LOADI d, #0; done:
        if op.is_comparison() {
            let d = self.temps.alloc();
            let done = format!(".L{}_cmp", self.label());
            let (x, y) = if op == BinaryOp::Gt { (b, a) } else { (a, b) };
            let code = chain!(
                lc,
                rc,
                vec![
                    cmp(x, y),
                    loadi(d, Imm::Lit(1)),
                    branch(jump(op), &done),
                    loadi(d, Imm::Lit(0)),
                    label(&done),
                ]
            );
            return Ok((code.collect(), d));
        }

        let kind = arith(op);
        let code = match (lt.is_pointer_like(), rt.is_pointer_like()) {
            // Element distance
            (true, true) => chain!(
                lc,
                rc,
                vec![
                    rrr(OpKind::SUB, a, a, b),
                    loadi(abi::SCRATCH, Imm::Lit(abi::WORD as i64)),
                    rrr(OpKind::DIV, a, a, abi::SCRATCH),
                ]
            )
            .collect(),
            (true, false) => chain!(lc, rc, scale(b), vec![rrr(kind, a, a, b)]).collect(),
            (false, true) => chain!(lc, rc, scale(a), vec![rrr(kind, a, a, b)]).collect(),
            (false, false) => chain!(lc, rc, vec![rrr(kind, a, a, b)]).collect(),
        };
        Ok((code, a))
    }

    /// Short-circuit `&&` and `||` as a branch tree
    fn logical(&mut self, op: BinaryOp, l: NodeId, r: NodeId) -> Result<(Code, Reg), CodegenError> {
        let d = self.temps.alloc();
        let n = self.label();
        let (short, done) = (format!(".L{n}_short"), format!(".L{n}_done"));
        let (jcc, hit, miss) = match op {
            BinaryOp::LogAnd => (OpKind::JZ, 0, 1),
            _ => (OpKind::JNZ, 1, 0),
        };
        let (lc, a) = self.expr(l)?;
        let (rc, b) = self.expr(r)?;
        let code = chain!(
            lc,
            vec![cmp(a, Reg::ZERO), branch(jcc, &short)],
            rc,
            vec![
                cmp(b, Reg::ZERO),
                branch(jcc, &short),
                loadi(d, Imm::Lit(miss)),
                branch(OpKind::JMP, &done),
                label(&short),
                loadi(d, Imm::Lit(hit)),
                label(&done),
            ]
        );
        Ok((code.collect(), d))
    }

    fn unary(&mut self, op: UnaryOp, x: NodeId, id: NodeId) -> Result<(Code, Reg), CodegenError> {
        match op {
            UnaryOp::Pos => self.expr(x),
            UnaryOp::Neg => {
                let (code, r) = self.expr(x)?;
                Ok((chain!(code, vec![rrr(OpKind::SUB, r, Reg::ZERO, r)]).collect(), r))
            }
            UnaryOp::Not => {
                let (code, r) = self.expr(x)?;
                let d = self.temps.alloc();
                let done = format!(".L{}_not", self.label());
                let code = chain!(
                    code,
                    vec![
                        cmp(r, Reg::ZERO),
                        loadi(d, Imm::Lit(1)),
                        branch(OpKind::JZ, &done),
                        loadi(d, Imm::Lit(0)),
                        label(&done),
                    ]
                );
                Ok((code.collect(), d))
            }
            UnaryOp::BitNot => {
                let (code, r) = self.expr(x)?;
                Ok((chain!(code, vec![Line::Inst(Inst::NOT(r, r))]).collect(), r))
            }
            UnaryOp::Deref if matches!(self.ty(id), Type::Array(..)) => self.expr(x),
            UnaryOp::Deref => {
                let (code, r) = self.expr(x)?;
                Ok((chain!(code, mem(OpKind::LOAD, r, r, 0)).collect(), r))
            }
            UnaryOp::Addr => self.address(x),
            UnaryOp::PreInc => self.step(x, true, false),
            UnaryOp::PreDec => self.step(x, false, false),
        }
    }

    /// `++`/`--`. Pointers move by a word. Postfix yields the old value.
    fn step(&mut self, x: NodeId, inc: bool, post: bool) -> Result<(Code, Reg), CodegenError> {
        let size = match self.ty(x) {
            Type::Pointer(_) => abi::WORD as i64,
            _ => 1,
        };
        let delta = if inc { size } else { -size };
        let (code, access) = self.lvalue(x)?;
        let v = self.temps.alloc();
        let code: Code = if post {
            let t = self.temps.alloc();
            chain!(code, load(access, v), add_imm(t, v, delta), store(access, t)).collect()
        } else {
            chain!(code, load(access, v), add_imm(v, v, delta), store(access, v)).collect()
        };
        Ok((code, v))
    }

    fn assign(
        &mut self,
        op: Option<BinaryOp>,
        target: NodeId,
        value: NodeId,
    ) -> Result<(Code, Reg), CodegenError> {
        let (vc, v) = self.expr(value)?;
        let (tc, access) = self.lvalue(target)?;
        match op {
            None => Ok((chain!(vc, tc, store(access, v)).collect(), v)),
            Some(op) => {
                let d = self.temps.alloc();
                let code = chain!(
                    vc,
                    tc,
                    load(access, d),
                    vec![rrr(arith(op), d, d, v)],
                    store(access, d)
                );
                Ok((code.collect(), d))
            }
        }
    }

    fn ternary(&mut self, c: NodeId, t: NodeId, e: NodeId) -> Result<(Code, Reg), CodegenError> {
        let d = self.temps.alloc();
        let n = self.label();
        let (els, done) = (format!(".L{n}_else"), format!(".L{n}_end"));
        let (cc, cr) = self.expr(c)?;
        let (tc, tr) = self.expr(t)?;
        let (ec, er) = self.expr(e)?;
        let code = chain!(
            cc,
            vec![cmp(cr, Reg::ZERO), branch(OpKind::JZ, &els)],
            tc,
            vec![mov(d, tr), branch(OpKind::JMP, &done), label(&els)],
            ec,
            vec![mov(d, er), label(&done)]
        );
        Ok((code.collect(), d))
    }

    /// Live temporaries are saved around the call. Arguments go to R1..R6.
    fn call(
        &mut self,
        callee: NodeId,
        args: &[NodeId],
        id: NodeId,
    ) -> Result<(Code, Reg), CodegenError> {
        let ast = self.ast;
        let NodeKind::Ident(name) = ast.kind(callee) else {
            return Err(self.unsupported("call through a non-identifier", id));
        };
        if args.len() > abi::ARGS.len() {
            let msg = format!("call to `{name}` with more than {} arguments", abi::ARGS.len());
            return Err(self.unsupported(msg, id));
        }
        if !self.functions.contains(name) {
            return self.builtin(name, args, id);
        }

        let saved = self.temps.live();
        let mut code: Code = saved.iter().map(|&r| unary(OpKind::PUSH, r)).collect();
        let mut regs = Vec::new();
        for &arg in args {
            let (c, r) = self.expr(arg)?;
            code.extend(c);
            regs.push(r);
        }
        code.extend(regs.iter().zip(abi::ARGS).map(|(&r, arg)| mov(arg, r)));
        code.push(Line::Inst(Inst::Branch(OpKind::CALL, Imm::label(function_label(name)))));
        let d = self.temps.alloc();
        code.push(mov(d, abi::RET));
        code.extend(saved.iter().rev().map(|&r| unary(OpKind::POP, r)));
        Ok((code, d))
    }

    /// Library functions the program did not define itself
    fn builtin(
        &mut self,
        name: &str,
        args: &[NodeId],
        id: NodeId,
    ) -> Result<(Code, Reg), CodegenError> {
        let &[arg] = args else {
            return Err(self.unsupported(format!("`{name}` is declared but never defined"), id));
        };
        match name {
            // Hand out the heap pointer and bump it by the size rounded up to a word
            "malloc" => {
                let (code, n) = self.expr(arg)?;
                let d = self.temps.alloc();
                let code = chain!(
                    code,
                    add_imm(n, n, 3),
                    vec![
                        loadi(abi::SCRATCH, Imm::Lit(-4)),
                        rrr(OpKind::AND, n, n, abi::SCRATCH),
                        mov(d, abi::HEAP),
                        rrr(OpKind::ADD, abi::HEAP, abi::HEAP, n),
                    ]
                );
                Ok((code.collect(), d))
            }
            "free" => self.expr(arg),
            "putchar" => {
                let (code, r) = self.expr(arg)?;
                Ok((chain!(code, vec![unary(OpKind::OUT, r)]).collect(), r))
            }
            _ => Err(self.unsupported(format!("`{name}` is declared but never defined"), id)),
        }
    }
}
