use super::{
    add_imm, branch, cmp, constant_into, fits, function_label, label, loadi, mem, mov, none, unary,
    Code, Codegen, Line,
};
use crate::check::constant::constant;
use crate::error::CodegenError;
use crate::grammer::ast::{NodeId, NodeKind, Type};
use arch::abi;
use arch::inst::Imm;
use arch::op::OpKind;
use arch::reg::Reg;
use itertools::chain;
use std::iter;

impl<'a> Codegen<'a> {
    /// `PUSH FP; MOV FP, SP; SUBI SP, SP, #frame`, parameter spills, body.
    /// The body is generated first so the frame size is known.
    pub(crate) fn function(&mut self, id: NodeId) -> Result<Code, CodegenError> {
        let ast = self.ast;
        let NodeKind::Function { name, params, body: Some(body), .. } = ast.kind(id) else {
            return Ok(Vec::new());
        };
        if params.len() > abi::ARGS.len() {
            let msg = format!("function `{name}` with more than {} parameters", abi::ARGS.len());
            return Err(self.unsupported(msg, id));
        }

        self.bindings.clear();
        self.frame = 0;
        self.is_main = name == "main";
        self.brk = None;
        self.cont = None;

        let mut spills = Vec::new();
        for (param, reg) in params.iter().zip(abi::ARGS) {
            let offset = self.slot();
            if let Some(name) = &param.name {
                self.bindings.push((name.clone(), offset, param.ty.clone()));
            }
            spills.extend(mem(OpKind::STORE, reg, Reg::FP, offset));
        }

        let code = match ast.kind(*body) {
            NodeKind::Block(stmts) => self.stmts(stmts)?,
            _ => self.stmt(*body)?,
        };

        Ok(chain!(
            vec![
                Line::Blank,
                Line::Comment(format!("function {name}")),
                label(&function_label(name)),
                unary(OpKind::PUSH, Reg::FP),
                mov(Reg::FP, Reg::SP),
            ],
            add_imm(Reg::SP, Reg::SP, -self.frame),
            spills,
            code,
            // Falling off the end returns 0
            vec![loadi(abi::RET, Imm::Lit(0))],
            self.epilogue()
        )
        .collect())
    }

    /// Next free word below the frame pointer
    fn slot(&mut self) -> i64 {
        self.frame += abi::WORD as i64;
        -self.frame
    }

    /// `main` halts the machine, everything else returns
    fn epilogue(&self) -> Code {
        match self.is_main {
            true => vec![none(OpKind::HALT)],
            false => vec![mov(Reg::SP, Reg::FP), unary(OpKind::POP, Reg::FP), none(OpKind::RET)],
        }
    }

    fn stmts(&mut self, stmts: &[NodeId]) -> Result<Code, CodegenError> {
        let mut code = Vec::new();
        for &stmt in stmts {
            code.extend(self.stmt(stmt)?);
        }
        Ok(code)
    }

    /// Body of a loop or switch with its own break/continue targets
    fn nested(
        &mut self,
        body: NodeId,
        brk: &str,
        cont: Option<&str>,
    ) -> Result<Code, CodegenError> {
        let saved_brk = self.brk.replace(brk.to_string());
        let saved_cont = match cont {
            Some(cont) => self.cont.replace(cont.to_string()),
            None => self.cont.clone(),
        };
        let result = self.stmt(body);
        self.brk = saved_brk;
        self.cont = saved_cont;
        result
    }

    /// Test `r` against zero and leave through `target` when it is zero
    fn unless(r: Reg, target: &str) -> Code {
        vec![cmp(r, Reg::ZERO), branch(OpKind::JZ, target)]
    }

    pub(crate) fn stmt(&mut self, id: NodeId) -> Result<Code, CodegenError> {
        self.temps.reset();
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Block(stmts) => {
                let mark = self.bindings.len();
                let code = self.stmts(stmts)?;
                self.bindings.truncate(mark);
                Ok(code)
            }

            NodeKind::Var { .. } => self.local(id),
            NodeKind::Decls(decls) => {
                let mut code = Vec::new();
                for &decl in decls {
                    code.extend(self.local(decl)?);
                }
                Ok(code)
            }
            NodeKind::Typedef(..) | NodeKind::Struct(_) | NodeKind::Enum(_) => Ok(Vec::new()),

            NodeKind::If(cond, then, els) => {
                let n = self.label();
                let (else_label, end_label) = (format!(".L{n}_else"), format!(".L{n}_end"));
                let (cc, r) = self.expr(*cond)?;
                let then = self.stmt(*then)?;
                match els {
                    Some(els) => {
                        let els = self.stmt(*els)?;
                        Ok(chain!(
                            cc,
                            Self::unless(r, &else_label),
                            then,
                            vec![branch(OpKind::JMP, &end_label), label(&else_label)],
                            els,
                            vec![label(&end_label)]
                        )
                        .collect())
                    }
                    None => Ok(chain!(
                        cc,
                        Self::unless(r, &end_label),
                        then,
                        vec![label(&end_label)]
                    )
                    .collect()),
                }
            }

            NodeKind::While(cond, body) => {
                let n = self.label();
                let (top, end) = (format!(".L{n}_top"), format!(".L{n}_end"));
                let (cc, r) = self.expr(*cond)?;
                let body = self.nested(*body, &end, Some(&top))?;
                Ok(chain!(
                    vec![label(&top)],
                    cc,
                    Self::unless(r, &end),
                    body,
                    vec![branch(OpKind::JMP, &top), label(&end)]
                )
                .collect())
            }

            NodeKind::For { init, cond, step, body } => {
                let mark = self.bindings.len();
                let n = self.label();
                let (top, next, end) =
                    (format!(".L{n}_top"), format!(".L{n}_next"), format!(".L{n}_end"));
                let init = match init {
                    Some(init) => self.stmt(*init)?,
                    None => Vec::new(),
                };
                self.temps.reset();
                let cond = match cond {
                    Some(cond) => {
                        let (cc, r) = self.expr(*cond)?;
                        chain!(cc, Self::unless(r, &end)).collect()
                    }
                    None => Vec::new(),
                };
                let body = self.nested(*body, &end, Some(&next))?;
                self.temps.reset();
                let step = match step {
                    Some(step) => self.expr(*step)?.0,
                    None => Vec::new(),
                };
                self.bindings.truncate(mark);
                Ok(chain!(
                    init,
                    vec![label(&top)],
                    cond,
                    body,
                    vec![label(&next)],
                    step,
                    vec![branch(OpKind::JMP, &top), label(&end)]
                )
                .collect())
            }

            NodeKind::Switch(cond, cases) => self.switch(*cond, cases),
            NodeKind::Case(..) => Err(self.unsupported("`case` outside of a switch", id)),

            NodeKind::Return(value) => {
                let value = match value {
                    Some(value) => {
                        let (code, r) = self.expr(*value)?;
                        chain!(code, vec![mov(abi::RET, r)]).collect()
                    }
                    None => vec![loadi(abi::RET, Imm::Lit(0))],
                };
                Ok(chain!(value, self.epilogue()).collect())
            }

            NodeKind::Break => match &self.brk {
                Some(target) => Ok(vec![branch(OpKind::JMP, target)]),
                None => Err(self.unsupported("`break` outside of a loop or switch", id)),
            },
            NodeKind::Continue => match &self.cont {
                Some(target) => Ok(vec![branch(OpKind::JMP, target)]),
                None => Err(self.unsupported("`continue` outside of a loop", id)),
            },

            NodeKind::Expr(Some(expr)) => Ok(self.expr(*expr)?.0),
            NodeKind::Expr(None) => Ok(Vec::new()),

            NodeKind::Function { name, .. } => {
                Err(self.unsupported(format!("function `{name}` defined inside a function"), id))
            }

            // Bare expression in a `for` header
            _ => Ok(self.expr(id)?.0),
        }
    }

    /// Compare-and-branch dispatch on constant labels, then the arms in order
    /// so control falls through.
    fn switch(&mut self, cond: NodeId, cases: &[NodeId]) -> Result<Code, CodegenError> {
        let ast = self.ast;
        let n = self.label();
        let end = format!(".L{n}_end");
        let (mut dispatch, v) = self.expr(cond)?;

        let mut arms = Vec::new();
        let mut default = None;
        for (i, &case) in cases.iter().enumerate() {
            let NodeKind::Case(value, body) = ast.kind(case) else {
                return Err(self.unsupported("expected `case` or `default`", case));
            };
            let target = format!(".L{n}_case{i}");
            match value {
                Some(value) => {
                    let Some(k) = constant(ast, *value) else {
                        let msg = "case label is not an integer constant";
                        return Err(self.unsupported(msg, *value));
                    };
                    dispatch.extend(self.compare_const(v, k));
                    dispatch.push(branch(OpKind::JZ, &target));
                }
                None => default = Some(target.clone()),
            }
            arms.push((target, body));
        }
        dispatch.push(branch(OpKind::JMP, default.as_deref().unwrap_or(&end)));

        let mark = self.bindings.len();
        let saved = self.brk.replace(end.clone());
        let mut code = dispatch;
        for (target, body) in arms {
            code.push(label(&target));
            match self.stmts(body) {
                Ok(body) => code.extend(body),
                Err(err) => {
                    self.brk = saved;
                    return Err(err);
                }
            }
        }
        self.brk = saved;
        self.bindings.truncate(mark);
        code.push(label(&end));
        Ok(code)
    }

    /// `CMP v, k` through R7, or a temporary when `k` is wider than LOADI
    fn compare_const(&mut self, v: Reg, k: i64) -> Code {
        if fits(k, 21) {
            return vec![loadi(abi::SCRATCH, Imm::Lit(k)), cmp(v, abi::SCRATCH)];
        }
        let t = self.temps.alloc();
        chain!(constant_into(t, k), vec![cmp(v, t)]).collect()
    }

    /// Local variable. Arrays take their storage from the heap and keep the base in the slot.
    fn local(&mut self, id: NodeId) -> Result<Code, CodegenError> {
        let ast = self.ast;
        let NodeKind::Var { name, ty, init } = ast.kind(id) else {
            return Ok(Vec::new());
        };
        if ty.is_float() || ty.elem().is_some_and(Type::is_float) {
            return Err(self.unsupported(format!("floating-point variable `{name}`"), id));
        }
        let offset = self.slot();

        let code = match ty {
            Type::Array(_, size) => {
                let base = self.temps.alloc();
                let mut code: Code = chain!(
                    vec![mov(base, abi::HEAP)],
                    add_imm(abi::HEAP, abi::HEAP, (*size as i64) * abi::WORD as i64),
                    mem(OpKind::STORE, base, Reg::FP, offset)
                )
                .collect();
                let words = self.temps.mark();
                match init.map(|init| ast.kind(init)) {
                    None => {}
                    Some(NodeKind::InitList(items)) => {
                        for (i, &item) in items.iter().enumerate() {
                            let (c, r) = self.expr(item)?;
                            code.extend(c);
                            code.extend(mem(OpKind::STORE, r, base, (i as i64) * abi::WORD as i64));
                            self.temps.rewind(words);
                        }
                    }
                    Some(NodeKind::StrLit(text)) => {
                        let t = self.temps.alloc();
                        for (i, ch) in text.chars().chain(iter::once('\0')).enumerate() {
                            code.extend(constant_into(t, ch as i64));
                            code.extend(mem(OpKind::STORE, t, base, (i as i64) * abi::WORD as i64));
                        }
                    }
                    Some(_) => return Err(self.unsupported("array initializer", id)),
                }
                code
            }
            _ => match init {
                Some(init) => {
                    let (c, r) = self.expr(*init)?;
                    chain!(c, mem(OpKind::STORE, r, Reg::FP, offset)).collect()
                }
                None => Vec::new(),
            },
        };

        self.bindings.push((name.clone(), offset, ty.clone()));
        Ok(code)
    }
}
