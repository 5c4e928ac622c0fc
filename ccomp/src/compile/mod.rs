pub mod expr;
pub mod func;
pub mod regs;

use crate::check::constant::constant;
use crate::error::CodegenError;
use crate::grammer::ast::{Ast, NodeId, NodeKind, Type};
use crate::grammer::token::Pos;
use arch::abi;
use arch::inst::{Imm, Inst};
use arch::op::OpKind;
use arch::reg::Reg;
use indexmap::{IndexMap, IndexSet};
use itertools::{chain, Itertools};
use regs::Temps;
use std::fmt;

/// One line of assembly output.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Inst(Inst),
    Label(String),
    /// Label and directive on one line, which marks the label as data
    Data(String, String),
    Comment(String),
    Directive(String),
    Blank,
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Inst(inst) => write!(f, "    {}", inst),
            Line::Label(name) => write!(f, "{}:", name),
            Line::Data(name, directive) => write!(f, "{}: {}", name, directive),
            Line::Comment(text) => write!(f, "; {}", text),
            Line::Directive(text) => write!(f, "    {}", text),
            Line::Blank => Ok(()),
        }
    }
}

pub type Code = Vec<Line>;

/// Assembly text, one line each, newline terminated.
pub fn render(code: &[Line]) -> String {
    code.iter().map(|line| format!("{line}\n")).collect()
}

/// Generate the whole program: startup stub, functions, then data.
pub fn generate(ast: &Ast, file: &str) -> Result<Code, CodegenError> {
    let mut gen = Codegen::new(ast);
    gen.collect();
    if !gen.functions.contains("main") {
        let msg = "program without a `main` function".to_string();
        return Err(CodegenError::Unsupported(msg, Pos::default()));
    }

    let mut funcs = Vec::new();
    for &decl in ast.decls() {
        if let NodeKind::Function { body: Some(_), .. } = ast.kind(decl) {
            funcs.extend(gen.function(decl)?);
        }
    }
    let data = gen.data()?;

    Ok(chain!(
        vec![
            Line::Comment(format!("generated by ccomp from {file}")),
            Line::Directive(format!(".org 0x{:X}", abi::CODE_BASE)),
            Line::Blank,
        ],
        startup(),
        funcs,
        data
    )
    .collect())
}

fn startup() -> Code {
    vec![
        Line::Label("_start".to_string()),
        loadi(Reg::SP, Imm::Lit(abi::STACK_TOP as i64)),
        loadi(abi::HEAP, Imm::Lit(abi::HEAP_BASE as i64)),
        Line::Inst(Inst::Branch(OpKind::CALL, Imm::label("main"))),
        none(OpKind::HALT),
    ]
}

/// Where a named value lives.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    /// Word at `FP + offset`
    Frame(i64, Type),
    /// Data label
    Global(String, Type),
    /// Code label
    Function(String),
}

/// Per-compilation state.
pub struct Codegen<'a> {
    pub(crate) ast: &'a Ast,
    /// Label counter for `.L<n>_<role>`
    labels: usize,
    /// Functions with a body. Builtins are used for the rest.
    pub(crate) functions: IndexSet<String>,
    globals: IndexMap<String, NodeId>,
    strings: Vec<String>,

    // Per function
    pub(crate) temps: Temps,
    pub(crate) bindings: Vec<(String, i64, Type)>,
    pub(crate) frame: i64,
    pub(crate) is_main: bool,
    pub(crate) brk: Option<String>,
    pub(crate) cont: Option<String>,
}

impl<'a> Codegen<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Codegen {
            ast,
            labels: 0,
            functions: IndexSet::new(),
            globals: IndexMap::new(),
            strings: Vec::new(),
            temps: Temps::new(),
            bindings: Vec::new(),
            frame: 0,
            is_main: false,
            brk: None,
            cont: None,
        }
    }

    /// Record top level names before any code is produced.
    fn collect(&mut self) {
        let mut pending = self.ast.decls().to_vec();
        pending.reverse();
        while let Some(decl) = pending.pop() {
            match self.ast.kind(decl) {
                NodeKind::Function { name, body: Some(_), .. } => {
                    self.functions.insert(name.clone());
                }
                NodeKind::Var { name, .. } => {
                    self.globals.insert(name.clone(), decl);
                }
                NodeKind::Decls(decls) => pending.extend(decls.iter().rev()),
                _ => {}
            }
        }
    }

    /// Fresh label number
    pub(crate) fn label(&mut self) -> usize {
        self.labels += 1;
        self.labels
    }

    /// Label of a string literal in the data section
    pub(crate) fn string(&mut self, text: &str) -> String {
        self.strings.push(text.to_string());
        format!(".S{}", self.strings.len() - 1)
    }

    pub(crate) fn place(&self, name: &str) -> Option<Place> {
        if let Some((_, offset, ty)) = self.bindings.iter().rev().find(|(n, ..)| n == name) {
            return Some(Place::Frame(*offset, ty.clone()));
        }
        if let Some(&decl) = self.globals.get(name) {
            if let NodeKind::Var { ty, .. } = self.ast.kind(decl) {
                return Some(Place::Global(global_label(name), ty.clone()));
            }
        }
        self.functions.contains(name).then(|| Place::Function(function_label(name)))
    }

    /// Globals in declaration order, then string literals.
    fn data(&self) -> Result<Code, CodegenError> {
        let mut code = vec![Line::Blank, Line::Comment("data".to_string())];
        for (name, &decl) in &self.globals {
            code.extend(labelled(global_label(name), self.global(decl)?));
        }
        for (i, text) in self.strings.iter().enumerate() {
            code.push(Line::Data(format!(".S{i}"), format!(".string \"{}\"", escape(text))));
        }
        Ok(code)
    }

    fn global(&self, decl: NodeId) -> Result<Code, CodegenError> {
        let pos = self.ast.pos(decl);
        let NodeKind::Var { name, ty, init } = self.ast.kind(decl) else {
            return Ok(Vec::new());
        };
        if ty.is_float() || ty.elem().is_some_and(Type::is_float) {
            return Err(CodegenError::Unsupported(format!("floating-point global `{name}`"), pos));
        }
        let unsupported =
            || CodegenError::Unsupported(format!("non-constant initializer for `{name}`"), pos);
        let word = |id: NodeId| match self.ast.kind(id) {
            NodeKind::StrLit(_) => Err(unsupported()),
            _ => constant(self.ast, id).map(|v| v.to_string()).ok_or_else(unsupported),
        };

        let size = match ty {
            Type::Array(_, size) => *size,
            _ => 1,
        };
        let (mut code, used) = match init.map(|id| (id, self.ast.kind(id))) {
            None => (Vec::new(), 0),
            Some((_, NodeKind::InitList(items))) => {
                let words = items.iter().map(|&item| word(item)).collect::<Result<Vec<_>, _>>()?;
                (words_directive(&words), words.len())
            }
            // char s[] = "..."
            Some((_, NodeKind::StrLit(text))) if matches!(ty, Type::Array(..)) => {
                let text = format!(".string \"{}\"", escape(text));
                (vec![Line::Directive(text)], text_len(self.ast, init))
            }
            Some((id, _)) => (words_directive(&[word(id)?]), 1),
        };
        let zeros = vec!["0".to_string(); size.saturating_sub(used)];
        code.extend(words_directive(&zeros));
        Ok(code)
    }
}

/// Put `label` on the first directive line so the assembler records it as data.
fn labelled(label: String, mut lines: Code) -> Code {
    match lines.first() {
        Some(Line::Directive(first)) => lines[0] = Line::Data(label, first.clone()),
        _ => lines.insert(0, Line::Label(label)),
    }
    lines
}

/// Assembly label of a function. `main` keeps its name for the startup stub.
/// The prefix keeps C names such as `zero` or `sp` from reading as registers.
pub(crate) fn function_label(name: &str) -> String {
    match name {
        "main" => name.to_string(),
        _ => format!("_f_{name}"),
    }
}

pub(crate) fn global_label(name: &str) -> String {
    format!("_g_{name}")
}

fn text_len(ast: &Ast, init: &Option<NodeId>) -> usize {
    match init.map(|id| ast.kind(id)) {
        Some(NodeKind::StrLit(text)) => text.chars().count() + 1,
        _ => 0,
    }
}

/// `.word` lines of at most eight values
fn words_directive(words: &[String]) -> Code {
    words
        .chunks(8)
        .map(|chunk| Line::Directive(format!(".word {}", chunk.iter().join(", "))))
        .collect()
}

fn escape(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\n' => "\\n".to_string(),
            '\t' => "\\t".to_string(),
            '\r' => "\\r".to_string(),
            '\0' => "\\0".to_string(),
            '\\' => "\\\\".to_string(),
            '"' => "\\\"".to_string(),
            other => other.to_string(),
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Instruction builders
// ----------------------------------------------------------------------------

/// Fits a signed field of `bits` bits
pub(crate) fn fits(v: i64, bits: u32) -> bool {
    let half = 1i64 << (bits - 1);
    (-half..half).contains(&v)
}

pub(crate) fn rrr(op: OpKind, rd: Reg, rs1: Reg, rs2: Reg) -> Line {
    Line::Inst(Inst::RRR(op, rd, rs1, rs2))
}

pub(crate) fn loadi(rd: Reg, imm: Imm) -> Line {
    Line::Inst(Inst::RI(OpKind::LOADI, rd, imm))
}

pub(crate) fn mov(rd: Reg, rs: Reg) -> Line {
    Line::Inst(Inst::MOV(rd, rs))
}

pub(crate) fn cmp(rs1: Reg, rs2: Reg) -> Line {
    Line::Inst(Inst::CMP(rs1, rs2))
}

pub(crate) fn branch(op: OpKind, label: &str) -> Line {
    Line::Inst(Inst::Branch(op, Imm::label(label)))
}

pub(crate) fn unary(op: OpKind, r: Reg) -> Line {
    Line::Inst(Inst::R(op, r))
}

pub(crate) fn none(op: OpKind) -> Line {
    Line::Inst(Inst::NONE(op))
}

pub(crate) fn label(name: &str) -> Line {
    Line::Label(name.to_string())
}

/// `rd = v`. Values wider than LOADI's field are built from the high part and the low 11 bits.
pub(crate) fn constant_into(rd: Reg, v: i64) -> Code {
    let v = v as i32 as i64;
    if fits(v, 21) {
        return vec![loadi(rd, Imm::Lit(v))];
    }
    vec![
        loadi(rd, Imm::Lit(v >> 11)),
        loadi(abi::SCRATCH, Imm::Lit(11)),
        rrr(OpKind::SHL, rd, rd, abi::SCRATCH),
        loadi(abi::SCRATCH, Imm::Lit(v & 0x7FF)),
        rrr(OpKind::OR, rd, rd, abi::SCRATCH),
    ]
}

/// `rd = rs + v`
pub(crate) fn add_imm(rd: Reg, rs: Reg, v: i64) -> Code {
    match v {
        0 if rd == rs => Vec::new(),
        _ if fits(v, 11) && v < 0 => {
            vec![Line::Inst(Inst::RRI(OpKind::SUBI, rd, rs, Imm::Lit(-v)))]
        }
        _ if fits(v, 11) => vec![Line::Inst(Inst::RRI(OpKind::ADDI, rd, rs, Imm::Lit(v)))],
        _ => chain!(
            constant_into(abi::SCRATCH, v),
            vec![rrr(OpKind::ADD, rd, rs, abi::SCRATCH)]
        )
        .collect(),
    }
}

/// LOAD or STORE at `base + offset`
pub(crate) fn mem(op: OpKind, r: Reg, base: Reg, offset: i64) -> Code {
    if fits(offset, 11) {
        return vec![Line::Inst(Inst::MEM(op, r, base, Imm::Lit(offset)))];
    }
    chain!(
        add_imm(abi::SCRATCH, base, offset),
        vec![Line::Inst(Inst::MEM(op, r, abi::SCRATCH, Imm::Lit(0)))]
    )
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_constants_are_split() {
        assert_eq!(constant_into(Reg::R8, 5), vec![loadi(Reg::R8, Imm::Lit(5))]);
        let code = render(&constant_into(Reg::R8, 0x12345678));
        let expect = concat!(
            "    LOADI R8, #149130\n    LOADI R7, #11\n    SHL R8, R8, R7\n",
            "    LOADI R7, #1656\n    OR R8, R8, R7\n",
        );
        assert_eq!(code, expect);
    }

    #[test]
    fn large_offsets_go_through_scratch() {
        assert_eq!(mem(OpKind::LOAD, Reg::R8, Reg::FP, -8).len(), 1);
        assert_eq!(mem(OpKind::LOAD, Reg::R8, Reg::FP, -4096).len(), 3);
        let subi = Inst::RRI(OpKind::SUBI, Reg::SP, Reg::SP, Imm::Lit(12));
        assert_eq!(add_imm(Reg::SP, Reg::SP, -12), vec![Line::Inst(subi)]);
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(escape("a\"b\n"), "a\\\"b\\n");
    }
}
