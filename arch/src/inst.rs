use crate::{op::OpKind, reg::Reg};
use color_print::cformat;
use std::fmt;

/// Immediate operand as written in assembly text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imm {
    Lit(i64),
    Label(String),
}

impl Imm {
    pub fn label(name: impl Into<String>) -> Self {
        Imm::Label(name.into())
    }
}

impl fmt::Display for Imm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imm::Lit(v) => write!(f, "{}", v),
            Imm::Label(name) => write!(f, "{}", name),
        }
    }
}

/// One instruction in assembly form, before label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inst {
    RRR(OpKind, Reg, Reg, Reg),
    RRI(OpKind, Reg, Reg, Imm),
    RI(OpKind, Reg, Imm),
    MOV(Reg, Reg),
    NOT(Reg, Reg),
    CMP(Reg, Reg),
    R(OpKind, Reg),
    MEM(OpKind, Reg, Reg, Imm),
    Branch(OpKind, Imm),
    NONE(OpKind),
}

impl Inst {
    pub fn op(&self) -> OpKind {
        match self {
            Inst::RRR(op, ..)
            | Inst::RRI(op, ..)
            | Inst::RI(op, ..)
            | Inst::R(op, _)
            | Inst::MEM(op, ..)
            | Inst::Branch(op, _)
            | Inst::NONE(op) => *op,
            Inst::MOV(..) => OpKind::ADD,
            Inst::NOT(..) => OpKind::NOT,
            Inst::CMP(..) => OpKind::CMP,
        }
    }

    /// Immediate operand, if the instruction carries one.
    pub fn imm(&self) -> Option<&Imm> {
        match self {
            Inst::RRI(_, _, _, imm)
            | Inst::RI(_, _, imm)
            | Inst::MEM(_, _, _, imm)
            | Inst::Branch(_, imm) => Some(imm),
            _ => None,
        }
    }
}

fn mem_operand(base: &Reg, off: &Imm) -> String {
    match (base, off) {
        (_, Imm::Lit(0)) => format!("[{}]", base),
        (_, Imm::Lit(v)) if *v < 0 => format!("[{}-{}]", base, -v),
        (Reg::R0, Imm::Label(name)) => format!("[{}]", name),
        (_, off) => format!("[{}+{}]", base, off),
    }
}

fn imm_operand(imm: &Imm) -> String {
    match imm {
        Imm::Lit(v) => format!("#{}", v),
        Imm::Label(name) => name.clone(),
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::RRR(op, rd, rs1, rs2) => write!(f, "{} {}, {}, {}", op, rd, rs1, rs2),
            Inst::RRI(op, rd, rs1, imm) => {
                write!(f, "{} {}, {}, {}", op, rd, rs1, imm_operand(imm))
            }
            Inst::RI(op, rd, imm) => write!(f, "{} {}, {}", op, rd, imm_operand(imm)),
            Inst::MOV(rd, rs) => write!(f, "MOV {}, {}", rd, rs),
            Inst::NOT(rd, rs) => write!(f, "NOT {}, {}", rd, rs),
            Inst::CMP(rs1, rs2) => write!(f, "CMP {}, {}", rs1, rs2),
            Inst::R(op, r) => write!(f, "{} {}", op, r),
            Inst::MEM(op, r, base, off) => write!(f, "{} {}, {}", op, r, mem_operand(base, off)),
            Inst::Branch(op, target) => write!(f, "{} {}", op, target),
            Inst::NONE(op) => write!(f, "{}", op),
        }
    }
}

impl Inst {
    pub fn cformat(&self) -> String {
        macro_rules! opfmt {
            ($name:expr, $args:expr) => {
                cformat!("<red>{:<6}</><blue>{}</>", $name, $args)
            };
        }
        match self {
            Inst::RRR(op, rd, rs1, rs2) => opfmt!(op, format!("{}, {}, {}", rd, rs1, rs2)),
            Inst::RRI(op, rd, rs1, imm) => {
                opfmt!(op, format!("{}, {}, {}", rd, rs1, imm_operand(imm)))
            }
            Inst::RI(op, rd, imm) => opfmt!(op, format!("{}, {}", rd, imm_operand(imm))),
            Inst::MOV(rd, rs) => opfmt!("MOV", format!("{}, {}", rd, rs)),
            Inst::NOT(rd, rs) => opfmt!("NOT", format!("{}, {}", rd, rs)),
            Inst::CMP(rs1, rs2) => opfmt!("CMP", format!("{}, {}", rs1, rs2)),
            Inst::R(op, r) => opfmt!(op, r),
            Inst::MEM(op, r, base, off) => {
                opfmt!(op, format!("{}, {}", r, mem_operand(base, off)))
            }
            Inst::Branch(op, target) => opfmt!(op, cformat!("<g>{}</>", target)),
            Inst::NONE(op) => opfmt!(op, ""),
        }
    }
}
