use num_enum::{IntoPrimitive, TryFromPrimitive};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum OpKind {
    NOP = 0x00,
    LOADI = 0x01,
    LOAD = 0x02,
    STORE = 0x03,
    ADD = 0x04,
    ADDI = 0x05,
    SUB = 0x06,
    SUBI = 0x07,
    MUL = 0x08,
    DIV = 0x09,
    MOD = 0x0A,
    AND = 0x0B,
    OR = 0x0C,
    XOR = 0x0D,
    NOT = 0x0E,
    SHL = 0x0F,
    SHR = 0x10,
    CMP = 0x11,
    JMP = 0x12,
    JZ = 0x13,
    JNZ = 0x14,
    JC = 0x15,
    JNC = 0x16,
    JLT = 0x17,
    JGE = 0x18,
    JLE = 0x19,
    JN = 0x1A,
    CALL = 0x1B,
    RET = 0x1C,
    PUSH = 0x1D,
    POP = 0x1E,
    HALT = 0x1F,
    OUT = 0x20,
}

/// Operand shape of an instruction as written in assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Shape {
    RRR,  // rd, rs1, rs2
    RRI,  // rd, rs1, imm
    RI,   // rd, imm (wide)
    RR,   // rd, rs1 | rs1, rs2
    R,    // r
    I,    // target
    MEM,  // r, [base+off]
    NONE, //
}

impl OpKind {
    pub fn shape(&self) -> Shape {
        use OpKind::*;
        match self {
            ADD | SUB | MUL | DIV | MOD | AND | OR | XOR | SHL | SHR => Shape::RRR,
            ADDI | SUBI => Shape::RRI,
            LOADI => Shape::RI,
            NOT | CMP => Shape::RR,
            PUSH | POP | OUT => Shape::R,
            JMP | JZ | JNZ | JC | JNC | JLT | JGE | JLE | JN | CALL => Shape::I,
            LOAD | STORE => Shape::MEM,
            NOP | RET | HALT => Shape::NONE,
        }
    }

    pub fn is_branch(&self) -> bool {
        self.shape() == Shape::I
    }
}

/// Mnemonics that are spelled differently from their opcode.
/// `MOV rd, rs` is encoded as `ADD rd, rs, R0`.
static ALIASES: Lazy<HashMap<&'static str, (OpKind, Shape)>> = Lazy::new(|| {
    HashMap::from([
        ("MOV", (OpKind::ADD, Shape::RR)),
        ("MOVE", (OpKind::ADD, Shape::RR)),
        ("JE", (OpKind::JZ, Shape::I)),
        ("JNE", (OpKind::JNZ, Shape::I)),
    ])
});

/// Look up a mnemonic (case-insensitive) and return its opcode and operand shape.
pub fn lookup(mnemonic: &str) -> Option<(OpKind, Shape)> {
    let upper = mnemonic.to_ascii_uppercase();
    if let Some(found) = ALIASES.get(upper.as_str()) {
        return Some(*found);
    }
    upper.parse::<OpKind>().ok().map(|op| (op, op.shape()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("add"), Some((OpKind::ADD, Shape::RRR)));
        assert_eq!(lookup("Loadi"), Some((OpKind::LOADI, Shape::RI)));
        assert_eq!(lookup("halt"), Some((OpKind::HALT, Shape::NONE)));
    }

    #[test]
    fn aliases() {
        assert_eq!(lookup("mov"), Some((OpKind::ADD, Shape::RR)));
        assert_eq!(lookup("MOVE"), Some((OpKind::ADD, Shape::RR)));
        assert_eq!(lookup("je"), Some((OpKind::JZ, Shape::I)));
        assert_eq!(lookup("jne"), Some((OpKind::JNZ, Shape::I)));
    }

    #[test]
    fn unknown_mnemonic() {
        assert_eq!(lookup("hoge"), None);
        assert_eq!(lookup("iret"), None);
    }

    #[test]
    fn opcode_numbering() {
        assert_eq!(u8::from(OpKind::LOADI), 0x01);
        assert_eq!(u8::from(OpKind::HALT), 0x1F);
        assert_eq!(u8::from(OpKind::OUT), 0x20);
        assert_eq!(OpKind::try_from(0x1Bu8).ok(), Some(OpKind::CALL));
        assert!(OpKind::try_from(0x3Fu8).is_err());
    }
}
