//! Bit layout of a 32-bit instruction word.
//!
//! ```text
//! standard : opcode[31:26] rd[25:21] rs1[20:16] rs2[15:11] imm11[10:0]
//! wide     : opcode[31:26] rd[25:21] imm21[20:0]
//! branch   : opcode[31:26] A[25] ----[24:21] target
//!            A=0 : target = imm11[10:0], signed word displacement from the next instruction
//!            A=1 : target = imm21[20:0], absolute byte address
//! ```

use crate::{
    op::{OpKind, Shape},
    reg::Reg,
};
use std::fmt;

pub const IMM_BITS: u32 = 11;
pub const WIDE_BITS: u32 = 21;
pub const ABS_BITS: u32 = 21;

const ABS_FLAG: u32 = 1 << 25;

/// Does `v` fit a signed field of `bits` bits?
pub fn fits_signed(v: i64, bits: u32) -> bool {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&v)
}

/// Does `v` fit an unsigned field of `bits` bits?
pub fn fits_unsigned(v: i64, bits: u32) -> bool {
    (0..(1i64 << bits)).contains(&v)
}

/// Keep the low `bits` bits of `v`.
pub fn mask(v: i64, bits: u32) -> u32 {
    (v as u32) & ((1u32 << bits) - 1)
}

/// Sign extend the low `bits` bits of `v`.
pub fn sext(v: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((v << shift) as i32) >> shift
}

fn field(v: u32, lsb: u32, bits: u32) -> u32 {
    (v >> lsb) & ((1 << bits) - 1)
}

pub fn enc_format(opcode: u8, rd: Reg, rs1: Reg, rs2: Reg, imm: i64) -> u32 {
    ((opcode as u32 & 0x3F) << 26)
        | ((rd.index() as u32) << 21)
        | ((rs1.index() as u32) << 16)
        | ((rs2.index() as u32) << 11)
        | mask(imm, IMM_BITS)
}

pub fn enc_wide(opcode: u8, rd: Reg, imm: i64) -> u32 {
    ((opcode as u32 & 0x3F) << 26) | ((rd.index() as u32) << 21) | mask(imm, WIDE_BITS)
}

pub fn enc_branch(opcode: u8, target: Target) -> u32 {
    let head = (opcode as u32 & 0x3F) << 26;
    match target {
        Target::Rel(disp) => head | mask(disp as i64, IMM_BITS),
        Target::Abs(addr) => head | ABS_FLAG | mask(addr as i64, ABS_BITS),
    }
}

pub fn dec_format(bin: u32) -> (u8, Reg, Reg, Reg, i32) {
    let opcode = field(bin, 26, 6) as u8;
    let rd = Reg::from_field(field(bin, 21, 5));
    let rs1 = Reg::from_field(field(bin, 16, 5));
    let rs2 = Reg::from_field(field(bin, 11, 5));
    let imm = sext(field(bin, 0, IMM_BITS), IMM_BITS);
    (opcode, rd, rs1, rs2, imm)
}

pub fn dec_wide(bin: u32) -> (u8, Reg, i32) {
    let opcode = field(bin, 26, 6) as u8;
    let rd = Reg::from_field(field(bin, 21, 5));
    let imm = sext(field(bin, 0, WIDE_BITS), WIDE_BITS);
    (opcode, rd, imm)
}

pub fn dec_branch(bin: u32) -> (u8, Target) {
    let opcode = field(bin, 26, 6) as u8;
    if bin & ABS_FLAG != 0 {
        (opcode, Target::Abs(field(bin, 0, ABS_BITS)))
    } else {
        (opcode, Target::Rel(sext(field(bin, 0, IMM_BITS), IMM_BITS)))
    }
}

// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Rel(i32),
    Abs(u32),
}

impl Target {
    /// Branch target address of an instruction placed at `addr`.
    pub fn address(&self, addr: u32) -> u32 {
        match *self {
            Target::Rel(disp) => addr.wrapping_add(4).wrapping_add((disp * 4) as u32),
            Target::Abs(abs) => abs,
        }
    }
}

/// Decoded machine word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    RRR(OpKind, Reg, Reg, Reg),
    RRI(OpKind, Reg, Reg, i32),
    RI(OpKind, Reg, i32),
    NOT(Reg, Reg),
    CMP(Reg, Reg),
    R(OpKind, Reg),
    MEM(OpKind, Reg, Reg, i32),
    Branch(OpKind, Target),
    NONE(OpKind),
}

impl Op {
    pub fn to_bin(&self) -> u32 {
        match *self {
            Op::RRR(op, rd, rs1, rs2) => enc_format(op.into(), rd, rs1, rs2, 0),
            Op::RRI(op, rd, rs1, imm) => enc_format(op.into(), rd, rs1, Reg::R0, imm as i64),
            Op::RI(op, rd, imm) => enc_wide(op.into(), rd, imm as i64),
            Op::NOT(rd, rs1) => enc_format(OpKind::NOT.into(), rd, rs1, Reg::R0, 0),
            Op::CMP(rs1, rs2) => enc_format(OpKind::CMP.into(), Reg::R0, rs1, rs2, 0),
            Op::R(op, r) => enc_format(op.into(), r, Reg::R0, Reg::R0, 0),
            Op::MEM(op, r, base, off) => enc_format(op.into(), r, base, Reg::R0, off as i64),
            Op::Branch(op, target) => enc_branch(op.into(), target),
            Op::NONE(op) => enc_format(op.into(), Reg::R0, Reg::R0, Reg::R0, 0),
        }
    }

    pub fn from_bin(bin: u32) -> Result<Op, u8> {
        let (opcode, rd, rs1, rs2, imm) = dec_format(bin);
        let op = OpKind::try_from(opcode).map_err(|_| opcode)?;
        Ok(match op.shape() {
            Shape::RRR => Op::RRR(op, rd, rs1, rs2),
            Shape::RRI => Op::RRI(op, rd, rs1, imm),
            Shape::RI => {
                let (_, rd, imm) = dec_wide(bin);
                Op::RI(op, rd, imm)
            }
            Shape::RR if op == OpKind::CMP => Op::CMP(rs1, rs2),
            Shape::RR => Op::NOT(rd, rs1),
            Shape::R => Op::R(op, rd),
            Shape::MEM => Op::MEM(op, rd, rs1, imm),
            Shape::I => Op::Branch(op, dec_branch(bin).1),
            Shape::NONE => Op::NONE(op),
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::RRR(op, rd, rs1, rs2) => write!(f, "{op} {rd}, {rs1}, {rs2}"),
            Op::RRI(op, rd, rs1, imm) => write!(f, "{op} {rd}, {rs1}, #{imm}"),
            Op::RI(op, rd, imm) => write!(f, "{op} {rd}, #{imm}"),
            Op::NOT(rd, rs1) => write!(f, "NOT {rd}, {rs1}"),
            Op::CMP(rs1, rs2) => write!(f, "CMP {rs1}, {rs2}"),
            Op::R(op, r) => write!(f, "{op} {r}"),
            Op::MEM(op, r, base, off) => write!(f, "{op} {r}, [{base}{off:+}]"),
            Op::Branch(op, Target::Rel(disp)) => write!(f, "{op} pc{:+}", (disp + 1) * 4),
            Op::Branch(op, Target::Abs(addr)) => write!(f, "{op} 0x{addr:X}"),
            Op::NONE(op) => write!(f, "{op}"),
        }
    }
}

// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_fields() {
        for opcode in [0u8, 1, 0x1F, 0x20, 0x3F] {
            for rd in [0u32, 1, 17, 31] {
                for rs1 in [0u32, 5, 30] {
                    for imm in [-1024i64, -1, 0, 1, 1023] {
                        let (rd, rs1, rs2) = (Reg::from_field(rd), Reg::from_field(rs1), Reg::R9);
                        let bin = enc_format(opcode, rd, rs1, rs2, imm);
                        assert_eq!(dec_format(bin), (opcode, rd, rs1, rs2, imm as i32));
                    }
                }
            }
        }
    }

    #[test]
    fn test_wide_range() {
        for imm in [-(1i64 << 20), -1, 0, 983040, (1 << 20) - 1] {
            let bin = enc_wide(0x01, Reg::R30, imm);
            assert_eq!(dec_wide(bin), (0x01, Reg::R30, imm as i32));
        }
    }

    #[test]
    fn test_fits() {
        assert!(fits_signed(255, 9));
        assert!(!fits_signed(256, 9));
        assert!(fits_signed(-1024, IMM_BITS));
        assert!(!fits_signed(-1025, IMM_BITS));
        assert!(fits_unsigned(0x1F_FFFF, ABS_BITS));
        assert!(!fits_unsigned(0x20_0000, ABS_BITS));
        assert!(!fits_unsigned(-1, ABS_BITS));
    }

    #[test]
    fn test_mask_keeps_neighbours() {
        // An oversized immediate must not spill into rs2.
        let bin = enc_format(0x05, Reg::R1, Reg::R2, Reg::R0, 0x1234);
        let (_, rd, rs1, rs2, _) = dec_format(bin);
        assert_eq!((rd, rs1, rs2), (Reg::R1, Reg::R2, Reg::R0));
    }

    #[test]
    fn test_target_address() {
        assert_eq!(Target::Rel(0).address(0x100), 0x104);
        assert_eq!(Target::Rel(-1).address(0x100), 0x100);
        assert_eq!(Target::Rel(2).address(0x100), 0x10C);
        assert_eq!(Target::Abs(0x8000).address(0x100), 0x8000);
    }

    macro_rules! test_op {
        ($name:ident, $op:expr) => {
            #[test]
            fn $name() {
                let op = $op;
                let bin = op.to_bin();
                let decoded_op = Op::from_bin(bin);
                println!("{:?} -> {:0>8X} -> {:?}", op, bin, decoded_op);
                assert_eq!(Ok(op), decoded_op, "bin: {:032b}", bin);
            }
        };
    }

    test_op!(test_add, Op::RRR(OpKind::ADD, Reg::R1, Reg::R2, Reg::R3));
    test_op!(test_mul, Op::RRR(OpKind::MUL, Reg::R8, Reg::R9, Reg::R10));
    test_op!(test_shr, Op::RRR(OpKind::SHR, Reg::R27, Reg::R8, Reg::R7));
    test_op!(test_addi, Op::RRI(OpKind::ADDI, Reg::R30, Reg::R30, -8));
    test_op!(test_subi, Op::RRI(OpKind::SUBI, Reg::R1, Reg::R2, 1023));
    test_op!(test_loadi, Op::RI(OpKind::LOADI, Reg::R30, 0xF0000));
    test_op!(test_loadi_neg, Op::RI(OpKind::LOADI, Reg::R1, -5));
    test_op!(test_not, Op::NOT(Reg::R4, Reg::R5));
    test_op!(test_cmp, Op::CMP(Reg::R8, Reg::R0));
    test_op!(test_push, Op::R(OpKind::PUSH, Reg::R31));
    test_op!(test_out, Op::R(OpKind::OUT, Reg::R1));
    test_op!(test_load, Op::MEM(OpKind::LOAD, Reg::R8, Reg::R31, -4));
    test_op!(test_store, Op::MEM(OpKind::STORE, Reg::R1, Reg::R31, -8));
    test_op!(test_jmp_rel, Op::Branch(OpKind::JMP, Target::Rel(-3)));
    test_op!(test_jz_rel, Op::Branch(OpKind::JZ, Target::Rel(1023)));
    test_op!(test_call_abs, Op::Branch(OpKind::CALL, Target::Abs(0x8010)));
    test_op!(test_ret, Op::NONE(OpKind::RET));
    test_op!(test_halt, Op::NONE(OpKind::HALT));
}
