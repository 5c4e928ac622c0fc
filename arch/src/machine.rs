//! Reference semantics of the instruction set.
//!
//! The board model that runs the assembled words lives outside this workspace;
//! this interpreter pins down what each word means so the toolchain can be
//! checked end to end.

use crate::{
    format::Op,
    op::OpKind,
    reg::Reg,
};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Fault {
    #[error("Unknown opcode 0x{1:02X} at 0x{0:08X}")]
    UnknownOpcode(u32, u8),

    #[error("Unaligned access to 0x{0:08X}")]
    Unaligned(u32),

    #[error("Division by zero at 0x{0:08X}")]
    DivideByZero(u32),

    #[error("No HALT within {0} steps")]
    StepLimit(usize),
}

#[derive(Debug, Default, Clone, Copy)]
struct Flags {
    z: bool,
    n: bool,
    c: bool,
}

#[derive(Debug, Default)]
pub struct Machine {
    regs: [u32; 32],
    mem: HashMap<u32, u32>,
    pc: u32,
    flags: Flags,
    output: Vec<u8>,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `(address, word)` pairs into memory.
    pub fn load(&mut self, image: &[(u32, u32)]) {
        for &(addr, word) in image {
            self.mem.insert(addr, word);
        }
    }

    pub fn reg(&self, r: Reg) -> u32 {
        self.regs[r.index()]
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn read(&self, addr: u32) -> Result<u32, Fault> {
        if addr % 4 != 0 {
            return Err(Fault::Unaligned(addr));
        }
        Ok(self.mem.get(&addr).copied().unwrap_or(0))
    }

    fn write(&mut self, addr: u32, value: u32) -> Result<(), Fault> {
        if addr % 4 != 0 {
            return Err(Fault::Unaligned(addr));
        }
        self.mem.insert(addr, value);
        Ok(())
    }

    fn set(&mut self, r: Reg, value: u32) {
        if r != Reg::R0 {
            self.regs[r.index()] = value;
        }
    }

    fn push(&mut self, value: u32) -> Result<(), Fault> {
        let sp = self.reg(Reg::SP).wrapping_sub(4);
        self.set(Reg::SP, sp);
        self.write(sp, value)
    }

    fn pop(&mut self) -> Result<u32, Fault> {
        let sp = self.reg(Reg::SP);
        let value = self.read(sp)?;
        self.set(Reg::SP, sp.wrapping_add(4));
        Ok(value)
    }

    /// Run from `entry` until HALT and return R1 as a signed value.
    pub fn run(&mut self, entry: u32, max_steps: usize) -> Result<i32, Fault> {
        self.pc = entry;
        for _ in 0..max_steps {
            if !self.step()? {
                return Ok(self.reg(Reg::R1) as i32);
            }
        }
        Err(Fault::StepLimit(max_steps))
    }

    /// Execute one instruction. Returns false once HALT is reached.
    pub fn step(&mut self) -> Result<bool, Fault> {
        let addr = self.pc;
        let bin = self.read(addr)?;
        let op = Op::from_bin(bin).map_err(|opcode| Fault::UnknownOpcode(addr, opcode))?;
        let mut next = addr.wrapping_add(4);

        match op {
            Op::RRR(kind, rd, rs1, rs2) => {
                let value = self.alu(addr, kind, self.reg(rs1), self.reg(rs2))?;
                self.set(rd, value);
            }
            Op::RRI(kind, rd, rs1, imm) => {
                let value = self.alu(addr, kind, self.reg(rs1), imm as u32)?;
                self.set(rd, value);
            }
            Op::RI(_, rd, imm) => self.set(rd, imm as u32),
            Op::NOT(rd, rs1) => {
                let value = !self.reg(rs1);
                self.flags = Flags { z: value == 0, n: (value as i32) < 0, c: false };
                self.set(rd, value);
            }
            Op::CMP(rs1, rs2) => {
                let (a, b) = (self.reg(rs1), self.reg(rs2));
                self.flags = Flags { z: a == b, n: (a as i32) < (b as i32), c: a < b };
            }
            Op::R(OpKind::PUSH, r) => self.push(self.reg(r))?,
            Op::R(OpKind::POP, r) => {
                let value = self.pop()?;
                self.set(r, value);
            }
            Op::R(_, r) => self.output.push(self.reg(r) as u8),
            Op::MEM(OpKind::LOAD, rd, base, off) => {
                let value = self.read(self.reg(base).wrapping_add(off as u32))?;
                self.set(rd, value);
            }
            Op::MEM(_, rs, base, off) => {
                self.write(self.reg(base).wrapping_add(off as u32), self.reg(rs))?;
            }
            Op::Branch(kind, target) => {
                let Flags { z, n, c } = self.flags;
                let taken = match kind {
                    OpKind::JMP => true,
                    OpKind::JZ => z,
                    OpKind::JNZ => !z,
                    OpKind::JC => c,
                    OpKind::JNC => !c,
                    OpKind::JLT | OpKind::JN => n,
                    OpKind::JGE => !n,
                    OpKind::JLE => n || z,
                    _ => {
                        self.push(next)?;
                        true
                    }
                };
                if taken {
                    next = target.address(addr);
                }
            }
            Op::NONE(OpKind::RET) => next = self.pop()?,
            Op::NONE(OpKind::HALT) => return Ok(false),
            Op::NONE(_) => {}
        }

        self.pc = next;
        Ok(true)
    }

    fn alu(&mut self, addr: u32, kind: OpKind, a: u32, b: u32) -> Result<u32, Fault> {
        let mut carry = false;
        let value = match kind {
            OpKind::ADD | OpKind::ADDI => {
                let (v, c) = a.overflowing_add(b);
                carry = c;
                v
            }
            OpKind::SUB | OpKind::SUBI => {
                let (v, c) = a.overflowing_sub(b);
                carry = c;
                v
            }
            OpKind::MUL => a.wrapping_mul(b),
            OpKind::DIV | OpKind::MOD if b == 0 => return Err(Fault::DivideByZero(addr)),
            OpKind::DIV => (a as i32).wrapping_div(b as i32) as u32,
            OpKind::MOD => (a as i32).wrapping_rem(b as i32) as u32,
            OpKind::AND => a & b,
            OpKind::OR => a | b,
            OpKind::XOR => a ^ b,
            OpKind::SHL => a.wrapping_shl(b),
            _ => ((a as i32).wrapping_shr(b)) as u32,
        };
        self.flags = Flags { z: value == 0, n: (value as i32) < 0, c: carry };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Op, Target};

    fn program(ops: &[Op]) -> Vec<(u32, u32)> {
        ops.iter()
            .enumerate()
            .map(|(i, op)| (0x100 + 4 * i as u32, op.to_bin()))
            .collect()
    }

    fn run(ops: &[Op]) -> Result<i32, Fault> {
        let mut m = Machine::new();
        m.load(&program(ops));
        m.run(0x100, 1000)
    }

    #[test]
    fn arithmetic_and_halt() {
        let ops = [
            Op::RI(OpKind::LOADI, Reg::R2, 7),
            Op::RI(OpKind::LOADI, Reg::R3, -3),
            Op::RRR(OpKind::MUL, Reg::R1, Reg::R2, Reg::R3),
            Op::NONE(OpKind::HALT),
        ];
        assert_eq!(run(&ops), Ok(-21));
    }

    #[test]
    fn backward_branch_loop() {
        // r1 = 0; r2 = 5; do { r1 += r2; r2 -= 1 } while r2 != 0
        let ops = [
            Op::RI(OpKind::LOADI, Reg::R1, 0),
            Op::RI(OpKind::LOADI, Reg::R2, 5),
            Op::RRR(OpKind::ADD, Reg::R1, Reg::R1, Reg::R2),
            Op::RRI(OpKind::SUBI, Reg::R2, Reg::R2, 1),
            Op::CMP(Reg::R2, Reg::R0),
            Op::Branch(OpKind::JNZ, Target::Rel(-4)),
            Op::NONE(OpKind::HALT),
        ];
        assert_eq!(run(&ops), Ok(15));
    }

    #[test]
    fn call_and_return() {
        let ops = [
            Op::RI(OpKind::LOADI, Reg::SP, 0x1000),
            Op::Branch(OpKind::CALL, Target::Abs(0x10C)),
            Op::NONE(OpKind::HALT),
            Op::RI(OpKind::LOADI, Reg::R1, 42),
            Op::NONE(OpKind::RET),
        ];
        assert_eq!(run(&ops), Ok(42));
    }

    #[test]
    fn signed_compare() {
        let ops = [
            Op::RI(OpKind::LOADI, Reg::R2, -1),
            Op::CMP(Reg::R2, Reg::R0),
            Op::RI(OpKind::LOADI, Reg::R1, 1),
            Op::Branch(OpKind::JLT, Target::Rel(1)),
            Op::RI(OpKind::LOADI, Reg::R1, 0),
            Op::NONE(OpKind::HALT),
        ];
        assert_eq!(run(&ops), Ok(1));
    }

    #[test]
    fn divide_by_zero_faults() {
        let ops = [Op::RRR(OpKind::DIV, Reg::R1, Reg::R1, Reg::R0), Op::NONE(OpKind::HALT)];
        assert_eq!(run(&ops), Err(Fault::DivideByZero(0x100)));
    }

    #[test]
    fn r0_stays_zero() {
        let ops = [
            Op::RI(OpKind::LOADI, Reg::R0, 9),
            Op::RRR(OpKind::ADD, Reg::R1, Reg::R0, Reg::R0),
            Op::NONE(OpKind::HALT),
        ];
        assert_eq!(run(&ops), Ok(0));
    }
}
