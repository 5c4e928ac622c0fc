use crate::{
    error::{Diag, Error, Warning},
    label::{Label, Labels},
    parser::{Line, Stmt},
};
use arch::{
    format::{fits_signed, fits_unsigned, Op, Target, ABS_BITS, IMM_BITS, WIDE_BITS},
    inst::{Imm, Inst},
    op::OpKind,
    reg::Reg,
};
use itertools::chain;

/// One encoded instruction.
#[derive(Debug, Clone)]
pub struct Assembled {
    pub address: u32,
    pub word: u32,
    /// Label still waiting for pass 2
    pub pending: Option<String>,
    pub inst: Inst,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataWord {
    pub address: u32,
    pub value: u32,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Inst(usize),
    Data(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Wide immediate, memory offset or `CALL`
    Absolute,
    /// Branch displacement, absolute when out of range
    Relative,
    /// `.word label`
    Data,
}

/// A forward reference recorded in pass 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reloc {
    pub site: Site,
    pub label: String,
    pub kind: RefKind,
}

#[derive(Debug, Default)]
pub struct Assembler {
    pub labels: Labels,
    pub insts: Vec<Assembled>,
    pub data: Vec<DataWord>,
    pub relocs: Vec<Reloc>,
    pub warnings: Vec<Diag<Warning>>,
    lc: u32,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler::default()
    }

    /// Run both passes over `source`.
    pub fn assemble(source: &str) -> Result<Assembler, Vec<Diag<Error>>> {
        let mut asm = Assembler::new();
        asm.pass1(source)?;
        asm.pass2()?;
        Ok(asm)
    }

    /// Assign addresses, record labels, encode what is already known.
    pub fn pass1(&mut self, source: &str) -> Result<(), Vec<Diag<Error>>> {
        let mut errors = vec![];
        for (idx, raw) in source.lines().enumerate() {
            if let Err(err) = self.line(idx, raw) {
                errors.push(Diag::new(idx, err));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn line(&mut self, idx: usize, raw: &str) -> Result<(), Error> {
        let Line { label, stmt } = Line::parse(raw)?;

        if let Some(Stmt::Org(addr)) = stmt {
            self.lc = addr;
        }
        if let Some(name) = label {
            let is_data = stmt.as_ref().map_or(false, Stmt::is_data);
            let label = Label { address: self.lc, is_data, line: idx };
            self.labels.define(&name, label)?;
        }

        match stmt {
            None | Some(Stmt::Org(_)) => {}
            Some(Stmt::Inst(inst)) => self.push_inst(idx, inst)?,
            Some(Stmt::Word(values)) => {
                for value in values {
                    self.push_data(idx, value)?;
                }
            }
            Some(Stmt::Str(text)) => {
                for ch in text.chars().chain(Some('\0')) {
                    self.push_data(idx, Imm::Lit(ch as i64))?;
                }
            }
        }
        Ok(())
    }

    /// Claim the next word and return its address.
    fn advance(&mut self) -> Result<u32, Error> {
        let address = self.lc;
        self.lc = address.checked_add(4).ok_or(Error::AddressOverflow(address))?;
        Ok(address)
    }

    fn push_inst(&mut self, line: usize, inst: Inst) -> Result<(), Error> {
        let address = self.advance()?;

        let (value, kind, pending) = match inst.imm() {
            None => (0, RefKind::Absolute, None),
            Some(Imm::Lit(v)) => (*v, RefKind::Absolute, None),
            Some(Imm::Label(name)) => match self.labels.address(name) {
                Some(addr) => (addr as i64, ref_kind(&inst), None),
                None => (0, ref_kind(&inst), Some(name.clone())),
            },
        };

        let word = match &pending {
            // placeholder, fixed in pass 2
            Some(_) => encode(&inst, address, 0, RefKind::Absolute).0,
            None => {
                let (word, warn) = encode(&inst, address, value, kind);
                if let Some(warn) = warn {
                    self.warnings.push(Diag::new(line, warn));
                }
                word
            }
        };

        if let Some(label) = &pending {
            let site = Site::Inst(self.insts.len());
            self.relocs.push(Reloc { site, label: label.clone(), kind });
        }
        self.insts.push(Assembled { address, word, pending, inst, line });
        Ok(())
    }

    fn push_data(&mut self, line: usize, value: Imm) -> Result<(), Error> {
        let address = self.advance()?;

        let value = match value {
            Imm::Lit(v) => v,
            Imm::Label(name) => match self.labels.address(&name) {
                Some(addr) => addr as i64,
                None => {
                    let site = Site::Data(self.data.len());
                    self.relocs.push(Reloc { site, label: name, kind: RefKind::Data });
                    0
                }
            },
        };
        let value = self.data_value(line, value);
        self.data.push(DataWord { address, value, line });
        Ok(())
    }

    fn data_value(&mut self, line: usize, value: i64) -> u32 {
        if !(i32::MIN as i64..=u32::MAX as i64).contains(&value) {
            self.warnings.push(Diag::new(line, Warning::Truncated(value, 32)));
        }
        value as u32
    }

    /// Patch every pending reference against the complete label table.
    pub fn pass2(&mut self) -> Result<(), Vec<Diag<Error>>> {
        let mut errors = vec![];
        for reloc in std::mem::take(&mut self.relocs) {
            let line = match reloc.site {
                Site::Inst(i) => self.insts[i].line,
                Site::Data(i) => self.data[i].line,
            };
            let Some(target) = self.labels.address(&reloc.label) else {
                errors.push(Diag::new(line, Error::UndefinedLabel(reloc.label.clone())));
                continue;
            };
            match reloc.site {
                Site::Inst(i) => {
                    let slot = &mut self.insts[i];
                    let (word, warn) = encode(&slot.inst, slot.address, target as i64, reloc.kind);
                    slot.word = word;
                    slot.pending = None;
                    if let Some(warn) = warn {
                        self.warnings.push(Diag::new(line, warn));
                    }
                }
                Site::Data(i) => {
                    let value = self.data_value(line, target as i64);
                    self.data[i].value = value;
                }
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Hex text: instructions first, then data words.
    pub fn hex(&self) -> String {
        self.words().map(|w| format!("{:08X}\n", w)).collect()
    }

    fn words(&self) -> impl Iterator<Item = u32> + '_ {
        chain!(self.insts.iter().map(|i| i.word), self.data.iter().map(|d| d.value))
    }

    /// `(address, word)` pairs for a loader.
    pub fn image(&self) -> Vec<(u32, u32)> {
        chain!(
            self.insts.iter().map(|i| (i.address, i.word)),
            self.data.iter().map(|d| (d.address, d.value)),
        )
        .collect()
    }

    /// `_start` if defined, otherwise the first instruction.
    pub fn entry(&self) -> u32 {
        self.labels
            .address("_start")
            .or_else(|| self.insts.first().map(|i| i.address))
            .unwrap_or(0)
    }
}

fn ref_kind(inst: &Inst) -> RefKind {
    match inst {
        Inst::Branch(op, _) if *op != OpKind::CALL => RefKind::Relative,
        _ => RefKind::Absolute,
    }
}

/// Encode `inst` located at `addr` with its immediate resolved to `value`.
pub fn encode(inst: &Inst, addr: u32, value: i64, kind: RefKind) -> (u32, Option<Warning>) {
    let mut warn = None;
    let mut check = |ok: bool, bits: u32| {
        if !ok {
            warn = Some(Warning::Truncated(value, bits));
        }
    };

    let op = match *inst {
        Inst::RRR(op, rd, rs1, rs2) => Op::RRR(op, rd, rs1, rs2),
        Inst::MOV(rd, rs) => Op::RRR(OpKind::ADD, rd, rs, Reg::R0),
        Inst::NOT(rd, rs) => Op::NOT(rd, rs),
        Inst::CMP(rs1, rs2) => Op::CMP(rs1, rs2),
        Inst::R(op, r) => Op::R(op, r),
        Inst::NONE(op) => Op::NONE(op),
        Inst::RRI(op, rd, rs1, _) => {
            check(fits_signed(value, IMM_BITS), IMM_BITS);
            Op::RRI(op, rd, rs1, value as i32)
        }
        Inst::MEM(op, r, base, _) => {
            check(fits_signed(value, IMM_BITS), IMM_BITS);
            Op::MEM(op, r, base, value as i32)
        }
        Inst::RI(op, rd, _) => {
            check(fits_signed(value, WIDE_BITS), WIDE_BITS);
            Op::RI(op, rd, value as i32)
        }
        Inst::Branch(op, _) => {
            let disp = (value - (addr as i64 + 4)) / 4;
            let target = if kind == RefKind::Relative && fits_signed(disp, IMM_BITS) {
                Target::Rel(disp as i32)
            } else {
                check(fits_unsigned(value, ABS_BITS), ABS_BITS);
                Target::Abs(value as u32)
            };
            Op::Branch(op, target)
        }
    };
    (op.to_bin(), warn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backward_label_resolves_in_pass1() {
        let mut asm = Assembler::new();
        let src = "top: NOP\nJMP top\n";
        assert!(asm.pass1(src).is_ok());
        assert!(asm.relocs.is_empty());
        assert_eq!(Op::from_bin(asm.insts[1].word), Ok(Op::Branch(OpKind::JMP, Target::Rel(-2))));
    }

    #[test]
    fn forward_label_is_pending_until_pass2() {
        let mut asm = Assembler::new();
        assert!(asm.pass1("JMP end\nNOP\nend: HALT\n").is_ok());
        assert_eq!(
            asm.relocs,
            vec![Reloc { site: Site::Inst(0), label: "end".to_string(), kind: RefKind::Relative }]
        );
        assert_eq!(asm.insts[0].pending.as_deref(), Some("end"));
        assert!(asm.pass2().is_ok());
        assert_eq!(asm.insts[0].pending, None);
        assert_eq!(Op::from_bin(asm.insts[0].word), Ok(Op::Branch(OpKind::JMP, Target::Rel(1))));
    }

    #[test]
    fn call_is_absolute() {
        let asm = Assembler::assemble(".org 0x8000\nCALL f\nHALT\nf: RET\n");
        let asm = asm.ok().unwrap_or_default();
        assert_eq!(
            Op::from_bin(asm.insts[0].word),
            Ok(Op::Branch(OpKind::CALL, Target::Abs(0x8008)))
        );
    }

    #[test]
    fn far_branch_falls_back_to_absolute() {
        let src = "JZ far\n.org 0x4000\nfar: HALT\n";
        let asm = Assembler::assemble(src).ok().unwrap_or_default();
        let expect = Op::Branch(OpKind::JZ, Target::Abs(0x4000));
        assert_eq!(Op::from_bin(asm.insts[0].word), Ok(expect));
        assert!(asm.warnings.is_empty());
    }

    #[test]
    fn oversized_immediate_keeps_other_fields() {
        let asm = Assembler::assemble("ADDI R3, R4, #5000\n").ok().unwrap_or_default();
        assert_eq!(asm.warnings.len(), 1);
        assert_eq!(asm.warnings[0].item, Warning::Truncated(5000, IMM_BITS));
        match Op::from_bin(asm.insts[0].word) {
            Ok(Op::RRI(OpKind::ADDI, Reg::R3, Reg::R4, _)) => {}
            other => panic!("{other:?}"),
        }
    }
}
