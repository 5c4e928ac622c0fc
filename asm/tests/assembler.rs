use arch::{
    format::{Op, Target},
    op::OpKind,
    reg::Reg,
};
use asm::{
    error::{Error, Warning},
    Assembler,
};

fn assemble(src: &str) -> Assembler {
    match Assembler::assemble(src) {
        Ok(asm) => asm,
        Err(errors) => panic!("{:?}", errors),
    }
}

fn errors(src: &str) -> Vec<Error> {
    match Assembler::assemble(src) {
        Ok(_) => panic!("expected failure:\n{}", src),
        Err(errors) => errors.into_iter().map(|d| d.item).collect(),
    }
}

fn decode(asm: &Assembler, idx: usize) -> Op {
    match Op::from_bin(asm.insts[idx].word) {
        Ok(op) => op,
        Err(code) => panic!("bad opcode {code:#x}"),
    }
}

macro_rules! case {
    ($name:ident, $src:expr, $idx:expr, $op:expr) => {
        #[test]
        fn $name() {
            let asm = assemble($src);
            assert_eq!(decode(&asm, $idx), $op);
        }
    };
}

case!(rrr, "add r1, r2, r3", 0, Op::RRR(OpKind::ADD, Reg::R1, Reg::R2, Reg::R3));
case!(mov_alias, "MOV R1, R8", 0, Op::RRR(OpKind::ADD, Reg::R1, Reg::R8, Reg::R0));
case!(loadi_neg, "LOADI R5, #-7", 0, Op::RI(OpKind::LOADI, Reg::R5, -7));
case!(loadi_hex, "LOADI R5, 0x1F", 0, Op::RI(OpKind::LOADI, Reg::R5, 31));
case!(load_fp, "LOAD R8, [FP-8]", 0, Op::MEM(OpKind::LOAD, Reg::R8, Reg::R31, -8));
case!(store_plain, "STORE R1, [R9]", 0, Op::MEM(OpKind::STORE, Reg::R1, Reg::R9, 0));
case!(push_sp, "PUSH SP", 0, Op::R(OpKind::PUSH, Reg::R30));
case!(cmp, "CMP R8, R0", 0, Op::CMP(Reg::R8, Reg::R0));
case!(ret, "RET ; done", 0, Op::NONE(OpKind::RET));

case!(
    forward_branch,
    "JMP done\nNOP\nNOP\ndone: HALT",
    0,
    Op::Branch(OpKind::JMP, Target::Rel(2))
);
case!(
    backward_branch,
    "loop: ADDI R1, R1, #1\nCMP R1, R2\nJLT loop",
    2,
    Op::Branch(OpKind::JLT, Target::Rel(-3))
);
case!(
    label_in_wide_immediate,
    ".org 0x8000\nLOADI R8, msg\nHALT\nmsg: .string \"hi\"",
    0,
    Op::RI(OpKind::LOADI, Reg::R8, 0x8008)
);

#[test]
fn branch_targets_reach_their_labels() {
    let src = "\
.org 0x8000
start:  JZ  fwd
back:   NOP
        JNZ back
fwd:    JMP start
";
    let asm = assemble(src);
    for (idx, target) in [(0, "fwd"), (2, "back"), (3, "start")] {
        let inst = &asm.insts[idx];
        let Op::Branch(_, t) = decode(&asm, idx) else {
            panic!("not a branch");
        };
        assert_eq!(Some(t.address(inst.address)), asm.labels.address(target));
    }
}

#[test]
fn truncation_warns_without_failing() {
    let asm = assemble("SUBI R30, R30, #2048\nLOADI R1, #2000000");
    let items: Vec<_> = asm.warnings.iter().map(|w| (w.line, w.item.clone())).collect();
    assert_eq!(
        items,
        vec![(0, Warning::Truncated(2048, 11)), (1, Warning::Truncated(2000000, 21))]
    );
    assert_eq!(decode(&asm, 0), Op::RRI(OpKind::SUBI, Reg::R30, Reg::R30, -2048));
}

#[test]
fn duplicate_label_is_fatal() {
    let errs = errors("a: NOP\nb: NOP\na: HALT");
    assert!(matches!(&errs[..], [Error::RedefinedLabel(name, 1)] if name == "a"));
}

#[test]
fn every_unresolved_label_is_reported() {
    let errs = errors("JMP nowhere\nCALL missing\n.word gone");
    let names: Vec<_> = errs
        .iter()
        .map(|e| match e {
            Error::UndefinedLabel(name) => name.as_str(),
            other => panic!("{other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["nowhere", "missing", "gone"]);
}

#[test]
fn pass1_collects_all_errors() {
    let errs = errors("FROB R1\nADD R1, R2, R40\nADD R1, R2\n");
    assert_eq!(errs.len(), 3);
    assert!(matches!(errs[0], Error::UnknownOperation(_)));
    assert!(matches!(errs[1], Error::BadRegister(_)));
    assert!(matches!(errs[2], Error::MissingArgument(_)));
}

#[test]
fn org_outside_the_address_space_is_rejected() {
    for src in [".org -4\nNOP\n", ".org 0x100000000\nNOP\n"] {
        let errs = errors(src);
        let rejected = matches!(&errs[..], [Error::ParseArgument(_, what)] if what == "address");
        assert!(rejected, "{errs:?}");
    }
}

#[test]
fn location_counter_overflow_is_an_error() {
    let errs = errors(".org 0xFFFFFFF8\nNOP\nNOP\n");
    assert!(matches!(&errs[..], [Error::AddressOverflow(0xFFFFFFFC)]), "{errs:?}");
    let errs = errors(".org 0xFFFFFFFC\n.word 1, 2\n");
    assert!(matches!(&errs[..], [Error::AddressOverflow(_)]), "{errs:?}");
}

#[test]
fn data_follows_code() {
    let src = "\
.org 0x8000
        LOADI R1, table
        HALT
table:  .word 7, -1, table
msg:    .string \"A\\n\"
";
    let asm = assemble(src);
    assert_eq!(asm.insts.len(), 2);
    let data: Vec<_> = asm.data.iter().map(|d| (d.address, d.value)).collect();
    assert_eq!(
        data,
        vec![
            (0x8008, 7),
            (0x800C, 0xFFFF_FFFF),
            (0x8010, 0x8008),
            (0x8014, 'A' as u32),
            (0x8018, '\n' as u32),
            (0x801C, 0),
        ]
    );
    assert!(asm.labels.get("table").map_or(false, |l| l.is_data));
    assert_eq!(asm.entry(), 0x8000);
}

#[test]
fn hex_is_eight_digits_per_word() {
    let asm = assemble("HALT\n.word 0xAB");
    assert_eq!(asm.hex(), "7C000000\n000000AB\n");
    assert_eq!(asm.image(), vec![(0, 0x7C00_0000), (4, 0xAB)]);
}
