use crate::error::Error;
use arch::{
    inst::{Imm, Inst},
    op::{self, OpKind, Shape},
    reg::Reg,
};
use std::num::ParseIntError;

// ----------------------------------------------------------------------------
// Line

/// One source line: `[label:] [statement] [; comment]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    pub label: Option<String>,
    pub stmt: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Inst(Inst),
    Org(u32),
    Word(Vec<Imm>),
    Str(String),
}

impl Stmt {
    /// Emits data words rather than code.
    pub fn is_data(&self) -> bool {
        matches!(self, Stmt::Word(_) | Stmt::Str(_))
    }
}

impl Line {
    pub fn parse(raw: &str) -> Result<Line, Error> {
        let code = strip_comment(raw).trim();
        if code.is_empty() {
            return Ok(Line::default());
        }

        // main:  /  main: ADD R1, R2, R3
        let (label, rest) = match code.find(':') {
            Some(pos) if is_ident(code[..pos].trim()) => {
                (Some(code[..pos].trim().to_string()), code[pos + 1..].trim())
            }
            _ => (None, code),
        };

        let stmt = if rest.is_empty() {
            None
        } else if rest.starts_with('.') {
            Some(parse_directive(rest)?)
        } else {
            Some(Stmt::Inst(parse_inst(rest)?))
        };

        Ok(Line { label, stmt })
    }
}

/// Cut `;` and `//` comments that are not inside a quoted string.
fn strip_comment(raw: &str) -> &str {
    let mut quoted = false;
    let mut escaped = false;
    let bytes = raw.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        if quoted {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => quoted = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => quoted = true,
            b';' => return &raw[..idx],
            b'/' if bytes.get(idx + 1) == Some(&b'/') => return &raw[..idx],
            _ => {}
        }
    }
    raw
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

// ----------------------------------------------------------------------------
// Directive

fn parse_directive(code: &str) -> Result<Stmt, Error> {
    let (name, rest) = match code.find(char::is_whitespace) {
        Some(pos) => (&code[..pos], code[pos..].trim()),
        None => (code, ""),
    };
    match name.to_ascii_lowercase().as_str() {
        ".org" => {
            let bad = || Error::ParseArgument(rest.to_string(), "address".to_string());
            let addr = parse_number(rest.trim_start_matches('#')).map_err(|_| bad())?;
            let addr = u32::try_from(addr).map_err(|_| bad())?;
            Ok(Stmt::Org(addr))
        }
        ".word" => {
            let values = tokenize(rest)
                .iter()
                .map(|tok| parse_imm(tok))
                .collect::<Result<Vec<_>, _>>()?;
            if values.is_empty() {
                return Err(Error::MissingArgument(name.to_string()));
            }
            Ok(Stmt::Word(values))
        }
        ".string" => Ok(Stmt::Str(parse_string(rest)?)),
        _ => Err(Error::UnknownDirective(name.to_string())),
    }
}

fn parse_string(s: &str) -> Result<String, Error> {
    let inner = s
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| Error::ParseArgument(s.to_string(), "string".to_string()))?;
    let mut text = String::new();
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some('r') => text.push('\r'),
            Some('0') => text.push('\0'),
            Some('\\') => text.push('\\'),
            Some('"') => text.push('"'),
            Some('\'') => text.push('\''),
            Some(other) => {
                return Err(Error::ParseArgument(format!("\\{other}"), "escape".to_string()))
            }
            None => return Err(Error::ParseArgument(s.to_string(), "string".to_string())),
        }
    }
    Ok(text)
}

// ----------------------------------------------------------------------------
// Instruction

/// Split operands on commas and spaces, keeping `[...]` spans whole.
pub fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    for ch in s.chars() {
        match ch {
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth -= 1;
                current.push(ch);
            }
            c if depth == 0 && (c == ',' || c.is_whitespace()) => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() => {}
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_inst(code: &str) -> Result<Inst, Error> {
    let (mnemonic, rest) = match code.find(char::is_whitespace) {
        Some(pos) => (&code[..pos], &code[pos..]),
        None => (code, ""),
    };
    let (op, shape) =
        op::lookup(mnemonic).ok_or_else(|| Error::UnknownOperation(mnemonic.to_string()))?;
    let args = tokenize(rest);

    // Get argument by index and parse it
    // Example: arg!(0, parse_reg) -> Reg
    macro_rules! arg {
        ($index:expr, $parse:ident) => {{
            let arg = args
                .get($index)
                .ok_or_else(|| Error::MissingArgument(mnemonic.to_string()))?;
            $parse(arg)?
        }};
    }

    let (inst, used) = match shape {
        Shape::RRR => {
            let (rd, rs1, rs2) = (arg!(0, parse_reg), arg!(1, parse_reg), arg!(2, parse_reg));
            (Inst::RRR(op, rd, rs1, rs2), 3)
        }
        Shape::RRI => {
            let (rd, rs1, imm) = (arg!(0, parse_reg), arg!(1, parse_reg), arg!(2, parse_imm));
            (Inst::RRI(op, rd, rs1, imm), 3)
        }
        Shape::RI => (Inst::RI(op, arg!(0, parse_reg), arg!(1, parse_imm)), 2),
        Shape::RR => match op {
            OpKind::NOT => (Inst::NOT(arg!(0, parse_reg), arg!(1, parse_reg)), 2),
            OpKind::CMP => (Inst::CMP(arg!(0, parse_reg), arg!(1, parse_reg)), 2),
            _ => (Inst::MOV(arg!(0, parse_reg), arg!(1, parse_reg)), 2),
        },
        Shape::R => (Inst::R(op, arg!(0, parse_reg)), 1),
        Shape::I => (Inst::Branch(op, arg!(0, parse_imm)), 1),
        Shape::NONE => (Inst::NONE(op), 0),
        Shape::MEM => {
            let reg = arg!(0, parse_reg);
            let mem = args
                .get(1)
                .ok_or_else(|| Error::MissingArgument(mnemonic.to_string()))?;
            if mem.starts_with('[') {
                let (base, off) = parse_mem(mem)?;
                (Inst::MEM(op, reg, base, off), 2)
            } else {
                // LOAD rd, rb, #off
                (Inst::MEM(op, reg, parse_reg(mem)?, arg!(2, parse_imm)), 3)
            }
        }
    };

    if let Some(extra) = args.get(used) {
        return Err(Error::UnexpectedArgument(mnemonic.to_string(), extra.clone()));
    }
    Ok(inst)
}

fn parse_reg(s: &str) -> Result<Reg, Error> {
    Reg::parse(s).map_err(|_| Error::BadRegister(s.to_string()))
}

/// `#12`, `-4`, `0x10`, `0b101`, `label`
pub fn parse_imm(s: &str) -> Result<Imm, Error> {
    let body = s.strip_prefix('#').unwrap_or(s);
    if let Ok(v) = parse_number(body) {
        return Ok(Imm::Lit(v));
    }
    if let Some(ch) = parse_char(body) {
        return Ok(Imm::Lit(ch as i64));
    }
    if is_ident(body) && Reg::parse(body).is_err() {
        return Ok(Imm::Label(body.to_string()));
    }
    Err(Error::ParseArgument(s.to_string(), "immediate".to_string()))
}

fn parse_char(s: &str) -> Option<char> {
    let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let ch = chars.next()?;
    chars.next().is_none().then_some(ch)
}

/// `[R5]`, `[R5+8]`, `[R31-4]`, `[R5+label]`, `[label]`
fn parse_mem(s: &str) -> Result<(Reg, Imm), Error> {
    let err = || Error::ParseArgument(s.to_string(), "memory operand".to_string());
    let inner = s
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(err)?
        .trim();

    let split = inner.find(|c| c == '+' || c == '-');
    let (head, tail) = match split {
        Some(pos) => (inner[..pos].trim(), Some((&inner[pos..pos + 1], inner[pos + 1..].trim()))),
        None => (inner, None),
    };

    match (Reg::parse(head), tail) {
        (Ok(base), None) => Ok((base, Imm::Lit(0))),
        (Ok(base), Some(("+", off))) => Ok((base, parse_imm(off)?)),
        (Ok(base), Some((_, off))) => match parse_imm(off)? {
            Imm::Lit(v) => Ok((base, Imm::Lit(-v))),
            Imm::Label(_) => Err(err()),
        },
        (Err(_), None) if is_ident(head) => Ok((Reg::R0, Imm::Label(head.to_string()))),
        _ => Err(err()),
    }
}

fn parse_number(s: &str) -> Result<i64, ParseIntError> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let v = parse_with_prefix(digits)?;
    Ok(if neg { -v } else { v })
}

fn parse_with_prefix(s: &str) -> Result<i64, ParseIntError> {
    if s.len() < 2 {
        i64::from_str_radix(s, 10)
    } else {
        let (prefix, num) = s.split_at(2);
        match prefix {
            "0b" | "0B" => i64::from_str_radix(num, 2),
            "0o" | "0O" => i64::from_str_radix(num, 8),
            "0x" | "0X" => i64::from_str_radix(num, 16),
            _ => i64::from_str_radix(s, 10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(code: &str) -> Inst {
        match Line::parse(code) {
            Ok(Line { stmt: Some(Stmt::Inst(inst)), .. }) => inst,
            other => panic!("{code}: {other:?}"),
        }
    }

    #[test]
    fn tokenize_keeps_brackets() {
        assert_eq!(tokenize(" R1, [R2 + 8]"), vec!["R1", "[R2+8]"]);
        assert_eq!(tokenize("R1,R2,R3"), vec!["R1", "R2", "R3"]);
        assert_eq!(tokenize("R1 R2  #5"), vec!["R1", "R2", "#5"]);
    }

    #[test]
    fn comments_and_labels() {
        assert_eq!(Line::parse("  ; only comment").ok(), Some(Line::default()));
        let line = Line::parse("loop: ADDI R1, R1, #1 // bump").ok();
        assert_eq!(
            line,
            Some(Line {
                label: Some("loop".to_string()),
                stmt: Some(Stmt::Inst(Inst::RRI(OpKind::ADDI, Reg::R1, Reg::R1, Imm::Lit(1)))),
            })
        );
        let line = Line::parse(".L3_end:").ok();
        assert_eq!(line.and_then(|l| l.label), Some(".L3_end".to_string()));
    }

    #[test]
    fn string_keeps_semicolon() {
        let line = Line::parse("msg: .string \"a;b\\n\" ; tail").ok();
        assert_eq!(line.and_then(|l| l.stmt), Some(Stmt::Str("a;b\n".to_string())));
    }

    #[test]
    fn immediates() {
        assert_eq!(parse_imm("#12").ok(), Some(Imm::Lit(12)));
        assert_eq!(parse_imm("-4").ok(), Some(Imm::Lit(-4)));
        assert_eq!(parse_imm("0x10").ok(), Some(Imm::Lit(16)));
        assert_eq!(parse_imm("#0b101").ok(), Some(Imm::Lit(5)));
        assert_eq!(parse_imm("'A'").ok(), Some(Imm::Lit(65)));
        assert_eq!(parse_imm("main").ok(), Some(Imm::Label("main".to_string())));
        assert!(parse_imm("R3").is_err());
    }

    #[test]
    fn memory_operands() {
        assert_eq!(
            inst("LOAD R8, [R31-4]"),
            Inst::MEM(OpKind::LOAD, Reg::R8, Reg::R31, Imm::Lit(-4))
        );
        assert_eq!(
            inst("store r1, [r5+8]"),
            Inst::MEM(OpKind::STORE, Reg::R1, Reg::R5, Imm::Lit(8))
        );
        assert_eq!(inst("LOAD R2, [R9]"), Inst::MEM(OpKind::LOAD, Reg::R2, Reg::R9, Imm::Lit(0)));
        assert_eq!(
            inst("LOAD R2, [counter]"),
            Inst::MEM(OpKind::LOAD, Reg::R2, Reg::R0, Imm::label("counter"))
        );
        assert_eq!(
            inst("STORE R1, R2, #0"),
            Inst::MEM(OpKind::STORE, Reg::R1, Reg::R2, Imm::Lit(0))
        );
    }

    #[test]
    fn aliases_and_shapes() {
        assert_eq!(inst("mov R1, R8"), Inst::MOV(Reg::R1, Reg::R8));
        assert_eq!(inst("MOVE R1, R8"), Inst::MOV(Reg::R1, Reg::R8));
        assert_eq!(inst("CMP R8, R0"), Inst::CMP(Reg::R8, Reg::R0));
        assert_eq!(inst("jne done"), Inst::Branch(OpKind::JNZ, Imm::label("done")));
        assert_eq!(inst("push fp"), Inst::R(OpKind::PUSH, Reg::R31));
        assert_eq!(inst("HALT"), Inst::NONE(OpKind::HALT));
    }

    #[test]
    fn emitted_text_parses_back() {
        let cases = [
            Inst::RI(OpKind::LOADI, Reg::R30, Imm::Lit(983040)),
            Inst::RRI(OpKind::SUBI, Reg::R30, Reg::R30, Imm::Lit(8)),
            Inst::MEM(OpKind::STORE, Reg::R1, Reg::R31, Imm::Lit(-4)),
            Inst::Branch(OpKind::CALL, Imm::label("main")),
            Inst::RI(OpKind::LOADI, Reg::R8, Imm::label(".S0")),
        ];
        for case in cases {
            assert_eq!(inst(&case.to_string()), case);
        }
    }

    #[test]
    fn errors() {
        assert!(matches!(Line::parse("FOO R1"), Err(Error::UnknownOperation(_))));
        assert!(matches!(Line::parse("ADD R1, R2"), Err(Error::MissingArgument(_))));
        assert!(matches!(Line::parse("ADD R1, R2, R32"), Err(Error::BadRegister(_))));
        assert!(matches!(Line::parse("RET R1"), Err(Error::UnexpectedArgument(..))));
        assert!(matches!(Line::parse(".bss 4"), Err(Error::UnknownDirective(_))));
    }
}
