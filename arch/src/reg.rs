use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Default,
    TryFromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Reg {
    #[default]
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    R16,
    R17,
    R18,
    R19,
    R20,
    R21,
    R22,
    R23,
    R24,
    R25,
    R26,
    R27,
    R28,
    R29,
    R30,
    R31,
}

impl Reg {
    pub const ZERO: Reg = Reg::R0;
    pub const SP: Reg = Reg::R30;
    pub const FP: Reg = Reg::R31;

    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_uppercase().as_str() {
            "SP" => Ok(Reg::SP),
            "FP" => Ok(Reg::FP),
            "ZERO" => Ok(Reg::ZERO),
            upper => upper
                .parse::<Self>()
                .map_err(|_| format!("Unknown reg name: {s} (expected R0..R31, SP, FP)")),
        }
    }

    /// Register from its 5-bit field value.
    pub fn from_field(n: u32) -> Reg {
        Reg::try_from((n & 0x1F) as u8).unwrap_or_default()
    }

    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names_and_aliases() {
        assert_eq!(Reg::parse("r5"), Ok(Reg::R5));
        assert_eq!(Reg::parse("R31"), Ok(Reg::R31));
        assert_eq!(Reg::parse("sp"), Ok(Reg::R30));
        assert_eq!(Reg::parse("FP"), Ok(Reg::R31));
        assert_eq!(Reg::parse("zero"), Ok(Reg::R0));
    }

    #[test]
    fn parse_out_of_range() {
        assert!(Reg::parse("R32").is_err());
        assert!(Reg::parse("R-1").is_err());
        assert!(Reg::parse("hoge").is_err());
    }

    #[test]
    fn field_roundtrip() {
        for n in 0..32u32 {
            assert_eq!(Reg::from_field(n).index() as u32, n);
        }
    }
}
