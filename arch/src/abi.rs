//! Memory map and register conventions shared by the compiler and its tests.

use crate::reg::Reg;

pub const WORD: u32 = 4;

pub const CODE_BASE: u32 = 0x8000;
pub const HEAP_BASE: u32 = 0x2_0000;
pub const STACK_TOP: u32 = 0xF_0000;

pub const RET: Reg = Reg::R1;
pub const ARGS: [Reg; 6] = [Reg::R1, Reg::R2, Reg::R3, Reg::R4, Reg::R5, Reg::R6];
pub const SCRATCH: Reg = Reg::R7;
pub const HEAP: Reg = Reg::R29;

/// Expression temporaries R8..=R27.
pub const TEMP_FIRST: u8 = 8;
pub const TEMP_COUNT: u8 = 20;
