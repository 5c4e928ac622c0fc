use arch::abi::{TEMP_COUNT, TEMP_FIRST};
use arch::reg::Reg;

/// Bump allocator over R8..R27, reset at every statement.
/// Past twenty live values it wraps around and reuses R8.
#[derive(Debug, Default)]
pub struct Temps {
    next: usize,
}

impl Temps {
    pub fn new() -> Self {
        Temps::default()
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn alloc(&mut self) -> Reg {
        let reg = nth(self.next);
        self.next += 1;
        reg
    }

    pub fn mark(&self) -> usize {
        self.next
    }

    /// Give back everything allocated after `mark`
    pub fn rewind(&mut self, mark: usize) {
        self.next = mark;
    }

    /// Temporaries handed out since the last reset
    pub fn live(&self) -> Vec<Reg> {
        (0..self.next.min(TEMP_COUNT as usize)).map(nth).collect()
    }
}

fn nth(n: usize) -> Reg {
    Reg::from_field(TEMP_FIRST as u32 + (n % TEMP_COUNT as usize) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_upward_and_wraps() {
        let mut temps = Temps::new();
        assert_eq!(temps.alloc(), Reg::R8);
        assert_eq!(temps.alloc(), Reg::R9);
        for _ in 2..20 {
            temps.alloc();
        }
        assert_eq!(temps.alloc(), Reg::R8);
        assert_eq!(temps.live().len(), 20);
    }

    #[test]
    fn reset_starts_over() {
        let mut temps = Temps::new();
        temps.alloc();
        temps.alloc();
        assert_eq!(temps.live(), vec![Reg::R8, Reg::R9]);
        temps.reset();
        assert!(temps.live().is_empty());
        assert_eq!(temps.alloc(), Reg::R8);
    }
}
