//! Register file: eight general-purpose u32 slots, no special registers.

use crate::{VmFault, VmResult, NUM_REGS};

/// General-purpose registers `R0..R7`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    regs: [u32; NUM_REGS],
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of register `index`.
    ///
    /// Returns `InvalidRegister` if `index >= NUM_REGS`.
    #[inline]
    pub fn get(&self, index: u8) -> VmResult<u32> {
        self.regs
            .get(index as usize)
            .copied()
            .ok_or(VmFault::InvalidRegister { index })
    }

    /// Overwrite register `index`.
    ///
    /// Returns `InvalidRegister` (leaving every register unchanged) if
    /// `index >= NUM_REGS`.
    #[inline]
    pub fn set(&mut self, index: u8, value: u32) -> VmResult<()> {
        let slot = self
            .regs
            .get_mut(index as usize)
            .ok_or(VmFault::InvalidRegister { index })?;
        *slot = value;
        Ok(())
    }

    /// Check an operand index without reading it.
    #[inline]
    pub fn check(&self, index: u8) -> VmResult<()> {
        self.get(index).map(|_| ())
    }

    pub fn clear(&mut self) {
        self.regs = [0; NUM_REGS];
    }

    pub fn as_array(&self) -> &[u32; NUM_REGS] {
        &self.regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_zeroed() {
        let regs = Registers::new();
        assert_eq!(regs.as_array(), &[0; NUM_REGS]);
    }

    #[test]
    fn set_then_get() {
        let mut regs = Registers::new();
        regs.set(7, 0xFFFF_FFFF).unwrap();
        assert_eq!(regs.get(7), Ok(0xFFFF_FFFF));
        assert_eq!(regs.get(0), Ok(0));
    }

    #[test]
    fn index_eight_is_invalid() {
        let mut regs = Registers::new();
        assert_eq!(regs.get(8), Err(VmFault::InvalidRegister { index: 8 }));
        assert_eq!(regs.set(255, 1), Err(VmFault::InvalidRegister { index: 255 }));
        assert_eq!(regs.check(8), Err(VmFault::InvalidRegister { index: 8 }));
        assert_eq!(regs, Registers::new());
    }

    #[test]
    fn clear_zeroes_all() {
        let mut regs = Registers::new();
        for i in 0..NUM_REGS as u8 {
            regs.set(i, u32::from(i) + 1).unwrap();
        }
        regs.clear();
        assert_eq!(regs.as_array(), &[0; NUM_REGS]);
    }
}
