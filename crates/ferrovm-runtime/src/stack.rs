//! Operand stack: fixed-capacity u32 stack growing downward.
//!
//! `sp` starts at `STACK_SIZE - 1` (empty). A push stores at `sp` and then
//! decrements; a pop increments and then reads. Push refuses once `sp`
//! reaches 0 and pop refuses while `sp >= STACK_SIZE - 1`, so slot 0 is
//! never written and the usable depth is `STACK_SIZE - 1`.

use crate::{VmFault, VmResult, STACK_SIZE};

/// Stack pointer value for an empty stack.
const EMPTY_SP: usize = STACK_SIZE - 1;

pub struct OperandStack {
    slots: [u32; STACK_SIZE],
    sp: usize,
}

impl OperandStack {
    pub fn new() -> Self {
        Self {
            slots: [0; STACK_SIZE],
            sp: EMPTY_SP,
        }
    }

    /// Push `value`. On overflow the value is discarded.
    #[inline]
    pub fn push(&mut self, value: u32) -> VmResult<()> {
        if self.sp == 0 {
            return Err(VmFault::StackOverflow);
        }
        let slot = self.slots.get_mut(self.sp).ok_or(VmFault::StackOverflow)?;
        *slot = value;
        self.sp -= 1;
        Ok(())
    }

    /// Pop the most recently pushed value.
    #[inline]
    pub fn pop(&mut self) -> VmResult<u32> {
        if self.sp >= EMPTY_SP {
            return Err(VmFault::StackUnderflow);
        }
        self.sp += 1;
        self.slots.get(self.sp).copied().ok_or(VmFault::StackUnderflow)
    }

    /// Current stack pointer.
    #[inline(always)]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Number of values currently on the stack.
    #[inline(always)]
    pub fn depth(&self) -> usize {
        EMPTY_SP - self.sp
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.sp >= EMPTY_SP
    }

    /// Zero every slot and reset `sp` to empty.
    pub fn clear(&mut self) {
        self.slots = [0; STACK_SIZE];
        self.sp = EMPTY_SP;
    }
}

impl Default for OperandStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let stack = OperandStack::new();
        assert_eq!(stack.sp(), STACK_SIZE - 1);
        assert_eq!(stack.depth(), 0);
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_on_empty_underflows() {
        let mut stack = OperandStack::new();
        assert_eq!(stack.pop(), Err(VmFault::StackUnderflow));
        assert_eq!(stack.sp(), STACK_SIZE - 1);
    }

    #[test]
    fn lifo_order() {
        let mut stack = OperandStack::new();
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();
        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.pop(), Ok(3));
        assert_eq!(stack.pop(), Ok(2));
        assert_eq!(stack.pop(), Ok(1));
        assert_eq!(stack.pop(), Err(VmFault::StackUnderflow));
    }

    #[test]
    fn usable_depth_is_one_less_than_capacity() {
        let mut stack = OperandStack::new();
        for i in 0..(STACK_SIZE - 1) as u32 {
            assert_eq!(stack.push(i), Ok(()), "push {i} should succeed");
        }
        assert_eq!(stack.sp(), 0);
        assert_eq!(stack.push(999), Err(VmFault::StackOverflow));
        assert_eq!(stack.depth(), STACK_SIZE - 1);
        // The discarded value never lands anywhere.
        assert_eq!(stack.pop(), Ok((STACK_SIZE - 2) as u32));
    }

    #[test]
    fn clear_resets_pointer() {
        let mut stack = OperandStack::new();
        stack.push(5).unwrap();
        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), Err(VmFault::StackUnderflow));
    }
}

#[cfg(kani)]
mod proofs {
    use super::*;

    /// Proof: push/pop never panic and sp stays within the slot array.
    #[kani::proof]
    #[kani::unwind(3)]
    fn push_pop_keep_sp_in_range() {
        let mut stack = OperandStack::new();
        let a: u32 = kani::any();
        let _ = stack.push(a);
        let _ = stack.pop();
        let _ = stack.pop();
        kani::assert(stack.sp() < STACK_SIZE, "sp stays within the slot array");
    }
}
