//! `ferrovm-runtime`: bytecode interpreter with a file-mirrored memory image.
//!
//! This crate provides:
//! - `Memory`: the fixed 4 KiB memory store, bounds-checked, big-endian words
//! - `BackingFile`: whole-image persist/restore against a flat binary file
//! - `Registers` / `OperandStack`: eight u32 registers and a 256-slot stack
//! - `Instruction`: the closed opcode set, decoded once per step
//! - `Machine`: the fetch-decode-execute engine tying it all together
//!
//! Faults never unwind out of `Machine::run`. Recoverable ones are logged
//! through the `log` facade and execution continues; fatal ones stop the
//! machine and are recorded as its `HaltReason`.

/// Size of the memory store in bytes.
pub const MEM_SIZE: usize = 4096;

/// Number of general-purpose registers.
pub const NUM_REGS: usize = 8;

/// Number of slots in the operand stack (one is never reachable).
pub const STACK_SIZE: usize = 256;

mod backing;
pub use backing::{BackingFile, PersistError, RestoreOutcome, DEFAULT_BACKING_PATH};

mod memory;
pub use memory::Memory;

mod registers;
pub use registers::Registers;

mod stack;
pub use stack::OperandStack;

mod instruction;
pub use instruction::{Instruction, Opcode};

mod syscall;
pub use syscall::{BufferConsole, Console, StdoutConsole, Syscall};

mod machine;
pub use machine::{HaltReason, Machine, MachineConfig, StateSnapshot};

/// Machine faults. Logged, never propagated out of a run.
///
/// Most are recoverable: the offending instruction (or operand) becomes a
/// no-op and execution continues. `UnknownOpcode` and `EndOfMemory` stop
/// the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmFault {
    /// 32-bit memory access whose last byte lies past the end of memory.
    OutOfBounds { addr: u32 },
    /// Register operand index outside `0..NUM_REGS`.
    InvalidRegister { index: u8 },
    /// Integer division with a zero divisor.
    DivisionByZero,
    /// Push onto a full operand stack.
    StackOverflow,
    /// Pop from an empty operand stack.
    StackUnderflow,
    /// Syscall code with no registered service.
    UnknownSyscall { code: u8 },
    /// Block copy touched an address past the end of memory.
    CopyOutOfBounds { offset: u32 },
    /// Opcode byte not in the instruction set.
    UnknownOpcode { opcode: u8, at: u32 },
    /// Program counter ran off the end of memory.
    EndOfMemory,
}

impl VmFault {
    /// Whether this fault stops the machine.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmFault::UnknownOpcode { .. } | VmFault::EndOfMemory)
    }
}

impl core::fmt::Display for VmFault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            VmFault::OutOfBounds { addr } => write!(f, "address 0x{addr:04X} out of bounds"),
            VmFault::InvalidRegister { index } => write!(f, "invalid register number: {index}"),
            VmFault::DivisionByZero => write!(f, "division by zero"),
            VmFault::StackOverflow => write!(f, "stack overflow"),
            VmFault::StackUnderflow => write!(f, "stack underflow"),
            VmFault::UnknownSyscall { code } => write!(f, "unknown system call: 0x{code:02X}"),
            VmFault::CopyOutOfBounds { offset } => {
                write!(f, "memory access violation at copy offset {offset}")
            }
            VmFault::UnknownOpcode { opcode, at } => {
                write!(f, "unknown opcode: 0x{opcode:02X} at address 0x{at:04X}")
            }
            VmFault::EndOfMemory => write!(f, "PC reached end of memory"),
        }
    }
}

/// Result type for fallible machine operations.
pub type VmResult<T> = Result<T, VmFault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_fault_is_copy() {
        let fault = VmFault::StackOverflow;
        let fault2 = fault; // Copy
        assert_eq!(fault, fault2);
    }

    #[test]
    fn only_decode_faults_are_fatal() {
        assert!(VmFault::UnknownOpcode { opcode: 0xAB, at: 0 }.is_fatal());
        assert!(VmFault::EndOfMemory.is_fatal());
        assert!(!VmFault::DivisionByZero.is_fatal());
        assert!(!VmFault::OutOfBounds { addr: 4093 }.is_fatal());
        assert!(!VmFault::StackUnderflow.is_fatal());
    }

    #[test]
    fn fault_messages_use_hex_addresses() {
        let fault = VmFault::UnknownOpcode { opcode: 0xAB, at: 0x10 };
        assert_eq!(fault.to_string(), "unknown opcode: 0xAB at address 0x0010");
        assert_eq!(
            VmFault::OutOfBounds { addr: 4094 }.to_string(),
            "address 0x0FFE out of bounds"
        );
    }

    #[test]
    fn vm_result_err() {
        let result: VmResult<u32> = Err(VmFault::DivisionByZero);
        assert_eq!(result, Err(VmFault::DivisionByZero));
    }
}
