//! The machine: loader, fetch-decode-execute engine, reset and inspection.
//!
//! A `Machine` exclusively owns its memory, registers, operand stack and
//! console; nothing is shared and nothing is global. `run` is synchronous
//! and always terminates: no instruction moves the program counter
//! backwards, so a run ends on HALT, on an unknown opcode, or when the
//! counter leaves memory, after at most `MEM_SIZE` instructions.
//!
//! Error policy has two tiers. Recoverable faults (bad register index,
//! out-of-range word access, division by zero, stack overflow/underflow,
//! unknown syscall, partial block copy) are logged and the run continues.
//! An unknown opcode or the counter running off the end stops the machine.
//! Neither tier produces an error value from `run`; callers look at
//! `is_running`, `halt_reason` and the registers afterwards.

use core::fmt;
use std::path::PathBuf;

use crate::backing::{BackingFile, PersistError, RestoreOutcome, DEFAULT_BACKING_PATH};
use crate::instruction::Instruction;
use crate::memory::Memory;
use crate::registers::Registers;
use crate::stack::OperandStack;
use crate::syscall::{Console, StdoutConsole, Syscall};
use crate::{VmFault, VmResult, MEM_SIZE, NUM_REGS};

/// Construction-time settings for a `Machine`.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Where the memory image is mirrored.
    pub backing_path: PathBuf,
    /// Maximum number of instructions a single `run` may execute.
    /// `None` runs until the program stops on its own.
    pub step_limit: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            backing_path: PathBuf::from(DEFAULT_BACKING_PATH),
            step_limit: None,
        }
    }
}

/// Why the most recent run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// A HALT instruction executed.
    Halted,
    /// An unrecognised opcode byte was fetched at `at`.
    UnknownOpcode { opcode: u8, at: u32 },
    /// The program counter reached the end of memory.
    EndOfMemory,
    /// The configured instruction ceiling was hit.
    StepLimit,
}

/// Point-in-time copy of the externally visible machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub pc: u32,
    pub registers: [u32; NUM_REGS],
    pub running: bool,
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "VM State:")?;
        writeln!(f, "PC: 0x{:04X}", self.pc)?;
        for (i, value) in self.registers.iter().enumerate() {
            writeln!(f, "R{i}: 0x{value:08X}")?;
        }
        writeln!(f, "------------------")
    }
}

/// The virtual machine.
///
/// `C` receives PRINT_STRING output and state dumps.
pub struct Machine<C: Console = StdoutConsole> {
    memory: Memory,
    registers: Registers,
    stack: OperandStack,
    pc: u32,
    running: bool,
    halt_reason: Option<HaltReason>,
    last_fault: Option<VmFault>,
    steps: u64,
    step_limit: Option<u64>,
    console: C,
}

impl Machine<StdoutConsole> {
    /// Create a machine printing to stdout. See `with_console`.
    pub fn new(config: MachineConfig) -> Self {
        Self::with_console(config, StdoutConsole)
    }
}

impl<C: Console> Machine<C> {
    /// Create a machine and `reset` it, restoring memory from the backing
    /// file. A missing or short file is not an error.
    pub fn with_console(config: MachineConfig, console: C) -> Self {
        let mut machine = Self {
            memory: Memory::new(BackingFile::new(config.backing_path)),
            registers: Registers::new(),
            stack: OperandStack::new(),
            pc: 0,
            running: false,
            halt_reason: None,
            last_fault: None,
            steps: 0,
            step_limit: config.step_limit,
            console,
        };
        machine.reset();
        machine
    }

    /// Return to the power-on state: counter, registers and stack zeroed,
    /// machine stopped, memory zeroed and then restored from the backing
    /// file (which is created empty if it does not exist yet).
    pub fn reset(&mut self) -> RestoreOutcome {
        self.pc = 0;
        self.running = false;
        self.halt_reason = None;
        self.last_fault = None;
        self.steps = 0;
        self.registers.clear();
        self.stack.clear();
        self.memory.clear();

        let path = self.memory.backing().path().display().to_string();
        match self.memory.backing().ensure_exists() {
            Ok(true) => log::info!("created backing file {path}"),
            Ok(false) => {}
            Err(err) => log::error!("{err}"),
        }
        let outcome = self.memory.restore();
        log::debug!("reset: restored image from {path} ({outcome:?})");
        outcome
    }

    /// Copy `program` into memory at offset 0, clipped to `MEM_SIZE`.
    ///
    /// Registers, stack and counter are untouched, and memory past the
    /// program keeps whatever it held. Returns the number of bytes loaded.
    pub fn load_program(&mut self, program: &[u8]) -> usize {
        let loaded = self.memory.load_image(program);
        if loaded < program.len() {
            log::warn!(
                "load_program: program of {} bytes clipped to {loaded}",
                program.len()
            );
        }
        log::debug!("load_program: {loaded} bytes at 0x0000");
        loaded
    }

    /// Execute from the current counter until the machine stops.
    pub fn run(&mut self) {
        self.running = true;
        self.halt_reason = None;
        let mut executed: u64 = 0;
        while self.running {
            if let Some(limit) = self.step_limit {
                if executed >= limit {
                    log::warn!("run: step limit of {limit} instructions reached");
                    self.stop(HaltReason::StepLimit);
                    break;
                }
            }
            self.step();
            executed += 1;
        }
        log::debug!(
            "run: stopped at 0x{:04X} after {executed} instructions ({:?})",
            self.pc,
            self.halt_reason
        );
    }

    /// Execute exactly one instruction. Returns whether the machine is
    /// still running afterwards.
    pub fn step(&mut self) -> bool {
        if self.pc as usize >= MEM_SIZE {
            self.stop_at_end_of_memory();
            return false;
        }
        self.running = true;

        let at = self.pc;
        let instr = Instruction::decode(&self.memory, &mut self.pc);
        log::trace!("0x{at:04X}: {instr}");
        self.steps += 1;

        if let Err(fault) = self.execute(instr, at) {
            self.report(&instr, fault);
        }
        if self.running && self.pc as usize >= MEM_SIZE {
            self.stop_at_end_of_memory();
        }
        self.running
    }

    fn execute(&mut self, instr: Instruction, at: u32) -> VmResult<()> {
        match instr {
            Instruction::Halt => {
                self.stop(HaltReason::Halted);
                Ok(())
            }
            Instruction::Load { reg, imm } => self.registers.set(reg, imm),
            Instruction::Store { reg, addr } => {
                let value = self.registers.get(reg)?;
                self.memory.store_u32(addr, value)
            }
            Instruction::Add { dst, src1, src2 } => {
                self.arith(dst, src1, src2, |a, b| Ok(a.wrapping_add(b)))
            }
            Instruction::Sub { dst, src1, src2 } => {
                self.arith(dst, src1, src2, |a, b| Ok(a.wrapping_sub(b)))
            }
            Instruction::Mul { dst, src1, src2 } => {
                self.arith(dst, src1, src2, |a, b| Ok(a.wrapping_mul(b)))
            }
            Instruction::Div { dst, src1, src2 } => self.arith(dst, src1, src2, |a, b| {
                a.checked_div(b).ok_or(VmFault::DivisionByZero)
            }),
            Instruction::Push { reg } => {
                let value = self.registers.get(reg)?;
                self.stack.push(value)
            }
            Instruction::Pop { reg } => {
                // The value leaves the stack even if `reg` is invalid.
                let value = self.stack.pop()?;
                self.registers.set(reg, value)
            }
            Instruction::Syscall { code } => {
                Syscall::dispatch(code, &mut self.memory, &self.registers, &mut self.console)
            }
            Instruction::Unknown(opcode) => {
                self.stop(HaltReason::UnknownOpcode { opcode, at });
                Err(VmFault::UnknownOpcode { opcode, at })
            }
        }
    }

    /// Three-register arithmetic. All indices are validated before anything
    /// is written; a failing `op` zeroes `dst`.
    fn arith(
        &mut self,
        dst: u8,
        src1: u8,
        src2: u8,
        op: impl FnOnce(u32, u32) -> VmResult<u32>,
    ) -> VmResult<()> {
        self.registers.check(dst)?;
        let a = self.registers.get(src1)?;
        let b = self.registers.get(src2)?;
        match op(a, b) {
            Ok(value) => self.registers.set(dst, value),
            Err(fault) => {
                self.registers.set(dst, 0)?;
                Err(fault)
            }
        }
    }

    fn report(&mut self, instr: &Instruction, fault: VmFault) {
        self.last_fault = Some(fault);
        match instr.opcode() {
            Some(op) if !fault.is_fatal() => log::warn!("{}: {fault}", op.mnemonic()),
            Some(op) => log::error!("{}: {fault}", op.mnemonic()),
            None => log::error!("{fault}"),
        }
    }

    fn stop(&mut self, reason: HaltReason) {
        self.running = false;
        self.halt_reason = Some(reason);
    }

    fn stop_at_end_of_memory(&mut self) {
        log::warn!("PC reached end of memory. Halting.");
        self.last_fault = Some(VmFault::EndOfMemory);
        self.stop(HaltReason::EndOfMemory);
    }

    /// Mirror the whole memory image to the backing file.
    pub fn persist_state(&self) -> Result<(), PersistError> {
        match self.memory.persist() {
            Ok(()) => {
                log::info!(
                    "persisted {MEM_SIZE} bytes to {}",
                    self.memory.backing().path().display()
                );
                Ok(())
            }
            Err(err) => {
                log::error!("persist: {err}");
                Err(err)
            }
        }
    }

    /// Write the counter and registers to the console. No state changes.
    pub fn print_state(&mut self) {
        let dump = format!("\n{}", self.state());
        self.console.write_str(&dump);
    }

    pub fn state(&self) -> StateSnapshot {
        StateSnapshot {
            pc: self.pc,
            registers: *self.registers.as_array(),
            running: self.running,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Why the last run stopped; `None` before the first run after a reset.
    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt_reason
    }

    /// Most recent fault reported since reset, recoverable or not.
    pub fn last_fault(&self) -> Option<VmFault> {
        self.last_fault
    }

    /// Instructions executed since reset.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn stack(&self) -> &OperandStack {
        &self.stack
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }
}
