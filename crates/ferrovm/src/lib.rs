//! Host-side driver for the bytecode interpreter.
//!
//! Loads a program image into a fresh `Machine`, runs it to completion,
//! dumps the final state and optionally mirrors memory back to the backing
//! file. This is what a device shell's `run` command does.

pub mod logger;

pub use anyhow::{Context, Result};
use ferrovm_runtime::{
    Console, HaltReason, Machine, MachineConfig, StateSnapshot, DEFAULT_BACKING_PATH, MEM_SIZE,
};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Configuration for a single program run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Backing file mirroring the memory image.
    pub image: PathBuf,
    /// Write the memory image back to `image` after the run.
    pub persist: bool,
    /// Instruction ceiling for the run.
    pub max_steps: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            image: PathBuf::from(DEFAULT_BACKING_PATH),
            persist: false,
            max_steps: None,
        }
    }
}

/// What a run left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Program bytes actually placed in memory.
    pub loaded: usize,
    /// Final counter and registers.
    pub state: StateSnapshot,
    /// Why the run stopped.
    pub halt_reason: Option<HaltReason>,
    /// Instructions executed.
    pub steps: u64,
}

/// Run `program` on a freshly reset machine.
///
/// Program output and the final state dump go to `console`. Machine faults
/// are diagnostics only; the sole error here is a failed persist.
pub fn run_program<C: Console>(
    program: &[u8],
    options: &RunOptions,
    console: C,
) -> Result<RunReport> {
    if program.len() > MEM_SIZE {
        log::warn!(
            "program is {} bytes; only the first {MEM_SIZE} will be loaded",
            program.len()
        );
    }

    let config = MachineConfig {
        backing_path: options.image.clone(),
        step_limit: options.max_steps,
    };
    let mut machine = Machine::with_console(config, console);

    let loaded = machine.load_program(program);
    machine.run();
    machine.print_state();

    if options.persist {
        machine.persist_state().with_context(|| {
            format!("failed to persist memory image to {}", options.image.display())
        })?;
    }

    Ok(RunReport {
        loaded,
        state: machine.state(),
        halt_reason: machine.halt_reason(),
        steps: machine.steps(),
    })
}

/// Hex listing of `bytes`, sixteen per line.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + bytes.len() / 16 + 1);
    for line in bytes.chunks(16) {
        for (i, byte) in line.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{byte:02X}");
        }
        out.push('\n');
    }
    out
}

/// One-line description of a halt reason for status output.
pub fn describe_halt(reason: Option<HaltReason>) -> String {
    match reason {
        Some(HaltReason::Halted) => "halted".to_string(),
        Some(HaltReason::UnknownOpcode { opcode, at }) => {
            format!("stopped on unknown opcode 0x{opcode:02X} at 0x{at:04X}")
        }
        Some(HaltReason::EndOfMemory) => "ran off the end of memory".to_string(),
        Some(HaltReason::StepLimit) => "stopped at the step limit".to_string(),
        None => "did not run".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_wraps_at_sixteen() {
        let bytes: Vec<u8> = (0..18).collect();
        let dump = hex_dump(&bytes);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F");
        assert_eq!(lines[1], "10 11");
    }

    #[test]
    fn hex_dump_empty() {
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn default_options_use_system_image() {
        let options = RunOptions::default();
        assert_eq!(options.image, PathBuf::from(DEFAULT_BACKING_PATH));
        assert!(!options.persist);
        assert!(options.max_steps.is_none());
    }

    #[test]
    fn describe_unknown_opcode() {
        let text = describe_halt(Some(HaltReason::UnknownOpcode { opcode: 0xAB, at: 3 }));
        assert_eq!(text, "stopped on unknown opcode 0xAB at 0x0003");
    }
}
