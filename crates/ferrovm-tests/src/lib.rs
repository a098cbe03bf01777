//! Shared helpers for the end-to-end tests and benches.
//!
//! `Program` emits instruction bytes through `Instruction::encode` so test
//! programs read as mnemonics rather than hex, and `ScratchImage` gives
//! each test its own backing file in a temporary directory that is
//! removed when the test ends.

use ferrovm_runtime::{BufferConsole, Instruction, Machine, MachineConfig};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Syscall codes.
pub const PRINT_STRING: u8 = 0x01;
pub const LOAD_DATA: u8 = 0x02;

/// Byte-level program builder.
#[derive(Debug, Default, Clone)]
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_instr(mut self, instr: Instruction) -> Self {
        instr.encode(&mut self.bytes);
        self
    }

    pub fn halt(self) -> Self {
        self.push_instr(Instruction::Halt)
    }

    pub fn load(self, reg: u8, imm: u32) -> Self {
        self.push_instr(Instruction::Load { reg, imm })
    }

    pub fn store(self, reg: u8, addr: u32) -> Self {
        self.push_instr(Instruction::Store { reg, addr })
    }

    pub fn add(self, dst: u8, src1: u8, src2: u8) -> Self {
        self.push_instr(Instruction::Add { dst, src1, src2 })
    }

    pub fn sub(self, dst: u8, src1: u8, src2: u8) -> Self {
        self.push_instr(Instruction::Sub { dst, src1, src2 })
    }

    pub fn mul(self, dst: u8, src1: u8, src2: u8) -> Self {
        self.push_instr(Instruction::Mul { dst, src1, src2 })
    }

    pub fn div(self, dst: u8, src1: u8, src2: u8) -> Self {
        self.push_instr(Instruction::Div { dst, src1, src2 })
    }

    pub fn push(self, reg: u8) -> Self {
        self.push_instr(Instruction::Push { reg })
    }

    pub fn pop(self, reg: u8) -> Self {
        self.push_instr(Instruction::Pop { reg })
    }

    pub fn syscall(self, code: u8) -> Self {
        self.push_instr(Instruction::Syscall { code })
    }

    /// Raw bytes (data, or deliberately malformed code).
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Zero-pad up to `addr` so the next byte lands there.
    pub fn pad_to(mut self, addr: usize) -> Self {
        if self.bytes.len() < addr {
            self.bytes.resize(addr, 0);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Temporary directory holding one backing image. Removed on drop.
pub struct ScratchImage {
    _dir: TempDir,
    path: PathBuf,
}

impl ScratchImage {
    /// Panics if the temporary directory cannot be created (tests only).
    pub fn new(label: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("ferrovm-{label}-"))
            .tempdir()
            .unwrap_or_else(|err| panic!("scratch dir for {label}: {err}"));
        let path = dir.path().join("systemdata.dat");
        Self { _dir: dir, path }
    }

    /// The backing image. It does not exist until a machine is reset.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A machine together with the scratch directory its image lives in.
pub struct ScratchMachine {
    machine: Machine<BufferConsole>,
    image: ScratchImage,
}

impl ScratchMachine {
    pub fn new(label: &str) -> Self {
        let image = ScratchImage::new(label);
        let machine = machine_at(image.path());
        Self { machine, image }
    }

    pub fn image(&self) -> &ScratchImage {
        &self.image
    }
}

impl Deref for ScratchMachine {
    type Target = Machine<BufferConsole>;

    fn deref(&self) -> &Self::Target {
        &self.machine
    }
}

impl DerefMut for ScratchMachine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.machine
    }
}

/// Machine with its own backing file and a capturing console.
pub fn scratch_machine(label: &str) -> ScratchMachine {
    ScratchMachine::new(label)
}

/// Machine mirrored to `path`, with a capturing console.
pub fn machine_at(path: &Path) -> Machine<BufferConsole> {
    let config = MachineConfig {
        backing_path: path.to_path_buf(),
        ..MachineConfig::default()
    };
    Machine::with_console(config, BufferConsole::new())
}

/// Load `program` into a scratch machine and run it.
pub fn run(label: &str, program: &Program) -> ScratchMachine {
    let mut machine = scratch_machine(label);
    machine.load_program(program.bytes());
    machine.run();
    machine
}

/// Register value, panicking on a bad index (tests only).
pub fn reg(machine: &Machine<BufferConsole>, index: u8) -> u32 {
    machine
        .registers()
        .get(index)
        .unwrap_or_else(|fault| panic!("R{index}: {fault}"))
}
