//! Syscall dispatcher and the host console seam.
//!
//! `SYSCALL code` hands control to a small fixed table of host services.
//! Arguments travel in registers by convention: R0, R1, R2.
//!
//! - `0x01` PRINT_STRING: write the zero-terminated string at address R0.
//! - `0x02` LOAD_DATA: copy R2 bytes from address R1 to address R0.

use std::io::{self, Write};

use crate::memory::Memory;
use crate::registers::Registers;
use crate::{VmFault, VmResult};

/// Output sink for program-visible text (PRINT_STRING, state dumps).
///
/// The host supplies the implementation; the machine never writes to a
/// terminal directly.
pub trait Console {
    fn write_bytes(&mut self, bytes: &[u8]);

    fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }
}

impl<C: Console + ?Sized> Console for &mut C {
    fn write_bytes(&mut self, bytes: &[u8]) {
        (**self).write_bytes(bytes);
    }
}

/// Console writing to the process's standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut out = io::stdout().lock();
        if let Err(err) = out.write_all(bytes).and_then(|()| out.flush()) {
            log::warn!("console: {err}");
        }
    }
}

/// Console capturing everything into memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferConsole {
    buf: Vec<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Captured output, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }
}

impl Console for BufferConsole {
    fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// Known syscall codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Syscall {
    PrintString = 0x01,
    LoadData = 0x02,
}

impl Syscall {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Syscall::PrintString),
            0x02 => Some(Syscall::LoadData),
            _ => None,
        }
    }

    /// Run syscall `code` against `memory` with arguments from `regs`.
    ///
    /// Faults are recoverable: an unknown code changes nothing, and a block
    /// copy that leaves memory stops at the first bad offset with the bytes
    /// before it already copied.
    pub fn dispatch(
        code: u8,
        memory: &mut Memory,
        regs: &Registers,
        console: &mut dyn Console,
    ) -> VmResult<()> {
        match Syscall::from_code(code) {
            Some(Syscall::PrintString) => {
                print_string(memory, regs.get(0)?, console);
                Ok(())
            }
            Some(Syscall::LoadData) => load_data(memory, regs.get(0)?, regs.get(1)?, regs.get(2)?),
            None => Err(VmFault::UnknownSyscall { code }),
        }
    }
}

fn print_string(memory: &Memory, start: u32, console: &mut dyn Console) {
    let mut text = Vec::new();
    let mut addr = start;
    while let Ok(byte) = memory.load_u8(addr) {
        if byte == 0 {
            break;
        }
        text.push(byte);
        addr += 1;
    }
    console.write_bytes(&text);
}

/// Forward byte-by-byte copy; overlapping ranges see already-copied bytes.
fn load_data(memory: &mut Memory, dest: u32, src: u32, len: u32) -> VmResult<()> {
    for offset in 0..len {
        let out_of_bounds = VmFault::CopyOutOfBounds { offset };
        let (Some(from), Some(to)) = (src.checked_add(offset), dest.checked_add(offset)) else {
            return Err(out_of_bounds);
        };
        let byte = memory.load_u8(from).map_err(|_| out_of_bounds)?;
        memory.store_u8(to, byte).map_err(|_| out_of_bounds)?;
    }
    Ok(())
}
