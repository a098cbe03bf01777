//! Instruction set: opcode bytes and the decoded `Instruction` enum.
//!
//! Encoding: one opcode byte, operands immediately after, no padding.
//! Register operands are one byte; immediates and addresses are four
//! bytes big-endian.
//!
//! | Opcode | Mnemonic | Operands        |
//! |--------|----------|-----------------|
//! | 0x01   | HALT     |                 |
//! | 0x10   | LOAD     | reg, imm32      |
//! | 0x11   | STORE    | reg, addr32     |
//! | 0x20   | ADD      | dst, src1, src2 |
//! | 0x21   | SUB      | dst, src1, src2 |
//! | 0x22   | MUL      | dst, src1, src2 |
//! | 0x23   | DIV      | dst, src1, src2 |
//! | 0x30   | PUSH     | reg             |
//! | 0x31   | POP      | reg             |
//! | 0xFF   | SYSCALL  | code            |

use core::fmt;

use crate::memory::Memory;

/// Raw opcode bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Halt = 0x01,
    Load = 0x10,
    Store = 0x11,
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    Div = 0x23,
    Push = 0x30,
    Pop = 0x31,
    Syscall = 0xFF,
}

impl Opcode {
    /// Map a byte to its opcode, if it is one.
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Opcode::Halt,
            0x10 => Opcode::Load,
            0x11 => Opcode::Store,
            0x20 => Opcode::Add,
            0x21 => Opcode::Sub,
            0x22 => Opcode::Mul,
            0x23 => Opcode::Div,
            0x30 => Opcode::Push,
            0x31 => Opcode::Pop,
            0xFF => Opcode::Syscall,
            _ => return None,
        })
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Halt => "HALT",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Syscall => "SYSCALL",
        }
    }
}

/// One decoded instruction.
///
/// `Unknown` carries the unrecognised opcode byte; no operands are consumed
/// for it since their length cannot be known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Halt,
    Load { reg: u8, imm: u32 },
    Store { reg: u8, addr: u32 },
    Add { dst: u8, src1: u8, src2: u8 },
    Sub { dst: u8, src1: u8, src2: u8 },
    Mul { dst: u8, src1: u8, src2: u8 },
    Div { dst: u8, src1: u8, src2: u8 },
    Push { reg: u8 },
    Pop { reg: u8 },
    Syscall { code: u8 },
    Unknown(u8),
}

impl Instruction {
    /// Decode the instruction at `*pc`, advancing `*pc` past the opcode and
    /// every operand byte consumed.
    ///
    /// Operands running past the end of memory read as zero (with a
    /// diagnostic from `Memory`); `*pc` still advances by the full operand
    /// length so the caller sees it leave memory.
    pub fn decode(memory: &Memory, pc: &mut u32) -> Self {
        let opcode = fetch_u8(memory, pc);
        let Some(op) = Opcode::from_byte(opcode) else {
            return Instruction::Unknown(opcode);
        };
        match op {
            Opcode::Halt => Instruction::Halt,
            Opcode::Load => {
                let reg = fetch_u8(memory, pc);
                let imm = fetch_u32(memory, pc);
                Instruction::Load { reg, imm }
            }
            Opcode::Store => {
                let reg = fetch_u8(memory, pc);
                let addr = fetch_u32(memory, pc);
                Instruction::Store { reg, addr }
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                let dst = fetch_u8(memory, pc);
                let src1 = fetch_u8(memory, pc);
                let src2 = fetch_u8(memory, pc);
                match op {
                    Opcode::Add => Instruction::Add { dst, src1, src2 },
                    Opcode::Sub => Instruction::Sub { dst, src1, src2 },
                    Opcode::Mul => Instruction::Mul { dst, src1, src2 },
                    _ => Instruction::Div { dst, src1, src2 },
                }
            }
            Opcode::Push => Instruction::Push {
                reg: fetch_u8(memory, pc),
            },
            Opcode::Pop => Instruction::Pop {
                reg: fetch_u8(memory, pc),
            },
            Opcode::Syscall => Instruction::Syscall {
                code: fetch_u8(memory, pc),
            },
        }
    }

    /// The opcode, or `None` for `Unknown`.
    pub fn opcode(&self) -> Option<Opcode> {
        Some(match self {
            Instruction::Halt => Opcode::Halt,
            Instruction::Load { .. } => Opcode::Load,
            Instruction::Store { .. } => Opcode::Store,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Sub { .. } => Opcode::Sub,
            Instruction::Mul { .. } => Opcode::Mul,
            Instruction::Div { .. } => Opcode::Div,
            Instruction::Push { .. } => Opcode::Push,
            Instruction::Pop { .. } => Opcode::Pop,
            Instruction::Syscall { .. } => Opcode::Syscall,
            Instruction::Unknown(_) => return None,
        })
    }

    /// Encoded size in bytes, opcode included.
    pub fn encoded_len(&self) -> usize {
        match self {
            Instruction::Halt | Instruction::Unknown(_) => 1,
            Instruction::Push { .. } | Instruction::Pop { .. } | Instruction::Syscall { .. } => 2,
            Instruction::Add { .. }
            | Instruction::Sub { .. }
            | Instruction::Mul { .. }
            | Instruction::Div { .. } => 4,
            Instruction::Load { .. } | Instruction::Store { .. } => 6,
        }
    }

    /// Append the binary encoding of this instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Instruction::Halt => out.push(Opcode::Halt as u8),
            Instruction::Load { reg, imm } => {
                out.extend_from_slice(&[Opcode::Load as u8, reg]);
                out.extend_from_slice(&imm.to_be_bytes());
            }
            Instruction::Store { reg, addr } => {
                out.extend_from_slice(&[Opcode::Store as u8, reg]);
                out.extend_from_slice(&addr.to_be_bytes());
            }
            Instruction::Add { dst, src1, src2 } => {
                out.extend_from_slice(&[Opcode::Add as u8, dst, src1, src2])
            }
            Instruction::Sub { dst, src1, src2 } => {
                out.extend_from_slice(&[Opcode::Sub as u8, dst, src1, src2])
            }
            Instruction::Mul { dst, src1, src2 } => {
                out.extend_from_slice(&[Opcode::Mul as u8, dst, src1, src2])
            }
            Instruction::Div { dst, src1, src2 } => {
                out.extend_from_slice(&[Opcode::Div as u8, dst, src1, src2])
            }
            Instruction::Push { reg } => out.extend_from_slice(&[Opcode::Push as u8, reg]),
            Instruction::Pop { reg } => out.extend_from_slice(&[Opcode::Pop as u8, reg]),
            Instruction::Syscall { code } => {
                out.extend_from_slice(&[Opcode::Syscall as u8, code])
            }
            Instruction::Unknown(byte) => out.push(byte),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().map_or("", Opcode::mnemonic);
        match *self {
            Instruction::Halt => f.write_str(name),
            Instruction::Load { reg, imm } => write!(f, "{name} R{reg}, 0x{imm:08X}"),
            Instruction::Store { reg, addr } => write!(f, "{name} R{reg}, [0x{addr:04X}]"),
            Instruction::Add { dst, src1, src2 }
            | Instruction::Sub { dst, src1, src2 }
            | Instruction::Mul { dst, src1, src2 }
            | Instruction::Div { dst, src1, src2 } => {
                write!(f, "{name} R{dst}, R{src1}, R{src2}")
            }
            Instruction::Push { reg } | Instruction::Pop { reg } => write!(f, "{name} R{reg}"),
            Instruction::Syscall { code } => write!(f, "{name} 0x{code:02X}"),
            Instruction::Unknown(byte) => write!(f, "<unknown 0x{byte:02X}>"),
        }
    }
}

/// Read the byte at `*pc` and advance.
#[inline(always)]
fn fetch_u8(memory: &Memory, pc: &mut u32) -> u8 {
    let byte = memory.read(*pc);
    *pc = pc.saturating_add(1);
    byte
}

/// Read the big-endian word at `*pc` and advance by four.
#[inline(always)]
fn fetch_u32(memory: &Memory, pc: &mut u32) -> u32 {
    let word = memory.read32(*pc);
    *pc = pc.saturating_add(4);
    word
}
