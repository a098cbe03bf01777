//! Memory store.
//!
//! A fixed `MEM_SIZE`-byte array plus the backing file that mirrors it.
//! Every access is bounds-checked before touching the array: out-of-range
//! reads yield 0, out-of-range writes are dropped, and both emit a
//! diagnostic. Nothing here panics.
//!
//! The checked accessors follow the outline pattern: small public wrappers
//! delegate to non-generic inner functions returning `VmResult`, and the
//! lenient `read`/`write`/`read32`/`write32` used by the engine sit on top.

use crate::backing::{BackingFile, PersistError, RestoreOutcome};
use crate::{VmFault, VmResult, MEM_SIZE};

/// The machine's memory image and its durable mirror.
pub struct Memory {
    bytes: [u8; MEM_SIZE],
    backing: BackingFile,
}

impl Memory {
    /// Create a zeroed memory store mirrored to `backing`.
    ///
    /// No file I/O happens here; call `restore` to load the image.
    pub fn new(backing: BackingFile) -> Self {
        Self {
            bytes: [0u8; MEM_SIZE],
            backing,
        }
    }

    /// Size of the store in bytes.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        MEM_SIZE
    }

    pub fn backing(&self) -> &BackingFile {
        &self.backing
    }

    // ── Checked access ────────────────────────────────────────────────

    /// Load one byte, or `OutOfBounds` past the end of memory.
    #[inline(always)]
    pub fn load_u8(&self, addr: u32) -> VmResult<u8> {
        load_u8_inner(&self.bytes, addr)
    }

    /// Load a big-endian u32; valid iff `addr + 3 < capacity`.
    #[inline(always)]
    pub fn load_u32(&self, addr: u32) -> VmResult<u32> {
        load_u32_inner(&self.bytes, addr)
    }

    /// Store one byte, or `OutOfBounds` past the end of memory.
    #[inline(always)]
    pub fn store_u8(&mut self, addr: u32, value: u8) -> VmResult<()> {
        store_u8_inner(&mut self.bytes, addr, value)
    }

    /// Store a big-endian u32; valid iff `addr + 3 < capacity`.
    #[inline(always)]
    pub fn store_u32(&mut self, addr: u32, value: u32) -> VmResult<()> {
        store_u32_inner(&mut self.bytes, addr, value)
    }

    // ── Lenient access (what the engine uses) ─────────────────────────

    /// Byte at `addr`, or 0 (with a diagnostic) if out of range.
    pub fn read(&self, addr: u32) -> u8 {
        self.load_u8(addr).unwrap_or_else(|fault| {
            log::warn!("read: {fault}");
            0
        })
    }

    /// Write a byte; dropped (with a diagnostic) if out of range.
    pub fn write(&mut self, addr: u32, value: u8) {
        if let Err(fault) = self.store_u8(addr, value) {
            log::warn!("write: {fault}");
        }
    }

    /// Big-endian word at `addr`, or 0 (with a diagnostic) if out of range.
    pub fn read32(&self, addr: u32) -> u32 {
        self.load_u32(addr).unwrap_or_else(|fault| {
            log::warn!("read32: {fault}");
            0
        })
    }

    /// Write a big-endian word; dropped (with a diagnostic) if out of range.
    pub fn write32(&mut self, addr: u32, value: u32) {
        if let Err(fault) = self.store_u32(addr, value) {
            log::warn!("write32: {fault}");
        }
    }

    // ── Whole-image operations ────────────────────────────────────────

    /// Copy `data` to offset 0, clipped to capacity. Returns the number of
    /// bytes copied. Memory past that point is left as it was.
    pub fn load_image(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(MEM_SIZE);
        self.bytes[..len].copy_from_slice(&data[..len]);
        len
    }

    /// Zero the whole image.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Overlay the image with the backing file contents.
    ///
    /// A short file fills only its prefix; a missing or unreadable file
    /// leaves the image untouched. Both cases are logged, never fatal.
    pub fn restore(&mut self) -> RestoreOutcome {
        match self.backing.read_into(&mut self.bytes) {
            Ok(n) if n == MEM_SIZE => RestoreOutcome::Complete,
            Ok(n) => {
                log::warn!("restore: expected {MEM_SIZE} bytes, but read {n} bytes");
                RestoreOutcome::Partial { read: n }
            }
            Err(err) => {
                log::error!("restore: {err}");
                RestoreOutcome::Unavailable
            }
        }
    }

    /// Write all `capacity` bytes to the backing file, replacing its contents.
    pub fn persist(&self) -> Result<(), PersistError> {
        self.backing.write_image(&self.bytes)
    }

    /// Read-only view of the whole image.
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

// ── Helpers ───────────────────────────────────────────────────────────

/// Bounds-check and return `memory[addr..addr+len]`.
/// Returns `Err(OutOfBounds)` on overflow or out-of-range; never panics.
#[inline(always)]
fn checked_slice(memory: &[u8], addr: u32, len: usize) -> VmResult<&[u8]> {
    let start = addr as usize;
    let end = start
        .checked_add(len)
        .ok_or(VmFault::OutOfBounds { addr })?;
    memory.get(start..end).ok_or(VmFault::OutOfBounds { addr })
}

/// Mutable variant of `checked_slice`.
#[inline(always)]
fn checked_slice_mut(memory: &mut [u8], addr: u32, len: usize) -> VmResult<&mut [u8]> {
    let start = addr as usize;
    let end = start
        .checked_add(len)
        .ok_or(VmFault::OutOfBounds { addr })?;
    memory.get_mut(start..end).ok_or(VmFault::OutOfBounds { addr })
}

// ── Inner functions (outline pattern) ────────────────────────────────
//
// No unwrap(), no indexing, no panic paths.

#[inline(never)]
fn load_u8_inner(memory: &[u8], addr: u32) -> VmResult<u8> {
    memory
        .get(addr as usize)
        .copied()
        .ok_or(VmFault::OutOfBounds { addr })
}

#[inline(never)]
fn load_u32_inner(memory: &[u8], addr: u32) -> VmResult<u32> {
    let s = checked_slice(memory, addr, 4)?;
    let word: [u8; 4] = s.try_into().map_err(|_| VmFault::OutOfBounds { addr })?;
    Ok(u32::from_be_bytes(word))
}

#[inline(never)]
fn store_u8_inner(memory: &mut [u8], addr: u32, value: u8) -> VmResult<()> {
    let slot = memory
        .get_mut(addr as usize)
        .ok_or(VmFault::OutOfBounds { addr })?;
    *slot = value;
    Ok(())
}

#[inline(never)]
fn store_u32_inner(memory: &mut [u8], addr: u32, value: u32) -> VmResult<()> {
    let s = checked_slice_mut(memory, addr, 4)?;
    s.copy_from_slice(&value.to_be_bytes());
    Ok(())
}


// ── Kani Formal Verification Proofs ──────────────────────────────────────
//
// Run with: cargo kani -p ferrovm-runtime
//
// The proofs establish that every accessor either succeeds or reports
// OutOfBounds for any address, and that successful accesses stay in range.

#[cfg(kani)]
mod proofs {
    use super::*;

    fn mem() -> Memory {
        Memory::new(BackingFile::new("kani.dat"))
    }

    /// Proof: load_u32 never panics and only succeeds within capacity.
    #[kani::proof]
    #[kani::unwind(1)]
    fn load_u32_never_panics() {
        let mem = mem();
        let addr: u32 = kani::any();
        if mem.load_u32(addr).is_ok() {
            kani::assert(
                (addr as usize) + 3 < MEM_SIZE,
                "successful word load must be within memory",
            );
        }
    }

    /// Proof: store_u32 never panics for any address and value.
    #[kani::proof]
    #[kani::unwind(1)]
    fn store_u32_never_panics() {
        let mut mem = mem();
        let addr: u32 = kani::any();
        let value: u32 = kani::any();
        let _ = mem.store_u32(addr, value);
    }

    /// Proof: a successful word store reads back unchanged.
    #[kani::proof]
    #[kani::unwind(1)]
    fn store_load_roundtrip_u32() {
        let mut mem = mem();
        let addr: u32 = kani::any();
        let value: u32 = kani::any();
        if mem.store_u32(addr, value).is_ok() {
            kani::assert(mem.load_u32(addr) == Ok(value), "u32 roundtrip preserves value");
        }
    }

    /// Proof: lenient byte reads past the end yield zero.
    #[kani::proof]
    #[kani::unwind(1)]
    fn read_out_of_range_is_zero() {
        let mem = mem();
        let addr: u32 = kani::any();
        kani::assume(addr as usize >= MEM_SIZE);
        kani::assert(mem.read(addr) == 0, "out-of-range read yields zero");
    }
}
