//! Runtime tests for the SYSCALL instruction.
//!
//! PRINT_STRING reads a NUL-terminated string starting at R0. LOAD_DATA
//! copies R2 bytes from R1 to R0, one byte at a time, front to back.

use ferrovm_runtime::{HaltReason, VmFault, MEM_SIZE};
use ferrovm_tests::{reg, run, Program, LOAD_DATA, PRINT_STRING};

#[test]
fn test_print_string() {
    let program = Program::new()
        .load(0, 0x100)
        .syscall(PRINT_STRING)
        .halt()
        .pad_to(0x100)
        .raw(b"Hello, VM!\0");
    let m = run("print", &program);
    assert_eq!(m.console().text(), "Hello, VM!");
    assert_eq!(m.last_fault(), None);
}

#[test]
fn test_print_empty_string() {
    // R0 = 0x100 points at a zero byte.
    let program = Program::new()
        .load(0, 0x100)
        .syscall(PRINT_STRING)
        .halt();
    let m = run("print-empty", &program);
    assert!(m.console().bytes().is_empty());
}

#[test]
fn test_print_string_stops_at_end_of_memory() {
    let start = MEM_SIZE - 3;
    let program = Program::new()
        .load(0, start as u32)
        .syscall(PRINT_STRING)
        .halt()
        .pad_to(start)
        .raw(b"end");
    assert_eq!(program.len(), MEM_SIZE);
    let m = run("print-eom", &program);
    assert_eq!(m.console().text(), "end");
}

#[test]
fn test_print_string_out_of_range_prints_nothing() {
    let program = Program::new()
        .load(0, MEM_SIZE as u32)
        .syscall(PRINT_STRING)
        .halt();
    let m = run("print-oob", &program);
    assert!(m.console().bytes().is_empty());
    assert_eq!(m.halt_reason(), Some(HaltReason::Halted));
}

#[test]
fn test_load_data_copies_bytes() {
    let program = Program::new()
        .load(0, 0x200)
        .load(1, 0x100)
        .load(2, 4)
        .syscall(LOAD_DATA)
        .halt()
        .pad_to(0x100)
        .raw(b"DATA");
    let m = run("copy", &program);
    assert_eq!(&m.memory().as_slice()[0x200..0x204], b"DATA");
    assert_eq!(m.last_fault(), None);
    // Registers are inputs only.
    assert_eq!((reg(&m, 0), reg(&m, 1), reg(&m, 2)), (0x200, 0x100, 4));
}

#[test]
fn test_load_data_zero_length_is_a_no_op() {
    let program = Program::new()
        .load(0, 0x200)
        .load(1, 0x100)
        .syscall(LOAD_DATA)
        .halt()
        .pad_to(0x100)
        .raw(b"DATA");
    let m = run("copy-empty", &program);
    assert!(m.memory().as_slice()[0x200..0x204].iter().all(|&b| b == 0));
    assert_eq!(m.last_fault(), None);
}

#[test]
fn test_load_data_overlap_copies_forward() {
    // dest = src + 1: each copied byte is read again by the next step.
    let program = Program::new()
        .load(0, 0x101)
        .load(1, 0x100)
        .load(2, 3)
        .syscall(LOAD_DATA)
        .halt()
        .pad_to(0x100)
        .raw(b"AB");
    let m = run("copy-overlap", &program);
    assert_eq!(&m.memory().as_slice()[0x100..0x104], b"AAAA");
}

#[test]
fn test_load_data_stops_at_first_bad_offset() {
    let dest = (MEM_SIZE - 2) as u32;
    let program = Program::new()
        .load(0, dest)
        .load(1, 0x100)
        .load(2, 4)
        .syscall(LOAD_DATA)
        .halt()
        .pad_to(0x100)
        .raw(b"WXYZ");
    let m = run("copy-partial", &program);

    let image = m.memory().as_slice();
    assert_eq!(&image[MEM_SIZE - 2..], b"WX");
    assert_eq!(m.last_fault(), Some(VmFault::CopyOutOfBounds { offset: 2 }));
    assert_eq!(m.halt_reason(), Some(HaltReason::Halted));
}

#[test]
fn test_load_data_source_out_of_range() {
    let program = Program::new()
        .load(0, 0x200)
        .load(1, (MEM_SIZE - 1) as u32)
        .load(2, 8)
        .syscall(LOAD_DATA)
        .halt();
    let m = run("copy-src", &program);
    assert_eq!(m.memory().read(0x200), 0);
    assert_eq!(m.last_fault(), Some(VmFault::CopyOutOfBounds { offset: 1 }));
}

#[test]
fn test_unknown_syscall_continues() {
    let program = Program::new().syscall(0x07).load(3, 99).halt();
    let m = run("badsys", &program);
    assert_eq!(m.last_fault(), Some(VmFault::UnknownSyscall { code: 0x07 }));
    assert_eq!(reg(&m, 3), 99);
    assert_eq!(m.halt_reason(), Some(HaltReason::Halted));
    assert!(m.console().bytes().is_empty());
}
