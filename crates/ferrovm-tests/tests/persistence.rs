//! Runtime tests for the file-mirrored memory image.
//!
//! The image survives across machine instances only through an explicit
//! `persist_state`, and `load_program` never clears memory past the bytes
//! it loads.

use ferrovm_runtime::{RestoreOutcome, MEM_SIZE};
use ferrovm_tests::{machine_at, scratch_machine, Program, ScratchImage};
use std::fs;

#[test]
fn test_store_persist_restore_roundtrip() {
    let mut first = scratch_machine("roundtrip");
    let program = Program::new().load(0, 0x2A).store(0, 0x0010).halt();
    first.load_program(program.bytes());
    first.run();
    first.persist_state().unwrap();

    let mut second = machine_at(first.image().path());
    assert_eq!(second.reset(), RestoreOutcome::Complete);
    assert_eq!(second.memory().read32(0x0010), 0x2A);
}

#[test]
fn test_backing_file_is_exactly_capacity() {
    let machine = scratch_machine("size");
    machine.persist_state().unwrap();
    let len = fs::metadata(machine.image().path()).unwrap().len();
    assert_eq!(len, MEM_SIZE as u64);
}

#[test]
fn test_loader_keeps_residual_memory() {
    let image = ScratchImage::new("residual");

    // Persist an image with non-zero bytes at offset 8.
    let mut writer = machine_at(image.path());
    let program = Program::new().load(0, 0xA1B2_C3D4).store(0, 8).halt();
    writer.load_program(program.bytes());
    writer.run();
    writer.persist_state().unwrap();

    // A fresh machine restores it; a 4-byte program only covers 0..4.
    let mut reader = machine_at(image.path());
    reader.load_program(&[0x01, 0x01, 0x01, 0x01]);
    assert_eq!(reader.memory().read32(8), 0xA1B2_C3D4);
    assert_eq!(&reader.memory().as_slice()[..4], &[0x01; 4]);
}

#[test]
fn test_unpersisted_changes_are_lost_on_reset() {
    let mut machine = scratch_machine("volatile");
    let program = Program::new().load(0, 7).store(0, 0x200).halt();
    machine.load_program(program.bytes());
    machine.run();
    assert_eq!(machine.memory().read32(0x200), 7);

    machine.reset();
    assert_eq!(machine.memory().read32(0x200), 0);
    assert!(machine.memory().as_slice().iter().all(|&b| b == 0));
}

#[test]
fn test_short_backing_file_restores_prefix() {
    let image = ScratchImage::new("short");
    fs::write(image.path(), [0xEE; 10]).unwrap();

    let mut machine = machine_at(image.path());
    assert_eq!(machine.reset(), RestoreOutcome::Partial { read: 10 });
    let bytes = machine.memory().as_slice();
    assert!(bytes[..10].iter().all(|&b| b == 0xEE));
    assert!(bytes[10..].iter().all(|&b| b == 0));
}

#[test]
fn test_missing_backing_file_is_created_empty() {
    let image = ScratchImage::new("create");
    assert!(!image.path().exists());
    let machine = machine_at(image.path());
    assert!(image.path().exists());
    assert_eq!(fs::metadata(image.path()).unwrap().len(), 0);
    assert!(machine.memory().as_slice().iter().all(|&b| b == 0));
}

#[test]
fn test_scratch_image_is_removed_on_drop() {
    let path = {
        let machine = scratch_machine("cleanup");
        machine.persist_state().unwrap();
        machine.image().path().to_path_buf()
    };
    assert!(!path.exists());
    assert!(!path.parent().unwrap().exists());
}

#[test]
fn test_unusable_backing_path_degrades_to_zero_image() {
    // A directory in place of the file: restore fails, reset still succeeds.
    let image = ScratchImage::new("dir");
    fs::create_dir_all(image.path()).unwrap();

    let mut machine = machine_at(image.path());
    assert_eq!(machine.reset(), RestoreOutcome::Unavailable);
    assert!(machine.memory().as_slice().iter().all(|&b| b == 0));
    assert!(machine.persist_state().is_err());

    machine.load_program(Program::new().load(0, 1).halt().bytes());
    machine.run();
    assert_eq!(machine.registers().get(0), Ok(1));
}

#[test]
fn test_state_survives_persist_across_runs() {
    let image = ScratchImage::new("counter");

    // Each run adds 5 to the word at 0x300 and persists it.
    for expected in [5u32, 10, 15] {
        let mut machine = machine_at(image.path());
        let previous = machine.memory().read32(0x300);
        let program = Program::new()
            .load(0, previous)
            .load(1, 5)
            .add(0, 0, 1)
            .store(0, 0x300)
            .halt();
        machine.load_program(program.bytes());
        machine.run();
        machine.persist_state().unwrap();
        assert_eq!(machine.memory().read32(0x300), expected);
    }
}
