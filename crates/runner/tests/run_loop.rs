//! End-to-end run-loop scenarios (spec.md §8): drives real `Kernel`s built from files on disk,
//! the same path the `stepvm run` subcommand takes.

use stepvm_core::State;
use stepvm_runner::{compress_bytes, decompress_bytes, KernelBuilder, Proof};
use tempfile::tempdir;

fn write_state(path: &std::path::Path, state: &State) {
    let bytes = serde_json::to_vec(state).unwrap();
    std::fs::write(path, compress_bytes(&bytes).unwrap()).unwrap();
}

fn read_state(path: &std::path::Path) -> State {
    let bytes = decompress_bytes(&std::fs::read(path).unwrap()).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `addiu $rt, $rs, imm`.
fn addiu(rt: u32, rs: u32, imm: u16) -> u32 {
    (0x09 << 26) | (rs << 21) | (rt << 16) | imm as u32
}

const SYSCALL: u32 = 0x0000_000c;

#[test]
fn stop_at_every_step_runs_exactly_one_step() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.json.gz");
    let output = dir.path().join("out.json.gz");

    let mut state = State { pc: 0x1000, next_pc: 0x1004, ..Default::default() };
    state.memory.set_memory_range(0x1000, addiu(8, 0, 1).to_be_bytes().as_slice()).unwrap();
    write_state(&input, &state);

    let mut kernel = KernelBuilder::default()
        .with_input(input.to_string_lossy().to_string())
        .with_output(Some(output.to_string_lossy().to_string()))
        .with_stop_at(Some("%1".to_string()))
        .build()
        .unwrap();
    kernel.run().unwrap();

    let out = read_state(&output);
    assert_eq!(out.step, 1);
    assert_eq!(out.registers[8], 1);
    assert_eq!(out.pc, 0x1004);
    assert!(!out.exited);
}

#[test]
fn proof_at_zero_stop_at_one_emits_a_single_proof() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.json.gz");
    let output = dir.path().join("out.json.gz");
    let proof_fmt = dir.path().join("proof-%d.json");

    let mut state = State { pc: 0x1000, next_pc: 0x1004, ..Default::default() };
    state.memory.set_memory_range(0x1000, addiu(8, 0, 1).to_be_bytes().as_slice()).unwrap();
    write_state(&input, &state);

    let mut kernel = KernelBuilder::default()
        .with_input(input.to_string_lossy().to_string())
        .with_output(Some(output.to_string_lossy().to_string()))
        .with_proof_at(Some("=0".to_string()))
        .with_proof_format(Some(proof_fmt.to_string_lossy().to_string()))
        .with_stop_at(Some("=1".to_string()))
        .build()
        .unwrap();
    kernel.run().unwrap();

    let proof_path = dir.path().join("proof-0.json");
    assert!(proof_path.exists());
    let proof: Proof = serde_json::from_slice(&std::fs::read(&proof_path).unwrap()).unwrap();
    assert_eq!(proof.step, 0);
    assert!(!dir.path().join("proof-1.json").exists());

    let out = read_state(&output);
    assert_eq!(out.step, 1);
    assert_eq!(out.registers[8], 1);
}

#[test]
fn snapshot_at_every_other_step_up_to_five() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.json.gz");
    let output = dir.path().join("out.json.gz");
    let snapshot_fmt = dir.path().join("snap-%d.json.gz");

    // Unallocated memory reads as zero, i.e. a string of implicit NOPs (sll $zero, $zero, 0).
    let state = State { pc: 0, next_pc: 4, ..Default::default() };
    write_state(&input, &state);

    let mut kernel = KernelBuilder::default()
        .with_input(input.to_string_lossy().to_string())
        .with_output(Some(output.to_string_lossy().to_string()))
        .with_snapshot_at(Some("%2".to_string()))
        .with_snapshot_format(Some(snapshot_fmt.to_string_lossy().to_string()))
        .with_stop_at(Some("=5".to_string()))
        .build()
        .unwrap();
    kernel.run().unwrap();

    for step in [0, 2, 4] {
        let snap = read_state(&dir.path().join(format!("snap-{step}.json.gz")));
        assert_eq!(snap.step, step);
    }
    for step in [1, 3, 5] {
        assert!(!dir.path().join(format!("snap-{step}.json.gz")).exists());
    }

    let out = read_state(&output);
    assert_eq!(out.step, 5);
}

#[test]
fn oracle_absent_run_completes_when_no_preimage_is_requested() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.json.gz");
    let output = dir.path().join("out.json.gz");

    let state = State { pc: 0, next_pc: 4, ..Default::default() };
    write_state(&input, &state);

    let mut kernel = KernelBuilder::default()
        .with_input(input.to_string_lossy().to_string())
        .with_output(Some(output.to_string_lossy().to_string()))
        .with_stop_at(Some("=3".to_string()))
        .build()
        .unwrap();
    kernel.run().unwrap();

    let out = read_state(&output);
    assert_eq!(out.step, 3);
}

#[test]
fn oracle_crash_annotates_the_step_error_with_its_exit_code() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.json.gz");
    let output = dir.path().join("out.json.gz");

    // Syscall::Read(Fd::PreimageRead): reads a pre-image key the oracle sub-process never gets a
    // chance to answer, since it exits with code 2 before the guest even finishes booting.
    let program = [
        addiu(2, 0, 4003), // $v0 = SYS_read
        addiu(4, 0, 5),    // $a0 = Fd::PreimageRead
        addiu(5, 0, 0x1000), // $a1 = destination address
        addiu(6, 0, 32),   // $a2 = length
        SYSCALL,
    ];
    let mut bytes = Vec::new();
    for word in program {
        bytes.extend_from_slice(&word.to_be_bytes());
    }

    let mut state = State { pc: 0, next_pc: 4, preimage_key: [0x11; 32], ..Default::default() };
    state.memory.set_memory_range(0, bytes.as_slice()).unwrap();
    write_state(&input, &state);

    let mut kernel = KernelBuilder::default()
        .with_input(input.to_string_lossy().to_string())
        .with_output(Some(output.to_string_lossy().to_string()))
        .with_stop_at(Some("=5".to_string()))
        .with_preimage_server(vec!["/bin/sh".to_string(), "-c".to_string(), "exit 2".to_string()])
        .build()
        .unwrap();

    let err = kernel.run().unwrap_err();
    assert!(
        err.to_string().contains("pre-image server exited with code 2")
            || err.chain().any(|c| c.to_string().contains("pre-image server exited with code 2")),
        "unexpected error: {err:#}"
    );
}
