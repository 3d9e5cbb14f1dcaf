//! [InstrumentedState]: the step executor (spec.md §4.7) binding a [State] to a [PreimageOracle].

use crate::{traits::PreimageOracle, Address, State, StepWitness};
use alloy_primitives::B256;
use anyhow::Result;
use std::io::{BufWriter, Write};

pub(crate) const MIPS_EBADF: u32 = 0x9;
pub(crate) const MIPS_EINVAL: u32 = 0x16;

/// Owns one guest MIPS32 thread context and drives it forward one instruction at a time,
/// producing a [StepWitness] on request. See spec.md §4.7/§5: single-threaded, cooperative,
/// deterministic given identical pre-state and oracle responses.
pub struct InstrumentedState<O: Write, E: Write, P: PreimageOracle> {
    pub(crate) state: State,
    pub(crate) std_out: BufWriter<O>,
    pub(crate) std_err: BufWriter<E>,
    /// The single out-of-band memory address this step has buffered a proof for.
    pub(crate) last_mem_access: Address,
    pub(crate) mem_proof_enabled: bool,
    pub(crate) mem_proof: [u8; 28 * 32],
    pub(crate) preimage_oracle: P,
    /// Cached pre-image bytes, including the 8-byte length prefix the guest reads through.
    pub(crate) last_preimage: Vec<u8>,
    pub(crate) last_preimage_key: B256,
    /// `u32::MAX` when nothing was read from the pre-image this step.
    pub(crate) last_preimage_offset: u32,
}

impl<O, E, P> InstrumentedState<O, E, P>
where
    O: Write,
    E: Write,
    P: PreimageOracle,
{
    pub fn new(state: State, oracle: P, std_out: O, std_err: E) -> Self {
        Self {
            state,
            std_out: BufWriter::new(std_out),
            std_err: BufWriter::new(std_err),
            last_mem_access: Address::MAX,
            mem_proof_enabled: false,
            mem_proof: [0; 28 * 32],
            preimage_oracle: oracle,
            last_preimage: Vec::default(),
            last_preimage_key: B256::default(),
            last_preimage_offset: 0,
        }
    }

    /// Borrow the underlying [State].
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutably borrow the pre-image oracle, e.g. for supervisor shutdown bookkeeping that lives
    /// outside the step executor's own contract.
    pub fn preimage_oracle_mut(&mut self) -> &mut P {
        &mut self.preimage_oracle
    }

    /// The Keccak-256 witness hash of the current state (spec.md §4.1), useful for computing a
    /// proof record's `post` hash without threading a full [StepWitness] through the caller.
    pub fn state_hash(&mut self) -> Result<B256> {
        use crate::traits::StateWitnessHasher;
        Ok(self.state.encode_witness()?.state_hash())
    }

    /// Advance the emulator by exactly one MIPS instruction (spec.md §4.7).
    ///
    /// When `proof` is true, returns the full [StepWitness] (pre-state encoding, instruction and
    /// touched-word memory proofs, and any pre-image consulted this step). When false, the
    /// witness is omitted entirely — the hot, no-proof execution path.
    pub fn step(&mut self, proof: bool) -> Result<Option<StepWitness>> {
        self.mem_proof_enabled = proof;
        self.last_mem_access = Address::MAX;
        self.last_preimage_offset = u32::MAX;

        let mut witness = None;
        if proof {
            let instruction_proof = self.state.memory.proof(self.state.pc as Address)?;
            witness = Some(StepWitness {
                state: self.state.encode_witness()?,
                mem_proof: instruction_proof.to_vec(),
                preimage_key: B256::ZERO,
                preimage_value: Vec::default(),
                preimage_offset: 0,
            });
        }

        self.inner_step()?;

        if proof {
            witness = witness.map(|mut wit| {
                wit.mem_proof.extend_from_slice(&self.mem_proof);
                if self.last_preimage_offset != u32::MAX {
                    wit.preimage_key = self.last_preimage_key;
                    wit.preimage_value = self.last_preimage.clone();
                    wit.preimage_offset = self.last_preimage_offset;
                }
                wit
            });
        }

        Ok(witness)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        test_utils::{StaticOracle, BASE_ADDR_END, END_ADDR},
        Address, InstrumentedState, State,
    };
    use std::io;

    fn new_instrumented(program: &[u8]) -> InstrumentedState<io::Sink, io::Sink, StaticOracle> {
        let mut state = State {
            pc: 0,
            next_pc: 4,
            ..Default::default()
        };
        state.memory.set_memory_range(0, program).unwrap();
        state.registers[31] = END_ADDR;
        InstrumentedState::new(state, StaticOracle::new(Vec::new()), io::sink(), io::sink())
    }

    fn assemble_addiu(rt: u32, rs: u32, imm: u16) -> u32 {
        (0x09 << 26) | (rs << 21) | (rt << 16) | imm as u32
    }

    #[test]
    fn single_addiu_step_advances_pc_and_registers_by_one() {
        // addiu $t0, $zero, 1
        let inst = assemble_addiu(8, 0, 1);
        let mut ins = new_instrumented(&inst.to_be_bytes());

        ins.step(false).unwrap();

        assert_eq!(ins.state().step, 1);
        assert_eq!(ins.state().registers[8], 1);
        assert_eq!(ins.state().pc, 4);
        assert!(!ins.state().exited);
    }

    #[test]
    fn register_zero_is_never_clobbered() {
        // addiu $zero, $zero, 1 — even targeting r0, it must stay zero.
        let inst = assemble_addiu(0, 0, 1);
        let mut ins = new_instrumented(&inst.to_be_bytes());
        ins.step(false).unwrap();
        assert_eq!(ins.state().registers[0], 0);
    }

    #[test]
    fn step_with_proof_encodes_pre_state_and_instruction_proof() {
        let inst = assemble_addiu(8, 0, 1);
        let mut ins = new_instrumented(&inst.to_be_bytes());
        let witness = ins.step(true).unwrap().expect("proof requested");
        assert_eq!(witness.state.len(), crate::state::STATE_WITNESS_SIZE);
        assert!(!witness.mem_proof.is_empty());
    }

    #[test]
    fn exit_group_sets_exited_and_exit_code() {
        // addiu $a0, $zero, 1; syscall (v0 = 4246 = exit_group)
        let mut state = State {
            pc: 0,
            next_pc: 4,
            ..Default::default()
        };
        let exit_group_prog = [
            assemble_addiu(4, 0, 1),
            (0x09 << 26) | (2 << 16) | 4246, // addiu $v0, $zero, 4246
            0x0000_000c,                     // syscall
        ];
        let mut bytes = Vec::new();
        for w in exit_group_prog {
            bytes.extend_from_slice(&w.to_be_bytes());
        }
        state.memory.set_memory_range(0, bytes.as_slice()).unwrap();
        state.registers[31] = END_ADDR;

        let mut ins = InstrumentedState::new(
            state,
            crate::test_utils::StaticOracle::new(Vec::new()),
            io::sink(),
            io::sink(),
        );

        for _ in 0..3 {
            ins.step(false).unwrap();
        }

        assert!(ins.state().exited);
        assert_eq!(ins.state().exit_code, 1);
    }

    #[test]
    fn exited_state_is_a_no_op_on_further_steps() {
        let mut state = State::default();
        state.exited = true;
        state.exit_code = 0;
        let step_before = state.step;
        let mut ins = InstrumentedState::new(
            state,
            crate::test_utils::StaticOracle::new(Vec::new()),
            io::sink(),
            io::sink(),
        );
        ins.step(false).unwrap();
        assert_eq!(ins.state().step, step_before);
    }

    #[allow(dead_code)]
    fn unused_constants_reference() -> (u32, u32) {
        (BASE_ADDR_END, END_ADDR)
    }
}
