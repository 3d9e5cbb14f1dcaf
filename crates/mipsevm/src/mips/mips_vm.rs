//! MIPS32 instruction semantics driving [InstrumentedState::inner_step]. The opcode/fun values
//! mirror [crate::disasm]'s table exactly, so the two modules agree on the ISA by construction.

use crate::{
    mips::instrumented::{MIPS_EBADF, MIPS_EINVAL},
    page,
    types::Syscall,
    Address, Fd, InstrumentedState, PreimageOracle,
};
use alloy_primitives::B256;
use anyhow::Result;
use std::io::{Cursor, Read, Write};

impl<O, E, P> InstrumentedState<O, E, P>
where
    O: Write,
    E: Write,
    P: PreimageOracle,
{
    /// Decode and execute the instruction at the current PC.
    pub(crate) fn inner_step(&mut self) -> Result<()> {
        if self.state.exited {
            return Ok(());
        }
        self.state.step += 1;

        // The instruction-fetch proof is captured separately by `InstrumentedState::step` before
        // `inner_step` runs; `track_mem_access` here is reserved for the single out-of-band
        // load/store or pre-image access this step may additionally perform.
        let instruction = self.state.memory.read32(self.state.pc as Address)?;

        let opcode = instruction >> 26;
        let fun = instruction & 0x3f;
        let rs_idx = (instruction >> 21) & 0x1f;
        let rt_idx = (instruction >> 16) & 0x1f;
        let rd_idx = (instruction >> 11) & 0x1f;
        let shamt = (instruction >> 6) & 0x1f;
        let rs = self.state.registers[rs_idx as usize];
        let rt = self.state.registers[rt_idx as usize];

        match opcode {
            0 => self.handle_r_type(fun, rs, rt, rd_idx, shamt, instruction),
            1 | 4..=7 => self.handle_branch(opcode, instruction, rt_idx, rs),
            2 => self.handle_jump(false, instruction),
            3 => self.handle_jump(true, instruction),
            8..=15 => self.handle_alu_imm(opcode, rs, rt_idx, instruction),
            28 => self.handle_special2(fun, rs, rt, rd_idx),
            32..=56 => self.handle_load_store(opcode, rs, rt, rt_idx, instruction),
            _ => anyhow::bail!(
                "illegal instruction 0x{instruction:08x} at pc 0x{:08x}",
                self.state.pc
            ),
        }
    }

    fn set_reg_and_advance(&mut self, reg: u32, value: u32) -> Result<()> {
        if reg != 0 {
            self.state.registers[reg as usize] = value;
        }
        self.advance_pc()
    }

    fn advance_pc(&mut self) -> Result<()> {
        self.state.pc = self.state.next_pc;
        self.state.next_pc += 4;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_r_type(
        &mut self,
        fun: u32,
        rs: u32,
        rt: u32,
        rd_idx: u32,
        shamt: u32,
        instruction: u32,
    ) -> Result<()> {
        match fun {
            0x00 => self.set_reg_and_advance(rd_idx, rt << shamt),
            0x02 => self.set_reg_and_advance(rd_idx, rt >> shamt),
            0x03 => self.set_reg_and_advance(rd_idx, ((rt as i32) >> shamt) as u32),
            0x04 => self.set_reg_and_advance(rd_idx, rt << (rs & 0x1f)),
            0x06 => self.set_reg_and_advance(rd_idx, rt >> (rs & 0x1f)),
            0x07 => self.set_reg_and_advance(rd_idx, ((rt as i32) >> (rs & 0x1f)) as u32),
            0x08 => self.handle_jump_register(rs, 0),
            0x09 => self.handle_jump_register(rs, rd_idx),
            0x0a => {
                let current = self.state.registers[rd_idx as usize];
                self.set_reg_and_advance(rd_idx, if rt != 0 { rs } else { current })
            }
            0x0b => {
                let current = self.state.registers[rd_idx as usize];
                self.set_reg_and_advance(rd_idx, if rt == 0 { rs } else { current })
            }
            0x0c => self.handle_syscall(),
            0x0f => self.advance_pc(),
            0x10..=0x13 => self.handle_hi_lo(fun, rs, rt, rd_idx),
            0x18..=0x1b => self.handle_hi_lo(fun, rs, rt, 0),
            0x20 => self.set_reg_and_advance(rd_idx, (rs as i32).wrapping_add(rt as i32) as u32),
            0x21 => self.set_reg_and_advance(rd_idx, rs.wrapping_add(rt)),
            0x22 => self.set_reg_and_advance(rd_idx, (rs as i32).wrapping_sub(rt as i32) as u32),
            0x23 => self.set_reg_and_advance(rd_idx, rs.wrapping_sub(rt)),
            0x24 => self.set_reg_and_advance(rd_idx, rs & rt),
            0x25 => self.set_reg_and_advance(rd_idx, rs | rt),
            0x26 => self.set_reg_and_advance(rd_idx, rs ^ rt),
            0x27 => self.set_reg_and_advance(rd_idx, !(rs | rt)),
            0x2a => self.set_reg_and_advance(rd_idx, ((rs as i32) < (rt as i32)) as u32),
            0x2b => self.set_reg_and_advance(rd_idx, (rs < rt) as u32),
            _ => anyhow::bail!("illegal R-type fun 0x{fun:02x} in instruction 0x{instruction:08x}"),
        }
    }

    /// `jr`/`jalr`: one branch-delay slot, target taken directly from `rs`.
    fn handle_jump_register(&mut self, rs: u32, link_reg: u32) -> Result<()> {
        if self.state.next_pc != self.state.pc + 4 {
            anyhow::bail!("unexpected jump in branch delay slot at 0x{:08x}", self.state.pc);
        }
        let link = self.state.pc + 8;
        self.state.pc = self.state.next_pc;
        self.state.next_pc = rs;
        if link_reg != 0 {
            self.state.registers[link_reg as usize] = link;
        }
        Ok(())
    }

    /// `j`/`jal`: absolute 26-bit target combined with the delay slot's high-order bits.
    fn handle_jump(&mut self, is_link: bool, instruction: u32) -> Result<()> {
        if self.state.next_pc != self.state.pc + 4 {
            anyhow::bail!("unexpected jump in branch delay slot at 0x{:08x}", self.state.pc);
        }
        let target = ((instruction & 0x3ff_ffff) << 2) | (self.state.next_pc & 0xf000_0000);
        let link = self.state.pc + 8;
        self.state.pc = self.state.next_pc;
        self.state.next_pc = target;
        if is_link {
            self.state.registers[31] = link;
        }
        Ok(())
    }

    fn handle_special2(&mut self, fun: u32, rs: u32, rt: u32, rd: u32) -> Result<()> {
        let acc = |hi: u32, lo: u32| (hi as u64) << 32 | lo as u64;
        match fun {
            0x00 => {
                // madd
                let sum = (acc(self.state.hi, self.state.lo) as i64)
                    .wrapping_add((rs as i32 as i64).wrapping_mul(rt as i32 as i64))
                    as u64;
                self.state.hi = (sum >> 32) as u32;
                self.state.lo = sum as u32;
                self.advance_pc()
            }
            0x01 => {
                // maddu
                let sum = acc(self.state.hi, self.state.lo)
                    .wrapping_add((rs as u64).wrapping_mul(rt as u64));
                self.state.hi = (sum >> 32) as u32;
                self.state.lo = sum as u32;
                self.advance_pc()
            }
            0x02 => self.set_reg_and_advance(rd, (rs as i32).wrapping_mul(rt as i32) as u32),
            0x04 => {
                // msub
                let diff = (acc(self.state.hi, self.state.lo) as i64)
                    .wrapping_sub((rs as i32 as i64).wrapping_mul(rt as i32 as i64))
                    as u64;
                self.state.hi = (diff >> 32) as u32;
                self.state.lo = diff as u32;
                self.advance_pc()
            }
            0x05 => {
                // msubu
                let diff = acc(self.state.hi, self.state.lo)
                    .wrapping_sub((rs as u64).wrapping_mul(rt as u64));
                self.state.hi = (diff >> 32) as u32;
                self.state.lo = diff as u32;
                self.advance_pc()
            }
            0x20 => self.set_reg_and_advance(rd, rs.leading_zeros()),
            0x21 => self.set_reg_and_advance(rd, (!rs).leading_zeros()),
            _ => anyhow::bail!("illegal SPECIAL2 fun 0x{fun:02x}"),
        }
    }

    fn handle_alu_imm(&mut self, op: u32, rs: u32, rt_idx: u32, instruction: u32) -> Result<()> {
        let imm = instruction & 0xffff;
        let simm = imm as i16 as i32;
        let value = match op {
            8 => (rs as i32).wrapping_add(simm) as u32,
            9 => (rs as i32).wrapping_add(simm) as u32,
            10 => ((rs as i32) < simm) as u32,
            11 => (rs < simm as u32) as u32,
            12 => rs & imm,
            13 => rs | imm,
            14 => rs ^ imm,
            15 => imm << 16,
            _ => anyhow::bail!("illegal I-type ALU opcode 0x{op:02x}"),
        };
        self.set_reg_and_advance(rt_idx, value)
    }

    fn handle_load_store(&mut self, op: u32, rs: u32, rt: u32, rt_idx: u32, instruction: u32) -> Result<()> {
        let imm = instruction & 0xffff;
        let simm = imm as i16 as i32;
        let addr = (rs as i32).wrapping_add(simm) as u32;
        let aligned = (addr & 0xffff_fffc) as Address;
        let byte_idx = (addr & 0x3) as usize;

        self.track_mem_access(aligned)?;
        let word = self.state.memory.read32(aligned)?;
        let word_bytes = word.to_be_bytes();

        match op {
            32 => self.set_reg_and_advance(rt_idx, word_bytes[byte_idx] as i8 as i32 as u32),
            36 => self.set_reg_and_advance(rt_idx, word_bytes[byte_idx] as u32),
            33 => {
                if byte_idx & 1 != 0 {
                    anyhow::bail!("unaligned lh at 0x{addr:08x}");
                }
                let h = u16::from_be_bytes([word_bytes[byte_idx], word_bytes[byte_idx + 1]]);
                self.set_reg_and_advance(rt_idx, h as i16 as i32 as u32)
            }
            37 => {
                if byte_idx & 1 != 0 {
                    anyhow::bail!("unaligned lhu at 0x{addr:08x}");
                }
                let h = u16::from_be_bytes([word_bytes[byte_idx], word_bytes[byte_idx + 1]]);
                self.set_reg_and_advance(rt_idx, h as u32)
            }
            35 | 48 => {
                if byte_idx != 0 {
                    anyhow::bail!("unaligned word access at 0x{addr:08x}");
                }
                self.set_reg_and_advance(rt_idx, word)
            }
            34 => {
                // lwl: merge the high-order `byte_idx + 1` bytes from memory into rt.
                let mut merged = rt.to_be_bytes();
                let n = byte_idx + 1;
                merged[..n].copy_from_slice(&word_bytes[..n]);
                self.set_reg_and_advance(rt_idx, u32::from_be_bytes(merged))
            }
            38 => {
                // lwr: merge the low-order bytes from memory into rt.
                let mut merged = rt.to_be_bytes();
                merged[byte_idx..].copy_from_slice(&word_bytes[byte_idx..]);
                self.set_reg_and_advance(rt_idx, u32::from_be_bytes(merged))
            }
            40 | 41 | 42 | 43 | 46 => {
                let mut out = word_bytes;
                let rt_bytes = rt.to_be_bytes();
                match op {
                    40 => out[byte_idx] = rt_bytes[3],
                    41 => {
                        if byte_idx & 1 != 0 {
                            anyhow::bail!("unaligned sh at 0x{addr:08x}");
                        }
                        out[byte_idx] = rt_bytes[2];
                        out[byte_idx + 1] = rt_bytes[3];
                    }
                    42 => out[..byte_idx + 1].copy_from_slice(&rt_bytes[..byte_idx + 1]),
                    43 => {
                        if byte_idx != 0 {
                            anyhow::bail!("unaligned sw at 0x{addr:08x}");
                        }
                        out = rt_bytes;
                    }
                    46 => out[byte_idx..].copy_from_slice(&rt_bytes[byte_idx..]),
                    _ => unreachable!(),
                }
                self.state.memory.write32(aligned, u32::from_be_bytes(out))?;
                self.advance_pc()
            }
            56 => {
                // sc: store-conditional always succeeds — no multi-core guest (spec.md §1 non-goal).
                if byte_idx != 0 {
                    anyhow::bail!("unaligned sc at 0x{addr:08x}");
                }
                self.state.memory.write32(aligned, rt)?;
                self.set_reg_and_advance(rt_idx, 1)
            }
            _ => anyhow::bail!("illegal load/store opcode 0x{op:02x}"),
        }
    }

    /// Read the pre-image for `key` at `offset` from the [PreimageOracle], caching its bytes
    /// (with an 8-byte length prefix) across repeated offset reads of the same key.
    ///
    /// ### Returns
    /// - `(data, data_len)`: up to 32 bytes of pre-image data and how many are valid.
    pub fn read_preimage(&mut self, key: B256, offset: u32) -> Result<(B256, usize)> {
        if key != self.last_preimage_key {
            self.last_preimage_key = key;
            let data = self.preimage_oracle.get(key)?;

            self.last_preimage.resize(8 + data.len(), 0);
            self.last_preimage[..8].copy_from_slice(&(data.len() as u64).to_be_bytes());
            self.last_preimage[8..].copy_from_slice(&data);
        }

        self.last_preimage_offset = offset;

        let mut data = B256::ZERO;
        let data_len =
            Cursor::new(&self.last_preimage[offset as usize..]).read(data.as_mut_slice())?;

        Ok((data, data_len))
    }

    /// Buffer the Merkle proof for one out-of-band memory access this step. At most one such
    /// access is allowed per step (the instruction fetch is tracked separately).
    pub fn track_mem_access(&mut self, effective_address: Address) -> Result<()> {
        if self.mem_proof_enabled && self.last_mem_access != effective_address {
            if self.last_mem_access != Address::MAX {
                anyhow::bail!(
                    "unexpected second memory access at 0x{effective_address:x}, already buffered 0x{:x}",
                    self.last_mem_access
                );
            }
            self.last_mem_access = effective_address;
            self.mem_proof = self.state.memory.proof(effective_address)?;
        }
        Ok(())
    }

    fn read_memory_bytes(&mut self, address: u32, len: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(len as usize);
        let mut addr = address;
        while (out.len() as u32) < len {
            let word = self.state.memory.read32((addr & !0x3) as Address)?;
            let word_bytes = word.to_be_bytes();
            let start = (addr & 0x3) as usize;
            for b in &word_bytes[start..] {
                if out.len() as u32 == len {
                    break;
                }
                out.push(*b);
            }
            addr = (addr & !0x3) + 4;
        }
        Ok(out)
    }

    /// Dispatch a `syscall` instruction per spec.md §4.4's pre-image read/write conventions.
    pub fn handle_syscall(&mut self) -> Result<()> {
        let mut v0 = 0u32;
        let mut v1 = 0u32;

        let (a0, a1, a2) = (
            self.state.registers[4],
            self.state.registers[5],
            self.state.registers[6],
        );

        if let Ok(syscall) = Syscall::try_from(self.state.registers[2]) {
            match syscall {
                Syscall::Mmap => {
                    let mut sz = a1;
                    let masked_size = sz & page::PAGE_ADDRESS_MASK as u32;
                    if masked_size != 0 {
                        sz += page::PAGE_SIZE as u32 - masked_size;
                    }

                    if a0 == 0 {
                        v0 = self.state.heap;
                        self.state.heap += sz;
                    } else {
                        v0 = a0;
                    }
                }
                Syscall::Brk => {
                    v0 = 0x4000_0000;
                }
                Syscall::Clone => {
                    // Multi-core guests are a non-goal (spec.md §1).
                    v0 = 1;
                }
                Syscall::ExitGroup => {
                    self.state.exited = true;
                    self.state.exit_code = a0 as u8;
                    return Ok(());
                }
                Syscall::Read => match (a0 as u8).try_into() {
                    Ok(Fd::StdIn) => {
                        // Nothing to do: read zero bytes, report no error.
                    }
                    Ok(Fd::PreimageRead) => {
                        let effective_address = (a1 & 0xffff_fffc) as Address;
                        self.track_mem_access(effective_address)?;
                        let memory = self.state.memory.read32(effective_address)?;

                        let (data, mut data_len) =
                            self.read_preimage(self.state.preimage_key.into(), self.state.preimage_offset)?;

                        let alignment = (a1 & 0x3) as usize;
                        let space = 4 - alignment;
                        data_len = data_len.min(space).min(a2 as usize);

                        let mut out_mem = memory.to_be_bytes();
                        out_mem[alignment..alignment + data_len].copy_from_slice(&data[..data_len]);
                        self.state
                            .memory
                            .write32(effective_address, u32::from_be_bytes(out_mem))?;
                        self.state.preimage_offset += data_len as u32;
                        v0 = data_len as u32;
                    }
                    Ok(Fd::HintRead) => {
                        // Nothing is actually read into memory; the result is discarded anyway.
                        v0 = a2;
                    }
                    _ => {
                        v0 = 0xffff_ffff;
                        v1 = MIPS_EBADF;
                    }
                },
                Syscall::Write => match (a0 as u8).try_into() {
                    Ok(Fd::Stdout) => {
                        let bytes = self.read_memory_bytes(a1, a2)?;
                        self.std_out.write_all(&bytes)?;
                        v0 = a2;
                    }
                    Ok(Fd::StdErr) => {
                        let bytes = self.read_memory_bytes(a1, a2)?;
                        self.std_err.write_all(&bytes)?;
                        v0 = a2;
                    }
                    Ok(Fd::HintWrite) => {
                        let bytes = self.read_memory_bytes(a1, a2)?;
                        self.preimage_oracle.hint(&bytes);
                        v0 = a2;
                    }
                    Ok(Fd::PreimageWrite) => {
                        let effective_address = (a1 & 0xffff_fffc) as Address;
                        self.track_mem_access(effective_address)?;
                        let memory = self.state.memory.read32(effective_address)?;
                        let alignment = (a1 & 0x3) as usize;
                        let space = (4 - alignment).min(a2 as usize);
                        let bytes = memory.to_be_bytes();

                        // Slide the 32-byte key buffer left by `space` bytes and fill the
                        // vacated tail with the newly written bytes (spec.md §4.4): the guest
                        // streams an arbitrarily long key a few bytes at a time.
                        let mut key = self.state.preimage_key;
                        key.rotate_left(space);
                        let tail = 32 - space;
                        key[tail..].copy_from_slice(&bytes[alignment..alignment + space]);
                        self.state.preimage_key = key;
                        self.state.preimage_offset = 0;
                        v0 = space as u32;
                    }
                    _ => {
                        v0 = 0xffff_ffff;
                        v1 = MIPS_EBADF;
                    }
                },
                Syscall::Fcntl => {
                    if a1 == 3 {
                        match (a0 as u8).try_into() {
                            Ok(Fd::StdIn | Fd::PreimageRead | Fd::HintRead) => v0 = 0,
                            Ok(Fd::Stdout | Fd::StdErr | Fd::PreimageWrite | Fd::HintWrite) => v0 = 1,
                            _ => {
                                v0 = 0xffff_ffff;
                                v1 = MIPS_EBADF;
                            }
                        }
                    } else {
                        v0 = 0xffff_ffff;
                        v1 = MIPS_EINVAL;
                    }
                }
            }
        }

        self.state.registers[2] = v0;
        self.state.registers[7] = v1;

        self.advance_pc()
    }

    /// Dispatch `beq`/`bne`/`blez`/`bgtz`/REGIMM branches, all sharing one delay-slot shape.
    pub fn handle_branch(&mut self, opcode: u32, instruction: u32, rt_idx: u32, rs: u32) -> Result<()> {
        if self.state.next_pc != self.state.pc + 4 {
            anyhow::bail!("unexpected branch in delay slot at 0x{:08x}", self.state.pc);
        }

        let should_branch = match opcode {
            4 | 5 => {
                let rt = self.state.registers[rt_idx as usize];
                (rs == rt && opcode == 4) || (rs != rt && opcode == 5)
            }
            6 => (rs as i32) <= 0,
            7 => (rs as i32) > 0,
            1 => {
                let rtv = (instruction >> 16) & 0x1f;
                match rtv {
                    0 => (rs as i32) < 0,
                    1 => (rs as i32) >= 0,
                    17 => {
                        self.state.registers[31] = self.state.pc + 8;
                        (rs as i32) >= 0
                    }
                    2 | 3 => false, // bltzl/bgezl: likely-branch variant, treated as not-taken here.
                    _ => false,
                }
            }
            _ => false,
        };

        let prev_pc = self.state.pc;
        self.state.pc = self.state.next_pc;

        if should_branch {
            self.state.next_pc = prev_pc + 4 + (sign_extend(instruction & 0xffff, 16) << 2);
        } else {
            self.state.next_pc += 4;
        }

        Ok(())
    }

    /// Dispatch `mfhi`/`mthi`/`mflo`/`mtlo`/`mult`/`multu`/`div`/`divu`.
    pub fn handle_hi_lo(&mut self, fun: u32, rs: u32, rt: u32, store_reg: u32) -> Result<()> {
        let val = match fun {
            0x10 => self.state.hi,
            0x11 => {
                self.state.hi = rs;
                0
            }
            0x12 => self.state.lo,
            0x13 => {
                self.state.lo = rs;
                0
            }
            0x18 => {
                let acc = (rs as i32) as i64 * (rt as i32) as i64;
                self.state.hi = (acc >> 32) as u32;
                self.state.lo = acc as u32;
                0
            }
            0x19 => {
                let acc = rs as u64 * rt as u64;
                self.state.hi = (acc >> 32) as u32;
                self.state.lo = acc as u32;
                0
            }
            0x1a => {
                self.state.hi = ((rs as i32) % (rt as i32)) as u32;
                self.state.lo = ((rs as i32) / (rt as i32)) as u32;
                0
            }
            0x1b => {
                self.state.hi = rs % rt;
                self.state.lo = rs / rt;
                0
            }
            _ => 0,
        };

        if store_reg != 0 {
            self.state.registers[store_reg as usize] = val;
        }

        self.advance_pc()
    }
}

/// Sign extend the lower `index` bits of `data` to 32 bits.
pub(crate) fn sign_extend(data: u32, index: u32) -> u32 {
    let is_signed = (data >> (index - 1)) & 1 != 0;
    let signed = ((1u32 << (32 - index)).wrapping_sub(1)) << index;
    let mask = (1u32 << index) - 1;
    if is_signed {
        (data & mask) | signed
    } else {
        data & mask
    }
}

#[cfg(test)]
mod test {
    use super::sign_extend;

    #[test]
    fn sign_extend_positive_offset_is_unchanged() {
        assert_eq!(sign_extend(0x0010, 16), 0x0010);
    }

    #[test]
    fn sign_extend_negative_offset_fills_high_bits() {
        assert_eq!(sign_extend(0xffff, 16), 0xffff_ffff);
    }
}
