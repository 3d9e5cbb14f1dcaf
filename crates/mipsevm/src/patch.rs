//! Loading ELF binaries into a fresh [State] and patching them to run under this emulator.

use crate::{page, Address, State};
use anyhow::Result;
use elf::{abi::PT_LOAD, endian::AnyEndian, ElfBytes};
use std::io::{self, Cursor, Read};

/// Go-runtime symbols patched out because their behavior (GC, floating point, the Prometheus
/// client's package-init metrics registration) isn't supported by this emulator.
pub const GO_SYMBOLS: [&str; 14] = [
    "runtime.gcenable",
    "runtime.init.5",
    "runtime.main.func1",
    "runtime.deductSweepCredit",
    "runtime.(*gcControllerState).commit",
    "github.com/prometheus/client_golang/prometheus.init",
    "github.com/prometheus/client_golang/prometheus.init.0",
    "github.com/prometheus/procfs.init",
    "github.com/prometheus/common/model.init",
    "github.com/prometheus/client_model/go.init",
    "github.com/prometheus/client_model/go.init.0",
    "github.com/prometheus/client_model/go.init.1",
    "flag.init",
    "runtime.check",
];

/// Load a raw ELF file into a fresh [State]: sets `pc`/`next_pc` from the entry point, a default
/// heap base, and copies every `PT_LOAD` segment into memory.
pub fn load_elf(raw: &[u8]) -> Result<State> {
    let elf = ElfBytes::<AnyEndian>::minimal_parse(raw)?;

    let mut state = State {
        pc: elf.ehdr.e_entry as u32,
        next_pc: elf.ehdr.e_entry as u32 + 4,
        heap: 0x2000_0000,
        ..Default::default()
    };

    let headers = elf
        .segments()
        .ok_or_else(|| anyhow::anyhow!("ELF file has no program headers"))?;

    for (i, header) in headers.iter().enumerate() {
        if header.p_type == 0x7000_0003 {
            continue; // MIPS_ABIFLAGS, not a loadable segment.
        }

        let section_data = elf.segment_data(&header)?;
        let mut reader: Box<dyn Read> = Box::new(section_data);

        if header.p_filesz != header.p_memsz {
            if header.p_type != PT_LOAD {
                anyhow::bail!(
                    "program segment {i} has file size {} != mem size {}: only PT_LOAD zero-fill is supported",
                    header.p_filesz,
                    header.p_memsz
                );
            }
            if header.p_filesz > header.p_memsz {
                anyhow::bail!(
                    "invalid PT_LOAD segment {i}: file size {} exceeds mem size {}",
                    header.p_filesz,
                    header.p_memsz
                );
            }
            reader = Box::new(MultiReader(
                reader,
                Cursor::new(vec![0; (header.p_memsz - header.p_filesz) as usize]),
            ));
        }

        if header.p_vaddr + header.p_memsz >= 1 << 32 {
            anyhow::bail!(
                "program segment {i} out of 32-bit range: {} - {}",
                header.p_vaddr,
                header.p_vaddr + header.p_memsz
            );
        }

        state.memory.set_memory_range(header.p_vaddr, reader)?;
    }

    Ok(state)
}

/// Patch a Go-compiled ELF binary's unsupported runtime symbols to no-ops (`jr $ra; nop`).
pub fn patch_go(elf: &ElfBytes<AnyEndian>, state: &mut State) -> Result<()> {
    let (parsing_table, string_table) = elf
        .symbol_table()?
        .ok_or_else(|| anyhow::anyhow!("ELF file has no symbol table"))?;

    for symbol in parsing_table {
        let name = string_table.get(symbol.st_name as usize)?;

        if GO_SYMBOLS.contains(&name) {
            state.memory.set_memory_range(
                symbol.st_value,
                [0x03, 0xe0, 0x00, 0x08, 0, 0, 0, 0].as_slice(),
            )?;
        } else if name == "runtime.MemProfileRate" {
            state.memory.write32(symbol.st_value, 0)?;
        }
    }
    Ok(())
}

/// Patch the stack into a valid state for a freshly loaded Go-MIPS binary: stack pointer,
/// `argc`/`argv`/`auxv`, and a fixed "random" seed (determinism forbids real randomness).
pub fn patch_stack(state: &mut State) -> Result<()> {
    let ptr: u32 = 0x7FFF_D000;

    // One page of initial stack data plus four pages of headroom to grow into.
    state
        .memory
        .set_memory_range(ptr as Address - 4 * page::PAGE_SIZE as Address, [0u8; page::PAGE_SIZE * 5].as_slice())?;
    state.registers[29] = ptr;

    state.memory.write32((ptr + 4) as Address, 0x42)?; // argc
    state.memory.write32((ptr + 4 * 2) as Address, 0x35)?; // argv[n] terminator
    state.memory.write32((ptr + 4 * 3) as Address, 0)?; // envp terminator
    state.memory.write32((ptr + 4 * 4) as Address, 6)?; // auxv[0] = AT_PAGESZ
    state.memory.write32((ptr + 4 * 5) as Address, 4096)?; // auxv[1] = page size
    state.memory.write32((ptr + 4 * 6) as Address, 25)?; // auxv[2] = AT_RANDOM
    state.memory.write32((ptr + 4 * 7) as Address, ptr + 4 * 9)?; // auxv[3] = address of random bytes
    state.memory.write32((ptr + 4 * 8) as Address, 0)?; // auxv terminator

    state
        .memory
        .set_memory_range(ptr as Address + 4 * 9, b"4;byfairdiceroll".as_slice())?;

    Ok(())
}

/// Reads from the first source until exhausted, then reads from the second; used to zero-fill
/// the tail of a `PT_LOAD` segment whose file size is smaller than its memory size.
pub struct MultiReader<R1: Read, R2: Read>(R1, R2);

impl<R1: Read, R2: Read> Read for MultiReader<R1, R2> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read_first = self.0.read(buf)?;
        if read_first == 0 {
            return self.1.read(buf);
        }
        Ok(read_first)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn patch_stack_sets_stack_pointer() {
        let mut state = State::default();
        patch_stack(&mut state).unwrap();
        assert_eq!(state.registers[29], 0x7FFF_D000);
    }

    #[test]
    fn patch_stack_writes_argc_zero() {
        let mut state = State::default();
        patch_stack(&mut state).unwrap();
        assert_eq!(state.memory.read32(0x7FFF_D000 + 4).unwrap(), 0x42);
    }
}
