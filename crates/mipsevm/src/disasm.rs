//! A pure disassembler mapping `(state, instruction word) -> line`, used only for `--opc-at`
//! logging (spec.md §4.3). Output never feeds back into execution.

use crate::State;

/// Decode one instruction word into a human-readable line. Operand positions that would name a
/// register substitute that register's *current value* (not its index) from `state`.
///
/// Totality: every 32-bit input produces a non-empty string; unrecognized opcode/fun
/// combinations produce a line beginning with `err`.
pub fn disassemble(state: &State, inst: u32) -> String {
    let op = (inst >> 26) & 0x3f;
    let rs = (inst >> 21) & 0x1f;
    let rt = (inst >> 16) & 0x1f;
    let rd = (inst >> 11) & 0x1f;
    let shamt = (inst >> 6) & 0x1f;
    let fun = inst & 0x3f;
    let imm = inst & 0xffff;
    let target = inst & 0x3ffffff;

    let reg = |i: u32| state.registers[i as usize];

    match op {
        0 => disasm_r_type(fun, reg(rs), reg(rt), rd, shamt),
        1 => disasm_regimm(rt, reg(rs)),
        2 => format!("j {}", target),
        3 => format!("jal {}", target),
        28 => disasm_special2(fun, reg(rs), reg(rt), rd),
        _ => disasm_i_type(op, reg(rs), rt, reg(rt), imm),
    }
}

fn disasm_r_type(fun: u32, rs: u32, rt: u32, rd: u32, shamt: u32) -> String {
    match fun {
        0x00 => format!("sll {}, {}, {}", rd, rt, shamt),
        0x02 => format!("srl {}, {}, {}", rd, rt, shamt),
        0x03 => format!("sra {}, {}, {}", rd, rt, shamt),
        0x04 => format!("sllv {}, {}, {}", rd, rt, rs),
        0x06 => format!("srlv {}, {}, {}", rd, rt, rs),
        0x07 => format!("srav {}, {}, {}", rd, rt, rs),
        0x08 => format!("jr {}", rs),
        0x09 => format!("jalr {}, {}", rd, rs),
        0x0a => format!("movz {}, {}, {}", rd, rs, rt),
        0x0b => format!("movn {}, {}, {}", rd, rs, rt),
        0x0c => "syscall".to_string(),
        0x0f => "sync".to_string(),
        0x10 => format!("mfhi {}", rd),
        // Open question (spec.md §9): `mthi` is treated as an intentional alias of `mtlo`.
        0x11 => format!("mthi/mtlo {}, {}", rd, rs),
        0x12 => format!("mflo {}", rd),
        0x13 => format!("mtlo {}, {}", rd, rs),
        0x18 => format!("mult {}, {}", rs, rt),
        0x19 => format!("multu {}, {}", rs, rt),
        0x1a => format!("div {}, {}", rs, rt),
        0x1b => format!("divu {}, {}", rs, rt),
        0x20 => format!("add {}, {}, {}", rd, rs, rt),
        0x21 => format!("addu {}, {}, {}", rd, rs, rt),
        0x22 => format!("sub {}, {}, {}", rd, rs, rt),
        0x23 => format!("subu {}, {}, {}", rd, rs, rt),
        0x24 => format!("and {}, {}, {}", rd, rs, rt),
        0x25 => format!("or {}, {}, {}", rd, rs, rt),
        0x26 => format!("xor {}, {}, {}", rd, rs, rt),
        0x27 => format!("nor {}, {}, {}", rd, rs, rt),
        0x2a => format!("slt {}, {}, {}", rd, rs, rt),
        0x2b => format!("sltu {}, {}, {}", rd, rs, rt),
        _ => format!("err unknown R-type fun 0x{:02x}", fun),
    }
}

fn disasm_regimm(rt_field: u32, rs: u32) -> String {
    match rt_field {
        0 => format!("bltz {}, ...", rs),
        1 => format!("bgez {}, ...", rs),
        2 => format!("bltzl {}, ...", rs),
        3 => format!("bgezl {}, ...", rs),
        17 => format!("bgezal {}, ...", rs),
        _ => format!("err unknown REGIMM rt 0x{:02x}", rt_field),
    }
}

fn disasm_special2(fun: u32, rs: u32, rt: u32, rd: u32) -> String {
    match fun {
        0 => format!("madd {}, {}", rs, rt),
        1 => format!("maddu {}, {}", rs, rt),
        2 => format!("mul {}, {}, {}", rd, rs, rt),
        4 => format!("msub {}, {}", rs, rt),
        5 => format!("msubu {}, {}", rs, rt),
        32 => format!("clz {}, {}", rd, rs),
        33 => format!("clo {}, {}", rd, rs),
        _ => format!("err unknown SPECIAL2 fun 0x{:02x}", fun),
    }
}

fn disasm_i_type(op: u32, rs: u32, rt_idx: u32, rt: u32, imm: u32) -> String {
    let simm = imm as i16;
    match op {
        4 => format!("beq {}, {}, {}", rs, rt, simm),
        5 => format!("bne {}, {}, {}", rs, rt, simm),
        6 => format!("blez {}, {}", rs, simm),
        7 => format!("bgtz {}, {}", rs, simm),
        8 => format!("addi {}, {}, {}", rt_idx, rs, simm),
        9 => format!("addiu {}, {}, {}", rt_idx, rs, simm),
        10 => format!("slti {}, {}, {}", rt_idx, rs, simm),
        11 => format!("sltiu {}, {}, {}", rt_idx, rs, simm),
        12 => format!("andi {}, {}, 0x{:x}", rt_idx, rs, imm),
        13 => format!("ori {}, {}, 0x{:x}", rt_idx, rs, imm),
        14 => format!("xori {}, {}, 0x{:x}", rt_idx, rs, imm),
        15 => format!("lui {}, 0x{:x}", rt_idx, imm),
        32 => format!("lb {}, {}({})", rt_idx, simm, rs),
        33 => format!("lh {}, {}({})", rt_idx, simm, rs),
        34 => format!("lwl {}, {}({})", rt_idx, simm, rs),
        35 => format!("lw {}, {}({})", rt_idx, simm, rs),
        36 => format!("lbu {}, {}({})", rt_idx, simm, rs),
        37 => format!("lhu {}, {}({})", rt_idx, simm, rs),
        38 => format!("lwr {}, {}({})", rt_idx, simm, rs),
        40 => format!("sb {}, {}({})", rt_idx, simm, rs),
        41 => format!("sh {}, {}({})", rt_idx, simm, rs),
        42 => format!("swl {}, {}({})", rt_idx, simm, rs),
        43 => format!("sw {}, {}({})", rt_idx, simm, rs),
        46 => format!("swr {}, {}({})", rt_idx, simm, rs),
        48 => format!("ll {}, {}({})", rt_idx, simm, rs),
        56 => format!("sc {}, {}({})", rt_idx, simm, rs),
        _ => format!("err unknown opcode 0x{:02x}", op),
    }
}
