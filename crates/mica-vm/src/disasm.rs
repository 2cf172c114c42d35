use std::fmt::Write;

use crate::chunk::Chunk;
use crate::opcodes::{op, Op};

fn read_u16(code: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([code[offset], code[offset + 1]])
}

/// Produce a human-readable disassembly of a chunk.
pub fn disassemble(chunk: &Chunk, name: Option<&str>) -> String {
    let mut out = String::new();
    let label = name.unwrap_or("<script>");
    writeln!(out, "== {label} ==").unwrap();

    let code = &chunk.code;
    let mut pc = 0usize;

    while pc < code.len() {
        write!(out, "{pc:04} ").unwrap();
        // A '|' marks an instruction on the same source line as the previous one.
        if pc > 0 && chunk.line(pc) == chunk.line(pc - 1) {
            write!(out, "   | ").unwrap();
        } else {
            write!(out, "{:4} ", chunk.line(pc)).unwrap();
        }

        let byte = code[pc];
        let Some(op) = Op::from_u8(byte) else {
            writeln!(out, "UNKNOWN({byte:#04x})").unwrap();
            pc += 1;
            continue;
        };

        match byte {
            op::CONSTANT | op::GET_GLOBAL | op::DEFINE_GLOBAL | op::SET_GLOBAL
            | op::GET_PROPERTY | op::SET_PROPERTY => {
                let idx = code[pc + 1];
                let rendered = match chunk.constant(idx) {
                    Ok(value) => value.to_string(),
                    Err(_) => "<bad index>".to_string(),
                };
                writeln!(out, "{:<16} {idx:<4} ; {rendered}", op.name()).unwrap();
                pc += 2;
            }

            op::JUMP | op::JUMP_IF_FALSE => {
                let offset = read_u16(code, pc + 1) as usize;
                let target = pc + 3 + offset;
                writeln!(out, "{:<16} {offset:<4} ; -> {target:04}", op.name()).unwrap();
                pc += 3;
            }
            op::LOOP => {
                let offset = read_u16(code, pc + 1) as usize;
                let target = (pc + 3).wrapping_sub(offset);
                writeln!(out, "{:<16} {offset:<4} ; -> {target:04}", op.name()).unwrap();
                pc += 3;
            }

            op::CALL => {
                let argc = code[pc + 1];
                writeln!(out, "{:<16} {argc}", op.name()).unwrap();
                pc += 2;
            }
            op::ARRAY => {
                let count = code[pc + 1];
                writeln!(out, "{:<16} {count}", op.name()).unwrap();
                pc += 2;
            }

            // All zero-operand opcodes
            _ => {
                writeln!(out, "{}", op.name()).unwrap();
                pc += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_core::Value;

    #[test]
    fn lists_constants_with_rendered_values() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Number(42.0)).unwrap();
        chunk.write_op(Op::Constant, 1);
        chunk.write(idx, 1);
        chunk.write_op(Op::Print, 1);
        let output = disassemble(&chunk, Some("test"));
        assert!(output.contains("== test =="));
        assert!(output.contains("CONSTANT"));
        assert!(output.contains("; 42"));
        assert!(output.contains("PRINT"));
    }

    #[test]
    fn same_line_instructions_show_a_pipe() {
        let mut chunk = Chunk::new();
        chunk.write_op(Op::Nil, 1);
        chunk.write_op(Op::Pop, 1);
        chunk.write_op(Op::Nil, 2);
        let output = disassemble(&chunk, None);
        assert!(output.contains("== <script> =="));
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[1].contains("   1 NIL"));
        assert!(lines[2].contains("   | POP"));
        assert!(lines[3].contains("   2 NIL"));
    }

    #[test]
    fn jumps_show_their_targets() {
        let mut chunk = Chunk::new();
        chunk.write_op(Op::JumpIfFalse, 1);
        chunk.write(0x00, 1);
        chunk.write(0x02, 1);
        chunk.write_op(Op::Pop, 1);
        chunk.write_op(Op::Nil, 1);
        chunk.write_op(Op::Loop, 2);
        chunk.write(0x00, 2);
        chunk.write(0x08, 2);
        let output = disassemble(&chunk, Some("jumps"));
        assert!(output.contains("JUMP_IF_FALSE    2    ; -> 0005"));
        assert!(output.contains("LOOP             8    ; -> 0000"));
    }

    #[test]
    fn unknown_bytes_do_not_derail_the_listing() {
        let mut chunk = Chunk::new();
        chunk.write(0xff, 1);
        chunk.write_op(Op::Return, 1);
        let output = disassemble(&chunk, Some("junk"));
        assert!(output.contains("UNKNOWN(0xff)"));
        assert!(output.contains("RETURN"));
    }

    #[test]
    fn call_and_array_show_counts() {
        let mut chunk = Chunk::new();
        chunk.write_op(Op::Array, 1);
        chunk.write(3, 1);
        chunk.write_op(Op::Call, 1);
        chunk.write(2, 1);
        let output = disassemble(&chunk, Some("ops"));
        assert!(output.contains("ARRAY            3"));
        assert!(output.contains("CALL             2"));
    }
}
