use mica_core::{MicaError, Value};

use crate::opcodes::Op;

/// A compiled program: an append-only instruction byte stream, a parallel
/// per-byte source line table, and a constant pool addressed by a single
/// byte. `code.len() == lines.len()` always holds.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub code: Vec<u8>,
    pub lines: Vec<u32>,
    pub constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk::default()
    }

    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    pub fn write_op(&mut self, op: Op, line: u32) {
        self.write(op as u8, line);
    }

    /// Append a constant and return its pool index. The pool is addressed by
    /// a single byte, so it holds at most 256 entries.
    pub fn add_constant(&mut self, value: Value) -> Result<u8, MicaError> {
        if self.constants.len() > u8::MAX as usize {
            return Err(MicaError::compile("Too many constants in one chunk."));
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u8)
    }

    pub fn constant(&self, index: u8) -> Result<&Value, MicaError> {
        self.constants
            .get(index as usize)
            .ok_or_else(|| MicaError::runtime(format!("Invalid constant index {index}.")))
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn line(&self, offset: usize) -> u32 {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// Overwrite a previously emitted byte (jump back-patching).
    pub fn patch(&mut self, offset: usize, byte: u8) {
        self.code[offset] = byte;
    }
}
