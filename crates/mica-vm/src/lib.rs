pub mod builtins;
pub mod chunk;
pub mod compiler;
pub mod disasm;
pub mod eval;
pub mod opcodes;
pub mod ops;
pub mod serialize;
pub mod vm;

pub use chunk::Chunk;
pub use compiler::compile;
pub use disasm::disassemble;
pub use opcodes::Op;
pub use serialize::{deserialize, serialize};
pub use vm::Vm;
