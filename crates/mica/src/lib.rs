//! Mica — a small scripting language with a bytecode VM.
//!
//! This module provides a clean embedding API for the Mica interpreter.
//!
//! # Quick Start
//!
//! ```no_run
//! use mica::Engine;
//!
//! let mut engine = Engine::new();
//! engine.run_source("let x = 1 + 2\nprint x").unwrap();
//! ```

use std::io::Write;

// Re-export core types.
pub use mica_core::{MicaError, Value};
pub use mica_vm::{deserialize, disassemble, serialize, Chunk, Vm};

/// Parse and compile a program. Parse errors are collected and reported
/// together; compilation stops at the first error.
pub fn compile_source(source: &str) -> Result<Chunk, Vec<MicaError>> {
    let program = mica_parser::parse(source)?;
    mica_vm::compile(&program).map_err(|e| vec![e])
}

/// A VM plus the conveniences around it: one `Engine` is one global
/// namespace, so successive `run_source` calls see each other's definitions
/// (which is what the REPL relies on).
pub struct Engine {
    vm: Vm,
}

impl Engine {
    pub fn new() -> Self {
        Engine { vm: Vm::new() }
    }

    /// An engine whose `print` output goes to the given sink instead of
    /// stdout.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Engine {
            vm: Vm::with_output(out),
        }
    }

    pub fn run_source(&mut self, source: &str) -> Result<(), Vec<MicaError>> {
        let chunk = compile_source(source)?;
        self.vm.run(&chunk).map_err(|e| vec![e])
    }

    pub fn run_chunk(&mut self, chunk: &Chunk) -> Result<(), MicaError> {
        self.vm.run(chunk)
    }

    /// Deserialize a persisted program and run it.
    pub fn run_compiled(&mut self, bytes: &[u8]) -> Result<(), MicaError> {
        let chunk = deserialize(bytes)?;
        self.vm.run(&chunk)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
