use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use mica::{Chunk, Engine, MicaError};

/// Byte sink shared between the test and the engine, so `print` output can
/// be inspected after the program runs.
#[derive(Clone, Default)]
pub struct SharedBuf(Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run a program, returning its print output and the execution result.
pub fn try_run(source: &str) -> (String, Result<(), Vec<MicaError>>) {
    let buf = SharedBuf::default();
    let mut engine = Engine::with_output(Box::new(buf.clone()));
    let result = engine.run_source(source);
    (buf.contents(), result)
}

/// Run a program that must succeed and return everything it printed.
pub fn run(source: &str) -> String {
    let (out, result) = try_run(source);
    if let Err(errors) = result {
        panic!("program failed: {errors:?}\nsource:\n{source}");
    }
    out
}

/// Run a program that must fail and return the first error's message.
pub fn run_err(source: &str) -> String {
    let (_, result) = try_run(source);
    match result {
        Err(errors) => errors[0].to_string(),
        Ok(()) => panic!("expected error for:\n{source}"),
    }
}

/// Run an already-compiled chunk and return its print output.
pub fn run_chunk(chunk: &Chunk) -> String {
    let buf = SharedBuf::default();
    let mut engine = Engine::with_output(Box::new(buf.clone()));
    if let Err(e) = engine.run_chunk(chunk) {
        panic!("chunk failed: {e}");
    }
    buf.contents()
}

pub fn assert_output(source: &str, expected: &[&str]) {
    assert_lines(&run(source), expected, "program", source);
}

/// Execute the same statements on both paths of the hybrid model: as
/// top-level bytecode, and wrapped in a function so the body evaluator walks
/// them. Both must print the same lines.
pub fn assert_dual(body: &str, expected: &[&str]) {
    assert_lines(&run(body), expected, "bytecode path", body);
    let wrapped = format!("function main() {{\n{body}\n}}\nmain()");
    assert_lines(&run(&wrapped), expected, "body-evaluator path", body);
}

fn assert_lines(out: &str, expected: &[&str], path: &str, source: &str) {
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines, expected, "{path} mismatch for:\n{source}");
}
