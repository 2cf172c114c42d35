use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use mica::{compile_source, deserialize, disassemble, serialize, Engine};

// BSD sysexits: EX_DATAERR for bad input, EX_SOFTWARE for runtime failures.
const EXIT_COMPILE: u8 = 65;
const EXIT_RUNTIME: u8 = 70;

#[derive(Parser)]
#[command(name = "mica", about = "Mica: a small scripting language with a bytecode VM")]
struct Cli {
    /// File to run. `.mica` compiles to a `.mcb` next to the source;
    /// `.mcb` runs precompiled bytecode; anything else runs as source.
    file: Option<PathBuf>,

    /// Evaluate an expression
    #[arg(short, long)]
    eval: Option<String>,

    /// Print the compiled bytecode listing instead of running
    #[arg(long)]
    disasm: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(expr) = &cli.eval {
        return run_source(expr, None, cli.disasm);
    }

    if let Some(file) = &cli.file {
        return run_file(file, cli.disasm);
    }

    repl()
}

fn run_file(file: &Path, disasm: bool) -> ExitCode {
    let extension = file.extension().and_then(|e| e.to_str());

    if extension == Some("mcb") {
        let bytes = match std::fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("Error reading {}: {e}", file.display());
                return ExitCode::from(EXIT_RUNTIME);
            }
        };
        let chunk = match deserialize(&bytes) {
            Ok(chunk) => chunk,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::from(EXIT_RUNTIME);
            }
        };
        if disasm {
            print!("{}", disassemble(&chunk, file.to_str()));
            return ExitCode::SUCCESS;
        }
        let mut engine = Engine::new();
        if let Err(e) = engine.run_chunk(&chunk) {
            eprintln!("{e}");
            return ExitCode::from(EXIT_RUNTIME);
        }
        return ExitCode::SUCCESS;
    }

    let source = match std::fs::read_to_string(file) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {e}", file.display());
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    // `.mica` is compile-only: the serialized program lands next to the
    // source and runs later via the `.mcb` path.
    let output = (extension == Some("mica")).then(|| file.with_extension("mcb"));
    run_source(&source, output, disasm)
}

/// Compile and either disassemble, persist, or run. `output` selects the
/// compile-only mode.
fn run_source(source: &str, output: Option<PathBuf>, disasm: bool) -> ExitCode {
    let chunk = match compile_source(source) {
        Ok(chunk) => chunk,
        Err(errors) => {
            for e in errors {
                eprintln!("{e}");
            }
            return ExitCode::from(EXIT_COMPILE);
        }
    };

    if disasm {
        print!("{}", disassemble(&chunk, None));
        return ExitCode::SUCCESS;
    }

    if let Some(path) = output {
        let bytes = match serialize(&chunk) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::from(EXIT_COMPILE);
            }
        };
        if let Err(e) = std::fs::write(&path, bytes) {
            eprintln!("Error writing {}: {e}", path.display());
            return ExitCode::from(EXIT_RUNTIME);
        }
        return ExitCode::SUCCESS;
    }

    let mut engine = Engine::new();
    match engine.run_source(source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(errors) => {
            for e in errors {
                eprintln!("{e}");
            }
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

fn repl() -> ExitCode {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_RUNTIME);
        }
    };

    println!("Mica v0.1.0");
    println!("Type 'exit' to leave\n");

    // One engine for the whole session: definitions persist across lines.
    let mut engine = Engine::new();

    loop {
        match rl.readline("mica> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "exit" {
                    break;
                }
                let _ = rl.add_history_entry(input);
                if let Err(errors) = engine.run_source(input) {
                    for e in errors {
                        eprintln!("{e}");
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Error: {e}");
                break;
            }
        }
    }

    ExitCode::SUCCESS
}
