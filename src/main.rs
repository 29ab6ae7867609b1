// ABOUTME: CLI entry point: script mode and REPL mode over the Lox pipeline

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use lox::error::Reporter;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// A tree-walking interpreter for Lox.
#[derive(Parser, Debug)]
#[command(name = "lox")]
#[command(version)]
#[command(about = "A tree-walking interpreter for Lox")]
struct CliArgs {
    /// Script file to execute. If omitted, starts the REPL.
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

const HISTORY_FILE: &str = ".lox_history";

fn main() -> ExitCode {
    let args = CliArgs::parse();

    match args.script {
        Some(path) => run_script(&path),
        None => run_repl(),
    }
}

fn run_script(path: &PathBuf) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read file {}: {}", path.display(), err);
            return ExitCode::from(74);
        }
    };

    let mut reporter = Reporter::new();
    let code = lox::run(&source, &mut reporter);
    ExitCode::from(code as u8)
}

fn run_repl() -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Failed to initialize REPL: {err}");
            return ExitCode::from(74);
        }
    };
    let _ = editor.load_history(HISTORY_FILE);
    let mut interpreter = lox::interpreter::Interpreter::new(Default::default());
    // One generator for the whole session: ids must stay unique across lines, since a
    // closure declared on an earlier line can outlive that line's compilation.
    let mut id_gen = lox::ast::NodeIdGen::new();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                // A per-line error clears on the next line: each line gets its own reporter
                // rather than a process-wide flag, so a bad line never poisons later ones.
                // The interpreter itself persists, so earlier declarations stay visible.
                let mut reporter = Reporter::new();
                lox::run_line(&line, &mut reporter, &mut interpreter, &mut id_gen);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    let _ = editor.save_history(HISTORY_FILE);
    ExitCode::SUCCESS
}
