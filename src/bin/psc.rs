//! The compiler driver binary.
//!
//! Takes an optional source file (or reads stdin), compiles it to AT&T
//! assembly, and links it against a runtime into an executable (spec.md
//! §6, §4.K). Run with `--help` for the full flag list.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use psc::driver;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source file to compile; reads stdin if omitted.
    file: Option<PathBuf>,
    /// What to emit.
    #[arg(value_enum, short, long, default_value_t = Emit::Bin)]
    emit: Emit,
    /// Output path (an executable for `bin`, a `.s` file for `asm`).
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Path to the C runtime translation unit linked in at `bin`.
    #[arg(long, default_value = "runtime/runtime.c")]
    runtime: PathBuf,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// The generated AT&T assembly text.
    Asm,
    /// A linked executable (the default).
    Bin,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let source = match read_input(args.file.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let asm = match driver::compile(&source) {
        Ok(asm) => asm,
        Err(errors) => {
            eprint!("{errors}");
            return ExitCode::FAILURE;
        }
    };

    match args.emit {
        Emit::Asm => {
            let out_path = args.out.unwrap_or_else(|| PathBuf::from("a.s"));
            if let Err(e) = std::fs::write(&out_path, &asm) {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
        Emit::Bin => {
            let out_path = args.out.unwrap_or_else(|| PathBuf::from("./a.out"));
            let asm_path = out_path.with_extension("s");
            if let Err(e) = driver::assemble_and_link(&asm, &asm_path, &args.runtime, &out_path) {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn read_input(file: Option<&std::path::Path>) -> std::io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}
