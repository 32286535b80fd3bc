//! CLI driver: reads an `.lat` source file, runs the compiler pipeline,
//! and on success shells out to `nasm` and `gcc` to assemble and link a
//! native executable. Follows the OK/ERROR stderr protocol: `OK` (compile
//! succeeded, assembling/linking may still fail and is reported
//! separately) or `ERROR` followed by the error's class name and line on
//! stdout, exit code 1.

use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Parser;

use latc::{compile_file, CompileError, CompilerConfig};

const RUNTIME_C: &str = include_str!("../runtime_stub/runtime.c");

#[derive(Parser, Debug)]
#[command(name = "latc", about = "Compiler for the L programming language")]
struct Cli {
    /// Source file to compile (conventionally named with a `.lat` extension).
    input: PathBuf,

    /// Enable or disable the peephole optimizer.
    #[arg(long = "peephole", default_value_t = true)]
    peephole: bool,

    /// Enable or disable constant folding's AST pruner.
    #[arg(long = "const-expr", default_value_t = true)]
    const_expr: bool,

    /// Basename shared by the generated `.asm`/`.o`/`.out` files. Defaults
    /// to the input's file stem, next to the input.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let config = CompilerConfig {
        peephole: cli.peephole,
        const_expr: cli.const_expr,
    };

    match compile_file(&cli.input, &config) {
        Ok(asm) => {
            eprintln!("OK");
            let stem = cli
                .output
                .clone()
                .unwrap_or_else(|| default_output_stem(&cli.input));
            match assemble_and_link(&asm, &stem) {
                Ok(()) => std::process::exit(0),
                Err(message) => {
                    eprintln!("{}", message);
                    std::process::exit(2);
                }
            }
        }
        Err(err) => {
            eprintln!("ERROR");
            println!("{}", driver_message(&err));
            std::process::exit(1);
        }
    }
}

fn default_output_stem(input: &Path) -> PathBuf {
    input.with_extension("")
}

/// `ClassName at line N` on stdout — the Display impl adds the message
/// text too, which the protocol also expects on the same line.
fn driver_message(err: &CompileError) -> String {
    err.to_string()
}

/// Writes `<stem>.asm`/`.o`/`.out` next to the input (or next to `--output`,
/// if given), rather than to a deleted temp directory, so the assembly and
/// object files are left on disk alongside the executable.
fn assemble_and_link(asm: &str, stem: &Path) -> Result<(), String> {
    let asm_path = stem.with_extension("asm");
    let obj_path = stem.with_extension("o");
    let exe_path = stem.with_extension("out");
    let runtime_c_path = stem.with_extension("runtime.c");

    std::fs::write(&asm_path, asm).map_err(|e| format!("could not write assembly: {}", e))?;
    std::fs::write(&runtime_c_path, RUNTIME_C)
        .map_err(|e| format!("could not write runtime stub: {}", e))?;

    run_checked(
        Command::new("nasm")
            .args(["-f", "elf32", "-o"])
            .arg(&obj_path)
            .arg(&asm_path),
        "nasm",
    )?;

    run_checked(
        Command::new("gcc")
            .args(["-m32", "-o"])
            .arg(&exe_path)
            .arg(&obj_path)
            .arg(&runtime_c_path),
        "gcc",
    )?;

    Ok(())
}

fn run_checked(cmd: &mut Command, name: &str) -> Result<(), String> {
    let status = cmd
        .status()
        .map_err(|e| format!("failed to run {}: {}", name, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("{} exited with {}", name, status))
    }
}
