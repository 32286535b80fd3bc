//! A compiler for the L programming language: a small statically typed,
//! single-inheritance object-oriented imperative language that compiles
//! down to 32-bit x86 NASM assembly.
//!
//! The pipeline is a fixed sequence of passes, each one a separate module:
//! lexing and parsing (`lexer`, `parser`), symbol table and vtable
//! construction (`symbols`), semantic analysis (`typecheck`), constant
//! folding and AST pruning (`constfold`), return-reachability checking
//! (`reachability`), stack slot allocation (`locals`), string literal
//! collection (`strings`), and finally NASM code generation and peephole
//! optimization (`codegen`, `peephole`).
//!
//! ```
//! use latc::{compile_source, CompilerConfig};
//!
//! let asm = compile_source(
//!     "int main() { printInt(1 + 2 * 3); return 0; }",
//!     &CompilerConfig::default(),
//! ).unwrap();
//! assert!(asm.contains("global main"));
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod constfold;
pub mod errors;
pub mod lexer;
pub mod locals;
pub mod parser;
pub mod peephole;
pub mod reachability;
pub mod strings;
pub mod symbols;
pub mod typecheck;

pub use config::CompilerConfig;
pub use errors::{CompileError, Result};
pub use symbols::SymbolTable;

/// Runs the full pipeline over already-read source text and returns the
/// generated NASM assembly.
pub fn compile_source(source: &str, config: &CompilerConfig) -> Result<String> {
    let mut program = parser::parse(source)?;
    let symbols = SymbolTable::load(&program)?;
    typecheck::check(&program, &symbols)?;

    // Folding always runs: reachability must see through a folded
    // `while (true)` regardless of whether pruning is enabled.
    constfold::evaluate_program(&program)?;
    reachability::check(&program)?;

    if config.const_expr {
        constfold::prune_program(&mut program);
    }

    locals::count_program(&program);
    let string_table = strings::collect(&program);

    Ok(codegen::generate(&program, &symbols, &string_table, config.peephole))
}

/// Reads `path`, compiles it, and returns the generated NASM assembly.
/// Does not invoke `nasm`/`gcc` — see the `main` binary for that.
pub fn compile_file(path: &std::path::Path, config: &CompilerConfig) -> Result<String> {
    let source = std::fs::read_to_string(path).map_err(|e| CompileError::Syntax {
        line: 0,
        message: format!("could not read '{}': {}", path.display(), e),
    })?;
    compile_source(&source, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_program() {
        let asm = compile_source("int main() { return 0; }", &CompilerConfig::default()).unwrap();
        assert!(asm.contains("main:"));
    }

    #[test]
    fn surfaces_type_errors() {
        let err = compile_source("int main() { x = 1; return 0; }", &CompilerConfig::default())
            .unwrap_err();
        assert_eq!(err.class_name(), "UndeclaredVariable");
    }

    #[test]
    fn disabling_const_expr_still_compiles() {
        let cfg = CompilerConfig {
            peephole: true,
            const_expr: false,
        };
        let asm = compile_source(
            "int main() { if (true) { printInt(1); } return 0; }",
            &cfg,
        )
        .unwrap();
        assert!(asm.contains("main:"));
    }

    #[test]
    fn disabling_peephole_still_compiles() {
        let cfg = CompilerConfig {
            peephole: false,
            const_expr: true,
        };
        let asm = compile_source("int main() { return 0; }", &cfg).unwrap();
        assert!(asm.contains("main:"));
    }
}
