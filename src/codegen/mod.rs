//! NASM backend: turns a type-checked, folded, pruned `Program` plus its
//! `SymbolTable` and string pool into x86 assembly text.
//!
//! Split by concern rather than kept as one file, the same way a
//! single-pass backend decomposes into a structured instruction sink
//! (`writer`), per-function compile state (`state`), function framing
//! (`words`), statement and expression lowering (`statements`/
//! `expressions`), and control flow (`control_flow`) — `program` wires
//! them together.

pub mod control_flow;
pub mod expressions;
pub mod program;
pub mod state;
pub mod statements;
pub mod words;
pub mod writer;

pub use program::generate;
