//! Per-function code generation state: the symbol table (shared,
//! read-only), which class (if any) the function being generated belongs
//! to, and the variable allocator tracking this function's stack slots.

use crate::locals::VariableAllocator;
use crate::symbols::SymbolTable;

pub struct FnState<'a> {
    pub symbols: &'a SymbolTable,
    pub current_class: Option<&'a str>,
    pub vars: VariableAllocator,
    /// Unique per function: every `return` jumps here instead of each
    /// duplicating the stack-teardown sequence.
    pub epilogue_label: String,
}

impl<'a> FnState<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        current_class: Option<&'a str>,
        params: &[crate::ast::Param],
        epilogue_label: String,
    ) -> Self {
        FnState {
            symbols,
            current_class,
            vars: VariableAllocator::new(params),
            epilogue_label,
        }
    }
}
