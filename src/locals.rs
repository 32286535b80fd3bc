//! Locals counting and stack slot allocation.
//!
//! `count_program` computes, for every function/method, the high-water
//! mark of locals simultaneously live at any point in its body — sibling
//! scopes (e.g. the two branches of an `if`, or a loop body re-entered)
//! never hold variables at the same time, so they can share slots. The
//! result is stashed on `FunctionDef::locals_count` for the code generator
//! to size the stack frame.
//!
//! `VariableAllocator` assigns each local an `EBP`-relative offset using
//! that same sharing rule, tracked as a free-offset pool: `enter_scope`
//! records which names get declared so `leave_scope` can undo exactly
//! those bindings and return their offsets to the pool, rather than
//! snapshotting and restoring the whole binding map on every scope
//! transition.

use std::collections::HashMap;

use crate::ast::{Block, FunctionDef, Param, Program, Stmt};

pub fn count_program(program: &Program) {
    for func in &program.functions {
        count_function(func);
    }
    for class in &program.classes {
        for method in &class.methods {
            count_function(method);
        }
    }
}

fn count_function(func: &FunctionDef) {
    let mut max = 0usize;
    count_stmts(&func.body.stmts, 0, &mut max);
    func.locals_count.set(max as u32);
}

fn count_stmts(stmts: &[Stmt], base: usize, max: &mut usize) {
    let mut current = base;
    for stmt in stmts {
        current = count_stmt(stmt, current, max);
    }
}

/// Returns the locals count in effect for statements that follow `stmt`
/// in the same block (a declaration grows it; anything that opens and
/// closes its own nested scope leaves it unchanged once that scope ends).
fn count_stmt(stmt: &Stmt, current: usize, max: &mut usize) -> usize {
    match stmt {
        Stmt::Decl { items, .. } => {
            let current = current + items.len();
            *max = (*max).max(current);
            current
        }
        Stmt::Block(b) => {
            count_stmts(&b.stmts, current, max);
            current
        }
        Stmt::Cond { then_branch, .. } => {
            count_stmt(then_branch, current, max);
            current
        }
        Stmt::CondElse {
            then_branch,
            else_branch,
            ..
        } => {
            count_stmt(then_branch, current, max);
            count_stmt(else_branch, current, max);
            current
        }
        Stmt::While { body, .. } => {
            count_stmt(body, current, max);
            current
        }
        _ => current,
    }
}

const WORD: i32 = 4;

/// Allocates `EBP`-relative offsets for a function's parameters and
/// locals. Parameters sit above the saved return address and frame
/// pointer at positive offsets in cdecl's right-to-left push order
/// (`[ebp+8]` is the first parameter); locals sit below `ebp` at negative
/// offsets.
pub struct VariableAllocator {
    bindings: HashMap<String, i32>,
    free_offsets: Vec<i32>,
    next_local_offset: i32,
    scopes: Vec<Vec<String>>,
}

impl VariableAllocator {
    pub fn new(params: &[Param]) -> Self {
        let mut bindings = HashMap::new();
        for (i, param) in params.iter().enumerate() {
            bindings.insert(param.name.clone(), 8 + WORD * i as i32);
        }
        VariableAllocator {
            bindings,
            free_offsets: Vec::new(),
            next_local_offset: 0,
            scopes: vec![Vec::new()],
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn leave_scope(&mut self) {
        let names = self.scopes.pop().expect("enter_scope/leave_scope imbalance");
        for name in names {
            if let Some(offset) = self.bindings.remove(&name) {
                self.free_offsets.push(offset);
            }
        }
    }

    /// Binds `name` to a fresh or reclaimed negative offset and returns it.
    pub fn declare(&mut self, name: &str) -> i32 {
        let offset = self.free_offsets.pop().unwrap_or_else(|| {
            self.next_local_offset -= WORD;
            self.next_local_offset
        });
        self.bindings.insert(name.to_string(), offset);
        self.scopes
            .last_mut()
            .expect("at least one scope always open")
            .push(name.to_string());
        offset
    }

    pub fn resolve(&self, name: &str) -> Option<i32> {
        self.bindings.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn counts_high_water_mark_across_sibling_scopes() {
        let prog = parse(
            "int main() { \
                 int a; \
                 if (true) { int b; int c; } else { int d; } \
                 return 0; \
             }",
        )
        .unwrap();
        count_program(&prog);
        // `a` (1) plus the larger sibling branch's two locals (b, c) = 3,
        // not 1 + 2 + 1 = 4.
        assert_eq!(prog.functions[0].locals_count.get(), 3);
    }

    #[test]
    fn counts_nested_block_against_enclosing_total() {
        let prog = parse("int main() { int a; { int b; } return 0; }").unwrap();
        count_program(&prog);
        assert_eq!(prog.functions[0].locals_count.get(), 2);
    }

    #[test]
    fn allocator_reuses_offsets_across_sibling_scopes() {
        let mut alloc = VariableAllocator::new(&[]);
        alloc.enter_scope();
        let a = alloc.declare("a");
        alloc.leave_scope();

        alloc.enter_scope();
        let b = alloc.declare("b");
        alloc.leave_scope();

        assert_eq!(a, b);
    }

    #[test]
    fn allocator_gives_params_positive_offsets_in_order() {
        let params = vec![
            Param {
                name: "x".to_string(),
                ty: crate::ast::Type::Int,
            },
            Param {
                name: "y".to_string(),
                ty: crate::ast::Type::Int,
            },
        ];
        let alloc = VariableAllocator::new(&params);
        assert_eq!(alloc.resolve("x"), Some(8));
        assert_eq!(alloc.resolve("y"), Some(12));
    }

    #[test]
    fn allocator_unbinds_on_leave_scope() {
        let mut alloc = VariableAllocator::new(&[]);
        alloc.enter_scope();
        alloc.declare("a");
        alloc.leave_scope();
        assert_eq!(alloc.resolve("a"), None);
    }
}
