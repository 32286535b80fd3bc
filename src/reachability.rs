//! Return-reachability checker.
//!
//! Every function and method declared to return a non-`void` type must
//! return a value on every control path. This runs after constant folding
//! (stage 3) specifically so a `while (true) { ... }` loop with a folded
//! `true` condition counts as definitely returning even with no `return`
//! after it — the loop never falls through, so the function's end is
//! unreachable regardless of what the loop body does.

use crate::ast::*;
use crate::errors::{CompileError, Result};

pub fn check(program: &Program) -> Result<()> {
    for func in &program.functions {
        check_function(func)?;
    }
    for class in &program.classes {
        for method in &class.methods {
            check_function(method)?;
        }
    }
    Ok(())
}

fn check_function(func: &FunctionDef) -> Result<()> {
    if func.ret_type == Type::Void {
        return Ok(());
    }
    if !block_always_returns(&func.body) {
        return Err(CompileError::UnreachableReturn {
            line: func.line,
            message: format!(
                "function '{}' does not return a value on every path",
                func.name
            ),
        });
    }
    Ok(())
}

fn block_always_returns(block: &Block) -> bool {
    block.stmts.iter().any(stmt_always_returns)
}

fn stmt_always_returns(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => true,
        Stmt::Block(b) => block_always_returns(b),
        Stmt::CondElse {
            then_branch,
            else_branch,
            ..
        } => stmt_always_returns(then_branch) && stmt_always_returns(else_branch),
        // A bare `if` with no `else` can always fall through, even when
        // its condition folds to `true` — unlike `while`, a taken `if`
        // branch still has to rejoin control flow afterward unless it
        // itself returns on every path, which this arm already requires
        // only of the present branch, not of a synthetic empty else.
        Stmt::Cond { .. } => false,
        Stmt::While { cond, .. } => cond.const_val() == Some(ConstValue::Bool(true)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constfold::evaluate_program;
    use crate::parser::parse;

    fn run(src: &str) -> Result<()> {
        let prog = parse(src).unwrap();
        evaluate_program(&prog).unwrap();
        check(&prog)
    }

    #[test]
    fn accepts_simple_return() {
        assert!(run("int main() { return 0; }").is_ok());
    }

    #[test]
    fn rejects_missing_return_on_some_path() {
        let err = run("int f() { if (true) { return 1; } } int main() { return 0; }")
            .unwrap_err();
        assert_eq!(err.class_name(), "UnreachableReturn");
    }

    #[test]
    fn accepts_if_else_both_returning() {
        let src = "int f(boolean b) { if (b) { return 1; } else { return 2; } } \
                   int main() { return 0; }";
        assert!(run(src).is_ok());
    }

    #[test]
    fn while_true_counts_as_always_returning() {
        let src = "int f() { while (true) { } } int main() { return 0; }";
        assert!(run(src).is_ok());
    }

    #[test]
    fn while_false_does_not_count() {
        let src = "int f() { while (false) { return 1; } } int main() { return 0; }";
        let err = run(src).unwrap_err();
        assert_eq!(err.class_name(), "UnreachableReturn");
    }

    #[test]
    fn void_functions_are_exempt() {
        assert!(run("void f() { } int main() { return 0; }").is_ok());
    }
}
