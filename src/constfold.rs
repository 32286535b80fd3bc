//! Constant evaluator and AST pruner.
//!
//! Two separate, ordered steps:
//!
//! 1. `evaluate_program` walks every expression in every function/method
//!    body and stamps a `const_value` onto each `Expr` node it can fold.
//!    This always runs — stage 4 (reachability) needs to see through
//!    folded `while(true)`/`if(true)` conditions regardless of whether
//!    pruning is enabled.
//! 2. `prune_program` rewrites the tree in place using the values stage 1
//!    computed: dead `if`/`while` branches are dropped, and declaration
//!    initializers, bare assignment right-hand sides, and call arguments
//!    are replaced by literal nodes. This step only runs when pruning is
//!    enabled in the compiler configuration.
//!
//! Folding is eager on both operands of `&&`/`||` (unlike a short-circuit
//! interpreter): `f() && false` still evaluates and folds `f()`'s constant
//! shape if `f` itself reduces to one, since this is a compile-time
//! constant pass, not a runtime evaluator.
//!
//! Attribute-assignment right-hand sides (`e.f = v;`) are deliberately
//! never pruned, even when folded to a constant — fields are not known to
//! be free of aliasing at this point in the pipeline, so only the narrower
//! set of targets below is touched.

use crate::ast::*;
use crate::errors::{CompileError, Result};

pub fn evaluate_program(program: &Program) -> Result<()> {
    for func in &program.functions {
        evaluate_block(&func.body)?;
    }
    for class in &program.classes {
        for method in &class.methods {
            evaluate_block(&method.body)?;
        }
    }
    Ok(())
}

fn evaluate_block(block: &Block) -> Result<()> {
    for stmt in &block.stmts {
        evaluate_stmt(stmt)?;
    }
    Ok(())
}

fn evaluate_stmt(stmt: &Stmt) -> Result<()> {
    match stmt {
        Stmt::Empty | Stmt::Incr { .. } | Stmt::Decr { .. } | Stmt::AttrIncr { .. } | Stmt::AttrDecr { .. } => Ok(()),
        Stmt::Block(b) => evaluate_block(b),
        Stmt::Decl { items, .. } => {
            for item in items {
                if let Some(init) = &item.init {
                    evaluate_expr(init)?;
                }
            }
            Ok(())
        }
        Stmt::Assign { expr, .. } => {
            evaluate_expr(expr)?;
            Ok(())
        }
        Stmt::AttrAssign { recv, expr, .. } => {
            evaluate_expr(recv)?;
            evaluate_expr(expr)?;
            Ok(())
        }
        Stmt::Return { expr, .. } => {
            if let Some(e) = expr {
                evaluate_expr(e)?;
            }
            Ok(())
        }
        Stmt::Cond {
            cond, then_branch, ..
        } => {
            evaluate_expr(cond)?;
            evaluate_stmt(then_branch)
        }
        Stmt::CondElse {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            evaluate_expr(cond)?;
            evaluate_stmt(then_branch)?;
            evaluate_stmt(else_branch)
        }
        Stmt::While { cond, body, .. } => {
            evaluate_expr(cond)?;
            evaluate_stmt(body)
        }
        Stmt::ExprStmt { expr, .. } => {
            evaluate_expr(expr)?;
            Ok(())
        }
    }
}

/// Recursively folds `expr`, stamping its `const_value` cell, and returns
/// the folded value (also `None` if not foldable).
fn evaluate_expr(expr: &Expr) -> Result<Option<ConstValue>> {
    let value = evaluate_expr_kind(expr)?;
    expr.set_const_val(value.clone());
    Ok(value)
}

fn evaluate_expr_kind(expr: &Expr) -> Result<Option<ConstValue>> {
    let line = expr.line;
    match &expr.kind {
        ExprKind::IntLit(n) => Ok(Some(ConstValue::Int(*n))),
        ExprKind::BoolLit(b) => Ok(Some(ConstValue::Bool(*b))),
        ExprKind::StrLit(s) => Ok(Some(ConstValue::Str(s.clone()))),
        ExprKind::NullLit(_) | ExprKind::Ident(_) | ExprKind::SelfExpr | ExprKind::New(_) => {
            Ok(None)
        }
        ExprKind::Unary(op, inner) => {
            let inner_val = evaluate_expr(inner)?;
            Ok(match (op, inner_val) {
                (UnOp::Neg, Some(ConstValue::Int(n))) => Some(ConstValue::Int(n.wrapping_neg())),
                (UnOp::Not, Some(ConstValue::Bool(b))) => Some(ConstValue::Bool(!b)),
                _ => None,
            })
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let lhs_val = evaluate_expr(lhs)?;
            let rhs_val = evaluate_expr(rhs)?;
            fold_binary(*op, lhs_val, rhs_val, line)
        }
        ExprKind::And(lhs, rhs) => {
            let lhs_val = evaluate_expr(lhs)?;
            let rhs_val = evaluate_expr(rhs)?;
            Ok(match (lhs_val, rhs_val) {
                (Some(ConstValue::Bool(a)), Some(ConstValue::Bool(b))) => {
                    Some(ConstValue::Bool(a && b))
                }
                (Some(ConstValue::Bool(false)), _) => Some(ConstValue::Bool(false)),
                (_, Some(ConstValue::Bool(false))) => Some(ConstValue::Bool(false)),
                _ => None,
            })
        }
        ExprKind::Or(lhs, rhs) => {
            let lhs_val = evaluate_expr(lhs)?;
            let rhs_val = evaluate_expr(rhs)?;
            Ok(match (lhs_val, rhs_val) {
                (Some(ConstValue::Bool(a)), Some(ConstValue::Bool(b))) => {
                    Some(ConstValue::Bool(a || b))
                }
                (Some(ConstValue::Bool(true)), _) => Some(ConstValue::Bool(true)),
                (_, Some(ConstValue::Bool(true))) => Some(ConstValue::Bool(true)),
                _ => None,
            })
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                evaluate_expr(arg)?;
            }
            Ok(None)
        }
        ExprKind::MethodCall { recv, args, .. } => {
            evaluate_expr(recv)?;
            for arg in args {
                evaluate_expr(arg)?;
            }
            Ok(None)
        }
        ExprKind::Attr { recv, .. } => {
            evaluate_expr(recv)?;
            Ok(None)
        }
    }
}

fn fold_binary(
    op: BinOp,
    lhs: Option<ConstValue>,
    rhs: Option<ConstValue>,
    line: usize,
) -> Result<Option<ConstValue>> {
    use ConstValue::*;
    Ok(match (op, lhs, rhs) {
        (BinOp::Add, Some(Int(a)), Some(Int(b))) => Some(Int(a.wrapping_add(b))),
        (BinOp::Add, Some(Str(a)), Some(Str(b))) => Some(Str(a + &b)),
        (BinOp::Sub, Some(Int(a)), Some(Int(b))) => Some(Int(a.wrapping_sub(b))),
        (BinOp::Mul, Some(Int(a)), Some(Int(b))) => Some(Int(a.wrapping_mul(b))),
        (BinOp::Div, Some(Int(_)), Some(Int(0))) => {
            return Err(CompileError::ZeroDivision {
                line,
                message: "division by constant zero".to_string(),
            });
        }
        (BinOp::Div, Some(Int(a)), Some(Int(b))) => Some(Int(a.wrapping_div(b))),
        (BinOp::Mod, Some(Int(_)), Some(Int(0))) => {
            return Err(CompileError::ZeroDivision {
                line,
                message: "modulo by constant zero".to_string(),
            });
        }
        (BinOp::Mod, Some(Int(a)), Some(Int(b))) => Some(Int(a.wrapping_rem(b))),
        (BinOp::Lt, Some(Int(a)), Some(Int(b))) => Some(Bool(a < b)),
        (BinOp::Le, Some(Int(a)), Some(Int(b))) => Some(Bool(a <= b)),
        (BinOp::Gt, Some(Int(a)), Some(Int(b))) => Some(Bool(a > b)),
        (BinOp::Ge, Some(Int(a)), Some(Int(b))) => Some(Bool(a >= b)),
        (BinOp::Eq, Some(Int(a)), Some(Int(b))) => Some(Bool(a == b)),
        (BinOp::Ne, Some(Int(a)), Some(Int(b))) => Some(Bool(a != b)),
        (BinOp::Eq, Some(Bool(a)), Some(Bool(b))) => Some(Bool(a == b)),
        (BinOp::Ne, Some(Bool(a)), Some(Bool(b))) => Some(Bool(a != b)),
        (BinOp::Eq, Some(Str(a)), Some(Str(b))) => Some(Bool(a == b)),
        (BinOp::Ne, Some(Str(a)), Some(Str(b))) => Some(Bool(a != b)),
        _ => None,
    })
}

fn literal_expr_from(value: &ConstValue, line: usize) -> Expr {
    let kind = match value {
        ConstValue::Int(n) => ExprKind::IntLit(*n),
        ConstValue::Bool(b) => ExprKind::BoolLit(*b),
        ConstValue::Str(s) => ExprKind::StrLit(s.clone()),
    };
    let literal = Expr::new(kind, line);
    literal.set_const_val(Some(value.clone()));
    literal.set_ty(match value {
        ConstValue::Int(_) => Type::Int,
        ConstValue::Bool(_) => Type::Boolean,
        ConstValue::Str(_) => Type::String,
    });
    literal
}

/// Replaces `expr` with a freshly constructed literal node if it folded to
/// a constant, leaving it untouched otherwise.
fn inline_if_const(expr: &mut Expr) {
    if let Some(value) = expr.const_val() {
        *expr = literal_expr_from(&value, expr.line);
    }
}

pub fn prune_program(program: &mut Program) {
    for func in &mut program.functions {
        prune_block(&mut func.body);
    }
    for class in &mut program.classes {
        for method in &mut class.methods {
            prune_block(&mut method.body);
        }
    }
}

fn prune_block(block: &mut Block) {
    let stmts = std::mem::take(&mut block.stmts);
    let mut kept = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        prune_into(stmt, &mut kept);
    }
    block.stmts = kept;
}

/// Prunes `stmt`, pushing zero, one (itself, rewritten), or more
/// replacement statements onto `out` — an `if`/`while` folded away
/// disappears entirely (zero), while a surviving branch of an `if` is
/// spliced in directly rather than left wrapped in a dead conditional.
fn prune_into(stmt: Stmt, out: &mut Vec<Stmt>) {
    match stmt {
        Stmt::Block(mut b) => {
            prune_block(&mut b);
            out.push(Stmt::Block(b));
        }
        Stmt::Decl { ty, mut items, line } => {
            for item in &mut items {
                if let Some(init) = &mut item.init {
                    inline_if_const(init);
                }
            }
            out.push(Stmt::Decl { ty, items, line });
        }
        Stmt::Assign { name, mut expr, line } => {
            inline_if_const(&mut expr);
            out.push(Stmt::Assign { name, expr, line });
        }
        // Deliberately not pruned: see module docs.
        Stmt::AttrAssign { recv, field, expr, line } => {
            out.push(Stmt::AttrAssign { recv, field, expr, line });
        }
        Stmt::Cond {
            cond,
            then_branch,
            line,
        } => match cond.const_val() {
            Some(ConstValue::Bool(true)) => prune_into(*then_branch, out),
            Some(ConstValue::Bool(false)) => {}
            _ => {
                let mut then_branch = then_branch;
                prune_nested(&mut then_branch);
                out.push(Stmt::Cond {
                    cond,
                    then_branch,
                    line,
                });
            }
        },
        Stmt::CondElse {
            cond,
            then_branch,
            else_branch,
            line,
        } => match cond.const_val() {
            Some(ConstValue::Bool(true)) => prune_into(*then_branch, out),
            Some(ConstValue::Bool(false)) => prune_into(*else_branch, out),
            _ => {
                let mut then_branch = then_branch;
                let mut else_branch = else_branch;
                prune_nested(&mut then_branch);
                prune_nested(&mut else_branch);
                out.push(Stmt::CondElse {
                    cond,
                    then_branch,
                    else_branch,
                    line,
                });
            }
        },
        Stmt::While { cond, body, line } => {
            if cond.const_val() == Some(ConstValue::Bool(false)) {
                return;
            }
            let mut body = body;
            prune_nested(&mut body);
            out.push(Stmt::While { cond, body, line });
        }
        Stmt::ExprStmt { mut expr, line } => {
            if let ExprKind::Call { args, .. } | ExprKind::MethodCall { args, .. } = &mut expr.kind
            {
                for arg in args {
                    inline_if_const(arg);
                }
            }
            out.push(Stmt::ExprStmt { expr, line });
        }
        other => out.push(other),
    }
}

fn prune_nested(stmt: &mut Stmt) {
    let taken = std::mem::replace(stmt, Stmt::Empty);
    let mut out = Vec::with_capacity(1);
    prune_into(taken, &mut out);
    *stmt = match out.len() {
        0 => Stmt::Empty,
        1 => out.into_iter().next().unwrap(),
        _ => Stmt::Block(Block { stmts: out }),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn folds_arithmetic() {
        let prog = parse("int main() { int x; x = 1 + 2 * 3; return x; }").unwrap();
        evaluate_program(&prog).unwrap();
        let Stmt::Assign { expr, .. } = &prog.functions[0].body.stmts[1] else {
            panic!("expected assign");
        };
        assert_eq!(expr.const_val(), Some(ConstValue::Int(7)));
    }

    #[test]
    fn zero_division_is_an_error() {
        let prog = parse("int main() { int x; x = 1 / 0; return x; }").unwrap();
        let err = evaluate_program(&prog).unwrap_err();
        assert_eq!(err.class_name(), "ZeroDivision");
    }

    #[test]
    fn prunes_dead_else_branch() {
        let mut prog =
            parse("int main() { if (true) { return 1; } else { return 2; } return 0; }").unwrap();
        evaluate_program(&prog).unwrap();
        prune_program(&mut prog);
        let stmts = &prog.functions[0].body.stmts;
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[0], Stmt::Return { .. }));
    }

    #[test]
    fn prunes_whole_false_while() {
        let mut prog = parse("int main() { while (false) { } return 0; }").unwrap();
        evaluate_program(&prog).unwrap();
        prune_program(&mut prog);
        assert_eq!(prog.functions[0].body.stmts.len(), 1);
    }

    #[test]
    fn does_not_prune_attr_assign_rhs() {
        let mut prog = parse(
            "class A { int x; } \
             int main() { A a; a = new A; a.x = 1 + 1; return 0; }",
        )
        .unwrap();
        evaluate_program(&prog).unwrap();
        prune_program(&mut prog);
        let Stmt::AttrAssign { expr, .. } = &prog.functions[0].body.stmts[2] else {
            panic!("expected attr assign");
        };
        assert!(matches!(expr.kind, ExprKind::Binary(BinOp::Add, _, _)));
    }
}
