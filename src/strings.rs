//! String literal collector.
//!
//! Walks the whole program once, after folding, gathering every distinct
//! string literal (including ones folded from constant concatenation) into
//! a label table the assembly writer uses to emit the `.data` section.
//! Identical literal contents share one label.

use crate::ast::*;
use crate::symbols::OrderedMap;

pub fn collect(program: &Program) -> OrderedMap<String, String> {
    let mut table = OrderedMap::new();
    for func in &program.functions {
        collect_block(&func.body, &mut table);
    }
    for class in &program.classes {
        for method in &class.methods {
            collect_block(&method.body, &mut table);
        }
    }
    table
}

fn intern(value: &str, table: &mut OrderedMap<String, String>) {
    if !table.contains_key(&value.to_string()) {
        let label = format!("str{}", table.len());
        table.insert(value.to_string(), label);
    }
}

fn collect_block(block: &Block, table: &mut OrderedMap<String, String>) {
    for stmt in &block.stmts {
        collect_stmt(stmt, table);
    }
}

fn collect_stmt(stmt: &Stmt, table: &mut OrderedMap<String, String>) {
    match stmt {
        Stmt::Empty | Stmt::Incr { .. } | Stmt::Decr { .. } | Stmt::AttrIncr { .. } | Stmt::AttrDecr { .. } => {}
        Stmt::Block(b) => collect_block(b, table),
        Stmt::Decl { items, .. } => {
            for item in items {
                if let Some(init) = &item.init {
                    collect_expr(init, table);
                }
            }
        }
        Stmt::Assign { expr, .. } => collect_expr(expr, table),
        Stmt::AttrAssign { recv, expr, .. } => {
            collect_expr(recv, table);
            collect_expr(expr, table);
        }
        Stmt::Return { expr, .. } => {
            if let Some(e) = expr {
                collect_expr(e, table);
            }
        }
        Stmt::Cond {
            cond, then_branch, ..
        } => {
            collect_expr(cond, table);
            collect_stmt(then_branch, table);
        }
        Stmt::CondElse {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            collect_expr(cond, table);
            collect_stmt(then_branch, table);
            collect_stmt(else_branch, table);
        }
        Stmt::While { cond, body, .. } => {
            collect_expr(cond, table);
            collect_stmt(body, table);
        }
        Stmt::ExprStmt { expr, .. } => collect_expr(expr, table),
    }
}

fn collect_expr(expr: &Expr, table: &mut OrderedMap<String, String>) {
    // A folded constant string (e.g. `"a" + "b"`) is interned by its
    // folded value, not its subexpressions, so concatenation of literals
    // doesn't leave unused fragments behind in `.data`.
    if let Some(ConstValue::Str(s)) = expr.const_val() {
        intern(&s, table);
        return;
    }
    match &expr.kind {
        ExprKind::StrLit(s) => intern(s, table),
        ExprKind::Unary(_, inner) => collect_expr(inner, table),
        ExprKind::Binary(_, lhs, rhs) | ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
            collect_expr(lhs, table);
            collect_expr(rhs, table);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                collect_expr(arg, table);
            }
        }
        ExprKind::MethodCall { recv, args, .. } => {
            collect_expr(recv, table);
            for arg in args {
                collect_expr(arg, table);
            }
        }
        ExprKind::Attr { recv, .. } => collect_expr(recv, table),
        ExprKind::IntLit(_)
        | ExprKind::BoolLit(_)
        | ExprKind::NullLit(_)
        | ExprKind::Ident(_)
        | ExprKind::SelfExpr
        | ExprKind::New(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constfold::evaluate_program;
    use crate::parser::parse;

    #[test]
    fn dedups_identical_literals() {
        let prog = parse(
            r#"int main() { printString("hi"); printString("hi"); return 0; }"#,
        )
        .unwrap();
        let table = collect(&prog);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&"hi".to_string()), Some(&"str0".to_string()));
    }

    #[test]
    fn interns_folded_concatenation_by_value() {
        let prog = parse(
            r#"int main() { printString("a" + "b"); printString("ab"); return 0; }"#,
        )
        .unwrap();
        evaluate_program(&prog).unwrap();
        let table = collect(&prog);
        assert_eq!(table.len(), 1);
    }
}
