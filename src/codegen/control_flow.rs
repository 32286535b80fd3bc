//! `if`/`if-else`/`while` code generation.

use crate::ast::Stmt;
use crate::codegen::state::FnState;
use crate::codegen::statements::gen_stmt;
use crate::codegen::expressions::gen_expr;
use crate::codegen::writer::{AsmWriter, Insn, Operand, Reg};
use crate::symbols::OrderedMap;

pub fn gen(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    stmt: &Stmt,
) {
    match stmt {
        Stmt::Cond {
            cond, then_branch, ..
        } => {
            let end_label = w.fresh_label("if_end");
            gen_expr(w, fs, strings, cond);
            w.emit(Insn::Cmp(Operand::reg(Reg::Eax), Operand::Imm(0)));
            w.emit(Insn::Je(end_label.clone()));
            gen_stmt(w, fs, strings, then_branch);
            w.label(end_label);
        }
        Stmt::CondElse {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            let else_label = w.fresh_label("if_else");
            let end_label = w.fresh_label("if_end");
            gen_expr(w, fs, strings, cond);
            w.emit(Insn::Cmp(Operand::reg(Reg::Eax), Operand::Imm(0)));
            w.emit(Insn::Je(else_label.clone()));
            gen_stmt(w, fs, strings, then_branch);
            w.emit(Insn::Jmp(end_label.clone()));
            w.label(else_label);
            gen_stmt(w, fs, strings, else_branch);
            w.label(end_label);
        }
        Stmt::While { cond, body, .. } => {
            let start_label = w.fresh_label("while_start");
            let end_label = w.fresh_label("while_end");
            w.label(start_label.clone());
            gen_expr(w, fs, strings, cond);
            w.emit(Insn::Cmp(Operand::reg(Reg::Eax), Operand::Imm(0)));
            w.emit(Insn::Je(end_label.clone()));
            gen_stmt(w, fs, strings, body);
            w.emit(Insn::Jmp(start_label));
            w.label(end_label);
        }
        other => unreachable!("gen_control_flow called on non-control-flow statement {:?}", other),
    }
}
