//! Statement code generation.

use crate::ast::*;
use crate::codegen::control_flow;
use crate::codegen::expressions::gen_expr;
use crate::codegen::state::FnState;
use crate::codegen::writer::{AsmWriter, Insn, Operand, Reg};
use crate::symbols::OrderedMap;

pub fn gen_block(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    block: &Block,
) {
    fs.vars.enter_scope();
    for stmt in &block.stmts {
        gen_stmt(w, fs, strings, stmt);
    }
    fs.vars.leave_scope();
}

pub fn gen_stmt(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    stmt: &Stmt,
) {
    match stmt {
        Stmt::Empty => {}
        Stmt::Block(b) => gen_block(w, fs, strings, b),
        Stmt::Decl { items, .. } => {
            for item in items {
                let offset = fs.vars.declare(&item.name);
                match &item.init {
                    Some(init) => gen_expr(w, fs, strings, init),
                    // Uninitialized locals start at zero: valid for int,
                    // boolean, string (empty pointer reads as an
                    // interpreter-visible null), and object references.
                    None => w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(0))),
                }
                w.emit(Insn::Mov(Operand::mem(Reg::Ebp, offset), Operand::reg(Reg::Eax)));
            }
        }
        Stmt::Assign { name, expr, .. } => {
            gen_expr(w, fs, strings, expr);
            gen_store_name(w, fs, name);
        }
        Stmt::AttrAssign {
            recv, field, expr, ..
        } => {
            gen_expr(w, fs, strings, recv);
            w.emit(Insn::Push(Operand::reg(Reg::Eax)));
            gen_expr(w, fs, strings, expr);
            w.emit(Insn::Pop(Operand::reg(Reg::Ecx)));
            let Type::Class(class_name) = recv.ty() else {
                unreachable!("attribute assignment receiver is always a class type")
            };
            let offset = fs
                .symbols
                .classes
                .get(&class_name)
                .unwrap()
                .field(field)
                .unwrap()
                .offset;
            w.emit(Insn::Mov(Operand::mem(Reg::Ecx, 4 + offset), Operand::reg(Reg::Eax)));
        }
        Stmt::Incr { name, .. } => gen_step_name(w, fs, name, 1),
        Stmt::Decr { name, .. } => gen_step_name(w, fs, name, -1),
        Stmt::AttrIncr { recv, field, .. } => gen_step_attr(w, fs, strings, recv, field, 1),
        Stmt::AttrDecr { recv, field, .. } => gen_step_attr(w, fs, strings, recv, field, -1),
        Stmt::Return { expr, .. } => {
            if let Some(e) = expr {
                gen_expr(w, fs, strings, e);
            }
            w.emit(Insn::Jmp(fs.epilogue_label.clone()));
        }
        Stmt::Cond { .. } | Stmt::CondElse { .. } | Stmt::While { .. } => {
            control_flow::gen(w, fs, strings, stmt)
        }
        Stmt::ExprStmt { expr, .. } => gen_expr(w, fs, strings, expr),
    }
}

fn gen_store_name(w: &mut AsmWriter, fs: &mut FnState, name: &str) {
    if let Some(offset) = fs.vars.resolve(name) {
        w.emit(Insn::Mov(Operand::mem(Reg::Ebp, offset), Operand::reg(Reg::Eax)));
        return;
    }
    let class_name = fs.current_class.expect("unresolved assignment target outside a method");
    let field_offset = fs
        .symbols
        .classes
        .get(&class_name.to_string())
        .unwrap()
        .field(name)
        .unwrap()
        .offset;
    let self_offset = fs.vars.resolve("self").expect("method has a self slot");
    w.emit(Insn::Mov(Operand::reg(Reg::Ecx), Operand::reg(Reg::Eax)));
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::mem(Reg::Ebp, self_offset)));
    w.emit(Insn::Mov(Operand::mem(Reg::Eax, 4 + field_offset), Operand::reg(Reg::Ecx)));
}

fn gen_step_name(w: &mut AsmWriter, fs: &mut FnState, name: &str, delta: i32) {
    if let Some(offset) = fs.vars.resolve(name) {
        w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::mem(Reg::Ebp, offset)));
        if delta >= 0 {
            w.emit(Insn::Add(Operand::reg(Reg::Eax), Operand::Imm(delta)));
        } else {
            w.emit(Insn::Sub(Operand::reg(Reg::Eax), Operand::Imm(-delta)));
        }
        w.emit(Insn::Mov(Operand::mem(Reg::Ebp, offset), Operand::reg(Reg::Eax)));
        return;
    }
    let class_name = fs.current_class.expect("unresolved increment target outside a method");
    let field_offset = fs
        .symbols
        .classes
        .get(&class_name.to_string())
        .unwrap()
        .field(name)
        .unwrap()
        .offset;
    let self_offset = fs.vars.resolve("self").expect("method has a self slot");
    w.emit(Insn::Mov(Operand::reg(Reg::Ecx), Operand::mem(Reg::Ebp, self_offset)));
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::mem(Reg::Ecx, 4 + field_offset)));
    if delta >= 0 {
        w.emit(Insn::Add(Operand::reg(Reg::Eax), Operand::Imm(delta)));
    } else {
        w.emit(Insn::Sub(Operand::reg(Reg::Eax), Operand::Imm(-delta)));
    }
    w.emit(Insn::Mov(Operand::mem(Reg::Ecx, 4 + field_offset), Operand::reg(Reg::Eax)));
}

fn gen_step_attr(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    recv: &Expr,
    field: &str,
    delta: i32,
) {
    gen_expr(w, fs, strings, recv);
    let Type::Class(class_name) = recv.ty() else {
        unreachable!("attribute increment receiver is always a class type")
    };
    let field_offset = fs
        .symbols
        .classes
        .get(&class_name)
        .unwrap()
        .field(field)
        .unwrap()
        .offset;
    w.emit(Insn::Mov(Operand::reg(Reg::Ecx), Operand::reg(Reg::Eax)));
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::mem(Reg::Ecx, 4 + field_offset)));
    if delta >= 0 {
        w.emit(Insn::Add(Operand::reg(Reg::Eax), Operand::Imm(delta)));
    } else {
        w.emit(Insn::Sub(Operand::reg(Reg::Eax), Operand::Imm(-delta)));
    }
    w.emit(Insn::Mov(Operand::mem(Reg::Ecx, 4 + field_offset), Operand::reg(Reg::Eax)));
}
