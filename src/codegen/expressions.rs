//! Expression code generation: every function here leaves its result in
//! `EAX` and clobbers `ECX`/`EDX` freely, matching the register discipline
//! the rest of this backend assumes (nothing survives an expression
//! evaluation in a register across statement boundaries).
//!
//! Binary operators share one evaluation order regardless of which
//! operator it is: left into `EAX`, spilled to the stack, right into
//! `EAX`, left reloaded into `ECX`. Multiplication and division then
//! rearrange from that fixed `ECX=left, EAX=right` layout into whatever
//! each instruction actually needs, rather than each operator picking its
//! own evaluation order.

use crate::ast::{BinOp, Expr, ExprKind, Type, UnOp};
use crate::codegen::state::FnState;
use crate::codegen::writer::{AsmWriter, Insn, Operand, Reg};
use crate::symbols::OrderedMap;

pub fn gen_expr(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    expr: &Expr,
) {
    match &expr.kind {
        ExprKind::IntLit(n) => w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(*n))),
        ExprKind::BoolLit(b) => {
            w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(*b as i32)))
        }
        ExprKind::StrLit(s) => {
            let label = strings
                .get(s)
                .expect("every string literal was collected before codegen")
                .clone();
            w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Label(label)));
        }
        ExprKind::NullLit(_) => w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(0))),
        ExprKind::SelfExpr => gen_ident(w, fs, "self"),
        ExprKind::Ident(name) => gen_ident(w, fs, name),
        ExprKind::Unary(UnOp::Neg, inner) => {
            gen_expr(w, fs, strings, inner);
            w.emit(Insn::Neg(Operand::reg(Reg::Eax)));
        }
        ExprKind::Unary(UnOp::Not, inner) => {
            gen_expr(w, fs, strings, inner);
            w.emit(Insn::Xor(Operand::reg(Reg::Eax), Operand::Imm(1)));
        }
        ExprKind::Binary(op, lhs, rhs) => gen_binary(w, fs, strings, *op, lhs, rhs),
        ExprKind::And(lhs, rhs) => gen_and(w, fs, strings, lhs, rhs),
        ExprKind::Or(lhs, rhs) => gen_or(w, fs, strings, lhs, rhs),
        ExprKind::New(class_name) => gen_new(w, fs, class_name),
        ExprKind::Call { name, args } => gen_call(w, fs, strings, name, args),
        ExprKind::MethodCall { recv, name, args } => gen_method_call(w, fs, strings, recv, name, args),
        ExprKind::Attr { recv, name } => gen_attr_read(w, fs, strings, recv, name),
    }
}

fn gen_ident(w: &mut AsmWriter, fs: &mut FnState, name: &str) {
    if let Some(offset) = fs.vars.resolve(name) {
        w.emit(Insn::Mov(
            Operand::reg(Reg::Eax),
            Operand::mem(Reg::Ebp, offset),
        ));
        return;
    }
    // Not a local: must be an implicit `self.<name>` field read.
    let class_name = fs
        .current_class
        .expect("unresolved identifier outside a method cannot reach codegen");
    let class = fs.symbols.classes.get(&class_name.to_string()).unwrap();
    let field = class
        .field(name)
        .unwrap_or_else(|| panic!("field '{}' missing after type checking", name));
    let field_offset = field.offset;
    let self_offset = fs.vars.resolve("self").expect("method has a self slot");
    w.emit(Insn::Mov(
        Operand::reg(Reg::Eax),
        Operand::mem(Reg::Ebp, self_offset),
    ));
    w.emit(Insn::Mov(
        Operand::reg(Reg::Eax),
        Operand::mem(Reg::Eax, 4 + field_offset),
    ));
}

fn gen_new(w: &mut AsmWriter, fs: &mut FnState, class_name: &str) {
    let class = fs.symbols.classes.get(&class_name.to_string()).unwrap();
    let size = class.object_size();
    w.emit(Insn::Push(Operand::Imm(size)));
    w.emit(Insn::Call(Operand::Label("_malloc".to_string())));
    w.emit(Insn::Add(Operand::reg(Reg::Esp), Operand::Imm(4)));
    if !class.vtable.is_empty() {
        w.emit(Insn::Mov(
            Operand::mem(Reg::Eax, 0),
            Operand::Label(class.vtable_label()),
        ));
    }
}

fn gen_binary(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
) {
    if op == BinOp::Add && lhs.ty() == Type::String {
        gen_expr(w, fs, strings, lhs);
        w.emit(Insn::Push(Operand::reg(Reg::Eax)));
        gen_expr(w, fs, strings, rhs);
        w.emit(Insn::Mov(Operand::reg(Reg::Edx), Operand::reg(Reg::Eax)));
        w.emit(Insn::Pop(Operand::reg(Reg::Eax)));
        w.emit(Insn::Push(Operand::reg(Reg::Edx)));
        w.emit(Insn::Push(Operand::reg(Reg::Eax)));
        w.emit(Insn::Call(Operand::Label("_concat".to_string())));
        w.emit(Insn::Add(Operand::reg(Reg::Esp), Operand::Imm(8)));
        return;
    }
    if op.is_relational() && (lhs.ty() == Type::String || matches!(lhs.ty(), Type::Class(_))) {
        gen_string_or_object_eq(w, fs, strings, op, lhs, rhs);
        return;
    }

    gen_expr(w, fs, strings, lhs);
    w.emit(Insn::Push(Operand::reg(Reg::Eax)));
    gen_expr(w, fs, strings, rhs);
    w.emit(Insn::Pop(Operand::reg(Reg::Ecx)));
    // From here: ECX = left, EAX = right, for every operator uniformly.

    match op {
        BinOp::Add => w.emit(Insn::Add(Operand::reg(Reg::Eax), Operand::reg(Reg::Ecx))),
        BinOp::Sub => {
            w.emit(Insn::Sub(Operand::reg(Reg::Ecx), Operand::reg(Reg::Eax)));
            w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::reg(Reg::Ecx)));
        }
        BinOp::Mul => w.emit(Insn::IMul(Operand::reg(Reg::Eax), Operand::reg(Reg::Ecx))),
        BinOp::Div => {
            w.emit(Insn::Xchg(Operand::reg(Reg::Eax), Operand::reg(Reg::Ecx)));
            w.emit(Insn::Cdq);
            w.emit(Insn::Idiv(Operand::reg(Reg::Ecx)));
        }
        BinOp::Mod => {
            w.emit(Insn::Xchg(Operand::reg(Reg::Eax), Operand::reg(Reg::Ecx)));
            w.emit(Insn::Cdq);
            w.emit(Insn::Idiv(Operand::reg(Reg::Ecx)));
            w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::reg(Reg::Edx)));
        }
        _ => gen_int_compare(w, op),
    }
}

fn gen_int_compare(w: &mut AsmWriter, op: BinOp) {
    // ECX = left, EAX = right: compare in that order so jl/jg etc. read
    // naturally as "left < right".
    w.emit(Insn::Cmp(Operand::reg(Reg::Ecx), Operand::reg(Reg::Eax)));
    let true_label = w.fresh_label("cmp_true");
    let end_label = w.fresh_label("cmp_end");
    let jump = match op {
        BinOp::Lt => Insn::Jl(true_label.clone()),
        BinOp::Le => Insn::Jle(true_label.clone()),
        BinOp::Gt => Insn::Jg(true_label.clone()),
        BinOp::Ge => Insn::Jge(true_label.clone()),
        BinOp::Eq => Insn::Je(true_label.clone()),
        BinOp::Ne => Insn::Jne(true_label.clone()),
        _ => unreachable!("non-comparison operator reached gen_int_compare"),
    };
    w.emit(jump);
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(0)));
    w.emit(Insn::Jmp(end_label.clone()));
    w.label(true_label);
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(1)));
    w.label(end_label);
}

fn gen_string_or_object_eq(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
) {
    if lhs.ty() == Type::String {
        gen_expr(w, fs, strings, lhs);
        w.emit(Insn::Push(Operand::reg(Reg::Eax)));
        gen_expr(w, fs, strings, rhs);
        w.emit(Insn::Mov(Operand::reg(Reg::Edx), Operand::reg(Reg::Eax)));
        w.emit(Insn::Pop(Operand::reg(Reg::Eax)));
        w.emit(Insn::Push(Operand::reg(Reg::Edx)));
        w.emit(Insn::Push(Operand::reg(Reg::Eax)));
        w.emit(Insn::Call(Operand::Label("_str_equal".to_string())));
        w.emit(Insn::Add(Operand::reg(Reg::Esp), Operand::Imm(8)));
        if op == BinOp::Ne {
            w.emit(Insn::Xor(Operand::reg(Reg::Eax), Operand::Imm(1)));
        }
        return;
    }
    // Object identity: pointer comparison, same jump-based scheme as ints.
    gen_expr(w, fs, strings, lhs);
    w.emit(Insn::Push(Operand::reg(Reg::Eax)));
    gen_expr(w, fs, strings, rhs);
    w.emit(Insn::Pop(Operand::reg(Reg::Ecx)));
    gen_int_compare(w, op);
}

fn gen_and(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    lhs: &Expr,
    rhs: &Expr,
) {
    let false_label = w.fresh_label("and_false");
    let end_label = w.fresh_label("and_end");
    gen_expr(w, fs, strings, lhs);
    w.emit(Insn::Cmp(Operand::reg(Reg::Eax), Operand::Imm(0)));
    w.emit(Insn::Je(false_label.clone()));
    gen_expr(w, fs, strings, rhs);
    w.emit(Insn::Cmp(Operand::reg(Reg::Eax), Operand::Imm(0)));
    w.emit(Insn::Je(false_label.clone()));
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(1)));
    w.emit(Insn::Jmp(end_label.clone()));
    w.label(false_label);
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(0)));
    w.label(end_label);
}

fn gen_or(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    lhs: &Expr,
    rhs: &Expr,
) {
    let true_label = w.fresh_label("or_true");
    let end_label = w.fresh_label("or_end");
    gen_expr(w, fs, strings, lhs);
    w.emit(Insn::Cmp(Operand::reg(Reg::Eax), Operand::Imm(0)));
    w.emit(Insn::Jne(true_label.clone()));
    gen_expr(w, fs, strings, rhs);
    w.emit(Insn::Cmp(Operand::reg(Reg::Eax), Operand::Imm(0)));
    w.emit(Insn::Jne(true_label.clone()));
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(0)));
    w.emit(Insn::Jmp(end_label.clone()));
    w.label(true_label);
    w.emit(Insn::Mov(Operand::reg(Reg::Eax), Operand::Imm(1)));
    w.label(end_label);
}

/// Top-level call or implicit-`self` virtual call — resolved the same way
/// the type checker resolves it: a same-named method on the current class
/// wins over a top-level function.
fn gen_call(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    name: &str,
    args: &[Expr],
) {
    if let Some(class_name) = fs.current_class {
        let class = fs.symbols.classes.get(&class_name.to_string()).unwrap();
        if let Some(method) = class.methods.get(&name.to_string()) {
            let slot = method.slot;
            for arg in args.iter().rev() {
                gen_expr(w, fs, strings, arg);
                w.emit(Insn::Push(Operand::reg(Reg::Eax)));
            }
            let self_offset = fs.vars.resolve("self").expect("method has a self slot");
            w.emit(Insn::Mov(
                Operand::reg(Reg::Eax),
                Operand::mem(Reg::Ebp, self_offset),
            ));
            w.emit(Insn::Push(Operand::reg(Reg::Eax)));
            w.emit(Insn::Mov(
                Operand::reg(Reg::Ecx),
                Operand::mem(Reg::Eax, 0),
            ));
            w.emit(Insn::CallIndirect(Operand::mem(Reg::Ecx, 4 * slot as i32)));
            w.emit(Insn::Add(
                Operand::reg(Reg::Esp),
                Operand::Imm(4 * (1 + args.len() as i32)),
            ));
            return;
        }
    }
    for arg in args.iter().rev() {
        gen_expr(w, fs, strings, arg);
        w.emit(Insn::Push(Operand::reg(Reg::Eax)));
    }
    w.emit(Insn::Call(Operand::Label(name.to_string())));
    if !args.is_empty() {
        w.emit(Insn::Add(
            Operand::reg(Reg::Esp),
            Operand::Imm(4 * args.len() as i32),
        ));
    }
}

fn gen_method_call(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    recv: &Expr,
    name: &str,
    args: &[Expr],
) {
    let Type::Class(class_name) = recv.ty() else {
        unreachable!("method call receiver is always a class type after type checking")
    };
    let class = fs.symbols.classes.get(&class_name).unwrap();
    let slot = class.methods.get(&name.to_string()).unwrap().slot;

    for arg in args.iter().rev() {
        gen_expr(w, fs, strings, arg);
        w.emit(Insn::Push(Operand::reg(Reg::Eax)));
    }
    // The receiver is evaluated last, after every argument, and pushed as
    // the implicit first argument — the original backend this is modeled
    // on skips this step entirely and dispatches through whatever was
    // last left in EAX, which is simply wrong.
    gen_expr(w, fs, strings, recv);
    w.emit(Insn::Push(Operand::reg(Reg::Eax)));
    w.emit(Insn::Mov(Operand::reg(Reg::Ecx), Operand::mem(Reg::Eax, 0)));
    w.emit(Insn::CallIndirect(Operand::mem(Reg::Ecx, 4 * slot as i32)));
    w.emit(Insn::Add(
        Operand::reg(Reg::Esp),
        Operand::Imm(4 * (1 + args.len() as i32)),
    ));
}

fn gen_attr_read(
    w: &mut AsmWriter,
    fs: &mut FnState,
    strings: &OrderedMap<String, String>,
    recv: &Expr,
    name: &str,
) {
    let Type::Class(class_name) = recv.ty() else {
        unreachable!("attribute access receiver is always a class type after type checking")
    };
    let field_offset = fs
        .symbols
        .classes
        .get(&class_name)
        .unwrap()
        .field(name)
        .unwrap()
        .offset;
    gen_expr(w, fs, strings, recv);
    w.emit(Insn::Mov(
        Operand::reg(Reg::Eax),
        Operand::mem(Reg::Eax, 4 + field_offset),
    ));
}
