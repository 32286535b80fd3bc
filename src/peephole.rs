//! Structured peephole optimizer.
//!
//! Operates directly on `AsmLine`/`Insn`/`Operand` values — never on
//! rendered text — so a rule like "does this operand touch EAX" is a
//! `match`, not a substring search. Each rule is a single forward scan
//! that never looks across a label (a jump could land there, so adjacency
//! across one isn't safe to assume) and never across a comment either,
//! though codegen never emits comments between real instructions.
//!
//! The six rules run in a fixed order; the "mov A,B then mov B,A" rule
//! runs twice — once early, once again at the end — since later rules can
//! expose a fresh instance of the pattern they didn't create themselves.

use crate::codegen::writer::{AsmLine, Insn, Operand};

pub fn optimize(lines: &mut Vec<AsmLine>) {
    mov_ab_ba(lines);
    mov_eax_c_mem_eax(lines);
    mov_ab_xd_ba(lines);
    mov_ab_ac(lines);
    mov_ab_ab(lines);
    jmp_lbl_lbl(lines);
    mov_ab_ba(lines);
}

fn is_boundary(line: &AsmLine) -> bool {
    !matches!(line, AsmLine::Insn(_))
}

fn insn_at(lines: &[AsmLine], i: usize) -> Option<&Insn> {
    match lines.get(i) {
        Some(AsmLine::Insn(insn)) => Some(insn),
        _ => None,
    }
}

/// `mov A,B` immediately followed by `mov B,A` — the second move is
/// redundant, `A` already holds the value that was just read out of `B`.
fn mov_ab_ba(lines: &mut Vec<AsmLine>) {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if let (Some(Insn::Mov(a1, b1)), Some(Insn::Mov(b2, a2))) =
            (insn_at(lines, i), insn_at(lines, i + 1))
        {
            if a1 == a2 && b1 == b2 && a1 != b1 {
                out.push(lines[i].clone());
                i += 2;
                continue;
            }
        }
        out.push(lines[i].clone());
        i += 1;
    }
    *lines = out;
}

/// `mov A,B` immediately followed by another `mov A,B` — the second store
/// writes a value already there.
fn mov_ab_ab(lines: &mut Vec<AsmLine>) {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if let (Some(Insn::Mov(a1, b1)), Some(Insn::Mov(a2, b2))) =
            (insn_at(lines, i), insn_at(lines, i + 1))
        {
            if a1 == a2 && b1 == b2 {
                out.push(lines[i].clone());
                i += 2;
                continue;
            }
        }
        out.push(lines[i].clone());
        i += 1;
    }
    *lines = out;
}

/// `mov A,B` immediately followed by `mov A,C` with the same destination:
/// the first store is dead, nothing ever read `A` in between.
fn mov_ab_ac(lines: &mut Vec<AsmLine>) {
    let mut out: Vec<AsmLine> = Vec::with_capacity(lines.len());
    for line in lines.drain(..) {
        if let AsmLine::Insn(Insn::Mov(a2, _)) = &line {
            if let Some(AsmLine::Insn(Insn::Mov(a1, _))) = out.last() {
                if a1 == a2 {
                    out.pop();
                }
            }
        }
        out.push(line);
    }
    *lines = out;
}

/// `mov A,B` ; X ; `mov B,A`, where `X` is a single instruction that reads
/// or writes neither `A` nor `B` — same redundancy as `mov_ab_ba`, just
/// with one unrelated instruction separating the pair.
fn mov_ab_xd_ba(lines: &mut Vec<AsmLine>) {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if let (Some(Insn::Mov(a1, b1)), Some(x), Some(Insn::Mov(b2, a2))) =
            (insn_at(lines, i), insn_at(lines, i + 1), insn_at(lines, i + 2))
        {
            let independent = operand_regs(a1)
                .into_iter()
                .chain(operand_regs(b1))
                .all(|r| !insn_touches(x, r));
            if a1 == a2 && b1 == b2 && a1 != b1 && independent {
                out.push(lines[i].clone());
                out.push(lines[i + 1].clone());
                i += 3;
                continue;
            }
        }
        out.push(lines[i].clone());
        i += 1;
    }
    *lines = out;
}

/// `mov eax, C` immediately followed by `mov [mem], eax`, where `mem`
/// doesn't read `eax` for its own addressing: store `C` directly and drop
/// the detour through `eax`.
fn mov_eax_c_mem_eax(lines: &mut Vec<AsmLine>) {
    use crate::codegen::writer::Reg;
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if let (Some(Insn::Mov(dst1, src)), Some(Insn::Mov(dst2, src2))) =
            (insn_at(lines, i), insn_at(lines, i + 1))
        {
            let is_eax = |op: &Operand| matches!(op, Operand::Reg(Reg::Eax));
            if is_eax(dst1)
                && is_eax(src2)
                && matches!(dst2, Operand::Mem { base, .. } if *base != Reg::Eax)
                && !matches!(src, Operand::Mem { .. })
            {
                out.push(AsmLine::Insn(Insn::Mov(dst2.clone(), src.clone())));
                i += 2;
                continue;
            }
        }
        out.push(lines[i].clone());
        i += 1;
    }
    *lines = out;
}

/// An unconditional `jmp L` immediately followed by the label `L:` it
/// targets — control already falls through there.
fn jmp_lbl_lbl(lines: &mut Vec<AsmLine>) {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if let (AsmLine::Insn(Insn::Jmp(target)), Some(AsmLine::Label(label))) =
            (&lines[i], lines.get(i + 1))
        {
            if target == label {
                i += 1;
                continue;
            }
        }
        out.push(lines[i].clone());
        i += 1;
    }
    *lines = out;
}

fn operand_regs(op: &Operand) -> Vec<crate::codegen::writer::Reg> {
    match op {
        Operand::Reg(r) => vec![*r],
        Operand::Mem { base, .. } => vec![*base],
        Operand::Imm(_) | Operand::Label(_) => vec![],
    }
}

fn insn_touches(insn: &Insn, reg: crate::codegen::writer::Reg) -> bool {
    match insn {
        Insn::Mov(a, b)
        | Insn::Add(a, b)
        | Insn::Sub(a, b)
        | Insn::IMul(a, b)
        | Insn::Xor(a, b)
        | Insn::Xchg(a, b)
        | Insn::Cmp(a, b) => a.touches(reg) || b.touches(reg),
        Insn::Idiv(a) | Insn::Neg(a) | Insn::Push(a) | Insn::Pop(a) | Insn::Call(a) | Insn::CallIndirect(a) => {
            a.touches(reg)
        }
        Insn::Cdq => matches!(reg, crate::codegen::writer::Reg::Eax | crate::codegen::writer::Reg::Edx),
        Insn::Jmp(_)
        | Insn::Je(_)
        | Insn::Jne(_)
        | Insn::Jl(_)
        | Insn::Jle(_)
        | Insn::Jg(_)
        | Insn::Jge(_)
        | Insn::Ret => false,
        Insn::Leave => matches!(
            reg,
            crate::codegen::writer::Reg::Esp | crate::codegen::writer::Reg::Ebp
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::writer::Reg;

    fn mov(a: Operand, b: Operand) -> AsmLine {
        AsmLine::Insn(Insn::Mov(a, b))
    }

    #[test]
    fn mov_ab_ba_drops_redundant_reverse_move() {
        let mut lines = vec![
            mov(Operand::reg(Reg::Eax), Operand::reg(Reg::Ecx)),
            mov(Operand::reg(Reg::Ecx), Operand::reg(Reg::Eax)),
        ];
        mov_ab_ba(&mut lines);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn mov_ab_ab_drops_duplicate_store() {
        let mut lines = vec![
            mov(Operand::reg(Reg::Eax), Operand::Imm(1)),
            mov(Operand::reg(Reg::Eax), Operand::Imm(1)),
        ];
        mov_ab_ab(&mut lines);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn mov_ab_ac_drops_dead_first_store() {
        let mut lines = vec![
            mov(Operand::reg(Reg::Eax), Operand::Imm(1)),
            mov(Operand::reg(Reg::Eax), Operand::Imm(2)),
        ];
        mov_ab_ac(&mut lines);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], mov(Operand::reg(Reg::Eax), Operand::Imm(2)));
    }

    #[test]
    fn jmp_lbl_lbl_drops_jump_to_next_label() {
        let mut lines = vec![
            AsmLine::Insn(Insn::Jmp("L1".to_string())),
            AsmLine::Label("L1".to_string()),
        ];
        jmp_lbl_lbl(&mut lines);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn does_not_merge_across_a_label() {
        let mut lines = vec![
            mov(Operand::reg(Reg::Eax), Operand::reg(Reg::Ecx)),
            AsmLine::Label("L1".to_string()),
            mov(Operand::reg(Reg::Ecx), Operand::reg(Reg::Eax)),
        ];
        mov_ab_ba(&mut lines);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn optimize_runs_without_panicking_on_empty_input() {
        let mut lines = Vec::new();
        optimize(&mut lines);
        assert!(lines.is_empty());
    }
}
