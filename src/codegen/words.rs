//! Function prologue/epilogue generation — "words" in the sense of one
//! complete callable unit of generated code, top-level function or method.

use crate::ast::{FunctionDef, Param, Type};
use crate::codegen::state::FnState;
use crate::codegen::statements::gen_block;
use crate::codegen::writer::{AsmWriter, Insn, Operand, Reg};
use crate::symbols::{OrderedMap, SymbolTable};

/// Methods are labeled `<class>__<method>`; top-level functions keep their
/// bare name.
pub fn function_label(class_name: Option<&str>, func_name: &str) -> String {
    match class_name {
        Some(class) => format!("{}__{}", class, func_name),
        None => func_name.to_string(),
    }
}

pub fn gen_function(
    w: &mut AsmWriter,
    symbols: &SymbolTable,
    current_class: Option<&str>,
    func: &FunctionDef,
    strings: &OrderedMap<String, String>,
) {
    let label = function_label(current_class, &func.name);
    let epilogue_label = w.fresh_label("epilogue");

    let mut full_params = Vec::with_capacity(func.params.len() + 1);
    if let Some(class_name) = current_class {
        full_params.push(Param {
            name: "self".to_string(),
            ty: Type::Class(class_name.to_string()),
        });
    }
    full_params.extend(func.params.iter().cloned());

    let mut fs = FnState::new(symbols, current_class, &full_params, epilogue_label.clone());

    w.label(label);
    w.emit(Insn::Push(Operand::reg(Reg::Ebp)));
    w.emit(Insn::Mov(Operand::reg(Reg::Ebp), Operand::reg(Reg::Esp)));
    let frame_bytes = 4 * func.locals_count.get() as i32;
    if frame_bytes > 0 {
        w.emit(Insn::Sub(Operand::reg(Reg::Esp), Operand::Imm(frame_bytes)));
    }

    gen_block(w, &mut fs, strings, &func.body);

    w.label(epilogue_label);
    w.emit(Insn::Leave);
    w.emit(Insn::Ret);
}
