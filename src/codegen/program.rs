//! Top-level code generation entry point: emits the `.data` section
//! (string pool and class vtables), then every top-level function and
//! method body, then hands the whole instruction stream to the peephole
//! optimizer before rendering.

use crate::ast::Program;
use crate::codegen::words::{function_label, gen_function};
use crate::codegen::writer::AsmWriter;
use crate::peephole;
use crate::symbols::{OrderedMap, SymbolTable};

const RUNTIME_SYMBOLS: &[&str] = &[
    "_malloc",
    "_concat",
    "_str_equal",
    "printInt",
    "printString",
    "readInt",
    "readString",
    "error",
];

pub fn generate(
    program: &Program,
    symbols: &SymbolTable,
    strings: &OrderedMap<String, String>,
    peephole_enabled: bool,
) -> String {
    let mut w = AsmWriter::new();
    w.global("main");
    for sym in RUNTIME_SYMBOLS {
        w.extern_sym(*sym);
    }

    for (content, label) in strings.iter() {
        w.add_string(label.clone(), content.clone());
    }
    for class in symbols.classes.values() {
        let entries = class
            .vtable
            .iter()
            .map(|(method_name, defining_class)| function_label(Some(defining_class), method_name))
            .collect();
        w.add_vtable(class.vtable_label(), entries);
    }

    for func in &program.functions {
        gen_function(&mut w, symbols, None, func, strings);
    }
    for class in &program.classes {
        for method in &class.methods {
            gen_function(&mut w, symbols, Some(&class.name), method, strings);
        }
    }

    if peephole_enabled {
        peephole::optimize(&mut w.lines);
    }
    w.render()
}
