//! End-to-end pipeline tests: compile source text to NASM and assert on
//! the shape of the generated instructions. `nasm`/`gcc` and actually
//! running the produced binaries are out of scope here — these check that
//! the compiler emits instructions consistent with each scenario's
//! expected behavior.

use latc::{compile_source, CompilerConfig};

#[test]
fn folds_and_emits_constant_arithmetic() {
    let asm = compile_source(
        "int main() { printInt(1 + 2 * 3); return 0; }",
        &CompilerConfig::default(),
    )
    .unwrap();
    assert!(asm.contains("mov eax, 7"));
}

#[test]
fn string_concatenation_calls_runtime_concat() {
    let src = r#"
        string greet(string name) {
            return "hello " + name;
        }
        int main() {
            printString(greet("world"));
            return 0;
        }
    "#;
    let asm = compile_source(src, &CompilerConfig::default()).unwrap();
    assert!(asm.contains("call _concat"));
}

#[test]
fn virtual_dispatch_through_vtable() {
    let src = r#"
        class A {
            int f() { return 1; }
        }
        class B extends A {
            int f() { return 2; }
        }
        int main() {
            A x;
            x = new B;
            printInt(x.f());
            return 0;
        }
    "#;
    let asm = compile_source(src, &CompilerConfig::default()).unwrap();
    assert!(asm.contains("B_vtable: dd B__f"));
    assert!(asm.contains("A_vtable: dd A__f"));
    assert!(asm.contains("B__f:"));
    // Dispatch is indirect through the loaded vtable pointer, not a
    // direct call to a statically chosen label.
    assert!(asm.contains("call [ecx"));
}

#[test]
fn while_loop_counts_with_a_back_edge() {
    let src = r#"
        int main() {
            int i;
            i = 0;
            while (i < 10) {
                printInt(i);
                i++;
            }
            return 0;
        }
    "#;
    let asm = compile_source(src, &CompilerConfig::default()).unwrap();
    assert!(asm.contains(".Lwhile_start"));
    assert!(asm.contains(".Lwhile_end"));
}

#[test]
fn recursive_factorial_calls_itself() {
    let src = r#"
        int factorial(int n) {
            if (n <= 1) {
                return 1;
            }
            return n * factorial(n - 1);
        }
        int main() {
            printInt(factorial(5));
            return 0;
        }
    "#;
    let asm = compile_source(src, &CompilerConfig::default()).unwrap();
    assert!(asm.contains("call factorial"));
}

#[test]
fn dead_branch_is_pruned_when_const_expr_enabled() {
    let src = r#"
        int main() {
            if (true) {
                printInt(1);
            } else {
                printInt(999);
            }
            return 0;
        }
    "#;
    let pruned = compile_source(src, &CompilerConfig::default()).unwrap();
    assert!(pruned.contains("mov eax, 1"));
    assert!(!pruned.contains("999"));

    let cfg = CompilerConfig {
        peephole: true,
        const_expr: false,
    };
    let unpruned = compile_source(src, &cfg).unwrap();
    assert!(unpruned.contains("999"));
}

#[test]
fn method_receiver_is_pushed_as_implicit_first_argument() {
    let src = r#"
        class Counter {
            int value;
            int add(int n) { return self.value + n; }
        }
        int main() {
            Counter c;
            c = new Counter;
            printInt(c.add(5));
            return 0;
        }
    "#;
    let asm = compile_source(src, &CompilerConfig::default()).unwrap();
    // One argument plus the implicit receiver cleans up 2*4 = 8 bytes.
    assert!(asm.contains("add esp, 8"));
}
