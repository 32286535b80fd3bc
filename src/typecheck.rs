//! Semantic analyzer: resolves every name, checks every type rule, and
//! annotates each `Expr` node's `static_type` cell so later passes (the
//! constant evaluator, the code generator) never have to re-derive it.
//!
//! Scoping is an explicit stack of `HashMap<String, Type>` frames pushed
//! and popped around each block, rather than mutable fields on a visitor
//! struct threaded through every method — the struct only needs to carry
//! state that outlives a single function body (the symbol table, and which
//! class/function we're currently inside).

use std::collections::HashMap;

use crate::ast::*;
use crate::errors::{CompileError, Result};
use crate::symbols::SymbolTable;

pub fn check(program: &Program, symbols: &SymbolTable) -> Result<()> {
    check_main_present(symbols)?;
    check_all_types_resolve(program, symbols)?;
    check_overrides(program, symbols)?;

    for func in &program.functions {
        let mut checker = FunctionChecker::new(symbols, None, &func.ret_type);
        checker.check_function(func)?;
    }
    for class in &program.classes {
        for method in &class.methods {
            let mut checker = FunctionChecker::new(symbols, Some(&class.name), &method.ret_type);
            checker.check_function(method)?;
        }
    }
    Ok(())
}

fn check_main_present(symbols: &SymbolTable) -> Result<()> {
    match symbols.functions.get(&"main".to_string()) {
        Some(main) if main.ret_type == Type::Int && main.params.is_empty() => Ok(()),
        Some(main) => Err(CompileError::MissingMainFunction {
            line: 0,
            message: format!(
                "'main' must take no arguments and return int, found {} params returning {}",
                main.params.len(),
                main.ret_type
            ),
        }),
        None => Err(CompileError::MissingMainFunction {
            line: 0,
            message: "no 'main' function declared".to_string(),
        }),
    }
}

fn resolvable(ty: &Type, symbols: &SymbolTable) -> bool {
    match ty {
        Type::Class(name) => symbols.classes.contains_key(name),
        _ => true,
    }
}

fn check_all_types_resolve(program: &Program, symbols: &SymbolTable) -> Result<()> {
    for func in &program.functions {
        check_signature_types(func, symbols)?;
    }
    for class in &program.classes {
        for field in &class.fields {
            if !resolvable(&field.ty, symbols) {
                return Err(CompileError::UnknownType {
                    line: field.line,
                    message: format!("field '{}' has unknown type {}", field.name, field.ty),
                });
            }
        }
        for method in &class.methods {
            check_signature_types(method, symbols)?;
        }
    }
    Ok(())
}

fn check_signature_types(func: &FunctionDef, symbols: &SymbolTable) -> Result<()> {
    if func.ret_type != Type::Void && !resolvable(&func.ret_type, symbols) {
        return Err(CompileError::UnknownReturnType {
            line: func.line,
            message: format!(
                "function '{}' has unknown return type {}",
                func.name, func.ret_type
            ),
        });
    }
    for param in &func.params {
        if param.ty == Type::Void || !resolvable(&param.ty, symbols) {
            return Err(CompileError::UnknownArgumentType {
                line: func.line,
                message: format!(
                    "function '{}' has unknown parameter type {} for '{}'",
                    func.name, param.ty, param.name
                ),
            });
        }
    }
    Ok(())
}

/// An override must keep the parameter types invariant and let the return
/// type narrow under `<:` (a method overriding to return a more specific
/// class is fine; the caller only ever sees the declared type anyway).
fn check_overrides(program: &Program, symbols: &SymbolTable) -> Result<()> {
    for class in &program.classes {
        let Some(parent_name) = &class.parent else {
            continue;
        };
        let Some(parent) = symbols.classes.get(parent_name) else {
            continue;
        };
        for method in &class.methods {
            let Some(parent_method) = parent.methods.get(&method.name) else {
                continue;
            };
            let params_match = method.params.len() == parent_method.params.len()
                && method
                    .params
                    .iter()
                    .zip(parent_method.params.iter())
                    .all(|(p, q)| p.ty == *q);
            let ret_ok = symbols.is_subtype(&method.ret_type, &parent_method.ret_type);
            if !params_match || !ret_ok {
                return Err(CompileError::BadOverride {
                    line: method.line,
                    message: format!(
                        "method '{}' in class '{}' does not match the signature it overrides",
                        method.name, class.name
                    ),
                });
            }
        }
    }
    Ok(())
}

struct FunctionChecker<'a> {
    symbols: &'a SymbolTable,
    current_class: Option<&'a str>,
    ret_type: &'a Type,
    scopes: Vec<HashMap<String, Type>>,
}

impl<'a> FunctionChecker<'a> {
    fn new(symbols: &'a SymbolTable, current_class: Option<&'a str>, ret_type: &'a Type) -> Self {
        FunctionChecker {
            symbols,
            current_class,
            ret_type,
            scopes: Vec::new(),
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare_local(&mut self, name: &str, ty: Type, line: usize) -> Result<()> {
        let frame = self.scopes.last_mut().expect("scope stack never empty while checking a body");
        if frame.contains_key(name) {
            return Err(CompileError::VariableRedeclaration {
                line,
                message: format!("variable '{}' already declared in this scope", name),
            });
        }
        frame.insert(name.to_string(), ty);
        Ok(())
    }

    fn lookup_local(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|frame| frame.get(name))
    }

    fn current_class_info(&self) -> Option<&'a crate::symbols::ClassInfo> {
        self.current_class.and_then(|c| self.symbols.classes.get(&c.to_string()))
    }

    fn check_function(&mut self, func: &FunctionDef) -> Result<()> {
        self.push_scope();
        for param in &func.params {
            self.declare_local(&param.name, param.ty.clone(), func.line)?;
        }
        self.check_block(&func.body)?;
        self.pop_scope();
        Ok(())
    }

    fn check_block(&mut self, block: &Block) -> Result<()> {
        self.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt)?;
        }
        self.pop_scope();
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Empty => Ok(()),
            Stmt::Block(b) => self.check_block(b),
            Stmt::Decl { ty, items, line } => {
                if !resolvable(ty, self.symbols) || *ty == Type::Void {
                    return Err(CompileError::UnknownType {
                        line: *line,
                        message: format!("unknown declared type {}", ty),
                    });
                }
                for item in items {
                    if let Some(init) = &item.init {
                        let init_ty = self.check_expr(init)?;
                        if !self.symbols.is_subtype(&init_ty, ty) {
                            return Err(CompileError::TypeMismatch {
                                line: item.line,
                                message: format!(
                                    "cannot initialize '{}' of type {} with value of type {}",
                                    item.name, ty, init_ty
                                ),
                            });
                        }
                    }
                    self.declare_local(&item.name, ty.clone(), item.line)?;
                }
                Ok(())
            }
            Stmt::Assign { name, expr, line } => {
                let rhs_ty = self.check_expr(expr)?;
                let target_ty = self.resolve_assignable(name, *line)?;
                if !self.symbols.is_subtype(&rhs_ty, &target_ty) {
                    return Err(CompileError::TypeMismatch {
                        line: *line,
                        message: format!(
                            "cannot assign value of type {} to '{}' of type {}",
                            rhs_ty, name, target_ty
                        ),
                    });
                }
                Ok(())
            }
            Stmt::AttrAssign {
                recv,
                field,
                expr,
                line,
            } => {
                let field_ty = self.check_attr_access(recv, field, *line)?;
                let rhs_ty = self.check_expr(expr)?;
                if !self.symbols.is_subtype(&rhs_ty, &field_ty) {
                    return Err(CompileError::TypeMismatch {
                        line: *line,
                        message: format!(
                            "cannot assign value of type {} to field '{}' of type {}",
                            rhs_ty, field, field_ty
                        ),
                    });
                }
                Ok(())
            }
            Stmt::Incr { name, line } | Stmt::Decr { name, line } => {
                let ty = self.resolve_assignable(name, *line)?;
                if ty != Type::Int {
                    return Err(CompileError::UnsupportedOperand {
                        line: *line,
                        message: format!("'{}' is not of type int", name),
                    });
                }
                Ok(())
            }
            Stmt::AttrIncr { recv, field, line } | Stmt::AttrDecr { recv, field, line } => {
                let ty = self.check_attr_access(recv, field, *line)?;
                if ty != Type::Int {
                    return Err(CompileError::UnsupportedOperand {
                        line: *line,
                        message: format!("field '{}' is not of type int", field),
                    });
                }
                Ok(())
            }
            Stmt::Return { expr, line } => {
                match (expr, self.ret_type) {
                    (None, Type::Void) => Ok(()),
                    (None, other) => Err(CompileError::InvalidReturnType {
                        line: *line,
                        message: format!("missing return value of type {}", other),
                    }),
                    (Some(e), _) => {
                        let ty = self.check_expr(e)?;
                        if !self.symbols.is_subtype(&ty, self.ret_type) {
                            return Err(CompileError::InvalidReturnType {
                                line: *line,
                                message: format!(
                                    "returned {} does not match declared return type {}",
                                    ty, self.ret_type
                                ),
                            });
                        }
                        Ok(())
                    }
                }
            }
            Stmt::Cond {
                cond,
                then_branch,
                line,
            } => {
                self.check_condition(cond, *line)?;
                self.check_stmt(then_branch)
            }
            Stmt::CondElse {
                cond,
                then_branch,
                else_branch,
                line,
            } => {
                self.check_condition(cond, *line)?;
                self.check_stmt(then_branch)?;
                self.check_stmt(else_branch)
            }
            Stmt::While { cond, body, line } => {
                self.check_condition(cond, *line)?;
                self.check_stmt(body)
            }
            Stmt::ExprStmt { expr, .. } => {
                self.check_expr(expr)?;
                Ok(())
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr, line: usize) -> Result<()> {
        let ty = self.check_expr(cond)?;
        if ty != Type::Boolean {
            return Err(CompileError::BadCondition {
                line,
                message: format!("condition has type {}, expected boolean", ty),
            });
        }
        Ok(())
    }

    /// Resolves a bare name used as an assignment/incr/decr target: a local
    /// variable shadows a same-named field, matching ordinary lexical
    /// scoping; only once no local matches do we look for an implicit
    /// `self.<name>`.
    fn resolve_assignable(&self, name: &str, line: usize) -> Result<Type> {
        if let Some(ty) = self.lookup_local(name) {
            return Ok(ty.clone());
        }
        if let Some(class) = self.current_class_info() {
            if let Some(field) = class.field(name) {
                return Ok(field.ty.clone());
            }
        }
        Err(CompileError::UndeclaredVariable {
            line,
            message: format!("undeclared variable '{}'", name),
        })
    }

    fn check_attr_access(&mut self, recv: &Expr, field: &str, line: usize) -> Result<Type> {
        let recv_ty = self.check_expr(recv)?;
        let Type::Class(class_name) = &recv_ty else {
            return Err(CompileError::InvalidReference {
                line,
                message: format!("cannot access field '{}' on non-object type {}", field, recv_ty),
            });
        };
        let class = self.symbols.classes.get(class_name).ok_or_else(|| CompileError::UndeclaredClass {
            line,
            message: format!("unknown class '{}'", class_name),
        })?;
        class
            .field(field)
            .map(|f| f.ty.clone())
            .ok_or_else(|| CompileError::MissingAttribute {
                line,
                message: format!("class '{}' has no field '{}'", class_name, field),
            })
    }

    /// Type-checks `expr`, stamps its resolved type into its `static_type`
    /// cell, and returns that type.
    fn check_expr(&mut self, expr: &Expr) -> Result<Type> {
        let ty = self.check_expr_kind(expr)?;
        expr.set_ty(ty.clone());
        Ok(ty)
    }

    fn check_expr_kind(&mut self, expr: &Expr) -> Result<Type> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::IntLit(_) => Ok(Type::Int),
            ExprKind::BoolLit(_) => Ok(Type::Boolean),
            ExprKind::StrLit(_) => Ok(Type::String),
            ExprKind::NullLit(class_name) => {
                if !self.symbols.classes.contains_key(class_name) {
                    return Err(CompileError::UndeclaredClass {
                        line,
                        message: format!("unknown class '{}' in null cast", class_name),
                    });
                }
                Ok(Type::Class(class_name.clone()))
            }
            ExprKind::SelfExpr => {
                let class_name = self.current_class.ok_or_else(|| CompileError::InvalidReference {
                    line,
                    message: "'self' used outside of a method".to_string(),
                })?;
                Ok(Type::Class(class_name.to_string()))
            }
            ExprKind::Ident(name) => {
                if let Some(ty) = self.lookup_local(name) {
                    return Ok(ty.clone());
                }
                if let Some(class) = self.current_class_info() {
                    if let Some(field) = class.field(name) {
                        return Ok(field.ty.clone());
                    }
                }
                Err(CompileError::UndeclaredVariable {
                    line,
                    message: format!("undeclared variable '{}'", name),
                })
            }
            ExprKind::Unary(op, inner) => {
                let inner_ty = self.check_expr(inner)?;
                match (op, &inner_ty) {
                    (UnOp::Neg, Type::Int) => Ok(Type::Int),
                    (UnOp::Not, Type::Boolean) => Ok(Type::Boolean),
                    _ => Err(CompileError::UnsupportedOperand {
                        line,
                        message: format!("unary operator not defined for type {}", inner_ty),
                    }),
                }
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let lhs_ty = self.check_expr(lhs)?;
                let rhs_ty = self.check_expr(rhs)?;
                self.check_binary(*op, &lhs_ty, &rhs_ty, line)
            }
            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                let lhs_ty = self.check_expr(lhs)?;
                let rhs_ty = self.check_expr(rhs)?;
                if lhs_ty != Type::Boolean || rhs_ty != Type::Boolean {
                    return Err(CompileError::UnsupportedOperand {
                        line,
                        message: "'&&'/'||' require boolean operands".to_string(),
                    });
                }
                Ok(Type::Boolean)
            }
            ExprKind::New(class_name) => {
                if !self.symbols.classes.contains_key(class_name) {
                    return Err(CompileError::UndeclaredClass {
                        line,
                        message: format!("cannot instantiate undeclared class '{}'", class_name),
                    });
                }
                Ok(Type::Class(class_name.clone()))
            }
            ExprKind::Call { name, args } => self.check_call(name, args, line),
            ExprKind::MethodCall { recv, name, args } => {
                let recv_ty = self.check_expr(recv)?;
                let Type::Class(class_name) = &recv_ty else {
                    return Err(CompileError::InvalidReference {
                        line,
                        message: format!("cannot call method on non-object type {}", recv_ty),
                    });
                };
                let class = self.symbols.classes.get(class_name).ok_or_else(|| CompileError::UndeclaredClass {
                    line,
                    message: format!("unknown class '{}'", class_name),
                })?;
                let method = class.methods.get(name).ok_or_else(|| CompileError::UndeclaredFunction {
                    line,
                    message: format!("class '{}' has no method '{}'", class_name, name),
                })?;
                let param_types = method.params.clone();
                let ret_type = method.ret_type.clone();
                self.check_args(&param_types, args, name, line)?;
                Ok(ret_type)
            }
            ExprKind::Attr { recv, name } => self.check_attr_access(recv, name, line),
        }
    }

    fn check_binary(&self, op: BinOp, lhs: &Type, rhs: &Type, line: usize) -> Result<Type> {
        if op.is_additive() && op == BinOp::Add && *lhs == Type::String && *rhs == Type::String {
            return Ok(Type::String);
        }
        if op.is_additive() || op.is_multiplicative() {
            if *lhs == Type::Int && *rhs == Type::Int {
                return Ok(Type::Int);
            }
            return Err(CompileError::UnsupportedOperand {
                line,
                message: format!("operator not defined for types {} and {}", lhs, rhs),
            });
        }
        if op.is_relational() {
            match op {
                BinOp::Eq | BinOp::Ne => {
                    if lhs == rhs
                        || (matches!(lhs, Type::Class(_)) && matches!(rhs, Type::Class(_)))
                    {
                        Ok(Type::Boolean)
                    } else {
                        Err(CompileError::UnsupportedOperand {
                            line,
                            message: format!("cannot compare {} and {}", lhs, rhs),
                        })
                    }
                }
                _ => {
                    if *lhs == Type::Int && *rhs == Type::Int {
                        Ok(Type::Boolean)
                    } else {
                        Err(CompileError::UnsupportedOperand {
                            line,
                            message: format!("ordering operator needs int operands, got {} and {}", lhs, rhs),
                        })
                    }
                }
            }
        } else {
            unreachable!("BinOp is always additive, multiplicative, or relational")
        }
    }

    fn check_call(&mut self, name: &str, args: &[Expr], line: usize) -> Result<Type> {
        // Implicit-self precedence: inside a method, a same-named method on
        // the current class (or an ancestor) wins over a top-level
        // function of the same name.
        if let Some(class) = self.current_class_info() {
            if let Some(method) = class.methods.get(&name.to_string()) {
                let param_types = method.params.clone();
                let ret_type = method.ret_type.clone();
                self.check_args(&param_types, args, name, line)?;
                return Ok(ret_type);
            }
        }
        let func = self
            .symbols
            .functions
            .get(&name.to_string())
            .ok_or_else(|| CompileError::UndeclaredFunction {
                line,
                message: format!("undeclared function '{}'", name),
            })?;
        let param_types = func.params.clone();
        let ret_type = func.ret_type.clone();
        self.check_args(&param_types, args, name, line)?;
        Ok(ret_type)
    }

    fn check_args(&mut self, param_types: &[Type], args: &[Expr], name: &str, line: usize) -> Result<()> {
        if param_types.len() != args.len() {
            return Err(CompileError::ArgumentMismatch {
                line,
                message: format!(
                    "'{}' expects {} argument(s), got {}",
                    name,
                    param_types.len(),
                    args.len()
                ),
            });
        }
        for (param_ty, arg) in param_types.iter().zip(args.iter()) {
            let arg_ty = self.check_expr(arg)?;
            if !self.symbols.is_subtype(&arg_ty, param_ty) {
                return Err(CompileError::ArgumentMismatch {
                    line,
                    message: format!(
                        "'{}' expects argument of type {}, got {}",
                        name, param_ty, arg_ty
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn run(src: &str) -> Result<()> {
        let prog = parse(src).unwrap();
        let symbols = SymbolTable::load(&prog).unwrap();
        check(&prog, &symbols)
    }

    #[test]
    fn accepts_simple_main() {
        assert!(run("int main() { return 0; }").is_ok());
    }

    #[test]
    fn rejects_missing_main() {
        let err = run("int foo() { return 0; }").unwrap_err();
        assert_eq!(err.class_name(), "MissingMainFunction");
    }

    #[test]
    fn rejects_undeclared_variable() {
        let err = run("int main() { x = 1; return 0; }").unwrap_err();
        assert_eq!(err.class_name(), "UndeclaredVariable");
    }

    #[test]
    fn rejects_condition_type_mismatch() {
        let err = run("int main() { if (1) { } return 0; }").unwrap_err();
        assert_eq!(err.class_name(), "BadCondition");
    }

    #[test]
    fn allows_subtype_return() {
        let src = "class A { } class B extends A { } \
                   A make() { B b; b = new B; return b; } \
                   int main() { return 0; }";
        assert!(run(src).is_ok());
    }

    #[test]
    fn rejects_supertype_return() {
        let src = "class A { } class B extends A { } \
                   B make() { A a; a = new A; return a; } \
                   int main() { return 0; }";
        let err = run(src).unwrap_err();
        assert_eq!(err.class_name(), "InvalidReturnType");
    }

    #[test]
    fn implicit_self_prefers_method_over_function() {
        let src = "class A { int f() { return 1; } int g() { return self.f(); } } \
                   int f() { return 2; } \
                   int main() { return 0; }";
        assert!(run(src).is_ok());
    }

    #[test]
    fn rejects_bad_override_signature() {
        let src = "class A { int f(int x) { return x; } } \
                   class B extends A { boolean f(int x) { return true; } } \
                   int main() { return 0; }";
        let err = run(src).unwrap_err();
        assert_eq!(err.class_name(), "BadOverride");
    }
}
