//! Program-wide symbol table: class hierarchy, flattened field layout,
//! virtual dispatch tables, and top-level function signatures.
//!
//! Built once from the parsed `Program` by `SymbolTable::load`, then passed
//! by shared reference through every later pass. There is no mutable
//! singleton or thread-local here: each pass that needs symbol information
//! takes `&SymbolTable` as a parameter.

use std::collections::HashMap;

use crate::ast::{Program, Type};
use crate::errors::{CompileError, Result};

/// Insertion-ordered map: a parallel `Vec` for iteration order plus a
/// `HashMap` index for lookup, standing in for Python's reliance on
/// `OrderedDict` insertion order (class declaration order matters for
/// field layout and vtable slot assignment).
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    order: Vec<K>,
    index: HashMap<K, usize>,
    values: Vec<V>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        OrderedMap {
            order: Vec::new(),
            index: HashMap::new(),
            values: Vec::new(),
        }
    }
}

impl<K: std::hash::Hash + Eq + Clone, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        OrderedMap {
            order: Vec::new(),
            index: HashMap::new(),
            values: Vec::new(),
        }
    }

    /// Inserts, or overwrites in place if the key already exists (keeping
    /// its original position).
    pub fn insert(&mut self, key: K, value: V) {
        if let Some(&i) = self.index.get(&key) {
            self.values[i] = value;
        } else {
            self.index.insert(key.clone(), self.order.len());
            self.order.push(key);
            self.values.push(value);
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.values[i])
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order.iter().zip(self.values.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub ty: Type,
    /// Byte offset from the start of the object, past the vtable pointer
    /// slot. Parent fields come first (flattened single-inheritance
    /// layout).
    pub offset: i32,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Type>,
    /// The class that defines (or most-derivedly overrides) this method.
    pub defining_class: String,
    /// Index into the class's vtable, stable across overriding.
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub name: String,
    pub parent: Option<String>,
    /// Flattened field list: ancestors first, in declaration order.
    pub fields: Vec<FieldInfo>,
    /// (method-name, defining-class) in vtable slot order.
    pub vtable: Vec<(String, String)>,
    /// method-name -> info, including inherited and overridden entries.
    pub methods: OrderedMap<String, MethodInfo>,
}

impl ClassInfo {
    pub fn object_size(&self) -> i32 {
        // +4 for the vtable pointer at offset 0.
        4 + self.fields.len() as i32 * 4
    }

    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn vtable_label(&self) -> String {
        format!("{}_vtable", self.name)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Type>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    pub classes: OrderedMap<String, ClassInfo>,
    pub functions: OrderedMap<String, FunctionInfo>,
}

impl SymbolTable {
    /// Two-phase scan: first register every class/function name and
    /// top-level signature (so forward references typecheck), then compute
    /// field layouts and vtables, which need the full class set to walk
    /// ancestor chains.
    pub fn load(program: &Program) -> Result<Self> {
        let mut table = SymbolTable::default();
        register_builtins(&mut table);

        for func in &program.functions {
            if func.name == "self" {
                return Err(CompileError::Syntax {
                    line: func.line,
                    message: "'self' is a reserved word".to_string(),
                });
            }
            if table.functions.contains_key(&func.name) {
                return Err(CompileError::FunctionRedeclaration {
                    line: func.line,
                    message: format!("function '{}' already declared (or shadows a built-in)", func.name),
                });
            }
            table.functions.insert(
                func.name.clone(),
                FunctionInfo {
                    name: func.name.clone(),
                    ret_type: func.ret_type.clone(),
                    params: func.params.iter().map(|p| p.ty.clone()).collect(),
                },
            );
        }

        let mut raw_classes: HashMap<String, &crate::ast::ClassDef> = HashMap::new();
        for class in &program.classes {
            if raw_classes.contains_key(&class.name) {
                return Err(CompileError::ClassRedeclaration {
                    line: class.line,
                    message: format!("class '{}' already declared", class.name),
                });
            }
            raw_classes.insert(class.name.clone(), class);
        }

        for class in &program.classes {
            if let Some(parent) = &class.parent {
                if !raw_classes.contains_key(parent) {
                    return Err(CompileError::UndeclaredClass {
                        line: class.line,
                        message: format!(
                            "class '{}' extends undeclared class '{}'",
                            class.name, parent
                        ),
                    });
                }
            }
        }
        check_no_inheritance_cycles(&raw_classes)?;

        // Build in an order where every parent is built before its
        // children, so field offsets and vtables can be inherited directly.
        let build_order = topological_class_order(&raw_classes);
        for name in build_order {
            let class = raw_classes[&name];
            let info = build_class_info(class, &table.classes)?;
            table.classes.insert(name, info);
        }

        Ok(table)
    }

    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        let mut cur = sub.to_string();
        while let Some(info) = self.classes.get(&cur) {
            match &info.parent {
                Some(p) if p == sup => return true,
                Some(p) => cur = p.clone(),
                None => return false,
            }
        }
        false
    }

    /// `S <: T` per the assignment/argument/return compatibility rule:
    /// generic types require identity, class types allow upcasting, and
    /// `null` (typed as its declared class) is compatible with any of its
    /// ancestors.
    pub fn is_subtype(&self, sub: &Type, sup: &Type) -> bool {
        match (sub, sup) {
            (a, b) if a == b => true,
            (Type::Class(s), Type::Class(t)) => self.is_subclass(s, t),
            _ => false,
        }
    }
}

/// The runtime's fixed I/O and allocation-failure surface: always in
/// scope, not declared by any program, backed by `runtime_stub`'s C
/// implementations at link time.
fn register_builtins(table: &mut SymbolTable) {
    let builtins: [(&str, Type, &[Type]); 5] = [
        ("printInt", Type::Void, &[Type::Int]),
        ("printString", Type::Void, &[Type::String]),
        ("error", Type::Void, &[]),
        ("readInt", Type::Int, &[]),
        ("readString", Type::String, &[]),
    ];
    for (name, ret_type, params) in builtins {
        table.functions.insert(
            name.to_string(),
            FunctionInfo {
                name: name.to_string(),
                ret_type,
                params: params.to_vec(),
            },
        );
    }
}

fn check_no_inheritance_cycles(
    classes: &HashMap<String, &crate::ast::ClassDef>,
) -> Result<()> {
    for class in classes.values() {
        let mut seen = vec![class.name.clone()];
        let mut cur = class.parent.clone();
        while let Some(name) = cur {
            if seen.contains(&name) {
                return Err(CompileError::CyclicInheritance {
                    line: class.line,
                    message: format!("cyclic inheritance involving class '{}'", class.name),
                });
            }
            seen.push(name.clone());
            cur = classes.get(&name).and_then(|c| c.parent.clone());
        }
    }
    Ok(())
}

fn topological_class_order(classes: &HashMap<String, &crate::ast::ClassDef>) -> Vec<String> {
    let mut order = Vec::new();
    let mut done = std::collections::HashSet::new();

    fn visit(
        name: &str,
        classes: &HashMap<String, &crate::ast::ClassDef>,
        done: &mut std::collections::HashSet<String>,
        order: &mut Vec<String>,
    ) {
        if done.contains(name) {
            return;
        }
        if let Some(class) = classes.get(name) {
            if let Some(parent) = &class.parent {
                visit(parent, classes, done, order);
            }
            done.insert(name.to_string());
            order.push(name.to_string());
        }
    }

    // Preserve declaration order among independent roots by iterating
    // the HashMap's keys sorted by... nothing stable is available here,
    // so classes without a stated mutual order simply don't interleave
    // observably (only the ancestor-before-descendant constraint matters
    // downstream).
    let mut names: Vec<&String> = classes.keys().collect();
    names.sort();
    for name in names {
        visit(name, classes, &mut done, &mut order);
    }
    order
}

fn build_class_info(
    class: &crate::ast::ClassDef,
    built: &OrderedMap<String, ClassInfo>,
) -> Result<ClassInfo> {
    let mut fields = Vec::new();
    let mut vtable: Vec<(String, String)> = Vec::new();
    let mut methods: OrderedMap<String, MethodInfo> = OrderedMap::new();

    if let Some(parent_name) = &class.parent {
        let parent = built
            .get(parent_name)
            .expect("parent class built before child in topological order");
        fields = parent.fields.clone();
        vtable = parent.vtable.clone();
        for (name, info) in parent.methods.iter() {
            methods.insert(name.clone(), info.clone());
        }
    }

    let mut next_offset = fields.len() as i32 * 4;
    for field in &class.fields {
        if fields.iter().any(|f| f.name == field.name) {
            return Err(CompileError::VariableRedeclaration {
                line: field.line,
                message: format!(
                    "field '{}' already declared in an ancestor of class '{}'",
                    field.name, class.name
                ),
            });
        }
        fields.push(FieldInfo {
            name: field.name.clone(),
            ty: field.ty.clone(),
            offset: next_offset,
        });
        next_offset += 4;
    }

    for method in &class.methods {
        let param_types: Vec<Type> = method.params.iter().map(|p| p.ty.clone()).collect();
        if let Some(existing) = methods.get(&method.name) {
            if existing.defining_class == class.name {
                return Err(CompileError::FunctionRedeclaration {
                    line: method.line,
                    message: format!(
                        "method '{}' already declared in class '{}'",
                        method.name, class.name
                    ),
                });
            }
            // Override: same slot, same name, new defining class.
            let slot = existing.slot;
            vtable[slot] = (method.name.clone(), class.name.clone());
            methods.insert(
                method.name.clone(),
                MethodInfo {
                    name: method.name.clone(),
                    ret_type: method.ret_type.clone(),
                    params: param_types,
                    defining_class: class.name.clone(),
                    slot,
                },
            );
        } else {
            let slot = vtable.len();
            vtable.push((method.name.clone(), class.name.clone()));
            methods.insert(
                method.name.clone(),
                MethodInfo {
                    name: method.name.clone(),
                    ret_type: method.ret_type.clone(),
                    params: param_types,
                    defining_class: class.name.clone(),
                    slot,
                },
            );
        }
    }

    Ok(ClassInfo {
        name: class.name.clone(),
        parent: class.parent.clone(),
        fields,
        vtable,
        methods,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn flattens_inherited_fields_parent_first() {
        let prog = parse("class A { int x; } class B extends A { int y; }").unwrap();
        let table = SymbolTable::load(&prog).unwrap();
        let b = table.classes.get(&"B".to_string()).unwrap();
        assert_eq!(b.fields.len(), 2);
        assert_eq!(b.fields[0].name, "x");
        assert_eq!(b.fields[0].offset, 0);
        assert_eq!(b.fields[1].name, "y");
        assert_eq!(b.fields[1].offset, 4);
    }

    #[test]
    fn override_keeps_stable_slot() {
        let prog = parse(
            "class A { int f() { return 1; } } \
             class B extends A { int f() { return 2; } }",
        )
        .unwrap();
        let table = SymbolTable::load(&prog).unwrap();
        let a = table.classes.get(&"A".to_string()).unwrap();
        let b = table.classes.get(&"B".to_string()).unwrap();
        assert_eq!(a.vtable[0].0, "f");
        assert_eq!(b.vtable[0].0, "f");
        assert_eq!(a.vtable[0].1, "A");
        assert_eq!(b.vtable[0].1, "B");
        assert_eq!(a.methods.get(&"f".to_string()).unwrap().slot, 0);
        assert_eq!(b.methods.get(&"f".to_string()).unwrap().slot, 0);
    }

    #[test]
    fn vtable_label_is_class_underscore_method() {
        let prog = parse("class A { int f() { return 1; } }").unwrap();
        let table = SymbolTable::load(&prog).unwrap();
        let a = table.classes.get(&"A".to_string()).unwrap();
        assert_eq!(a.vtable[0], ("f".to_string(), "A".to_string()));
    }

    #[test]
    fn detects_cyclic_inheritance() {
        let prog = parse("class A extends B { } class B extends A { }").unwrap();
        let err = SymbolTable::load(&prog).unwrap_err();
        assert_eq!(err.class_name(), "CyclicInheritance");
    }

    #[test]
    fn detects_undeclared_parent() {
        let prog = parse("class A extends Ghost { }").unwrap();
        let err = SymbolTable::load(&prog).unwrap_err();
        assert_eq!(err.class_name(), "UndeclaredClass");
    }

    #[test]
    fn is_subtype_allows_upcast() {
        let prog = parse("class A { } class B extends A { }").unwrap();
        let table = SymbolTable::load(&prog).unwrap();
        assert!(table.is_subtype(&Type::Class("B".to_string()), &Type::Class("A".to_string())));
        assert!(!table.is_subtype(&Type::Class("A".to_string()), &Type::Class("B".to_string())));
    }
}
