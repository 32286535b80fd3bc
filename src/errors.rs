//! The closed compile-error taxonomy.
//!
//! Every fallible pass in the pipeline returns `Result<T, CompileError>` and
//! aborts on the first error it detects: there is no multi-error recovery.

/// One classified compile-time failure, carrying the source line it was
/// raised against (lines are 1-indexed for display, matching how the
/// lexer/parser hand them to every later pass).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Syntax { line: usize, message: String },
    MissingMainFunction { line: usize, message: String },
    UndeclaredClass { line: usize, message: String },
    ClassRedeclaration { line: usize, message: String },
    CyclicInheritance { line: usize, message: String },
    FunctionRedeclaration { line: usize, message: String },
    VariableRedeclaration { line: usize, message: String },
    UndeclaredVariable { line: usize, message: String },
    UndeclaredFunction { line: usize, message: String },
    MissingAttribute { line: usize, message: String },
    UnknownType { line: usize, message: String },
    UnknownArgumentType { line: usize, message: String },
    UnknownReturnType { line: usize, message: String },
    TypeMismatch { line: usize, message: String },
    ArgumentMismatch { line: usize, message: String },
    BadCondition { line: usize, message: String },
    BadOverride { line: usize, message: String },
    UnsupportedOperand { line: usize, message: String },
    InvalidReturnType { line: usize, message: String },
    InvalidCast { line: usize, message: String },
    InvalidReference { line: usize, message: String },
    UnreachableReturn { line: usize, message: String },
    ArraysNotImplemented { line: usize, message: String },
    ZeroDivision { line: usize, message: String },
}

impl CompileError {
    /// The name of the error's class, as printed on stdout by the driver
    /// (`"TypeMismatch at line 12: ..."`).
    pub fn class_name(&self) -> &'static str {
        use CompileError::*;
        match self {
            Syntax { .. } => "SyntaxError",
            MissingMainFunction { .. } => "MissingMainFunction",
            UndeclaredClass { .. } => "UndeclaredClass",
            ClassRedeclaration { .. } => "ClassRedeclaration",
            CyclicInheritance { .. } => "CyclicInheritance",
            FunctionRedeclaration { .. } => "FunctionRedeclaration",
            VariableRedeclaration { .. } => "VariableRedeclaration",
            UndeclaredVariable { .. } => "UndeclaredVariable",
            UndeclaredFunction { .. } => "UndeclaredFunction",
            MissingAttribute { .. } => "MissingAttribute",
            UnknownType { .. } => "UnknownType",
            UnknownArgumentType { .. } => "UnknownArgumentType",
            UnknownReturnType { .. } => "UnknownReturnType",
            TypeMismatch { .. } => "TypeMismatch",
            ArgumentMismatch { .. } => "ArgumentMismatch",
            BadCondition { .. } => "BadCondition",
            BadOverride { .. } => "BadOverride",
            UnsupportedOperand { .. } => "UnsupportedOperand",
            InvalidReturnType { .. } => "InvalidReturnType",
            InvalidCast { .. } => "InvalidCast",
            InvalidReference { .. } => "InvalidReference",
            UnreachableReturn { .. } => "UnreachableReturn",
            ArraysNotImplemented { .. } => "ArraysNotImplemented",
            ZeroDivision { .. } => "ZeroDivision",
        }
    }

    pub fn line(&self) -> usize {
        use CompileError::*;
        match self {
            Syntax { line, .. }
            | MissingMainFunction { line, .. }
            | UndeclaredClass { line, .. }
            | ClassRedeclaration { line, .. }
            | CyclicInheritance { line, .. }
            | FunctionRedeclaration { line, .. }
            | VariableRedeclaration { line, .. }
            | UndeclaredVariable { line, .. }
            | UndeclaredFunction { line, .. }
            | MissingAttribute { line, .. }
            | UnknownType { line, .. }
            | UnknownArgumentType { line, .. }
            | UnknownReturnType { line, .. }
            | TypeMismatch { line, .. }
            | ArgumentMismatch { line, .. }
            | BadCondition { line, .. }
            | BadOverride { line, .. }
            | UnsupportedOperand { line, .. }
            | InvalidReturnType { line, .. }
            | InvalidCast { line, .. }
            | InvalidReference { line, .. }
            | UnreachableReturn { line, .. }
            | ArraysNotImplemented { line, .. }
            | ZeroDivision { line, .. } => *line,
        }
    }

    fn message(&self) -> &str {
        use CompileError::*;
        match self {
            Syntax { message, .. }
            | MissingMainFunction { message, .. }
            | UndeclaredClass { message, .. }
            | ClassRedeclaration { message, .. }
            | CyclicInheritance { message, .. }
            | FunctionRedeclaration { message, .. }
            | VariableRedeclaration { message, .. }
            | UndeclaredVariable { message, .. }
            | UndeclaredFunction { message, .. }
            | MissingAttribute { message, .. }
            | UnknownType { message, .. }
            | UnknownArgumentType { message, .. }
            | UnknownReturnType { message, .. }
            | TypeMismatch { message, .. }
            | ArgumentMismatch { message, .. }
            | BadCondition { message, .. }
            | BadOverride { message, .. }
            | UnsupportedOperand { message, .. }
            | InvalidReturnType { message, .. }
            | InvalidCast { message, .. }
            | InvalidReference { message, .. }
            | UnreachableReturn { message, .. }
            | ArraysNotImplemented { message, .. }
            | ZeroDivision { message, .. } => message,
        }
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at line {}: {}",
            self.class_name(),
            self.line(),
            self.message()
        )
    }
}

impl std::error::Error for CompileError {}

pub type Result<T> = std::result::Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_driver_protocol() {
        let err = CompileError::TypeMismatch {
            line: 12,
            message: "bad".to_string(),
        };
        assert_eq!(format!("{}", err), "TypeMismatch at line 12: bad");
    }

    #[test]
    fn class_name_is_stable_per_variant() {
        let err = CompileError::ArraysNotImplemented {
            line: 1,
            message: "no arrays".to_string(),
        };
        assert_eq!(err.class_name(), "ArraysNotImplemented");
    }
}
