//! Recursive-descent parser.
//!
//! Grammar (informal EBNF), ambiguity notes in the module docs below each
//! production: top-level items are classes and functions in any order; a
//! bare identifier statement `x = e;` or call `f(...)` is not resolved to
//! "local variable" vs "implicit self field/method" here — that's left to
//! the symbol table and typechecker, which have the scope information this
//! pass doesn't.

use crate::ast::*;
use crate::errors::{CompileError, Result};
use crate::lexer::{Lexer, Token, TokenKind};

pub fn parse(src: &str) -> Result<Program> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, want: &TokenKind) -> Result<()> {
        if self.peek() == want {
            self.bump();
            Ok(())
        } else {
            Err(CompileError::Syntax {
                line: self.line(),
                message: format!("expected {:?}, found {:?}", want, self.peek()),
            })
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            TokenKind::Ident(name) => Ok(name),
            other => Err(CompileError::Syntax {
                line: self.line(),
                message: format!("expected identifier, found {:?}", other),
            }),
        }
    }

    fn parse_program(&mut self) -> Result<Program> {
        let mut program = Program::default();
        while *self.peek() != TokenKind::Eof {
            if *self.peek() == TokenKind::KwClass {
                program.classes.push(self.parse_class()?);
            } else {
                program.functions.push(self.parse_function()?);
            }
        }
        Ok(program)
    }

    fn parse_type(&mut self) -> Result<Type> {
        Ok(match self.bump() {
            TokenKind::KwInt => Type::Int,
            TokenKind::KwBoolean => Type::Boolean,
            TokenKind::KwString => Type::String,
            TokenKind::KwVoid => Type::Void,
            TokenKind::Ident(name) => Type::Class(name),
            other => {
                return Err(CompileError::Syntax {
                    line: self.line(),
                    message: format!("expected a type, found {:?}", other),
                });
            }
        })
    }

    fn parse_class(&mut self) -> Result<ClassDef> {
        let line = self.line();
        self.expect(&TokenKind::KwClass)?;
        let name = self.expect_ident()?;
        let parent = if *self.peek() == TokenKind::KwExtends {
            self.bump();
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while *self.peek() != TokenKind::RBrace {
            let member_line = self.line();
            let ty = self.parse_type()?;
            let member_name = self.expect_ident()?;
            if *self.peek() == TokenKind::LParen {
                methods.push(self.parse_function_rest(ty, member_name, member_line)?);
            } else {
                self.expect(&TokenKind::Semi)?;
                fields.push(FieldDef {
                    name: member_name,
                    ty,
                    line: member_line,
                });
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(ClassDef {
            name,
            parent,
            fields,
            methods,
            line,
        })
    }

    fn parse_function(&mut self) -> Result<FunctionDef> {
        let line = self.line();
        let ret_type = self.parse_type()?;
        let name = self.expect_ident()?;
        self.parse_function_rest(ret_type, name, line)
    }

    fn parse_function_rest(
        &mut self,
        ret_type: Type,
        name: String,
        line: usize,
    ) -> Result<FunctionDef> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if *self.peek() != TokenKind::RParen {
            loop {
                let ty = self.parse_type()?;
                let pname = self.expect_ident()?;
                params.push(Param { name: pname, ty });
                if *self.peek() == TokenKind::Comma {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(FunctionDef {
            name,
            ret_type,
            params,
            body,
            line,
            locals_count: std::cell::Cell::new(0),
        })
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while *self.peek() != TokenKind::RBrace {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Block { stmts })
    }

    /// A type keyword always starts a declaration; a class-typed
    /// declaration is ambiguous with a bare identifier-led statement only
    /// in that both start with `Ident`, so we peek two tokens ahead.
    fn at_decl_start(&self) -> bool {
        match self.peek() {
            TokenKind::KwInt | TokenKind::KwBoolean | TokenKind::KwString => true,
            TokenKind::Ident(_) => matches!(self.tokens[self.pos + 1].kind, TokenKind::Ident(_)),
            _ => false,
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let line = self.line();
        match self.peek().clone() {
            TokenKind::Semi => {
                self.bump();
                Ok(Stmt::Empty)
            }
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::KwIf => self.parse_if(line),
            TokenKind::KwWhile => self.parse_while(line),
            TokenKind::KwReturn => self.parse_return(line),
            _ if self.at_decl_start() => self.parse_decl(line),
            _ => self.parse_simple_stmt(line),
        }
    }

    fn parse_if(&mut self, line: usize) -> Result<Stmt> {
        self.expect(&TokenKind::KwIf)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let then_branch = Box::new(self.parse_stmt()?);
        if *self.peek() == TokenKind::KwElse {
            self.bump();
            let else_branch = Box::new(self.parse_stmt()?);
            Ok(Stmt::CondElse {
                cond,
                then_branch,
                else_branch,
                line,
            })
        } else {
            Ok(Stmt::Cond {
                cond,
                then_branch,
                line,
            })
        }
    }

    fn parse_while(&mut self, line: usize) -> Result<Stmt> {
        self.expect(&TokenKind::KwWhile)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::While { cond, body, line })
    }

    fn parse_return(&mut self, line: usize) -> Result<Stmt> {
        self.expect(&TokenKind::KwReturn)?;
        let expr = if *self.peek() == TokenKind::Semi {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semi)?;
        Ok(Stmt::Return { expr, line })
    }

    fn parse_decl(&mut self, line: usize) -> Result<Stmt> {
        let ty = self.parse_type()?;
        let mut items = Vec::new();
        loop {
            let item_line = self.line();
            let name = self.expect_ident()?;
            let init = if *self.peek() == TokenKind::Assign {
                self.bump();
                Some(self.parse_expr()?)
            } else {
                None
            };
            items.push(DeclItem {
                name,
                init,
                line: item_line,
            });
            if *self.peek() == TokenKind::Comma {
                self.bump();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::Semi)?;
        Ok(Stmt::Decl { ty, items, line })
    }

    /// Everything that starts with an expression: bare assignment,
    /// attribute assignment, increment/decrement (on a name or an
    /// attribute), or an expression used as a statement (a call).
    fn parse_simple_stmt(&mut self, line: usize) -> Result<Stmt> {
        let target = self.parse_unary_postfix()?;
        let stmt = match self.peek().clone() {
            TokenKind::Assign => {
                self.bump();
                let expr = self.parse_expr()?;
                match target.kind {
                    ExprKind::Ident(name) => Stmt::Assign { name, expr, line },
                    ExprKind::Attr { recv, name } => Stmt::AttrAssign {
                        recv: *recv,
                        field: name,
                        expr,
                        line,
                    },
                    _ => {
                        return Err(CompileError::Syntax {
                            line,
                            message: "invalid assignment target".to_string(),
                        });
                    }
                }
            }
            TokenKind::PlusPlus => {
                self.bump();
                match target.kind {
                    ExprKind::Ident(name) => Stmt::Incr { name, line },
                    ExprKind::Attr { recv, name } => Stmt::AttrIncr {
                        recv: *recv,
                        field: name,
                        line,
                    },
                    _ => {
                        return Err(CompileError::Syntax {
                            line,
                            message: "invalid increment target".to_string(),
                        });
                    }
                }
            }
            TokenKind::MinusMinus => {
                self.bump();
                match target.kind {
                    ExprKind::Ident(name) => Stmt::Decr { name, line },
                    ExprKind::Attr { recv, name } => Stmt::AttrDecr {
                        recv: *recv,
                        field: name,
                        line,
                    },
                    _ => {
                        return Err(CompileError::Syntax {
                            line,
                            message: "invalid decrement target".to_string(),
                        });
                    }
                }
            }
            _ => Stmt::ExprStmt { expr: target, line },
        };
        self.expect(&TokenKind::Semi)?;
        Ok(stmt)
    }

    // Expression grammar, lowest to highest precedence:
    //   expr    := or
    //   or      := and ("||" and)*
    //   and     := rel ("&&" rel)*
    //   rel     := add (relop add)*
    //   add     := mul (addop mul)*
    //   mul     := unary (mulop unary)*
    //   unary   := ("-" | "!") unary | postfix
    //   postfix := primary ("." ident ["(" args ")"])*
    //   primary := intlit | stringlit | "true" | "false" | "self" | ident
    //            | ident "(" args ")" | "new" ident | "(" expr ")"
    //            | "(" ident ")" "null"

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == TokenKind::OrOr {
            let line = self.line();
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::new(ExprKind::Or(Box::new(lhs), Box::new(rhs)), line);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_rel()?;
        while *self.peek() == TokenKind::AndAnd {
            let line = self.line();
            self.bump();
            let rhs = self.parse_rel()?;
            lhs = Expr::new(ExprKind::And(Box::new(lhs), Box::new(rhs)), line);
        }
        Ok(lhs)
    }

    fn parse_rel(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_add()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let rhs = self.parse_add()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), line);
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let rhs = self.parse_mul()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), line);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.line();
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::new(ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), line);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let line = self.line();
        match self.peek() {
            TokenKind::Minus => {
                self.bump();
                let inner = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnOp::Neg, Box::new(inner)), line))
            }
            TokenKind::Not => {
                self.bump();
                let inner = self.parse_unary()?;
                Ok(Expr::new(ExprKind::Unary(UnOp::Not, Box::new(inner)), line))
            }
            _ => self.parse_unary_postfix(),
        }
    }

    fn parse_unary_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if *self.peek() != TokenKind::Dot {
                break;
            }
            let line = self.line();
            self.bump();
            let name = self.expect_ident()?;
            if *self.peek() == TokenKind::LParen {
                let args = self.parse_args()?;
                expr = Expr::new(
                    ExprKind::MethodCall {
                        recv: Box::new(expr),
                        name,
                        args,
                    },
                    line,
                );
            } else {
                expr = Expr::new(
                    ExprKind::Attr {
                        recv: Box::new(expr),
                        name,
                    },
                    line,
                );
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if *self.peek() != TokenKind::RParen {
            loop {
                args.push(self.parse_expr()?);
                if *self.peek() == TokenKind::Comma {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let line = self.line();
        match self.bump() {
            TokenKind::IntLit(n) => Ok(Expr::new(ExprKind::IntLit(n), line)),
            TokenKind::StringLit(s) => Ok(Expr::new(ExprKind::StrLit(s), line)),
            TokenKind::KwTrue => Ok(Expr::new(ExprKind::BoolLit(true), line)),
            TokenKind::KwFalse => Ok(Expr::new(ExprKind::BoolLit(false), line)),
            TokenKind::KwSelf => Ok(Expr::new(ExprKind::SelfExpr, line)),
            TokenKind::KwNew => {
                let name = self.expect_ident()?;
                Ok(Expr::new(ExprKind::New(name), line))
            }
            TokenKind::LParen => {
                // Either a parenthesized expression or a typed null cast
                // `(ClassName) null`.
                if let TokenKind::Ident(_) = self.peek() {
                    let save = self.pos;
                    let name = self.expect_ident()?;
                    if *self.peek() == TokenKind::RParen
                        && self.tokens[self.pos + 1].kind == TokenKind::KwNull
                    {
                        self.bump(); // )
                        self.bump(); // null
                        return Ok(Expr::new(ExprKind::NullLit(name), line));
                    }
                    self.pos = save;
                }
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if *self.peek() == TokenKind::LParen {
                    let args = self.parse_args()?;
                    Ok(Expr::new(ExprKind::Call { name, args }, line))
                } else {
                    Ok(Expr::new(ExprKind::Ident(name), line))
                }
            }
            other => Err(CompileError::Syntax {
                line,
                message: format!("unexpected token {:?}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_main() {
        let prog = parse("int main() { return 0; }").unwrap();
        assert_eq!(prog.functions.len(), 1);
        assert_eq!(prog.functions[0].name, "main");
    }

    #[test]
    fn parses_class_with_field_and_method() {
        let prog = parse(
            "class A { int x; int get() { return self.x; } }",
        )
        .unwrap();
        let class = &prog.classes[0];
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.methods.len(), 1);
        assert!(class.parent.is_none());
    }

    #[test]
    fn parses_inheritance() {
        let prog = parse("class B extends A { }").unwrap();
        assert_eq!(prog.classes[0].parent.as_deref(), Some("A"));
    }

    #[test]
    fn precedence_matches_arithmetic() {
        let prog = parse("int main() { int x; x = 1 + 2 * 3; return x; }").unwrap();
        let Stmt::Assign { expr, .. } = &prog.functions[0].body.stmts[1] else {
            panic!("expected assign stmt");
        };
        match &expr.kind {
            ExprKind::Binary(BinOp::Add, lhs, rhs) => {
                assert!(matches!(lhs.kind, ExprKind::IntLit(1)));
                assert!(matches!(rhs.kind, ExprKind::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn parses_method_call_chain() {
        let prog = parse("int main() { self.a().b(1, 2); return 0; }").unwrap();
        let Stmt::ExprStmt { expr, .. } = &prog.functions[0].body.stmts[0] else {
            panic!("expected expr stmt");
        };
        match &expr.kind {
            ExprKind::MethodCall { name, args, .. } => {
                assert_eq!(name, "b");
                assert_eq!(args.len(), 2);
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn parses_typed_null() {
        let prog = parse("int main() { A a; a = (A) null; return 0; }").unwrap();
        let Stmt::Assign { expr, .. } = &prog.functions[0].body.stmts[1] else {
            panic!("expected assign");
        };
        assert!(matches!(&expr.kind, ExprKind::NullLit(n) if n == "A"));
    }

    #[test]
    fn rejects_bad_assignment_target() {
        let err = parse("int main() { 1 = 2; }").unwrap_err();
        assert_eq!(err.class_name(), "SyntaxError");
    }
}
