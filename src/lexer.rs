//! Hand-rolled tokenizer.
//!
//! No lexer-generator crate: the token set is small and fixed, so a single
//! forward scan over the source bytes is simpler than pulling in a
//! dependency for it.

use crate::errors::{CompileError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    IntLit(i32),
    StringLit(String),
    // keywords
    KwClass,
    KwExtends,
    KwInt,
    KwBoolean,
    KwString,
    KwVoid,
    KwIf,
    KwElse,
    KwWhile,
    KwReturn,
    KwNew,
    KwNull,
    KwSelf,
    KwTrue,
    KwFalse,
    // punctuation / operators
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semi,
    Comma,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    AndAnd,
    OrOr,
    Not,
    PlusPlus,
    MinusMinus,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

fn keyword(word: &str) -> Option<TokenKind> {
    use TokenKind::*;
    Some(match word {
        "class" => KwClass,
        "extends" => KwExtends,
        "int" => KwInt,
        "boolean" => KwBoolean,
        "string" => KwString,
        "void" => KwVoid,
        "if" => KwIf,
        "else" => KwElse,
        "while" => KwWhile,
        "return" => KwReturn,
        "new" => KwNew,
        "null" => KwNull,
        "self" => KwSelf,
        "true" => KwTrue,
        "false" => KwFalse,
        _ => return None,
    })
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                });
                break;
            };
            let kind = if c.is_ascii_digit() {
                self.lex_int()
            } else if c.is_ascii_alphabetic() || c == b'_' {
                self.lex_ident_or_keyword()
            } else if c == b'"' {
                self.lex_string(line)?
            } else {
                self.lex_operator(line)?
            };
            tokens.push(Token { kind, line });
        }
        Ok(tokens)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.bump();
                    }
                }
                Some(b'#') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start_line = self.line;
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                return Err(CompileError::Syntax {
                                    line: start_line,
                                    message: "unterminated block comment".to_string(),
                                });
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_int(&mut self) -> TokenKind {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        // Overflow saturates to i32::MAX; the parser's unary-minus folding
        // handles i32::MIN separately.
        TokenKind::IntLit(text.parse().unwrap_or(i32::MAX))
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.bump();
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()))
    }

    fn lex_string(&mut self, line: usize) -> Result<TokenKind> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some(b'\n') => {
                    return Err(CompileError::Syntax {
                        line,
                        message: "unterminated string literal".to_string(),
                    });
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => s.push('\n'),
                    Some(b't') => s.push('\t'),
                    Some(b'"') => s.push('"'),
                    Some(b'\\') => s.push('\\'),
                    Some(other) => s.push(other as char),
                    None => {
                        return Err(CompileError::Syntax {
                            line,
                            message: "unterminated string literal".to_string(),
                        });
                    }
                },
                Some(c) => s.push(c as char),
            }
        }
        Ok(TokenKind::StringLit(s))
    }

    fn lex_operator(&mut self, line: usize) -> Result<TokenKind> {
        use TokenKind::*;
        let c = self.bump().unwrap();
        Ok(match c {
            b'{' => LBrace,
            b'}' => RBrace,
            b'(' => LParen,
            b')' => RParen,
            b';' => Semi,
            b',' => Comma,
            b'.' => Dot,
            b'+' if self.peek() == Some(b'+') => {
                self.bump();
                PlusPlus
            }
            b'+' => Plus,
            b'-' if self.peek() == Some(b'-') => {
                self.bump();
                MinusMinus
            }
            b'-' => Minus,
            b'*' => Star,
            b'/' => Slash,
            b'%' => Percent,
            b'<' if self.peek() == Some(b'=') => {
                self.bump();
                Le
            }
            b'<' => Lt,
            b'>' if self.peek() == Some(b'=') => {
                self.bump();
                Ge
            }
            b'>' => Gt,
            b'=' if self.peek() == Some(b'=') => {
                self.bump();
                EqEq
            }
            b'=' => Assign,
            b'!' if self.peek() == Some(b'=') => {
                self.bump();
                Ne
            }
            b'!' => Not,
            b'&' if self.peek() == Some(b'&') => {
                self.bump();
                AndAnd
            }
            b'|' if self.peek() == Some(b'|') => {
                self.bump();
                OrOr
            }
            other => {
                return Err(CompileError::Syntax {
                    line,
                    message: format!("unexpected character '{}'", other as char),
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keywords_and_idents() {
        assert_eq!(
            kinds("class Foo extends Bar"),
            vec![
                TokenKind::KwClass,
                TokenKind::Ident("Foo".to_string()),
                TokenKind::KwExtends,
                TokenKind::Ident("Bar".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![TokenKind::StringLit("a\nb".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert_eq!(err.class_name(), "SyntaxError");
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(
            kinds("// hi\nint x; /* c */ 3"),
            vec![
                TokenKind::KwInt,
                TokenKind::Ident("x".to_string()),
                TokenKind::Semi,
                TokenKind::IntLit(3),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_increment_and_comparisons() {
        assert_eq!(
            kinds("i++ <= 3 && !b"),
            vec![
                TokenKind::Ident("i".to_string()),
                TokenKind::PlusPlus,
                TokenKind::Le,
                TokenKind::IntLit(3),
                TokenKind::AndAnd,
                TokenKind::Not,
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }
}
