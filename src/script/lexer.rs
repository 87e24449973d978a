//! Tokenizer for fnscript source.
//!
//! Token kinds are declared with `logos`; the [`Lexer`] wrapper turns the raw
//! stream into [`Token`]s with byte spans and reports unknown input as a
//! syntax error with line and column.

use crate::script::error::{ScriptError, ScriptResult};
use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // Keywords
    #[token("fn")]
    Fn,
    #[token("let")]
    Let,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("import")]
    Import,
    #[token("as")]
    As,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("nil")]
    Nil,

    // Literals
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    IntLit,
    #[regex(r"[0-9]+\.[0-9]+")]
    FloatLit,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLit,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Not,
    #[token("=")]
    Eq,

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    /// End of input, appended by [`Lexer::tokenize`].
    Eof,
}

impl TokenKind {
    pub fn description(&self) -> &'static str {
        match self {
            TokenKind::Fn => "keyword `fn`",
            TokenKind::Let => "keyword `let`",
            TokenKind::Return => "keyword `return`",
            TokenKind::If => "keyword `if`",
            TokenKind::Else => "keyword `else`",
            TokenKind::While => "keyword `while`",
            TokenKind::For => "keyword `for`",
            TokenKind::In => "keyword `in`",
            TokenKind::Import => "keyword `import`",
            TokenKind::As => "keyword `as`",
            TokenKind::True => "keyword `true`",
            TokenKind::False => "keyword `false`",
            TokenKind::Nil => "keyword `nil`",
            TokenKind::Ident => "identifier",
            TokenKind::IntLit => "integer literal",
            TokenKind::FloatLit => "float literal",
            TokenKind::StringLit => "string literal",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::EqEq => "`==`",
            TokenKind::NotEq => "`!=`",
            TokenKind::Lt => "`<`",
            TokenKind::LtEq => "`<=`",
            TokenKind::Gt => "`>`",
            TokenKind::GtEq => "`>=`",
            TokenKind::AndAnd => "`&&`",
            TokenKind::OrOr => "`||`",
            TokenKind::Not => "`!`",
            TokenKind::Eq => "`=`",
            TokenKind::Dot => "`.`",
            TokenKind::Comma => "`,`",
            TokenKind::Semi => "`;`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Eof => "end of input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Precomputed line starts for offset -> (line, column) lookup.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(offset + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-indexed line and column of a byte offset.
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx] + 1) as u32;
        (line, col)
    }
}

pub struct Lexer<'src> {
    source: &'src str,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self { source }
    }

    /// Tokenize the whole input, ending with a single `Eof` token.
    pub fn tokenize(&self) -> ScriptResult<Vec<Token>> {
        let mut inner = TokenKind::lexer(self.source);
        let mut tokens = Vec::new();

        while let Some(kind) = inner.next() {
            let span = inner.span();
            match kind {
                Ok(kind) => tokens.push(Token { kind, span }),
                Err(()) => {
                    let (line, column) = LineIndex::new(self.source).line_col(span.start);
                    return Err(ScriptError::Syntax {
                        line,
                        column,
                        message: format!("unexpected input `{}`", inner.slice()),
                    });
                }
            }
        }

        let end = self.source.len();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: end..end,
        });
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("fn f(x) { return x; }"),
            vec![
                TokenKind::Fn,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::Ident,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("format"), vec![TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn test_numbers_and_comments() {
        assert_eq!(
            kinds("1 2.5 // trailing\n<= >="),
            vec![
                TokenKind::IntLit,
                TokenKind::FloatLit,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unknown_character_reports_position() {
        let err = Lexer::new("let x = 1;\nlet y = $;").tokenize().unwrap_err();
        assert_eq!(
            err,
            ScriptError::Syntax {
                line: 2,
                column: 9,
                message: "unexpected input `$`".to_string(),
            }
        );
    }

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(4), (2, 2));
    }
}
