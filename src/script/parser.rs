//! Recursive-descent parser for fnscript.
//!
//! Statements are parsed directly; expressions use precedence climbing over
//! [`Precedence`]. Function declarations keep the byte span of their full
//! definition so the source text can be recovered later.

use crate::script::ast::{BinaryOp, Expr, FnDecl, Literal, Program, Stmt, UnaryOp};
use crate::script::error::{ScriptError, ScriptResult};
use crate::script::lexer::{Lexer, LineIndex, Token, TokenKind};
use std::sync::Arc;

/// Deepest statement or expression nesting a program may contain.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Operator precedence levels (higher binds tighter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
}

fn binary_op(kind: TokenKind) -> Option<(BinaryOp, Precedence)> {
    let op = match kind {
        TokenKind::OrOr => (BinaryOp::Or, Precedence::Or),
        TokenKind::AndAnd => (BinaryOp::And, Precedence::And),
        TokenKind::EqEq => (BinaryOp::Eq, Precedence::Equality),
        TokenKind::NotEq => (BinaryOp::NotEq, Precedence::Equality),
        TokenKind::Lt => (BinaryOp::Lt, Precedence::Comparison),
        TokenKind::LtEq => (BinaryOp::LtEq, Precedence::Comparison),
        TokenKind::Gt => (BinaryOp::Gt, Precedence::Comparison),
        TokenKind::GtEq => (BinaryOp::GtEq, Precedence::Comparison),
        TokenKind::Plus => (BinaryOp::Add, Precedence::Term),
        TokenKind::Minus => (BinaryOp::Sub, Precedence::Term),
        TokenKind::Star => (BinaryOp::Mul, Precedence::Factor),
        TokenKind::Slash => (BinaryOp::Div, Precedence::Factor),
        TokenKind::Percent => (BinaryOp::Rem, Precedence::Factor),
        _ => return None,
    };
    Some(op)
}

pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    lines: LineIndex,
    depth: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> ScriptResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            source,
            tokens,
            pos: 0,
            lines: LineIndex::new(source),
            depth: 0,
        })
    }

    pub fn parse_program(mut self) -> ScriptResult<Program> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    // ---- token helpers ----

    fn current(&self) -> &Token {
        // tokenize() always ends with Eof and we never advance past it
        &self.tokens[self.pos]
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn try_consume(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> ScriptResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_expected(kind.description()))
        }
    }

    fn expect_ident(&mut self) -> ScriptResult<String> {
        let token = self.expect(TokenKind::Ident)?;
        Ok(self.source[token.span].to_string())
    }

    fn error_expected(&self, expected: &str) -> ScriptError {
        let token = self.current();
        let found = if token.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            format!("`{}`", &self.source[token.span.clone()])
        };
        self.error_at(token.span.start, format!("expected {}, found {}", expected, found))
    }

    fn error_at(&self, offset: usize, message: String) -> ScriptError {
        let (line, column) = self.lines.line_col(offset);
        ScriptError::Syntax {
            line,
            column,
            message,
        }
    }

    /// Count one level of nesting; fails once the program is too deep to
    /// evaluate.
    fn enter(&mut self) -> ScriptResult<()> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error_at(
                self.current().span.start,
                format!("nesting exceeds {} levels", MAX_NESTING_DEPTH),
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        self.enter()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> ScriptResult<Stmt> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> ScriptResult<Stmt> {
        match self.current().kind {
            TokenKind::Fn => Ok(Stmt::Fn(Arc::new(self.parse_fn_decl()?))),
            TokenKind::Let => {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(TokenKind::Eq)?;
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Let { name, value })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Return(value))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::While { condition, body })
            }
            TokenKind::For => {
                self.advance();
                let binding = self.expect_ident()?;
                self.expect(TokenKind::In)?;
                let iterable = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::For {
                    binding,
                    iterable,
                    body,
                })
            }
            TokenKind::Import => self.parse_import(),
            TokenKind::Ident if self.peek_kind(1) == TokenKind::Eq => {
                let name = self.expect_ident()?;
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Assign { name, value })
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn peek_kind(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.pos + ahead)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn parse_fn_decl(&mut self) -> ScriptResult<FnDecl> {
        let start = self.expect(TokenKind::Fn)?.span.start;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let param = self.expect_ident()?;
                if params.contains(&param) {
                    return Err(self.error_at(
                        start,
                        format!("duplicate parameter `{}` in fn `{}`", param, name),
                    ));
                }
                params.push(param);
                if !self.try_consume(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        self.expect(TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.error_expected("`}`"));
            }
            body.push(self.parse_statement()?);
        }
        let end = self.expect(TokenKind::RBrace)?.span.end;

        Ok(FnDecl {
            name,
            params,
            body: body.into(),
            span: start..end,
        })
    }

    fn parse_block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) {
            if self.check(TokenKind::Eof) {
                return Err(self.error_expected("`}`"));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(statements)
    }

    fn parse_if(&mut self) -> ScriptResult<Stmt> {
        self.expect(TokenKind::If)?;
        let condition = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.try_consume(TokenKind::Else) {
            if self.check(TokenKind::If) {
                Some(vec![self.nested(Self::parse_if)?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_import(&mut self) -> ScriptResult<Stmt> {
        self.expect(TokenKind::Import)?;
        let mut segments = vec![self.expect_ident()?];
        while self.try_consume(TokenKind::Dot) {
            segments.push(self.expect_ident()?);
        }
        let binding = if self.try_consume(TokenKind::As) {
            self.expect_ident()?
        } else {
            segments.last().cloned().unwrap_or_default()
        };
        self.expect(TokenKind::Semi)?;
        Ok(Stmt::Import {
            module: segments.join("."),
            binding,
        })
    }

    // ---- expressions ----

    pub fn parse_expr(&mut self) -> ScriptResult<Expr> {
        self.parse_expr_prec(Precedence::Lowest)
    }

    fn parse_expr_prec(&mut self, min_prec: Precedence) -> ScriptResult<Expr> {
        let mut lhs = self.parse_unary()?;
        // each operator applied in the loop deepens the left operand
        let mut chained = 0;
        while let Some((op, prec)) = binary_op(self.current().kind) {
            if prec <= min_prec {
                break;
            }
            self.enter()?;
            chained += 1;
            self.advance();
            // all binary operators are left-associative
            let rhs = self.parse_expr_prec(prec)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        self.depth -= chained;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        self.nested(Self::unary)
    }

    fn unary(&mut self) -> ScriptResult<Expr> {
        let op = match self.current().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.parse_primary()?;
        let mut chained = 0;
        loop {
            if matches!(
                self.current().kind,
                TokenKind::LParen | TokenKind::Dot | TokenKind::LBracket
            ) {
                self.enter()?;
                chained += 1;
            }
            match self.current().kind {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_comma_separated(TokenKind::RParen)?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    expr = Expr::Attribute {
                        target: Box::new(expr),
                        name,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                _ => {
                    self.depth -= chained;
                    return Ok(expr);
                }
            }
        }
    }

    fn parse_comma_separated(&mut self, close: TokenKind) -> ScriptResult<Vec<Expr>> {
        let mut items = Vec::new();
        if !self.check(close) {
            loop {
                items.push(self.parse_expr()?);
                if !self.try_consume(TokenKind::Comma) {
                    break;
                }
                // trailing comma
                if self.check(close) {
                    break;
                }
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> ScriptResult<Expr> {
        let token = self.current().clone();
        let source = self.source;
        let text = &source[token.span.clone()];
        let expr = match token.kind {
            TokenKind::IntLit => {
                let value = text.parse::<i64>().map_err(|e| {
                    self.error_at(token.span.start, format!("invalid integer `{}`: {}", text, e))
                })?;
                Expr::Literal(Literal::Int(value))
            }
            TokenKind::FloatLit => {
                let value = text.parse::<f64>().map_err(|e| {
                    self.error_at(token.span.start, format!("invalid float `{}`: {}", text, e))
                })?;
                Expr::Literal(Literal::Float(value))
            }
            TokenKind::StringLit => {
                Expr::Literal(Literal::Str(unescape(&text[1..text.len() - 1])))
            }
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::Nil => Expr::Literal(Literal::Nil),
            TokenKind::Ident => Expr::Name(text.to_string()),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.parse_comma_separated(TokenKind::RBracket)?;
                return Ok(Expr::List(items));
            }
            _ => return Err(self.error_expected("expression")),
        };
        self.advance();
        Ok(expr)
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a complete program.
pub fn parse(source: &str) -> ScriptResult<Program> {
    Parser::new(source)?.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_decl_span_covers_definition() {
        let source = "let a = 1;\nfn add(x, y) {\n    return x + y;\n}\n";
        let program = parse(source).unwrap();
        match &program.statements[1] {
            Stmt::Fn(decl) => {
                assert_eq!(decl.name, "add");
                assert_eq!(decl.params, vec!["x".to_string(), "y".to_string()]);
                assert_eq!(
                    &source[decl.span.clone()],
                    "fn add(x, y) {\n    return x + y;\n}"
                );
            }
            other => panic!("expected fn, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3 == 7 && !false;").unwrap();
        let Stmt::Expr(Expr::Binary { op, lhs, .. }) = &program.statements[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::And);
        let Expr::Binary { op, lhs, .. } = lhs.as_ref() else {
            panic!("expected equality");
        };
        assert_eq!(*op, BinaryOp::Eq);
        let Expr::Binary { op, rhs, .. } = lhs.as_ref() else {
            panic!("expected addition");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            rhs.as_ref(),
            Expr::Binary {
                op: BinaryOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let program = parse("10 - 3 - 2;").unwrap();
        let Stmt::Expr(Expr::Binary { op, lhs, rhs }) = &program.statements[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Sub);
        assert_eq!(rhs.as_ref(), &Expr::Literal(Literal::Int(2)));
        assert!(matches!(lhs.as_ref(), Expr::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn test_import_binding() {
        let program = parse("import pkg.util; import text as t;").unwrap();
        assert_eq!(
            program.statements,
            vec![
                Stmt::Import {
                    module: "pkg.util".to_string(),
                    binding: "util".to_string(),
                },
                Stmt::Import {
                    module: "text".to_string(),
                    binding: "t".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        let program = parse(r#"let s = "a\"b\n";"#).unwrap();
        assert_eq!(
            program.statements[0],
            Stmt::Let {
                name: "s".to_string(),
                value: Expr::Literal(Literal::Str("a\"b\n".to_string())),
            }
        );
    }

    #[test]
    fn test_missing_semicolon_is_syntax_error() {
        let err = parse("let x = 1\nlet y = 2;").unwrap_err();
        match err {
            ScriptError::Syntax { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("expected `;`"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_deep_nesting_is_syntax_error() {
        let deep = format!("let x = {}1{};", "(".repeat(50_000), ")".repeat(50_000));
        assert!(matches!(parse(&deep), Err(ScriptError::Syntax { .. })));

        let negations = format!("let x = {}1;", "-".repeat(10_000));
        assert!(matches!(parse(&negations), Err(ScriptError::Syntax { .. })));

        let sum = format!("let x = 1{};", " + 1".repeat(10_000));
        assert!(matches!(parse(&sum), Err(ScriptError::Syntax { .. })));

        let calls = format!("let x = f{};", "()".repeat(10_000));
        assert!(matches!(parse(&calls), Err(ScriptError::Syntax { .. })));

        let blocks = format!("{}{}", "if true { ".repeat(5_000), "}".repeat(5_000));
        match parse(&blocks) {
            Err(ScriptError::Syntax { message, .. }) => assert!(message.contains("nesting")),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_moderate_nesting_parses() {
        let nested = format!("let x = {}1{};", "(".repeat(40), ")".repeat(40));
        assert!(parse(&nested).is_ok());
        let sum = format!("let x = 1{};", " + 1".repeat(60));
        assert!(parse(&sum).is_ok());
    }

    #[test]
    fn test_unclosed_fn_body() {
        assert!(matches!(
            parse("fn f() { return 1;"),
            Err(ScriptError::Syntax { .. })
        ));
    }
}
