// ABOUTME: Parser — Pratt (precedence-climbing) parser over the lexer's
// ABOUTME: token stream, producing the Expr AST (spec §4.2)
//
// Precedence levels are declared lowest-to-highest so the derived `Ord`
// on `Prec` matches the binding-power table directly; see `token_precedence`.

use crate::ast::{BinaryOp, Expr, ExprKind, Literal, PathSegment, UnaryOp};
use crate::error::{Error, ErrorKind, Position};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Prec {
    Lowest,
    Lambda,
    Or,
    And,
    Equality,
    Relational,
    RegexMatch,
    InMembership,
    Additive,
    Multiplicative,
    Prefix,
    Call,
}

fn token_precedence(kind: &TokenKind) -> Prec {
    match kind {
        TokenKind::FatArrow => Prec::Lambda,
        TokenKind::OrOr | TokenKind::Or => Prec::Or,
        TokenKind::AndAnd | TokenKind::And => Prec::And,
        TokenKind::Eq | TokenKind::NotEq => Prec::Equality,
        TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge => Prec::Relational,
        TokenKind::RegexMatch | TokenKind::RegexNotMatch => Prec::RegexMatch,
        TokenKind::In | TokenKind::NotIn => Prec::InMembership,
        TokenKind::Plus | TokenKind::Minus => Prec::Additive,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Prec::Multiplicative,
        TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot => Prec::Call,
        _ => Prec::Lowest,
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    cur: Token,
    lookahead: VecDeque<Token>,
    errors: Vec<Error>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token();
        Self {
            lexer,
            cur,
            lookahead: VecDeque::new(),
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Top-level entry point. Returns the first recorded diagnostic (if
    /// any); the full list remains available via [`Parser::errors`].
    pub fn parse(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_expression(Prec::Lowest);
        if self.cur.kind != TokenKind::Eof {
            let pos = self.pos(&self.cur.clone());
            self.error_at(
                ErrorKind::UnexpectedToken(format!(
                    "unexpected token after expression: '{}'",
                    self.cur.text
                )),
                pos,
            );
        }
        for lexer_err in self.lexer.errors() {
            self.errors.push(lexer_err.clone());
        }
        match self.errors.first() {
            Some(first) => Err(first.clone()),
            None => Ok(expr),
        }
    }

    fn pos(&self, tok: &Token) -> Position {
        Position::new(tok.line, tok.column)
    }

    fn error_at(&mut self, kind: ErrorKind, pos: Position) {
        self.errors.push(Error::at(kind, pos));
    }

    fn peek_n(&mut self, n: usize) -> &Token {
        while self.lookahead.len() <= n {
            let t = self.lexer.next_token();
            self.lookahead.push_back(t);
        }
        &self.lookahead[n]
    }

    fn advance(&mut self) -> Token {
        let next = if let Some(t) = self.lookahead.pop_front() {
            t
        } else {
            self.lexer.next_token()
        };
        std::mem::replace(&mut self.cur, next)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, Error> {
        if &self.cur.kind == kind {
            Ok(self.advance())
        } else {
            let pos = self.pos(&self.cur.clone());
            let err = Error::at(
                ErrorKind::UnexpectedToken(format!(
                    "expected '{}', got '{}'",
                    kind, self.cur.text
                )),
                pos,
            );
            self.errors.push(err.clone());
            Err(err)
        }
    }

    fn parse_expression(&mut self, precedence: Prec) -> Expr {
        let mut left = self.parse_prefix();
        while precedence < token_precedence(&self.cur.kind) {
            left = self.parse_infix(left);
        }
        left
    }

    fn placeholder(&mut self) -> Expr {
        let tok = self.cur.clone();
        let pos = self.pos(&tok);
        self.error_at(
            ErrorKind::UnexpectedToken(format!("unexpected token '{}'", tok.text)),
            pos,
        );
        if tok.kind != TokenKind::Eof {
            self.advance();
        }
        Expr::new(ExprKind::Literal(Literal::Null), tok)
    }

    fn parse_prefix(&mut self) -> Expr {
        match self.cur.kind.clone() {
            TokenKind::Int(n) => {
                let tok = self.advance();
                Expr::new(ExprKind::Literal(Literal::Int(n)), tok)
            }
            TokenKind::Float(n) => {
                let tok = self.advance();
                Expr::new(ExprKind::Literal(Literal::Float(n)), tok)
            }
            TokenKind::Str(ref s) => {
                let s = s.clone();
                let tok = self.advance();
                Expr::new(ExprKind::Literal(Literal::String(s)), tok)
            }
            TokenKind::True => {
                let tok = self.advance();
                Expr::new(ExprKind::Literal(Literal::Bool(true)), tok)
            }
            TokenKind::False => {
                let tok = self.advance();
                Expr::new(ExprKind::Literal(Literal::Bool(false)), tok)
            }
            TokenKind::Null => {
                let tok = self.advance();
                Expr::new(ExprKind::Literal(Literal::Null), tok)
            }
            TokenKind::Identifier(ref name) => {
                let name = name.clone();
                let tok = self.advance();
                Expr::new(ExprKind::Identifier(name), tok)
            }
            TokenKind::Minus => {
                let tok = self.advance();
                let operand = self.parse_expression(Prec::Prefix);
                Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(operand),
                    },
                    tok,
                )
            }
            TokenKind::Bang | TokenKind::Not => {
                let tok = self.advance();
                let operand = self.parse_expression(Prec::Prefix);
                Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    tok,
                )
            }
            TokenKind::LBracket => self.parse_list(),
            TokenKind::Dollar => self.parse_jsonpath(),
            TokenKind::LParen => self.parse_paren(),
            _ => self.placeholder(),
        }
    }

    fn parse_list(&mut self) -> Expr {
        let tok = self.advance(); // consume '['
        let mut items = Vec::new();
        if self.cur.kind != TokenKind::RBracket {
            items.push(self.parse_expression(Prec::Lowest));
            while self.cur.kind == TokenKind::Comma {
                self.advance();
                items.push(self.parse_expression(Prec::Lowest));
            }
        }
        let _ = self.expect(&TokenKind::RBracket);
        Expr::new(ExprKind::List(items), tok)
    }

    fn parse_jsonpath(&mut self) -> Expr {
        let tok = self.advance(); // consume '$'
        let mut path = String::from("$");
        let mut segments = Vec::new();
        loop {
            match self.cur.kind.clone() {
                TokenKind::Dot => {
                    self.advance();
                    match self.cur.kind.clone() {
                        TokenKind::Identifier(name) => {
                            self.advance();
                            path.push('.');
                            path.push_str(&name);
                            segments.push(PathSegment::Ident(name));
                        }
                        _ => {
                            let pos = self.pos(&tok);
                            self.error_at(
                                ErrorKind::InvalidJsonPath(format!(
                                    "expected identifier after '.' in path '{}'",
                                    path
                                )),
                                pos,
                            );
                            break;
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    match self.cur.kind.clone() {
                        TokenKind::Int(n) => {
                            self.advance();
                            path.push_str(&format!("[{}]", n));
                            segments.push(PathSegment::Index(n));
                        }
                        TokenKind::Str(s) => {
                            self.advance();
                            path.push_str(&format!("[\"{}\"]", s));
                            segments.push(PathSegment::Key(s));
                        }
                        _ => {
                            let pos = self.pos(&tok);
                            self.error_at(
                                ErrorKind::InvalidJsonPath(format!(
                                    "expected index or key in path '{}'",
                                    path
                                )),
                                pos,
                            );
                            break;
                        }
                    }
                    let _ = self.expect(&TokenKind::RBracket);
                }
                _ => break,
            }
        }
        Expr::new(ExprKind::JsonPath { path, segments }, tok)
    }

    fn parse_paren(&mut self) -> Expr {
        let open = self.cur.clone();

        // (a, b) => ...
        if matches!(self.peek_n(0).kind, TokenKind::Identifier(_))
            && self.peek_n(1).kind == TokenKind::Comma
        {
            self.advance(); // '('
            let mut params = Vec::new();
            loop {
                match self.cur.kind.clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        params.push(name);
                    }
                    _ => {
                        let pos = self.pos(&self.cur.clone());
                        self.error_at(
                            ErrorKind::InvalidSyntax("expected parameter name".into()),
                            pos,
                        );
                        break;
                    }
                }
                if self.cur.kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
            let _ = self.expect(&TokenKind::RParen);
            let _ = self.expect(&TokenKind::FatArrow);
            let body = self.parse_expression(Prec::Lambda);
            return Expr::new(
                ExprKind::Lambda {
                    params,
                    body: Box::new(body),
                },
                open,
            );
        }

        // (a) => ... or (a) alone
        if let TokenKind::Identifier(ref name) = self.peek_n(0).kind {
            if self.peek_n(1).kind == TokenKind::RParen {
                let name = name.clone();
                self.advance(); // '('
                let ident_tok = self.advance(); // identifier
                self.advance(); // ')'
                if self.cur.kind == TokenKind::FatArrow {
                    self.advance();
                    let body = self.parse_expression(Prec::Lambda);
                    return Expr::new(
                        ExprKind::Lambda {
                            params: vec![name],
                            body: Box::new(body),
                        },
                        open,
                    );
                }
                return Expr::new(ExprKind::Identifier(name), ident_tok);
            }
        }

        self.advance(); // '('
        let inner = self.parse_expression(Prec::Lowest);
        let _ = self.expect(&TokenKind::RParen);
        Expr::new(ExprKind::Grouped(Box::new(inner)), open)
    }

    fn parse_infix(&mut self, left: Expr) -> Expr {
        match self.cur.kind.clone() {
            TokenKind::Plus => self.parse_binary(left, BinaryOp::Add),
            TokenKind::Minus => self.parse_binary(left, BinaryOp::Sub),
            TokenKind::Star => self.parse_binary(left, BinaryOp::Mul),
            TokenKind::Slash => self.parse_binary(left, BinaryOp::Div),
            TokenKind::Percent => self.parse_binary(left, BinaryOp::Mod),
            TokenKind::Eq => self.parse_binary(left, BinaryOp::Eq),
            TokenKind::NotEq => self.parse_binary(left, BinaryOp::NotEq),
            TokenKind::Lt => self.parse_binary(left, BinaryOp::Lt),
            TokenKind::Gt => self.parse_binary(left, BinaryOp::Gt),
            TokenKind::Le => self.parse_binary(left, BinaryOp::Le),
            TokenKind::Ge => self.parse_binary(left, BinaryOp::Ge),
            TokenKind::AndAnd | TokenKind::And => self.parse_binary(left, BinaryOp::And),
            TokenKind::OrOr | TokenKind::Or => self.parse_binary(left, BinaryOp::Or),
            TokenKind::In => self.parse_in(left, false),
            TokenKind::NotIn => self.parse_in(left, true),
            TokenKind::RegexMatch => self.parse_regex(left, false),
            TokenKind::RegexNotMatch => self.parse_regex(left, true),
            TokenKind::LParen => self.parse_call(left),
            TokenKind::LBracket => self.parse_index(left),
            TokenKind::Dot => self.parse_member(left),
            TokenKind::FatArrow => self.parse_arrow_lambda(left),
            _ => left,
        }
    }

    fn parse_binary(&mut self, left: Expr, op: BinaryOp) -> Expr {
        let tok = self.advance();
        let prec = token_precedence(&tok.kind);
        let right = self.parse_expression(prec);
        Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            tok,
        )
    }

    fn parse_in(&mut self, left: Expr, negated: bool) -> Expr {
        let tok = self.advance();
        let right = self.parse_expression(Prec::InMembership);
        Expr::new(
            ExprKind::In {
                left: Box::new(left),
                right: Box::new(right),
                negated,
            },
            tok,
        )
    }

    fn parse_regex(&mut self, left: Expr, negated: bool) -> Expr {
        let tok = self.advance();
        let pattern = self.parse_expression(Prec::RegexMatch);
        Expr::new(
            ExprKind::Regex {
                left: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            },
            tok,
        )
    }

    fn parse_call(&mut self, left: Expr) -> Expr {
        let tok = self.cur.clone();
        let name = match &left.kind {
            ExprKind::Identifier(name) => name.clone(),
            _ => {
                let pos = self.pos(&tok);
                self.error_at(
                    ErrorKind::InvalidSyntax(
                        "call target must be a bare identifier".into(),
                    ),
                    pos,
                );
                String::new()
            }
        };
        self.advance(); // '('
        let mut args = Vec::new();
        if self.cur.kind != TokenKind::RParen {
            args.push(self.parse_expression(Prec::Lowest));
            while self.cur.kind == TokenKind::Comma {
                self.advance();
                args.push(self.parse_expression(Prec::Lowest));
            }
        }
        let _ = self.expect(&TokenKind::RParen);
        Expr::new(ExprKind::FunctionCall { name, args }, tok)
    }

    fn parse_index(&mut self, left: Expr) -> Expr {
        let tok = self.advance(); // '['
        let index = self.parse_expression(Prec::Lowest);
        let _ = self.expect(&TokenKind::RBracket);
        Expr::new(
            ExprKind::Index {
                container: Box::new(left),
                index: Box::new(index),
            },
            tok,
        )
    }

    fn parse_member(&mut self, left: Expr) -> Expr {
        let tok = self.advance(); // '.'
        match self.cur.kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Expr::new(
                    ExprKind::Member {
                        object: Box::new(left),
                        property: name,
                    },
                    tok,
                )
            }
            _ => {
                let pos = self.pos(&self.cur.clone());
                self.error_at(
                    ErrorKind::UnexpectedToken(format!(
                        "expected identifier after '.', got '{}'",
                        self.cur.text
                    )),
                    pos,
                );
                left
            }
        }
    }

    fn parse_arrow_lambda(&mut self, left: Expr) -> Expr {
        let tok = self.advance(); // '=>'
        let param = match &left.kind {
            ExprKind::Identifier(name) => name.clone(),
            _ => {
                let pos = self.pos(&tok);
                self.error_at(
                    ErrorKind::InvalidSyntax(
                        "lambda parameter must be a bare identifier".into(),
                    ),
                    pos,
                );
                String::new()
            }
        };
        let body = self.parse_expression(Prec::Lambda);
        Expr::new(
            ExprKind::Lambda {
                params: vec![param],
                body: Box::new(body),
            },
            tok,
        )
    }
}

/// Convenience entry point mirroring the teacher's top-level `parse()`.
pub fn parse(source: &str) -> Result<Expr, Error> {
    let result = Parser::new(source).parse();
    if let Err(e) = &result {
        tracing::warn!(error = %e, "parse failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arithmetic_with_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(expr.to_string(), "(1 + (2 * 3))");
    }

    #[test]
    fn unary_binds_tighter_than_multiplicative() {
        let expr = parse("-2 * 3").unwrap();
        assert_eq!(expr.to_string(), "((-2) * 3)");
    }

    #[test]
    fn parses_jsonpath_with_mixed_segments() {
        let expr = parse("$.users[0][\"name\"]").unwrap();
        match &expr.kind {
            ExprKind::JsonPath { path, .. } => assert_eq!(path, "$.users[0][\"name\"]"),
            other => panic!("expected JsonPath, got {:?}", other),
        }
    }

    #[test]
    fn parses_single_param_lambda_via_arrow() {
        let expr = parse("x => x + 1").unwrap();
        match expr.kind {
            ExprKind::Lambda { params, .. } => assert_eq!(params, vec!["x".to_string()]),
            other => panic!("expected Lambda, got {:?}", other),
        }
    }

    #[test]
    fn parses_multi_param_lambda() {
        let expr = parse("(a, b) => a + b").unwrap();
        match expr.kind {
            ExprKind::Lambda { params, .. } => {
                assert_eq!(params, vec!["a".to_string(), "b".to_string()])
            }
            other => panic!("expected Lambda, got {:?}", other),
        }
    }

    #[test]
    fn parenthesized_identifier_without_arrow_is_just_identifier() {
        let expr = parse("(x)").unwrap();
        assert_eq!(expr.to_string(), "x");
    }

    #[test]
    fn parses_grouped_expression() {
        let expr = parse("(1 + 2)").unwrap();
        assert_eq!(expr.to_string(), "(1 + 2)");
    }

    #[test]
    fn parses_function_call() {
        let expr = parse("len(x)").unwrap();
        match &expr.kind {
            ExprKind::FunctionCall { name, args } => {
                assert_eq!(name, "len");
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected FunctionCall, got {:?}", other),
        }
    }

    #[test]
    fn parses_in_and_not_in() {
        let expr = parse("x IN [1, 2, 3]").unwrap();
        match &expr.kind {
            ExprKind::In { negated, .. } => assert!(!negated),
            other => panic!("expected In, got {:?}", other),
        }
        let expr = parse("x NOT IN [1, 2, 3]").unwrap();
        match &expr.kind {
            ExprKind::In { negated, .. } => assert!(negated),
            other => panic!("expected In, got {:?}", other),
        }
    }

    #[test]
    fn parses_index_and_member_chains() {
        let expr = parse("x.a[0].b").unwrap();
        assert_eq!(expr.to_string(), "x.a[0].b");
    }

    #[test]
    fn call_target_must_be_bare_identifier() {
        let result = parse("(1 + 1)(2)");
        assert!(result.is_err());
    }

    #[test]
    fn trailing_tokens_after_expression_are_an_error() {
        let result = parse("1 2");
        assert!(result.is_err());
    }

    #[test]
    fn logical_word_and_symbol_operators_are_equivalent() {
        assert_eq!(
            parse("a and b").unwrap().to_string(),
            parse("a && b").unwrap().to_string()
        );
    }
}
