// ABOUTME: Lexer — positioned token stream over AMEL source text (spec §4.1)
// ABOUTME: Reuses the teacher's nom-combinator literal parsers, adding the
// ABOUTME: byte/line/column bookkeeping a pure combinator grammar doesn't need.

use crate::error::{Error, ErrorKind, Position};
use crate::token::{Token, TokenKind};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of},
    combinator::{opt, recognize},
    sequence::pair,
    IResult, Parser,
};

/// Recognizes an integer or float literal's *text* (sign is not lexed here;
/// unary minus is a parser-level prefix operator per spec §4.1).
fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        digit1,
        opt(alt((
            recognize(pair(char('.'), digit1)),
            recognize(pair(one_of("eE"), pair(opt(one_of("+-")), digit1))),
        ))),
    ))
    .parse(input)
}

fn identifier_text(input: &str) -> IResult<&str, &str> {
    let start = input;
    let mut chars = input.char_indices();
    let Some((_, first)) = chars.next() else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Alpha,
        )));
    };
    if !(first.is_alphabetic() || first == '_') {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Alpha,
        )));
    }
    let mut end = first.len_utf8();
    for (idx, c) in chars {
        if c.is_alphanumeric() || c == '_' {
            end = idx + c.len_utf8();
        } else {
            break;
        }
    }
    let _ = tag::<_, _, nom::error::Error<&str>>("");
    Ok((&start[end..], &start[..end]))
}

/// One lexical diagnostic. Kept separate from `error::Error` only in name
/// (it *is* one) to mirror spec §4.1's "errors()" accessor.
pub type LexError = Error;

pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    errors: Vec<LexError>,
    peeked: Option<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            errors: Vec::new(),
            peeked: None,
        }
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_char_at(&self, skip: usize) -> Option<char> {
        self.rest().chars().nth(skip)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_by_str(&mut self, s: &str) {
        for c in s.chars() {
            self.advance_matching(c);
        }
    }

    fn advance_matching(&mut self, _expected: char) {
        self.advance();
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_char_at(1) == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_char_at(1) == Some('*') => {
                    let start_pos = self.position();
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while let Some(c) = self.peek_char() {
                        if c == '*' && self.peek_char_at(1) == Some('/') {
                            self.advance();
                            self.advance();
                            closed = true;
                            break;
                        }
                        self.advance();
                    }
                    if !closed {
                        self.errors
                            .push(Error::at(ErrorKind::UnterminatedString, start_pos));
                    }
                }
                _ => break,
            }
        }
    }

    /// Consume and return the next token. Advances the stream.
    pub fn next_token(&mut self) -> Token {
        if let Some(tok) = self.peeked.take() {
            return tok;
        }
        self.scan_token()
    }

    /// Return the token `next_token()` would return, without consuming it.
    pub fn peek(&mut self) -> Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.scan_token());
        }
        self.peeked.clone().unwrap()
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let pos = self.position();

        let Some(c) = self.peek_char() else {
            return Token::eof(pos.line, pos.column);
        };

        match c {
            '(' => self.simple(TokenKind::LParen, "(", pos),
            ')' => self.simple(TokenKind::RParen, ")", pos),
            '[' => self.simple(TokenKind::LBracket, "[", pos),
            ']' => self.simple(TokenKind::RBracket, "]", pos),
            ',' => self.simple(TokenKind::Comma, ",", pos),
            '.' => self.simple(TokenKind::Dot, ".", pos),
            '$' => self.simple(TokenKind::Dollar, "$", pos),
            ':' => self.simple(TokenKind::Colon, ":", pos),
            '+' => self.simple(TokenKind::Plus, "+", pos),
            '-' => self.simple(TokenKind::Minus, "-", pos),
            '*' => self.simple(TokenKind::Star, "*", pos),
            '/' => self.simple(TokenKind::Slash, "/", pos),
            '%' => self.simple(TokenKind::Percent, "%", pos),
            '=' => self.lex_eq(pos),
            '!' => self.lex_bang(pos),
            '<' => self.lex_lt(pos),
            '>' => self.lex_gt(pos),
            '&' => self.lex_amp(pos),
            '|' => self.lex_pipe(pos),
            '"' | '\'' => self.lex_string(c, pos),
            '0'..='9' => self.lex_number(pos),
            c if c.is_alphabetic() || c == '_' => self.lex_identifier_or_keyword(pos),
            other => {
                self.advance();
                self.errors.push(Error::at(
                    ErrorKind::UnexpectedCharacter(other),
                    pos,
                ));
                Token::new(TokenKind::Illegal(other.to_string()), other.to_string(), pos.line, pos.column)
            }
        }
    }

    fn simple(&mut self, kind: TokenKind, text: &str, pos: Position) -> Token {
        self.advance();
        Token::new(kind, text, pos.line, pos.column)
    }

    fn lex_eq(&mut self, pos: Position) -> Token {
        self.advance();
        match self.peek_char() {
            Some('=') => {
                self.advance();
                Token::new(TokenKind::Eq, "==", pos.line, pos.column)
            }
            Some('>') => {
                self.advance();
                Token::new(TokenKind::FatArrow, "=>", pos.line, pos.column)
            }
            Some('~') => {
                self.advance();
                Token::new(TokenKind::RegexMatch, "=~", pos.line, pos.column)
            }
            _ => {
                self.errors.push(Error::at(
                    ErrorKind::InvalidSyntax("stray '=': did you mean '=='/'=>'?".into()),
                    pos,
                ));
                Token::new(TokenKind::Illegal("=".into()), "=", pos.line, pos.column)
            }
        }
    }

    fn lex_bang(&mut self, pos: Position) -> Token {
        self.advance();
        match self.peek_char() {
            Some('=') => {
                self.advance();
                Token::new(TokenKind::NotEq, "!=", pos.line, pos.column)
            }
            Some('~') => {
                self.advance();
                Token::new(TokenKind::RegexNotMatch, "!~", pos.line, pos.column)
            }
            _ => Token::new(TokenKind::Bang, "!", pos.line, pos.column),
        }
    }

    fn lex_lt(&mut self, pos: Position) -> Token {
        self.advance();
        if self.peek_char() == Some('=') {
            self.advance();
            Token::new(TokenKind::Le, "<=", pos.line, pos.column)
        } else {
            Token::new(TokenKind::Lt, "<", pos.line, pos.column)
        }
    }

    fn lex_gt(&mut self, pos: Position) -> Token {
        self.advance();
        if self.peek_char() == Some('=') {
            self.advance();
            Token::new(TokenKind::Ge, ">=", pos.line, pos.column)
        } else {
            Token::new(TokenKind::Gt, ">", pos.line, pos.column)
        }
    }

    fn lex_amp(&mut self, pos: Position) -> Token {
        self.advance();
        if self.peek_char() == Some('&') {
            self.advance();
            Token::new(TokenKind::AndAnd, "&&", pos.line, pos.column)
        } else {
            self.errors.push(Error::at(
                ErrorKind::InvalidSyntax("stray '&': did you mean '&&'?".into()),
                pos,
            ));
            Token::new(TokenKind::Illegal("&".into()), "&", pos.line, pos.column)
        }
    }

    fn lex_pipe(&mut self, pos: Position) -> Token {
        self.advance();
        if self.peek_char() == Some('|') {
            self.advance();
            Token::new(TokenKind::OrOr, "||", pos.line, pos.column)
        } else {
            self.errors.push(Error::at(
                ErrorKind::InvalidSyntax("stray '|': did you mean '||'?".into()),
                pos,
            ));
            Token::new(TokenKind::Illegal("|".into()), "|", pos.line, pos.column)
        }
    }

    fn lex_string(&mut self, quote: char, pos: Position) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => {
                    self.errors
                        .push(Error::at(ErrorKind::UnterminatedString, pos));
                    break;
                }
                Some('\n') => {
                    self.errors
                        .push(Error::at(ErrorKind::UnterminatedString, pos));
                    break;
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            value.push('\n');
                            self.advance();
                        }
                        Some('t') => {
                            value.push('\t');
                            self.advance();
                        }
                        Some('r') => {
                            value.push('\r');
                            self.advance();
                        }
                        Some('\\') => {
                            value.push('\\');
                            self.advance();
                        }
                        Some('"') => {
                            value.push('"');
                            self.advance();
                        }
                        Some('\'') => {
                            value.push('\'');
                            self.advance();
                        }
                        Some('0') => {
                            value.push('\0');
                            self.advance();
                        }
                        Some(other) => {
                            self.errors
                                .push(Error::at(ErrorKind::InvalidEscape(other), pos));
                            value.push(other);
                            self.advance();
                        }
                        None => {
                            self.errors
                                .push(Error::at(ErrorKind::UnterminatedString, pos));
                        }
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Token::new(TokenKind::Str(value.clone()), value, pos.line, pos.column)
    }

    fn lex_number(&mut self, pos: Position) -> Token {
        let (rest, text) = number_literal(self.rest()).expect("peeked a digit");
        self.advance_by_str(text);
        let is_float = text.contains('.') || text.contains('e') || text.contains('E');
        let _ = rest;
        if is_float {
            match text.parse::<f64>() {
                Ok(n) => Token::new(TokenKind::Float(n), text, pos.line, pos.column),
                Err(_) => {
                    self.errors
                        .push(Error::at(ErrorKind::InvalidNumber(text.to_string()), pos));
                    Token::new(TokenKind::Illegal(text.to_string()), text, pos.line, pos.column)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(n) => Token::new(TokenKind::Int(n), text, pos.line, pos.column),
                Err(_) => {
                    self.errors
                        .push(Error::at(ErrorKind::InvalidNumber(text.to_string()), pos));
                    Token::new(TokenKind::Illegal(text.to_string()), text, pos.line, pos.column)
                }
            }
        }
    }

    fn lex_identifier_or_keyword(&mut self, pos: Position) -> Token {
        let (_, text) = identifier_text(self.rest()).expect("peeked an identifier start");
        let text = text.to_string();
        self.advance_by_str(&text);

        let lower = text.to_ascii_lowercase();
        match lower.as_str() {
            "and" => return Token::new(TokenKind::And, text, pos.line, pos.column),
            "or" => return Token::new(TokenKind::Or, text, pos.line, pos.column),
            "in" => return Token::new(TokenKind::In, text, pos.line, pos.column),
            "not" => return self.lex_not_or_not_in(text, pos),
            _ => {}
        }
        match text.as_str() {
            "true" => Token::new(TokenKind::True, text, pos.line, pos.column),
            "false" => Token::new(TokenKind::False, text, pos.line, pos.column),
            "null" | "nil" => Token::new(TokenKind::Null, text, pos.line, pos.column),
            _ => Token::new(TokenKind::Identifier(text.clone()), text, pos.line, pos.column),
        }
    }

    /// Handles the `NOT`/`NOT IN` compound keyword per spec §4.1: on
    /// failure to find a following `IN`, position and error-list length
    /// are restored exactly.
    fn lex_not_or_not_in(&mut self, not_text: String, pos: Position) -> Token {
        let saved_pos = self.pos;
        let saved_line = self.line;
        let saved_col = self.column;
        let saved_errors_len = self.errors.len();

        self.skip_whitespace_and_comments();
        if let Some(c) = self.peek_char() {
            if c.is_alphabetic() || c == '_' {
                if let Ok((_, word)) = identifier_text(self.rest()) {
                    if word.eq_ignore_ascii_case("in") {
                        self.advance_by_str(word);
                        return Token::new(TokenKind::NotIn, format!("{} {}", not_text, word), pos.line, pos.column);
                    }
                }
            }
        }

        self.pos = saved_pos;
        self.line = saved_line;
        self.column = saved_col;
        self.errors.truncate(saved_errors_len);
        Token::new(TokenKind::Not, not_text, pos.line, pos.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn lexes_basic_punctuation_and_operators() {
        assert_eq!(
            kinds("( ) [ ] , . $"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Dollar,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_numbers() {
        let mut lexer = Lexer::new("42 3.14 1e10 2.5e-3");
        assert_eq!(lexer.next_token().kind, TokenKind::Int(42));
        assert_eq!(lexer.next_token().kind, TokenKind::Float(3.14));
        assert_eq!(lexer.next_token().kind, TokenKind::Float(1e10));
        assert_eq!(lexer.next_token().kind, TokenKind::Float(2.5e-3));
    }

    #[test]
    fn lexes_strings_with_escapes() {
        let mut lexer = Lexer::new(r#""a\nb" 'c\td'"#);
        assert_eq!(
            lexer.next_token().kind,
            TokenKind::Str("a\nb".to_string())
        );
        assert_eq!(
            lexer.next_token().kind,
            TokenKind::Str("c\td".to_string())
        );
    }

    #[test]
    fn unterminated_string_reports_error() {
        let mut lexer = Lexer::new("\"abc");
        lexer.next_token();
        assert_eq!(lexer.errors().len(), 1);
        assert_eq!(lexer.errors()[0].kind, ErrorKind::UnterminatedString);
    }

    #[test]
    fn not_in_compounds_into_single_token() {
        assert_eq!(
            kinds("NOT IN"),
            vec![TokenKind::NotIn, TokenKind::Eof]
        );
        assert_eq!(kinds("not   in"), vec![TokenKind::NotIn, TokenKind::Eof]);
    }

    #[test]
    fn bare_not_without_in_stays_not() {
        assert_eq!(
            kinds("not active"),
            vec![
                TokenKind::Not,
                TokenKind::Identifier("active".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive_for_operators_only() {
        assert_eq!(kinds("AND"), vec![TokenKind::And, TokenKind::Eof]);
        assert_eq!(kinds("And"), vec![TokenKind::And, TokenKind::Eof]);
        // literal "True" (capitalised) is not the keyword, it's an identifier
        assert_eq!(
            kinds("True"),
            vec![TokenKind::Identifier("True".into()), TokenKind::Eof]
        );
        assert_eq!(kinds("true"), vec![TokenKind::True, TokenKind::Eof]);
    }

    #[test]
    fn nil_is_an_alias_of_null() {
        assert_eq!(kinds("nil"), vec![TokenKind::Null, TokenKind::Eof]);
    }

    #[test]
    fn line_comment_is_skipped() {
        assert_eq!(
            kinds("1 // comment\n2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn block_comment_can_span_lines() {
        assert_eq!(
            kinds("1 /* a\nb */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_block_comment_reports_error() {
        let mut lexer = Lexer::new("1 /* never closed");
        lexer.next_token();
        lexer.next_token();
        assert_eq!(lexer.errors().len(), 1);
    }

    #[test]
    fn stray_ampersand_reports_targeted_diagnostic() {
        let mut lexer = Lexer::new("&");
        lexer.next_token();
        assert_eq!(lexer.errors().len(), 1);
    }

    #[test]
    fn lines_and_columns_track_across_newlines() {
        let mut lexer = Lexer::new("1\n  2");
        let first = lexer.next_token();
        assert_eq!((first.line, first.column), (1, 1));
        let second = lexer.next_token();
        assert_eq!((second.line, second.column), (2, 3));
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new("1 2");
        let peeked = lexer.peek();
        assert_eq!(peeked.kind, TokenKind::Int(1));
        let next = lexer.next_token();
        assert_eq!(next.kind, TokenKind::Int(1));
        assert_eq!(lexer.next_token().kind, TokenKind::Int(2));
    }
}
