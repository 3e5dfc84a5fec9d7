//! Scanner: turns source text into a stream of [`Token`]s on demand.

use crate::cursor::Cursor;
use crate::token::{keyword_kind, Token, TokenKind};
use tansy_util::Span;

pub struct Scanner<'src> {
    cursor: Cursor<'src>,
    token_start: usize,
    token_start_line: u32,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            token_start: 0,
            token_start_line: 1,
        }
    }

    /// Scans and returns the next token, or an `Eof` token once the source
    /// is exhausted. Lexical errors are returned as `Error` tokens rather
    /// than panicking, so the compiler can keep scanning past them.
    pub fn scan_token(&mut self) -> Token<'src> {
        self.skip_whitespace_and_comments();
        self.token_start = self.cursor.position();
        self.token_start_line = self.cursor.line();

        if self.cursor.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        let c = self.cursor.advance();

        if is_identifier_start(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            '{' => self.make_token(TokenKind::LeftBrace),
            '}' => self.make_token(TokenKind::RightBrace),
            ';' => self.make_token(TokenKind::Semicolon),
            ',' => self.make_token(TokenKind::Comma),
            '.' => self.make_token(TokenKind::Dot),
            '-' => self.make_token(TokenKind::Minus),
            '+' => self.make_token(TokenKind::Plus),
            '/' => self.make_token(TokenKind::Slash),
            '*' => self.make_token(TokenKind::Star),
            '%' => self.make_token(TokenKind::Percent),
            '!' => {
                let kind = if self.cursor.match_char('=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.make_token(kind)
            }
            '=' => {
                let kind = if self.cursor.match_char('=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                self.make_token(kind)
            }
            '<' => {
                let kind = if self.cursor.match_char('=') { TokenKind::LessEqual } else { TokenKind::Less };
                self.make_token(kind)
            }
            '>' => {
                let kind = if self.cursor.match_char('=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                self.make_token(kind)
            }
            '"' => self.string(),
            _ => Token::error(format!("Unexpected character '{c}'."), Span::new(self.token_start_line)),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.cursor.current_char() {
                ' ' | '\r' | '\t' | '\n' => {
                    self.cursor.advance();
                }
                '/' if self.peek_next() == '/' => {
                    while self.cursor.current_char() != '\n' && !self.cursor.is_at_end() {
                        self.cursor.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn peek_next(&self) -> char {
        self.cursor.char_at(1)
    }

    fn identifier(&mut self) -> Token<'src> {
        while is_identifier_continue(self.cursor.current_char()) {
            self.cursor.advance();
        }
        let text = self.cursor.slice_from(self.token_start);
        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        self.make_token(kind)
    }

    fn number(&mut self) -> Token<'src> {
        while self.cursor.current_char().is_ascii_digit() {
            self.cursor.advance();
        }
        if self.cursor.current_char() == '.' && self.peek_next().is_ascii_digit() {
            self.cursor.advance();
            while self.cursor.current_char().is_ascii_digit() {
                self.cursor.advance();
            }
        }
        self.make_token(TokenKind::Number)
    }

    fn string(&mut self) -> Token<'src> {
        while self.cursor.current_char() != '"' && !self.cursor.is_at_end() {
            self.cursor.advance();
        }
        if self.cursor.is_at_end() {
            return Token::error("Unterminated string.", Span::new(self.token_start_line));
        }
        self.cursor.advance(); // closing quote
        self.make_token(TokenKind::String)
    }

    fn make_token(&self, kind: TokenKind) -> Token<'src> {
        let lexeme = self.cursor.slice_from(self.token_start);
        Token::new(kind, lexeme, Span::new(self.token_start_line))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        loop {
            let tok = scanner.scan_token();
            let done = tok.kind == TokenKind::Eof;
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_punctuation() {
        assert_eq!(
            kinds("(){};,.+-*/%"),
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::Semicolon,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_two_char_operators() {
        assert_eq!(
            kinds("!= == <= >= ! = < >"),
            vec![
                TokenKind::BangEqual,
                TokenKind::EqualEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Bang,
                TokenKind::Equal,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_keywords_vs_identifiers() {
        assert_eq!(
            kinds("var x = this and that"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::This,
                TokenKind::And,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_numbers_with_decimals() {
        let mut scanner = Scanner::new("123 4.5");
        let first = scanner.scan_token();
        assert_eq!(first.kind, TokenKind::Number);
        assert_eq!(first.lexeme, "123");
        let second = scanner.scan_token();
        assert_eq!(second.kind, TokenKind::Number);
        assert_eq!(second.lexeme, "4.5");
    }

    #[test]
    fn scans_strings() {
        let mut scanner = Scanner::new("\"hello world\"");
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.lexeme, "\"hello world\"");
    }

    #[test]
    fn unterminated_string_is_error_token() {
        let mut scanner = Scanner::new("\"oops");
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::Error);
        assert_eq!(tok.error.as_deref(), Some("Unterminated string."));
    }

    #[test]
    fn unexpected_character_is_error_token() {
        let mut scanner = Scanner::new("@");
        let tok = scanner.scan_token();
        assert_eq!(tok.kind, TokenKind::Error);
        assert!(tok.error.unwrap().contains('@'));
    }

    #[test]
    fn line_comments_are_skipped() {
        assert_eq!(kinds("// a comment\nvar"), vec![TokenKind::Var, TokenKind::Eof]);
    }

    #[test]
    fn tracks_line_numbers_across_newlines() {
        let mut scanner = Scanner::new("var\nvar\nvar");
        assert_eq!(scanner.scan_token().line, Span::new(1));
        assert_eq!(scanner.scan_token().line, Span::new(2));
        assert_eq!(scanner.scan_token().line, Span::new(3));
    }
}
