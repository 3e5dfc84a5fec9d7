//! Per-token parse rules: a prefix handler, an infix handler, and the
//! infix operator's binding precedence. `parse_precedence` in
//! `compiler.rs` is the only thing that consults this table.

use crate::compiler::Compiler;
use tansy_lex::TokenKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    pub fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Primary,
            Precedence::Primary => Precedence::Primary,
        }
    }
}

pub type ParseFn = fn(&mut Compiler, bool);

#[derive(Clone, Copy)]
pub struct ParseRule {
    pub prefix: Option<ParseFn>,
    pub infix: Option<ParseFn>,
    pub precedence: Precedence,
}

fn rule(prefix: Option<ParseFn>, infix: Option<ParseFn>, precedence: Precedence) -> ParseRule {
    ParseRule { prefix, infix, precedence }
}

/// Looks up the parse rule for a token kind. A match rather than an array
/// indexed by discriminant, so it stays correct regardless of how
/// `TokenKind`'s variants are ordered or renumbered.
pub fn get_rule(kind: TokenKind) -> ParseRule {
    use Precedence::*;
    use TokenKind::*;
    match kind {
        LeftParen => rule(Some(Compiler::grouping), Some(Compiler::call), Call),
        RightParen => rule(None, None, None_),
        LeftBrace => rule(None, None, None_),
        RightBrace => rule(None, None, None_),
        Comma => rule(None, None, None_),
        Dot => rule(None, Some(Compiler::dot), Call),
        Minus => rule(Some(Compiler::unary), Some(Compiler::binary), Term),
        Plus => rule(None, Some(Compiler::binary), Term),
        Semicolon => rule(None, None, None_),
        Slash => rule(None, Some(Compiler::binary), Factor),
        Star => rule(None, Some(Compiler::binary), Factor),
        Percent => rule(None, Some(Compiler::binary), Factor),
        Bang => rule(Some(Compiler::unary), None, None_),
        BangEqual => rule(None, Some(Compiler::binary), Equality),
        Equal => rule(None, None, None_),
        EqualEqual => rule(None, Some(Compiler::binary), Equality),
        Greater => rule(None, Some(Compiler::binary), Comparison),
        GreaterEqual => rule(None, Some(Compiler::binary), Comparison),
        Less => rule(None, Some(Compiler::binary), Comparison),
        LessEqual => rule(None, Some(Compiler::binary), Comparison),
        Identifier => rule(Some(Compiler::variable), None, None_),
        String => rule(Some(Compiler::string), None, None_),
        Number => rule(Some(Compiler::number), None, None_),
        And => rule(None, Some(Compiler::and_), And),
        Class => rule(None, None, None_),
        Else => rule(None, None, None_),
        False => rule(Some(Compiler::literal), None, None_),
        For => rule(None, None, None_),
        Fun => rule(None, None, None_),
        If => rule(None, None, None_),
        Nil => rule(Some(Compiler::literal), None, None_),
        Or => rule(None, Some(Compiler::or_), Or),
        Print => rule(None, None, None_),
        Return => rule(None, None, None_),
        Super => rule(Some(Compiler::super_), None, None_),
        This => rule(Some(Compiler::this_), None, None_),
        True => rule(Some(Compiler::literal), None, None_),
        Var => rule(None, None, None_),
        While => rule(None, None, None_),
        TokenKind::Error => rule(None, None, None_),
        Eof => rule(None, None, None_),
    }
}

#[allow(non_upper_case_globals)]
const None_: Precedence = Precedence::None;
