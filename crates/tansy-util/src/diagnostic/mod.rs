//! Shared diagnostic rendering.
//!
//! The compiler and the VM each define their own `thiserror` error enum, but
//! both need to print in one of exactly two wire formats that a reader
//! (and tests) can rely on verbatim:
//!
//! - compile-time: `[line 4] Error at 'end': Expect ';' after value.`
//! - runtime: the error message followed by a `[line N] in <fn>` stack trace,
//!   innermost frame first.
//!
//! Centralizing the formatting here means both crates render through the
//! same two functions instead of hand-rolling `format!` calls at each call
//! site.

use crate::span::Span;

/// Where a compile error occurred relative to the offending token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorLocation {
    /// The token itself is named in the message, e.g. `at 'end'`.
    Token(String),
    /// The error was detected at end of input.
    Eof,
    /// No specific token is blamed (e.g. a lexer-level message already
    /// carries its own description).
    None,
}

/// Render a compile-time diagnostic as `[line L] Error<where>: message`.
///
/// Matches the single format clox's `errorAt` produces, e.g.:
/// `[line 3] Error at '+': Expect expression.`
pub fn render_compile_error(span: Span, location: &ErrorLocation, message: &str) -> String {
    let where_clause = match location {
        ErrorLocation::Token(lexeme) => format!(" at '{lexeme}'"),
        ErrorLocation::Eof => " at end".to_string(),
        ErrorLocation::None => String::new(),
    };
    format!("[line {}] Error{}: {}", span.line, where_clause, message)
}

/// One entry in a runtime stack trace, innermost frame last in the call
/// chain but printed top-first to match clox's `runtimeError`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrameInfo {
    pub line: u32,
    /// Function name, or `"script"` for the top-level frame.
    pub function_name: String,
}

/// Render a runtime error message followed by its call stack trace.
///
/// Produces the `message\n[line N] in <fn>\n...` format, frames ordered
/// from the one that raised the error outward to `script`.
pub fn render_runtime_error(message: &str, frames: &[StackFrameInfo]) -> String {
    let mut out = String::from(message);
    for frame in frames {
        out.push('\n');
        if frame.function_name == "script" {
            out.push_str(&format!("[line {}] in script", frame.line));
        } else {
            out.push_str(&format!("[line {}] in {}()", frame.line, frame.function_name));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_at_token() {
        let msg = render_compile_error(
            Span::new(4),
            &ErrorLocation::Token("end".to_string()),
            "Expect ';' after value.",
        );
        assert_eq!(msg, "[line 4] Error at 'end': Expect ';' after value.");
    }

    #[test]
    fn compile_error_at_eof() {
        let msg = render_compile_error(Span::new(9), &ErrorLocation::Eof, "Unexpected end of file.");
        assert_eq!(msg, "[line 9] Error at end: Unexpected end of file.");
    }

    #[test]
    fn compile_error_no_location() {
        let msg = render_compile_error(Span::new(1), &ErrorLocation::None, "Unterminated string.");
        assert_eq!(msg, "[line 1] Error: Unterminated string.");
    }

    #[test]
    fn runtime_error_with_trace() {
        let frames = vec![
            StackFrameInfo { line: 2, function_name: "inner".to_string() },
            StackFrameInfo { line: 5, function_name: "outer".to_string() },
            StackFrameInfo { line: 8, function_name: "script".to_string() },
        ];
        let rendered = render_runtime_error("Undefined variable 'x'.", &frames);
        assert_eq!(
            rendered,
            "Undefined variable 'x'.\n[line 2] in inner()\n[line 5] in outer()\n[line 8] in script"
        );
    }

    #[test]
    fn runtime_error_no_frames() {
        let rendered = render_runtime_error("Stack overflow.", &[]);
        assert_eq!(rendered, "Stack overflow.");
    }
}
