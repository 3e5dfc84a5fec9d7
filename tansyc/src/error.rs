//! Error handling for the tansyc CLI.
//!
//! This module provides a structured error type using `thiserror`, plus
//! the `sysexits.h`-style exit codes that `main` maps each variant to.

use tansy_compiler::CompileError;
use tansy_vm::RuntimeError;
use thiserror::Error;

/// Every diagnostic collected by one compile attempt, rendered one per line.
#[derive(Debug)]
pub struct CompileErrors(pub Vec<CompileError>);

impl std::fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

/// Main error type for the tansyc CLI application.
#[derive(Error, Debug)]
pub enum TansycError {
    /// Compilation failed; one error per recovered parse failure.
    #[error(transparent)]
    Compile(#[from] CompileErrors),

    /// The script ran but raised an uncaught runtime error.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Error when a required configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error when IO operations fail.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TansycError {
    pub fn from_compile_errors(errors: Vec<CompileError>) -> Self {
        TansycError::Compile(CompileErrors(errors))
    }

    /// The process exit code this error should produce, matching clox's
    /// `main.c` (`EX_DATAERR` for a compile error, `EX_SOFTWARE` for an
    /// uncaught runtime error).
    pub fn exit_code(&self) -> i32 {
        match self {
            TansycError::Compile(_) => 65,
            TansycError::Runtime(_) => 70,
            TansycError::Config(_) | TansycError::Io(_) => 1,
        }
    }
}

/// Result type alias using `TansycError`.
pub type Result<T> = std::result::Result<T, TansycError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tansy_util::{ErrorLocation, Span};

    #[test]
    fn compile_error_exit_code_is_65() {
        let err = TansycError::from_compile_errors(vec![CompileError::new(
            Span::new(1),
            ErrorLocation::Eof,
            "Expect expression.",
        )]);
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn config_error_exit_code_is_one() {
        let err = TansycError::Config("missing field".to_string());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn compile_error_display_joins_each_rendered_diagnostic() {
        let err = TansycError::from_compile_errors(vec![
            CompileError::new(Span::new(1), ErrorLocation::Eof, "Expect expression."),
            CompileError::new(Span::new(2), ErrorLocation::Token("}".to_string()), "Unexpected token."),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("[line 1] Error at end: Expect expression."));
        assert!(rendered.contains("[line 2] Error at '}': Unexpected token."));
    }
}
