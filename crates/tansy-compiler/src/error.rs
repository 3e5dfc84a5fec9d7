//! Compile-time diagnostics.

use tansy_util::{render_compile_error, ErrorLocation, Span};

/// The diagnostic text for one compile failure, with no location
/// information attached — [`CompileError`] pairs this with a [`Span`] and
/// an [`ErrorLocation`] to produce clox's full wire format.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CompileErrorKind {
    pub message: String,
}

impl CompileErrorKind {
    /// # Example
    ///
    /// ```
    /// use tansy_compiler::CompileErrorKind;
    ///
    /// let kind = CompileErrorKind::new("Expect expression.");
    /// assert_eq!(kind.message, "Expect expression.");
    /// ```
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// One parse/compile failure, already carrying enough to render clox's
/// `[line L] Error at 'lexeme': message` wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub span: Span,
    pub location: ErrorLocation,
    pub kind: CompileErrorKind,
}

impl CompileError {
    /// # Example
    ///
    /// ```
    /// use tansy_compiler::CompileError;
    /// use tansy_util::{ErrorLocation, Span};
    ///
    /// let err = CompileError::new(Span::new(4), ErrorLocation::Eof, "Expect '}' after block.");
    /// assert_eq!(err.span, Span::new(4));
    /// ```
    pub fn new(span: Span, location: ErrorLocation, message: impl Into<String>) -> Self {
        Self { span, location, kind: CompileErrorKind::new(message) }
    }

    /// Renders the `[line L] Error at 'lexeme': message` wire format a
    /// script's compile errors are reported in.
    ///
    /// # Example
    ///
    /// ```
    /// use tansy_compiler::CompileError;
    /// use tansy_util::{ErrorLocation, Span};
    ///
    /// let err = CompileError::new(
    ///     Span::new(4),
    ///     ErrorLocation::Token("+".to_string()),
    ///     "Expect expression.",
    /// );
    /// assert_eq!(err.render(), "[line 4] Error at '+': Expect expression.");
    /// ```
    pub fn render(&self) -> String {
        render_compile_error(self.span, &self.location, &self.kind.message)
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_at_token_location() {
        let err = CompileError::new(
            Span::new(4),
            ErrorLocation::Token("+".to_string()),
            "Expect expression.",
        );
        assert_eq!(err.render(), "[line 4] Error at '+': Expect expression.");
    }
}
