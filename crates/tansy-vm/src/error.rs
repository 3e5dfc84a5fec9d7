//! Runtime errors and their stack-trace rendering.

use tansy_util::{render_runtime_error, StackFrameInfo};

/// The distinct ways Tansy code can fail at runtime. Each variant's
/// `Display` message is the exact wording the VM prints, matching the
/// reference interpreter's wording so existing test scripts and their
/// expected output keep working.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be either 2 numbers or 2 strings.")]
    OperandsMustBeNumbersOrStrings,
    #[error("Undefined variable '{name}'.")]
    UndefinedVariable { name: String },
    #[error("Only instances have properties.")]
    OnlyInstancesHaveProperties,
    #[error("Undefined property '{name}'.")]
    UndefinedProperty { name: String },
    #[error("Superclass must be a class.")]
    SuperclassMustBeAClass,
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Expected {expected} arguments but got {got}.")]
    WrongArity { expected: usize, got: usize },
    #[error("Only instances have methods.")]
    OnlyInstancesHaveMethods,
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("{0}")]
    Native(String),
}

/// A runtime error paired with the call stack at the moment it was raised,
/// innermost frame first.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub frames: Vec<StackFrameInfo>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, frames: Vec<StackFrameInfo>) -> Self {
        Self { kind, frames }
    }

    /// Renders the `message\n[line N] in <fn>\n...` wire format.
    pub fn render(&self) -> String {
        render_runtime_error(&self.kind.to_string(), &self.frames)
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl std::error::Error for RuntimeError {}
