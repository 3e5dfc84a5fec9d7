//! Span and diagnostic-rendering types shared by the Tansy toolchain's
//! compiler and VM crates.

pub mod diagnostic;
pub mod span;

pub use diagnostic::{render_compile_error, render_runtime_error, ErrorLocation, StackFrameInfo};
pub use span::Span;
