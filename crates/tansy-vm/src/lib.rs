//! Value representation, heap, garbage collector, and stack VM.
//!
//! This crate owns everything downstream of compilation: the tagged
//! [`Value`] union, the heap arena and its mark-sweep collector, the
//! bytecode container ([`Chunk`]/[`OpCode`]), and the dispatch loop
//! that executes it ([`Vm`]). `tansy-compiler` depends on this crate
//! rather than the other way around, since a compiled function is a
//! heap object and the compiler needs the heap to intern string
//! constants as it emits them.

mod chunk;
mod debug;
mod error;
mod gc;
mod heap;
mod native;
mod object;
mod table;
mod value;
mod vm;

pub use chunk::{Chunk, OpCode};
pub use debug::{disassemble_chunk, disassemble_instruction, format_value};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use heap::Heap;
pub use native::clock;
pub use object::{
    NativeFn, Obj, ObjBoundMethod, ObjClass, ObjClosure, ObjFunction, ObjInstance, ObjNative,
    ObjRef, ObjUpvalue, UpvalueLocation,
};
pub use table::Table;
pub use value::Value;
pub use vm::Vm;
