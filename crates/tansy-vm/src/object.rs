//! Heap object kinds and the handle used to reference them.

use crate::chunk::Chunk;
use crate::table::Table;
use crate::value::Value;

/// A generation-counted handle into the heap arena.
///
/// This stands in for the intrusive "next object" linked list clox threads
/// through every heap allocation: instead of raw pointers, every object
/// lives at a stable slot in `Heap`'s arena and is referenced by index.
/// The generation counter distinguishes a handle to a freed-and-reused slot
/// from a handle to the object that originally lived there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}

/// A native (Rust-implemented) function callable from Tansy code.
///
/// Takes the VM so natives can raise runtime errors or, in principle,
/// interact with the heap; takes arguments as a plain slice rather than
/// reading them off the VM stack directly.
pub type NativeFn = fn(&mut crate::vm::Vm, &[Value]) -> Result<Value, String>;

pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
    /// `None` for the implicit top-level script function.
    pub name: Option<ObjRef>,
}

impl ObjFunction {
    pub fn new(name: Option<ObjRef>) -> Self {
        Self { arity: 0, upvalue_count: 0, chunk: Chunk::new(), name }
    }
}

pub struct ObjNative {
    pub name: &'static str,
    pub function: NativeFn,
}

#[derive(Clone, Copy, Debug)]
pub enum UpvalueLocation {
    /// Points at a live slot on the VM stack.
    Stack(usize),
    /// Owns its value inline; set once the stack slot it pointed to goes
    /// out of scope.
    Closed(Value),
}

pub struct ObjUpvalue {
    pub location: UpvalueLocation,
}

pub struct ObjClosure {
    pub function: ObjRef,
    pub upvalues: Vec<ObjRef>,
}

pub struct ObjClass {
    pub name: ObjRef,
    pub methods: Table,
}

impl ObjClass {
    pub fn new(name: ObjRef) -> Self {
        Self { name, methods: Table::new() }
    }
}

pub struct ObjInstance {
    pub class: ObjRef,
    pub fields: Table,
}

impl ObjInstance {
    pub fn new(class: ObjRef) -> Self {
        Self { class, fields: Table::new() }
    }
}

pub struct ObjBoundMethod {
    pub receiver: Value,
    pub method: ObjRef,
}

/// Every kind of heap-allocated Tansy value.
pub enum Obj {
    String { data: Box<str>, hash: u32 },
    Function(ObjFunction),
    Native(ObjNative),
    Closure(ObjClosure),
    Upvalue(ObjUpvalue),
    Class(ObjClass),
    Instance(ObjInstance),
    BoundMethod(ObjBoundMethod),
}

impl Obj {
    pub fn type_name(&self) -> &'static str {
        match self {
            Obj::String { .. } => "string",
            Obj::Function(_) => "function",
            Obj::Native(_) => "native function",
            Obj::Closure(_) => "function",
            Obj::Upvalue(_) => "upvalue",
            Obj::Class(_) => "class",
            Obj::Instance(_) => "instance",
            Obj::BoundMethod(_) => "bound method",
        }
    }
}
