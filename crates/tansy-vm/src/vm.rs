//! The stack-based bytecode interpreter.
//!
//! `Vm::run` is the dispatch loop; everything else on `Vm` exists to
//! support it (call-frame bookkeeping, method binding, upvalue
//! open/close, and the two GC-safe allocation entry points the rest of
//! the crate is expected to allocate through).

use crate::chunk::OpCode;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::heap::Heap;
use crate::native;
use crate::object::{
    NativeFn, Obj, ObjBoundMethod, ObjClosure, ObjInstance, ObjNative, ObjUpvalue, ObjRef,
    UpvalueLocation,
};
use crate::table::Table;
use crate::value::Value;
use std::time::Instant;
use tansy_util::StackFrameInfo;

const FRAMES_MAX: usize = 64;
const STACK_MAX: usize = FRAMES_MAX * 256;

struct CallFrame {
    pub(crate) closure: ObjRef,
    ip: usize,
    slot_base: usize,
}

/// Owns the heap, the value stack, and the call-frame stack, and drives
/// bytecode dispatch. Every heap allocation made while a `Vm` is alive
/// should go through [`Vm::alloc`] or [`Vm::intern`] rather than
/// `Heap::allocate`/`Heap::intern_string` directly, so a collection
/// triggered partway through a multi-step operation can't reclaim an
/// object that exists but isn't reachable from a root yet.
pub struct Vm {
    pub(crate) heap: Heap,
    pub(crate) stack: Vec<Value>,
    pub(crate) frames: Vec<CallFrame>,
    pub(crate) globals: Table,
    pub(crate) open_upvalues: Vec<ObjRef>,
    pub(crate) init_string: ObjRef,
    pub(crate) compiler_roots: Vec<Value>,
    start_time: Instant,
}

impl Vm {
    /// Creates a fresh VM with an empty heap, globals table, and stack,
    /// and defines the native functions every script gets for free
    /// (currently just `clock`).
    ///
    /// # Example
    ///
    /// ```
    /// use tansy_vm::Vm;
    ///
    /// let mut vm = Vm::new();
    /// let name = vm.intern("clock");
    /// let hash = vm.heap().string_hash(name);
    /// assert!(vm.globals().get(name, hash).is_some());
    /// ```
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern_string("init");
        let mut vm = Self {
            heap,
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            open_upvalues: Vec::new(),
            init_string,
            compiler_roots: Vec::new(),
            start_time: native::startup_instant(),
        };
        vm.define_native("clock", native::clock);
        vm
    }

    /// The instant this VM was created, the epoch the `clock` native
    /// function measures elapsed seconds against.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Read-only access to the heap, for inspecting object contents
    /// (string data, field tables, and so on) from outside the crate.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// Read-only access to the global variable table.
    ///
    /// # Example
    ///
    /// ```
    /// use tansy_vm::{Value, Vm};
    ///
    /// let mut vm = Vm::new();
    /// let name = vm.intern("answer");
    /// let hash = vm.heap().string_hash(name);
    /// vm.globals_mut().set(name, hash, Value::Number(42.0));
    /// assert_eq!(vm.globals().get(name, hash), Some(Value::Number(42.0)));
    /// ```
    pub fn globals(&self) -> &Table {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut Table {
        &mut self.globals
    }

    /// Turns stress-mode GC on or off: while enabled, every allocation
    /// that would otherwise only check the heap's size threshold runs a
    /// full collection instead, to shake out missing roots in tests.
    ///
    /// # Example
    ///
    /// ```
    /// use tansy_vm::Vm;
    ///
    /// let mut vm = Vm::new();
    /// vm.stress_gc(true);
    /// // Every subsequent `alloc`/`intern` call now collects first.
    /// vm.intern("allocated under stress gc");
    /// ```
    pub fn stress_gc(&mut self, enabled: bool) {
        self.heap.stress_gc = enabled;
    }

    /// Allocates `obj`, running a collection first if the heap is due for
    /// one. The freshly allocated object is held on the value stack as a
    /// temporary root for the duration of that check, so it can't be the
    /// very thing collected.
    pub fn alloc(&mut self, obj: Obj) -> ObjRef {
        let handle = self.heap.allocate(obj);
        self.stack.push(Value::Object(handle));
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.stack.pop();
        handle
    }

    /// Interns `text`, with the same temporary-root protection as [`Vm::alloc`].
    pub fn intern(&mut self, text: &str) -> ObjRef {
        let handle = self.heap.intern_string(text);
        self.stack.push(Value::Object(handle));
        if self.heap.should_collect() {
            self.collect_garbage();
        }
        self.stack.pop();
        handle
    }

    /// Roots `value` until the matching [`Vm::pop_compiler_root`], so it
    /// survives a collection triggered by a later allocation while still
    /// held only by in-progress compiler state (a function's constant pool
    /// before that function itself is heap-allocated, for example). This is
    /// the compiler's counterpart to the value stack: `tansy-compiler`
    /// pushes every constant it adds and pops them in a batch once the
    /// function that owns them finishes compiling.
    ///
    /// ```
    /// use tansy_vm::{Value, Vm};
    /// let mut vm = Vm::new();
    /// let s = vm.intern("kept across a gc");
    /// vm.push_compiler_root(Value::Object(s));
    /// vm.stress_gc(true);
    /// // Any further allocation under stress mode runs a full collection;
    /// // `s` survives it only because it's been pushed as a compiler root.
    /// vm.intern("triggers a stress collection");
    /// assert_eq!(vm.heap().string_content(s), "kept across a gc");
    /// vm.pop_compiler_root();
    /// ```
    pub fn push_compiler_root(&mut self, value: Value) {
        self.compiler_roots.push(value);
    }

    /// Pops the most recently pushed compiler root.
    ///
    /// Panics if none remain; that would mean a push/pop mismatch in the
    /// compiler rather than anything a caller can recover from.
    pub fn pop_compiler_root(&mut self) {
        self.compiler_roots.pop().expect("compiler root stack underflow");
    }

    /// Registers `function` as a global callable under `name`, the way
    /// [`Vm::new`] wires up `clock`.
    ///
    /// # Example
    ///
    /// ```
    /// use tansy_vm::{Value, Vm};
    ///
    /// fn one(_vm: &mut Vm, _args: &[Value]) -> Result<Value, String> {
    ///     Ok(Value::Number(1.0))
    /// }
    ///
    /// let mut vm = Vm::new();
    /// vm.define_native("one", one);
    /// let name = vm.intern("one");
    /// let hash = vm.heap().string_hash(name);
    /// assert!(vm.globals().get(name, hash).is_some());
    /// ```
    pub fn define_native(&mut self, name: &'static str, function: NativeFn) {
        let name_ref = self.intern(name);
        let native_ref = self.alloc(Obj::Native(ObjNative { name, function }));
        let hash = self.heap.string_hash(name_ref);
        self.globals.set(name_ref, hash, Value::Object(native_ref));
    }

    /// Runs a compiled top-level script function (arity 0, no upvalues).
    pub fn interpret(&mut self, script: ObjRef) -> Result<(), RuntimeError> {
        let closure_ref = self.alloc(Obj::Closure(ObjClosure { function: script, upvalues: Vec::new() }));
        self.stack.push(Value::Object(closure_ref));
        self.call(closure_ref, 0)?;
        self.run()
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn read_byte(&mut self) -> u8 {
        let frame_index = self.frames.len() - 1;
        let ip = self.frames[frame_index].ip;
        let closure_ref = self.frames[frame_index].closure;
        let byte = {
            let function_ref = match self.heap.get(closure_ref) {
                Obj::Closure(c) => c.function,
                _ => unreachable!("frame closure is not a closure"),
            };
            match self.heap.get(function_ref) {
                Obj::Function(f) => f.chunk.code[ip],
                _ => unreachable!("closure function is not a function"),
            }
        };
        self.frames[frame_index].ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let hi = self.read_byte() as u16;
        let lo = self.read_byte() as u16;
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        let frame_index = self.frames.len() - 1;
        let closure_ref = self.frames[frame_index].closure;
        let function_ref = match self.heap.get(closure_ref) {
            Obj::Closure(c) => c.function,
            _ => unreachable!(),
        };
        match self.heap.get(function_ref) {
            Obj::Function(f) => f.chunk.constants[index],
            _ => unreachable!(),
        }
    }

    fn read_string(&mut self) -> ObjRef {
        match self.read_constant() {
            Value::Object(r) => r,
            _ => unreachable!("constant is not a string"),
        }
    }

    fn is_string(&self, value: Value) -> bool {
        matches!(value, Value::Object(r) if matches!(self.heap.get(r), Obj::String { .. }))
    }

    fn runtime_error(&self, kind: RuntimeErrorKind) -> RuntimeError {
        let mut frames = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let function_ref = match self.heap.get(frame.closure) {
                Obj::Closure(c) => c.function,
                _ => unreachable!(),
            };
            let (line, function_name) = match self.heap.get(function_ref) {
                Obj::Function(f) => {
                    let line = f.chunk.line_at(frame.ip.saturating_sub(1));
                    let name = match f.name {
                        Some(name_ref) => self.heap.string_content(name_ref).to_string(),
                        None => "script".to_string(),
                    };
                    (line, name)
                }
                _ => unreachable!(),
            };
            frames.push(StackFrameInfo { line, function_name });
        }
        RuntimeError::new(kind, frames)
    }

    fn find_method(&self, class_ref: ObjRef, name: ObjRef) -> Option<ObjRef> {
        let hash = self.heap.string_hash(name);
        match self.heap.get(class_ref) {
            Obj::Class(c) => c.methods.get(name, hash).and_then(|v| v.as_object()),
            _ => None,
        }
    }

    fn bind_method(&mut self, class_ref: ObjRef, name: ObjRef) -> Result<(), RuntimeError> {
        let method = match self.find_method(class_ref, name) {
            Some(m) => m,
            None => {
                return Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty {
                    name: self.heap.string_content(name).to_string(),
                }))
            }
        };
        let receiver = self.peek(0);
        let bound = self.alloc(Obj::BoundMethod(ObjBoundMethod { receiver, method }));
        self.pop();
        self.push(Value::Object(bound))
    }

    fn define_method(&mut self, name: ObjRef) {
        let method = self.pop();
        let hash = self.heap.string_hash(name);
        let class_ref = match self.peek(0) {
            Value::Object(r) => r,
            _ => unreachable!("class is not on top of the stack"),
        };
        if let Obj::Class(c) = self.heap.get_mut(class_ref) {
            c.methods.set(name, hash, method);
        }
    }

    fn capture_upvalue(&mut self, stack_index: usize) -> ObjRef {
        for &existing in &self.open_upvalues {
            if let Obj::Upvalue(u) = self.heap.get(existing) {
                if let UpvalueLocation::Stack(idx) = u.location {
                    if idx == stack_index {
                        return existing;
                    }
                }
            }
        }
        let created = self.alloc(Obj::Upvalue(ObjUpvalue { location: UpvalueLocation::Stack(stack_index) }));
        self.open_upvalues.push(created);
        created
    }

    fn close_upvalues(&mut self, from_stack_index: usize) {
        let pending = std::mem::take(&mut self.open_upvalues);
        for up_ref in pending {
            let stack_index = match self.heap.get(up_ref) {
                Obj::Upvalue(u) => match u.location {
                    UpvalueLocation::Stack(idx) => Some(idx),
                    UpvalueLocation::Closed(_) => None,
                },
                _ => None,
            };
            match stack_index {
                Some(idx) if idx >= from_stack_index => {
                    let value = self.stack[idx];
                    if let Obj::Upvalue(u) = self.heap.get_mut(up_ref) {
                        u.location = UpvalueLocation::Closed(value);
                    }
                }
                _ => self.open_upvalues.push(up_ref),
            }
        }
    }

    fn call(&mut self, closure_ref: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let function_ref = match self.heap.get(closure_ref) {
            Obj::Closure(c) => c.function,
            _ => unreachable!("call target is not a closure"),
        };
        let arity = match self.heap.get(function_ref) {
            Obj::Function(f) => f.arity,
            _ => unreachable!(),
        };
        if arg_count != arity {
            return Err(self.runtime_error(RuntimeErrorKind::WrongArity {
                expected: arity as usize,
                got: arg_count as usize,
            }));
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(self.runtime_error(RuntimeErrorKind::StackOverflow));
        }
        let slot_base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame { closure: closure_ref, ip: 0, slot_base });
        Ok(())
    }

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        let r = match callee {
            Value::Object(r) => r,
            _ => return Err(self.runtime_error(RuntimeErrorKind::NotCallable)),
        };

        enum Callable {
            Closure,
            Native(NativeFn),
            Class,
            BoundMethod { receiver: Value, method: ObjRef },
            Other,
        }

        let callable = match self.heap.get(r) {
            Obj::Closure(_) => Callable::Closure,
            Obj::Native(n) => Callable::Native(n.function),
            Obj::Class(_) => Callable::Class,
            Obj::BoundMethod(b) => Callable::BoundMethod { receiver: b.receiver, method: b.method },
            _ => Callable::Other,
        };

        match callable {
            Callable::Closure => self.call(r, arg_count),
            Callable::Native(function) => {
                let args_start = self.stack.len() - arg_count as usize;
                let args: Vec<Value> = self.stack[args_start..].to_vec();
                match function(self, &args) {
                    Ok(result) => {
                        self.stack.truncate(args_start - 1);
                        self.push(result)
                    }
                    Err(message) => Err(self.runtime_error(RuntimeErrorKind::Native(message))),
                }
            }
            Callable::Class => {
                let instance = self.alloc(Obj::Instance(ObjInstance::new(r)));
                let args_start = self.stack.len() - arg_count as usize - 1;
                self.stack[args_start] = Value::Object(instance);
                let init = self.init_string;
                if let Some(initializer) = self.find_method(r, init) {
                    self.call(initializer, arg_count)
                } else if arg_count != 0 {
                    Err(self.runtime_error(RuntimeErrorKind::WrongArity { expected: 0, got: arg_count as usize }))
                } else {
                    Ok(())
                }
            }
            Callable::BoundMethod { receiver, method } => {
                let args_start = self.stack.len() - arg_count as usize - 1;
                self.stack[args_start] = receiver;
                self.call(method, arg_count)
            }
            Callable::Other => Err(self.runtime_error(RuntimeErrorKind::NotCallable)),
        }
    }

    fn invoke_from_class(&mut self, class_ref: ObjRef, name: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        match self.find_method(class_ref, name) {
            Some(method) => self.call(method, arg_count),
            None => Err(self.runtime_error(RuntimeErrorKind::UndefinedProperty {
                name: self.heap.string_content(name).to_string(),
            })),
        }
    }

    fn invoke(&mut self, name: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver_index = self.stack.len() - arg_count as usize - 1;
        let instance_ref = match self.stack[receiver_index] {
            Value::Object(r) if matches!(self.heap.get(r), Obj::Instance(_)) => r,
            _ => return Err(self.runtime_error(RuntimeErrorKind::OnlyInstancesHaveMethods)),
        };

        let hash = self.heap.string_hash(name);
        let field = match self.heap.get(instance_ref) {
            Obj::Instance(i) => i.fields.get(name, hash),
            _ => unreachable!(),
        };
        // A field that shadows a method wins, matching property-read semantics.
        if let Some(value) = field {
            self.stack[receiver_index] = value;
            return self.call_value(value, arg_count);
        }

        let class_ref = match self.heap.get(instance_ref) {
            Obj::Instance(i) => i.class,
            _ => unreachable!(),
        };
        self.invoke_from_class(class_ref, name, arg_count)
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let op = match OpCode::from_byte(self.read_byte()) {
                Some(op) => op,
                None => unreachable!("malformed bytecode"),
            };

            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slot_base;
                    let value = self.stack[base + slot];
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let base = self.frames.last().unwrap().slot_base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.string_hash(name);
                    match self.globals.get(name, hash) {
                        Some(value) => self.push(value)?,
                        None => {
                            return Err(self.runtime_error(RuntimeErrorKind::UndefinedVariable {
                                name: self.heap.string_content(name).to_string(),
                            }))
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.string_hash(name);
                    let value = self.peek(0);
                    self.globals.set(name, hash, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let hash = self.heap.string_hash(name);
                    if self.globals.set(name, hash, self.peek(0)) {
                        self.globals.delete(name, hash);
                        return Err(self.runtime_error(RuntimeErrorKind::UndefinedVariable {
                            name: self.heap.string_content(name).to_string(),
                        }));
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure_ref = self.frames.last().unwrap().closure;
                    let upvalue_ref = match self.heap.get(closure_ref) {
                        Obj::Closure(c) => c.upvalues[slot],
                        _ => unreachable!(),
                    };
                    let value = match self.heap.get(upvalue_ref) {
                        Obj::Upvalue(u) => match u.location {
                            UpvalueLocation::Stack(idx) => self.stack[idx],
                            UpvalueLocation::Closed(v) => v,
                        },
                        _ => unreachable!(),
                    };
                    self.push(value)?;
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let closure_ref = self.frames.last().unwrap().closure;
                    let upvalue_ref = match self.heap.get(closure_ref) {
                        Obj::Closure(c) => c.upvalues[slot],
                        _ => unreachable!(),
                    };
                    let value = self.peek(0);
                    let location = match self.heap.get(upvalue_ref) {
                        Obj::Upvalue(u) => u.location,
                        _ => unreachable!(),
                    };
                    match location {
                        UpvalueLocation::Stack(idx) => self.stack[idx] = value,
                        UpvalueLocation::Closed(_) => {
                            if let Obj::Upvalue(u) = self.heap.get_mut(upvalue_ref) {
                                u.location = UpvalueLocation::Closed(value);
                            }
                        }
                    }
                }
                OpCode::GetProperty => {
                    let instance_ref = match self.peek(0) {
                        Value::Object(r) if matches!(self.heap.get(r), Obj::Instance(_)) => r,
                        _ => return Err(self.runtime_error(RuntimeErrorKind::OnlyInstancesHaveProperties)),
                    };
                    let name = self.read_string();
                    let hash = self.heap.string_hash(name);
                    let field = match self.heap.get(instance_ref) {
                        Obj::Instance(i) => i.fields.get(name, hash),
                        _ => unreachable!(),
                    };
                    if let Some(value) = field {
                        self.pop();
                        self.push(value)?;
                    } else {
                        let class_ref = match self.heap.get(instance_ref) {
                            Obj::Instance(i) => i.class,
                            _ => unreachable!(),
                        };
                        self.bind_method(class_ref, name)?;
                    }
                }
                OpCode::SetProperty => {
                    let instance_ref = match self.peek(1) {
                        Value::Object(r) if matches!(self.heap.get(r), Obj::Instance(_)) => r,
                        _ => return Err(self.runtime_error(RuntimeErrorKind::OnlyInstancesHaveProperties)),
                    };
                    let name = self.read_string();
                    let hash = self.heap.string_hash(name);
                    let value = self.peek(0);
                    if let Obj::Instance(i) = self.heap.get_mut(instance_ref) {
                        i.fields.set(name, hash, value);
                    }
                    let value = self.pop();
                    self.pop();
                    self.push(value)?;
                }
                OpCode::GetSuper => {
                    let name = self.read_string();
                    let superclass = match self.pop() {
                        Value::Object(r) => r,
                        _ => unreachable!(),
                    };
                    self.bind_method(superclass, name)?;
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                OpCode::Greater => self.numeric_compare(|a, b| a > b)?,
                OpCode::Less => self.numeric_compare(|a, b| a < b)?,
                OpCode::Add => {
                    let b = self.peek(0);
                    let a = self.peek(1);
                    if let (Some(a), Some(b)) = (a.as_number(), b.as_number()) {
                        self.pop();
                        self.pop();
                        self.push(Value::Number(a + b))?;
                    } else if self.is_string(a) && self.is_string(b) {
                        self.pop();
                        self.pop();
                        let a_text = match a {
                            Value::Object(r) => self.heap.string_content(r).to_string(),
                            _ => unreachable!(),
                        };
                        let b_text = match b {
                            Value::Object(r) => self.heap.string_content(r).to_string(),
                            _ => unreachable!(),
                        };
                        let combined = self.intern(&format!("{a_text}{b_text}"));
                        self.push(Value::Object(combined))?;
                    } else {
                        return Err(self.runtime_error(RuntimeErrorKind::OperandsMustBeNumbersOrStrings));
                    }
                }
                OpCode::Subtract => self.numeric_binary(|a, b| a - b)?,
                OpCode::Multiply => self.numeric_binary(|a, b| a * b)?,
                OpCode::Divide => self.numeric_binary(|a, b| a / b)?,
                // Both operands truncate to i64 before `%`, matching the
                // reference interpreter's integer-only modulo.
                OpCode::Modulo => self.numeric_binary(|a, b| ((a as i64) % (b as i64)) as f64)?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                OpCode::Negate => {
                    let value = self.peek(0);
                    match value.as_number() {
                        Some(n) => {
                            self.pop();
                            self.push(Value::Number(-n))?;
                        }
                        None => return Err(self.runtime_error(RuntimeErrorKind::OperandMustBeNumber)),
                    }
                }
                OpCode::Print => {
                    let value = self.pop();
                    println!("{}", crate::debug::format_value(&value, &self.heap));
                }
                OpCode::Jump => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short();
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte();
                    let callee = self.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let name = self.read_string();
                    let arg_count = self.read_byte();
                    let superclass = match self.pop() {
                        Value::Object(r) => r,
                        _ => unreachable!(),
                    };
                    self.invoke_from_class(superclass, name, arg_count)?;
                }
                OpCode::Closure => {
                    let function_ref = match self.read_constant() {
                        Value::Object(r) => r,
                        _ => unreachable!(),
                    };
                    let upvalue_count = match self.heap.get(function_ref) {
                        Obj::Function(f) => f.upvalue_count,
                        _ => unreachable!(),
                    };
                    let mut upvalues = Vec::with_capacity(upvalue_count);
                    for _ in 0..upvalue_count {
                        let is_local = self.read_byte();
                        let index = self.read_byte() as usize;
                        if is_local != 0 {
                            let base = self.frames.last().unwrap().slot_base;
                            upvalues.push(self.capture_upvalue(base + index));
                        } else {
                            let closure_ref = self.frames.last().unwrap().closure;
                            let up = match self.heap.get(closure_ref) {
                                Obj::Closure(c) => c.upvalues[index],
                                _ => unreachable!(),
                            };
                            upvalues.push(up);
                        }
                    }
                    let closure_ref = self.alloc(Obj::Closure(ObjClosure { function: function_ref, upvalues }));
                    self.push(Value::Object(closure_ref))?;
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().unwrap();
                    self.close_upvalues(frame.slot_base);
                    if self.frames.is_empty() {
                        self.stack.truncate(frame.slot_base);
                        return Ok(());
                    }
                    self.stack.truncate(frame.slot_base);
                    self.push(result)?;
                }
                OpCode::Class => {
                    let name = self.read_string();
                    let class_ref = self.alloc(Obj::Class(crate::object::ObjClass::new(name)));
                    self.push(Value::Object(class_ref))?;
                }
                OpCode::Inherit => {
                    let superclass_ref = match self.peek(1) {
                        Value::Object(r) if matches!(self.heap.get(r), Obj::Class(_)) => r,
                        _ => return Err(self.runtime_error(RuntimeErrorKind::SuperclassMustBeAClass)),
                    };
                    let subclass_ref = match self.peek(0) {
                        Value::Object(r) => r,
                        _ => unreachable!(),
                    };
                    let super_methods = match self.heap.get(superclass_ref) {
                        Obj::Class(c) => {
                            let mut copy = Table::new();
                            copy.add_all(&c.methods);
                            copy
                        }
                        _ => unreachable!(),
                    };
                    if let Obj::Class(c) = self.heap.get_mut(subclass_ref) {
                        c.methods.add_all(&super_methods);
                    }
                    self.pop();
                }
                OpCode::Method => {
                    let name = self.read_string();
                    self.define_method(name);
                }
            }
        }
    }

    fn numeric_binary(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(op(a, b)))
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::OperandMustBeNumber)),
        }
    }

    fn numeric_compare(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.peek(0).as_number();
        let a = self.peek(1).as_number();
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Bool(op(a, b)))
            }
            _ => Err(self.runtime_error(RuntimeErrorKind::OperandMustBeNumber)),
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::object::ObjFunction;
    use tansy_util::Span;

    fn script_with(build: impl FnOnce(&mut Chunk)) -> Chunk {
        let mut chunk = Chunk::new();
        build(&mut chunk);
        chunk.write_op(OpCode::Nil, Span::new(1));
        chunk.write_op(OpCode::Return, Span::new(1));
        chunk
    }

    fn run_script(vm: &mut Vm, chunk: Chunk) -> Result<(), RuntimeError> {
        let mut function = ObjFunction::new(None);
        function.chunk = chunk;
        let function_ref = vm.alloc(Obj::Function(function));
        vm.interpret(function_ref)
    }

    #[test]
    fn arithmetic_adds_two_numbers() {
        let mut vm = Vm::new();
        let chunk = script_with(|chunk| {
            let a = chunk.add_constant(Value::Number(1.0));
            let b = chunk.add_constant(Value::Number(2.0));
            chunk.write_op(OpCode::Constant, Span::new(1));
            chunk.write(a as u8, Span::new(1));
            chunk.write_op(OpCode::Constant, Span::new(1));
            chunk.write(b as u8, Span::new(1));
            chunk.write_op(OpCode::Add, Span::new(1));
            chunk.write_op(OpCode::Pop, Span::new(1));
        });
        assert!(run_script(&mut vm, chunk).is_ok());
    }

    #[test]
    fn negating_a_non_number_is_a_runtime_error() {
        let mut vm = Vm::new();
        let chunk = script_with(|chunk| {
            let s = chunk.add_constant(Value::Nil);
            chunk.write_op(OpCode::Constant, Span::new(7));
            chunk.write(s as u8, Span::new(7));
            chunk.write_op(OpCode::Negate, Span::new(7));
            chunk.write_op(OpCode::Pop, Span::new(7));
        });
        let err = run_script(&mut vm, chunk).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::OperandMustBeNumber);
        assert_eq!(err.frames[0].line, 7);
    }

    #[test]
    fn undefined_global_read_reports_name() {
        let mut vm = Vm::new();
        let missing = vm.intern("missing");
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Object(missing));
        chunk.write_op(OpCode::GetGlobal, Span::new(3));
        chunk.write(idx as u8, Span::new(3));
        chunk.write_op(OpCode::Pop, Span::new(3));
        chunk.write_op(OpCode::Nil, Span::new(3));
        chunk.write_op(OpCode::Return, Span::new(3));
        let err = run_script(&mut vm, chunk).unwrap_err();
        match err.kind {
            RuntimeErrorKind::UndefinedVariable { name } => assert_eq!(name, "missing"),
            other => panic!("unexpected error kind: {other:?}"),
        }
    }
}
