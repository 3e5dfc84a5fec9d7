//! Garbage collection orchestration: mark roots, trace, sweep.
//!
//! The actual marking primitives live on [`crate::heap::Heap`]; this
//! module's only job is to know where the VM's roots are.

use crate::vm::Vm;

impl Vm {
    pub(crate) fn collect_garbage(&mut self) {
        let _span = tracing::debug_span!("gc_cycle").entered();
        let before = self.heap.bytes_allocated();

        self.mark_roots();
        self.heap.trace_references();
        self.heap.remove_white_strings();
        self.heap.sweep();

        tracing::debug!(
            before,
            after = self.heap.bytes_allocated(),
            next_gc = self.heap.next_gc(),
            "collected"
        );
    }

    fn mark_roots(&mut self) {
        for &value in &self.stack {
            self.heap.mark_value(value);
        }
        for frame in &self.frames {
            self.heap.mark_object(frame.closure);
        }
        for &upvalue in &self.open_upvalues {
            self.heap.mark_object(upvalue);
        }
        self.heap.mark_table(&self.globals);
        self.heap.mark_object(self.init_string);
        // The compiler's root chain: constants (and in-progress function
        // objects) pushed via `push_compiler_root` while a function is
        // still being compiled and not yet reachable from anywhere else.
        for &value in &self.compiler_roots {
            self.heap.mark_value(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::object::{Obj, ObjClosure, ObjFunction};
    use crate::value::Value;

    #[test]
    fn reachable_string_survives_collection() {
        let mut vm = Vm::new();
        let s = vm.intern("kept");
        let hash = vm.heap().string_hash(s);
        vm.globals_mut().set(s, hash, Value::Bool(true));
        vm.collect_garbage();
        assert_eq!(vm.heap().string_content(s), "kept");
    }

    #[test]
    fn unreachable_allocation_is_collected_under_stress() {
        let mut vm = Vm::new();
        vm.stress_gc(true);
        let mut function = ObjFunction::new(None);
        function.chunk = Chunk::new();
        let function_ref = vm.alloc(Obj::Function(function));
        let _closure = vm.alloc(Obj::Closure(ObjClosure { function: function_ref, upvalues: Vec::new() }));
        // No assertion on liveness here: both allocations are temporarily
        // rooted by `alloc` itself, so this only exercises that a stress
        // collection mid-allocation doesn't panic or corrupt the heap.
        vm.collect_garbage();
    }

    #[test]
    fn compiler_root_survives_a_collection_triggered_by_a_later_allocation() {
        // Mirrors the hazard a compiler faces: a constant is produced (and
        // interned) well before the function that owns it is itself
        // heap-allocated, so nothing but an explicit compiler root keeps it
        // alive across whatever the compiler allocates next.
        let mut vm = Vm::new();
        let pending_constant = vm.intern("pending constant");
        vm.push_compiler_root(Value::Object(pending_constant));

        vm.stress_gc(true);
        vm.intern("forces a stress collection");

        assert_eq!(vm.heap().string_content(pending_constant), "pending constant");
        vm.pop_compiler_root();
    }
}
