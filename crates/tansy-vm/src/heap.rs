//! The object arena and the low-level marking primitives the collector in
//! [`crate::gc`] drives.

use crate::object::{Obj, ObjRef};
use crate::table::Table;
use crate::value::Value;

/// FNV-1a, matching clox's `hashString`.
const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

pub fn fnv1a_hash(text: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in text.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// After a collection, the next one triggers once the heap has doubled.
pub const GC_HEAP_GROW_FACTOR: usize = 2;

struct Slot {
    obj: Option<Obj>,
    generation: u32,
    marked: bool,
}

/// Owns every heap-allocated Tansy object behind a generation-counted
/// arena, the string intern table, and GC bookkeeping (bytes allocated,
/// the next collection threshold, and the gray worklist).
pub struct Heap {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    strings: Table,
    gray_stack: Vec<ObjRef>,
    bytes_allocated: usize,
    next_gc: usize,
    pub stress_gc: bool,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            strings: Table::new(),
            gray_stack: Vec::new(),
            bytes_allocated: 0,
            next_gc: 1024 * 1024,
            stress_gc: false,
        }
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn next_gc(&self) -> usize {
        self.next_gc
    }

    pub fn should_collect(&self) -> bool {
        self.stress_gc || self.bytes_allocated > self.next_gc
    }

    /// Allocates `obj` into a free or fresh slot and returns a handle to it.
    pub fn allocate(&mut self, obj: Obj) -> ObjRef {
        self.bytes_allocated += approx_size(&obj);
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.obj = Some(obj);
            slot.marked = false;
            ObjRef::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { obj: Some(obj), generation: 0, marked: false });
            ObjRef::new(index, 0)
        }
    }

    /// Interns `text`, allocating a new string object only if an equal one
    /// isn't already interned.
    pub fn intern_string(&mut self, text: &str) -> ObjRef {
        let hash = fnv1a_hash(text);
        if let Some(existing) = self.strings.find_string(self, text, hash) {
            return existing;
        }
        let handle = self.allocate(Obj::String { data: text.into(), hash });
        self.strings.set(handle, hash, Value::Nil);
        handle
    }

    pub fn get(&self, r: ObjRef) -> &Obj {
        let slot = &self.slots[r.index()];
        assert_eq!(slot.generation, r.generation(), "use of stale object handle");
        slot.obj.as_ref().expect("use of freed object handle")
    }

    pub fn get_mut(&mut self, r: ObjRef) -> &mut Obj {
        let slot = &mut self.slots[r.index()];
        assert_eq!(slot.generation, r.generation(), "use of stale object handle");
        slot.obj.as_mut().expect("use of freed object handle")
    }

    pub fn string_content(&self, r: ObjRef) -> &str {
        match self.get(r) {
            Obj::String { data, .. } => data,
            other => panic!("expected string object, found {}", other.type_name()),
        }
    }

    pub fn string_hash(&self, r: ObjRef) -> u32 {
        match self.get(r) {
            Obj::String { hash, .. } => *hash,
            other => panic!("expected string object, found {}", other.type_name()),
        }
    }

    pub fn is_marked(&self, r: ObjRef) -> bool {
        self.slots[r.index()].marked
    }

    /// Marks `r` and, unless it was already marked, pushes it onto the gray
    /// worklist so `trace_references` will later walk its outgoing
    /// references.
    pub fn mark_object(&mut self, r: ObjRef) {
        let slot = &mut self.slots[r.index()];
        if slot.marked {
            return;
        }
        slot.marked = true;
        self.gray_stack.push(r);
    }

    pub fn mark_value(&mut self, value: Value) {
        if let Value::Object(r) = value {
            self.mark_object(r);
        }
    }

    pub fn mark_table(&mut self, table: &Table) {
        let entries: Vec<_> = table.iter().collect();
        for (key, value) in entries {
            self.mark_object(key);
            self.mark_value(value);
        }
    }

    /// Drains the gray worklist, marking every object reachable from it.
    pub fn trace_references(&mut self) {
        while let Some(r) = self.gray_stack.pop() {
            self.blacken_object(r);
        }
    }

    fn blacken_object(&mut self, r: ObjRef) {
        enum Refs {
            None,
            One(ObjRef),
            Function { name: Option<ObjRef>, constants: Vec<Value> },
            Closure { function: ObjRef, upvalues: Vec<ObjRef> },
            Upvalue(Value),
            Class { name: ObjRef, methods: Vec<(ObjRef, Value)> },
            Instance { class: ObjRef, fields: Vec<(ObjRef, Value)> },
            BoundMethod { receiver: Value, method: ObjRef },
        }

        let refs = match self.get(r) {
            Obj::String { .. } | Obj::Native(_) => Refs::None,
            Obj::Function(f) => Refs::Function { name: f.name, constants: f.chunk.constants.clone() },
            Obj::Closure(c) => Refs::Closure { function: c.function, upvalues: c.upvalues.clone() },
            Obj::Upvalue(u) => match u.location {
                crate::object::UpvalueLocation::Closed(v) => Refs::Upvalue(v),
                crate::object::UpvalueLocation::Stack(_) => Refs::None,
            },
            Obj::Class(c) => Refs::Class { name: c.name, methods: c.methods.iter().collect() },
            Obj::Instance(i) => Refs::Instance { class: i.class, fields: i.fields.iter().collect() },
            Obj::BoundMethod(b) => Refs::BoundMethod { receiver: b.receiver, method: b.method },
        };

        match refs {
            Refs::None => {}
            Refs::One(r) => self.mark_object(r),
            Refs::Function { name, constants } => {
                if let Some(name) = name {
                    self.mark_object(name);
                }
                for c in constants {
                    self.mark_value(c);
                }
            }
            Refs::Closure { function, upvalues } => {
                self.mark_object(function);
                for u in upvalues {
                    self.mark_object(u);
                }
            }
            Refs::Upvalue(v) => self.mark_value(v),
            Refs::Class { name, methods } => {
                self.mark_object(name);
                for (k, v) in methods {
                    self.mark_object(k);
                    self.mark_value(v);
                }
            }
            Refs::Instance { class, fields } => {
                self.mark_object(class);
                for (k, v) in fields {
                    self.mark_object(k);
                    self.mark_value(v);
                }
            }
            Refs::BoundMethod { receiver, method } => {
                self.mark_value(receiver);
                self.mark_object(method);
            }
        }
    }

    /// Strips any interned string not reachable from this cycle's roots.
    pub fn remove_white_strings(&mut self) {
        let slots = &self.slots;
        self.strings.remove_white(|r| slots[r.index()].marked);
    }

    /// Frees every unmarked slot and clears marks on the rest, then grows
    /// the next collection threshold.
    pub fn sweep(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.obj.is_none() {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                self.bytes_allocated -= approx_size(slot.obj.as_ref().unwrap());
                slot.obj = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(index as u32);
            }
        }
        self.next_gc = self.bytes_allocated * GC_HEAP_GROW_FACTOR;
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

fn approx_size(obj: &Obj) -> usize {
    use std::mem::size_of;
    match obj {
        Obj::String { data, .. } => size_of::<Obj>() + data.len(),
        Obj::Function(f) => {
            size_of::<Obj>()
                + f.chunk.code.len()
                + f.chunk.lines.len() * size_of::<u32>()
                + f.chunk.constants.len() * size_of::<Value>()
        }
        Obj::Native(_) => size_of::<Obj>(),
        Obj::Closure(c) => size_of::<Obj>() + c.upvalues.len() * size_of::<ObjRef>(),
        Obj::Upvalue(_) => size_of::<Obj>(),
        Obj::Class(c) => size_of::<Obj>() + c.methods.len() * size_of::<(ObjRef, Value)>(),
        Obj::Instance(i) => size_of::<Obj>() + i.fields.len() * size_of::<(ObjRef, Value)>(),
        Obj::BoundMethod(_) => size_of::<Obj>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_same_text_returns_same_handle() {
        let mut heap = Heap::new();
        let a = heap.intern_string("hello");
        let b = heap.intern_string("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn interning_distinct_text_returns_distinct_handles() {
        let mut heap = Heap::new();
        let a = heap.intern_string("hello");
        let b = heap.intern_string("world");
        assert_ne!(a, b);
    }

    #[test]
    fn allocate_tracks_bytes_allocated() {
        let mut heap = Heap::new();
        assert_eq!(heap.bytes_allocated(), 0);
        heap.intern_string("hello");
        assert!(heap.bytes_allocated() > 0);
    }

    #[test]
    fn sweep_frees_unmarked_and_grows_threshold() {
        let mut heap = Heap::new();
        heap.intern_string("dead");
        let before = heap.bytes_allocated();
        heap.remove_white_strings();
        heap.sweep();
        assert!(heap.bytes_allocated() < before);
        assert_eq!(heap.next_gc(), heap.bytes_allocated() * GC_HEAP_GROW_FACTOR);
    }

    #[test]
    fn sweep_keeps_marked_objects() {
        let mut heap = Heap::new();
        let s = heap.intern_string("alive");
        heap.mark_object(s);
        heap.trace_references();
        heap.sweep();
        assert_eq!(heap.string_content(s), "alive");
    }

    #[test]
    fn fnv1a_matches_known_vector() {
        // Empty string hashes to the FNV-1a offset basis.
        assert_eq!(fnv1a_hash(""), FNV_OFFSET_BASIS);
    }
}
