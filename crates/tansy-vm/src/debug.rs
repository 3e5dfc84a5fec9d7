//! Bytecode disassembler.
//!
//! One line per instruction: offset, source line (or `|` when it repeats
//! the previous instruction's line), mnemonic, and operand, matching
//! clox's `debug.c` layout. Kept out of the hot dispatch path in `vm.rs`;
//! only `tansyc disassemble` and tests touch this module.

use crate::chunk::{Chunk, OpCode};
use crate::heap::Heap;
use crate::object::Obj;
use crate::value::Value;

/// Renders a value the way Tansy's `print` statement and the disassembler
/// both want to see it: heap objects resolved through `heap` rather than
/// the placeholder `Value`'s own `Display` impl can manage alone.
pub fn format_value(value: &Value, heap: &Heap) -> String {
    match value {
        Value::Object(r) => match heap.get(*r) {
            Obj::String { data, .. } => data.to_string(),
            Obj::Function(f) => match f.name {
                Some(name) => format!("<fn {}>", heap.string_content(name)),
                None => "<script>".to_string(),
            },
            Obj::Native(n) => format!("<native fn {}>", n.name),
            Obj::Closure(c) => match heap.get(c.function) {
                Obj::Function(f) => match f.name {
                    Some(name) => format!("<fn {}>", heap.string_content(name)),
                    None => "<script>".to_string(),
                },
                _ => "<closure>".to_string(),
            },
            Obj::Upvalue(_) => "<upvalue>".to_string(),
            Obj::Class(c) => format!("<class {}>", heap.string_content(c.name)),
            Obj::Instance(i) => match heap.get(i.class) {
                Obj::Class(c) => format!("<instance of {}>", heap.string_content(c.name)),
                _ => "<instance>".to_string(),
            },
            Obj::BoundMethod(b) => format_value(&b.receiver, heap),
        },
        other => other.to_string(),
    }
}

pub fn disassemble_chunk(chunk: &Chunk, heap: &Heap, name: &str) -> String {
    let mut out = format!("== {name} ==\n");
    let mut offset = 0;
    while offset < chunk.code.len() {
        let (line, next) = disassemble_instruction(chunk, heap, offset);
        out.push_str(&line);
        out.push('\n');
        offset = next;
    }
    out
}

/// Renders one instruction and returns `(rendered_line, next_offset)`.
pub fn disassemble_instruction(chunk: &Chunk, heap: &Heap, offset: usize) -> (String, usize) {
    let mut out = format!("{offset:04} ");

    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        out.push_str("   | ");
    } else {
        out.push_str(&format!("{:4} ", chunk.lines[offset]));
    }

    let op = match OpCode::from_byte(chunk.code[offset]) {
        Some(op) => op,
        None => {
            out.push_str(&format!("Unknown opcode {}", chunk.code[offset]));
            return (out, offset + 1);
        }
    };

    use OpCode::*;
    let next = match op {
        Constant => constant_instruction("OP_CONSTANT", chunk, heap, offset, &mut out),
        GetGlobal => constant_instruction("OP_GET_GLOBAL", chunk, heap, offset, &mut out),
        DefineGlobal => constant_instruction("OP_DEFINE_GLOBAL", chunk, heap, offset, &mut out),
        SetGlobal => constant_instruction("OP_SET_GLOBAL", chunk, heap, offset, &mut out),
        GetProperty => constant_instruction("OP_GET_PROPERTY", chunk, heap, offset, &mut out),
        SetProperty => constant_instruction("OP_SET_PROPERTY", chunk, heap, offset, &mut out),
        GetSuper => constant_instruction("OP_GET_SUPER", chunk, heap, offset, &mut out),
        Class => constant_instruction("OP_CLASS", chunk, heap, offset, &mut out),
        Method => constant_instruction("OP_METHOD", chunk, heap, offset, &mut out),

        Nil => simple("OP_NIL", offset, &mut out),
        True => simple("OP_TRUE", offset, &mut out),
        False => simple("OP_FALSE", offset, &mut out),
        Pop => simple("OP_POP", offset, &mut out),
        Equal => simple("OP_EQUAL", offset, &mut out),
        Greater => simple("OP_GREATER", offset, &mut out),
        Less => simple("OP_LESS", offset, &mut out),
        Add => simple("OP_ADD", offset, &mut out),
        Subtract => simple("OP_SUBTRACT", offset, &mut out),
        Multiply => simple("OP_MULTIPLY", offset, &mut out),
        Divide => simple("OP_DIVIDE", offset, &mut out),
        Modulo => simple("OP_MODULO", offset, &mut out),
        Not => simple("OP_NOT", offset, &mut out),
        Negate => simple("OP_NEGATE", offset, &mut out),
        Print => simple("OP_PRINT", offset, &mut out),
        CloseUpvalue => simple("OP_CLOSE_UPVALUE", offset, &mut out),
        Return => simple("OP_RETURN", offset, &mut out),
        Inherit => simple("OP_INHERIT", offset, &mut out),

        GetLocal => byte_instruction("OP_GET_LOCAL", chunk, offset, &mut out),
        SetLocal => byte_instruction("OP_SET_LOCAL", chunk, offset, &mut out),
        GetUpvalue => byte_instruction("OP_GET_UPVALUE", chunk, offset, &mut out),
        SetUpvalue => byte_instruction("OP_SET_UPVALUE", chunk, offset, &mut out),
        Call => byte_instruction("OP_CALL", chunk, offset, &mut out),

        Jump => jump_instruction("OP_JUMP", 1, chunk, offset, &mut out),
        JumpIfFalse => jump_instruction("OP_JUMP_IF_FALSE", 1, chunk, offset, &mut out),
        Loop => jump_instruction("OP_LOOP", -1, chunk, offset, &mut out),

        Invoke => invoke_instruction("OP_INVOKE", chunk, heap, offset, &mut out),
        SuperInvoke => invoke_instruction("OP_SUPER_INVOKE", chunk, heap, offset, &mut out),

        Closure => closure_instruction(chunk, heap, offset, &mut out),
    };

    (out, next)
}

fn simple(name: &str, offset: usize, out: &mut String) -> usize {
    out.push_str(name);
    offset + 1
}

fn byte_instruction(name: &str, chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let slot = chunk.code[offset + 1];
    out.push_str(&format!("{name:<16} {slot:4}"));
    offset + 2
}

fn jump_instruction(name: &str, sign: i32, chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let hi = chunk.code[offset + 1] as u16;
    let lo = chunk.code[offset + 2] as u16;
    let jump = (hi << 8) | lo;
    let target = offset as i32 + 3 + sign * jump as i32;
    out.push_str(&format!("{name:<16} {offset:4} -> {target}"));
    offset + 3
}

fn constant_instruction(
    name: &str,
    chunk: &Chunk,
    heap: &Heap,
    offset: usize,
    out: &mut String,
) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let value = &chunk.constants[index];
    out.push_str(&format!("{name:<16} {index:4} '{}'", format_value(value, heap)));
    offset + 2
}

fn invoke_instruction(name: &str, chunk: &Chunk, heap: &Heap, offset: usize, out: &mut String) -> usize {
    let index = chunk.code[offset + 1] as usize;
    let arg_count = chunk.code[offset + 2];
    let value = &chunk.constants[index];
    out.push_str(&format!(
        "{name:<16} ({arg_count} args) {index:4} '{}'",
        format_value(value, heap)
    ));
    offset + 3
}

fn closure_instruction(chunk: &Chunk, heap: &Heap, offset: usize, out: &mut String) -> usize {
    let mut offset = offset + 1;
    let index = chunk.code[offset] as usize;
    offset += 1;
    let value = &chunk.constants[index];
    out.push_str(&format!("OP_CLOSURE        {index:4} '{}'", format_value(value, heap)));

    let upvalue_count = match &chunk.constants[index] {
        Value::Object(r) => match heap.get(*r) {
            Obj::Function(f) => f.upvalue_count,
            _ => 0,
        },
        _ => 0,
    };
    for _ in 0..upvalue_count {
        let is_local = chunk.code[offset];
        let idx = chunk.code[offset + 1];
        out.push_str(&format!(
            "\n{:04}    |                     {} {idx}",
            offset,
            if is_local != 0 { "local" } else { "upvalue" }
        ));
        offset += 2;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use tansy_util::Span;

    #[test]
    fn disassembles_simple_return() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Return, Span::new(1));
        let heap = Heap::new();
        let out = disassemble_chunk(&chunk, &heap, "test");
        assert!(out.contains("OP_RETURN"));
        assert!(out.starts_with("== test ==\n"));
    }

    #[test]
    fn disassembles_constant_with_value() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Value::Number(1.5));
        chunk.write_op(OpCode::Constant, Span::new(1));
        chunk.write(idx as u8, Span::new(1));
        let heap = Heap::new();
        let out = disassemble_chunk(&chunk, &heap, "test");
        assert!(out.contains("OP_CONSTANT"));
        assert!(out.contains("1.5"));
    }

    #[test]
    fn repeated_line_renders_as_pipe() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Nil, Span::new(5));
        chunk.write_op(OpCode::Pop, Span::new(5));
        let heap = Heap::new();
        let out = disassemble_chunk(&chunk, &heap, "test");
        assert!(out.contains("   | "));
    }
}
