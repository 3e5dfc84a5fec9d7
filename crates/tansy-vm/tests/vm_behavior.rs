//! End-to-end VM behavior, exercised by hand-assembling bytecode the way
//! a compiler would emit it. There's no compiler in this crate's
//! dependency direction, so these tests build `Chunk`s directly rather
//! than going through source text.

use tansy_util::Span;
use tansy_vm::{Chunk, Obj, ObjFunction, OpCode, RuntimeErrorKind, Value, Vm};

fn span(line: u32) -> Span {
    Span::new(line)
}

fn finish(chunk: &mut Chunk, line: u32) {
    chunk.write_op(OpCode::Nil, span(line));
    chunk.write_op(OpCode::Return, span(line));
}

fn nested_function(vm: &mut Vm, arity: u8, upvalue_count: usize, build: impl FnOnce(&mut Chunk)) -> tansy_vm::ObjRef {
    let mut function = ObjFunction::new(None);
    function.arity = arity;
    function.upvalue_count = upvalue_count;
    build(&mut function.chunk);
    vm.alloc(Obj::Function(function))
}

fn run_script(vm: &mut Vm, chunk: Chunk) -> Result<(), tansy_vm::RuntimeError> {
    let mut script = ObjFunction::new(None);
    script.chunk = chunk;
    let script_ref = vm.alloc(Obj::Function(script));
    vm.interpret(script_ref)
}

fn global_value(vm: &mut Vm, name: &str) -> Value {
    let name_ref = vm.intern(name);
    let hash = vm.heap().string_hash(name_ref);
    vm.globals().get(name_ref, hash).expect("global not set")
}

#[test]
fn closures_capture_locals_by_reference() {
    let mut vm = Vm::new();

    // fun increment() { count = count + 1; return count; }
    // `count` is upvalue 0, a captured local of the enclosing script.
    let increment_ref = nested_function(&mut vm, 0, 1, |chunk| {
        chunk.write_op(OpCode::GetUpvalue, span(2));
        chunk.write(0, span(2));
        let one = chunk.add_constant(Value::Number(1.0));
        chunk.write_op(OpCode::Constant, span(2));
        chunk.write(one as u8, span(2));
        chunk.write_op(OpCode::Add, span(2));
        chunk.write_op(OpCode::SetUpvalue, span(2));
        chunk.write(0, span(2));
        chunk.write_op(OpCode::Pop, span(2));
        chunk.write_op(OpCode::GetUpvalue, span(2));
        chunk.write(0, span(2));
        chunk.write_op(OpCode::Return, span(2));
    });

    let mut script = Chunk::new();
    // slot 1: var count = 0;
    let zero = script.add_constant(Value::Number(0.0));
    script.write_op(OpCode::Constant, span(1));
    script.write(zero as u8, span(1));

    // var counter = <closure over increment, capturing local slot 1>;
    let fn_idx = script.add_constant(Value::Object(increment_ref));
    script.write_op(OpCode::Closure, span(3));
    script.write(fn_idx as u8, span(3));
    script.write(1, span(3)); // is_local = true
    script.write(1, span(3)); // captures local slot 1 ("count")

    let counter_name = script.add_constant(Value::Object(vm.intern("counter")));
    script.write_op(OpCode::DefineGlobal, span(3));
    script.write(counter_name as u8, span(3));

    for global in ["r1", "r2"] {
        let counter_ref = script.add_constant(Value::Object(vm.intern("counter")));
        script.write_op(OpCode::GetGlobal, span(4));
        script.write(counter_ref as u8, span(4));
        script.write_op(OpCode::Call, span(4));
        script.write(0, span(4));
        let global_name = script.add_constant(Value::Object(vm.intern(global)));
        script.write_op(OpCode::DefineGlobal, span(4));
        script.write(global_name as u8, span(4));
    }
    finish(&mut script, 5);

    run_script(&mut vm, script).expect("script runs without error");

    assert_eq!(global_value(&mut vm, "r1"), Value::Number(1.0));
    assert_eq!(global_value(&mut vm, "r2"), Value::Number(2.0));
}

#[test]
fn string_interning_makes_equal_content_reference_equal() {
    let mut vm = Vm::new();
    let mut script = Chunk::new();

    let a = script.add_constant(Value::Object(vm.intern("hello")));
    let b = script.add_constant(Value::Object(vm.intern("hello")));
    script.write_op(OpCode::Constant, span(1));
    script.write(a as u8, span(1));
    script.write_op(OpCode::Constant, span(1));
    script.write(b as u8, span(1));
    script.write_op(OpCode::Equal, span(1));

    let name = script.add_constant(Value::Object(vm.intern("result")));
    script.write_op(OpCode::DefineGlobal, span(1));
    script.write(name as u8, span(1));
    finish(&mut script, 2);

    run_script(&mut vm, script).expect("script runs without error");
    assert_eq!(global_value(&mut vm, "result"), Value::Bool(true));
}

#[test]
fn adding_a_number_and_nil_reports_the_offending_line() {
    let mut vm = Vm::new();
    let mut script = Chunk::new();

    let n = script.add_constant(Value::Number(1.0));
    script.write_op(OpCode::Constant, span(1));
    script.write(n as u8, span(1));
    script.write_op(OpCode::Nil, span(42));
    script.write_op(OpCode::Add, span(42));
    finish(&mut script, 43);

    let err = run_script(&mut vm, script).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::OperandsMustBeNumbersOrStrings);
    assert_eq!(err.kind.to_string(), "Operands must be either 2 numbers or 2 strings.");
    assert_eq!(err.frames[0].line, 42);
    assert_eq!(err.frames[0].function_name, "script");
}

#[test]
fn instance_field_shadows_method_through_invoke() {
    let mut vm = Vm::new();

    // method `value() { return 42; }`
    let method_ref = nested_function(&mut vm, 0, 0, |chunk| {
        let forty_two = chunk.add_constant(Value::Number(42.0));
        chunk.write_op(OpCode::Constant, span(2));
        chunk.write(forty_two as u8, span(2));
        chunk.write_op(OpCode::Return, span(2));
    });

    let mut script = Chunk::new();

    let class_name = script.add_constant(Value::Object(vm.intern("Box")));
    script.write_op(OpCode::Class, span(1));
    script.write(class_name as u8, span(1));

    let fn_idx = script.add_constant(Value::Object(method_ref));
    script.write_op(OpCode::Closure, span(2));
    script.write(fn_idx as u8, span(2));

    let method_name = script.add_constant(Value::Object(vm.intern("value")));
    script.write_op(OpCode::Method, span(2));
    script.write(method_name as u8, span(2));

    let class_global = script.add_constant(Value::Object(vm.intern("Box")));
    script.write_op(OpCode::DefineGlobal, span(2));
    script.write(class_global as u8, span(2));

    // var b = Box();
    let get_box = script.add_constant(Value::Object(vm.intern("Box")));
    script.write_op(OpCode::GetGlobal, span(3));
    script.write(get_box as u8, span(3));
    script.write_op(OpCode::Call, span(3));
    script.write(0, span(3));
    let b_name = script.add_constant(Value::Object(vm.intern("b")));
    script.write_op(OpCode::DefineGlobal, span(3));
    script.write(b_name as u8, span(3));

    // r1 = b.value();
    let get_b = script.add_constant(Value::Object(vm.intern("b")));
    script.write_op(OpCode::GetGlobal, span(4));
    script.write(get_b as u8, span(4));
    let invoke_name = script.add_constant(Value::Object(vm.intern("value")));
    script.write_op(OpCode::Invoke, span(4));
    script.write(invoke_name as u8, span(4));
    script.write(0, span(4));
    let r1_name = script.add_constant(Value::Object(vm.intern("r1")));
    script.write_op(OpCode::DefineGlobal, span(4));
    script.write(r1_name as u8, span(4));

    // b.value = 99;
    let get_b2 = script.add_constant(Value::Object(vm.intern("b")));
    script.write_op(OpCode::GetGlobal, span(5));
    script.write(get_b2 as u8, span(5));
    let ninety_nine = script.add_constant(Value::Number(99.0));
    script.write_op(OpCode::Constant, span(5));
    script.write(ninety_nine as u8, span(5));
    let set_prop_name = script.add_constant(Value::Object(vm.intern("value")));
    script.write_op(OpCode::SetProperty, span(5));
    script.write(set_prop_name as u8, span(5));
    script.write_op(OpCode::Pop, span(5));

    // r2 = b.value; -- the field now shadows the method on plain property read
    let get_b3 = script.add_constant(Value::Object(vm.intern("b")));
    script.write_op(OpCode::GetGlobal, span(6));
    script.write(get_b3 as u8, span(6));
    let prop_name2 = script.add_constant(Value::Object(vm.intern("value")));
    script.write_op(OpCode::GetProperty, span(6));
    script.write(prop_name2 as u8, span(6));
    let r2_name = script.add_constant(Value::Object(vm.intern("r2")));
    script.write_op(OpCode::DefineGlobal, span(6));
    script.write(r2_name as u8, span(6));

    finish(&mut script, 7);

    run_script(&mut vm, script).expect("script runs without error");
    assert_eq!(global_value(&mut vm, "r1"), Value::Number(42.0));
    assert_eq!(global_value(&mut vm, "r2"), Value::Number(99.0));
}

#[test]
fn subclass_inherits_superclass_methods() {
    let mut vm = Vm::new();

    // method `greet() { return 1; }`
    let greet_ref = nested_function(&mut vm, 0, 0, |chunk| {
        let one = chunk.add_constant(Value::Number(1.0));
        chunk.write_op(OpCode::Constant, span(2));
        chunk.write(one as u8, span(2));
        chunk.write_op(OpCode::Return, span(2));
    });

    let mut script = Chunk::new();

    // class Base { greet() { return 1; } }
    let base_name = script.add_constant(Value::Object(vm.intern("Base")));
    script.write_op(OpCode::Class, span(1));
    script.write(base_name as u8, span(1));
    let fn_idx = script.add_constant(Value::Object(greet_ref));
    script.write_op(OpCode::Closure, span(2));
    script.write(fn_idx as u8, span(2));
    let greet_name = script.add_constant(Value::Object(vm.intern("greet")));
    script.write_op(OpCode::Method, span(2));
    script.write(greet_name as u8, span(2));
    let base_global = script.add_constant(Value::Object(vm.intern("Base")));
    script.write_op(OpCode::DefineGlobal, span(2));
    script.write(base_global as u8, span(2));

    // class Derived < Base {}
    let derived_name = script.add_constant(Value::Object(vm.intern("Derived")));
    script.write_op(OpCode::Class, span(3));
    script.write(derived_name as u8, span(3));
    let derived_global = script.add_constant(Value::Object(vm.intern("Derived")));
    script.write_op(OpCode::DefineGlobal, span(3));
    script.write(derived_global as u8, span(3));

    let get_base = script.add_constant(Value::Object(vm.intern("Base")));
    script.write_op(OpCode::GetGlobal, span(3));
    script.write(get_base as u8, span(3));
    let get_derived = script.add_constant(Value::Object(vm.intern("Derived")));
    script.write_op(OpCode::GetGlobal, span(3));
    script.write(get_derived as u8, span(3));
    script.write_op(OpCode::Inherit, span(3));

    let get_derived2 = script.add_constant(Value::Object(vm.intern("Derived")));
    script.write_op(OpCode::GetGlobal, span(3));
    script.write(get_derived2 as u8, span(3));
    script.write_op(OpCode::Pop, span(3)); // pop class after (empty) method defs
    script.write_op(OpCode::Pop, span(3)); // pop the "super" local

    // var d = Derived();
    let get_derived3 = script.add_constant(Value::Object(vm.intern("Derived")));
    script.write_op(OpCode::GetGlobal, span(4));
    script.write(get_derived3 as u8, span(4));
    script.write_op(OpCode::Call, span(4));
    script.write(0, span(4));
    let d_name = script.add_constant(Value::Object(vm.intern("d")));
    script.write_op(OpCode::DefineGlobal, span(4));
    script.write(d_name as u8, span(4));

    // r = d.greet();
    let get_d = script.add_constant(Value::Object(vm.intern("d")));
    script.write_op(OpCode::GetGlobal, span(5));
    script.write(get_d as u8, span(5));
    let invoke_name = script.add_constant(Value::Object(vm.intern("greet")));
    script.write_op(OpCode::Invoke, span(5));
    script.write(invoke_name as u8, span(5));
    script.write(0, span(5));
    let r_name = script.add_constant(Value::Object(vm.intern("r")));
    script.write_op(OpCode::DefineGlobal, span(5));
    script.write(r_name as u8, span(5));

    finish(&mut script, 6);

    run_script(&mut vm, script).expect("script runs without error");
    assert_eq!(global_value(&mut vm, "r"), Value::Number(1.0));
}
