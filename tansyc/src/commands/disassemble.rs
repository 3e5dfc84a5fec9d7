//! `tansyc disassemble` - compile a script without running it and print
//! its bytecode, recursing into every nested function constant the way
//! clox's `DEBUG_PRINT_CODE` dumps each function as it finishes compiling.

use std::path::PathBuf;

use tansy_vm::{disassemble_chunk, Heap, Obj, ObjRef, Value};

use crate::config::Config;
use crate::error::{Result, TansycError};

#[derive(Debug, Clone)]
pub struct DisassembleArgs {
    pub path: PathBuf,
}

pub fn run_disassemble(args: DisassembleArgs, config: &Config) -> Result<()> {
    let source = std::fs::read_to_string(&args.path)?;

    let mut vm = tansy_vm::Vm::new();
    vm.stress_gc(config.gc.stress);

    let script = tansy_compiler::compile(&source, &mut vm).map_err(TansycError::from_compile_errors)?;

    print_function(script, vm.heap(), "<script>");
    Ok(())
}

fn print_function(function_ref: ObjRef, heap: &Heap, name: &str) {
    let Obj::Function(function) = heap.get(function_ref) else {
        return;
    };

    println!("{}", disassemble_chunk(&function.chunk, heap, name));

    for constant in &function.chunk.constants {
        if let Value::Object(r) = *constant {
            if let Obj::Function(nested) = heap.get(r) {
                let nested_name = match nested.name {
                    Some(name_ref) => heap.string_content(name_ref).to_string(),
                    None => "<script>".to_string(),
                };
                print_function(r, heap, &nested_name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn disassembles_without_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "fun add(a, b) {{ return a + b; }} print add(1, 2);").unwrap();

        let args = DisassembleArgs { path: file.path().to_path_buf() };
        assert!(run_disassemble(args, &Config::default()).is_ok());
    }

    #[test]
    fn reports_compile_errors_instead_of_panicking() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "var = 1;").unwrap();

        let args = DisassembleArgs { path: file.path().to_path_buf() };
        let err = run_disassemble(args, &Config::default()).unwrap_err();
        assert_eq!(err.exit_code(), 65);
    }
}
