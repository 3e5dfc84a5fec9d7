//! `tansyc repl` - read a line at a time, compiling and running each
//! against one shared `Vm`, matching clox's `repl()` in `main.c`.
//!
//! Unlike `run`, a compile or runtime error here doesn't end the session -
//! only EOF on stdin does.

use std::io::{self, BufRead, Write};

use tansy_vm::Vm;

use crate::config::Config;
use crate::error::Result;

pub fn run_repl(config: &Config) -> Result<()> {
    let mut vm = Vm::new();
    vm.stress_gc(config.gc.stress);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        stdout.flush()?;

        line.clear();
        let bytes_read = stdin.lock().read_line(&mut line)?;
        if bytes_read == 0 {
            println!();
            break;
        }

        match tansy_compiler::compile(&line, &mut vm) {
            Ok(script) => {
                if let Err(runtime_error) = vm.interpret(script) {
                    eprintln!("{runtime_error}");
                }
            }
            Err(errors) => {
                for error in &errors {
                    eprintln!("{error}");
                }
            }
        }
    }

    Ok(())
}
