//! Command modules for the tansyc CLI.

pub mod disassemble;
pub mod repl;
pub mod run;

pub use disassemble::{run_disassemble, DisassembleArgs};
pub use repl::run_repl;
pub use run::{run_run, RunArgs};
