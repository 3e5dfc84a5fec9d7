//! `tansyc run` - compile and execute a script file.

use std::path::PathBuf;

use tansy_vm::Vm;

use crate::config::Config;
use crate::error::{Result, TansycError};

/// Arguments for the run command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub path: PathBuf,
    pub verbose: bool,
}

/// Compile and run the script at `args.path`, returning the same error
/// variants `main` uses to pick an exit code.
pub fn run_run(args: RunArgs, config: &Config) -> Result<()> {
    let source = std::fs::read_to_string(&args.path)?;

    let mut vm = Vm::new();
    vm.stress_gc(config.gc.stress);

    let script = tansy_compiler::compile(&source, &mut vm).map_err(TansycError::from_compile_errors)?;

    if args.verbose {
        tracing::debug!(path = %args.path.display(), "compiled script, entering interpreter");
    }

    vm.interpret(script)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn script_file(source: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{source}").unwrap();
        file
    }

    #[test]
    fn runs_a_well_formed_script() {
        let file = script_file("var x = 1 + 2; print x;");
        let args = RunArgs { path: file.path().to_path_buf(), verbose: false };
        assert!(run_run(args, &Config::default()).is_ok());
    }

    #[test]
    fn reports_compile_errors() {
        let file = script_file("var = 1;");
        let args = RunArgs { path: file.path().to_path_buf(), verbose: false };
        let err = run_run(args, &Config::default()).unwrap_err();
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn reports_runtime_errors() {
        let file = script_file("print nope;");
        let args = RunArgs { path: file.path().to_path_buf(), verbose: false };
        let err = run_run(args, &Config::default()).unwrap_err();
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let args = RunArgs { path: PathBuf::from("/nonexistent/script.tansy"), verbose: false };
        let err = run_run(args, &Config::default()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
