//! tansyc - compiles and runs scripts for the bytecode interpreter in
//! `tansy-compiler`/`tansy-vm`.
//!
//! This is the entry point: it parses arguments, wires up logging and
//! configuration, and dispatches to one of `run`/`repl`/`disassemble`.

mod commands;
mod config;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{run_disassemble, run_repl, run_run, DisassembleArgs, RunArgs};
use config::Config;
use error::TansycError;

/// tansyc - a bytecode compiler and VM for a small dynamically-typed,
/// class-based scripting language.
#[derive(Parser, Debug)]
#[command(name = "tansyc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and run scripts on the Tansy bytecode VM", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true, env = "TANSYC_VERBOSE")]
    verbose: bool,

    /// Path to a TOML configuration file.
    #[arg(short, long, global = true, env = "TANSYC_CONFIG")]
    config: Option<PathBuf>,

    /// Disable ANSI color in log output.
    #[arg(long, global = true, env = "TANSYC_NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile and run a script file.
    Run(RunCommand),

    /// Start an interactive session over one shared VM.
    Repl,

    /// Compile a script without running it and print its bytecode.
    Disassemble(DisassembleCommand),
}

#[derive(Parser, Debug)]
struct RunCommand {
    /// Script file to compile and run.
    path: PathBuf,
}

#[derive(Parser, Debug)]
struct DisassembleCommand {
    /// Script file to compile and disassemble.
    path: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.no_color) {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> error::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Repl) {
        Commands::Run(args) => run_run(RunArgs { path: args.path, verbose: cli.verbose }, &config),
        Commands::Repl => run_repl(&config),
        Commands::Disassemble(args) => run_disassemble(DisassembleArgs { path: args.path }, &config),
    }
}

fn init_logging(verbose: bool, no_color: bool) -> anyhow::Result<()> {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };

    let subscriber =
        fmt::layer().with_ansi(!no_color).with_target(false).with_thread_ids(false).with_thread_names(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

fn load_config(path: Option<&std::path::Path>) -> error::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_repl_with_no_subcommand() {
        let cli = Cli::parse_from(["tansyc"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_run_with_a_path() {
        let cli = Cli::parse_from(["tansyc", "run", "script.tansy"]);
        match cli.command {
            Some(Commands::Run(args)) => assert_eq!(args.path, PathBuf::from("script.tansy")),
            other => panic!("expected Run command, got {other:?}"),
        }
    }

    #[test]
    fn parses_disassemble_with_a_path() {
        let cli = Cli::parse_from(["tansyc", "disassemble", "script.tansy"]);
        match cli.command {
            Some(Commands::Disassemble(args)) => assert_eq!(args.path, PathBuf::from("script.tansy")),
            other => panic!("expected Disassemble command, got {other:?}"),
        }
    }

    #[test]
    fn parses_global_verbose_flag() {
        let cli = Cli::parse_from(["tansyc", "--verbose", "repl"]);
        assert!(cli.verbose);
    }

    #[test]
    fn parses_global_config_path() {
        let cli = Cli::parse_from(["tansyc", "--config", "/path/to/tansyc.toml", "repl"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/tansyc.toml")));
    }

    #[test]
    fn parses_global_no_color_flag() {
        let cli = Cli::parse_from(["tansyc", "--no-color", "repl"]);
        assert!(cli.no_color);
    }
}
