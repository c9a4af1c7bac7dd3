// TermLink - Simple serial terminal I/O tool
mod cli;
mod core;
mod domain;
mod infrastructure;

use std::process::ExitCode;

use clap::Parser;
use cli::args::Args;
use cli::commands::execute;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = infrastructure::logging::init_logging() {
        eprintln!("Error: {err:#}");
        return ExitCode::FAILURE;
    }

    execute(args)
}
