//! Command-line front end over the `cogflow` platform facade.
//!
//! Four subcommands: `validate`, `compile`, `info`, `examples`. Exit code 0
//! on success, 1 if any file failed validation or a hard error occurred.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cogflow", version, about = "Cognitive-model graph compiler and executor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate one or more documents.
    Validate(commands::validate::Args),
    /// Compile a document into a graph, optionally optimized.
    Compile(commands::compile::Args),
    /// Print a human-readable report for a document.
    Info(commands::info::Args),
    /// List example documents bundled with this crate.
    Examples(commands::examples::Args),
}

fn main() {
    tracing_subscriber::fmt::try_init().ok();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Validate(args) => commands::validate::run(args),
        Command::Compile(args) => commands::compile::run(args),
        Command::Info(args) => commands::info::run(args),
        Command::Examples(args) => commands::examples::run(args),
    };
    std::process::exit(code);
}
