// curator-cli/src/main.rs
//
// Entry point of the `curator` binary.
//
// Responsibilities include:
// - Parsing the command line.
// - Initialising logging.
// - Loading the planner configuration.
// - Dispatching to the `plan` or `process` command.
// - Mapping failures to a non-zero exit code.

use clap::Parser;
use curator_cli::cli::{Cli, Commands};
use curator_cli::config::load_config;
use curator_cli::logging::init_logging;
use curator_cli::{run_plan, run_process};
use std::process;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_deref()).and_then(|config| match &cli.command {
        Commands::Plan(args) => run_plan(args, &config),
        Commands::Process(args) => run_process(args, &config),
    });

    if let Err(e) = result {
        log::error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
