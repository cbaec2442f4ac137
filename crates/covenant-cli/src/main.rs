//! Covenant CLI: the `covenant` command.

mod cli;
mod commands;
mod contract_file;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            contract,
            input,
            json,
        } => commands::check::run(contract, input, json),

        Commands::Keys { contract, json } => commands::keys::run(contract, json),
    }
}
