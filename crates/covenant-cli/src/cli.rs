use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "covenant",
    about = "Covenant: validate JSON documents against declarative contracts",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate one JSON document against a contract
    Check {
        /// Contract definition (TOML)
        #[arg(long)]
        contract: String,

        /// JSON document to validate (`-` reads stdin)
        #[arg(long, default_value = "-")]
        input: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the key paths a contract's schema declares
    Keys {
        /// Contract definition (TOML)
        #[arg(long)]
        contract: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
