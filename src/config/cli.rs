use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "account-service")]
#[command(about = "Serves account resources to sibling services over the message bus")]
pub struct CliArgs {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// JSON fixture loaded into the in-memory store at startup
    #[arg(long)]
    pub seed: Option<PathBuf>,

    #[arg(long, short = 'v', help = "Enable verbose output")]
    pub verbose: bool,
}
