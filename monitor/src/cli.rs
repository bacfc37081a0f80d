use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "monitor", version, about = "Moving-average crossover monitor")]
pub struct Cli {
    /// Path to the JSON config file; created with defaults when missing
    #[clap(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Emit logs as JSON (also enabled by APP_ENV=production)
    #[clap(long)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the monitoring loop until Ctrl-C (default)
    Run,

    /// Print the current top-N price table once
    Prices,

    /// Print recent candles with moving averages for one asset
    Chart {
        /// Provider asset id, e.g. `bitcoin`
        asset_id: String,

        /// Candles to print per timeframe
        #[clap(long, default_value_t = 12)]
        rows: usize,
    },
}

impl Cli {
    pub fn selected(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}
