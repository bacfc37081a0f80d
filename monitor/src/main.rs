use clap::Parser;

use common::init_logger;
use monitor::{
    app,
    cli::{Cli, Command},
    config::AppConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("monitor", cli.json_logs || is_production);

    let cfg = AppConfig::load(&cli.config)?;
    tracing::info!(
        assets = cfg.top_n_assets,
        quote = %cfg.quote_currency,
        short = cfg.short_ma_period,
        long = cfg.long_ma_period,
        interval_s = cfg.check_interval_seconds,
        "configuration loaded"
    );

    match cli.selected() {
        Command::Run => app::run_monitor(&cfg).await,
        Command::Prices => app::print_prices(&cfg).await,
        Command::Chart { asset_id, rows } => app::print_chart(&cfg, &asset_id, rows).await,
    }
}
