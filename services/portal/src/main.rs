use anyhow::{Context as _, Result};
use clap::Parser;

use portal::cli::{self, Cli};
use portal::config::PortalConfig;
use portal_core::config::Config as _;
use portal_core::tracing::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = PortalConfig::try_from_env()
        .context("load configuration (SUPABASE_URL, SUPABASE_ANON_KEY)")?;
    init_tracing(config.log_json);

    cli::run(cli, config).await
}
