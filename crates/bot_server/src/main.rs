use clap::Parser;
use std::io;

use bot_server::config::{BotConfig, Cli};
use bot_server::logging::init_logging;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();

    let config = match BotConfig::load(cli.config.as_deref()) {
        Ok(config) => config.with_cli(&cli),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    init_logging(config.debug, cli.log_level.as_deref());
    tracing::info!("Starting band assistant on port {}", config.port);
    tracing::debug!(?config, "effective configuration");

    bot_server::run(config).await
}
