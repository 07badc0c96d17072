use std::sync::Arc;

use anyhow::Context;
use common::logger::init_logger;
use market::bybit::BybitClient;
use scanner::config::AppConfig;
use scanner::delivery::telegram::TelegramClient;
use scanner::run::Scanner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("scanner", is_production);

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(config = ?cfg, "configuration loaded");

    let bybit = Arc::new(BybitClient::new(cfg.bybit_base_url.clone()).context("bybit client")?);
    let telegram = Arc::new(
        TelegramClient::new(&cfg.telegram_api_url, &cfg.bot_token, cfg.chat_id.clone())
            .context("telegram client")?,
    );

    let scanner = Scanner::new(cfg, bybit.clone(), bybit, telegram);
    let summary = scanner.run(&chrono::Local::now()).await?;

    tracing::info!(
        trace_id = %summary.trace_id,
        outcome = ?summary.outcome,
        instruments = summary.instruments,
        delivered = summary.counters.messages_delivered,
        "scanner exiting"
    );

    Ok(())
}
