//! Sandbox sync harness
//!
//! Links a Plaid sandbox institution, pulls every transaction in a fixed
//! window and writes them to the local transactions file.

use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finance_core::{
    aggregator::DateRange, store::DEFAULT_STORE_PATH, BankAggregator, IngestionService,
    JsonFileStore,
};
use finance_runtime::{plaid::SANDBOX_INSTITUTION, PlaidClient};

const BATCH_SIZE: u32 = 100;

fn date(y: i32, m: u32, d: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).with_context(|| format!("invalid date {y}-{m}-{d}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let plaid = Arc::new(PlaidClient::from_env().context("Plaid credentials required")?);
    let path = std::env::var("TRANSACTIONS_PATH").unwrap_or_else(|_| DEFAULT_STORE_PATH.into());
    let store = Arc::new(JsonFileStore::new(path.clone()));

    tracing::info!("Creating sandbox item at {}", SANDBOX_INSTITUTION);
    let public_token = plaid.create_sandbox_public_token(SANDBOX_INSTITUTION).await?;
    let access_token = plaid.exchange_public_token(&public_token).await?;
    tracing::info!("✓ Access token obtained");

    let range = DateRange::new(date(2023, 1, 1)?, date(2025, 5, 1)?);
    let service = IngestionService::new(plaid, store);
    let transactions = service.sync_all(&access_token, range, BATCH_SIZE).await?;

    tracing::info!("✓ Saved {} transactions to {}", transactions.len(), path);
    let earliest = transactions.iter().map(|tx| tx.date).min();
    let latest = transactions.iter().map(|tx| tx.date).max();
    if let (Some(earliest), Some(latest)) = (earliest, latest) {
        tracing::info!("  Date range: {} to {}", earliest, latest);
    }

    Ok(())
}
