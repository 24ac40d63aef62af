// Café core - bootstrap binary
// Opens the data directory, seeds collections and prints a summary

use anyhow::Context;
use cafe::app::AppState;
use cafe::services::stats;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DATA_DIR_ENV: &str = "CAFE_DATA_DIR";
const DEFAULT_DATA_DIR: &str = "cafe-data";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cafe=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting café core");

    let data_dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

    let state = AppState::open_dir(&data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;

    let summary = stats::dashboard(&state.db);
    tracing::info!(
        "{} menu items ({} low on stock), {} orders, {} upcoming reservations, {} customers",
        summary.menu_items,
        summary.low_stock.len(),
        summary.total_orders,
        summary.upcoming_reservations,
        summary.total_customers
    );
    match state.auth.current_user() {
        Some(user) => tracing::info!("Session: {} ({})", user.email, user.role.as_str()),
        None => tracing::info!("No active session"),
    }

    Ok(())
}
