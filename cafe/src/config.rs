//! Application configuration
//!
//! Central location for storage keys, pricing constants, resource limits
//! and validation boundaries, plus the runtime `AppConfig` loaded from JSON.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

// ===== Storage Keys =====

pub const USERS_KEY: &str = "cafe_users";
pub const MENU_KEY: &str = "cafe_menu";
pub const ORDERS_KEY: &str = "cafe_orders";
pub const RESERVATIONS_KEY: &str = "cafe_reservations";
pub const NOTIFICATIONS_KEY: &str = "cafe_notifications";
pub const ACTIVITY_LOG_KEY: &str = "cafe_admin_activity";
pub const THEME_KEY: &str = "cafe_theme";
pub const NOTIFICATION_SETTINGS_KEY: &str = "cafe_notification_settings";
pub const SAVED_PROMO_KEY: &str = "cafe_saved_promo";
/// Session mirror of the logged-in user
pub const SESSION_KEY: &str = "currentUser";
/// Per-user carts live under `cafe_cart_<userId>`
pub const CART_KEY_PREFIX: &str = "cafe_cart_";

// ===== Pricing =====

/// Tax applied to every order subtotal
pub const TAX_RATE: f64 = 0.10;

/// Flat fee for delivery orders, in ETB
pub const DELIVERY_FEE: f64 = 50.0;

/// Promo codes accepted at checkout with their discount fraction
pub const PROMO_CODES: &[(&str, f64)] = &[("BUNA10", 0.10), ("WELCOME15", 0.15)];

/// One reward point per this many ETB spent
pub const ETB_PER_REWARD_POINT: f64 = 10.0;

// ===== Capacity Limits =====

/// Non-cancelled reservations allowed per (date, time) slot
pub const RESERVATION_SLOT_CAPACITY: usize = 10;

/// Largest party accepted in a single reservation
pub const MAX_PARTY_SIZE: u32 = 20;

/// Default seating duration in minutes
pub const DEFAULT_RESERVATION_DURATION_MIN: u32 = 120;

/// Notifications are capped globally, not per user
pub const NOTIFICATION_CAP: usize = 50;

pub const ACTIVITY_LOG_CAP: usize = 100;

/// Stock at or below this is reported as low
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// Largest quantity of a single item in one cart
pub const MAX_CART_QUANTITY: u32 = 99;

// ===== Validation Limits =====

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_NAME_LENGTH: usize = 100;

// ===== Password Hashing =====

/// Argon2id memory cost in KiB
pub const PASSWORD_HASH_MEMORY_KIB: u32 = 4096;
pub const PASSWORD_HASH_ITERATIONS: u32 = 1;
pub const PASSWORD_HASH_PARALLELISM: u32 = 1;

// ===== Mock API =====

/// Simulated round-trip latency for every facade call
pub const DEFAULT_API_LATENCY_MS: u64 = 300;

/// Upper bound for configured latency (10 seconds)
pub const MAX_API_LATENCY_MS: u64 = 10_000;

/// What to put in empty collections on first access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedMode {
    /// Demo users, menu and a sample reservation
    Demo,
    /// Empty collections (only the admin account is created)
    Empty,
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_latency_ms")]
    pub api_latency_ms: u64,
    /// Probability in [0, 1] that a facade call fails with a network error
    #[serde(default)]
    pub failure_rate: f64,
    #[serde(default = "default_seed")]
    pub seed: SeedMode,
    #[serde(default = "default_slot_capacity")]
    pub reservation_slot_capacity: usize,
}

fn default_api_latency_ms() -> u64 {
    DEFAULT_API_LATENCY_MS
}

fn default_seed() -> SeedMode {
    SeedMode::Demo
}

fn default_slot_capacity() -> usize {
    RESERVATION_SLOT_CAPACITY
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_latency_ms: default_api_latency_ms(),
            failure_rate: 0.0,
            seed: default_seed(),
            reservation_slot_capacity: default_slot_capacity(),
        }
    }
}

impl AppConfig {
    /// Configuration for tests: no latency, no failures, empty menu
    pub fn instant() -> Self {
        Self {
            api_latency_ms: 0,
            failure_rate: 0.0,
            seed: SeedMode::Empty,
            reservation_slot_capacity: RESERVATION_SLOT_CAPACITY,
        }
    }

    pub fn api_latency(&self) -> Duration {
        Duration::from_millis(self.api_latency_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(AppError::validation(format!(
                "failure_rate must be between 0 and 1, got {}",
                self.failure_rate
            )));
        }
        if self.api_latency_ms > MAX_API_LATENCY_MS {
            return Err(AppError::validation(format!(
                "api_latency_ms must be at most {}, got {}",
                MAX_API_LATENCY_MS, self.api_latency_ms
            )));
        }
        if self.reservation_slot_capacity == 0 {
            return Err(AppError::validation(
                "reservation_slot_capacity must be at least 1",
            ));
        }
        Ok(())
    }

    /// Load configuration from disk, writing the defaults if the file is missing
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file not found, writing defaults to {:?}", path);
            let config = AppConfig::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = fs::read_to_string(path).await?;
        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        tracing::debug!("Config saved to {:?}", path);
        Ok(())
    }
}
