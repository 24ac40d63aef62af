//! Database module
//!
//! This module provides the JSON collections and their repositories:
//! - Record types and id normalization
//! - Seeding and backfill on open
//! - One repository per collection

pub mod activity;
pub mod carts;
pub mod ids;
pub mod menu;
pub mod models;
pub mod notifications;
pub mod orders;
pub mod preferences;
pub mod reservations;
pub mod schema;
pub mod users;

pub use activity::ActivityLog;
pub use carts::CartsRepo;
pub use ids::Id;
pub use menu::MenuRepo;
pub use models::*;
pub use notifications::NotificationsRepo;
pub use orders::OrdersRepo;
pub use preferences::PreferencesRepo;
pub use reservations::ReservationsRepo;
pub use users::UsersRepo;

use crate::config::{AppConfig, SeedMode};
use crate::error::Result;
use crate::storage::Storage;

/// Every repository over one storage handle
#[derive(Clone)]
pub struct Database {
    storage: Storage,
    seed: SeedMode,
    pub users: UsersRepo,
    pub menu: MenuRepo,
    pub orders: OrdersRepo,
    pub reservations: ReservationsRepo,
    pub carts: CartsRepo,
    pub notifications: NotificationsRepo,
    pub activity: ActivityLog,
    pub preferences: PreferencesRepo,
}

impl Database {
    /// Seed and backfill collections, then hand out repositories
    pub fn open(storage: Storage, config: &AppConfig) -> Result<Self> {
        schema::initialize(&storage, config.seed)?;
        Ok(Self::attach(storage, config))
    }

    /// Repositories over an already initialized store
    pub fn attach(storage: Storage, config: &AppConfig) -> Self {
        Self {
            users: UsersRepo::new(storage.clone()),
            menu: MenuRepo::new(storage.clone()),
            orders: OrdersRepo::new(storage.clone()),
            reservations: ReservationsRepo::new(storage.clone(), config.reservation_slot_capacity),
            carts: CartsRepo::new(storage.clone()),
            notifications: NotificationsRepo::new(storage.clone()),
            activity: ActivityLog::new(storage.clone()),
            preferences: PreferencesRepo::new(storage.clone()),
            seed: config.seed,
            storage,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Drop every key, sessions and carts included, and seed again
    pub fn reset(&self) -> Result<()> {
        tracing::warn!("Resetting all collections");
        self.storage.clear()?;
        schema::initialize(&self.storage, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewMenuItem;

    #[test]
    fn test_open_and_reset() {
        let db = Database::open(Storage::in_memory(), &AppConfig::instant()).unwrap();
        assert_eq!(db.users.get_all().len(), 1);

        db.menu
            .add(NewMenuItem {
                name: "Buna".to_string(),
                price: 50.0,
                category: "coffee".to_string(),
                stock: 3,
                ..Default::default()
            })
            .unwrap();
        db.preferences.save_promo("BUNA10").unwrap();

        db.reset().unwrap();

        assert!(db.menu.get_all().is_empty());
        assert_eq!(db.preferences.saved_promo(), None);
        assert_eq!(db.users.get_all().len(), 1);
    }

    #[test]
    fn test_repositories_share_storage() {
        let db = Database::open(Storage::in_memory(), &AppConfig::instant()).unwrap();
        let other_tab = Database::attach(db.storage().open_tab(), &AppConfig::instant());

        let admin = db.users.get_by_email("admin@cafe.et").unwrap();
        assert_eq!(other_tab.users.get_by_id(&admin.id), Some(admin));
    }
}
