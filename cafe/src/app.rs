//! Application state and initialization
//!
//! `AppState` is the explicit context every page controller receives: the
//! configuration, the repositories, the session and the API facade, all over
//! one storage handle. A second tab is a second `AppState` from `open_tab`.

use crate::config::AppConfig;
use crate::database::Database;
use crate::error::Result;
use crate::services::{Api, AuthService, SessionState};
use crate::storage::{FileStore, Storage};
use std::path::Path;
use tokio::task::JoinHandle;

pub const CONFIG_FILE: &str = "config.json";
pub const STORE_DIR: &str = "store";

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub auth: AuthService,
    pub api: Api,
}

impl AppState {
    /// Initialize collections over `storage` and restore any saved session
    pub fn open(storage: Storage, config: AppConfig) -> Result<Self> {
        config.validate()?;
        let db = Database::open(storage, &config)?;
        Self::assemble(db, config)
    }

    /// Persistent state under `data_dir`: `config.json` plus one file per key
    pub async fn open_dir(data_dir: &Path) -> Result<Self> {
        tracing::info!("App data directory: {:?}", data_dir);
        tokio::fs::create_dir_all(data_dir).await?;

        let config = AppConfig::load(&data_dir.join(CONFIG_FILE)).await?;
        let store = FileStore::open(data_dir.join(STORE_DIR))?;
        Self::open(Storage::new(store), config)
    }

    /// Sibling state over the same backend with its own session mirror
    pub fn open_tab(&self) -> Result<Self> {
        let db = Database::attach(self.db.storage().open_tab(), &self.config);
        Self::assemble(db, self.config.clone())
    }

    fn assemble(db: Database, config: AppConfig) -> Result<Self> {
        let auth = AuthService::new(db.users.clone(), db.storage().clone());
        if let SessionState::Authenticated(user) = auth.restore()? {
            tracing::info!("Restored session for user {}", user.id);
        }
        let api = Api::new(db.clone(), auth.clone(), &config);

        Ok(Self {
            config,
            db,
            auth,
            api,
        })
    }

    /// Keep this tab's session in line with the others
    pub fn start_session_sync(&self) -> JoinHandle<()> {
        self.auth.spawn_storage_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedMode;
    use tempfile::TempDir;

    #[test]
    fn test_open_tab_shares_data_and_session() {
        let state = AppState::open(Storage::in_memory(), AppConfig::instant()).unwrap();
        state.auth.login("admin@cafe.et", "Admin123").unwrap();

        let tab = state.open_tab().unwrap();

        assert_ne!(tab.db.storage().tab_id(), state.db.storage().tab_id());
        assert!(tab.auth.is_authenticated());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AppConfig {
            failure_rate: 2.0,
            ..AppConfig::instant()
        };
        assert!(AppState::open(Storage::in_memory(), config).is_err());
    }

    #[tokio::test]
    async fn test_open_dir_persists() {
        let temp_dir = TempDir::new().unwrap();

        let state = AppState::open_dir(temp_dir.path()).await.unwrap();
        assert_eq!(state.config.seed, SeedMode::Demo);
        assert!(temp_dir.path().join(CONFIG_FILE).exists());
        state.auth.login("abebe@example.com", "Customer1").unwrap();

        let reopened = AppState::open_dir(temp_dir.path()).await.unwrap();
        assert_eq!(reopened.db.users.get_all().len(), 3);
        assert_eq!(
            reopened.auth.current_user().map(|u| u.email),
            Some("abebe@example.com".to_string())
        );
    }
}
