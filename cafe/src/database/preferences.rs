//! Small single-value settings: theme, per-user notification settings and
//! the promo code saved for the next checkout

use super::ids::Id;
use super::models::{NotificationSettings, Theme};
use crate::config::{NOTIFICATION_SETTINGS_KEY, SAVED_PROMO_KEY, THEME_KEY};
use crate::error::Result;
use crate::storage::Storage;
use std::collections::BTreeMap;

#[derive(Clone)]
pub struct PreferencesRepo {
    storage: Storage,
}

impl PreferencesRepo {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn theme(&self) -> Theme {
        self.storage.read(THEME_KEY).unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.storage.write(THEME_KEY, &theme)?;
        tracing::debug!("Theme set to {:?}", theme);
        Ok(())
    }

    pub fn notification_settings(&self, user_id: &Id) -> NotificationSettings {
        self.storage
            .read::<BTreeMap<String, NotificationSettings>>(NOTIFICATION_SETTINGS_KEY)
            .and_then(|mut all| all.remove(user_id.as_str()))
            .unwrap_or_default()
    }

    pub fn set_notification_settings(
        &self,
        user_id: &Id,
        settings: NotificationSettings,
    ) -> Result<()> {
        self.storage.transaction(|tx| {
            let mut all: BTreeMap<String, NotificationSettings> =
                tx.read(NOTIFICATION_SETTINGS_KEY).unwrap_or_default();
            all.insert(user_id.to_string(), settings);
            tx.put(NOTIFICATION_SETTINGS_KEY, &all)
        })
    }

    pub fn saved_promo(&self) -> Option<String> {
        self.storage.read(SAVED_PROMO_KEY)
    }

    /// Codes are stored upper-cased
    pub fn save_promo(&self, code: &str) -> Result<()> {
        self.storage
            .write(SAVED_PROMO_KEY, &code.trim().to_ascii_uppercase())
    }

    pub fn clear_promo(&self) -> Result<()> {
        self.storage.remove(SAVED_PROMO_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_defaults_to_light() {
        let prefs = PreferencesRepo::new(Storage::in_memory());
        assert_eq!(prefs.theme(), Theme::Light);

        prefs.set_theme(Theme::Dark).unwrap();
        assert_eq!(prefs.theme(), Theme::Dark);
    }

    #[test]
    fn test_notification_settings_per_user() {
        let prefs = PreferencesRepo::new(Storage::in_memory());
        let quiet = NotificationSettings {
            order_updates: false,
            reservation_reminders: false,
            promotions: false,
        };

        prefs.set_notification_settings(&Id::from(1), quiet).unwrap();

        assert_eq!(prefs.notification_settings(&Id::from(1)), quiet);
        assert_eq!(
            prefs.notification_settings(&Id::from(2)),
            NotificationSettings::default()
        );
    }

    #[test]
    fn test_saved_promo() {
        let prefs = PreferencesRepo::new(Storage::in_memory());
        assert_eq!(prefs.saved_promo(), None);

        prefs.save_promo(" buna10 ").unwrap();
        assert_eq!(prefs.saved_promo().as_deref(), Some("BUNA10"));

        prefs.clear_promo().unwrap();
        assert_eq!(prefs.saved_promo(), None);
    }
}
