//! Admin activity log, newest first, pruned to `ACTIVITY_LOG_CAP`

use super::ids::{generate_prefixed, Id};
use super::models::ActivityEntry;
use crate::config::{ACTIVITY_LOG_CAP, ACTIVITY_LOG_KEY};
use crate::error::Result;
use crate::storage::Storage;
use chrono::Utc;

#[derive(Clone)]
pub struct ActivityLog {
    storage: Storage,
}

impl ActivityLog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn log(
        &self,
        user_id: Option<&Id>,
        action: impl Into<String>,
        details: impl Into<String>,
    ) -> Result<ActivityEntry> {
        let action = action.into();
        let details = details.into();

        let entry = self.storage.transaction(|tx| {
            let mut entries: Vec<ActivityEntry> = tx.collection(ACTIVITY_LOG_KEY);
            let entry = ActivityEntry {
                id: generate_prefixed("ACT", |candidate| {
                    entries.iter().any(|e| e.id == candidate)
                }),
                user_id: user_id.cloned(),
                action,
                details,
                timestamp: Utc::now(),
            };
            entries.insert(0, entry.clone());
            entries.truncate(ACTIVITY_LOG_CAP);
            tx.put(ACTIVITY_LOG_KEY, &entries)?;
            Ok(entry)
        })?;

        tracing::debug!("Activity: {} ({})", entry.action, entry.details);
        Ok(entry)
    }

    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let mut entries: Vec<ActivityEntry> = self.storage.read_collection(ACTIVITY_LOG_KEY);
        entries.truncate(limit);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_newest_first() {
        let log = ActivityLog::new(Storage::in_memory());
        let admin = Id::from(1);

        log.log(Some(&admin), "menu.add", "Added Buna").unwrap();
        log.log(None, "system.reset", "").unwrap();

        let recent = log.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "system.reset");
        assert_eq!(recent[1].user_id, Some(admin));
        assert_eq!(log.recent(1).len(), 1);
    }

    #[test]
    fn test_log_is_capped() {
        let log = ActivityLog::new(Storage::in_memory());
        for i in 0..ACTIVITY_LOG_CAP + 3 {
            log.log(None, "tick", i.to_string()).unwrap();
        }

        let all = log.recent(usize::MAX);
        assert_eq!(all.len(), ACTIVITY_LOG_CAP);
        assert_eq!(all[0].details, (ACTIVITY_LOG_CAP + 2).to_string());
    }
}
