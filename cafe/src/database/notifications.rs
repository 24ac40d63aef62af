//! Notifications collection
//!
//! One list shared by all users, newest first, pruned to `NOTIFICATION_CAP`.

use super::ids::{generate_prefixed, Id};
use super::models::{NewNotification, Notification};
use crate::config::{NOTIFICATIONS_KEY, NOTIFICATION_CAP};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use chrono::Utc;

#[derive(Clone)]
pub struct NotificationsRepo {
    storage: Storage,
}

impl NotificationsRepo {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get_all(&self) -> Vec<Notification> {
        self.storage.read_collection(NOTIFICATIONS_KEY)
    }

    pub fn get_by_id(&self, id: &Id) -> Option<Notification> {
        self.get_all().into_iter().find(|n| &n.id == id)
    }

    pub fn get_for_user(&self, user_id: &Id) -> Vec<Notification> {
        self.get_all()
            .into_iter()
            .filter(|n| &n.user_id == user_id)
            .collect()
    }

    pub fn unread_count(&self, user_id: &Id) -> usize {
        self.get_all()
            .iter()
            .filter(|n| &n.user_id == user_id && !n.read)
            .count()
    }

    pub fn add(&self, new: NewNotification) -> Result<Notification> {
        let notification = self.storage.transaction(|tx| {
            let mut all: Vec<Notification> = tx.collection(NOTIFICATIONS_KEY);
            let notification = Notification {
                id: generate_prefixed("NOTIF", |candidate| all.iter().any(|n| n.id == candidate)),
                user_id: new.user_id,
                kind: new.kind,
                title: new.title,
                message: new.message,
                timestamp: Utc::now(),
                read: false,
            };

            all.insert(0, notification.clone());
            all.truncate(NOTIFICATION_CAP);
            tx.put(NOTIFICATIONS_KEY, &all)?;
            Ok(notification)
        })?;

        tracing::debug!(
            "Notified user {}: {}",
            notification.user_id,
            notification.title
        );
        Ok(notification)
    }

    pub fn mark_read(&self, id: &Id) -> Result<Notification> {
        self.storage.transaction(|tx| {
            let mut all: Vec<Notification> = tx.collection(NOTIFICATIONS_KEY);
            let notification = all
                .iter_mut()
                .find(|n| &n.id == id)
                .ok_or_else(|| AppError::not_found("Notification", id))?;
            notification.read = true;
            let updated = notification.clone();
            tx.put(NOTIFICATIONS_KEY, &all)?;
            Ok(updated)
        })
    }

    /// Returns how many were newly marked
    pub fn mark_all_read(&self, user_id: &Id) -> Result<usize> {
        self.storage.transaction(|tx| {
            let mut all: Vec<Notification> = tx.collection(NOTIFICATIONS_KEY);
            let mut marked = 0;
            for n in all.iter_mut().filter(|n| &n.user_id == user_id && !n.read) {
                n.read = true;
                marked += 1;
            }
            if marked > 0 {
                tx.put(NOTIFICATIONS_KEY, &all)?;
            }
            Ok(marked)
        })
    }

    pub fn delete(&self, id: &Id) -> Result<()> {
        self.storage.transaction(|tx| {
            let mut all: Vec<Notification> = tx.collection(NOTIFICATIONS_KEY);
            let before = all.len();
            all.retain(|n| &n.id != id);
            if all.len() == before {
                return Err(AppError::not_found("Notification", id));
            }
            tx.put(NOTIFICATIONS_KEY, &all)
        })
    }

    pub fn clear_for_user(&self, user_id: &Id) -> Result<()> {
        self.storage.transaction(|tx| {
            let mut all: Vec<Notification> = tx.collection(NOTIFICATIONS_KEY);
            all.retain(|n| &n.user_id != user_id);
            tx.put(NOTIFICATIONS_KEY, &all)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NotificationKind;

    fn note(user: u64, title: &str) -> NewNotification {
        NewNotification {
            user_id: Id::from(user),
            kind: NotificationKind::Order,
            title: title.to_string(),
            message: format!("{} message", title),
        }
    }

    #[test]
    fn test_newest_first_and_capped() {
        let repo = NotificationsRepo::new(Storage::in_memory());

        for i in 0..NOTIFICATION_CAP + 5 {
            repo.add(note(1, &format!("n{}", i))).unwrap();
        }

        let all = repo.get_all();
        assert_eq!(all.len(), NOTIFICATION_CAP);
        assert_eq!(all[0].title, format!("n{}", NOTIFICATION_CAP + 4));
    }

    #[test]
    fn test_read_state() {
        let repo = NotificationsRepo::new(Storage::in_memory());
        let first = repo.add(note(1, "Order placed")).unwrap();
        repo.add(note(1, "Order ready")).unwrap();
        repo.add(note(2, "Welcome")).unwrap();

        assert_eq!(repo.unread_count(&Id::from(1)), 2);
        repo.mark_read(&first.id).unwrap();
        assert_eq!(repo.unread_count(&Id::from(1)), 1);

        assert_eq!(repo.mark_all_read(&Id::from(1)).unwrap(), 1);
        assert_eq!(repo.mark_all_read(&Id::from(1)).unwrap(), 0);
        assert_eq!(repo.unread_count(&Id::from(2)), 1);
    }

    #[test]
    fn test_delete_and_clear() {
        let repo = NotificationsRepo::new(Storage::in_memory());
        let first = repo.add(note(1, "a")).unwrap();
        repo.add(note(1, "b")).unwrap();
        repo.add(note(2, "c")).unwrap();

        repo.delete(&first.id).unwrap();
        assert!(matches!(
            repo.delete(&first.id),
            Err(AppError::NotFound { .. })
        ));

        repo.clear_for_user(&Id::from(1)).unwrap();
        assert!(repo.get_for_user(&Id::from(1)).is_empty());
        assert_eq!(repo.get_for_user(&Id::from(2)).len(), 1);
    }
}
