//! Users collection
//!
//! Numeric ids assigned max+1. Emails are unique case-insensitively;
//! uniqueness is checked inside the write transaction.

use super::carts::cart_key;
use super::ids::{next_numeric, Id};
use super::models::{AccountStatus, NewUser, Role, User, UserPatch, UserPreferences, UserStats};
use crate::config::{ETB_PER_REWARD_POINT, USERS_KEY};
use crate::crypto::hash_password;
use crate::error::{AppError, Result};
use crate::storage::Storage;
use crate::validation::{
    matches_query, normalize_email, require, validate_email, validate_name, validate_password,
    validate_phone,
};
use chrono::Utc;

#[derive(Clone)]
pub struct UsersRepo {
    storage: Storage,
}

fn email_taken(users: &[User], email: &str, except: Option<&Id>) -> bool {
    let email = normalize_email(email);
    users
        .iter()
        .filter(|u| Some(&u.id) != except)
        .any(|u| normalize_email(&u.email) == email)
}

impl UsersRepo {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn get_all(&self) -> Vec<User> {
        self.storage.read_collection(USERS_KEY)
    }

    pub fn get_by_id(&self, id: &Id) -> Option<User> {
        self.get_all().into_iter().find(|u| &u.id == id)
    }

    /// Case-insensitive lookup
    pub fn get_by_email(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        self.get_all()
            .into_iter()
            .find(|u| normalize_email(&u.email) == email)
    }

    pub fn get_by_role(&self, role: Role) -> Vec<User> {
        self.get_all()
            .into_iter()
            .filter(|u| u.role == role)
            .collect()
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.get_all().iter().filter(|u| u.role == role).count()
    }

    /// Match against name, email and phone
    pub fn search(&self, query: &str) -> Vec<User> {
        self.get_all()
            .into_iter()
            .filter(|u| matches_query(query, &[&u.name, &u.email, &u.phone]))
            .collect()
    }

    /// Insert a user; role defaults to customer, status to active
    pub fn add(&self, new: NewUser) -> Result<User> {
        validate_name(&new.name)?;
        validate_email(&new.email)?;
        require("Password", &new.password)?;

        let password = hash_password(&new.password)?;

        let user = self.storage.transaction(|tx| {
            let mut users: Vec<User> = tx.collection(USERS_KEY);

            if email_taken(&users, &new.email, None) {
                return Err(AppError::DuplicateEmail(normalize_email(&new.email)));
            }

            let user = User {
                id: next_numeric(users.iter().map(|u| &u.id)),
                name: new.name.trim().to_string(),
                email: new.email.trim().to_string(),
                password,
                phone: new.phone.trim().to_string(),
                role: new.role.unwrap_or_default(),
                status: AccountStatus::Active,
                avatar: new.avatar,
                created_at: Utc::now(),
                updated_at: None,
                last_login: None,
                address: new.address,
                preferences: UserPreferences::default(),
                stats: UserStats::default(),
            };

            users.push(user.clone());
            tx.put(USERS_KEY, &users)?;
            Ok(user)
        })?;

        tracing::debug!("Created user {} ({})", user.id, user.role.as_str());
        Ok(user)
    }

    /// Shallow-merge `patch` into the user
    pub fn update(&self, id: &Id, patch: UserPatch) -> Result<User> {
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }
        if let Some(email) = &patch.email {
            validate_email(email)?;
        }
        if let Some(phone) = &patch.phone {
            validate_phone(phone)?;
        }
        let password = match &patch.password {
            Some(plain) => {
                validate_password(plain)?;
                Some(hash_password(plain)?)
            }
            None => None,
        };

        let user = self.storage.transaction(|tx| {
            let mut users: Vec<User> = tx.collection(USERS_KEY);

            if let Some(email) = &patch.email {
                if email_taken(&users, email, Some(id)) {
                    return Err(AppError::DuplicateEmail(normalize_email(email)));
                }
            }

            let user = users
                .iter_mut()
                .find(|u| &u.id == id)
                .ok_or_else(|| AppError::not_found("User", id))?;

            if let Some(name) = patch.name {
                user.name = name.trim().to_string();
            }
            if let Some(email) = patch.email {
                user.email = email.trim().to_string();
            }
            if let Some(password) = password {
                user.password = password;
            }
            if let Some(phone) = patch.phone {
                user.phone = phone.trim().to_string();
            }
            if let Some(role) = patch.role {
                user.role = role;
            }
            if let Some(status) = patch.status {
                user.status = status;
            }
            if let Some(avatar) = patch.avatar {
                user.avatar = Some(avatar);
            }
            if let Some(address) = patch.address {
                user.address = Some(address);
            }
            if let Some(preferences) = patch.preferences {
                user.preferences = preferences;
            }
            user.updated_at = Some(Utc::now());

            let updated = user.clone();
            tx.put(USERS_KEY, &users)?;
            Ok(updated)
        })?;

        tracing::debug!("Updated user {}", user.id);
        Ok(user)
    }

    pub fn update_last_login(&self, id: &Id) -> Result<User> {
        self.modify(id, |user| user.last_login = Some(Utc::now()))
    }

    /// Add a placed order to the user's running totals and reward points
    pub fn record_order(&self, id: &Id, order_total: f64) -> Result<User> {
        self.modify(id, |user| {
            user.stats.total_orders += 1;
            user.stats.total_spent += order_total;
            user.stats.reward_points = (user.stats.total_spent / ETB_PER_REWARD_POINT) as u32;
        })
    }

    /// Remove the user and their cart
    pub fn delete(&self, id: &Id) -> Result<()> {
        self.storage.transaction(|tx| {
            let mut users: Vec<User> = tx.collection(USERS_KEY);
            let before = users.len();
            users.retain(|u| &u.id != id);
            if users.len() == before {
                return Err(AppError::not_found("User", id));
            }
            tx.put(USERS_KEY, &users)?;
            tx.remove(&cart_key(id));
            Ok(())
        })?;

        tracing::info!("Deleted user {} and their cart", id);
        Ok(())
    }

    fn modify(&self, id: &Id, apply: impl FnOnce(&mut User)) -> Result<User> {
        self.storage.transaction(|tx| {
            let mut users: Vec<User> = tx.collection(USERS_KEY);
            let user = users
                .iter_mut()
                .find(|u| &u.id == id)
                .ok_or_else(|| AppError::not_found("User", id))?;
            apply(user);
            user.updated_at = Some(Utc::now());
            let updated = user.clone();
            tx.put(USERS_KEY, &users)?;
            Ok(updated)
        })
    }
}
