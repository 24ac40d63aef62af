//! Session management
//!
//! The logged-in user is kept in two places: a password-free copy under
//! `SESSION_KEY` in storage, and an in-memory mirror published through a
//! watch channel. Every storage handle (tab) has its own mirror; the sync
//! task keeps it in line with login and logout in other tabs.

use crate::config::SESSION_KEY;
use crate::crypto::verify_password;
use crate::database::{Id, NewUser, Role, User, UsersRepo};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use crate::validation::{validate_email, validate_name, validate_password, validate_phone};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Stored session copy of a user. Never carries the password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Id,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub role: Role,
    #[serde(default)]
    pub avatar: Option<String>,
    pub login_at: DateTime<Utc>,
    pub session_token: Uuid,
}

impl SessionUser {
    fn start(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            avatar: user.avatar.clone(),
            login_at: Utc::now(),
            session_token: Uuid::new_v4(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(SessionUser),
}

impl SessionState {
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(user) => Some(user),
        }
    }
}

/// Where a user lands after logging in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Landing {
    AdminDashboard,
    StaffOrders,
    Menu,
}

impl Landing {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Landing::AdminDashboard,
            Role::Staff => Landing::StaffOrders,
            Role::Customer => Landing::Menu,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: UsersRepo,
    storage: Storage,
    state: Arc<watch::Sender<SessionState>>,
}

impl AuthService {
    pub fn new(users: UsersRepo, storage: Storage) -> Self {
        let (state, _) = watch::channel(SessionState::Anonymous);
        Self {
            users,
            storage,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    /// Log in by email (any case) and password
    pub fn login(&self, email: &str, password: &str) -> Result<(SessionUser, Landing)> {
        let user = match self.users.get_by_email(email) {
            Some(user) if verify_password(password, &user.password) => user,
            _ => {
                tracing::warn!("Failed login attempt for {}", email.trim());
                return Err(AppError::InvalidCredentials);
            }
        };
        if !user.is_active() {
            tracing::warn!("Login refused for inactive user {}", user.id);
            return Err(AppError::AccountInactive);
        }

        let user = self.users.update_last_login(&user.id)?;
        let session = SessionUser::start(&user);
        self.storage.write(SESSION_KEY, &session)?;
        self.state
            .send_replace(SessionState::Authenticated(session.clone()));

        tracing::info!("User {} logged in as {}", user.id, user.role.as_str());
        Ok((session, Landing::for_role(user.role)))
    }

    /// Create a customer account. Does not log in.
    pub fn register(&self, request: RegisterRequest) -> Result<User> {
        validate_name(&request.name)?;
        validate_email(&request.email)?;
        validate_phone(&request.phone)?;
        validate_password(&request.password)?;
        if request.password != request.confirm_password {
            return Err(AppError::validation("Passwords do not match"));
        }

        let user = self.users.add(NewUser {
            name: request.name,
            email: request.email,
            password: request.password,
            phone: request.phone,
            role: Some(Role::Customer),
            address: None,
            avatar: None,
        })?;

        tracing::info!("Registered customer {}", user.id);
        Ok(user)
    }

    pub fn logout(&self) -> Result<()> {
        self.storage.remove(SESSION_KEY)?;
        if let Some(user) = self.current_user() {
            tracing::info!("User {} logged out", user.id);
        }
        self.state.send_replace(SessionState::Anonymous);
        Ok(())
    }

    /// Rebuild the mirror from storage. A session whose user no longer
    /// exists or is inactive is dropped.
    pub fn restore(&self) -> Result<SessionState> {
        let state = match self.storage.read::<SessionUser>(SESSION_KEY) {
            Some(session) => match self.users.get_by_id(&session.id) {
                Some(user) if user.is_active() => SessionState::Authenticated(session),
                _ => {
                    tracing::warn!("Dropping stale session for user {}", session.id);
                    self.storage.remove(SESSION_KEY)?;
                    SessionState::Anonymous
                }
            },
            None => SessionState::Anonymous,
        };

        self.state.send_replace(state.clone());
        Ok(state)
    }

    /// Current user if their role is `role`. Admins pass every check.
    pub fn require_role(&self, role: Role) -> Result<SessionUser> {
        let user = self.current_user().ok_or(AppError::NotAuthenticated)?;
        if user.role == role || user.role == Role::Admin {
            Ok(user)
        } else {
            Err(AppError::Forbidden(role.as_str()))
        }
    }

    pub fn require_user(&self) -> Result<SessionUser> {
        self.current_user().ok_or(AppError::NotAuthenticated)
    }

    /// Mirror session changes made by other tabs. Changes from this tab's
    /// own handle are ignored. The task holds no `Storage` handle, so it ends
    /// once every handle over the backend has been dropped.
    pub fn spawn_storage_sync(&self) -> JoinHandle<()> {
        let mut events = self.storage.subscribe();
        let own_tab = self.storage.tab_id();
        let reader = self.storage.reader();
        let state_tx = Arc::clone(&self.state);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.key == SESSION_KEY && event.origin != own_tab => {
                        let state = event
                            .new_value
                            .as_deref()
                            .and_then(|raw| serde_json::from_str::<SessionUser>(raw).ok())
                            .map_or(SessionState::Anonymous, SessionState::Authenticated);
                        tracing::debug!(
                            "Session changed in tab {}: {}",
                            event.origin,
                            if state.user().is_some() { "login" } else { "logout" }
                        );
                        state_tx.send_replace(state);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Session sync lagged by {} events, re-reading", skipped);
                        let state = reader
                            .read::<SessionUser>(SESSION_KEY)
                            .map_or(SessionState::Anonymous, SessionState::Authenticated);
                        state_tx.send_replace(state);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Storage closed, session sync for tab {} stopped", own_tab);
                        break;
                    }
                }
            }
        })
    }
}
