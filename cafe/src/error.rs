//! Error types for the café core
//!
//! All errors use thiserror for structured error handling.
//! They serialize to their display string so page controllers can show
//! them directly as notifications.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0} is out of stock")]
    OutOfStock(String),

    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: u32,
        available: u32,
    },

    #[error("An account with email {0} already exists")]
    DuplicateEmail(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Access denied: {0} role required")]
    Forbidden(&'static str),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("No tables available for {date} at {time}")]
    FullyBooked { date: String, time: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
