//! Services module
//!
//! Business logic that coordinates between the API facade and the
//! repositories.

pub mod api;
pub mod auth;
pub mod checkout;
pub mod stats;

pub use api::Api;
pub use auth::{AuthService, Landing, RegisterRequest, SessionState, SessionUser};
pub use checkout::{CheckoutRequest, CheckoutService};
pub use stats::DashboardStats;
