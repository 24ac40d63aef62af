//! Café core library
//!
//! Local JSON collections, their repositories, the mock API facade and
//! session handling behind the café ordering and reservation pages.

pub mod app;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;
pub mod validation;
