//! Core library for the BLIXX movie streaming client.
//!
//! - `api`: session-aware HTTP client, endpoint wrappers and uploads
//! - `auth`: session record and durable session storage
//! - `models`: payload types returned by the BLIXX API
//! - `playback`: periodic watch-progress reporting
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod playback;

pub use api::{ApiClient, ApiError};
pub use auth::{Session, SessionStore};
pub use config::Config;
