//! Session state and its durable storage.
//!
//! This module provides:
//! - `Session`: access/refresh token pair plus the cached user record
//! - `SessionStore`: synchronous key-value persistence with file, OS
//!   keyring and in-memory backends
//!
//! A session is mirrored under three keys (`accessToken`, `refreshToken`,
//! `user`) so a restart picks it up without signing in again.

pub mod session;
pub mod store;

pub use session::{Session, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
pub use store::{FileStore, KeyringStore, MemoryStore, SessionStore};
