//! Data models for BLIXX API payloads.
//!
//! Field names follow the server's snake_case JSON. Everything other than
//! identifiers is optional so partial records (and fields added later on
//! the server) never break decoding.

pub mod movie;
pub mod stream;
pub mod user;

pub use movie::{Movie, MoviePage, MovieUpdate};
pub use stream::{StreamInfo, WatchEntry, WatchHistoryPage, WatchRecorded};
pub use user::{LoginResponse, ProfileUpdate, RefreshResponse, User};
