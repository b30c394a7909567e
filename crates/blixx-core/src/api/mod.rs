//! REST API client module for the BLIXX streaming service.
//!
//! This module provides the `ApiClient` for calling the BLIXX API: auth,
//! users, movies, uploads, streaming and TMDB lookups.
//!
//! The API uses JWT bearer tokens. Expired access tokens are refreshed
//! transparently using the refresh token issued at login.

pub mod client;
pub mod error;
pub mod transport;
pub mod upload;

pub use client::{ApiClient, DEFAULT_PAGE, DEFAULT_PER_PAGE, DEFAULT_TIME_WINDOW};
pub use error::ApiError;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
pub use upload::{AbortHandle, ProgressFn, Upload, UploadForm};
