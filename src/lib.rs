//! Keepsake - secrets client with an encrypted offline fallback
//!
//! Fetches secrets from the API and keeps an encrypted, identity-scoped
//! snapshot on disk that is served when the API cannot be reached.

pub mod audit;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod remote;
pub mod ui;

pub use error::{KeepsakeError, KeepsakeResult};
