//! Backend REST API: client, payloads and errors

mod client;
mod error;
pub mod types;

pub use client::{ApiClient, DEFAULT_TIMEOUT};
pub use error::ApiError;
pub use types::*;
