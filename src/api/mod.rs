pub mod client;
pub mod error;

pub use client::{ApiClient, Credential, TaskApi};
pub use error::ApiError;
