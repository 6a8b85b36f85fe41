//! Transport hardening for SharePoint requests

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, RetryableError};
