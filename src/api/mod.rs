//! SharePoint list access over both protocols
//!
//! On-premises farms are reached through the classic SOAP web services with NTLM or basic
//! authentication; SharePoint Online through the REST API with a SAML sign-in. Both sit
//! behind [`ListBackend`], chosen once from the site URL by [`create_backend`].

pub mod auth;
pub mod backend;
pub mod classic;
pub mod client;
pub mod cloud;
pub mod constants;
pub mod error;
pub mod resilience;
pub mod soap;

pub use auth::{ClassicAuthScheme, Credentials};
pub use backend::{
    BackendMode, ConnectionSettings, ListBackend, RawField, RawRow, RowColumns, Session,
    create_backend,
};
pub use classic::ClassicBackend;
pub use cloud::CloudBackend;
pub use error::{ListError, ListResult};
pub use resilience::{RetryConfig, RetryPolicy, RetryableError};
