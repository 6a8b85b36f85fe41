//! Backend-independent list semantics: field catalogs, value normalization, client-side
//! projection, validation and the [`ListClient`] facade that ties them to a backend.

pub mod catalog;
pub mod client;
pub mod field;
pub mod normalize;
pub mod projection;
pub mod validate;

pub use client::{
    BulkError, BulkResult, ClientInfo, ClientOptions, ListClient, ListPage, MutationAction,
    MutationRequest, SearchResult,
};
pub use field::{FieldDescriptor, FieldType};
pub use normalize::Record;
pub use projection::{Projection, ProjectionCriteria, SortOrder};
pub use validate::ValidationReport;
