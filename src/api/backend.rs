//! The contract both SharePoint protocols are hidden behind

use super::auth::{ClassicAuthScheme, Credentials};
use super::classic::ClassicBackend;
use super::cloud::CloudBackend;
use super::constants::{DEFAULT_CLOUD_DOMAIN, DEFAULT_STS_URL};
use super::error::ListResult;
use super::resilience::RetryConfig;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// One unnormalized row exactly as the backend returned it
pub type RawRow = Map<String, Value>;

/// Which protocol a site speaks; derived once from its URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Classic,
    Cloud,
}

impl BackendMode {
    /// A site outside the cloud tenant domain is treated as on-premises
    pub fn detect(site_url: &str, cloud_domain: &str) -> Self {
        if site_url.to_lowercase().contains(&cloud_domain.to_lowercase()) {
            BackendMode::Cloud
        } else {
            BackendMode::Classic
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Classic => write!(f, "classic (on-premises SOAP)"),
            BackendMode::Cloud => write!(f, "cloud (SharePoint Online REST)"),
        }
    }
}

/// Which columns of a raw row make it into a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowColumns {
    /// Every column the backend returned
    AsReturned,
    /// Only columns present in the field catalog
    Catalog,
}

/// Everything an adapter needs to reach one list
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub site_url: String,
    pub credentials: Credentials,
    pub list_name: String,
    pub cloud_domain: String,
    pub sts_url: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl ConnectionSettings {
    pub fn new(site_url: impl Into<String>, credentials: Credentials, list_name: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            credentials,
            list_name: list_name.into(),
            cloud_domain: DEFAULT_CLOUD_DOMAIN.to_string(),
            sts_url: DEFAULT_STS_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    pub fn mode(&self) -> BackendMode {
        BackendMode::detect(&self.site_url, &self.cloud_domain)
    }
}

/// Field definition as reported by a metadata endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawField {
    #[serde(rename = "InternalName")]
    pub internal_name: String,
    #[serde(rename = "Title", default)]
    pub title: String,
    #[serde(rename = "TypeAsString", default)]
    pub type_name: String,
    #[serde(rename = "Required", default)]
    pub required: bool,
    #[serde(rename = "Hidden")]
    pub hidden: Option<bool>,
    #[serde(rename = "ReadOnlyField")]
    pub read_only: Option<bool>,
    #[serde(rename = "Choices", default, deserialize_with = "choice_list")]
    pub choices: Vec<String>,
}

impl RawField {
    /// Missing flags count as set, so only explicitly visible, writable fields survive
    pub fn is_user_visible(&self) -> bool {
        !self.hidden.unwrap_or(true) && !self.read_only.unwrap_or(true)
    }
}

/// `Choices` arrives as a plain array (nometadata) or wrapped in `results` (verbose)
fn choice_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Choices {
        Plain(Vec<String>),
        Verbose { results: Vec<String> },
    }

    Ok(match Option::<Choices>::deserialize(deserializer)? {
        Some(Choices::Plain(choices)) => choices,
        Some(Choices::Verbose { results }) => results,
        None => Vec::new(),
    })
}

/// Authenticated state established by `ListBackend::authenticate`.
///
/// Owned by the caller and handed back on every operation; an adapter rejects a session
/// that belongs to the other protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    /// On-premises site, with the scheme the server accepted
    Classic { scheme: ClassicAuthScheme },
    /// SharePoint Online; cookies live in the adapter's HTTP client, writes carry the digest
    Cloud { form_digest: String },
}

/// Raw CRUD against one concrete SharePoint protocol.
///
/// Implementations report every failure as a `ListError`; nothing panics or escapes
/// the call boundary otherwise.
#[async_trait]
pub trait ListBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    fn row_columns(&self) -> RowColumns;

    async fn authenticate(&self) -> ListResult<Session>;

    /// Up to `max_rows` rows from the start of the list
    async fn fetch_raw_list(&self, session: &Session, max_rows: usize) -> ListResult<Vec<RawRow>>;

    /// Authoritative field metadata, or `None` when the protocol has no metadata endpoint
    async fn fetch_field_metadata(&self, session: &Session) -> ListResult<Option<Vec<RawField>>>;

    async fn create_row(&self, session: &Session, data: &Map<String, Value>) -> ListResult<i64>;

    async fn update_row(&self, session: &Session, id: i64, data: &Map<String, Value>) -> ListResult<()>;

    async fn delete_row(&self, session: &Session, id: i64) -> ListResult<()>;
}

/// Pick the adapter for the site once; it is never switched afterwards
pub fn create_backend(settings: ConnectionSettings) -> ListResult<Box<dyn ListBackend>> {
    Ok(match settings.mode() {
        BackendMode::Classic => Box::new(ClassicBackend::new(settings)?),
        BackendMode::Cloud => Box::new(CloudBackend::new(settings)?),
    })
}
