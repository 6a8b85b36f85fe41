use crate::api::constants::{DEFAULT_CLOUD_DOMAIN, DEFAULT_STS_URL};
use crate::api::{ConnectionSettings, Credentials, RetryConfig};
use crate::list::ClientOptions;
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SITE_URL: &str = "SHAREPOINT_URL";
pub const ENV_USERNAME: &str = "SHAREPOINT_USERNAME";
pub const ENV_PASSWORD: &str = "SHAREPOINT_PASSWORD";
pub const ENV_LIST_NAME: &str = "SHAREPOINT_LIST_NAME";
pub const ENV_ROWS_PER_PAGE: &str = "ROWS_PER_PAGE";
pub const ENV_MAX_EXPORT_ROWS: &str = "MAX_EXPORT_ROWS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site_url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub list_name: String,
    pub rows_per_page: usize,
    pub max_export_rows: usize,
    pub search_max_rows: usize,
    pub cloud_domain: String,
    pub sts_url: String,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        let options = ClientOptions::default();
        Self {
            site_url: String::new(),
            username: String::new(),
            password: String::new(),
            list_name: String::new(),
            rows_per_page: options.rows_per_page,
            max_export_rows: options.max_export_rows,
            search_max_rows: options.search_max_rows,
            cloud_domain: DEFAULT_CLOUD_DOMAIN.to_string(),
            sts_url: DEFAULT_STS_URL.to_string(),
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// `<config dir>/sharepoint-cli/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to get config directory")?;
        Ok(config_dir.join("sharepoint-cli").join("config.toml"))
    }

    /// Defaults, then the TOML file, then process environment variables.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    debug!("No config file at {:?}, using defaults", default_path);
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from: {:?}", path);
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Override fields from variables resolved by `lookup`; unset or empty variables are skipped
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = var(ENV_SITE_URL) {
            self.site_url = value;
        }
        if let Some(value) = var(ENV_USERNAME) {
            self.username = value;
        }
        if let Some(value) = var(ENV_PASSWORD) {
            self.password = value;
        }
        if let Some(value) = var(ENV_LIST_NAME) {
            self.list_name = value;
        }
        if let Some(value) = var(ENV_ROWS_PER_PAGE) {
            self.rows_per_page = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got '{}'", ENV_ROWS_PER_PAGE, value))?;
        }
        if let Some(value) = var(ENV_MAX_EXPORT_ROWS) {
            self.max_export_rows = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got '{}'", ENV_MAX_EXPORT_ROWS, value))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.site_url.trim().is_empty() {
            anyhow::bail!("Site URL is not configured (set {} or site_url)", ENV_SITE_URL);
        }
        let url = reqwest::Url::parse(&self.site_url)
            .with_context(|| format!("Invalid site URL: {}", self.site_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Site URL must use http or https: {}", self.site_url);
        }
        if self.list_name.trim().is_empty() {
            anyhow::bail!("List name is not configured (set {} or list_name)", ENV_LIST_NAME);
        }
        if self.rows_per_page == 0 {
            anyhow::bail!("rows_per_page must be greater than zero");
        }
        if self.max_export_rows == 0 {
            anyhow::bail!("max_export_rows must be greater than zero");
        }
        Ok(())
    }

    pub fn to_connection_settings(&self) -> ConnectionSettings {
        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        let mut settings = ConnectionSettings::new(self.site_url.clone(), credentials, self.list_name.clone());
        settings.cloud_domain = self.cloud_domain.clone();
        settings.sts_url = self.sts_url.clone();
        settings.timeout = Duration::from_secs(self.request_timeout_secs);
        settings.retry = self.retry.clone();
        settings
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            rows_per_page: self.rows_per_page,
            max_export_rows: self.max_export_rows,
            search_max_rows: self.search_max_rows.max(1),
        }
    }
}
