//! On-premises SharePoint over the `_vti_bin` SOAP web services

use super::auth::{ClassicAuthScheme, ntlm};
use super::backend::{
    BackendMode, ConnectionSettings, ListBackend, RawField, RawRow, RowColumns, Session,
};
use super::client::{Delivery, HttpClient, read_response};
use super::constants::site_endpoint;
use super::constants::soap::{
    ACTION_GET_LIST_ITEMS, ACTION_GET_WEB, ACTION_UPDATE_LIST_ITEMS, CONTENT_TYPE, LISTS_SERVICE,
    WEBS_SERVICE,
};
use super::error::{ListError, ListResult};
use super::soap::{self, BatchCommand};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE as CONTENT_TYPE_HEADER, WWW_AUTHENTICATE};
use serde_json::{Map, Value};

pub struct ClassicBackend {
    settings: ConnectionSettings,
    client: HttpClient,
}

impl ClassicBackend {
    pub fn new(settings: ConnectionSettings) -> ListResult<Self> {
        let client = HttpClient::new(settings.timeout, settings.retry.clone())?;
        Ok(Self { settings, client })
    }

    fn soap_request(
        &self,
        http: &reqwest::Client,
        url: &str,
        action: &str,
        envelope: &str,
    ) -> reqwest::RequestBuilder {
        http.post(url)
            .header(CONTENT_TYPE_HEADER, CONTENT_TYPE)
            .header("SOAPAction", action)
            .body(envelope.to_string())
    }

    /// Send one SOAP call under `scheme`
    async fn send(
        &self,
        scheme: ClassicAuthScheme,
        delivery: Delivery,
        url: &str,
        action: &str,
        envelope: &str,
    ) -> ListResult<reqwest::Response> {
        match scheme {
            ClassicAuthScheme::Basic => {
                let credentials = &self.settings.credentials;
                self.client
                    .send_as(delivery, |http| {
                        self.soap_request(http, url, action, envelope)
                            .basic_auth(&credentials.username, Some(&credentials.password))
                    })
                    .await
            }
            ClassicAuthScheme::Ntlm => self.send_ntlm(delivery, url, action, envelope).await,
        }
    }

    /// Negotiate and authenticate on the same pooled connection
    async fn send_ntlm(
        &self,
        delivery: Delivery,
        url: &str,
        action: &str,
        envelope: &str,
    ) -> ListResult<reqwest::Response> {
        let negotiate = ntlm::negotiate_header();
        let first = self
            .client
            .send_as(delivery, |http| {
                self.soap_request(http, url, action, envelope)
                    .header(AUTHORIZATION, negotiate.as_str())
            })
            .await?;

        if first.status() != StatusCode::UNAUTHORIZED {
            return Ok(first);
        }

        let challenge = ntlm::challenge_from_headers(
            first
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );
        // drain so the connection goes back to the pool for the third message
        let _ = first.bytes().await;

        let challenge = challenge.ok_or_else(|| {
            ListError::Authentication("server did not answer with an NTLM challenge".to_string())
        })?;
        let authenticate = ntlm::authenticate_header(&self.settings.credentials, &challenge);

        self.client
            .send_as(delivery, |http| {
                self.soap_request(http, url, action, envelope)
                    .header(AUTHORIZATION, authenticate.as_str())
            })
            .await
    }

    /// Run a SOAP call and return the body of a successful response
    async fn call(
        &self,
        scheme: ClassicAuthScheme,
        delivery: Delivery,
        service: &str,
        action: &str,
        envelope: String,
    ) -> ListResult<String> {
        let url = site_endpoint(&self.settings.site_url, service);
        debug!("SOAP {} -> {}", action, url);

        let response = self.send(scheme, delivery, &url, action, &envelope).await?;
        let (status, body) = read_response(response).await?;
        if (200..300).contains(&status) {
            return Ok(body);
        }

        let message = soap::parse_fault(&body).unwrap_or_else(|| format!("HTTP {}", status));
        Err(ListError::from_status(status, None, message))
    }

    /// `GetWeb` against the site under one scheme; returns the site title
    async fn probe(&self, scheme: ClassicAuthScheme) -> ListResult<String> {
        let body = self
            .call(
                scheme,
                Delivery::Retried,
                WEBS_SERVICE,
                ACTION_GET_WEB,
                soap::get_web(&self.settings.site_url),
            )
            .await?;
        Ok(soap::parse_web_title(&body)?.unwrap_or_else(|| "Unknown".to_string()))
    }

    fn scheme(session: &Session) -> ListResult<ClassicAuthScheme> {
        match session {
            Session::Classic { scheme } => Ok(*scheme),
            Session::Cloud { .. } => Err(ListError::NotAuthenticated),
        }
    }

    async fn update_list_items(
        &self,
        session: &Session,
        command: BatchCommand,
        id: Option<i64>,
        data: &Map<String, Value>,
    ) -> ListResult<Option<RawRow>> {
        let scheme = Self::scheme(session)?;
        let envelope = soap::update_list_items(&self.settings.list_name, command, id, data);
        let delivery = match command {
            BatchCommand::New => Delivery::AtMostOnce,
            BatchCommand::Update | BatchCommand::Delete => Delivery::Retried,
        };
        let body = self
            .call(scheme, delivery, LISTS_SERVICE, ACTION_UPDATE_LIST_ITEMS, envelope)
            .await?;
        soap::parse_update_result(&body, id)
    }
}

#[async_trait]
impl ListBackend for ClassicBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Classic
    }

    fn row_columns(&self) -> RowColumns {
        RowColumns::AsReturned
    }

    async fn authenticate(&self) -> ListResult<Session> {
        let mut failures = Vec::new();

        for scheme in ClassicAuthScheme::ORDER {
            match self.probe(scheme).await {
                Ok(title) => {
                    info!(
                        "Connected to on-premises site '{}' using {} authentication",
                        title, scheme
                    );
                    return Ok(Session::Classic { scheme });
                }
                Err(e) => {
                    warn!(
                        "{} authentication against {} failed: {}",
                        scheme, self.settings.site_url, e
                    );
                    failures.push(format!("{}: {}", scheme, e));
                }
            }
        }

        error!(
            "All on-premises authentication schemes failed for {}",
            self.settings.site_url
        );
        Err(ListError::Authentication(failures.join("; ")))
    }

    async fn fetch_raw_list(&self, session: &Session, max_rows: usize) -> ListResult<Vec<RawRow>> {
        let scheme = Self::scheme(session)?;
        let envelope = soap::get_list_items(&self.settings.list_name, max_rows);
        let body = self
            .call(scheme, Delivery::Retried, LISTS_SERVICE, ACTION_GET_LIST_ITEMS, envelope)
            .await?;

        let mut rows = soap::parse_rows(&body)?;
        rows.truncate(max_rows);
        debug!("GetListItems returned {} rows", rows.len());
        Ok(rows)
    }

    async fn fetch_field_metadata(&self, _session: &Session) -> ListResult<Option<Vec<RawField>>> {
        Ok(None)
    }

    async fn create_row(&self, session: &Session, data: &Map<String, Value>) -> ListResult<i64> {
        let row = self
            .update_list_items(session, BatchCommand::New, None, data)
            .await?
            .ok_or_else(|| ListError::Protocol("new item was not returned".to_string()))?;

        row.get("ID")
            .and_then(Value::as_str)
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| ListError::Protocol("new item has no ID".to_string()))
    }

    async fn update_row(&self, session: &Session, id: i64, data: &Map<String, Value>) -> ListResult<()> {
        self.update_list_items(session, BatchCommand::Update, Some(id), data)
            .await
            .map(|_| ())
    }

    async fn delete_row(&self, session: &Session, id: i64) -> ListResult<()> {
        self.update_list_items(session, BatchCommand::Delete, Some(id), &Map::new())
            .await
            .map(|_| ())
    }
}
