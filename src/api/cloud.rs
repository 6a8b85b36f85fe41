//! SharePoint Online over the `_api` REST endpoints

use super::auth::saml;
use super::backend::{
    BackendMode, ConnectionSettings, ListBackend, RawField, RawRow, RowColumns, Session,
};
use super::client::{Delivery, HttpClient, read_response};
use super::constants::rest::{
    ACCEPT_JSON, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, CONTENT_TYPE_SOAP12, CONTEXT_INFO,
    FIELD_VALUES_AS_TEXT, HEADER_DIGEST, HEADER_HTTP_METHOD, HEADER_IF_MATCH, IF_MATCH_ANY,
    REFERENCE_ID_SUFFIX, SIGN_IN,
};
use super::constants::{
    list_fields_endpoint, list_get_items_endpoint, list_item_endpoint, list_items_endpoint,
    site_endpoint,
};
use super::error::{ListError, ListResult};
use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// `{"value": [...]}` collection wrapper of `odata=nometadata` responses
#[derive(Debug, Deserialize)]
struct Collection<T> {
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ContextInfo {
    #[serde(rename = "FormDigestValue")]
    form_digest_value: String,
}

pub struct CloudBackend {
    settings: ConnectionSettings,
    client: HttpClient,
}

impl CloudBackend {
    pub fn new(settings: ConnectionSettings) -> ListResult<Self> {
        let client = HttpClient::new(settings.timeout, settings.retry.clone())?;
        Ok(Self { settings, client })
    }

    fn digest(session: &Session) -> ListResult<&str> {
        match session {
            Session::Cloud { form_digest } => Ok(form_digest),
            Session::Classic { .. } => Err(ListError::NotAuthenticated),
        }
    }

    /// Trade the credentials for a security token at the STS
    async fn request_token(&self) -> ListResult<String> {
        let envelope = saml::token_request(
            &self.settings.credentials,
            &self.settings.sts_url,
            &self.settings.site_url,
        );
        let response = self
            .client
            .send(|http| {
                http.post(&self.settings.sts_url)
                    .header(CONTENT_TYPE, CONTENT_TYPE_SOAP12)
                    .body(envelope.clone())
            })
            .await?;
        let (_, body) = read_response(response).await?;
        saml::parse_token_response(&body)
    }

    /// Post the token to the site's sign-in form; the session cookies land in the client jar
    async fn sign_in(&self, token: &str) -> ListResult<()> {
        let url = Url::parse(&self.settings.site_url)
            .and_then(|site| site.join(SIGN_IN))
            .map_err(|e| ListError::Authentication(format!("invalid site URL: {}", e)))?;

        let response = self
            .client
            .send(|http| {
                http.post(url.clone())
                    .header(CONTENT_TYPE, CONTENT_TYPE_FORM)
                    .body(token.to_string())
            })
            .await?;
        let (status, body) = read_response(response).await?;
        check_status(status, &body, None).map(|_| ())
    }

    async fn form_digest(&self) -> ListResult<String> {
        let url = site_endpoint(&self.settings.site_url, CONTEXT_INFO);
        let response = self
            .client
            .send(|http| http.post(&url).header(ACCEPT, ACCEPT_JSON).body(""))
            .await?;
        let info: ContextInfo = read_json(response, None).await?;
        Ok(info.form_digest_value)
    }

    /// POST with the digest and an optional JSON body and method override
    async fn write(
        &self,
        session: &Session,
        url: &str,
        method_override: Option<&str>,
        body: Option<&Map<String, Value>>,
        id: Option<i64>,
        delivery: Delivery,
    ) -> ListResult<String> {
        let digest = Self::digest(session)?;
        let payload = match body {
            Some(data) => serde_json::to_string(data)?,
            None => String::new(),
        };

        let response = self
            .client
            .send_as(delivery, |http| {
                let mut request = http
                    .post(url)
                    .header(ACCEPT, ACCEPT_JSON)
                    .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                    .header(HEADER_DIGEST, digest)
                    .body(payload.clone());
                if let Some(method) = method_override {
                    request = request
                        .header(HEADER_HTTP_METHOD, method)
                        .header(HEADER_IF_MATCH, IF_MATCH_ANY);
                }
                request
            })
            .await?;

        let (status, text) = read_response(response).await?;
        check_status(status, &text, id)?;
        Ok(text)
    }
}

#[async_trait]
impl ListBackend for CloudBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Cloud
    }

    fn row_columns(&self) -> RowColumns {
        RowColumns::Catalog
    }

    async fn authenticate(&self) -> ListResult<Session> {
        let result = async {
            let token = self.request_token().await?;
            self.sign_in(&token).await?;
            self.form_digest().await
        }
        .await;

        match result {
            Ok(form_digest) => {
                info!("Authenticated with SharePoint Online at {}", self.settings.site_url);
                Ok(Session::Cloud { form_digest })
            }
            Err(e) => {
                error!("SharePoint Online authentication failed: {}", e);
                Err(match e {
                    ListError::BackendUnavailable(_) | ListError::Authentication(_) => e,
                    other => ListError::Authentication(other.to_string()),
                })
            }
        }
    }

    async fn fetch_raw_list(&self, session: &Session, max_rows: usize) -> ListResult<Vec<RawRow>> {
        let url = format!(
            "{}?$expand={}",
            list_get_items_endpoint(&self.settings.site_url, &self.settings.list_name),
            FIELD_VALUES_AS_TEXT
        );
        let mut query = Map::new();
        query.insert(
            "query".to_string(),
            json!({
                "ViewXml": format!("<View><Query></Query><RowLimit>{}</RowLimit></View>", max_rows.max(1))
            }),
        );

        let body = self
            .write(session, &url, None, Some(&query), None, Delivery::Retried)
            .await?;
        let rows: Collection<RawRow> = serde_json::from_str(&body)?;
        debug!("GetItems returned {} rows", rows.value.len());
        Ok(rows.value.into_iter().map(fill_reference_columns).collect())
    }

    async fn fetch_field_metadata(&self, session: &Session) -> ListResult<Option<Vec<RawField>>> {
        Self::digest(session)?;
        let url = list_fields_endpoint(&self.settings.site_url, &self.settings.list_name);
        let response = self
            .client
            .send(|http| http.get(&url).header(ACCEPT, ACCEPT_JSON))
            .await?;
        let fields: Collection<RawField> = read_json(response, None).await?;
        Ok(Some(fields.value))
    }

    async fn create_row(&self, session: &Session, data: &Map<String, Value>) -> ListResult<i64> {
        let url = list_items_endpoint(&self.settings.site_url, &self.settings.list_name);
        let body = self
            .write(session, &url, None, Some(data), None, Delivery::AtMostOnce)
            .await?;
        let created: Value = serde_json::from_str(&body)?;

        ["Id", "ID"]
            .iter()
            .find_map(|key| created.get(*key).and_then(Value::as_i64))
            .ok_or_else(|| ListError::Protocol("created item has no Id".to_string()))
    }

    async fn update_row(&self, session: &Session, id: i64, data: &Map<String, Value>) -> ListResult<()> {
        let url = list_item_endpoint(&self.settings.site_url, &self.settings.list_name, id);
        self.write(session, &url, Some("MERGE"), Some(data), Some(id), Delivery::Retried)
            .await
            .map(|_| ())
    }

    async fn delete_row(&self, session: &Session, id: i64) -> ListResult<()> {
        let url = list_item_endpoint(&self.settings.site_url, &self.settings.list_name, id);
        self.write(session, &url, Some("DELETE"), None, Some(id), Delivery::Retried)
            .await
            .map(|_| ())
    }
}

/// Give each unexpanded reference column (`OwnerId` without `Owner`) a value under its own
/// name: the item's display text when present, otherwise the raw ID.
fn fill_reference_columns(mut row: RawRow) -> RawRow {
    let texts = match row.remove(FIELD_VALUES_AS_TEXT) {
        Some(Value::Object(texts)) => texts,
        _ => Map::new(),
    };

    let missing: Vec<(String, Value)> = row
        .iter()
        .filter_map(|(key, id)| {
            let name = key.strip_suffix(REFERENCE_ID_SUFFIX)?;
            (!name.is_empty() && !row.contains_key(name)).then(|| (name.to_string(), id.clone()))
        })
        .collect();

    for (name, id) in missing {
        let value = match texts.get(&name) {
            Some(Value::String(text)) => Value::String(text.clone()),
            _ => id,
        };
        row.insert(name, value);
    }
    row
}

/// Map a non-2xx REST response to a typed error, using the OData error text when present
fn check_status(status: u16, body: &str, id: Option<i64>) -> ListResult<()> {
    if (200..400).contains(&status) {
        return Ok(());
    }
    let message = odata_error_message(body).unwrap_or_else(|| format!("HTTP {}", status));
    Err(ListError::from_status(status, id, message))
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response, id: Option<i64>) -> ListResult<T> {
    let (status, body) = read_response(response).await?;
    check_status(status, &body, id)?;
    Ok(serde_json::from_str(&body)?)
}

/// `odata.error.message.value` (nometadata) or `error.message.value` (verbose)
fn odata_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("odata.error").or_else(|| value.get("error"))?;
    error
        .pointer("/message/value")
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_reference_columns_take_display_text() {
        let filled = fill_reference_columns(row(json!({
            "Id": 1,
            "Title": "Renew",
            "OwnerId": 7,
            "OwnerStringId": "7",
            "ReviewersId": [7, 9],
            "FieldValuesAsText": {"Title": "Renew", "Owner": "Jane Doe", "Reviewers": "Jane Doe; Bob Smith"}
        })));

        assert_eq!(filled.get("Owner"), Some(&json!("Jane Doe")));
        assert_eq!(filled.get("Reviewers"), Some(&json!("Jane Doe; Bob Smith")));
        assert_eq!(filled.get("Title"), Some(&json!("Renew")));
        assert!(!filled.contains_key("FieldValuesAsText"));
        assert!(!filled.contains_key(""));
    }

    #[test]
    fn test_reference_columns_fall_back_to_id() {
        let filled = fill_reference_columns(row(json!({"Id": 1, "OwnerId": 7, "EditorId": null})));
        assert_eq!(filled.get("Owner"), Some(&json!(7)));
        assert_eq!(filled.get("Editor"), Some(&Value::Null));
    }

    #[test]
    fn test_expanded_reference_columns_are_kept() {
        let filled = fill_reference_columns(row(json!({
            "Id": 1,
            "Owner": {"Title": "Jane Doe"},
            "OwnerId": 7,
            "FieldValuesAsText": {"Owner": "Someone Else"}
        })));
        assert_eq!(filled.get("Owner"), Some(&json!({"Title": "Jane Doe"})));
    }

    #[test]
    fn test_odata_error_message_shapes() {
        let nometadata = r#"{"odata.error":{"code":"-2130575338, Microsoft.SharePoint.SPException","message":{"lang":"en-US","value":"Item does not exist."}}}"#;
        assert_eq!(odata_error_message(nometadata).as_deref(), Some("Item does not exist."));

        let verbose = r#"{"error":{"code":"-1","message":{"lang":"en-US","value":"List 'X' does not exist."}}}"#;
        assert_eq!(odata_error_message(verbose).as_deref(), Some("List 'X' does not exist."));

        assert_eq!(odata_error_message("<html/>"), None);
    }

    #[test]
    fn test_check_status_maps_missing_item() {
        let body = r#"{"odata.error":{"message":{"value":"Item does not exist."}}}"#;
        assert_eq!(check_status(404, body, Some(12)), Err(ListError::NotFound { id: 12 }));
        assert!(check_status(204, "", Some(12)).is_ok());
        assert!(matches!(
            check_status(403, body, None),
            Err(ListError::Authentication(message)) if message == "Item does not exist."
        ));
    }
}
