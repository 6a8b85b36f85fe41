//! The list client: one backend, one lazily established session, normalized records out

use super::catalog::resolve_catalog;
use super::field::FieldDescriptor;
use super::normalize::{Record, normalize_row};
use super::projection::{ProjectionCriteria, project, search};
use super::validate::{ValidationReport, validate};
use crate::api::{
    BackendMode, ConnectionSettings, ListBackend, ListError, ListResult, RawRow, Session,
    create_backend,
};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Row limits applied by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub rows_per_page: usize,
    pub max_export_rows: usize,
    pub search_max_rows: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            rows_per_page: 100,
            max_export_rows: 10_000,
            search_max_rows: 1_000,
        }
    }
}

/// A page of records with the catalog that typed them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPage {
    pub items: Vec<Record>,
    /// Records that passed the filters among those fetched
    pub total: usize,
    pub fields: Vec<FieldDescriptor>,
    pub page: usize,
    pub page_size: usize,
    /// Set when the fetch hit its row limit, so more rows may exist beyond `total`
    pub total_is_estimate: bool,
}

impl ListPage {
    fn empty(criteria: &ProjectionCriteria) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            fields: Vec::new(),
            page: criteria.page(),
            page_size: criteria.page_size(),
            total_is_estimate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub items: Vec<Record>,
    pub total: usize,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

/// One item of a bulk batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    pub action: MutationAction,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl MutationRequest {
    pub fn create(data: Map<String, Value>) -> Self {
        Self {
            action: MutationAction::Create,
            id: None,
            data: Some(data),
        }
    }

    pub fn update(id: i64, data: Map<String, Value>) -> Self {
        Self {
            action: MutationAction::Update,
            id: Some(id),
            data: Some(data),
        }
    }

    pub fn delete(id: i64) -> Self {
        Self {
            action: MutationAction::Delete,
            id: Some(id),
            data: None,
        }
    }

    /// Updates and deletes need an id; creates and updates need data
    pub fn check(&self) -> Result<(), String> {
        let needs_id = matches!(self.action, MutationAction::Update | MutationAction::Delete);
        let needs_data = matches!(self.action, MutationAction::Create | MutationAction::Update);
        if needs_id && self.id.is_none() {
            return Err("id is required".to_string());
        }
        if needs_data && self.data.is_none() {
            return Err("data is required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkError {
    pub id: Option<i64>,
    pub action: MutationAction,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkResult {
    pub success: bool,
    pub errors: Vec<BulkError>,
}

impl BulkResult {
    /// `PartialBatchFailure` when any of `total` items failed
    pub fn failure(&self, total: usize) -> Option<ListError> {
        (!self.errors.is_empty()).then(|| ListError::PartialBatchFailure {
            failed: self.errors.len(),
            total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientInfo {
    pub mode: BackendMode,
    pub site_url: String,
    pub list_name: String,
    pub authenticated: bool,
}

/// Entry point for every list operation.
///
/// The backend is chosen once from the site URL. Authentication happens on first use and
/// the session is kept for the lifetime of the client; a failed attempt is retried by the
/// next operation.
///
/// Each operation comes in two forms: `try_*` returns the typed error, the plain form logs
/// it and returns an empty default.
pub struct ListClient {
    backend: Box<dyn ListBackend>,
    session: Option<Session>,
    options: ClientOptions,
    site_url: String,
    list_name: String,
}

impl ListClient {
    pub fn new(settings: ConnectionSettings, options: ClientOptions) -> ListResult<Self> {
        let site_url = settings.site_url.clone();
        let list_name = settings.list_name.clone();
        let backend = create_backend(settings)?;
        info!("Using {} backend for {}", backend.mode(), site_url);
        Ok(Self::with_backend(backend, options, site_url, list_name))
    }

    pub fn with_backend(
        backend: Box<dyn ListBackend>,
        options: ClientOptions,
        site_url: impl Into<String>,
        list_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            session: None,
            options,
            site_url: site_url.into(),
            list_name: list_name.into(),
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.backend.mode()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn describe(&self) -> ClientInfo {
        ClientInfo {
            mode: self.mode(),
            site_url: self.site_url.clone(),
            list_name: self.list_name.clone(),
            authenticated: self.is_authenticated(),
        }
    }

    pub async fn try_authenticate(&mut self) -> ListResult<()> {
        self.session().await.map(|_| ())
    }

    pub async fn authenticate(&mut self) -> bool {
        self.try_authenticate().await.is_ok()
    }

    async fn session(&mut self) -> ListResult<Session> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        debug!("No session yet; authenticating");
        let session = self.backend.authenticate().await?;
        self.session = Some(session.clone());
        Ok(session)
    }

    fn normalize(&self, rows: &[RawRow], catalog: &[FieldDescriptor]) -> Vec<Record> {
        let columns = self.backend.row_columns();
        rows.iter()
            .map(|row| normalize_row(row, catalog, columns))
            .collect()
    }

    /// Catalog plus normalized records for the first `max_rows` rows
    async fn fetch_records(
        &mut self,
        max_rows: usize,
    ) -> ListResult<(Vec<Record>, Vec<FieldDescriptor>, usize)> {
        let session = self.session().await?;
        let catalog = resolve_catalog(self.backend.as_ref(), &session).await?;
        let rows = self.backend.fetch_raw_list(&session, max_rows).await?;
        debug!("Fetched {} rows (limit {})", rows.len(), max_rows);
        Ok((self.normalize(&rows, &catalog), catalog, rows.len()))
    }

    pub async fn try_fetch_page(&mut self, criteria: &ProjectionCriteria) -> ListResult<ListPage> {
        let needed = criteria.rows_needed();
        let (records, fields, fetched) = self.fetch_records(needed).await?;
        let projection = project(records, criteria);

        Ok(ListPage {
            items: projection.items,
            total: projection.total,
            fields,
            page: criteria.page(),
            page_size: criteria.page_size(),
            total_is_estimate: fetched >= needed,
        })
    }

    pub async fn fetch_page(&mut self, criteria: &ProjectionCriteria) -> ListPage {
        match self.try_fetch_page(criteria).await {
            Ok(page) => page,
            Err(e) => {
                error!("Failed to fetch list items: {}", e);
                ListPage::empty(criteria)
            }
        }
    }

    pub async fn try_fetch_catalog(&mut self) -> ListResult<Vec<FieldDescriptor>> {
        let session = self.session().await?;
        resolve_catalog(self.backend.as_ref(), &session).await
    }

    pub async fn fetch_catalog(&mut self) -> Vec<FieldDescriptor> {
        self.try_fetch_catalog().await.unwrap_or_else(|e| {
            error!("Failed to fetch list fields: {}", e);
            Vec::new()
        })
    }

    pub async fn try_create(&mut self, data: &Map<String, Value>) -> ListResult<i64> {
        let session = self.session().await?;
        let id = self.backend.create_row(&session, data).await?;
        info!("Created item {}", id);
        Ok(id)
    }

    pub async fn create(&mut self, data: &Map<String, Value>) -> Option<i64> {
        self.try_create(data)
            .await
            .map_err(|e| error!("Failed to create item: {}", e))
            .ok()
    }

    pub async fn try_update(&mut self, id: i64, data: &Map<String, Value>) -> ListResult<()> {
        let session = self.session().await?;
        self.backend.update_row(&session, id, data).await?;
        info!("Updated item {}", id);
        Ok(())
    }

    pub async fn update(&mut self, id: i64, data: &Map<String, Value>) -> bool {
        self.try_update(id, data)
            .await
            .map_err(|e| error!("Failed to update item {}: {}", id, e))
            .is_ok()
    }

    pub async fn try_delete(&mut self, id: i64) -> ListResult<()> {
        let session = self.session().await?;
        self.backend.delete_row(&session, id).await?;
        info!("Deleted item {}", id);
        Ok(())
    }

    pub async fn delete(&mut self, id: i64) -> bool {
        self.try_delete(id)
            .await
            .map_err(|e| error!("Failed to delete item {}: {}", id, e))
            .is_ok()
    }

    async fn apply(&mut self, request: &MutationRequest) -> Result<(), String> {
        request.check()?;
        let empty = Map::new();
        let data = request.data.as_ref().unwrap_or(&empty);
        let id = request.id.unwrap_or_default();

        let result = match request.action {
            MutationAction::Create => self.try_create(data).await.map(|_| ()),
            MutationAction::Update => self.try_update(id, data).await,
            MutationAction::Delete => self.try_delete(id).await,
        };
        result.map_err(|e| e.to_string())
    }

    /// Apply each request in order; failures are collected and never stop the batch
    pub async fn bulk_apply(&mut self, requests: &[MutationRequest]) -> BulkResult {
        let mut errors = Vec::new();

        for request in requests {
            if let Err(error) = self.apply(request).await {
                warn!(
                    "Bulk {:?} for item {:?} failed: {}",
                    request.action, request.id, error
                );
                errors.push(BulkError {
                    id: request.id,
                    action: request.action,
                    error,
                });
            }
        }

        info!(
            "Bulk batch finished: {} of {} succeeded",
            requests.len() - errors.len(),
            requests.len()
        );
        BulkResult {
            success: errors.is_empty(),
            errors,
        }
    }

    /// Every record up to the export limit, unpaginated
    pub async fn try_export_all(&mut self) -> ListResult<Vec<Record>> {
        let (records, _, fetched) = self.fetch_records(self.options.max_export_rows).await?;
        if fetched >= self.options.max_export_rows {
            warn!(
                "Export stopped at the {} row limit; the list may hold more",
                self.options.max_export_rows
            );
        }
        Ok(records)
    }

    pub async fn export_all(&mut self) -> Vec<Record> {
        self.try_export_all().await.unwrap_or_else(|e| {
            error!("Failed to export list: {}", e);
            Vec::new()
        })
    }

    /// Substring scan over the first `search_max_rows` records
    pub async fn try_search(&mut self, term: &str) -> ListResult<SearchResult> {
        let (records, fields, _) = self.fetch_records(self.options.search_max_rows).await?;
        let items = search(records, term);
        Ok(SearchResult {
            total: items.len(),
            items,
            fields,
        })
    }

    pub async fn search(&mut self, term: &str) -> SearchResult {
        self.try_search(term).await.unwrap_or_else(|e| {
            error!("Search failed: {}", e);
            SearchResult {
                items: Vec::new(),
                total: 0,
                fields: Vec::new(),
            }
        })
    }

    /// Check a field map against the current catalog
    pub async fn validate(&mut self, data: &Map<String, Value>) -> ListResult<ValidationReport> {
        let catalog = self.try_fetch_catalog().await?;
        Ok(validate(data, &catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ListBackend, RawField, RowColumns};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory classic-style backend
    struct FakeBackend {
        rows: Mutex<Vec<RawRow>>,
        auth_calls: Arc<AtomicUsize>,
        fail_auth: bool,
    }

    impl FakeBackend {
        fn new(rows: Vec<Value>) -> Self {
            Self {
                rows: Mutex::new(rows.into_iter().map(|r| r.as_object().cloned().unwrap()).collect()),
                auth_calls: Arc::new(AtomicUsize::new(0)),
                fail_auth: false,
            }
        }

        fn position(&self, id: i64) -> Option<usize> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .position(|r| r.get("ID") == Some(&json!(id.to_string())))
        }
    }

    #[async_trait]
    impl ListBackend for FakeBackend {
        fn mode(&self) -> BackendMode {
            BackendMode::Classic
        }

        fn row_columns(&self) -> RowColumns {
            RowColumns::AsReturned
        }

        async fn authenticate(&self) -> ListResult<Session> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_auth {
                return Err(ListError::Authentication("bad password".into()));
            }
            Ok(Session::Classic {
                scheme: crate::api::ClassicAuthScheme::Ntlm,
            })
        }

        async fn fetch_raw_list(&self, _: &Session, max_rows: usize) -> ListResult<Vec<RawRow>> {
            Ok(self.rows.lock().unwrap().iter().take(max_rows).cloned().collect())
        }

        async fn fetch_field_metadata(&self, _: &Session) -> ListResult<Option<Vec<RawField>>> {
            Ok(None)
        }

        async fn create_row(&self, _: &Session, data: &Map<String, Value>) -> ListResult<i64> {
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            let mut row = data.clone();
            row.insert("ID".into(), json!(id.to_string()));
            rows.push(row);
            Ok(id)
        }

        async fn update_row(&self, _: &Session, id: i64, data: &Map<String, Value>) -> ListResult<()> {
            let index = self.position(id).ok_or(ListError::NotFound { id })?;
            let mut rows = self.rows.lock().unwrap();
            for (key, value) in data {
                rows[index].insert(key.clone(), value.clone());
            }
            Ok(())
        }

        async fn delete_row(&self, _: &Session, id: i64) -> ListResult<()> {
            let index = self.position(id).ok_or(ListError::NotFound { id })?;
            self.rows.lock().unwrap().remove(index);
            Ok(())
        }
    }

    fn sample_rows() -> Vec<Value> {
        (1..=25)
            .map(|id| {
                let team = if id % 5 == 0 { "Ops" } else { "Dev" };
                json!({
                    "ID": id.to_string(),
                    "Title": format!("Item {}", id),
                    "Created": "2024-03-01T09:15:00Z",
                    "Author": "1;#Site Admin",
                    "Team": team,
                })
            })
            .collect()
    }

    fn client(backend: FakeBackend) -> ListClient {
        ListClient::with_backend(
            Box::new(backend),
            ClientOptions::default(),
            "http://intranet/sites/hr",
            "Tasks",
        )
    }

    #[tokio::test]
    async fn test_fetch_page_normalizes_and_paginates() {
        let mut client = client(FakeBackend::new(sample_rows()));
        let page = client.fetch_page(&ProjectionCriteria::new(2, 10)).await;

        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].id(), Some(11));
        assert_eq!(page.items[0].get("Created"), Some(&json!("2024-03-01 09:15:00")));
        assert_eq!(page.items[0].get("Author"), Some(&json!("Site Admin")));
        assert_eq!(page.total, 20);
        assert!(page.total_is_estimate);
        assert_eq!(page.fields.len(), 7);
    }

    #[tokio::test]
    async fn test_filtered_total_and_estimate_flag() {
        let mut client = client(FakeBackend::new(sample_rows()));
        let criteria = ProjectionCriteria::new(1, 50).with_filter("Team", "ops");
        let page = client.fetch_page(&criteria).await;

        assert_eq!(page.total, 5);
        assert!(!page.total_is_estimate);
    }

    #[tokio::test]
    async fn test_session_is_established_once() {
        let backend = FakeBackend::new(sample_rows());
        let calls = backend.auth_calls.clone();
        let mut client = client(backend);

        client.fetch_catalog().await;
        client.fetch_page(&ProjectionCriteria::default()).await;
        assert!(client.is_authenticated());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_authentication_yields_defaults_and_is_retried() {
        let mut backend = FakeBackend::new(sample_rows());
        backend.fail_auth = true;
        let calls = backend.auth_calls.clone();
        let mut client = client(backend);

        assert!(client.fetch_catalog().await.is_empty());
        assert!(client.fetch_page(&ProjectionCriteria::default()).await.items.is_empty());
        assert!(!client.update(1, &Map::new()).await);
        assert_eq!(client.create(&Map::new()).await, None);
        assert!(!client.is_authenticated());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_bulk_collects_failures_and_continues() {
        let mut client = client(FakeBackend::new(sample_rows()));
        let title = |t: &str| json!({"Title": t}).as_object().cloned().unwrap();

        let result = client
            .bulk_apply(&[
                MutationRequest::update(5, title("X")),
                MutationRequest::update(999, title("Y")),
            ])
            .await;

        assert!(!result.success);
        assert_eq!(
            serde_json::to_value(&result.errors).unwrap(),
            json!([{"id": 999, "action": "update", "error": "item 999 not found"}])
        );
        assert_eq!(
            result.failure(2),
            Some(ListError::PartialBatchFailure { failed: 1, total: 2 })
        );

        let page = client.fetch_page(&ProjectionCriteria::new(1, 100)).await;
        let item5 = page.items.iter().find(|r| r.id() == Some(5)).unwrap();
        assert_eq!(item5.get("Title"), Some(&json!("X")));
    }

    #[tokio::test]
    async fn test_bulk_rejects_malformed_requests_without_dispatch() {
        let mut client = client(FakeBackend::new(sample_rows()));
        let requests: Vec<MutationRequest> = serde_json::from_value(json!([
            {"action": "delete"},
            {"action": "create"},
            {"action": "create", "data": {"Title": "New"}}
        ]))
        .unwrap();

        let result = client.bulk_apply(&requests).await;
        let messages: Vec<_> = result.errors.iter().map(|e| e.error.as_str()).collect();
        assert_eq!(messages, vec!["id is required", "data is required"]);
        assert_eq!(client.export_all().await.len(), 26);
    }

    #[tokio::test]
    async fn test_search_and_validate() {
        let mut client = client(FakeBackend::new(sample_rows()));
        let result = client.search("item 2").await;
        // Item 2 and Item 20..25
        assert_eq!(result.total, 7);

        let report = client.validate(&Map::new()).await.unwrap();
        assert_eq!(report.errors, vec!["Title is required"]);
    }

    #[tokio::test]
    async fn test_describe() {
        let client = client(FakeBackend::new(Vec::new()));
        assert_eq!(
            serde_json::to_value(client.describe()).unwrap(),
            json!({"mode": "classic", "site_url": "http://intranet/sites/hr", "list_name": "Tasks", "authenticated": false})
        );
    }
}
