//! SharePoint Online adapter against a mock tenant
//!
//! The tenant domain is pointed at the mock server's host so the site URL selects cloud
//! mode, and the token service URL is served by the same mock.

use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};
use sharepoint_cli::api::{
    BackendMode, CloudBackend, ConnectionSettings, Credentials, ListBackend, ListError,
    RetryConfig, Session,
};
use sharepoint_cli::list::{ClientOptions, FieldType, ListClient, ProjectionCriteria, SortOrder};
use std::time::Duration;
use wiremock::matchers::{
    body_string, body_string_contains, header, method, path, path_regex, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIGEST: &str = "0x5A1B,16 Oct 2026 09:00:00 -0000";

const TOKEN_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<S:Envelope xmlns:S="http://www.w3.org/2003/05/soap-envelope" xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" xmlns:wst="http://schemas.xmlsoap.org/ws/2005/02/trust">
<S:Body><wst:RequestSecurityTokenResponse><wst:RequestedSecurityToken>
<wsse:BinarySecurityToken Id="Compact0">t=EwBgAk6hB&amp;p=</wsse:BinarySecurityToken>
</wst:RequestedSecurityToken></wst:RequestSecurityTokenResponse></S:Body></S:Envelope>"#;

const TOKEN_FAULT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<S:Envelope xmlns:S="http://www.w3.org/2003/05/soap-envelope" xmlns:psf="http://schemas.microsoft.com/Passport/SoapServices/SOAPFault">
<S:Body><S:Fault><S:Code><S:Value>S:Sender</S:Value></S:Code>
<S:Reason><S:Text xml:lang="en-US">Authentication Failure</S:Text></S:Reason>
</S:Fault></S:Body></S:Envelope>"#;

fn settings(server: &MockServer) -> ConnectionSettings {
    let mut settings = ConnectionSettings::new(
        format!("{}/sites/team", server.uri()),
        Credentials::new("jdoe@contoso.onmicrosoft.com", "hunter2"),
        "Tasks",
    );
    settings.cloud_domain = "127.0.0.1".to_string();
    settings.sts_url = format!("{}/extSTS.srf", server.uri());
    settings.timeout = Duration::from_secs(5);
    settings.retry = RetryConfig::disabled();
    settings
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/extSTS.srf"))
        .and(body_string_contains("<o:Username>jdoe@contoso.onmicrosoft.com</o:Username>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN_RESPONSE))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/_forms/default.aspx"))
        .and(body_string("t=EwBgAk6hB&p="))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Set-Cookie", "FedAuth=77u/PD94bWwg; path=/; HttpOnly")
                .append_header("Set-Cookie", "rtFa=Xh3kq9; path=/; HttpOnly"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/sites/team/_api/contextinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "FormDigestTimeoutSeconds": 1800,
            "FormDigestValue": DIGEST,
            "WebFullUrl": "https://contoso.sharepoint.com/sites/team"
        })))
        .mount(server)
        .await;
}

async fn mount_fields(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"/_api/web/lists/GetByTitle\('Tasks'\)/fields$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"InternalName": "Title", "Title": "Title", "TypeAsString": "Text", "Required": true, "Hidden": false, "ReadOnlyField": false},
                {"InternalName": "Status", "Title": "Status", "TypeAsString": "Choice", "Required": false, "Hidden": false, "ReadOnlyField": false, "Choices": ["Open", "Closed"]},
                {"InternalName": "DueDate", "Title": "Due Date", "TypeAsString": "DateTime", "Required": false, "Hidden": false, "ReadOnlyField": false},
                {"InternalName": "Owner", "Title": "Owner", "TypeAsString": "User", "Required": false, "Hidden": false, "ReadOnlyField": false},
                {"InternalName": "Modified", "Title": "Modified", "TypeAsString": "DateTime", "Required": false, "Hidden": false, "ReadOnlyField": true},
                {"InternalName": "ContentType", "Title": "Content Type", "TypeAsString": "Computed", "Required": false, "Hidden": true, "ReadOnlyField": false}
            ]
        })))
        .mount(server)
        .await;
}

async fn mount_items(server: &MockServer, row_limit: usize) {
    Mock::given(method("POST"))
        .and(path_regex(r"/_api/web/lists/GetByTitle\('Tasks'\)/GetItems$"))
        .and(query_param("$expand", "FieldValuesAsText"))
        .and(header("X-RequestDigest", DIGEST))
        .and(body_string_contains(format!("<RowLimit>{}</RowLimit>", row_limit)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {"ID": 1, "Id": 1, "Title": "Renew certificates", "Status": "Open", "DueDate": "2026-11-01T08:00:00Z",
                 "OwnerId": 11, "OwnerStringId": "11",
                 "FieldValuesAsText": {"Title": "Renew certificates", "Status": "Open", "DueDate": "11/1/2026 1:00 AM", "Owner": "Jane Doe"}},
                {"ID": 2, "Id": 2, "Title": "Archive 2025 tickets", "Status": "Closed", "DueDate": null,
                 "OwnerId": null, "OwnerStringId": null,
                 "FieldValuesAsText": {"Title": "Archive 2025 tickets", "Status": "Closed", "DueDate": "", "Owner": ""}},
                {"ID": 3, "Id": 3, "Title": "Rotate keys", "Status": "Open", "DueDate": "2026-10-20T08:00:00.500Z",
                 "OwnerId": 14, "OwnerStringId": "14",
                 "FieldValuesAsText": {"Title": "Rotate keys", "Status": "Open", "DueDate": "10/20/2026 1:00 AM", "Owner": "Bob Smith"}}
            ]
        })))
        .mount(server)
        .await;
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn test_sign_in_yields_form_digest() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    let backend = CloudBackend::new(settings(&server)).unwrap();
    assert_eq!(backend.mode(), BackendMode::Cloud);
    assert_eq!(
        backend.authenticate().await.unwrap(),
        Session::Cloud {
            form_digest: DIGEST.to_string()
        }
    );
}

#[tokio::test]
async fn test_token_fault_is_an_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(path("/extSTS.srf"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN_FAULT))
        .mount(&server)
        .await;

    let mut client = ListClient::new(settings(&server), ClientOptions::default()).unwrap();
    assert_eq!(client.mode(), BackendMode::Cloud);
    assert_eq!(
        client.try_authenticate().await,
        Err(ListError::Authentication("Authentication Failure".to_string()))
    );
    assert!(!client.is_authenticated());
    assert!(client.fetch_catalog().await.is_empty());
}

#[tokio::test]
async fn test_fetch_page_uses_metadata_catalog() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    mount_fields(&server).await;
    mount_items(&server, 10).await;

    let mut client = ListClient::new(settings(&server), ClientOptions::default()).unwrap();
    let criteria = ProjectionCriteria::new(1, 10)
        .with_filter("Status", "open")
        .with_sort("DueDate", SortOrder::Asc);
    let page = client.try_fetch_page(&criteria).await.unwrap();

    let names: Vec<&str> = page.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Title", "Status", "DueDate", "Owner"]);
    assert!(page.fields[0].required);
    assert_eq!(page.fields[1].field_type, FieldType::Choice);
    assert_eq!(page.fields[1].choices, vec!["Open", "Closed"]);

    assert_eq!(page.total, 2);
    let ids: Vec<i64> = page.items.iter().filter_map(|r| r.id()).collect();
    assert_eq!(ids, vec![3, 1]);

    assert_eq!(page.items[0].get("DueDate"), Some(&json!("2026-10-20 08:00:00")));
    assert_eq!(page.items[0].get("Owner"), Some(&json!("Bob Smith")));
    assert_eq!(page.items[1].get("DueDate"), Some(&json!("2026-11-01 08:00:00")));
    assert_eq!(page.items[1].get("Owner"), Some(&json!("Jane Doe")));
    assert!(page.items[1].get("OwnerId").is_none());
}

#[tokio::test]
async fn test_absent_values_normalize_to_empty_strings() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    mount_fields(&server).await;
    mount_items(&server, 10).await;

    let mut client = ListClient::new(settings(&server), ClientOptions::default()).unwrap();
    let page = client
        .try_fetch_page(&ProjectionCriteria::new(1, 10).with_filter("Title", "archive"))
        .await
        .unwrap();

    let record = &page.items[0];
    assert_eq!(record.id(), Some(2));
    assert_eq!(record.get("Owner"), Some(&json!("")));
    assert_eq!(record.get("DueDate"), Some(&Value::Null));
}

#[tokio::test]
async fn test_create_update_delete() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"GetByTitle\('Tasks'\)/items$"))
        .and(header("X-RequestDigest", DIGEST))
        .and(body_string_contains(r#""Title":"New task""#))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"Id": 17, "ID": 17, "Title": "New task"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"GetByTitle\('Tasks'\)/items\(17\)$"))
        .and(header("X-HTTP-Method", "MERGE"))
        .and(header("IF-MATCH", "*"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path_regex(r"GetByTitle\('Tasks'\)/items\(17\)$"))
        .and(header("X-HTTP-Method", "DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ListClient::new(settings(&server), ClientOptions::default()).unwrap();
    assert_eq!(client.try_create(&object(json!({"Title": "New task"}))).await, Ok(17));
    assert!(client.update(17, &object(json!({"Status": "Closed"}))).await);
    assert!(client.delete(17).await);
}

#[tokio::test]
async fn test_missing_item_maps_to_not_found() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"items\(999\)$"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "odata.error": {
                "code": "-2130575338, Microsoft.SharePoint.SPException",
                "message": {"lang": "en-US", "value": "Item does not exist. It may have been deleted by another user."}
            }
        })))
        .mount(&server)
        .await;

    let mut client = ListClient::new(settings(&server), ClientOptions::default()).unwrap();
    assert_eq!(
        client.try_update(999, &object(json!({"Title": "Y"}))).await,
        Err(ListError::NotFound { id: 999 })
    );
}

#[tokio::test]
async fn test_validate_against_metadata() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    mount_fields(&server).await;

    let mut client = ListClient::new(settings(&server), ClientOptions::default()).unwrap();
    let report = client
        .validate(&object(json!({"Status": "Pending", "DueDate": "next week"})))
        .await
        .unwrap();

    assert!(!report.valid);
    assert_eq!(
        report.errors,
        vec![
            "Title is required",
            "Status has invalid choice: Pending",
            "Due Date has invalid date format",
        ]
    );
}

fn retrying_settings(server: &MockServer) -> ConnectionSettings {
    let mut settings = settings(server);
    settings.retry = RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 1.0,
        jitter: false,
    };
    settings
}

#[tokio::test]
async fn test_create_is_sent_once_on_gateway_error() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"GetByTitle\('Tasks'\)/items$"))
        .respond_with(ResponseTemplate::new(504))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ListClient::new(retrying_settings(&server), ClientOptions::default()).unwrap();
    assert!(client.try_create(&object(json!({"Title": "New task"}))).await.is_err());
}

#[tokio::test]
async fn test_update_is_retried_on_gateway_error() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    Mock::given(method("POST"))
        .and(path_regex(r"items\(17\)$"))
        .respond_with(ResponseTemplate::new(504))
        .expect(3)
        .mount(&server)
        .await;

    let mut client = ListClient::new(retrying_settings(&server), ClientOptions::default()).unwrap();
    assert!(client.try_update(17, &object(json!({"Status": "Closed"}))).await.is_err());
}
