//! HTTP-level tests for the Drive client against a mock server.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::client::{DriveClient, DriveConfig};
use crate::error::{DriveError, DriveResult};
use crate::retry::{with_retry, BackoffPolicy, RetryError, Retryable};
use crate::store::RemoteStore;
use crate::token_cache::{IssuedToken, TokenCache, TokenSource};
use reelstamp_models::NodeKind;

// =============================================================================
// Test Helpers
// =============================================================================

fn test_config(server: &MockServer) -> DriveConfig {
    DriveConfig {
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        ..DriveConfig::default()
    }
    .with_base_url(&server.uri())
}

fn static_client(server: &MockServer) -> DriveClient {
    DriveClient::new(test_config(server), TokenCache::fixed("test-token")).unwrap()
}

fn file_json(id: &str, name: &str, mime: &str) -> serde_json::Value {
    json!({ "id": id, "name": name, "mimeType": mime, "parents": ["folder-1"] })
}

/// Issues `token-1`, `token-2`, ... each valid for an hour.
struct SequenceSource {
    issued: AtomicU32,
}

#[async_trait]
impl TokenSource for SequenceSource {
    async fn issue(&self) -> DriveResult<IssuedToken> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssuedToken {
            access_token: format!("token-{}", n),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        })
    }
}

// =============================================================================
// Status mapping
// =============================================================================

#[tokio::test]
async fn test_not_found_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "File not found: missing." }
        })))
        .mount(&server)
        .await;

    let err = static_client(&server).get_node("missing").await.unwrap_err();
    assert!(matches!(err, DriveError::NotFound(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_rate_limit_reason_and_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/busy"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Retry-After", "2")
                .set_body_json(json!({
                    "error": {
                        "code": 403,
                        "message": "Rate Limit Exceeded",
                        "errors": [{ "reason": "rateLimitExceeded" }]
                    }
                })),
        )
        .mount(&server)
        .await;

    let err = static_client(&server).get_node("busy").await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/flaky"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_json("flaky", "take.mp4", "video/mp4")),
        )
        .mount(&server)
        .await;

    let client = static_client(&server);
    let policy = BackoffPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts: 5,
        jitter: false,
    };

    let node = with_retry(&policy, "get_node", || client.get_node("flaky"))
        .await
        .unwrap();
    assert_eq!(node.kind, NodeKind::Video);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_permission_denied_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/locked"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": 403,
                "message": "Insufficient permissions",
                "errors": [{ "reason": "insufficientFilePermissions" }]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = static_client(&server);
    let result = with_retry(&BackoffPolicy::default(), "get_node", || {
        client.get_node("locked")
    })
    .await;

    assert!(matches!(
        result,
        Err(RetryError::Permanent(DriveError::PermissionDenied(_)))
    ));
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_children_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [file_json("p1", "take.txt", "text/plain")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("q", "'folder-1' in parents and trashed = false"))
        .and(query_param("supportsAllDrives", "true"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "page-2",
            "files": [
                file_json("v1", "take.mp4", "video/mp4"),
                file_json("f1", "Sub", "application/vnd.google-apps.folder")
            ]
        })))
        .mount(&server)
        .await;

    let children = static_client(&server)
        .list_children("folder-1")
        .await
        .unwrap();

    let ids: Vec<_> = children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "f1", "p1"]);
    assert!(children.iter().all(|n| n.parent_id.as_deref() == Some("folder-1")));
    assert_eq!(children[1].kind, NodeKind::Folder);
}

#[tokio::test]
async fn test_trashed_entries_are_dropped() {
    let server = MockServer::start().await;
    let mut trashed = file_json("old", "take.mp4", "video/mp4");
    trashed["trashed"] = json!(true);
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [trashed, file_json("new", "take.mp4", "video/mp4")]
        })))
        .mount(&server)
        .await;

    let children = static_client(&server)
        .list_children("folder-1")
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, "new");
}

#[tokio::test]
async fn test_find_child_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "'folder-1' in parents and name = 'take_final.mp4' and trashed = false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [file_json("out-1", "take_final.mp4", "video/mp4")]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .mount(&server)
        .await;

    let client = static_client(&server);
    let found = client.find_child("folder-1", "take_final.mp4").await.unwrap();
    assert_eq!(found.map(|n| n.id), Some("out-1".to_string()));

    let missing = client.find_child("folder-1", "other_final.mp4").await.unwrap();
    assert!(missing.is_none());
}

// =============================================================================
// Content
// =============================================================================

#[tokio::test]
async fn test_download_and_export() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/v1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x00\x01video".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/d1/export"))
        .and(query_param("mimeType", "text/plain"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\u{feff}Prompt text"))
        .mount(&server)
        .await;

    let client = static_client(&server);
    assert_eq!(client.download("v1").await.unwrap(), b"\x00\x01video");
    assert_eq!(
        client.export("d1", "text/plain").await.unwrap(),
        "\u{feff}Prompt text".as_bytes()
    );
}

#[tokio::test]
async fn test_convert_copy_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/drive/v3/files/docx-1/copy"))
        .and(body_string_contains("application/vnd.google-apps.document"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "copy-1",
            "reelstamp-export-docx-1",
            "application/vnd.google-apps.document",
        )))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/drive/v3/files/copy-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = static_client(&server);
    let copy = client
        .convert_copy("docx-1", "application/vnd.google-apps.document", "folder-1")
        .await
        .unwrap();
    assert_eq!(copy.kind, NodeKind::PromptDocument);
    assert!(copy.is_native_document());

    client.delete(&copy.id).await.unwrap();
}

// =============================================================================
// Uploads
// =============================================================================

#[tokio::test]
async fn test_create_file_sends_multipart_related() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(query_param("uploadType", "multipart"))
        .and(header_exists("content-type"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json("out-1", "take_final.mp4", "video/mp4")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let node = static_client(&server)
        .create_file("folder-1", "take_final.mp4", "video/mp4", Bytes::from_static(b"MP4DATA"))
        .await
        .unwrap();
    assert_eq!(node.id, "out-1");

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body).to_string();
    assert!(body.contains("Content-Type: application/json; charset=UTF-8"));
    assert!(body.contains(r#""name":"take_final.mp4""#));
    assert!(body.contains(r#""parents":["folder-1"]"#));
    assert!(body.contains("Content-Type: video/mp4\r\n\r\nMP4DATA\r\n"));
    assert!(body.trim_end().ends_with("--"));
}

#[tokio::test]
async fn test_update_file_uploads_media() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/upload/drive/v3/files/out-1"))
        .and(query_param("uploadType", "media"))
        .and(header("content-type", "video/mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json("out-1", "take_final.mp4", "video/mp4")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let node = static_client(&server)
        .update_file("out-1", "video/mp4", Bytes::from_static(b"NEW"))
        .await
        .unwrap();
    assert_eq!(node.id, "out-1");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"NEW");
}

#[tokio::test]
async fn test_retried_upload_sends_the_same_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(file_json("out-2", "talk_final.mp4", "video/mp4")),
        )
        .mount(&server)
        .await;

    let client = static_client(&server);
    let policy = BackoffPolicy {
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        max_attempts: 5,
        jitter: false,
    };
    let content = Bytes::from(vec![7u8; 64 * 1024]);

    let node = with_retry(&policy, "create_file", || {
        client.create_file("folder-1", "talk_final.mp4", "video/mp4", content.clone())
    })
    .await
    .unwrap();
    assert_eq!(node.id, "out-2");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].body.len() > content.len());
    assert!(requests.iter().all(|r| r.body == requests[0].body));
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/v1"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": 401, "message": "Invalid Credentials", "status": "UNAUTHENTICATED" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/v1"))
        .and(header("authorization", "Bearer token-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_json("v1", "take.mp4", "video/mp4")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let source = Arc::new(SequenceSource {
        issued: AtomicU32::new(0),
    });
    let client = DriveClient::new(test_config(&server), TokenCache::with_source(source.clone()))
        .unwrap();

    let node = client.get_node("v1").await.unwrap();
    assert_eq!(node.id, "v1");
    assert_eq!(source.issued.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unauthorized_static_token_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/v1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid Credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let err = static_client(&server).get_node("v1").await.unwrap_err();
    assert!(matches!(err, DriveError::Unauthenticated(_)));
    assert!(!err.is_transient());
}
