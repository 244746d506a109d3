//! Drive v3 REST API client.
//!
//! Production-grade client with:
//! - Token caching with refresh margin, one retry on an expired token
//! - HTTP client tuning (pooling, timeouts)
//! - Observability (tracing spans, metrics)
//!
//! Retries with backoff are applied by the callers through
//! [`crate::retry::with_retry`]; each method here is one logical request.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reelstamp_models::{converted_copy_name, RemoteNode};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{DriveError, DriveResult};
use crate::metrics::record_request;
use crate::store::RemoteStore;
use crate::token_cache::TokenCache;
use crate::types::{query_literal, CopyRequest, DriveFile, FileList, NewFileMetadata, FILE_FIELDS};

// =============================================================================
// Configuration
// =============================================================================

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Drive client configuration.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Metadata and download endpoint
    pub api_base_url: String,
    /// Upload endpoint
    pub upload_base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Page size for folder listings
    pub page_size: u32,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            page_size: 100,
        }
    }
}

impl DriveConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let timeout_secs: u64 = std::env::var("DRIVE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let connect_timeout_secs: u64 = std::env::var("DRIVE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Self {
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            ..Self::default()
        }
    }

    /// Point both endpoints at another host (used against mock servers).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.api_base_url = format!("{}/drive/v3", base);
        self.upload_base_url = format!("{}/upload/drive/v3", base);
        self
    }
}

// =============================================================================
// Client
// =============================================================================

/// Drive v3 REST API client.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    config: DriveConfig,
    token_cache: Arc<TokenCache>,
}

impl DriveClient {
    /// Create a new Drive client.
    pub fn new(config: DriveConfig, token_cache: TokenCache) -> DriveResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .user_agent(concat!("reelstamp-drive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DriveError::Network)?;

        Ok(Self {
            http,
            config,
            token_cache: Arc::new(token_cache),
        })
    }

    /// Create from environment variables.
    ///
    /// `DRIVE_ACCESS_TOKEN` takes precedence over the service account in
    /// `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_env() -> DriveResult<Self> {
        let token_cache = match std::env::var("DRIVE_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                debug!("Using pre-minted Drive access token");
                TokenCache::fixed(token.trim())
            }
            _ => TokenCache::new(Self::create_auth_provider()?),
        };

        Self::new(DriveConfig::from_env(), token_cache)
    }

    fn create_auth_provider() -> DriveResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            DriveError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(DriveError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file, \
                 or provide DRIVE_ACCESS_TOKEN.",
            )),
        }
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.config.api_base_url, file_id)
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Send a request built by `build`, refreshing the token once on expiry.
    ///
    /// `build` is called again for the refreshed attempt, so request bodies
    /// must be reconstructible.
    async fn send<F>(&self, operation: &str, target: &str, build: F) -> DriveResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let span = info_span!("drive_request", operation = %operation, target = %target);

        let start = Instant::now();
        let result = self.send_authorized(&build).instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(response) => response.status().as_u16(),
            Err(e) => e.http_status().unwrap_or(0),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn send_authorized<F>(&self, build: &F) -> DriveResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let mut response = build(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.token_cache.can_refresh() {
            let body = response.text().await.unwrap_or_default();
            if !Self::is_access_token_expired(&body) {
                return Err(DriveError::from_http_status(401, &body, None));
            }

            debug!("Access token rejected as expired, refreshing");
            self.token_cache.invalidate().await;
            let token = self.token_cache.get_token().await?;
            response = build(&token).send().await?;
        }

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::handle_error_response(response).await)
        }
    }

    async fn handle_error_response(response: Response) -> DriveError {
        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();
        DriveError::from_http_status(status, &body, retry_after_ms)
    }

    async fn parse_file(response: Response, parent_hint: Option<&str>) -> DriveResult<RemoteNode> {
        let file: DriveFile = response.json().await?;
        Ok(file.into_node(parent_hint))
    }

    /// Run a `files.list` query and collect every page.
    async fn list_query(
        &self,
        operation: &str,
        target: &str,
        query: &str,
        parent_hint: &str,
    ) -> DriveResult<Vec<RemoteNode>> {
        let url = format!("{}/files", self.config.api_base_url);
        let fields = format!("nextPageToken,files({})", FILE_FIELDS);
        let page_size = self.config.page_size.to_string();

        let mut nodes = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .send(operation, target, |token| {
                    let req = self.http.get(&url).bearer_auth(token).query(&[
                        ("q", query),
                        ("fields", fields.as_str()),
                        ("pageSize", page_size.as_str()),
                        ("orderBy", "name"),
                        ("supportsAllDrives", "true"),
                        ("includeItemsFromAllDrives", "true"),
                    ]);
                    match &page_token {
                        Some(page) => req.query(&[("pageToken", page.as_str())]),
                        None => req,
                    }
                })
                .await?;

            let page: FileList = response.json().await?;
            nodes.extend(
                page.files
                    .into_iter()
                    .filter(|f| !f.trashed)
                    .map(|f| f.into_node(Some(parent_hint))),
            );

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(nodes)
    }
}

/// Build a `multipart/related` upload body: JSON metadata then raw content.
pub(crate) fn multipart_related_body(
    boundary: &str,
    metadata_json: &[u8],
    content_type: &str,
    content: &[u8],
) -> Bytes {
    let mut body = BytesMut::with_capacity(content.len() + metadata_json.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json);
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body.freeze()
}

// =============================================================================
// RemoteStore
// =============================================================================

#[async_trait]
impl RemoteStore for DriveClient {
    async fn get_node(&self, id: &str) -> DriveResult<RemoteNode> {
        let url = self.file_url(id);

        let response = self
            .send("get_node", id, |token| {
                self.http.get(&url).bearer_auth(token).query(&[
                    ("fields", FILE_FIELDS),
                    ("supportsAllDrives", "true"),
                ])
            })
            .await?;

        Self::parse_file(response, None).await
    }

    async fn list_children(&self, folder_id: &str) -> DriveResult<Vec<RemoteNode>> {
        let query = format!("{} in parents and trashed = false", query_literal(folder_id));
        self.list_query("list_children", folder_id, &query, folder_id)
            .await
    }

    async fn download(&self, file_id: &str) -> DriveResult<Vec<u8>> {
        let url = self.file_url(file_id);

        let response = self
            .send("download", file_id, |token| {
                self.http
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            })
            .await?;

        Ok(response.bytes().await?.to_vec())
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> DriveResult<Vec<u8>> {
        let url = format!("{}/export", self.file_url(file_id));

        let response = self
            .send("export", file_id, |token| {
                self.http
                    .get(&url)
                    .bearer_auth(token)
                    .query(&[("mimeType", mime_type)])
            })
            .await?;

        Ok(response.bytes().await?.to_vec())
    }

    async fn find_child(&self, folder_id: &str, name: &str) -> DriveResult<Option<RemoteNode>> {
        let query = format!(
            "{} in parents and name = {} and trashed = false",
            query_literal(folder_id),
            query_literal(name)
        );
        let mut matches = self
            .list_query("find_child", folder_id, &query, folder_id)
            .await?;

        if matches.len() > 1 {
            debug!(
                folder_id = %folder_id,
                name = %name,
                count = matches.len(),
                "Several files share the output name, using the first"
            );
        }

        Ok(if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        })
    }

    async fn create_file(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        content: Bytes,
    ) -> DriveResult<RemoteNode> {
        let url = format!("{}/files", self.config.upload_base_url);
        let metadata = serde_json::to_vec(&NewFileMetadata {
            name,
            mime_type,
            parents: vec![folder_id],
        })?;
        let boundary = format!("reelstamp-{:016x}", rand::random::<u64>());
        let body = multipart_related_body(&boundary, &metadata, mime_type, &content);
        let content_type = format!("multipart/related; boundary={}", boundary);

        let response = self
            .send("create_file", folder_id, |token| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .query(&[
                        ("uploadType", "multipart"),
                        ("supportsAllDrives", "true"),
                        ("fields", FILE_FIELDS),
                    ])
                    .header(header::CONTENT_TYPE, content_type.as_str())
                    .body(body.clone())
            })
            .await?;

        Self::parse_file(response, Some(folder_id)).await
    }

    async fn update_file(
        &self,
        file_id: &str,
        mime_type: &str,
        content: Bytes,
    ) -> DriveResult<RemoteNode> {
        let url = format!("{}/files/{}", self.config.upload_base_url, file_id);

        let response = self
            .send("update_file", file_id, |token| {
                self.http
                    .patch(&url)
                    .bearer_auth(token)
                    .query(&[
                        ("uploadType", "media"),
                        ("supportsAllDrives", "true"),
                        ("fields", FILE_FIELDS),
                    ])
                    .header(header::CONTENT_TYPE, mime_type)
                    .body(content.clone())
            })
            .await?;

        Self::parse_file(response, None).await
    }

    async fn convert_copy(
        &self,
        file_id: &str,
        target_mime: &str,
        folder_id: &str,
    ) -> DriveResult<RemoteNode> {
        let url = format!("{}/copy", self.file_url(file_id));
        let request = CopyRequest {
            name: converted_copy_name(file_id),
            mime_type: target_mime,
            parents: vec![folder_id],
        };

        let response = self
            .send("convert_copy", file_id, |token| {
                self.http
                    .post(&url)
                    .bearer_auth(token)
                    .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
                    .json(&request)
            })
            .await?;

        Self::parse_file(response, Some(folder_id)).await
    }

    async fn delete(&self, file_id: &str) -> DriveResult<()> {
        let url = self.file_url(file_id);

        self.send("delete", file_id, |token| {
            self.http
                .delete(&url)
                .bearer_auth(token)
                .query(&[("supportsAllDrives", "true")])
        })
        .await?;

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_default_values() {
        std::env::remove_var("DRIVE_TIMEOUT_SECS");
        std::env::remove_var("DRIVE_CONNECT_TIMEOUT_SECS");
        let config = DriveConfig::from_env();
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    #[serial]
    fn test_config_timeouts_from_env() {
        std::env::set_var("DRIVE_TIMEOUT_SECS", "5");
        std::env::set_var("DRIVE_CONNECT_TIMEOUT_SECS", "not-a-number");
        let config = DriveConfig::from_env();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        std::env::remove_var("DRIVE_TIMEOUT_SECS");
        std::env::remove_var("DRIVE_CONNECT_TIMEOUT_SECS");
    }

    #[test]
    #[serial]
    fn test_from_env_requires_credentials() {
        std::env::remove_var("DRIVE_ACCESS_TOKEN");
        std::env::remove_var("GOOGLE_APPLICATION_CREDENTIALS");
        let result = DriveClient::from_env();
        assert!(matches!(result, Err(DriveError::Auth(_))));
    }

    #[test]
    #[serial]
    fn test_from_env_accepts_static_token() {
        std::env::set_var("DRIVE_ACCESS_TOKEN", "ya29.static");
        let client = DriveClient::from_env().unwrap();
        assert!(!client.token_cache.can_refresh());
        std::env::remove_var("DRIVE_ACCESS_TOKEN");
    }

    #[test]
    fn test_with_base_url() {
        let config = DriveConfig::default().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000/drive/v3");
        assert_eq!(config.upload_base_url, "http://127.0.0.1:9000/upload/drive/v3");
    }

    #[test]
    fn test_token_expiry_detection() {
        assert!(DriveClient::is_access_token_expired(
            r#"{"error":{"code":401,"status":"UNAUTHENTICATED"}}"#
        ));
        assert!(!DriveClient::is_access_token_expired("invalid_grant"));
    }

    #[test]
    fn test_multipart_related_body_layout() {
        let body = multipart_related_body("b0", br#"{"name":"x.mp4"}"#, "video/mp4", b"FRAMES");
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(
            text,
            "--b0\r\n\
             Content-Type: application/json; charset=UTF-8\r\n\r\n\
             {\"name\":\"x.mp4\"}\r\n\
             --b0\r\n\
             Content-Type: video/mp4\r\n\r\n\
             FRAMES\r\n\
             --b0--\r\n"
        );
    }
}
