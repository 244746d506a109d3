//! Token caching for Drive authentication.
//!
//! Provides a thread-safe, async-aware token cache with:
//! - Refresh margin to avoid token expiry during requests
//! - Single-flight pattern to prevent thundering herd on refresh
//! - Graceful fallback to existing valid token on refresh failure
//! - A fixed-token mode for pre-minted bearer tokens

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{DriveError, DriveResult};

// =============================================================================
// Constants
// =============================================================================

/// Refresh margin: refresh token 60 seconds before expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Conservative token TTL when expiry is unknown (50 minutes).
const TOKEN_DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for full Drive access (read inputs, write outputs).
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

// =============================================================================
// Token Sources
// =============================================================================

/// A freshly issued access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Something that can mint access tokens on demand.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn issue(&self) -> DriveResult<IssuedToken>;
}

/// Service-account tokens through `gcp_auth`.
pub struct ServiceAccountSource {
    provider: Arc<dyn TokenProvider>,
}

impl ServiceAccountSource {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl TokenSource for ServiceAccountSource {
    async fn issue(&self) -> DriveResult<IssuedToken> {
        let token = self
            .provider
            .token(&[DRIVE_SCOPE])
            .await
            .map_err(|e| DriveError::auth_error(format!("Failed to obtain auth token: {}", e)))?;

        Ok(IssuedToken {
            access_token: token.as_str().to_string(),
            expires_at: Some(token.expires_at()),
        })
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// Cached token with expiration tracking.
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn from_issued(issued: IssuedToken) -> Self {
        let expires_at = match issued.expires_at {
            Some(exp) => {
                let now = Utc::now();
                if exp > now {
                    match (exp - now).to_std() {
                        Ok(ttl) => Instant::now() + ttl,
                        Err(_) => Instant::now() + TOKEN_DEFAULT_TTL,
                    }
                } else {
                    // Force a refresh on the next request
                    Instant::now()
                }
            }
            None => Instant::now() + TOKEN_DEFAULT_TTL,
        };

        Self {
            access_token: issued.access_token,
            expires_at,
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }

    fn is_usable(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

enum Source {
    Refreshing(Arc<dyn TokenSource>),
    Fixed(String),
}

/// Thread-safe token cache with single-flight refresh.
pub struct TokenCache {
    source: Source,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Create a cache backed by a `gcp_auth` provider.
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self::with_source(Arc::new(ServiceAccountSource::new(auth)))
    }

    /// Create a cache backed by any token source.
    pub fn with_source(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source: Source::Refreshing(source),
            cache: RwLock::new(None),
        }
    }

    /// Create a cache that always hands out the same bearer token.
    pub fn fixed(token: impl Into<String>) -> Self {
        Self {
            source: Source::Fixed(token.into()),
            cache: RwLock::new(None),
        }
    }

    /// Whether an invalidated token can be replaced by a fresh one.
    pub fn can_refresh(&self) -> bool {
        matches!(self.source, Source::Refreshing(_))
    }

    /// Invalidate the cached token.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_token(&self) -> DriveResult<String> {
        let source = match &self.source {
            Source::Fixed(token) => return Ok(token.clone()),
            Source::Refreshing(source) => source,
        };

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have refreshed while we waited
        if let Some(cached) = cache.as_ref() {
            if cached.is_valid() {
                return Ok(cached.access_token.clone());
            }
        }

        match source.issue().await {
            Ok(issued) => {
                let fresh = CachedToken::from_issued(issued);
                let access_token = fresh.access_token.clone();
                *cache = Some(fresh);
                debug!("Refreshed Drive auth token");
                Ok(access_token)
            }
            Err(e) => {
                if let Some(cached) = cache.as_ref() {
                    if cached.is_usable() {
                        warn!("Token refresh failed, using existing token: {}", e);
                        return Ok(cached.access_token.clone());
                    }
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        issued: AtomicU32,
        ttl: chrono::Duration,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn issue(&self) -> DriveResult<IssuedToken> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(IssuedToken {
                access_token: format!("token-{}", n),
                expires_at: Some(Utc::now() + self.ttl),
            })
        }
    }

    fn counting(ttl: chrono::Duration) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            issued: AtomicU32::new(0),
            ttl,
        })
    }

    #[test]
    fn test_token_constants() {
        assert_eq!(TOKEN_REFRESH_MARGIN, Duration::from_secs(60));
        assert_eq!(TOKEN_DEFAULT_TTL, Duration::from_secs(50 * 60));
        assert!(DRIVE_SCOPE.ends_with("/auth/drive"));
    }

    #[tokio::test]
    async fn test_fixed_token_survives_invalidation() {
        let cache = TokenCache::fixed("ya29.static");
        assert!(!cache.can_refresh());
        assert_eq!(cache.get_token().await.unwrap(), "ya29.static");

        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "ya29.static");
    }

    #[tokio::test]
    async fn test_valid_token_is_reused() {
        let source = counting(chrono::Duration::minutes(30));
        let cache = TokenCache::with_source(source.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(source.issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let source = counting(chrono::Duration::minutes(30));
        let cache = TokenCache::with_source(source.clone());

        cache.get_token().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
    }

    #[tokio::test]
    async fn test_token_inside_refresh_margin_is_replaced() {
        let source = counting(chrono::Duration::seconds(30));
        let cache = TokenCache::with_source(source.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
    }
}
