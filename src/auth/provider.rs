//! auth::provider
//!
//! Token providers backing the repository gateway.
//!
//! # Installation tokens
//!
//! [`InstallationTokenProvider`] turns the app's long-lived signing key into
//! a short-lived installation access token:
//!
//! 1. Sign an RS256 app assertion (valid for ten minutes)
//! 2. `POST /app/installations/{id}/access_tokens` with the assertion
//! 3. Cache the returned token in memory
//!
//! # Concurrency
//!
//! The cache sits behind an async mutex that stays locked across signing and
//! exchange, so concurrent first use performs a single exchange and every
//! waiter observes the cached result:
//!
//! 1. Acquire the cache lock
//! 2. Return the cached token if it is still fresh
//! 3. Otherwise sign, exchange, store
//! 4. Release the lock
//!
//! # Example
//!
//! ```ignore
//! use hubcommit::auth::{InstallationTokenProvider, TokenProvider};
//!
//! let provider = InstallationTokenProvider::from_config(&config)?;
//! let token = provider.bearer_token().await?;
//! ```

use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::errors::AuthError;
use super::jwt::AppSigner;
use super::TokenProvider;
use crate::core::config::AppConfig;

/// User-Agent used when the service name is not a valid header value.
pub const DEFAULT_USER_AGENT: &str = "hubcommit";

/// Re-exchange a token this long before its reported expiry.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// An installation access token and its reported expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct InstallationToken {
    pub token: String,
    /// `None` when the exchange response did not include an expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl InstallationToken {
    /// Check whether the token should be replaced before use at `now`.
    ///
    /// Tokens without a known expiry are never considered stale.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_BUFFER_SECS) >= expires_at,
            None => false,
        }
    }
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Response from POST /app/installations/{id}/access_tokens
#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// GitHub error response body.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// Exchanges app assertions for installation tokens and caches the result.
pub struct InstallationTokenProvider {
    client: Client,
    signer: AppSigner,
    installation_id: u64,
    service_name: String,
    api_base: String,
    cache: Mutex<Option<InstallationToken>>,
}

impl InstallationTokenProvider {
    /// Create a provider for one app installation.
    pub fn new(
        signer: AppSigner,
        installation_id: u64,
        service_name: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            signer,
            installation_id,
            service_name: service_name.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(None),
        }
    }

    /// Create a provider from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the private key cannot be parsed.
    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        let signer = AppSigner::from_pem(config.app_id, config.private_key.as_pem())?;
        Ok(Self::new(
            signer,
            config.installation_id,
            &config.service_name,
            &config.api_base,
        ))
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    fn exchange_url(&self) -> String {
        format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, self.installation_id
        )
    }

    fn headers(&self, assertion: &str) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", assertion))
                .map_err(|e| AuthError::Signing(e.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.service_name)
                .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_USER_AGENT)),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Sign a fresh assertion and exchange it for an installation token.
    #[instrument(skip(self), fields(installation_id = self.installation_id, app_id = self.signer.app_id()))]
    async fn exchange(&self) -> Result<InstallationToken, AuthError> {
        let assertion = self.signer.sign(Utc::now())?;

        let response = self
            .client
            .post(self.exchange_url())
            .headers(self.headers(&assertion)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let parsed: AccessTokenResponse = serde_json::from_str(&body)
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
            if parsed.token.is_empty() {
                return Err(AuthError::InvalidResponse("empty token".into()));
            }
            info!(expires_at = ?parsed.expires_at, "obtained installation token");
            Ok(InstallationToken {
                token: parsed.token,
                expires_at: parsed.expires_at,
            })
        } else {
            let message = serde_json::from_str::<GitHubErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            Err(AuthError::Exchange {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Return the cached token, exchanging a new one when absent or stale.
    pub async fn token(&self) -> Result<InstallationToken, AuthError> {
        let mut cache = self.cache.lock().await;

        if let Some(ref cached) = *cache {
            if !cached.needs_refresh(Utc::now()) {
                return Ok(cached.clone());
            }
            debug!("cached installation token is near expiry");
        }

        let fresh = self.exchange().await?;
        *cache = Some(fresh.clone());
        Ok(fresh)
    }
}

#[async_trait::async_trait]
impl TokenProvider for InstallationTokenProvider {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        Ok(self.token().await?.token)
    }

    async fn invalidate(&self) {
        debug!("dropping cached installation token");
        *self.cache.lock().await = None;
    }

    async fn invalidate_if_current(&self, rejected: &str) {
        let mut cache = self.cache.lock().await;
        if cache.as_ref().map_or(false, |cached| cached.token == rejected) {
            debug!("dropping rejected installation token");
            *cache = None;
        }
    }
}

// Custom Debug to avoid exposing tokens
impl std::fmt::Debug for InstallationTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationTokenProvider")
            .field("app_id", &self.signer.app_id())
            .field("installation_id", &self.installation_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

/// A provider that always returns the same caller-supplied token.
///
/// Used when the caller authenticates with a token obtained elsewhere.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }

    fn is_refreshable(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/app_key.pem");

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn token_without_expiry_never_refreshes() {
        let token = InstallationToken {
            token: "ghs_abc".into(),
            expires_at: None,
        };
        assert!(!token.needs_refresh(at(23, 59)));
    }

    #[test]
    fn needs_refresh_with_buffer() {
        let token = InstallationToken {
            token: "ghs_abc".into(),
            expires_at: Some(at(13, 0)),
        };
        assert!(!token.needs_refresh(at(12, 0)));
        assert!(!token.needs_refresh(at(12, 54)));
        assert!(token.needs_refresh(at(12, 55)));
        assert!(token.needs_refresh(at(13, 30)));
    }

    #[test]
    fn debug_output_does_not_expose_tokens() {
        let token = InstallationToken {
            token: "ghs_secret".into(),
            expires_at: None,
        };
        assert!(!format!("{:?}", token).contains("ghs_secret"));

        let provider = StaticTokenProvider::new("ghs_static");
        assert!(!format!("{:?}", provider).contains("ghs_static"));
    }

    #[test]
    fn exchange_url_format() {
        let signer = AppSigner::from_pem(1, PRIVATE_KEY).unwrap();
        let provider =
            InstallationTokenProvider::new(signer, 99, "bot", "https://api.github.com/");
        assert_eq!(
            provider.exchange_url(),
            "https://api.github.com/app/installations/99/access_tokens"
        );
    }

    #[tokio::test]
    async fn static_provider_returns_token_and_is_not_refreshable() {
        let provider = StaticTokenProvider::new("ghs_static");
        assert_eq!(provider.bearer_token().await.unwrap(), "ghs_static");
        assert!(!provider.is_refreshable());
    }
}
