//! auth - GitHub App installation authentication
//!
//! This module obtains the bearer credential every gateway call needs.
//!
//! # Architecture
//!
//! The auth system:
//! - Signs a ten-minute RS256 app assertion from the app's private key
//! - Exchanges it for an installation access token
//! - Caches the token in memory and reuses it until it nears expiry
//! - Serializes acquisition so concurrent first use exchanges once
//! - Never exposes tokens or keys in logs, errors, or debug output
//!
//! # Components
//!
//! - [`TokenProvider`] - Trait for providing bearer tokens to the gateway
//! - [`InstallationTokenProvider`] - App installation implementation
//! - [`StaticTokenProvider`] - Fixed caller-supplied token
//! - [`AppSigner`] - RS256 assertion signing
//! - [`AuthError`] - Signing and exchange failures
//!
//! # Example
//!
//! ```ignore
//! use hubcommit::auth::{InstallationTokenProvider, TokenProvider};
//! use std::sync::Arc;
//!
//! let provider: Arc<dyn TokenProvider> =
//!     Arc::new(InstallationTokenProvider::from_config(&config)?);
//! let token = provider.bearer_token().await?;
//! ```

mod errors;
pub mod jwt;
mod provider;

pub use errors::AuthError;
pub use jwt::{AppClaims, AppSigner, ASSERTION_LIFETIME_SECS};
pub use provider::{
    InstallationToken, InstallationTokenProvider, StaticTokenProvider, DEFAULT_USER_AGENT,
    EXPIRY_BUFFER_SECS,
};

/// Trait for providing bearer tokens to the gateway.
///
/// # Implementation Notes
///
/// Implementors must:
/// - Return a token usable for the next request
/// - Make concurrent callers share one acquisition
/// - Never log or expose token values
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a bearer token, acquiring one if nothing usable is cached.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidKey`] / [`AuthError::Signing`] if the assertion cannot be built
    /// - [`AuthError::Exchange`] if the exchange endpoint rejects the assertion
    /// - [`AuthError::Network`] on transport failure
    async fn bearer_token(&self) -> Result<String, AuthError>;

    /// Drop any cached token so the next call acquires a new one.
    ///
    /// Called after the API rejects a token this provider returned.
    async fn invalidate(&self) {}

    /// Drop the cached token only while it is still `rejected`.
    ///
    /// A concurrent caller may already have replaced the rejected token with
    /// a fresh one, which must survive.
    async fn invalidate_if_current(&self, _rejected: &str) {
        self.invalidate().await
    }

    /// Whether [`invalidate`](TokenProvider::invalidate) can yield a different token.
    fn is_refreshable(&self) -> bool {
        true
    }
}
