//! auth::errors
//!
//! Authentication error types for GitHub App installation tokens.
//!
//! # Design
//!
//! Error messages MUST NOT contain tokens, assertions, or key material.
//! Variants carry enough context (status, app/installation ids) to diagnose
//! a failure without exposing secrets.
//!
//! # Example
//!
//! ```
//! use hubcommit::auth::AuthError;
//!
//! let err = AuthError::Exchange { status: 401, message: "A JSON web token could not be decoded".into() };
//! assert!(err.to_string().contains("401"));
//! ```

use thiserror::Error;

/// Errors from signing or exchanging app credentials.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The configured private key is not a usable RSA PEM key.
    #[error("invalid app private key: {0}")]
    InvalidKey(String),

    /// Signing the app assertion failed.
    #[error("failed to sign app assertion: {0}")]
    Signing(String),

    /// The token exchange endpoint rejected the request.
    #[error("installation token exchange failed: {status} - {message}")]
    Exchange {
        /// HTTP status code
        status: u16,
        /// Error message from GitHub
        message: String,
    },

    /// The exchange response could not be understood.
    #[error("invalid installation token response: {0}")]
    InvalidResponse(String),

    /// Network error during authentication.
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.without_url().to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                AuthError::InvalidKey(err.to_string())
            }
            _ => AuthError::Signing(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_error_formatting() {
        let err = AuthError::Exchange {
            status: 404,
            message: "Not Found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("Not Found"));
    }

    #[test]
    fn error_messages_never_contain_token_patterns() {
        let errors = vec![
            AuthError::InvalidKey("bad pem".to_string()),
            AuthError::Signing("rsa failure".to_string()),
            AuthError::Exchange {
                status: 401,
                message: "unauthorized".to_string(),
            },
            AuthError::InvalidResponse("missing token".to_string()),
            AuthError::Network("network error".to_string()),
        ];

        for err in errors {
            let msg = err.to_string();
            assert!(!msg.contains("ghs_"), "message contains token pattern: {msg}");
            assert!(!msg.contains("eyJ"), "message contains JWT pattern: {msg}");
        }
    }
}
