//! auth::jwt
//!
//! Signed app assertions (RS256 JWTs) used to request installation tokens.
//!
//! GitHub accepts an app assertion for at most ten minutes, so every
//! assertion is issued with `exp = iat + 600`.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::errors::AuthError;

/// Maximum assertion lifetime accepted by the token exchange.
pub const ASSERTION_LIFETIME_SECS: i64 = 600;

/// Claims of an app assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppClaims {
    /// Issued-at, seconds since the epoch
    pub iat: i64,
    /// Expiry, seconds since the epoch
    pub exp: i64,
    /// Issuer: the app id
    pub iss: String,
}

impl AppClaims {
    pub fn new(app_id: u64, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
            iss: app_id.to_string(),
        }
    }
}

/// Signs app assertions with the app's private key.
#[derive(Clone)]
pub struct AppSigner {
    app_id: u64,
    key: EncodingKey,
}

impl AppSigner {
    /// Parse a PEM-encoded RSA private key (PKCS#1 or PKCS#8).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKey`] if the PEM cannot be parsed.
    pub fn from_pem(app_id: u64, pem: &str) -> Result<Self, AuthError> {
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        Ok(Self { app_id, key })
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    /// Produce an encoded assertion valid from `now` for ten minutes.
    pub fn sign(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AppClaims::new(self.app_id, now);
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }
}

impl std::fmt::Debug for AppSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSigner")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use jsonwebtoken::{DecodingKey, Validation};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/app_key.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/app_key.pub.pem");

    #[test]
    fn claims_expire_after_ten_minutes() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let claims = AppClaims::new(42, now);
        assert_eq!(claims.iss, "42");
        assert_eq!(claims.exp - claims.iat, 600);
        assert_eq!(claims.iat, now.timestamp());
    }

    #[test]
    fn signed_assertion_verifies_with_public_key() {
        let signer = AppSigner::from_pem(1234, PRIVATE_KEY).unwrap();
        let now = Utc::now();
        let token = signer.sign(now).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&["1234"]);
        validation.validate_aud = false;
        let decoded = jsonwebtoken::decode::<AppClaims>(
            &token,
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.header.alg, Algorithm::RS256);
        assert_eq!(decoded.claims, AppClaims::new(1234, now));
    }

    #[test]
    fn rejects_non_rsa_pem() {
        let err = AppSigner::from_pem(1, "not a pem at all").unwrap_err();
        assert!(matches!(err, AuthError::InvalidKey(_)));
    }

    #[test]
    fn debug_hides_key() {
        let signer = AppSigner::from_pem(7, PRIVATE_KEY).unwrap();
        let debug_output = format!("{:?}", signer);
        assert!(debug_output.contains("app_id"));
        assert!(!debug_output.contains("PRIVATE"));
    }
}
