//! Caller Authentication
//!
//! Clients present a JWT issued by an external provider; the server only
//! validates it. The `sub` claim names the caller: a `0x`-prefixed 20-byte
//! address is used as-is, any other subject is mapped to a stable derived
//! address.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ids::AccountId;

/// Token validation settings.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// Required `iss`, if any.
    pub issuer: Option<String>,
    /// Required `aud`, if any.
    pub audience: Option<String>,
    /// RS256 public key (PEM). Takes precedence over `secret`.
    pub public_key_pem: Option<String>,
    /// HS256 shared secret.
    pub secret: Option<String>,
    /// Accept expired tokens. Local testing only.
    pub skip_expiry: bool,
}

impl AuthConfig {
    /// Read `AUTH_ISSUER`, `AUTH_AUDIENCE`, `AUTH_PUBLIC_KEY_PEM`,
    /// `AUTH_SECRET` and `AUTH_SKIP_EXPIRY`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            issuer: var("AUTH_ISSUER"),
            audience: var("AUTH_AUDIENCE"),
            public_key_pem: var("AUTH_PUBLIC_KEY_PEM"),
            secret: var("AUTH_SECRET"),
            skip_expiry: matches!(var("AUTH_SKIP_EXPIRY").as_deref(), Some("true" | "1")),
        }
    }

    /// HS256 config with only a secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self { secret: Some(secret.into()), ..Self::default() }
    }

    /// Is any verification key set?
    pub fn is_configured(&self) -> bool {
        self.public_key_pem.is_some() || self.secret.is_some()
    }

    fn algorithm(&self) -> Algorithm {
        if self.public_key_pem.is_some() {
            Algorithm::RS256
        } else {
            Algorithm::HS256
        }
    }
}

/// Claims read from the token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Caller identity.
    pub sub: String,
    /// Expiry (Unix seconds, 0 = none).
    #[serde(default)]
    pub exp: u64,
    /// Issued at.
    #[serde(default)]
    pub iat: u64,
    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,
    /// Audience (string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
}

impl TokenClaims {
    /// Account the caller acts as.
    pub fn account_id(&self) -> AccountId {
        AccountId::from_hex(&self.sub).unwrap_or_else(|_| AccountId::derive(&self.sub))
    }
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Server has no key to verify with.
    #[error("authentication not configured")]
    NotConfigured,
    /// Token is malformed.
    #[error("invalid token format")]
    InvalidFormat,
    /// Signature does not verify.
    #[error("invalid signature")]
    InvalidSignature,
    /// Token expired.
    #[error("token expired")]
    Expired,
    /// Wrong `iss`.
    #[error("invalid issuer")]
    InvalidIssuer,
    /// Wrong `aud`.
    #[error("invalid audience")]
    InvalidAudience,
    /// A required claim is absent or empty.
    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),
    /// Any other decoding failure.
    #[error("decode error: {0}")]
    Decode(String),
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Validate a token and return its claims.
pub fn validate_token(token: &str, config: &AuthConfig) -> Result<TokenClaims, AuthError> {
    let key = match (&config.public_key_pem, &config.secret) {
        (Some(pem), _) => DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::Decode(format!("invalid public key: {}", e)))?,
        (None, Some(secret)) => DecodingKey::from_secret(secret.as_bytes()),
        (None, None) => return Err(AuthError::NotConfigured),
    };

    let mut validation = Validation::new(config.algorithm());
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = !config.skip_expiry;
    if let Some(issuer) = &config.issuer {
        validation.set_issuer(&[issuer]);
    }
    match &config.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }

    let claims = decode::<TokenClaims>(token, &key, &validation)
        .map_err(map_jwt_error)?
        .claims;

    if claims.sub.is_empty() {
        return Err(AuthError::MissingClaim("sub"));
    }
    // The library skips `exp` when it is absent; recheck our own way.
    if !config.skip_expiry && claims.exp > 0 && now_secs() > claims.exp {
        return Err(AuthError::Expired);
    }

    Ok(claims)
}

/// Validate a token and resolve the caller's account.
pub fn authenticate(token: &str, config: &AuthConfig) -> Result<AccountId, AuthError> {
    validate_token(token, config).map(|claims| claims.account_id())
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        ErrorKind::InvalidAudience => AuthError::InvalidAudience,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) => AuthError::InvalidFormat,
        _ => AuthError::Decode(err.to_string()),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    pub(crate) const SECRET: &str = "duel-test-secret-0123456789abcdef";

    pub(crate) fn token_for(sub: &str, exp: u64, secret: &str) -> String {
        let claims = TokenClaims {
            sub: sub.into(),
            exp,
            iat: now_secs(),
            iss: Some("duel-tests".into()),
            aud: Some(serde_json::json!("duel")),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn fresh(sub: &str) -> String {
        token_for(sub, now_secs() + 3600, SECRET)
    }

    #[test]
    fn test_address_subject_is_used_verbatim() {
        let addr = "0x00000000000000000000000000000000000000a1";
        let account = authenticate(&fresh(addr), &AuthConfig::with_secret(SECRET)).unwrap();
        assert_eq!(account.to_string(), addr);
    }

    #[test]
    fn test_opaque_subject_is_derived() {
        let config = AuthConfig::with_secret(SECRET);
        let a = authenticate(&fresh("user123"), &config).unwrap();
        let b = authenticate(&fresh("user123"), &config).unwrap();
        let c = authenticate(&fresh("user456"), &config).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, AccountId::derive("user123"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = token_for("user123", 1, SECRET);
        let result = validate_token(&token, &AuthConfig::with_secret(SECRET));
        assert!(matches!(result, Err(AuthError::Expired)));

        let lenient = AuthConfig { skip_expiry: true, ..AuthConfig::with_secret(SECRET) };
        assert!(validate_token(&token, &lenient).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = token_for("user123", now_secs() + 60, "some-other-secret-entirely!!!");
        let result = validate_token(&token, &AuthConfig::with_secret(SECRET));
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_empty_subject_rejected() {
        let result = validate_token(&fresh(""), &AuthConfig::with_secret(SECRET));
        assert!(matches!(result, Err(AuthError::MissingClaim("sub"))));
    }

    #[test]
    fn test_issuer_enforced() {
        let config = AuthConfig { issuer: Some("elsewhere".into()), ..AuthConfig::with_secret(SECRET) };
        assert!(matches!(validate_token(&fresh("u"), &config), Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn test_unconfigured() {
        let result = validate_token("a.b.c", &AuthConfig::default());
        assert!(matches!(result, Err(AuthError::NotConfigured)));
    }
}
