//! Authentication utilities
//!
//! Provides:
//! - HS256 access and refresh tokens
//! - Bearer header parsing
//! - OAuth identity providers (Google, LINE) behind one trait

use crate::config::AuthConfig;
use crate::context::Principal;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub mod google;
pub mod line;

pub use google::GoogleOAuthClient;
pub use line::LineOAuthClient;

/// Access token claims
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: String,
    pub is_superadmin: bool,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal {
            user_id: claims.user_id,
            email: claims.email,
            display_name: claims.display_name,
            is_superadmin: claims.is_superadmin,
        }
    }
}

/// Refresh tokens carry only the registered claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires
    pub expires_in: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: &str, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            access_ttl: Duration::seconds(access_ttl_secs as i64),
            refresh_ttl: Duration::seconds(refresh_ttl_secs as i64),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "auth.jwt_secret is required".to_string(),
            })?;
        Ok(Self::new(
            secret,
            &config.issuer,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        ))
    }

    pub fn generate_access_token(&self, principal: &Principal) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user_id: principal.user_id.clone(),
            email: principal.email.clone(),
            display_name: principal.display_name.clone(),
            is_superadmin: principal.is_superadmin,
            iss: self.issuer.clone(),
            sub: principal.user_id.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn generate_refresh_token(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let claims = RefreshClaims {
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        self.sign(&claims)
    }

    pub fn generate_token_pair(&self, principal: &Principal) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_access_token(principal)?,
            refresh_token: self.generate_refresh_token(&principal.user_id)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        self.verify(token)
    }

    /// Validate a refresh token and return the user id it was issued to
    pub fn validate_refresh_token(&self, token: &str) -> Result<String> {
        self.verify::<RefreshClaims>(token).map(|claims| claims.sub)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to generate token: {}", e),
            }
        })
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.validate_nbf = true;
        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Identity returned by a provider after a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthIdentity {
    pub provider: &'static str,
    pub provider_user_id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// An OAuth2 authorization-code provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name stored in `oauth_accounts.provider`
    fn name(&self) -> &'static str;

    /// URL the browser is redirected to
    fn authorize_url(&self, state: &str) -> Result<String>;

    /// Exchange an authorization code and fetch the caller's profile
    async fn authenticate(&self, code: &str) -> Result<OAuthIdentity>;
}

/// Read a provider response, turning non-2xx into `Upstream`
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Upstream {
            message: format!("{} returned {}: {}", provider, status, body),
        });
    }
    Ok(response.json::<T>().await?)
}

/// Non-empty string or `None`
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test_secret", "postgres-prod", 3600, 7 * 24 * 3600)
    }

    fn principal() -> Principal {
        Principal {
            user_id: "u-1".to_string(),
            email: Some("a@example.com".to_string()),
            display_name: "Alice".to_string(),
            is_superadmin: false,
        }
    }

    #[test]
    fn test_access_token_roundtrip() {
        let token = manager().generate_access_token(&principal()).unwrap();
        let claims = manager().validate_access_token(&token).unwrap();
        assert_eq!(claims.user_id, "u-1");
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.iss, "postgres-prod");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(Principal::from(claims), principal());
    }

    #[test]
    fn test_token_pair() {
        let pair = manager().generate_token_pair(&principal()).unwrap();
        assert_eq!(pair.expires_in, 3600);
        assert_eq!(manager().validate_refresh_token(&pair.refresh_token).unwrap(), "u-1");
        // a refresh token lacks the profile claims
        assert!(matches!(
            manager().validate_access_token(&pair.refresh_token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            iss: "postgres-prod".to_string(),
            sub: "u-1".to_string(),
            iat: now - 7200,
            nbf: now - 7200,
            exp: now - 3600,
        };
        let token = manager().sign(&claims).unwrap();
        assert!(matches!(
            manager().validate_refresh_token(&token),
            Err(AppError::ExpiredToken)
        ));
    }

    #[test]
    fn test_wrong_secret_or_issuer() {
        let token = manager().generate_access_token(&principal()).unwrap();
        let other = JwtManager::new("other_secret", "postgres-prod", 3600, 3600);
        assert!(matches!(
            other.validate_access_token(&token),
            Err(AppError::InvalidToken)
        ));
        let other = JwtManager::new("test_secret", "someone-else", 3600, 3600);
        assert!(matches!(
            other.validate_access_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_from_config_requires_secret() {
        let config = AuthConfig::default();
        assert!(matches!(
            JwtManager::from_config(&config),
            Err(AppError::Configuration { .. })
        ));
    }
}
