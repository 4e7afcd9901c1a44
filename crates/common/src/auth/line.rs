//! LINE Login client
//!
//! The profile endpoint carries no email; it is read from the verified ID
//! token when the channel has the email permission.

use super::{non_empty, read_json, IdentityProvider, OAuthIdentity};
use crate::config::OAuthProviderConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const AUTHORIZE_URL: &str = "https://access.line.me/oauth2/v2.1/authorize";
const TOKEN_URL: &str = "https://api.line.me/oauth2/v2.1/token";
const PROFILE_URL: &str = "https://api.line.me/v2/profile";
const VERIFY_URL: &str = "https://api.line.me/oauth2/v2.1/verify";
const SCOPE: &str = "profile openid email";

#[derive(Debug, Clone, Deserialize)]
pub struct LineTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineProfile {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

/// Payload returned by the ID token verify endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LineIdToken {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

pub struct LineOAuthClient {
    channel_id: String,
    channel_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
}

impl LineOAuthClient {
    pub fn new(channel_id: &str, channel_secret: &str, redirect_uri: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            channel_id: channel_id.to_string(),
            channel_secret: channel_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http,
        })
    }

    pub fn from_config(config: &OAuthProviderConfig) -> Result<Option<Self>> {
        match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Ok(Some(Self::new(
                id,
                secret,
                config.redirect_uri.as_deref().unwrap_or_default(),
            )?)),
            _ => Ok(None),
        }
    }

    pub async fn exchange_code(&self, code: &str) -> Result<LineTokenResponse> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.channel_id.as_str()),
                ("client_secret", self.channel_secret.as_str()),
            ])
            .send()
            .await?;
        read_json("line token endpoint", response).await
    }

    pub async fn profile(&self, access_token: &str) -> Result<LineProfile> {
        let response = self
            .http
            .get(PROFILE_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        read_json("line profile", response).await
    }

    pub async fn verify_id_token(&self, id_token: &str) -> Result<LineIdToken> {
        let response = self
            .http
            .post(VERIFY_URL)
            .form(&[("id_token", id_token), ("client_id", self.channel_id.as_str())])
            .send()
            .await?;
        read_json("line verify", response).await
    }

    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<LineTokenResponse> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.channel_id.as_str()),
                ("client_secret", self.channel_secret.as_str()),
            ])
            .send()
            .await?;
        read_json("line token endpoint", response).await
    }
}

#[async_trait]
impl IdentityProvider for LineOAuthClient {
    fn name(&self) -> &'static str {
        "line"
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("client_id", self.channel_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPE),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal {
            message: format!("invalid line authorize url: {}", e),
        })?;
        Ok(url.into())
    }

    async fn authenticate(&self, code: &str) -> Result<OAuthIdentity> {
        let tokens = self.exchange_code(code).await?;
        let profile = self.profile(&tokens.access_token).await?;
        debug!(provider_user_id = %profile.user_id, "line profile fetched");

        // email is optional; a failed verify only loses the email
        let email = match tokens.id_token.as_deref() {
            Some(id_token) => match self.verify_id_token(id_token).await {
                Ok(payload) => non_empty(payload.email),
                Err(e) => {
                    warn!(error = %e, "line id token verification failed");
                    None
                }
            },
            None => None,
        };

        Ok(OAuthIdentity {
            provider: "line",
            provider_user_id: profile.user_id,
            email,
            display_name: profile.display_name,
            avatar_url: non_empty(profile.picture_url),
            access_token: Some(tokens.access_token),
            refresh_token: non_empty(tokens.refresh_token),
            expires_in: tokens.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url() {
        let client = LineOAuthClient::new("chan", "secret", "https://app.example/line").unwrap();
        let url = Url::parse(&client.authorize_url("default").unwrap()).unwrap();
        assert_eq!(url.host_str(), Some("access.line.me"));
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("scope".into(), "profile openid email".into())));
        assert!(query.contains(&("client_id".into(), "chan".into())));
        assert!(query.contains(&("state".into(), "default".into())));
    }

    #[test]
    fn test_profile_is_camel_case() {
        let profile: LineProfile =
            serde_json::from_str(r#"{"userId":"U1","displayName":"Bob","pictureUrl":"https://p"}"#)
                .unwrap();
        assert_eq!(profile.user_id, "U1");
        assert_eq!(profile.display_name, "Bob");
        assert_eq!(profile.picture_url.as_deref(), Some("https://p"));
    }
}
