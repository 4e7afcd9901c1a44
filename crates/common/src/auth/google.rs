//! Google OAuth2 client

use super::{non_empty, read_json, IdentityProvider, OAuthIdentity};
use crate::config::OAuthProviderConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPE: &str = "openid email profile";

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub verified_email: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

pub struct GoogleOAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(client_id: &str, client_secret: &str, redirect_uri: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            http,
        })
    }

    /// `None` when the client id or secret is not configured
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

    pub async fn exchange_code(&self, code: &str) -> Result<GoogleTokenResponse> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        read_json("google token endpoint", response).await
    }

    pub async fn user_info(&self, access_token: &str) -> Result<GoogleUserInfo> {
        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?;
        read_json("google userinfo", response).await
    }

    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<GoogleTokenResponse> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        read_json("google token endpoint", response).await
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuthClient {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorize_url(&self, state: &str) -> Result<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal {
            message: format!("invalid google authorize url: {}", e),
        })?;
        Ok(url.into())
    }

    async fn authenticate(&self, code: &str) -> Result<OAuthIdentity> {
        let tokens = self.exchange_code(code).await?;
        let info = self.user_info(&tokens.access_token).await?;
        debug!(provider_user_id = %info.id, "google profile fetched");

        let email = non_empty(info.email);
        let display_name = non_empty(info.name)
            .or_else(|| email.clone())
            .unwrap_or_else(|| info.id.clone());
        Ok(OAuthIdentity {
            provider: "google",
            provider_user_id: info.id,
            email,
            display_name,
            avatar_url: non_empty(info.picture),
            access_token: Some(tokens.access_token),
            refresh_token: non_empty(tokens.refresh_token),
            expires_in: tokens.expires_in,
        })
    }
}
