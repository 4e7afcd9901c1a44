//! OAuth login and token refresh
//!
//! Login runs before any organization is chosen, so users and OAuth
//! accounts are read and written through the raw pool.

use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use fleetcore_common::{
    auth::{IdentityProvider, OAuthIdentity, TokenPair},
    context::{Principal, TenantContext},
    errors::{AppError, Result},
    metrics,
    repository::{
        app_users::{AppUser, AppUserRepository, NewAppUser},
        oauth_accounts::{NewOAuthAccount, OAuthAccountRepository},
    },
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_STATE: &str = "default";

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_superadmin: bool,
}

impl From<&AppUser> for UserInfo {
    fn from(user: &AppUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            is_superadmin: user.is_superadmin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: UserInfo,
}

pub async fn google_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    login(state.google.as_ref(), "google", query)
}

pub async fn line_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    login(state.line.as_ref(), "line", query)
}

pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let provider = configured(state.google.as_ref(), "google")?.clone();
    callback(&state, provider.as_ref(), query).await
}

pub async fn line_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let provider = configured(state.line.as_ref(), "line")?.clone();
    callback(&state, provider.as_ref(), query).await
}

/// Exchange a refresh token for a fresh pair
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>> {
    let user_id = state.jwt.validate_refresh_token(&request.refresh_token)?;
    let ctx = TenantContext::background().with_timeout(state.config.request_timeout());
    let user = match AppUserRepository::new(state.db.clone()).get_by_id(&ctx, &user_id).await {
        Ok(user) => user,
        // a deleted user keeps no session
        Err(AppError::NotFound { .. }) => return Err(AppError::InvalidToken),
        Err(e) => return Err(e),
    };
    let pair = state.jwt.generate_token_pair(&principal(&user))?;
    info!(user_id = %user.id, "Token pair refreshed");
    Ok(Json(pair))
}

fn configured<'a>(
    provider: Option<&'a Arc<dyn IdentityProvider>>,
    name: &str,
) -> Result<&'a Arc<dyn IdentityProvider>> {
    provider.ok_or_else(|| AppError::Configuration {
        message: format!("{} login is not configured", name),
    })
}

fn login(
    provider: Option<&Arc<dyn IdentityProvider>>,
    name: &str,
    query: LoginQuery,
) -> Result<Response> {
    let provider = configured(provider, name)?;
    let state = query
        .state
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STATE.to_string());
    Ok(found(&provider.authorize_url(&state)?))
}

async fn callback(
    state: &AppState,
    provider: &dyn IdentityProvider,
    query: CallbackQuery,
) -> Result<Response> {
    let frontend = state.config.auth.frontend_url.as_deref();
    let name = provider.name();

    if let Some(error) = query.error.filter(|e| !e.is_empty()) {
        warn!(provider = name, error = %error, "Provider rejected the login");
        metrics::record_login(name, false);
        return Ok(error_response(frontend, "login was cancelled"));
    }
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        metrics::record_login(name, false);
        return Ok(error_response(frontend, "missing code parameter"));
    };

    let identity = match provider.authenticate(&code).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(provider = name, error = %e, "OAuth code exchange failed");
            metrics::record_login(name, false);
            return Ok(error_response(frontend, "failed to exchange code"));
        }
    };

    let ctx = TenantContext::background().with_timeout(state.config.request_timeout());
    let user = match sign_in(state, &ctx, identity).await {
        Ok(user) => user,
        Err(e) => {
            warn!(provider = name, error = %e, "Failed to process login");
            metrics::record_login(name, false);
            return Ok(error_response(frontend, "failed to process login"));
        }
    };

    let pair = state.jwt.generate_token_pair(&principal(&user))?;
    metrics::record_login(name, true);
    info!(provider = name, user_id = %user.id, "User logged in");

    let body = AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
        user: UserInfo::from(&user),
    };
    match frontend {
        Some(frontend) => match token_redirect(frontend, &body) {
            Ok(url) => Ok(found(&url)),
            Err(e) => {
                warn!(error = %e, "Invalid frontend URL, answering with JSON");
                Ok((StatusCode::OK, Json(body)).into_response())
            }
        },
        None => Ok((StatusCode::OK, Json(body)).into_response()),
    }
}

/// Find the user behind a provider identity, creating user and account on
/// first login. A new user is removed again when its account cannot be
/// stored.
async fn sign_in(
    state: &AppState,
    ctx: &TenantContext,
    identity: OAuthIdentity,
) -> Result<AppUser> {
    let users = AppUserRepository::new(state.db.clone());
    let accounts = OAuthAccountRepository::new(state.db.clone());
    let token_expires_at = identity.expires_in.map(|secs| Utc::now() + Duration::seconds(secs));

    match accounts
        .get_by_provider_and_provider_user_id(ctx, identity.provider, &identity.provider_user_id)
        .await
    {
        Ok(account) => {
            let user = users.get_by_id(ctx, &account.app_user_id).await?;
            accounts
                .update_tokens(
                    ctx,
                    &account.id,
                    identity.access_token,
                    identity.refresh_token,
                    token_expires_at,
                )
                .await?;
            Ok(user)
        }
        Err(AppError::NotFound { .. }) => {
            let user = users
                .create(
                    ctx,
                    NewAppUser {
                        email: identity.email.clone(),
                        display_name: identity.display_name,
                        avatar_url: identity.avatar_url,
                        is_superadmin: false,
                    },
                )
                .await?;
            let account = NewOAuthAccount {
                app_user_id: user.id.clone(),
                provider: identity.provider.to_string(),
                provider_user_id: identity.provider_user_id,
                email: identity.email,
                access_token: identity.access_token,
                refresh_token: identity.refresh_token,
                token_expires_at,
            };
            if let Err(e) = accounts.create(ctx, account).await {
                if let Err(cleanup) = users.delete(ctx, &user.id).await {
                    warn!(user_id = %user.id, error = %cleanup, "Failed to remove orphaned user");
                }
                return Err(e);
            }
            info!(user_id = %user.id, provider = identity.provider, "User created");
            Ok(user)
        }
        Err(e) => Err(e),
    }
}

/// 302 to `url`
fn found(url: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
}

fn principal(user: &AppUser) -> Principal {
    Principal {
        user_id: user.id.clone(),
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        is_superadmin: user.is_superadmin,
    }
}

/// Frontend URL with the token pair in the fragment, which browsers never
/// send back to a server
fn token_redirect(frontend: &str, body: &AuthResponse) -> Result<String> {
    let expires_in = body.expires_in.to_string();
    with_fragment(
        frontend,
        &[
            ("access_token", body.access_token.as_str()),
            ("refresh_token", body.refresh_token.as_str()),
            ("expires_in", expires_in.as_str()),
        ],
    )
}

fn with_fragment(base: &str, pairs: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| AppError::Configuration {
        message: format!("invalid frontend url: {}", e),
    })?;
    let mut encoded = url.clone();
    encoded.query_pairs_mut().clear().extend_pairs(pairs);
    let fragment = encoded.query().unwrap_or_default().to_string();
    url.set_fragment(Some(&fragment));
    Ok(url.into())
}

fn error_response(frontend: Option<&str>, message: &str) -> Response {
    match frontend.map(|f| with_fragment(f, &[("error", message)])) {
        Some(Ok(url)) => found(&url),
        _ => AppError::Unauthorized {
            message: message.to_string(),
        }
        .into_response(),
    }
}
