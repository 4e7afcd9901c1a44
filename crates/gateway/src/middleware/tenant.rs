//! Request-boundary context extraction
//!
//! Every handler receives its `TenantContext` through one of two extractors:
//! [`Authenticated`] for pre-tenant routes (login follow-ups, membership
//! listing) and [`Tenant`] for routes that act inside one organization and
//! therefore require the organization header (`x-organization-id` by
//! default).
//!
//! Both carry a drop guard over the context's cancellation token, so any
//! database work still running for the request is cancelled once the
//! handler future is dropped.

use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use fleetcore_common::{
    auth::{bearer_token, JwtManager},
    context::{Principal, TenantContext},
    errors::AppError,
};
use std::time::Duration;
use tokio_util::sync::DropGuard;

/// Authenticated caller without a tenant
pub struct Authenticated {
    pub ctx: TenantContext,
    pub principal: Principal,
    _cancel_on_drop: DropGuard,
}

/// Authenticated caller acting for one organization
pub struct Tenant {
    pub ctx: TenantContext,
    pub principal: Principal,
    pub organization_id: String,
    _cancel_on_drop: DropGuard,
}

/// Build the request context from the headers
///
/// The bearer token is always required. When `organization_header` is given
/// that header must be present and non-empty.
pub fn request_context(
    headers: &HeaderMap,
    jwt: &JwtManager,
    timeout: Duration,
    organization_header: Option<&str>,
) -> Result<TenantContext, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized {
            message: "missing bearer token".to_string(),
        })?;
    let principal: Principal = jwt.validate_access_token(token)?.into();

    let ctx = TenantContext::background()
        .with_timeout(timeout)
        .with_principal(principal);
    let Some(header) = organization_header else {
        return Ok(ctx);
    };

    let organization_id = headers
        .get(header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::InvalidInput {
            message: format!("{} header is required", header),
            constraint: None,
        })?;
    Ok(ctx.with_organization_id(organization_id))
}

fn principal_of(ctx: &TenantContext) -> Result<Principal, AppError> {
    ctx.principal().cloned().ok_or_else(|| AppError::Unauthorized {
        message: "no principal on request context".to_string(),
    })
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = request_context(
            &parts.headers,
            &state.jwt,
            state.config.request_timeout(),
            None,
        )?;
        let principal = principal_of(&ctx)?;
        let guard = ctx.cancellation_token().clone().drop_guard();
        Ok(Self {
            ctx,
            principal,
            _cancel_on_drop: guard,
        })
    }
}

impl FromRequestParts<AppState> for Tenant {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = request_context(
            &parts.headers,
            &state.jwt,
            state.config.request_timeout(),
            Some(state.config.auth.organization_header.as_str()),
        )?;
        let principal = principal_of(&ctx)?;
        let organization_id = ctx.organization_id().unwrap_or_default().to_string();
        let guard = ctx.cancellation_token().clone().drop_guard();
        tracing::debug!(organization_id = %organization_id, "Tenant context bound to request");
        Ok(Self {
            ctx,
            principal,
            organization_id,
            _cancel_on_drop: guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const HEADER: &str = "x-organization-id";

    fn jwt() -> JwtManager {
        JwtManager::new("gateway_secret", "postgres-prod", 3600, 3600)
    }

    fn bearer(jwt: &JwtManager) -> HeaderValue {
        let principal = Principal {
            user_id: "u-1".to_string(),
            email: None,
            display_name: "Alice".to_string(),
            is_superadmin: false,
        };
        let token = jwt.generate_access_token(&principal).unwrap();
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let headers = HeaderMap::new();
        let result = request_context(&headers, &jwt(), Duration::from_secs(30), None);
        assert!(matches!(result, Err(AppError::Unauthorized { .. })));
    }

    #[test]
    fn test_bad_token_is_invalid() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));
        let result = request_context(&headers, &jwt(), Duration::from_secs(30), None);
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_pre_tenant_context() {
        let jwt = jwt();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer(&jwt));
        let ctx = request_context(&headers, &jwt, Duration::from_secs(30), None).unwrap();
        assert_eq!(ctx.principal().map(|p| p.user_id.as_str()), Some("u-1"));
        assert!(ctx.organization_id().is_none());
        assert!(ctx.deadline().is_some());
    }

    #[test]
    fn test_tenant_header_required() {
        let jwt = jwt();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer(&jwt));
        let missing = request_context(&headers, &jwt, Duration::from_secs(30), Some(HEADER));
        assert!(matches!(missing, Err(AppError::InvalidInput { .. })));

        headers.insert(HEADER, HeaderValue::from_static("  "));
        let empty = request_context(&headers, &jwt, Duration::from_secs(30), Some(HEADER));
        assert!(matches!(empty, Err(AppError::InvalidInput { .. })));

        headers.insert(HEADER, HeaderValue::from_static("org-1"));
        let ctx = request_context(&headers, &jwt, Duration::from_secs(30), Some(HEADER)).unwrap();
        assert_eq!(ctx.organization_id(), Some("org-1"));
    }

    #[test]
    fn test_drop_guard_cancels() {
        let ctx = TenantContext::background();
        let guard = ctx.cancellation_token().clone().drop_guard();
        assert!(!ctx.is_cancelled());
        drop(guard);
        assert!(ctx.is_cancelled());
    }
}
