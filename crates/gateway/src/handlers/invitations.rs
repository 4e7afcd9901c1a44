//! Invitation handlers

use super::{validate, PageQuery};
use crate::middleware::{Authenticated, Tenant};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use fleetcore_common::{
    errors::{AppError, Result},
    repository::{
        invitations::{Invitation, InvitationRepository, InvitationStatus},
        user_organizations::{UserOrganization, UserOrganizationRepository},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    #[validate(email)]
    pub email: String,

    #[serde(default)]
    #[validate(length(max = 50))]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInvitationRequest {
    #[validate(length(min = 1))]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptInvitationResponse {
    pub invitation: Invitation,
    pub membership: UserOrganization,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListInvitationsQuery {
    #[serde(default)]
    pub status: Option<InvitationStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

/// Invite an email address into the caller's organization
pub async fn create_invitation(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(request): Json<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<Invitation>)> {
    validate(&request)?;

    let invitation = InvitationRepository::new(state.rls.clone())
        .create(
            &tenant.ctx,
            &tenant.organization_id,
            &request.email,
            request.role.as_deref(),
            &tenant.principal.user_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

pub async fn list_invitations(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<ListInvitationsQuery>,
) -> Result<Json<Vec<Invitation>>> {
    let page = PageQuery {
        limit: query.limit,
        offset: query.offset,
    }
    .page();
    let invitations = InvitationRepository::new(state.rls.clone())
        .list(&tenant.ctx, &tenant.organization_id, query.status, page)
        .await?;
    Ok(Json(invitations))
}

/// Accept an invitation by token and join its organization
///
/// The invitee has no membership yet, so the lookup runs without a tenant;
/// the membership row is then written under the invitation's organization.
pub async fn accept_invitation(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<AcceptInvitationRequest>,
) -> Result<Json<AcceptInvitationResponse>> {
    validate(&request)?;

    let invitations = InvitationRepository::new(state.db.clone());
    let memberships = UserOrganizationRepository::new(state.rls.clone());
    let user_id = auth.principal.user_id.as_str();

    let pending = invitations.get_by_token(&auth.ctx, &request.token).await?;
    let org_ctx = auth.ctx.with_organization_id(pending.organization_id.clone());
    match memberships
        .get_by_user_and_organization(&org_ctx, user_id, &pending.organization_id)
        .await
    {
        Ok(_) => {
            return Err(AppError::InvalidInput {
                message: "already a member of this organization".to_string(),
                constraint: None,
            })
        }
        Err(AppError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    let invitation = invitations
        .accept_by_token(&auth.ctx, &request.token, user_id)
        .await?;
    let membership = memberships
        .create(
            &org_ctx,
            user_id,
            &invitation.organization_id,
            &invitation.role,
            false,
        )
        .await?;

    tracing::info!(
        invitation_id = %invitation.id,
        organization_id = %invitation.organization_id,
        user_id = %user_id,
        "Invitation accepted via API"
    );
    Ok(Json(AcceptInvitationResponse {
        invitation,
        membership,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let ok: CreateInvitationRequest =
            serde_json::from_str(r#"{"email":"bob@example.com"}"#).unwrap();
        assert!(ok.role.is_none());
        assert!(validate(&ok).is_ok());

        let bad: CreateInvitationRequest =
            serde_json::from_str(r#"{"email":"not-an-email","role":"admin"}"#).unwrap();
        assert!(matches!(validate(&bad), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_accept_requires_token() {
        let empty = AcceptInvitationRequest {
            token: String::new(),
        };
        assert!(validate(&empty).is_err());
    }
}
