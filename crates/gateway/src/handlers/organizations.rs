//! Organization membership and creation
//!
//! Both routes run before the caller has picked a tenant.

use super::{validate, PageQuery};
use crate::middleware::Authenticated;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use fleetcore_common::{
    errors::Result,
    repository::{
        organizations::{Organization, OrganizationRepository},
        user_organizations::{UserOrganization, UserOrganizationRepository},
    },
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(min = 1, max = 100), custom(function = "validate_slug"))]
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrganizationResponse {
    pub organization: Organization,
    pub membership: UserOrganization,
}

/// Lowercase ASCII letters, digits and inner hyphens
fn validate_slug(slug: &str) -> std::result::Result<(), ValidationError> {
    let allowed = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if allowed && !slug.starts_with('-') && !slug.ends_with('-') {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

/// Organizations the caller belongs to
pub async fn list_memberships(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<UserOrganization>>> {
    let memberships = UserOrganizationRepository::new(state.db.clone())
        .list_by_user_id(&auth.ctx, &auth.principal.user_id, query.page())
        .await?;
    Ok(Json(memberships))
}

/// Create an organization owned by the caller
pub async fn create_organization(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<CreateOrganizationResponse>)> {
    validate(&request)?;

    // the RLS pool binds the new organization inside the transaction
    let (organization, membership) = OrganizationRepository::new(state.rls.clone())
        .create_with_owner(&auth.ctx, &request.name, &request.slug, &auth.principal.user_id)
        .await?;

    tracing::info!(
        organization_id = %organization.id,
        user_id = %auth.principal.user_id,
        "Organization created via API"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateOrganizationResponse {
            organization,
            membership,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_rules() {
        assert!(validate_slug("acme-logistics-2").is_ok());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("-acme").is_err());
        assert!(validate_slug("acme_co").is_err());
    }

    #[test]
    fn test_request_validation() {
        let ok = CreateOrganizationRequest {
            name: "Acme".to_string(),
            slug: "acme".to_string(),
        };
        assert!(validate(&ok).is_ok());

        let empty_name = CreateOrganizationRequest {
            name: String::new(),
            slug: "acme".to_string(),
        };
        assert!(validate(&empty_name).is_err());

        let bad_slug = CreateOrganizationRequest {
            name: "Acme".to_string(),
            slug: "Acme Co".to_string(),
        };
        assert!(validate(&bad_slug).is_err());
    }
}
