//! Membership of users in organizations
//!
//! Hard delete. Reachable before a tenant is chosen, so callers usually
//! hold the raw pool here.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

record! {
    pub struct UserOrganization {
        id: String => "id",
        user_id: String => "user_id",
        organization_id: String => "organization_id",
        role: String => "role",
        is_default: bool => "is_default",
        created_at: DateTime<Utc> => "created_at",
        updated_at: DateTime<Utc> => "updated_at",
    }
}

pub(crate) const USER_ORGANIZATIONS: Table = Table::new(
    "user_organizations",
    "user organization",
    UserOrganization::COLUMNS,
    &["id"],
)
.updated_at("updated_at")
.order_by(&[("created_at", Order::Asc), ("id", Order::Asc)]);

#[derive(Clone)]
pub struct UserOrganizationRepository {
    db: Arc<dyn Db>,
}

impl UserOrganizationRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        user_id: &str,
        organization_id: &str,
        role: &str,
        is_default: bool,
    ) -> Result<UserOrganization> {
        let now = Utc::now();
        let membership = UserOrganization {
            id: new_id(),
            user_id: user_id.to_string(),
            organization_id: organization_id.to_string(),
            role: role.to_string(),
            is_default,
            created_at: now,
            updated_at: now,
        };
        super::insert(self.db.as_ref(), ctx, &USER_ORGANIZATIONS, &membership).await
    }

    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> Result<UserOrganization> {
        super::get(
            self.db.as_ref(),
            ctx,
            &USER_ORGANIZATIONS,
            Params::new().bind(id.to_string()),
            || id.to_string(),
        )
        .await
    }

    pub async fn get_by_user_and_organization(
        &self,
        ctx: &TenantContext,
        user_id: &str,
        organization_id: &str,
    ) -> Result<UserOrganization> {
        super::find(
            self.db.as_ref(),
            ctx,
            &USER_ORGANIZATIONS,
            &["user_id", "organization_id"],
            Params::new()
                .bind(user_id.to_string())
                .bind(organization_id.to_string()),
            || format!("{}/{}", user_id, organization_id),
        )
        .await
    }

    pub async fn list_by_user_id(
        &self,
        ctx: &TenantContext,
        user_id: &str,
        page: Page,
    ) -> Result<Vec<UserOrganization>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &USER_ORGANIZATIONS,
            &["user_id"],
            Params::new().bind(user_id.to_string()),
            page,
        )
        .await
    }

    pub async fn list_by_organization_id(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<UserOrganization>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &USER_ORGANIZATIONS,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        id: &str,
        role: &str,
        is_default: bool,
    ) -> Result<UserOrganization> {
        let mut current = self.get_by_id(ctx, id).await?;
        current.role = role.to_string();
        current.is_default = is_default;
        super::update(
            self.db.as_ref(),
            ctx,
            &USER_ORGANIZATIONS,
            &["role", "is_default"],
            &current,
            || id.to_string(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &USER_ORGANIZATIONS,
            Params::new().bind(id.to_string()),
            Utc::now(),
            || id.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<UserOrganization>> {
        super::list(self.db.as_ref(), ctx, &USER_ORGANIZATIONS, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_binds_mutable_then_key() {
        assert_eq!(
            USER_ORGANIZATIONS.update(&["role", "is_default"]),
            "UPDATE \"user_organizations\" SET \"role\" = $1, \"is_default\" = $2, \
             \"updated_at\" = now() WHERE \"id\" = $3 RETURNING \"id\", \"user_id\", \
             \"organization_id\", \"role\", \"is_default\", \"created_at\", \"updated_at\""
        );
    }

    #[test]
    fn test_hard_delete() {
        assert_eq!(
            USER_ORGANIZATIONS.delete(),
            "DELETE FROM \"user_organizations\" WHERE \"id\" = $1"
        );
    }
}
