//! Organizations: the tenant root table
//!
//! Soft-deleted via `deleted_at`. Listed newest first, `id` as tiebreaker.

use super::user_organizations::{UserOrganization, USER_ORGANIZATIONS};
use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

record! {
    pub struct Organization {
        id: String => "id",
        name: String => "name",
        slug: String => "slug",
        created_at: DateTime<Utc> => "created_at",
        updated_at: DateTime<Utc> => "updated_at",
        deleted_at: Option<DateTime<Utc>> => "deleted_at",
    }
}

pub(crate) const ORGANIZATIONS: Table = Table::new(
    "organizations",
    "organization",
    Organization::COLUMNS,
    &["id"],
)
.live(Live::DeletedAt)
.updated_at("updated_at")
.order_by(&[("created_at", Order::Desc), ("id", Order::Asc)]);

#[derive(Clone)]
pub struct OrganizationRepository {
    db: Arc<dyn Db>,
}

impl OrganizationRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    fn build(name: &str, slug: &str) -> Organization {
        let now = Utc::now();
        Organization {
            id: new_id(),
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        name: &str,
        slug: &str,
    ) -> Result<Organization> {
        super::insert(self.db.as_ref(), ctx, &ORGANIZATIONS, &Self::build(name, slug)).await
    }

    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> Result<Organization> {
        super::get(
            self.db.as_ref(),
            ctx,
            &ORGANIZATIONS,
            Params::new().bind(id.to_string()),
            || id.to_string(),
        )
        .await
    }

    pub async fn get_by_slug(&self, ctx: &TenantContext, slug: &str) -> Result<Organization> {
        super::find(
            self.db.as_ref(),
            ctx,
            &ORGANIZATIONS,
            &["slug"],
            Params::new().bind(slug.to_string()),
            || format!("slug {}", slug),
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        id: &str,
        name: &str,
        slug: &str,
    ) -> Result<Organization> {
        let mut org = Self::build(name, slug);
        org.id = id.to_string();
        super::update(
            self.db.as_ref(),
            ctx,
            &ORGANIZATIONS,
            &["name", "slug"],
            &org,
            || id.to_string(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &ORGANIZATIONS,
            Params::new().bind(id.to_string()),
            Utc::now(),
            || id.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Organization>> {
        super::list(self.db.as_ref(), ctx, &ORGANIZATIONS, page).await
    }

    /// Create an organization and make `user_id` its default owner, in one
    /// transaction
    pub async fn create_with_owner(
        &self,
        ctx: &TenantContext,
        name: &str,
        slug: &str,
        user_id: &str,
    ) -> Result<(Organization, UserOrganization)> {
        let org = Self::build(name, slug);
        let membership = UserOrganization {
            id: new_id(),
            user_id: user_id.to_string(),
            organization_id: org.id.clone(),
            role: "owner".to_string(),
            is_default: true,
            created_at: org.created_at,
            updated_at: org.created_at,
        };

        // the new tenant is the one being written
        let ctx = ctx.with_organization_id(org.id.clone());
        let mut tx = self.db.begin(&ctx).await?;

        let args = org
            .bind_columns(ORGANIZATIONS.columns, Params::new())
            .into_arguments()?;
        let org: Organization = sqlx::query_as_with(&ORGANIZATIONS.insert(), args)
            .fetch_one(&mut *tx)
            .await?;

        let args = membership
            .bind_columns(USER_ORGANIZATIONS.columns, Params::new())
            .into_arguments()?;
        let membership: UserOrganization = sqlx::query_as_with(&USER_ORGANIZATIONS.insert(), args)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(organization_id = %org.id, user_id = %user_id, "Organization created");
        Ok((org, membership))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns() {
        assert_eq!(
            ORGANIZATIONS.columns,
            &["id", "name", "slug", "created_at", "updated_at", "deleted_at"]
        );
    }

    #[test]
    fn test_statements_hide_deleted() {
        assert!(ORGANIZATIONS.select_by_key().ends_with("\"deleted_at\" IS NULL"));
        assert!(ORGANIZATIONS.list().contains(
            "WHERE \"deleted_at\" IS NULL ORDER BY \"created_at\" DESC, \"id\""
        ));
        assert!(ORGANIZATIONS
            .update(&["name", "slug"])
            .contains("WHERE \"id\" = $3 AND \"deleted_at\" IS NULL"));
    }

    #[test]
    fn test_build_stamps_both_times() {
        let org = OrganizationRepository::build("Acme", "acme");
        assert_eq!(org.created_at, org.updated_at);
        assert!(org.deleted_at.is_none());
        assert_eq!(org.id.len(), 36);
    }
}
