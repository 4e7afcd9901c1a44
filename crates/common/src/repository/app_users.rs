//! Application users
//!
//! Created at first OAuth login, before any tenant exists, so this
//! repository is normally wired to the raw pool. Soft-deleted via
//! `deleted_at`.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

record! {
    pub struct AppUser {
        id: String => "id",
        email: Option<String> => "email",
        display_name: String => "display_name",
        avatar_url: Option<String> => "avatar_url",
        is_superadmin: bool => "is_superadmin",
        created_at: DateTime<Utc> => "created_at",
        updated_at: DateTime<Utc> => "updated_at",
        deleted_at: Option<DateTime<Utc>> => "deleted_at",
    }
}

/// Fields a caller supplies for a new user
#[derive(Debug, Clone, Default)]
pub struct NewAppUser {
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub is_superadmin: bool,
}

pub(crate) const APP_USERS: Table = Table::new("app_users", "app user", AppUser::COLUMNS, &["id"])
    .live(Live::DeletedAt)
    .updated_at("updated_at")
    .order_by(&[("created_at", Order::Desc), ("id", Order::Asc)]);

#[derive(Clone)]
pub struct AppUserRepository {
    db: Arc<dyn Db>,
}

impl AppUserRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, user: NewAppUser) -> Result<AppUser> {
        let now = Utc::now();
        let user = AppUser {
            id: new_id(),
            email: user.email,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            is_superadmin: user.is_superadmin,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        super::insert(self.db.as_ref(), ctx, &APP_USERS, &user).await
    }

    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> Result<AppUser> {
        super::get(
            self.db.as_ref(),
            ctx,
            &APP_USERS,
            Params::new().bind(id.to_string()),
            || id.to_string(),
        )
        .await
    }

    pub async fn get_by_email(&self, ctx: &TenantContext, email: &str) -> Result<AppUser> {
        super::find(
            self.db.as_ref(),
            ctx,
            &APP_USERS,
            &["email"],
            Params::new().bind(email.to_string()),
            || format!("email {}", email),
        )
        .await
    }

    /// Replace the profile fields of a live user
    pub async fn update(&self, ctx: &TenantContext, user: &AppUser) -> Result<AppUser> {
        super::update(
            self.db.as_ref(),
            ctx,
            &APP_USERS,
            &["email", "display_name", "avatar_url", "is_superadmin"],
            user,
            || user.id.clone(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &APP_USERS,
            Params::new().bind(id.to_string()),
            Utc::now(),
            || id.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<AppUser>> {
        super::list(self.db.as_ref(), ctx, &APP_USERS, page).await
    }
}
