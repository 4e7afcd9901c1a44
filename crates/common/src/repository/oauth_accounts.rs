//! Provider accounts linked to application users
//!
//! Hard delete. Looked up by `(provider, provider_user_id)` during login.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{ident, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

record! {
    pub struct OAuthAccount {
        id: String => "id",
        app_user_id: String => "app_user_id",
        provider: String => "provider",
        provider_user_id: String => "provider_user_id",
        email: Option<String> => "email",
        #[serde(skip_serializing)]
        access_token: Option<String> => "access_token",
        #[serde(skip_serializing)]
        refresh_token: Option<String> => "refresh_token",
        token_expires_at: Option<DateTime<Utc>> => "token_expires_at",
        created_at: DateTime<Utc> => "created_at",
        updated_at: DateTime<Utc> => "updated_at",
    }
}

/// Provider-side identity and tokens
#[derive(Debug, Clone, Default)]
pub struct NewOAuthAccount {
    pub app_user_id: String,
    pub provider: String,
    pub provider_user_id: String,
    pub email: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

pub(crate) const OAUTH_ACCOUNTS: Table = Table::new(
    "oauth_accounts",
    "oauth account",
    OAuthAccount::COLUMNS,
    &["id"],
)
.updated_at("updated_at")
.order_by(&[("created_at", Order::Asc), ("id", Order::Asc)]);

#[derive(Clone)]
pub struct OAuthAccountRepository {
    db: Arc<dyn Db>,
}

impl OAuthAccountRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        account: NewOAuthAccount,
    ) -> Result<OAuthAccount> {
        let now = Utc::now();
        let account = OAuthAccount {
            id: new_id(),
            app_user_id: account.app_user_id,
            provider: account.provider,
            provider_user_id: account.provider_user_id,
            email: account.email,
            access_token: account.access_token,
            refresh_token: account.refresh_token,
            token_expires_at: account.token_expires_at,
            created_at: now,
            updated_at: now,
        };
        super::insert(self.db.as_ref(), ctx, &OAUTH_ACCOUNTS, &account).await
    }

    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> Result<OAuthAccount> {
        super::get(
            self.db.as_ref(),
            ctx,
            &OAUTH_ACCOUNTS,
            Params::new().bind(id.to_string()),
            || id.to_string(),
        )
        .await
    }

    pub async fn get_by_provider_and_provider_user_id(
        &self,
        ctx: &TenantContext,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<OAuthAccount> {
        super::find(
            self.db.as_ref(),
            ctx,
            &OAUTH_ACCOUNTS,
            &["provider", "provider_user_id"],
            Params::new()
                .bind(provider.to_string())
                .bind(provider_user_id.to_string()),
            || format!("{}:{}", provider, provider_user_id),
        )
        .await
    }

    pub async fn list_by_app_user_id(
        &self,
        ctx: &TenantContext,
        app_user_id: &str,
    ) -> Result<Vec<OAuthAccount>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &OAUTH_ACCOUNTS,
            &["app_user_id"],
            Params::new().bind(app_user_id.to_string()),
            Page::new(super::MAX_LIMIT, 0),
        )
        .await
    }

    /// Store refreshed provider tokens
    pub async fn update_tokens(
        &self,
        ctx: &TenantContext,
        id: &str,
        access_token: Option<String>,
        refresh_token: Option<String>,
        token_expires_at: Option<DateTime<Utc>>,
    ) -> Result<OAuthAccount> {
        let mut account = self.get_by_id(ctx, id).await?;
        account.access_token = access_token;
        account.refresh_token = refresh_token;
        account.token_expires_at = token_expires_at;
        super::update(
            self.db.as_ref(),
            ctx,
            &OAUTH_ACCOUNTS,
            &["access_token", "refresh_token", "token_expires_at"],
            &account,
            || id.to_string(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &OAUTH_ACCOUNTS,
            Params::new().bind(id.to_string()),
            Utc::now(),
            || id.to_string(),
        )
        .await
    }

    /// Remove every account of a user; returns how many went
    pub async fn delete_by_app_user_id(
        &self,
        ctx: &TenantContext,
        app_user_id: &str,
    ) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            ident(OAUTH_ACCOUNTS.name),
            ident("app_user_id")
        );
        let tag = self
            .db
            .exec(ctx, &sql, Params::new().bind(app_user_id.to_string()))
            .await?;
        Ok(tag.rows_affected())
    }

    /// Find the account for a provider identity and refresh its tokens, or
    /// link a new one to `app_user_id`
    pub async fn upsert(
        &self,
        ctx: &TenantContext,
        account: NewOAuthAccount,
    ) -> Result<OAuthAccount> {
        match self
            .get_by_provider_and_provider_user_id(ctx, &account.provider, &account.provider_user_id)
            .await
        {
            Ok(existing) => {
                self.update_tokens(
                    ctx,
                    &existing.id,
                    account.access_token,
                    account.refresh_token,
                    account.token_expires_at,
                )
                .await
            }
            Err(AppError::NotFound { .. }) => self.create(ctx, account).await,
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_not_serialized() {
        let now = Utc::now();
        let account = OAuthAccount {
            id: "a".into(),
            app_user_id: "u".into(),
            provider: "google".into(),
            provider_user_id: "123".into(),
            email: None,
            access_token: Some("secret".into()),
            refresh_token: Some("secret".into()),
            token_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_provider_lookup_sql() {
        assert!(OAUTH_ACCOUNTS
            .select_where(&["provider", "provider_user_id"])
            .ends_with("WHERE \"provider\" = $1 AND \"provider_user_id\" = $2"));
    }
}
