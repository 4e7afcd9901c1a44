//! Uploaded files
//!
//! Live rows carry an empty `deleted`; deletion writes the time there.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct File {
        uuid: String => "uuid",
        organization_id: String => "organization_id",
        filename: String => "filename",
        created: String => "created",
        deleted: String => "deleted",
        #[serde(rename = "type")]
        file_type: String => "type",
        blob: Option<String> => "blob",
    }
}

pub(crate) const FILES: Table = Table::new("files", "file", File::COLUMNS, &["uuid"])
    .live(Live::EmptyText("deleted"))
    .order_by(&[("created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct FileRepository {
    db: Arc<dyn Db>,
}

impl FileRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, file: &File) -> Result<File> {
        let mut file = file.clone();
        if file.uuid.is_empty() {
            file.uuid = new_id();
        }
        file.deleted = String::new();
        super::insert(self.db.as_ref(), ctx, &FILES, &file).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<File> {
        super::get(
            self.db.as_ref(),
            ctx,
            &FILES,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    /// Rewrite a live file; the delete marker is never touched
    pub async fn update(&self, ctx: &TenantContext, file: &File) -> Result<File> {
        super::update_all(self.db.as_ref(), ctx, &FILES, file, || file.uuid.clone()).await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &FILES,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<File>> {
        super::list(self.db.as_ref(), ctx, &FILES, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<File>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &FILES,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_means_empty_marker() {
        assert!(FILES.select_by_key().ends_with("WHERE \"uuid\" = $1 AND \"deleted\" = ''"));
        assert_eq!(
            FILES.delete(),
            "UPDATE \"files\" SET \"deleted\" = $2 WHERE \"uuid\" = $1 AND \"deleted\" = ''"
        );
    }

    #[test]
    fn test_update_leaves_marker_alone() {
        assert_eq!(
            FILES.update(&FILES.writable_columns()),
            "UPDATE \"files\" SET \"organization_id\" = $1, \"filename\" = $2, \"created\" = $3, \
             \"type\" = $4, \"blob\" = $5 WHERE \"uuid\" = $6 AND \"deleted\" = '' \
             RETURNING \"uuid\", \"organization_id\", \"filename\", \"created\", \"deleted\", \"type\", \"blob\""
        );
    }
}
