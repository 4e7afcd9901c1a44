//! Camera capture files
//!
//! Key `(name, organization_id)`, hard delete. Listed newest capture first:
//! `date DESC, hour DESC, name`.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CamFile {
        name: String => "name",
        organization_id: String => "organization_id",
        date: String => "date",
        hour: String => "hour",
        #[serde(rename = "type")]
        file_type: String => "type",
        cam: String => "cam",
        flickr_id: Option<String> => "flickr_id",
    }
}

pub(crate) const CAM_FILES: Table = Table::new(
    "cam_files",
    "cam file",
    CamFile::COLUMNS,
    &["name", "organization_id"],
)
.order_by(&[
    ("date", Order::Desc),
    ("hour", Order::Desc),
    ("name", Order::Asc),
    ("organization_id", Order::Asc),
]);

#[derive(Clone)]
pub struct CamFileRepository {
    db: Arc<dyn Db>,
}

impl CamFileRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, file: &CamFile) -> Result<CamFile> {
        super::insert(self.db.as_ref(), ctx, &CAM_FILES, file).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        name: &str,
        organization_id: &str,
    ) -> Result<CamFile> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAM_FILES,
            Params::new()
                .bind(name.to_string())
                .bind(organization_id.to_string()),
            || format!("{}/{}", organization_id, name),
        )
        .await
    }

    /// Replace every non-key column
    pub async fn update(&self, ctx: &TenantContext, file: &CamFile) -> Result<CamFile> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAM_FILES,
            file,
            || format!("{}/{}", file.organization_id, file.name),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        name: &str,
        organization_id: &str,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAM_FILES,
            Params::new()
                .bind(name.to_string())
                .bind(organization_id.to_string()),
            Utc::now(),
            || format!("{}/{}", organization_id, name),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<CamFile>> {
        super::list(self.db.as_ref(), ctx, &CAM_FILES, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CamFile>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAM_FILES,
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
    fn test_type_column_serializes_as_type() {
        let file = CamFile {
            name: "t-A".into(),
            organization_id: "org".into(),
            date: "2024-01-01".into(),
            hour: "12".into(),
            file_type: "image".into(),
            cam: "cam1".into(),
            flickr_id: None,
        };
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["type"], "image");
        assert!(json["flickr_id"].is_null());
    }

    #[test]
    fn test_list_order_is_total() {
        assert!(CAM_FILES.list().ends_with(
            "ORDER BY \"date\" DESC, \"hour\" DESC, \"name\", \"organization_id\" LIMIT $1 OFFSET $2"
        ));
    }

    #[test]
    fn test_update_keys_follow_set_columns() {
        assert!(CAM_FILES
            .update(&CAM_FILES.non_key_columns())
            .contains("WHERE \"name\" = $6 AND \"organization_id\" = $7"));
    }
}
