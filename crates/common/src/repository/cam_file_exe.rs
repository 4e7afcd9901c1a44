//! Per-camera processing stage of a capture file
//!
//! Key `(name, cam, organization_id)`, hard delete.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CamFileExe {
        name: String => "name",
        cam: String => "cam",
        organization_id: String => "organization_id",
        stage: i32 => "stage",
    }
}

pub(crate) const CAM_FILE_EXE: Table = Table::new(
    "cam_file_exe",
    "cam file exe",
    CamFileExe::COLUMNS,
    &["name", "cam", "organization_id"],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("name", Order::Asc),
    ("cam", Order::Asc),
]);

#[derive(Clone)]
pub struct CamFileExeRepository {
    db: Arc<dyn Db>,
}

impl CamFileExeRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, exe: &CamFileExe) -> Result<CamFileExe> {
        super::insert(self.db.as_ref(), ctx, &CAM_FILE_EXE, exe).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        name: &str,
        cam: &str,
        organization_id: &str,
    ) -> Result<CamFileExe> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE,
            Params::new()
                .bind(name.to_string())
                .bind(cam.to_string())
                .bind(organization_id.to_string()),
            || format!("{}/{}/{}", name, cam, organization_id),
        )
        .await
    }

    /// Move the file to the record's stage
    pub async fn update(&self, ctx: &TenantContext, exe: &CamFileExe) -> Result<CamFileExe> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE,
            exe,
            || format!("{}/{}/{}", exe.name, exe.cam, exe.organization_id),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        name: &str,
        cam: &str,
        organization_id: &str,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE,
            Params::new()
                .bind(name.to_string())
                .bind(cam.to_string())
                .bind(organization_id.to_string()),
            Utc::now(),
            || format!("{}/{}/{}", name, cam, organization_id),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<CamFileExe>> {
        super::list(self.db.as_ref(), ctx, &CAM_FILE_EXE, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CamFileExe>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
