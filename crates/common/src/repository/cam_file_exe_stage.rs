//! Names of the processing stages, numbered per organization

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CamFileExeStage {
        stage: i32 => "stage",
        organization_id: String => "organization_id",
        name: String => "name",
    }
}

pub(crate) const CAM_FILE_EXE_STAGES: Table = Table::new(
    "cam_file_exe_stage",
    "cam file exe stage",
    CamFileExeStage::COLUMNS,
    &["stage", "organization_id"],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("stage", Order::Asc),
]);

#[derive(Clone)]
pub struct CamFileExeStageRepository {
    db: Arc<dyn Db>,
}

impl CamFileExeStageRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        entry: &CamFileExeStage,
    ) -> Result<CamFileExeStage> {
        super::insert(self.db.as_ref(), ctx, &CAM_FILE_EXE_STAGES, entry).await
    }

    pub async fn get(
        &self,
        ctx: &TenantContext,
        stage: i32,
        organization_id: &str,
    ) -> Result<CamFileExeStage> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE_STAGES,
            Params::new()
                .bind(stage)
                .bind(organization_id.to_string()),
            || format!("{}/{}", stage, organization_id),
        )
        .await
    }

    pub async fn update(
        &self,
        ctx: &TenantContext,
        entry: &CamFileExeStage,
    ) -> Result<CamFileExeStage> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE_STAGES,
            entry,
            || format!("{}/{}", entry.stage, entry.organization_id),
        )
        .await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        stage: i32,
        organization_id: &str,
    ) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE_STAGES,
            Params::new()
                .bind(stage)
                .bind(organization_id.to_string()),
            Utc::now(),
            || format!("{}/{}", stage, organization_id),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<CamFileExeStage>> {
        super::list(self.db.as_ref(), ctx, &CAM_FILE_EXE_STAGES, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CamFileExeStage>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAM_FILE_EXE_STAGES,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
