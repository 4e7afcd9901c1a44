//! Camera file listing

use super::PageQuery;
use crate::middleware::Tenant;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use fleetcore_common::{
    errors::Result,
    repository::cam_files::{CamFile, CamFileRepository},
};

/// Camera files visible to the caller's organization, newest first
pub async fn list_cam_files(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<CamFile>>> {
    // row-level security narrows the scan to the bound organization
    let files = CamFileRepository::new(state.rls.clone())
        .list(&tenant.ctx, query.page())
        .await?;
    Ok(Json(files))
}
