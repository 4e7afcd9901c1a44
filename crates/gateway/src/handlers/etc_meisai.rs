//! ETC statement import and listing

use crate::middleware::Tenant;
use crate::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use fleetcore_common::{
    errors::{AppError, Result},
    repository::etc_meisai::{
        BulkOutcome, EtcMeisaiFilter, EtcMeisaiPage, EtcMeisaiRepository, NewEtcMeisai,
    },
};
use serde::Deserialize;

/// Upper bound on lines accepted by one import call
pub const MAX_BULK_RECORDS: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    pub records: Vec<NewEtcMeisai>,
    #[serde(default = "default_skip_duplicates")]
    pub skip_duplicates: bool,
}

fn default_skip_duplicates() -> bool {
    true
}

impl BulkCreateRequest {
    fn check(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(AppError::Validation {
                message: "records must not be empty".to_string(),
            });
        }
        if self.records.len() > MAX_BULK_RECORDS {
            return Err(AppError::Validation {
                message: format!("at most {} records per request", MAX_BULK_RECORDS),
            });
        }
        Ok(())
    }
}

pub async fn bulk_create(
    State(state): State<AppState>,
    tenant: Tenant,
    Json(request): Json<BulkCreateRequest>,
) -> Result<Json<BulkOutcome>> {
    request.check()?;
    let outcome = EtcMeisaiRepository::new(state.rls.clone())
        .bulk_create(
            &tenant.ctx,
            &tenant.organization_id,
            &request.records,
            request.skip_duplicates,
        )
        .await?;
    Ok(Json(outcome))
}

pub async fn list_etc_meisai(
    State(state): State<AppState>,
    tenant: Tenant,
    Query(filter): Query<EtcMeisaiFilter>,
) -> Result<Json<EtcMeisaiPage>> {
    let page = EtcMeisaiRepository::new(state.rls.clone())
        .list(&tenant.ctx, &filter)
        .await?;
    Ok(Json(page))
}
