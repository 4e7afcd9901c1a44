//! Operation segments in the snake_case schema

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Kudgsir {
        uuid: String => "uuid",
        organization_id: String => "organization_id",
        hash: String => "hash",
        created: String => "created",
        deleted: Option<String> => "deleted",
        kudguri_uuid: Option<String> => "kudguri_uuid",
        unkou_no: Option<String> => "unkou_no",
        read_date: Option<String> => "read_date",
        office_cd: Option<String> => "office_cd",
        office_name: Option<String> => "office_name",
        vehicle_cd: Option<String> => "vehicle_cd",
        vehicle_name: Option<String> => "vehicle_name",
        driver_cd_1: Option<String> => "driver_cd_1",
        driver_name_1: Option<String> => "driver_name_1",
        target_driver_type: String => "target_driver_type",
        target_driver_cd: Option<String> => "target_driver_cd",
        target_driver_name: Option<String> => "target_driver_name",
        start_datetime: Option<String> => "start_datetime",
        end_datetime: Option<String> => "end_datetime",
        event_cd: Option<String> => "event_cd",
        event_name: Option<String> => "event_name",
        start_mileage: Option<String> => "start_mileage",
        end_mileage: Option<String> => "end_mileage",
        section_time: Option<String> => "section_time",
        section_distance: Option<String> => "section_distance",
        start_city_cd: Option<String> => "start_city_cd",
        start_city_name: Option<String> => "start_city_name",
        end_city_cd: Option<String> => "end_city_cd",
        end_city_name: Option<String> => "end_city_name",
        start_place_cd: Option<String> => "start_place_cd",
        start_place_name: Option<String> => "start_place_name",
        end_place_cd: Option<String> => "end_place_cd",
        end_place_name: Option<String> => "end_place_name",
        start_gps_valid: Option<String> => "start_gps_valid",
        start_gps_lat: Option<String> => "start_gps_lat",
        start_gps_lng: Option<String> => "start_gps_lng",
        end_gps_valid: Option<String> => "end_gps_valid",
        end_gps_lat: Option<String> => "end_gps_lat",
        end_gps_lng: Option<String> => "end_gps_lng",
        over_limit_max: Option<String> => "over_limit_max",
    }
}

pub(crate) const KUDGSIR: Table = Table::new("kudgsir", "kudgsir", Kudgsir::COLUMNS, &["uuid"])
    .live(Live::NullText("deleted"))
    .order_by(&[("created", Order::Desc), ("uuid", Order::Asc)]);

#[derive(Clone)]
pub struct KudgsirRepository {
    db: Arc<dyn Db>,
}

impl KudgsirRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, row: &Kudgsir) -> Result<Kudgsir> {
        let mut row = row.clone();
        if row.uuid.is_empty() {
            row.uuid = new_id();
        }
        row.deleted = None;
        super::insert(self.db.as_ref(), ctx, &KUDGSIR, &row).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<Kudgsir> {
        super::get(
            self.db.as_ref(),
            ctx,
            &KUDGSIR,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, row: &Kudgsir) -> Result<Kudgsir> {
        super::update_all(self.db.as_ref(), ctx, &KUDGSIR, row, || row.uuid.clone()).await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &KUDGSIR,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Kudgsir>> {
        super::list(self.db.as_ref(), ctx, &KUDGSIR, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Kudgsir>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &KUDGSIR,
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
    fn test_marker_and_tenant_columns() {
        assert_eq!(
            KUDGSIR.delete(),
            "UPDATE \"kudgsir\" SET \"deleted\" = $2 WHERE \"uuid\" = $1 AND \"deleted\" IS NULL"
        );
        assert!(KUDGSIR
            .list_where(&["organization_id"])
            .contains("WHERE \"organization_id\" = $1 AND \"deleted\" IS NULL ORDER BY"));
    }

    #[test]
    fn test_update_skips_key_and_marker() {
        let set = KUDGSIR.writable_columns();
        assert!(!set.contains(&"uuid"));
        assert!(!set.contains(&"deleted"));
        assert_eq!(set.len(), Kudgsir::COLUMNS.len() - 2);
    }
}
