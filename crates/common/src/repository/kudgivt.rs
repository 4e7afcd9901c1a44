//! Per-operation driving evaluation
//!
//! Distances, times, counts and scores, all kept as text the way the
//! tachograph export delivers them.

use super::{new_id, Page};
use crate::context::TenantContext;
use crate::db::sql::{Live, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct Kudgivt {
        uuid: String => "UUID",
        organization_id: String => "OrganizationID",
        hash: String => "Hash",
        created: String => "Created",
        deleted: Option<String> => "Deleted",
        kudguri_uuid: Option<String> => "KudguriUuid",
        unkou_no: Option<String> => "UnkouNo",
        read_date: Option<String> => "ReadDate",
        unkou_date: Option<String> => "UnkouDate",
        office_cd: Option<String> => "OfficeCd",
        office_name: Option<String> => "OfficeName",
        vehicle_cd: Option<String> => "VehicleCd",
        vehicle_name: Option<String> => "VehicleName",
        driver_cd1: Option<String> => "DriverCd1",
        driver_name1: Option<String> => "DriverName1",
        target_driver_type: String => "TargetDriverType",
        target_driver_cd: Option<String> => "TargetDriverCd",
        target_driver_name: Option<String> => "TargetDriverName",
        clock_in_datetime: Option<String> => "ClockInDatetime",
        clock_out_datetime: Option<String> => "ClockOutDatetime",
        departure_datetime: Option<String> => "DepartureDatetime",
        return_datetime: Option<String> => "ReturnDatetime",
        departure_meter: Option<String> => "DepartureMeter",
        return_meter: Option<String> => "ReturnMeter",
        total_mileage: Option<String> => "TotalMileage",
        destination_city_name: Option<String> => "DestinationCityName",
        destination_place_name: Option<String> => "DestinationPlaceName",
        actual_mileage: Option<String> => "ActualMileage",
        local_drive_time: Option<String> => "LocalDriveTime",
        express_drive_time: Option<String> => "ExpressDriveTime",
        bypass_drive_time: Option<String> => "BypassDriveTime",
        actual_drive_time: Option<String> => "ActualDriveTime",
        empty_drive_time: Option<String> => "EmptyDriveTime",
        work1_time: Option<String> => "Work1Time",
        work2_time: Option<String> => "Work2Time",
        work3_time: Option<String> => "Work3Time",
        work4_time: Option<String> => "Work4Time",
        work5_time: Option<String> => "Work5Time",
        work6_time: Option<String> => "Work6Time",
        work7_time: Option<String> => "Work7Time",
        work8_time: Option<String> => "Work8Time",
        work9_time: Option<String> => "Work9Time",
        work10_time: Option<String> => "Work10Time",
        state1_distance: Option<String> => "State1Distance",
        state2_distance: Option<String> => "State2Distance",
        state3_distance: Option<String> => "State3Distance",
        state4_distance: Option<String> => "State4Distance",
        state5_distance: Option<String> => "State5Distance",
        state1_time: Option<String> => "State1Time",
        state2_time: Option<String> => "State2Time",
        state3_time: Option<String> => "State3Time",
        state4_time: Option<String> => "State4Time",
        state5_time: Option<String> => "State5Time",
        own_main_fuel: Option<String> => "OwnMainFuel",
        own_main_additive: Option<String> => "OwnMainAdditive",
        own_consumable: Option<String> => "OwnConsumable",
        other_main_fuel: Option<String> => "OtherMainFuel",
        other_main_additive: Option<String> => "OtherMainAdditive",
        other_consumable: Option<String> => "OtherConsumable",
        local_speed_over_max: Option<String> => "LocalSpeedOverMax",
        local_speed_over_time: Option<String> => "LocalSpeedOverTime",
        local_speed_over_count: Option<String> => "LocalSpeedOverCount",
        express_speed_over_max: Option<String> => "ExpressSpeedOverMax",
        express_speed_over_time: Option<String> => "ExpressSpeedOverTime",
        express_speed_over_count: Option<String> => "ExpressSpeedOverCount",
        dedicated_speed_over_max: Option<String> => "DedicatedSpeedOverMax",
        dedicated_speed_over_time: Option<String> => "DedicatedSpeedOverTime",
        dedicated_speed_over_count: Option<String> => "DedicatedSpeedOverCount",
        idling_time: Option<String> => "IdlingTime",
        idling_time_count: Option<String> => "IdlingTimeCount",
        rotation_over_max: Option<String> => "RotationOverMax",
        rotation_over_count: Option<String> => "RotationOverCount",
        rotation_over_time: Option<String> => "RotationOverTime",
        rapid_accel_count1: Option<String> => "RapidAccelCount1",
        rapid_accel_count2: Option<String> => "RapidAccelCount2",
        rapid_accel_count3: Option<String> => "RapidAccelCount3",
        rapid_accel_count4: Option<String> => "RapidAccelCount4",
        rapid_accel_count5: Option<String> => "RapidAccelCount5",
        rapid_accel_max: Option<String> => "RapidAccelMax",
        rapid_accel_max_speed: Option<String> => "RapidAccelMaxSpeed",
        rapid_decel_count1: Option<String> => "RapidDecelCount1",
        rapid_decel_count2: Option<String> => "RapidDecelCount2",
        rapid_decel_count3: Option<String> => "RapidDecelCount3",
        rapid_decel_count4: Option<String> => "RapidDecelCount4",
        rapid_decel_count5: Option<String> => "RapidDecelCount5",
        rapid_decel_max: Option<String> => "RapidDecelMax",
        rapid_decel_max_speed: Option<String> => "RapidDecelMaxSpeed",
        rapid_curve_count1: Option<String> => "RapidCurveCount1",
        rapid_curve_count2: Option<String> => "RapidCurveCount2",
        rapid_curve_count3: Option<String> => "RapidCurveCount3",
        rapid_curve_count4: Option<String> => "RapidCurveCount4",
        rapid_curve_count5: Option<String> => "RapidCurveCount5",
        rapid_curve_max: Option<String> => "RapidCurveMax",
        rapid_curve_max_speed: Option<String> => "RapidCurveMaxSpeed",
        continuous_drive_over_count: Option<String> => "ContinuousDriveOverCount",
        continuous_drive_max_time: Option<String> => "ContinuousDriveMaxTime",
        continuous_drive_total_time: Option<String> => "ContinuousDriveTotalTime",
        wave_drive_count: Option<String> => "WaveDriveCount",
        wave_drive_max_time: Option<String> => "WaveDriveMaxTime",
        wave_drive_max_speed_diff: Option<String> => "WaveDriveMaxSpeedDiff",
        local_speed_score: Option<String> => "LocalSpeedScore",
        express_speed_score: Option<String> => "ExpressSpeedScore",
        dedicated_speed_score: Option<String> => "DedicatedSpeedScore",
        local_distance_score: Option<String> => "LocalDistanceScore",
        express_distance_score: Option<String> => "ExpressDistanceScore",
        dedicated_distance_score: Option<String> => "DedicatedDistanceScore",
        rapid_accel_score: Option<String> => "RapidAccelScore",
        rapid_decel_score: Option<String> => "RapidDecelScore",
        rapid_curve_score: Option<String> => "RapidCurveScore",
        actual_low_speed_rotation_score: Option<String> => "ActualLowSpeedRotationScore",
        actual_high_speed_rotation_score: Option<String> => "ActualHighSpeedRotationScore",
        empty_low_speed_rotation_score: Option<String> => "EmptyLowSpeedRotationScore",
        empty_high_speed_rotation_score: Option<String> => "EmptyHighSpeedRotationScore",
        idling_score: Option<String> => "IdlingScore",
        continuous_drive_score: Option<String> => "ContinuousDriveScore",
        wave_drive_score: Option<String> => "WaveDriveScore",
        safety_score: Option<String> => "SafetyScore",
        economy_score: Option<String> => "EconomyScore",
        total_score: Option<String> => "TotalScore",
    }
}

pub(crate) const KUDGIVT: Table = Table::new("kudgivt", "kudgivt", Kudgivt::COLUMNS, &["UUID"])
    .live(Live::NullText("Deleted"))
    .order_by(&[("Created", Order::Desc), ("UUID", Order::Asc)]);

#[derive(Clone)]
pub struct KudgivtRepository {
    db: Arc<dyn Db>,
}

impl KudgivtRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, row: &Kudgivt) -> Result<Kudgivt> {
        let mut row = row.clone();
        if row.uuid.is_empty() {
            row.uuid = new_id();
        }
        row.deleted = None;
        super::insert(self.db.as_ref(), ctx, &KUDGIVT, &row).await
    }

    pub async fn get_by_uuid(&self, ctx: &TenantContext, uuid: &str) -> Result<Kudgivt> {
        super::get(
            self.db.as_ref(),
            ctx,
            &KUDGIVT,
            Params::new().bind(uuid.to_string()),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn update(&self, ctx: &TenantContext, row: &Kudgivt) -> Result<Kudgivt> {
        super::update_all(self.db.as_ref(), ctx, &KUDGIVT, row, || row.uuid.clone()).await
    }

    pub async fn delete(&self, ctx: &TenantContext, uuid: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &KUDGIVT,
            Params::new().bind(uuid.to_string()),
            Utc::now(),
            || uuid.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<Kudgivt>> {
        super::list(self.db.as_ref(), ctx, &KUDGIVT, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<Kudgivt>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &KUDGIVT,
            &["OrganizationID"],
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
            KUDGIVT.delete(),
            "UPDATE \"kudgivt\" SET \"Deleted\" = $2 WHERE \"UUID\" = $1 AND \"Deleted\" IS NULL"
        );
        assert!(KUDGIVT
            .list_where(&["OrganizationID"])
            .contains("WHERE \"OrganizationID\" = $1 AND \"Deleted\" IS NULL ORDER BY"));
    }

    #[test]
    fn test_update_skips_key_and_marker() {
        let set = KUDGIVT.writable_columns();
        assert!(!set.contains(&"UUID"));
        assert!(!set.contains(&"Deleted"));
        assert_eq!(set.len(), Kudgivt::COLUMNS.len() - 2);
    }

    #[test]
    fn test_wide_update_placeholders() {
        let set = KUDGIVT.writable_columns();
        assert!(KUDGIVT
            .update(&set)
            .contains(&format!("WHERE \"UUID\" = ${} AND \"Deleted\" IS NULL", set.len() + 1)));
    }
}
