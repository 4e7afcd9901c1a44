//! Electronic vehicle inspection certificates
//!
//! One text column per certificate field, keyed by organization, certificate
//! number and publish date. Updates rewrite every non-key field.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct CarInspection {
        organization_id: String => "organization_id",
        cert_info_import_file_version: String => "CertInfoImportFileVersion",
        accept_output_no: String => "AcceptOutputNo",
        form_type: String => "FormType",
        elect_cert_mg_no: String => "ElectCertMgNo",
        car_id: String => "CarId",
        elect_cert_publishdate_e: String => "ElectCertPublishdateE",
        elect_cert_publishdate_y: String => "ElectCertPublishdateY",
        elect_cert_publishdate_m: String => "ElectCertPublishdateM",
        elect_cert_publishdate_d: String => "ElectCertPublishdateD",
        grantdate_e: String => "GrantdateE",
        grantdate_y: String => "GrantdateY",
        grantdate_m: String => "GrantdateM",
        grantdate_d: String => "GrantdateD",
        transpotation_bureau_chief_name: String => "TranspotationBureauChiefName",
        entry_no_car_no: String => "EntryNoCarNo",
        reg_grantdate_e: String => "RegGrantdateE",
        reg_grantdate_y: String => "RegGrantdateY",
        reg_grantdate_m: String => "RegGrantdateM",
        reg_grantdate_d: String => "RegGrantdateD",
        first_regist_date_e: String => "FirstRegistDateE",
        first_regist_date_y: String => "FirstRegistDateY",
        first_regist_date_m: String => "FirstRegistDateM",
        car_name: String => "CarName",
        car_name_code: String => "CarNameCode",
        car_no: String => "CarNo",
        model: String => "Model",
        engine_model: String => "EngineModel",
        owner_name_low_level_char: String => "OwnerNameLowLevelChar",
        owner_name_high_level_char: String => "OwnerNameHighLevelChar",
        owner_address_char: String => "OwnerAddressChar",
        owner_address_num_value: String => "OwnerAddressNumValue",
        owner_address_code: String => "OwnerAddressCode",
        user_name_low_level_char: String => "UserNameLowLevelChar",
        user_name_high_level_char: String => "UserNameHighLevelChar",
        user_address_char: String => "UserAddressChar",
        user_address_num_value: String => "UserAddressNumValue",
        user_address_code: String => "UserAddressCode",
        use_headqurter_char: String => "UseHeadqurterChar",
        use_headqurter_num_value: String => "UseHeadqurterNumValue",
        use_headqurter_code: String => "UseHeadqurterCode",
        car_kind: String => "CarKind",
        car_use: String => "Use",
        private_business: String => "PrivateBusiness",
        car_shape: String => "CarShape",
        car_shape_code: String => "CarShapeCode",
        note_cap: String => "NoteCap",
        cap: String => "Cap",
        note_max_loadage: String => "NoteMaxLoadage",
        max_loadage: String => "MaxLoadage",
        note_car_wgt: String => "NoteCarWgt",
        car_wgt: String => "CarWgt",
        note_car_total_wgt: String => "NoteCarTotalWgt",
        car_total_wgt: String => "CarTotalWgt",
        note_length: String => "NoteLength",
        length: String => "Length",
        note_width: String => "NoteWidth",
        width: String => "Width",
        note_height: String => "NoteHeight",
        height: String => "Height",
        ff_ax_wgt: String => "FfAxWgt",
        fr_ax_wgt: String => "FrAxWgt",
        rf_ax_wgt: String => "RfAxWgt",
        rr_ax_wgt: String => "RrAxWgt",
        displacement: String => "Displacement",
        fuel_class: String => "FuelClass",
        model_specify_no: String => "ModelSpecifyNo",
        classify_around_no: String => "ClassifyAroundNo",
        valid_period_expir_date_e: String => "ValidPeriodExpirDateE",
        valid_period_expir_date_y: String => "ValidPeriodExpirDateY",
        valid_period_expir_date_m: String => "ValidPeriodExpirDateM",
        valid_period_expir_date_d: String => "ValidPeriodExpirDateD",
        note_info: String => "NoteInfo",
        twodimension_code_info_entry_no_car_no: String => "TwodimensionCodeInfoEntryNoCarNo",
        twodimension_code_info_car_no: String => "TwodimensionCodeInfoCarNo",
        twodimension_code_info_valid_period_expir_date: String => "TwodimensionCodeInfoValidPeriodExpirDate",
        twodimension_code_info_model: String => "TwodimensionCodeInfoModel",
        twodimension_code_info_model_specify_no_classify_around_no: String => "TwodimensionCodeInfoModelSpecifyNoClassifyAroundNo",
        twodimension_code_info_char_info: String => "TwodimensionCodeInfoCharInfo",
        twodimension_code_info_engine_model: String => "TwodimensionCodeInfoEngineModel",
        twodimension_code_info_car_no_stamp_place: String => "TwodimensionCodeInfoCarNoStampPlace",
        twodimension_code_info_first_regist_date: String => "TwodimensionCodeInfoFirstRegistDate",
        twodimension_code_info_ff_ax_wgt: String => "TwodimensionCodeInfoFfAxWgt",
        twodimension_code_info_fr_ax_wgt: String => "TwodimensionCodeInfoFrAxWgt",
        twodimension_code_info_rf_ax_wgt: String => "TwodimensionCodeInfoRfAxWgt",
        twodimension_code_info_rr_ax_wgt: String => "TwodimensionCodeInfoRrAxWgt",
        twodimension_code_info_noise_reg: String => "TwodimensionCodeInfoNoiseReg",
        twodimension_code_info_near_noise_reg: String => "TwodimensionCodeInfoNearNoiseReg",
        twodimension_code_info_drive_method: String => "TwodimensionCodeInfoDriveMethod",
        twodimension_code_info_opacimeter_meas_car: String => "TwodimensionCodeInfoOpacimeterMeasCar",
        twodimension_code_info_nox_pm_meas_mode: String => "TwodimensionCodeInfoNoxPmMeasMode",
        twodimension_code_info_nox_value: String => "TwodimensionCodeInfoNoxValue",
        twodimension_code_info_pm_value: String => "TwodimensionCodeInfoPmValue",
        twodimension_code_info_safe_std_date: String => "TwodimensionCodeInfoSafeStdDate",
        twodimension_code_info_fuel_class_code: String => "TwodimensionCodeInfoFuelClassCode",
        regist_car_light_car: String => "RegistCarLightCar",
        created: String => "Created",
        modified: String => "Modified",
    }
}

pub(crate) const CAR_INSPECTIONS: Table = Table::new(
    "car_inspection",
    "car inspection",
    CarInspection::COLUMNS,
    &[
        "organization_id",
        "ElectCertMgNo",
        "ElectCertPublishdateE",
        "ElectCertPublishdateY",
        "ElectCertPublishdateM",
        "ElectCertPublishdateD",
    ],
)
.order_by(&[
    ("organization_id", Order::Asc),
    ("ElectCertMgNo", Order::Asc),
    ("ElectCertPublishdateE", Order::Asc),
    ("ElectCertPublishdateY", Order::Asc),
    ("ElectCertPublishdateM", Order::Asc),
    ("ElectCertPublishdateD", Order::Asc),
]);

/// Primary key of [`CarInspection`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarInspectionKey {
    pub organization_id: String,
    pub elect_cert_mg_no: String,
    pub elect_cert_publishdate_e: String,
    pub elect_cert_publishdate_y: String,
    pub elect_cert_publishdate_m: String,
    pub elect_cert_publishdate_d: String,
}

impl CarInspectionKey {
    fn params(&self) -> Params {
        Params::new()
            .bind(self.organization_id.clone())
            .bind(self.elect_cert_mg_no.clone())
            .bind(self.elect_cert_publishdate_e.clone())
            .bind(self.elect_cert_publishdate_y.clone())
            .bind(self.elect_cert_publishdate_m.clone())
            .bind(self.elect_cert_publishdate_d.clone())
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.organization_id,
            self.elect_cert_mg_no,
            self.elect_cert_publishdate_e,
            self.elect_cert_publishdate_y,
            self.elect_cert_publishdate_m,
            self.elect_cert_publishdate_d,
        )
    }
}

impl From<&CarInspection> for CarInspectionKey {
    fn from(row: &CarInspection) -> Self {
        Self {
            organization_id: row.organization_id.clone(),
            elect_cert_mg_no: row.elect_cert_mg_no.clone(),
            elect_cert_publishdate_e: row.elect_cert_publishdate_e.clone(),
            elect_cert_publishdate_y: row.elect_cert_publishdate_y.clone(),
            elect_cert_publishdate_m: row.elect_cert_publishdate_m.clone(),
            elect_cert_publishdate_d: row.elect_cert_publishdate_d.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CarInspectionRepository {
    db: Arc<dyn Db>,
}

impl CarInspectionRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        inspection: &CarInspection,
    ) -> Result<CarInspection> {
        super::insert(self.db.as_ref(), ctx, &CAR_INSPECTIONS, inspection).await
    }

    pub async fn get(&self, ctx: &TenantContext, key: &CarInspectionKey) -> Result<CarInspection> {
        super::get(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTIONS,
            key.params(),
            || key.describe(),
        )
        .await
    }

    /// Rewrite every certificate field of an existing certificate
    pub async fn update(
        &self,
        ctx: &TenantContext,
        inspection: &CarInspection,
    ) -> Result<CarInspection> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTIONS,
            inspection,
            || CarInspectionKey::from(inspection).describe(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, key: &CarInspectionKey) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTIONS,
            key.params(),
            Utc::now(),
            || key.describe(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<CarInspection>> {
        super::list(self.db.as_ref(), ctx, &CAR_INSPECTIONS, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<CarInspection>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &CAR_INSPECTIONS,
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
    fn test_wide_insert_numbers_every_placeholder() {
        let sql = CAR_INSPECTIONS.insert();
        let n = CarInspection::COLUMNS.len();
        assert!(n > 90);
        assert!(sql.contains(&format!("${})", n)));
        assert!(sql.contains("\"TwodimensionCodeInfoModelSpecifyNoClassifyAroundNo\""));
    }

    #[test]
    fn test_update_keys_follow_every_field() {
        let set = CAR_INSPECTIONS.non_key_columns();
        let sql = CAR_INSPECTIONS.update(&set);
        let first_key = set.len() + 1;
        assert!(sql.contains(&format!(
            "WHERE \"organization_id\" = ${} AND \"ElectCertMgNo\" = ${}",
            first_key,
            first_key + 1
        )));
    }
}
