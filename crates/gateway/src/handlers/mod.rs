//! API handlers module

pub mod auth;
pub mod cam_files;
pub mod etc_meisai;
pub mod health;
pub mod invitations;
pub mod organizations;

use fleetcore_common::{
    errors::{AppError, Result},
    repository::Page,
};
use serde::Deserialize;
use validator::Validate;

/// Run the derived validators, mapping failures to a 400
pub fn validate<T: Validate>(value: &T) -> Result<()> {
    value.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
    })
}

/// `?limit=&offset=` query; clamping is left to [`Page::new`]
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.limit.unwrap_or(0), self.offset.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_clamps() {
        assert_eq!(PageQuery::default().page(), Page::new(0, 0));
        let query = PageQuery {
            limit: Some(1000),
            offset: Some(-5),
        };
        let page = query.page();
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 0);
    }
}
