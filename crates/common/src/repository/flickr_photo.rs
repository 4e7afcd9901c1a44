//! Flickr photo references
//!
//! Keyed by the Flickr id alone; tenant isolation comes from RLS.

use super::Page;
use crate::context::TenantContext;
use crate::db::sql::{Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::Result;
use chrono::Utc;
use std::sync::Arc;

record! {
    pub struct FlickrPhoto {
        id: String => "id",
        organization_id: String => "organization_id",
        secret: String => "secret",
        server: String => "server",
    }
}

pub(crate) const FLICKR_PHOTOS: Table = Table::new(
    "flickr_photo",
    "flickr photo",
    FlickrPhoto::COLUMNS,
    &["id"],
)
.order_by(&[("id", Order::Asc)]);

#[derive(Clone)]
pub struct FlickrPhotoRepository {
    db: Arc<dyn Db>,
}

impl FlickrPhotoRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self { db }
    }

    pub async fn create(&self, ctx: &TenantContext, photo: &FlickrPhoto) -> Result<FlickrPhoto> {
        super::insert(self.db.as_ref(), ctx, &FLICKR_PHOTOS, photo).await
    }

    pub async fn get(&self, ctx: &TenantContext, id: &str) -> Result<FlickrPhoto> {
        super::get(
            self.db.as_ref(),
            ctx,
            &FLICKR_PHOTOS,
            Params::new().bind(id.to_string()),
            || id.to_string(),
        )
        .await
    }

    /// Replace secret and server; `organization_id` is rewritten to the same value
    pub async fn update(&self, ctx: &TenantContext, photo: &FlickrPhoto) -> Result<FlickrPhoto> {
        super::update_all(
            self.db.as_ref(),
            ctx,
            &FLICKR_PHOTOS,
            photo,
            || photo.id.to_string(),
        )
        .await
    }

    pub async fn delete(&self, ctx: &TenantContext, id: &str) -> Result<()> {
        super::delete(
            self.db.as_ref(),
            ctx,
            &FLICKR_PHOTOS,
            Params::new().bind(id.to_string()),
            Utc::now(),
            || id.to_string(),
        )
        .await
    }

    pub async fn list(&self, ctx: &TenantContext, page: Page) -> Result<Vec<FlickrPhoto>> {
        super::list(self.db.as_ref(), ctx, &FLICKR_PHOTOS, page).await
    }

    pub async fn list_by_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        page: Page,
    ) -> Result<Vec<FlickrPhoto>> {
        super::list_where(
            self.db.as_ref(),
            ctx,
            &FLICKR_PHOTOS,
            &["organization_id"],
            Params::new().bind(organization_id.to_string()),
            page,
        )
        .await
    }
}
