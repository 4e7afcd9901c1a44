//! Repository behavior against a live Postgres

mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use fleetcore_common::context::TenantContext;
use fleetcore_common::errors::AppError;
use fleetcore_common::repository::app_users::{AppUserRepository, NewAppUser};
use fleetcore_common::repository::cam_files::{CamFile, CamFileRepository};
use fleetcore_common::repository::car_inspection_files::{
    CarInspectionFile, CarInspectionFileRepository,
};
use fleetcore_common::repository::etc_meisai::{
    EtcMeisaiFilter, EtcMeisaiRepository, NewEtcMeisai,
};
use fleetcore_common::repository::files::{File, FileRepository};
use fleetcore_common::repository::invitations::{InvitationRepository, InvitationStatus};
use fleetcore_common::repository::organizations::OrganizationRepository;
use fleetcore_common::repository::uriage::{Uriage, UriageRepository};
use fleetcore_common::repository::user_organizations::UserOrganizationRepository;
use fleetcore_common::repository::{new_id, Clock, Page};
use std::sync::{Arc, Mutex};
use tokio_test::assert_ok;

/// Clock the test moves by hand
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

fn toll_line(minute: u32, etc_num: &str) -> NewEtcMeisai {
    NewEtcMeisai {
        date_fr: None,
        date_to: Utc.with_ymd_and_hms(2024, 3, 1, 8, minute, 0).unwrap(),
        date_to_date: "2024-03-01".into(),
        ic_fr: "Tokyo".into(),
        ic_to: "Yokohama".into(),
        price_bf: None,
        discount: None,
        price: 1000 + minute as i32,
        shashu: 2,
        car_id_num: None,
        etc_num: etc_num.into(),
        detail: None,
        dtako_row_id: None,
        hash: String::new(),
    }
}

fn tenant(org: &str) -> TenantContext {
    TenantContext::background().with_organization_id(org.to_string())
}

#[tokio::test]
async fn test_soft_deleted_organization_is_gone() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let repo = OrganizationRepository::new(h.raw.clone());
    let slug = format!("fleet-{}", &new_id()[..8]);

    let org = repo.create(&ctx, "Fleet", &slug).await.unwrap();
    assert_ok!(repo.get_by_id(&ctx, &org.id).await);
    repo.delete(&ctx, &org.id).await.unwrap();

    assert!(matches!(
        repo.get_by_id(&ctx, &org.id).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(matches!(
        repo.update(&ctx, &org.id, "Renamed", &slug).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete(&ctx, &org.id).await,
        Err(AppError::NotFound { .. })
    ));
    let listed = repo.list(&ctx, Page::new(100, 0)).await.unwrap();
    assert!(listed.iter().all(|o| o.id != org.id));

    // the row itself survives with its stamp
    let (deleted_at,): (Option<DateTime<Utc>>,) =
        sqlx::query_as("SELECT deleted_at FROM organizations WHERE id = $1")
            .bind(&org.id)
            .fetch_one(&h.admin)
            .await
            .unwrap();
    assert!(deleted_at.is_some());
}

#[tokio::test]
async fn test_file_delete_marks_text_column() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = FileRepository::new(h.rls.clone());

    let file = repo
        .create(
            &ctx,
            &File {
                uuid: String::new(),
                organization_id: org.clone(),
                filename: "manifest.csv".into(),
                created: "2024-03-01T08:00:00Z".into(),
                deleted: String::new(),
                file_type: "text/csv".into(),
                blob: None,
            },
        )
        .await
        .unwrap();
    assert!(!file.uuid.is_empty());
    assert_eq!(repo.list(&ctx, Page::default()).await.unwrap().len(), 1);

    repo.delete(&ctx, &file.uuid).await.unwrap();
    assert!(matches!(
        repo.get_by_uuid(&ctx, &file.uuid).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(repo.list(&ctx, Page::default()).await.unwrap().is_empty());

    let (deleted,): (String,) = sqlx::query_as("SELECT deleted FROM files WHERE uuid = $1")
        .bind(&file.uuid)
        .fetch_one(&h.admin)
        .await
        .unwrap();
    assert!(!deleted.is_empty());
}

#[tokio::test]
async fn test_invitation_expires_on_late_accept() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let now = Utc::now();
    let clock = ManualClock::at(now - Duration::days(7) - Duration::seconds(1));
    let repo = InvitationRepository::with_clock(h.raw.clone(), clock.clone());
    let org = new_id();

    let invitation = repo
        .create(&ctx, &org, "late@example.com", None, "inviter")
        .await
        .unwrap();
    assert_eq!(invitation.status, "pending");
    assert_eq!(invitation.role, "member");

    clock.set(now);
    assert!(matches!(
        repo.accept_by_token(&ctx, &invitation.token, "invitee").await,
        Err(AppError::Expired)
    ));
    let stored = repo.get_by_token(&ctx, &invitation.token).await.unwrap();
    assert_eq!(stored.state().unwrap(), InvitationStatus::Expired);
    assert!(stored.accepted_by.is_none());

    assert!(matches!(
        repo.accept_by_token(&ctx, &invitation.token, "invitee").await,
        Err(AppError::AlreadyUsed)
    ));
}

#[tokio::test]
async fn test_invitation_accepted_once() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let repo = InvitationRepository::new(h.raw.clone());
    let org = new_id();

    let invitation = repo
        .create(&ctx, &org, "bob@example.com", Some("admin"), "inviter")
        .await
        .unwrap();
    let accepted = repo
        .accept_by_token(&ctx, &invitation.token, "bob")
        .await
        .unwrap();
    assert_eq!(accepted.state().unwrap(), InvitationStatus::Accepted);
    assert_eq!(accepted.accepted_by.as_deref(), Some("bob"));
    assert!(accepted.accepted_at.is_some());

    assert!(matches!(
        repo.accept_by_token(&ctx, &invitation.token, "mallory").await,
        Err(AppError::AlreadyUsed)
    ));
    let pending = repo
        .list(&ctx, &org, Some(InvitationStatus::Pending), Page::default())
        .await
        .unwrap();
    assert!(pending.is_empty());
    let all = repo.list(&ctx, &org, None, Page::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_bulk_create_dedupes_by_hash() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = EtcMeisaiRepository::new(h.rls.clone());

    let first = toll_line(1, "1111");
    let records = vec![first.clone(), toll_line(2, "2222"), first];
    let outcome = repo.bulk_create(&ctx, &org, &records, true).await.unwrap();
    assert_eq!((outcome.created, outcome.skipped), (2, 1));
    assert!(outcome.errors.is_empty());

    let again = repo.bulk_create(&ctx, &org, &records, true).await.unwrap();
    assert_eq!((again.created, again.skipped), (0, 3));
    assert!(again.errors.is_empty());

    let page = repo.list(&ctx, &EtcMeisaiFilter::default()).await.unwrap();
    assert_eq!(page.total_count, 2);
}

#[tokio::test]
async fn test_bulk_create_is_idempotent() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = EtcMeisaiRepository::new(h.rls.clone());
    let records: Vec<_> = (0..4).map(|m| toll_line(m, "3333")).collect();

    let once = repo.bulk_create(&ctx, &org, &records, true).await.unwrap();
    assert_eq!(once.created, records.len());
    let twice = repo.bulk_create(&ctx, &org, &records, true).await.unwrap();
    assert_eq!((twice.created, twice.skipped), (0, records.len()));

    let page = repo.list(&ctx, &EtcMeisaiFilter::default()).await.unwrap();
    assert_eq!(page.total_count, records.len() as i64);
}

#[tokio::test]
async fn test_bulk_create_reports_duplicates_without_skip() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = EtcMeisaiRepository::new(h.rls.clone());
    let line = toll_line(5, "4444");

    let outcome = repo
        .bulk_create(&ctx, &org, &[line.clone(), line], false)
        .await
        .unwrap();
    assert_eq!((outcome.created, outcome.skipped), (1, 0));
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("record 1:"));
    assert_eq!(common::settle(&h.pool).await, 0);
}

#[tokio::test]
async fn test_etc_meisai_pages_by_token() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = EtcMeisaiRepository::new(h.rls.clone());
    let records: Vec<_> = (10..13).map(|m| toll_line(m, "5555")).collect();
    repo.bulk_create(&ctx, &org, &records, true).await.unwrap();

    let mut filter = EtcMeisaiFilter {
        page_size: 2,
        ..EtcMeisaiFilter::default()
    };
    let first = repo.list(&ctx, &filter).await.unwrap();
    assert_eq!(first.total_count, 3);
    assert_eq!(first.items.len(), 2);
    // newest first
    assert!(first.items[0].date_to > first.items[1].date_to);

    filter.page_token = first.next_page_token.clone();
    assert!(filter.page_token.is_some());
    let second = repo.list(&ctx, &filter).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert!(second.next_page_token.is_none());
    assert!(second.items[0].date_to < first.items[1].date_to);

    filter.page_token = Some("not-a-token".into());
    assert!(repo.list(&ctx, &filter).await.is_err());

    let other = EtcMeisaiFilter {
        etc_num: Some("no-such-card".into()),
        ..EtcMeisaiFilter::default()
    };
    assert_eq!(repo.list(&ctx, &other).await.unwrap().total_count, 0);
}

#[tokio::test]
async fn test_pages_cover_full_listing() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = CamFileRepository::new(h.rls.clone());
    for i in 0..5 {
        repo.create(
            &ctx,
            &CamFile {
                name: format!("clip-{}", i),
                organization_id: org.clone(),
                date: "2024-04-01".into(),
                // two rows share an hour so the name tiebreaker matters
                hour: format!("{:02}", i / 2),
                file_type: "video".into(),
                cam: "front".into(),
                flickr_id: None,
            },
        )
        .await
        .unwrap();
    }

    let names = |files: Vec<CamFile>| files.into_iter().map(|f| f.name).collect::<Vec<_>>();
    let all = names(repo.list(&ctx, Page::new(10, 0)).await.unwrap());
    assert_eq!(all.len(), 5);

    let mut paged = Vec::new();
    let mut page = Page::new(2, 0);
    loop {
        let chunk = names(repo.list(&ctx, page).await.unwrap());
        if chunk.is_empty() {
            break;
        }
        paged.extend(chunk);
        page = page.next();
    }
    assert_eq!(paged, all);
    assert_eq!(
        names(repo.list(&ctx, Page::new(2, 2)).await.unwrap()),
        all[2..4].to_vec()
    );
}

#[tokio::test]
async fn test_create_organization_with_owner() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let user = AppUserRepository::new(h.raw.clone())
        .create(
            &ctx,
            NewAppUser {
                email: None,
                display_name: "Owner".into(),
                avatar_url: None,
                is_superadmin: false,
            },
        )
        .await
        .unwrap();

    let slug = format!("owned-{}", &new_id()[..8]);
    let (org, membership) = OrganizationRepository::new(h.rls.clone())
        .create_with_owner(&ctx, "Owned", &slug, &user.id)
        .await
        .unwrap();
    assert_eq!(membership.organization_id, org.id);
    assert_eq!(membership.role, "owner");
    assert!(membership.is_default);

    let memberships = UserOrganizationRepository::new(h.raw.clone());
    let listed = memberships
        .list_by_user_id(&ctx, &user.id, Page::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].organization_id, org.id);

    // the slug is taken now
    assert!(OrganizationRepository::new(h.raw.clone())
        .create_with_owner(&ctx, "Again", &slug, &user.id)
        .await
        .is_err());
    assert_eq!(common::settle(&h.pool).await, 0);
}

#[tokio::test]
async fn test_organization_update_round_trip() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let repo = OrganizationRepository::new(h.raw.clone());
    let slug = format!("before-{}", &new_id()[..8]);
    let org = repo.create(&ctx, "Before", &slug).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let renamed = format!("after-{}", &new_id()[..8]);
    let updated = repo.update(&ctx, &org.id, "After", &renamed).await.unwrap();
    assert_eq!(updated.name, "After");
    assert_eq!(updated.slug, renamed);

    let stored = repo.get_by_id(&ctx, &org.id).await.unwrap();
    assert_eq!(stored, updated);
    assert_eq!(stored.created_at, org.created_at);
    assert!(stored.updated_at > org.updated_at);
}

#[tokio::test]
async fn test_cam_file_update_round_trip() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = CamFileRepository::new(h.rls.clone());
    let file = CamFile {
        name: "clip-update".into(),
        organization_id: org.clone(),
        date: "2024-05-01".into(),
        hour: "07".into(),
        file_type: "video".into(),
        cam: "front".into(),
        flickr_id: None,
    };
    assert_eq!(repo.create(&ctx, &file).await.unwrap(), file);

    let changed = CamFile {
        hour: "08".into(),
        cam: "rear".into(),
        flickr_id: Some("5550001".into()),
        ..file.clone()
    };
    assert_eq!(repo.update(&ctx, &changed).await.unwrap(), changed);
    assert_eq!(repo.get(&ctx, &file.name, &org).await.unwrap(), changed);
}

#[tokio::test]
async fn test_cancelled_invitation_cannot_be_accepted_or_resent() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let repo = InvitationRepository::new(h.raw.clone());
    let invitation = repo
        .create(&ctx, &new_id(), "carol@example.com", None, "inviter")
        .await
        .unwrap();

    let cancelled = repo.cancel(&ctx, &invitation.id).await.unwrap();
    assert_eq!(cancelled.state().unwrap(), InvitationStatus::Cancelled);

    assert!(matches!(
        repo.accept_by_token(&ctx, &invitation.token, "carol").await,
        Err(AppError::AlreadyUsed)
    ));
    assert!(matches!(
        repo.resend(&ctx, &invitation.id).await,
        Err(AppError::NotFound { .. })
    ));
    let stored = repo.get_by_id(&ctx, &invitation.id).await.unwrap();
    assert_eq!(stored.state().unwrap(), InvitationStatus::Cancelled);
    assert_eq!(stored.token, invitation.token);
}

#[tokio::test]
async fn test_resend_refreshes_pending_invitation() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let now = Utc::now();
    let clock = ManualClock::at(now);
    let repo = InvitationRepository::with_clock(h.raw.clone(), clock.clone());
    let invitation = repo
        .create(&ctx, &new_id(), "dave@example.com", None, "inviter")
        .await
        .unwrap();

    clock.set(now + Duration::hours(1));
    let resent = repo.resend(&ctx, &invitation.id).await.unwrap();
    assert_eq!(resent.state().unwrap(), InvitationStatus::Pending);
    assert_ne!(resent.token, invitation.token);
    assert!(resent.expires_at > invitation.expires_at);

    // the old token no longer resolves
    assert!(matches!(
        repo.get_by_token(&ctx, &invitation.token).await,
        Err(AppError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_cancel_after_accept_changes_nothing() {
    let Some(h) = common::harness(4).await else { return };
    let ctx = TenantContext::background();
    let repo = InvitationRepository::new(h.raw.clone());
    let invitation = repo
        .create(&ctx, &new_id(), "erin@example.com", None, "inviter")
        .await
        .unwrap();
    let accepted = repo
        .accept_by_token(&ctx, &invitation.token, "erin")
        .await
        .unwrap();

    assert!(matches!(
        repo.cancel(&ctx, &invitation.id).await,
        Err(AppError::NotFound { .. })
    ));
    let stored = repo.get_by_id(&ctx, &invitation.id).await.unwrap();
    assert_eq!(stored, accepted);
}

#[tokio::test]
async fn test_null_marker_soft_delete() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = CarInspectionFileRepository::new(h.rls.clone());

    let created = repo
        .create(
            &ctx,
            &CarInspectionFile {
                uuid: String::new(),
                organization_id: org.clone(),
                file_type: "pdf".into(),
                elect_cert_mg_no: "EC-001".into(),
                elect_cert_publishdate_e: "R".into(),
                elect_cert_publishdate_y: "06".into(),
                elect_cert_publishdate_m: "04".into(),
                elect_cert_publishdate_d: "01".into(),
                created: "2024-04-01T00:00:00Z".into(),
                modified: "2024-04-01T00:00:00Z".into(),
                deleted: Some("left over".into()),
            },
        )
        .await
        .unwrap();
    assert!(created.deleted.is_none());

    let changed = CarInspectionFile {
        file_type: "png".into(),
        ..created.clone()
    };
    assert_eq!(repo.update(&ctx, &changed).await.unwrap().file_type, "png");
    assert_eq!(repo.get_by_uuid(&ctx, &created.uuid).await.unwrap(), changed);

    repo.delete(&ctx, &created.uuid).await.unwrap();
    assert!(matches!(
        repo.get_by_uuid(&ctx, &created.uuid).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(matches!(
        repo.delete(&ctx, &created.uuid).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(matches!(
        repo.update(&ctx, &changed).await,
        Err(AppError::NotFound { .. })
    ));
    assert!(repo.list(&ctx, Page::default()).await.unwrap().is_empty());

    // deletion stamps the time as text
    let (deleted,): (Option<String>,) =
        sqlx::query_as("SELECT deleted FROM car_inspection_files WHERE uuid = $1")
            .bind(&created.uuid)
            .fetch_one(&h.admin)
            .await
            .unwrap();
    let stamp = deleted.unwrap();
    assert!(DateTime::parse_from_rfc3339(&stamp).is_ok());
}

#[tokio::test]
async fn test_composite_key_round_trip() {
    let Some(h) = common::harness(4).await else { return };
    let org = new_id();
    let ctx = tenant(&org);
    let repo = UriageRepository::new(h.rls.clone());
    let sale = Uriage {
        name: "Suzuki".into(),
        bumon: "east".into(),
        organization_id: org.clone(),
        kingaku: Some(12000),
        sale_type: Some(1),
        cam: None,
        date: "2024-06-01".into(),
    };
    // same driver and department on another day
    let next_day = Uriage {
        date: "2024-06-02".into(),
        kingaku: Some(9000),
        ..sale.clone()
    };
    assert_eq!(repo.create(&ctx, &sale).await.unwrap(), sale);
    repo.create(&ctx, &next_day).await.unwrap();

    let changed = Uriage {
        kingaku: Some(15000),
        cam: Some(2),
        ..sale.clone()
    };
    assert_eq!(repo.update(&ctx, &changed).await.unwrap(), changed);
    let stored = repo
        .get(&ctx, &sale.name, &sale.bumon, &sale.date, &org)
        .await
        .unwrap();
    assert_eq!(stored, changed);
    let other = repo
        .get(&ctx, &next_day.name, &next_day.bumon, &next_day.date, &org)
        .await
        .unwrap();
    assert_eq!(other, next_day);

    repo.delete(&ctx, &sale.name, &sale.bumon, &sale.date, &org)
        .await
        .unwrap();
    assert!(matches!(
        repo.get(&ctx, &sale.name, &sale.bumon, &sale.date, &org).await,
        Err(AppError::NotFound { .. })
    ));
    let listed = repo.list(&ctx, Page::default()).await.unwrap();
    assert_eq!(listed, vec![next_day]);
}
