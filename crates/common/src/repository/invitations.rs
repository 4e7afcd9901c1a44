//! Organization invitations and their state machine
//!
//! ```text
//!   create ──▶ pending ──accept──▶ accepted
//!                │  ▲
//!          cancel│  │resend
//!                ▼  │
//!           cancelled  expired ◀── accept after expiry
//! ```
//!
//! Every transition is one `UPDATE` guarded by its source states, so two
//! concurrent attempts serialize on the row lock and only one wins. The
//! loser's outcome is decided by [`transition`] over the row it then sees.

use super::{new_id, Clock, Page, SystemClock};
use crate::context::TenantContext;
use crate::db::sql::{column_list, ident, Order, Table};
use crate::db::{record, Db, Params, Record};
use crate::errors::{AppError, Result};
use crate::metrics;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Invitation lifetime from creation or resend
pub const INVITATION_TTL_DAYS: i64 = 7;

/// Role given when the inviter names none
pub const DEFAULT_ROLE: &str = "member";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
    Cancelled,
}

impl InvitationStatus {
    pub const ALL: [InvitationStatus; 4] = [
        InvitationStatus::Pending,
        InvitationStatus::Accepted,
        InvitationStatus::Expired,
        InvitationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Expired => "expired",
            InvitationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvitationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "accepted" => Ok(InvitationStatus::Accepted),
            "expired" => Ok(InvitationStatus::Expired),
            "cancelled" => Ok(InvitationStatus::Cancelled),
            other => Err(AppError::Internal {
                message: format!("unknown invitation status {:?}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationEvent {
    Accept,
    Cancel,
    Resend,
}

impl InvitationEvent {
    pub const ALL: [InvitationEvent; 3] = [
        InvitationEvent::Accept,
        InvitationEvent::Cancel,
        InvitationEvent::Resend,
    ];

    /// States the event may leave from
    pub fn sources(&self) -> &'static [InvitationStatus] {
        match self {
            InvitationEvent::Accept | InvitationEvent::Cancel => &[InvitationStatus::Pending],
            InvitationEvent::Resend => &[InvitationStatus::Pending, InvitationStatus::Expired],
        }
    }

    pub fn target(&self) -> InvitationStatus {
        match self {
            InvitationEvent::Accept => InvitationStatus::Accepted,
            InvitationEvent::Cancel => InvitationStatus::Cancelled,
            InvitationEvent::Resend => InvitationStatus::Pending,
        }
    }

    fn rejection(&self) -> AppError {
        match self {
            InvitationEvent::Accept => AppError::AlreadyUsed,
            InvitationEvent::Cancel | InvitationEvent::Resend => {
                AppError::not_found(INVITATIONS.entity, "no invitation in a valid state")
            }
        }
    }

    /// `"status" IN ('pending', ...)`
    fn source_predicate(&self) -> String {
        let states = self
            .sources()
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} IN ({})", ident("status"), states)
    }
}

/// Result of applying an event to a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given state
    To(InvitationStatus),
    /// Pending but past expiry: record `expired`, then refuse with `Expired`
    ExpireAndReject,
    /// Refuse without side effect
    Reject,
}

/// The transition table. `lapsed` is whether the expiry time has passed.
pub fn transition(status: InvitationStatus, event: InvitationEvent, lapsed: bool) -> Transition {
    if !event.sources().contains(&status) {
        return Transition::Reject;
    }
    if event == InvitationEvent::Accept && lapsed {
        return Transition::ExpireAndReject;
    }
    Transition::To(event.target())
}

record! {
    pub struct Invitation {
        id: String => "id",
        organization_id: String => "organization_id",
        email: String => "email",
        role: String => "role",
        token: String => "token",
        invited_by: String => "invited_by",
        status: String => "status",
        expires_at: DateTime<Utc> => "expires_at",
        accepted_at: Option<DateTime<Utc>> => "accepted_at",
        accepted_by: Option<String> => "accepted_by",
        created_at: DateTime<Utc> => "created_at",
        updated_at: DateTime<Utc> => "updated_at",
    }
}

impl Invitation {
    pub fn state(&self) -> Result<InvitationStatus> {
        self.status.parse()
    }

    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

pub(crate) const INVITATIONS: Table = Table::new(
    "invitations",
    "invitation",
    Invitation::COLUMNS,
    &["id"],
)
.updated_at("updated_at")
.order_by(&[("created_at", Order::Desc), ("id", Order::Asc)]);

/// URL-safe token from 32 random bytes
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Id,
    Token,
}

impl Lookup {
    fn column(&self) -> &'static str {
        match self {
            Lookup::Id => "id",
            Lookup::Token => "token",
        }
    }
}

#[derive(Clone)]
pub struct InvitationRepository {
    db: Arc<dyn Db>,
    clock: Arc<dyn Clock>,
}

impl InvitationRepository {
    pub fn new(db: Arc<dyn Db>) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Arc<dyn Db>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// New pending invitation with a fresh token, valid for seven days
    pub async fn create(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        email: &str,
        role: Option<&str>,
        invited_by: &str,
    ) -> Result<Invitation> {
        let now = self.clock.now();
        let invitation = Invitation {
            id: new_id(),
            organization_id: organization_id.to_string(),
            email: email.to_string(),
            role: role.filter(|r| !r.is_empty()).unwrap_or(DEFAULT_ROLE).to_string(),
            token: generate_token(),
            invited_by: invited_by.to_string(),
            status: InvitationStatus::Pending.to_string(),
            expires_at: now + Duration::days(INVITATION_TTL_DAYS),
            accepted_at: None,
            accepted_by: None,
            created_at: now,
            updated_at: now,
        };
        let created = super::insert(self.db.as_ref(), ctx, &INVITATIONS, &invitation).await?;
        info!(
            invitation_id = %created.id,
            organization_id = %organization_id,
            "Invitation created"
        );
        Ok(created)
    }

    pub async fn get_by_id(&self, ctx: &TenantContext, id: &str) -> Result<Invitation> {
        super::get(
            self.db.as_ref(),
            ctx,
            &INVITATIONS,
            Params::new().bind(id.to_string()),
            || id.to_string(),
        )
        .await
    }

    pub async fn get_by_token(&self, ctx: &TenantContext, token: &str) -> Result<Invitation> {
        super::find(
            self.db.as_ref(),
            ctx,
            &INVITATIONS,
            &["token"],
            Params::new().bind(token.to_string()),
            || "token".to_string(),
        )
        .await
    }

    /// Pending, unexpired invitation for `email` into `organization_id`
    pub async fn get_pending_by_email_and_organization(
        &self,
        ctx: &TenantContext,
        email: &str,
        organization_id: &str,
    ) -> Result<Invitation> {
        let sql = format!(
            "{} AND {} = 'pending' AND {} > $3 LIMIT 1",
            INVITATIONS.select_where(&["email", "organization_id"]),
            ident("status"),
            ident("expires_at")
        );
        let params = Params::new()
            .bind(email.to_string())
            .bind(organization_id.to_string())
            .bind(self.clock.now());
        let res = self.db.query_row(ctx, &sql, params).await;
        super::or_not_found(res.and_then(|row| row.scan()), &INVITATIONS, || {
            format!("pending {} in {}", email, organization_id)
        })
    }

    /// Invitations of one organization, optionally of one status
    pub async fn list(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        status: Option<InvitationStatus>,
        page: Page,
    ) -> Result<Vec<Invitation>> {
        let params = Params::new().bind(organization_id.to_string());
        match status {
            Some(status) => {
                super::list_where(
                    self.db.as_ref(),
                    ctx,
                    &INVITATIONS,
                    &["organization_id", "status"],
                    params.bind(status.to_string()),
                    page,
                )
                .await
            }
            None => {
                super::list_where(
                    self.db.as_ref(),
                    ctx,
                    &INVITATIONS,
                    &["organization_id"],
                    params,
                    page,
                )
                .await
            }
        }
    }

    pub async fn accept(
        &self,
        ctx: &TenantContext,
        id: &str,
        accepted_by: &str,
    ) -> Result<Invitation> {
        self.accept_where(ctx, Lookup::Id, id, accepted_by).await
    }

    pub async fn accept_by_token(
        &self,
        ctx: &TenantContext,
        token: &str,
        accepted_by: &str,
    ) -> Result<Invitation> {
        self.accept_where(ctx, Lookup::Token, token, accepted_by).await
    }

    async fn accept_where(
        &self,
        ctx: &TenantContext,
        lookup: Lookup,
        value: &str,
        accepted_by: &str,
    ) -> Result<Invitation> {
        let now = self.clock.now();
        let event = InvitationEvent::Accept;

        let sql = format!(
            "UPDATE {} SET {} = '{}', {} = $2, {} = $3, {} = $2 \
             WHERE {} = $1 AND {} AND {} > $2 RETURNING {}",
            ident(INVITATIONS.name),
            ident("status"),
            event.target().as_str(),
            ident("accepted_at"),
            ident("accepted_by"),
            ident("updated_at"),
            ident(lookup.column()),
            event.source_predicate(),
            ident("expires_at"),
            column_list(INVITATIONS.columns)
        );
        let params = Params::new()
            .bind(value.to_string())
            .bind(now)
            .bind(accepted_by.to_string());
        let row = self.db.query_row(ctx, &sql, params).await?;
        if !row.is_empty() {
            let accepted: Invitation = row.scan()?;
            metrics::record_invitation("accepted");
            info!(invitation_id = %accepted.id, "Invitation accepted");
            return Ok(accepted);
        }
        drop(row);

        // not accepted: lapsed pending rows flip to expired here
        let sql = format!(
            "UPDATE {} SET {} = '{}', {} = $2 WHERE {} = $1 AND {} AND {} <= $2",
            ident(INVITATIONS.name),
            ident("status"),
            InvitationStatus::Expired.as_str(),
            ident("updated_at"),
            ident(lookup.column()),
            event.source_predicate(),
            ident("expires_at")
        );
        let tag = self
            .db
            .exec(ctx, &sql, Params::new().bind(value.to_string()).bind(now))
            .await?;
        if tag.rows_affected() > 0 {
            metrics::record_invitation("expired");
            debug!(lookup = lookup.column(), "Invitation expired on accept");
            return Err(AppError::Expired);
        }

        let current = match lookup {
            Lookup::Id => self.get_by_id(ctx, value).await?,
            Lookup::Token => self.get_by_token(ctx, value).await?,
        };
        match transition(current.state()?, event, current.is_lapsed(now)) {
            Transition::ExpireAndReject => Err(AppError::Expired),
            // lost a race with another accept
            Transition::To(_) | Transition::Reject => Err(event.rejection()),
        }
    }

    pub async fn cancel(&self, ctx: &TenantContext, id: &str) -> Result<Invitation> {
        let now = self.clock.now();
        let event = InvitationEvent::Cancel;
        let sql = format!(
            "UPDATE {} SET {} = '{}', {} = $2 WHERE {} = $1 AND {} RETURNING {}",
            ident(INVITATIONS.name),
            ident("status"),
            event.target().as_str(),
            ident("updated_at"),
            ident("id"),
            event.source_predicate(),
            column_list(INVITATIONS.columns)
        );
        let params = Params::new().bind(id.to_string()).bind(now);
        let res = self.db.query_row(ctx, &sql, params).await;
        let cancelled: Invitation =
            super::or_not_found(res.and_then(|row| row.scan()), &INVITATIONS, || id.to_string())?;
        metrics::record_invitation("cancelled");
        Ok(cancelled)
    }

    /// Fresh token and expiry for a pending or expired invitation
    pub async fn resend(&self, ctx: &TenantContext, id: &str) -> Result<Invitation> {
        let now = self.clock.now();
        let event = InvitationEvent::Resend;
        let sql = format!(
            "UPDATE {} SET {} = '{}', {} = $2, {} = $3, {} = $4 WHERE {} = $1 AND {} RETURNING {}",
            ident(INVITATIONS.name),
            ident("status"),
            event.target().as_str(),
            ident("token"),
            ident("expires_at"),
            ident("updated_at"),
            ident("id"),
            event.source_predicate(),
            column_list(INVITATIONS.columns)
        );
        let params = Params::new()
            .bind(id.to_string())
            .bind(generate_token())
            .bind(now + Duration::days(INVITATION_TTL_DAYS))
            .bind(now);
        let res = self.db.query_row(ctx, &sql, params).await;
        let resent: Invitation =
            super::or_not_found(res.and_then(|row| row.scan()), &INVITATIONS, || id.to_string())?;
        metrics::record_invitation("resent");
        Ok(resent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use InvitationEvent::*;
    use InvitationStatus::*;

    #[test]
    fn test_defined_transitions() {
        assert_eq!(transition(Pending, Accept, false), Transition::To(Accepted));
        assert_eq!(transition(Pending, Accept, true), Transition::ExpireAndReject);
        assert_eq!(transition(Pending, Cancel, false), Transition::To(Cancelled));
        assert_eq!(transition(Pending, Resend, true), Transition::To(Pending));
        assert_eq!(transition(Expired, Resend, true), Transition::To(Pending));
    }

    #[test]
    fn test_everything_else_is_rejected() {
        let defined = [
            (Pending, Accept),
            (Pending, Cancel),
            (Pending, Resend),
            (Expired, Resend),
        ];
        for status in InvitationStatus::ALL {
            for event in InvitationEvent::ALL {
                if defined.contains(&(status, event)) {
                    continue;
                }
                for lapsed in [false, true] {
                    assert_eq!(
                        transition(status, event, lapsed),
                        Transition::Reject,
                        "{:?} + {:?} (lapsed={})",
                        status,
                        event,
                        lapsed
                    );
                }
            }
        }
    }

    #[test]
    fn test_rejections_by_event() {
        assert!(matches!(Accept.rejection(), AppError::AlreadyUsed));
        assert!(matches!(Cancel.rejection(), AppError::NotFound { .. }));
        assert!(matches!(Resend.rejection(), AppError::NotFound { .. }));
    }

    #[test]
    fn test_source_predicate() {
        assert_eq!(Accept.source_predicate(), "\"status\" IN ('pending')");
        assert_eq!(
            Resend.source_predicate(),
            "\"status\" IN ('pending', 'expired')"
        );
    }

    #[test]
    fn test_status_text_round_trip() {
        for status in InvitationStatus::ALL {
            assert_eq!(status.as_str().parse::<InvitationStatus>().unwrap(), status);
        }
        assert!("revoked".parse::<InvitationStatus>().is_err());
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = generate_token();
        assert_eq!(token.len(), 43);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(token, generate_token());
    }
}
