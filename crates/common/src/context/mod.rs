//! Per-request tenant context
//!
//! A `TenantContext` carries the organization a request acts for, an optional
//! authenticated principal, a deadline and a cancellation token from the
//! request boundary down to every database call. There is no process-wide
//! tenant state; each request builds its own value and drops it when done.
//!
//! An absent organization is not an error here. The RLS pool reads it and
//! decides whether to bind or to go straight to the raw pool.

use crate::errors::{AppError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Authenticated caller, taken from a validated access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub display_name: String,
    pub is_superadmin: bool,
}

/// Immutable request context
#[derive(Debug, Clone)]
pub struct TenantContext {
    organization_id: Option<String>,
    principal: Option<Principal>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl TenantContext {
    /// Context with no tenant, no deadline and a fresh cancellation token
    pub fn background() -> Self {
        Self {
            organization_id: None,
            principal: None,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Derive a context bound to `organization_id`
    ///
    /// The id is opaque. Whether it names a real organization is for the
    /// database to decide.
    pub fn with_organization_id(&self, organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
            ..self.clone()
        }
    }

    /// Derive a context with the tenant removed
    pub fn without_organization(&self) -> Self {
        Self {
            organization_id: None,
            ..self.clone()
        }
    }

    /// Organization bound to this context, if any
    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    pub fn with_principal(&self, principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            ..self.clone()
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Derive a context that expires at `deadline`; an earlier existing
    /// deadline is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current < deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a context whose token is a child of this one. Cancelling the
    /// child leaves the parent untouched.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail fast when the context is already done
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Err(AppError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Drive `fut` until it completes, the context is cancelled or the
    /// deadline passes. Dropping the future on the losing branches is what
    /// interrupts an in-flight statement and returns its connection.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(AppError::Cancelled),
                    res = tokio::time::timeout_at(deadline, fut) => {
                        res.unwrap_or(Err(AppError::DeadlineExceeded))
                    }
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Err(AppError::Cancelled),
                    res = fut => res,
                }
            }
        }
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::background()
    }
}
