//! FleetCore Common Library
//!
//! Shared code for the FleetCore services:
//! - Tenant context and the RLS-bound connection pool
//! - Entity repositories for every back-office table
//! - Error types and handling
//! - Configuration management
//! - JWT and OAuth authentication
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod repository;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::{Principal, TenantContext};
pub use db::{Db, DbPool, RlsPool};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
