//! HTTP middleware and request extractors

pub mod rate_limit;
pub mod tenant;

pub use rate_limit::{create_rate_limiter, rate_limit, GlobalRateLimiter};
pub use tenant::{Authenticated, Tenant};
