//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → client.rs (derive client key, classify route)
//!     → rate_limit.rs (fixed-window check for that class)
//!     → headers.rs (X-RateLimit-* on admit, 429 + Retry-After on reject)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Reject before any business logic runs
//! - Counting is in-memory and per-process
//! - No trust in client input beyond the identity approximation

pub mod client;
pub mod headers;
pub mod rate_limit;

pub use client::{client_identifier, RouteClass};
pub use rate_limit::{RateLimitOutcome, RateLimitStats, RateLimiter};
