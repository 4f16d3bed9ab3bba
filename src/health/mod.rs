//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (monitor.rs):
//!     → StoreClient::health_check (bounded by a deadline)
//!     → bounded history, transition logs
//!
//! Status request (status.rs):
//!     collaborator stats + store availability + fallback state
//!     → overall healthy | degraded | unhealthy
//! ```
//!
//! # Design Decisions
//! - A failed or timed-out probe is recorded as unhealthy, never raised
//! - Status collection failures yield a zeroed, unhealthy snapshot

pub mod monitor;
pub mod status;

pub use monitor::{HealthHistory, HealthMonitor};
pub use status::{overall_health, SystemStatus};
