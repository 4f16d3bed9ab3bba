//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (orchestrator.rs):
//!     Probe collaborators → Start health monitor and rate-limit sweeper
//!
//! Shutdown (shutdown.rs, orchestrator.rs):
//!     Signal received → Stop accepting → Join background tasks
//!     → Shut collaborators down concurrently
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Collaborator failures during startup are logged, never fatal
//! - Shutdown never fails and is safe to call more than once

pub mod orchestrator;
pub mod shutdown;
pub mod signals;

pub use orchestrator::{Collaborators, ComponentFlags, InitOptions, InitSummary, ResilienceOrchestrator};
pub use shutdown::Shutdown;
