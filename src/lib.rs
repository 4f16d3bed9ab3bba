//! Resilience layer for a chat backend: retries, timeouts, circuit breakers,
//! rate limiting, error reporting, and lifecycle orchestration of the
//! store-backed components.

// Foundations
pub mod clock;
pub mod config;
pub mod error;
pub mod store;

// Guards
pub mod resilience;
pub mod security;

// Reporting and component management
pub mod components;
pub mod health;
pub mod lifecycle;
pub mod reporting;

// Cross-cutting concerns
pub mod http;
pub mod observability;

pub use config::ResilienceConfig;
pub use error::{AppError, AppResult};
pub use http::HttpServer;
pub use lifecycle::{ResilienceOrchestrator, Shutdown};
