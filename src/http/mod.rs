//! HTTP surface of the resilience layer.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → middleware/ (error capture, rate limiting)
//!     → handlers (liveness, system status, guarded store probe)
//!     → response.rs (AppError → status code and JSON body)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdGenerator, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
