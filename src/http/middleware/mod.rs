//! Request middleware.
//!
//! ```text
//! request → error_reporting (context from headers, capture AppError on the way out)
//!         → rate_limit (classify path, fixed-window check, 429 or headers)
//!         → handler
//! ```

pub mod error_reporting;
pub mod rate_limit;

pub use error_reporting::error_reporting_middleware;
pub use rate_limit::rate_limit_middleware;
