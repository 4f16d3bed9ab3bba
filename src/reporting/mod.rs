//! Error reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Caller error
//!     → context.rs (current context snapshot, scoped overrides)
//!     → report.rs (id, timestamp, class name, cause chain)
//!     → reporter.rs (local log record, sampled remote POST with retries)
//!     → report id returned to the caller
//! ```

pub mod context;
pub mod report;
pub mod reporter;

pub use context::{
    clear_error_context, get_error_context, set_error_context, with_error_context, ErrorContext,
    ErrorContextStore,
};
pub use report::{enhance_error, generate_error_id, EnhancedError, ErrorReport, SharedError};
pub use reporter::{
    create_async_error_handler, initialize_error_reporting, log_error, reporter, ErrorReporter,
    LogErrorOptions, SubmitError,
};
