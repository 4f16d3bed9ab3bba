//! Error capture and remote submission.
//!
//! # Responsibilities
//! - Build an [`ErrorReport`] from an error, the current context, and per-call extras
//! - Write a local diagnostic record for every captured error
//! - Submit sampled reports to a remote collector with linear-backoff retries
//!
//! # Design Decisions
//! - `log_error` always returns the report id; submission failures are
//!   logged and never surface to the caller
//! - Submission runs on a spawned task unless the reporter is built with
//!   `with_await_submission(true)`; [`ErrorReporter::flush`] waits for the
//!   spawned ones at shutdown
//! - `initialize_error_reporting` installs a process-wide reporter for call
//!   sites that cannot hold one; before that, a console-only default is used

use std::error::Error;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::ErrorReportingConfig;
use crate::observability::metrics;
use crate::reporting::context::{self, ErrorContext, ErrorContextStore};
use crate::reporting::report::{EnhancedError, ErrorReport, SharedError};
use crate::resilience::backoff::linear_backoff;

/// Per-call options for [`ErrorReporter::log_error`].
#[derive(Debug, Clone)]
pub struct LogErrorOptions {
    /// Merged over the current context for this report only.
    pub context: Option<ErrorContext>,
    pub metadata: Option<Map<String, Value>>,
    /// Opt out of remote submission for this report.
    pub send_to_server: bool,
    pub url: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for LogErrorOptions {
    fn default() -> Self {
        Self {
            context: None,
            metadata: None,
            send_to_server: true,
            url: None,
            user_agent: None,
        }
    }
}

impl LogErrorOptions {
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn local_only(mut self) -> Self {
        self.send_to_server = false;
        self
    }
}

/// Remote submission errors. Logged by the reporter, never returned by `log_error`.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no error reporting endpoint configured")]
    NoEndpoint,

    #[error("no submission attempts configured")]
    NoAttempts,

    #[error("report submission failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Captures errors locally and forwards them to a remote collector.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    config: Arc<ErrorReportingConfig>,
    context: ErrorContextStore,
    client: reqwest::Client,
    await_submission: bool,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ErrorReporter {
    pub fn new(config: ErrorReportingConfig, context: ErrorContextStore) -> Self {
        Self {
            config: Arc::new(config),
            context,
            client: reqwest::Client::new(),
            await_submission: false,
            in_flight: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Await remote submission inside `log_error` instead of spawning it.
    pub fn with_await_submission(mut self, await_submission: bool) -> Self {
        self.await_submission = await_submission;
        self
    }

    pub fn config(&self) -> &ErrorReportingConfig {
        &self.config
    }

    pub fn context(&self) -> &ErrorContextStore {
        &self.context
    }

    /// Capture `error` and return its report id.
    pub async fn log_error(
        &self,
        error: &(dyn Error + Send + Sync + 'static),
        options: LogErrorOptions,
    ) -> String {
        let mut context = self.context.get();
        if let Some(extra) = &options.context {
            context.merge(extra);
        }

        let mut report = ErrorReport::new(error, context, options.metadata);
        report.url = options.url;
        report.user_agent = options.user_agent;
        report.environment = Some(self.config.environment.clone());

        metrics::record_error_reported(&report.name);

        if self.config.enable_console_logging {
            tracing::error!(
                error_id = %report.id,
                context = ?report.context,
                metadata = ?report.metadata,
                "[{}] {}: {}",
                report.id,
                report.name,
                report.message
            );
        }

        if options.send_to_server && self.config.endpoint.is_some() && self.sampled() {
            let id = report.id.clone();
            if self.await_submission {
                self.submit_logged(report).await;
            } else {
                let reporter = self.clone();
                let handle = tokio::spawn(async move { reporter.submit_logged(report).await });
                let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
                in_flight.retain(|h| !h.is_finished());
                in_flight.push(handle);
            }
            return id;
        }

        report.id
    }

    /// Wait for every spawned submission to finish. Returns how many were awaited.
    pub async fn flush(&self) -> usize {
        let pending = std::mem::take(&mut *self.in_flight.lock().unwrap_or_else(PoisonError::into_inner));
        let count = pending.len();
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Error report submission task failed");
            }
        }
        count
    }

    fn sampled(&self) -> bool {
        let rate = self.config.sample_rate;
        if rate >= 1.0 {
            true
        } else if rate <= 0.0 {
            false
        } else {
            fastrand::f64() < rate
        }
    }

    async fn submit_logged(&self, report: ErrorReport) {
        if let Err(e) = self.submit(&report).await {
            tracing::warn!(error_id = %report.id, error = %e, "Failed to send error report");
        }
    }

    /// POST `report` to the configured endpoint, retrying with linear backoff.
    pub async fn submit(&self, report: &ErrorReport) -> Result<(), SubmitError> {
        let endpoint = self.config.endpoint.as_deref().ok_or(SubmitError::NoEndpoint)?;
        let attempts = self.config.max_retries;
        let base_delay = Duration::from_millis(self.config.retry_delay_ms);

        let mut last_error = None;
        for attempt in 1..=attempts {
            let mut request = self.client.post(endpoint).json(report);
            if let Some(key) = &self.config.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => {
                    tracing::debug!(error_id = %report.id, attempt, "Error report delivered");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(error_id = %report.id, attempt, error = %e, "Error report attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(linear_backoff(base_delay, attempt)).await;
                    }
                }
            }
        }

        match last_error {
            Some(source) => Err(SubmitError::Exhausted { attempts, source }),
            None => Err(SubmitError::NoAttempts),
        }
    }
}

static GLOBAL_REPORTER: OnceLock<ArcSwap<ErrorReporter>> = OnceLock::new();

fn global_slot() -> &'static ArcSwap<ErrorReporter> {
    GLOBAL_REPORTER.get_or_init(|| {
        ArcSwap::from_pointee(ErrorReporter::new(
            ErrorReportingConfig::default(),
            context::global().clone(),
        ))
    })
}

/// Install the process-wide reporter, bound to the global context store.
pub fn initialize_error_reporting(config: ErrorReportingConfig) {
    tracing::info!(
        endpoint = config.endpoint.as_deref().unwrap_or("none"),
        environment = %config.environment,
        sample_rate = config.sample_rate,
        "Error reporting initialized"
    );
    global_slot().store(Arc::new(ErrorReporter::new(config, context::global().clone())));
}

/// The process-wide reporter.
pub fn reporter() -> Arc<ErrorReporter> {
    global_slot().load_full()
}

/// Capture `error` with the process-wide reporter.
pub async fn log_error(
    error: &(dyn Error + Send + Sync + 'static),
    options: LogErrorOptions,
) -> String {
    reporter().log_error(error, options).await
}

/// Wrap `on_error` so that it never propagates a failure.
///
/// Each error is enhanced with the global context before it is handed over.
/// If the callback panics or returns `Err`, both the handler failure and the
/// original error are written to the log instead.
pub fn create_async_error_handler<F, E>(on_error: F) -> impl Fn(SharedError)
where
    F: Fn(EnhancedError) -> Result<(), E>,
    E: Display,
{
    move |error: SharedError| {
        let enhanced = EnhancedError::new(error.clone(), context::get_error_context(), Map::new());
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| on_error(enhanced))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };
        tracing::error!(error = %failure, "Error in error handler");
        tracing::error!(error = %error, "Original error");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
