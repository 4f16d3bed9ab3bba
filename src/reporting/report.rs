//! Error reports, identifiers, and enhanced errors.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::reporting::context::{self, ErrorContext};

/// A shareable, type-erased error.
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Correlation id of the form `err_<epoch millis>_<base36>`.
///
/// Uniqueness is probabilistic: the random suffix makes collisions
/// negligible, nothing prevents them structurally.
pub fn generate_error_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("err_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Current time as an RFC 3339 string.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Class name for an error: the `AppError` class if it is one, `Error` otherwise.
pub fn error_name(error: &(dyn Error + 'static)) -> String {
    if let Some(app) = error.downcast_ref::<AppError>() {
        return app.name().to_string();
    }
    if let Some(enhanced) = error.downcast_ref::<EnhancedError>() {
        return enhanced.name.clone();
    }
    "Error".to_string()
}

/// The chain of `source()` errors, one per line.
pub fn source_chain(error: &(dyn Error + 'static)) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        lines.push(format!("caused by: {}", cause));
        current = cause.source();
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// A copy of an error annotated with context, capture time, and extra fields.
#[derive(Debug, Clone)]
pub struct EnhancedError {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub original_error: SharedError,
    pub context: ErrorContext,
    pub timestamp: String,
    pub extra: Map<String, Value>,
}

impl EnhancedError {
    /// Enhance `error` using `context` as the snapshot.
    pub fn new(error: SharedError, context: ErrorContext, extra: Map<String, Value>) -> Self {
        let name = error_name(error.as_ref());
        let stack = source_chain(error.as_ref());
        Self {
            name,
            message: error.to_string(),
            stack,
            original_error: error,
            context,
            timestamp: timestamp_now(),
            extra,
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for EnhancedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.original_error.as_ref())
    }
}

/// Enhance `error` with the process-wide context snapshot.
pub fn enhance_error<E>(error: E, extra: Map<String, Value>) -> EnhancedError
where
    E: Error + Send + Sync + 'static,
{
    EnhancedError::new(Arc::new(error), context::get_error_context(), extra)
}

/// Serializable record of one captured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub id: String,
    pub timestamp: String,
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub context: ErrorContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl ErrorReport {
    /// Build a report for `error` with a fresh id and timestamp.
    pub fn new(
        error: &(dyn Error + 'static),
        context: ErrorContext,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            id: generate_error_id(),
            timestamp: timestamp_now(),
            name: error_name(error),
            message: error.to_string(),
            stack: source_chain(error),
            user_id: context.user_id.clone(),
            session_id: context.session_id.clone(),
            context,
            metadata,
            url: None,
            user_agent: None,
            environment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::context::ErrorContextStore;
    use serde_json::json;

    fn matches_id_pattern(id: &str) -> bool {
        let mut parts = id.splitn(3, '_');
        parts.next() == Some("err")
            && parts
                .next()
                .is_some_and(|millis| !millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()))
            && parts.next().is_some_and(|suffix| {
                !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
            })
    }

    #[test]
    fn test_generate_error_id_format_and_uniqueness() {
        let id1 = generate_error_id();
        let id2 = generate_error_id();

        assert!(matches_id_pattern(&id1), "bad id {}", id1);
        assert!(matches_id_pattern(&id2), "bad id {}", id2);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_enhanced_error_keeps_message_and_adds_fields() {
        let store = ErrorContextStore::new();
        store.set(&ErrorContext::new().with_user_id("user123"));
        let mut extra = Map::new();
        extra.insert("extra".into(), json!("data"));

        let original: SharedError = Arc::new(AppError::internal("x"));
        let enhanced = EnhancedError::new(original.clone(), store.get(), extra);

        assert_eq!(enhanced.message, "x");
        assert_eq!(enhanced.to_string(), "x");
        assert_eq!(enhanced.context.user_id.as_deref(), Some("user123"));
        assert!(!enhanced.timestamp.is_empty());
        assert!(Arc::ptr_eq(&enhanced.original_error, &original));
        assert_eq!(enhanced.extra["extra"], "data");
        assert_eq!(enhanced.source().unwrap().to_string(), "x");
    }

    #[test]
    fn test_enhance_error_uses_global_context() {
        let enhanced = enhance_error(AppError::network("offline", None, None), Map::new());
        assert_eq!(enhanced.name, "NetworkError");
        assert_eq!(enhanced.message, "offline");
        assert!(chrono::DateTime::parse_from_rfc3339(&enhanced.timestamp).is_ok());
    }

    #[test]
    fn test_report_copies_identity_from_context() {
        let ctx = ErrorContext::new().with_user_id("u1").with_session_id("s1");
        let err = AppError::validation("bad", "email", "x");
        let report = ErrorReport::new(&err, ctx, None);

        assert!(matches_id_pattern(&report.id));
        assert_eq!(report.name, "ValidationError");
        assert_eq!(report.user_id.as_deref(), Some("u1"));
        assert_eq!(report.session_id.as_deref(), Some("s1"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["context"]["sessionId"], "s1");
        assert!(json.get("stack").is_none());
    }

    #[test]
    fn test_source_chain_becomes_stack() {
        let inner: SharedError = Arc::new(AppError::internal("disk full"));
        let outer = EnhancedError::new(inner, ErrorContext::default(), Map::new());
        let report = ErrorReport::new(&outer, ErrorContext::default(), None);

        assert_eq!(report.stack.as_deref(), Some("caused by: disk full"));
        assert_eq!(report.name, "Error");
    }
}
