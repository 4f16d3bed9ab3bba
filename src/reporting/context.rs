//! Error context: user/session/operation metadata merged into reports.
//!
//! # Responsibilities
//! - Hold the current context behind an explicit, cloneable handle
//! - Merge updates field by field, last write wins
//! - Temporarily override the context for the duration of a closure/future
//!
//! # Design Decisions
//! - `ErrorContextStore` is passed to the reporter and to call sites that can
//!   thread it; `global()` and the free functions below are a compatibility
//!   shim for call sites that cannot
//! - Scoped overrides restore the snapshot taken on entry, even on panic;
//!   nested scopes restore only to their own entry snapshot
//! - Snapshots are copies; mutating one never touches the live context

use std::future::Future;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ambient metadata attached to captured errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Shallow merge: every field set in `other` replaces ours.
    /// `metadata` is replaced as a whole.
    pub fn merge(&mut self, other: &ErrorContext) {
        if other.user_id.is_some() {
            self.user_id.clone_from(&other.user_id);
        }
        if other.session_id.is_some() {
            self.session_id.clone_from(&other.session_id);
        }
        if other.operation.is_some() {
            self.operation.clone_from(&other.operation);
        }
        if other.metadata.is_some() {
            self.metadata.clone_from(&other.metadata);
        }
    }

    pub fn merged(&self, other: &ErrorContext) -> ErrorContext {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    pub fn is_empty(&self) -> bool {
        *self == ErrorContext::default()
    }
}

/// Shared, mutable error context.
#[derive(Debug, Clone, Default)]
pub struct ErrorContextStore {
    current: Arc<ArcSwap<ErrorContext>>,
}

impl ErrorContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `context` into the current context.
    pub fn set(&self, context: &ErrorContext) {
        self.current.rcu(|current| Arc::new(current.merged(context)));
    }

    /// Copy of the current context.
    pub fn get(&self) -> ErrorContext {
        self.current.load().as_ref().clone()
    }

    /// Reset to empty.
    pub fn clear(&self) {
        self.current.store(Arc::new(ErrorContext::default()));
    }

    /// Run `f` with `context` merged in, then restore the previous snapshot.
    pub fn with_scope<T>(&self, context: &ErrorContext, f: impl FnOnce() -> T) -> T {
        let _guard = self.enter(context);
        f()
    }

    /// Async form of [`with_scope`](Self::with_scope). The previous snapshot is
    /// restored when the future completes or is dropped.
    pub async fn with_scope_async<F, T>(&self, context: &ErrorContext, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let _guard = self.enter(context);
        fut.await
    }

    fn enter(&self, context: &ErrorContext) -> ScopeGuard<'_> {
        let saved = self.current.load_full();
        self.set(context);
        ScopeGuard { store: self, saved }
    }
}

/// Restores a saved snapshot on drop.
struct ScopeGuard<'a> {
    store: &'a ErrorContextStore,
    saved: Arc<ErrorContext>,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.store.current.store(self.saved.clone());
    }
}

static GLOBAL: OnceLock<ErrorContextStore> = OnceLock::new();

/// Process-wide context store (compatibility shim).
pub fn global() -> &'static ErrorContextStore {
    GLOBAL.get_or_init(ErrorContextStore::new)
}

pub fn set_error_context(context: &ErrorContext) {
    global().set(context);
}

pub fn get_error_context() -> ErrorContext {
    global().get()
}

pub fn clear_error_context() {
    global().clear();
}

pub fn with_error_context<T>(context: &ErrorContext, f: impl FnOnce() -> T) -> T {
    global().with_scope(context, f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_merges_fields() {
        let store = ErrorContextStore::new();
        store.set(&ErrorContext::new().with_user_id("u1"));
        store.set(&ErrorContext::new().with_session_id("s1"));

        assert_eq!(
            store.get(),
            ErrorContext::new().with_user_id("u1").with_session_id("s1")
        );

        store.clear();
        assert!(store.get().is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let store = ErrorContextStore::new();
        store.set(&ErrorContext::new().with_user_id("u1").with_operation("load"));
        store.set(&ErrorContext::new().with_user_id("u2"));

        let ctx = store.get();
        assert_eq!(ctx.user_id.as_deref(), Some("u2"));
        assert_eq!(ctx.operation.as_deref(), Some("load"));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = ErrorContextStore::new();
        store.set(&ErrorContext::new().with_user_id("u1"));

        let mut snapshot = store.get();
        snapshot.user_id = Some("mutated".into());

        assert_eq!(store.get().user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_scope_restores_previous() {
        let store = ErrorContextStore::new();
        store.set(&ErrorContext::new().with_user_id("u1"));

        let seen = store.with_scope(&ErrorContext::new().with_operation("upload"), || store.get());
        assert_eq!(seen.user_id.as_deref(), Some("u1"));
        assert_eq!(seen.operation.as_deref(), Some("upload"));

        assert_eq!(store.get(), ErrorContext::new().with_user_id("u1"));
    }

    #[test]
    fn test_nested_scope_restores_one_level() {
        let store = ErrorContextStore::new();
        store.with_scope(&ErrorContext::new().with_user_id("outer"), || {
            store.with_scope(&ErrorContext::new().with_user_id("inner"), || {
                assert_eq!(store.get().user_id.as_deref(), Some("inner"));
            });
            assert_eq!(store.get().user_id.as_deref(), Some("outer"));
        });
        assert!(store.get().is_empty());
    }

    #[test]
    fn test_scope_restores_on_panic() {
        let store = ErrorContextStore::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.with_scope(&ErrorContext::new().with_user_id("u1"), || panic!("boom"));
        }));

        assert!(result.is_err());
        assert!(store.get().is_empty());
    }

    #[tokio::test]
    async fn test_async_scope() {
        let store = ErrorContextStore::new();
        let user = store
            .with_scope_async(&ErrorContext::new().with_user_id("u1"), async {
                tokio::task::yield_now().await;
                store.get().user_id
            })
            .await;

        assert_eq!(user.as_deref(), Some("u1"));
        assert!(store.get().is_empty());
    }

    #[test]
    fn test_serializes_camel_case_without_nulls() {
        let mut metadata = Map::new();
        metadata.insert("plan".into(), json!("pro"));
        let ctx = ErrorContext::new().with_user_id("u1").with_metadata(metadata);

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, json!({"userId": "u1", "metadata": {"plan": "pro"}}));
    }
}
