//! Client identity and route classification for rate limiting.

use axum::http::HeaderMap;

use crate::config::{RateLimitConfig, WindowLimit};

/// Characters of the user agent kept in the client key.
const USER_AGENT_PREFIX: usize = 50;

/// Derive the rate-limit key for a request.
///
/// Uses the first `X-Forwarded-For` hop, then `X-Real-IP`, joined with a
/// truncated `User-Agent`. Distinct users behind the same address and agent
/// prefix share a key.
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let ip = forwarded
        .or_else(|| header_str(headers, "x-real-ip").filter(|v| !v.is_empty()))
        .unwrap_or("unknown");

    let user_agent = header_str(headers, "user-agent")
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown");
    let agent_prefix: String = user_agent.chars().take(USER_AGENT_PREFIX).collect();

    format!("{}-{}", ip, agent_prefix)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Route classes with their own limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Api,
    Auth,
    Ai,
    Upload,
    Strict,
}

impl RouteClass {
    /// Classify a request path. Non-API paths are not rate limited.
    pub fn from_path(path: &str) -> Option<Self> {
        if path.starts_with("/api/auth") {
            Some(Self::Auth)
        } else if path.starts_with("/api/claude") || path.starts_with("/api/ai") {
            Some(Self::Ai)
        } else if path.starts_with("/api/upload") || path.contains("/artifacts/save") {
            Some(Self::Upload)
        } else if path.starts_with("/api/admin") {
            Some(Self::Strict)
        } else if path.starts_with("/api") {
            Some(Self::Api)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Auth => "auth",
            Self::Ai => "ai",
            Self::Upload => "upload",
            Self::Strict => "strict",
        }
    }

    pub fn limit(&self, config: &RateLimitConfig) -> WindowLimit {
        match self {
            Self::Api => config.api,
            Self::Auth => config.auth,
            Self::Ai => config.ai,
            Self::Upload => config.upload,
            Self::Strict => config.strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_identifier_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));

        assert_eq!(client_identifier(&headers), "203.0.113.7-curl/8.0");
    }

    #[test]
    fn test_identifier_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_identifier(&headers), "10.0.0.2-unknown");

        assert_eq!(client_identifier(&HeaderMap::new()), "unknown-unknown");
    }

    #[test]
    fn test_identifier_truncates_user_agent() {
        let agent = "a".repeat(120);
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_str(&agent).unwrap());

        let id = client_identifier(&headers);
        assert_eq!(id, format!("unknown-{}", "a".repeat(50)));
    }

    #[test]
    fn test_route_classification() {
        assert_eq!(RouteClass::from_path("/api/auth/login"), Some(RouteClass::Auth));
        assert_eq!(RouteClass::from_path("/api/claude/stream"), Some(RouteClass::Ai));
        assert_eq!(RouteClass::from_path("/api/ai"), Some(RouteClass::Ai));
        assert_eq!(RouteClass::from_path("/api/upload/file"), Some(RouteClass::Upload));
        assert_eq!(RouteClass::from_path("/api/chat/artifacts/save"), Some(RouteClass::Upload));
        assert_eq!(RouteClass::from_path("/api/admin/users"), Some(RouteClass::Strict));
        assert_eq!(RouteClass::from_path("/api/search"), Some(RouteClass::Api));
        assert_eq!(RouteClass::from_path("/chat"), None);
    }

    #[test]
    fn test_limits_come_from_config() {
        let config = RateLimitConfig::default();
        assert_eq!(RouteClass::Strict.limit(&config), WindowLimit::new(60_000, 1));
        assert_eq!(RouteClass::Ai.limit(&config).max_requests, 30);
    }
}
