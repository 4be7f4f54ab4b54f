//! Throttle key derivation from request metadata.

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header carrying the client chain set by proxies.
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Header carrying the client address set by the edge proxy.
pub const REAL_IP: &str = "x-real-ip";
/// Header carrying the tenant identifier.
pub const TENANT_ID: &str = "x-tenant-id";
/// Identity used when no identifying header is present.
pub const UNKNOWN: &str = "unknown";

/// The parts of a request a throttle looks at.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleRequest<'a> {
    /// Headers used for key derivation
    pub headers: &'a HeaderMap,
    /// Request path, for logging only
    pub path: &'a str,
}

impl<'a> ThrottleRequest<'a> {
    pub fn new(headers: &'a HeaderMap, path: &'a str) -> Self {
        Self { headers, path }
    }

    /// Build from any `http` request.
    pub fn from_http<B>(request: &'a axum::http::Request<B>) -> Self {
        Self {
            headers: request.headers(),
            path: request.uri().path(),
        }
    }

    /// Non-empty value of a header, if it is valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    }
}

/// Derives the throttle key for a request.
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, request: &ThrottleRequest<'_>) -> String;
}

impl<F> KeyExtractor for F
where
    F: Fn(&ThrottleRequest<'_>) -> String + Send + Sync,
{
    fn extract(&self, request: &ThrottleRequest<'_>) -> String {
        self(request)
    }
}

/// The standard key derivation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyStrategy {
    /// Key by client address: `ip:<addr>`
    Ip,
    /// Key by tenant identifier: `tenant:<id>`
    Tenant,
}

impl KeyExtractor for KeyStrategy {
    fn extract(&self, request: &ThrottleRequest<'_>) -> String {
        match self {
            KeyStrategy::Ip => format!("ip:{}", client_ip(request)),
            KeyStrategy::Tenant => {
                format!("tenant:{}", request.header(TENANT_ID).unwrap_or(UNKNOWN))
            }
        }
    }
}

/// Client address from the forwarding headers.
///
/// Takes the first hop of `x-forwarded-for`, then `x-real-ip`.
fn client_ip<'a>(request: &ThrottleRequest<'a>) -> &'a str {
    request
        .header(FORWARDED_FOR)
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| request.header(REAL_IP).map(str::trim))
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn ip_key(pairs: &[(&'static str, &'static str)]) -> String {
        let headers = headers(pairs);
        KeyStrategy::Ip.extract(&ThrottleRequest::new(&headers, "/api/leads"))
    }

    #[test]
    fn test_ip_key_uses_first_forwarded_hop() {
        let key = ip_key(&[(FORWARDED_FOR, " 1.2.3.4 , 10.0.0.1, 10.0.0.2")]);
        assert_eq!(key, "ip:1.2.3.4");
    }

    #[test]
    fn test_ip_key_falls_back_to_real_ip() {
        assert_eq!(ip_key(&[(REAL_IP, "5.6.7.8")]), "ip:5.6.7.8");
    }

    #[test]
    fn test_forwarded_for_wins_over_real_ip() {
        let key = ip_key(&[(FORWARDED_FOR, "1.1.1.1"), (REAL_IP, "2.2.2.2")]);
        assert_eq!(key, "ip:1.1.1.1");
    }

    #[test]
    fn test_empty_first_forwarded_hop_falls_back() {
        let key = ip_key(&[(FORWARDED_FOR, ", 9.9.9.9"), (REAL_IP, "5.5.5.5")]);
        assert_eq!(key, "ip:5.5.5.5");

        assert_eq!(ip_key(&[(FORWARDED_FOR, " , 9.9.9.9")]), "ip:unknown");
    }

    #[test]
    fn test_ip_key_without_headers_is_unknown() {
        assert_eq!(ip_key(&[]), "ip:unknown");
        assert_eq!(ip_key(&[(FORWARDED_FOR, "")]), "ip:unknown");
    }

    #[test]
    fn test_tenant_key() {
        let with = headers(&[(TENANT_ID, "acme")]);
        let without = HeaderMap::new();

        assert_eq!(
            KeyStrategy::Tenant.extract(&ThrottleRequest::new(&with, "/")),
            "tenant:acme"
        );
        assert_eq!(
            KeyStrategy::Tenant.extract(&ThrottleRequest::new(&without, "/")),
            "tenant:unknown"
        );
    }

    fn by_path(request: &ThrottleRequest<'_>) -> String {
        format!("path:{}", request.path)
    }

    #[test]
    fn test_function_extractor() {
        let headers = HeaderMap::new();

        assert_eq!(
            by_path.extract(&ThrottleRequest::new(&headers, "/dashboard")),
            "path:/dashboard"
        );
    }

    #[test]
    fn test_strategy_deserializes_lowercase() {
        let strategy: KeyStrategy = serde_yaml::from_str("tenant").unwrap();
        assert_eq!(strategy, KeyStrategy::Tenant);
    }
}
