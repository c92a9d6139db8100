//! Client identification.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};

use crate::auth::ClientInfo;
use crate::web::state::AppState;

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    headers
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Extract the client IP.
///
/// The socket address is authoritative. Proxy headers (`X-Forwarded-For`
/// first hop, then `X-Real-IP`) are read only when `trust_proxy` is set.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> Option<String> {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(headers) {
            return Some(ip);
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

/// Describe the calling client for audit events.
pub fn client_info(
    headers: &HeaderMap,
    extensions: &Extensions,
    path: &str,
    trust_proxy: bool,
) -> ClientInfo {
    ClientInfo {
        ip: client_ip(headers, extensions, trust_proxy),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        path: Some(path.to_string()),
    }
}

/// Extractor for [`ClientInfo`].
#[derive(Debug, Clone)]
pub struct ClientMeta(pub ClientInfo);

#[async_trait]
impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientMeta(client_info(
            &parts.headers,
            &parts.extensions,
            parts.uri.path(),
            state.trust_proxy,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer(ip: [u8; 4]) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from((ip, 4000))));
        extensions
    }

    fn proxied() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("X-Real-IP", HeaderValue::from_static("10.0.0.2"));
        headers
    }

    #[test]
    fn test_forwarded_for_first_hop_when_trusted() {
        assert_eq!(
            client_ip(&proxied(), &peer([10, 0, 0, 1]), true).as_deref(),
            Some("203.0.113.7")
        );
    }

    #[test]
    fn test_proxy_headers_ignored_when_untrusted() {
        assert_eq!(
            client_ip(&proxied(), &peer([192, 168, 1, 5]), false).as_deref(),
            Some("192.168.1.5")
        );
        assert!(client_ip(&proxied(), &Extensions::new(), false).is_none());
    }

    #[test]
    fn test_real_ip_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(
            client_ip(&headers, &Extensions::new(), true).as_deref(),
            Some("10.0.0.2")
        );
    }

    #[test]
    fn test_connect_info_fallback() {
        assert_eq!(
            client_ip(&HeaderMap::new(), &peer([192, 168, 1, 5]), true).as_deref(),
            Some("192.168.1.5")
        );
        assert!(client_ip(&HeaderMap::new(), &Extensions::new(), true).is_none());
    }

    #[test]
    fn test_client_info() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));
        let info = client_info(&headers, &Extensions::new(), "/api/auth/login", false);
        assert_eq!(info.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(info.path.as_deref(), Some("/api/auth/login"));
        assert!(info.ip.is_none());
    }
}
