//! Caller identity for audit and history records.

use crate::audit::{extract_client_ip, extract_user_agent};
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Client IP and user agent of the request.
///
/// The IP comes from `X-Forwarded-For`/`X-Real-IP`, falling back to the
/// connection's peer address when the server was started with
/// `into_make_service_with_connect_info::<SocketAddr>()`. Never rejects.
///
/// # Example
/// ```ignore
/// async fn compare(client: ClientContext, Json(body): Json<CompareRequest>) {
///     AuditEvent::new("pricing.compare", None, AuditOutcome::Success)
///         .with_ip(client.ip_address)
///         .log();
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self {
            ip_address: extract_client_ip(&parts.headers, peer),
            user_agent: extract_user_agent(&parts.headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn client_ip(request: Request<Body>) -> String {
        let app = Router::new().route(
            "/whoami",
            get(|client: ClientContext| async move {
                client.ip_address.unwrap_or_else(|| "unknown".to_string())
            }),
        );
        let response = app.oneshot(request).await.unwrap();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_peer_address_when_no_proxy_headers() {
        let mut request = Request::get("/whoami").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("198.51.100.4:40000".parse::<SocketAddr>().unwrap()));

        assert_eq!(client_ip(request).await, "198.51.100.4");
    }

    #[tokio::test]
    async fn test_forwarded_header_wins_over_peer() {
        let mut request = Request::get("/whoami")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("10.0.0.1:40000".parse::<SocketAddr>().unwrap()));

        assert_eq!(client_ip(request).await, "203.0.113.7");
    }

    #[tokio::test]
    async fn test_missing_everything_is_none() {
        let request = Request::get("/whoami").body(Body::empty()).unwrap();
        assert_eq!(client_ip(request).await, "unknown");
    }
}
