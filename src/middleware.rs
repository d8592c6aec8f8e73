use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::info;
use uuid::Uuid;

use crate::handlers::AppState;
use crate::session::Session;

/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "session";

/// Client identity resolved once per request and shared via extensions.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

/// Request/response logging in the access-log format: status, latency,
/// client IP, method, URI. Also stashes the resolved `ClientIp` for the
/// gate and the redirect handler.
pub async fn request_logger(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let client_ip = get_client_ip(&request);
    request.extensions_mut().insert(ClientIp(client_ip.clone()));

    let start = Instant::now();
    let response = next.run(request).await;
    let latency = start.elapsed();

    info!(
        target: "linkshortener::middleware",
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        client_ip = %client_ip,
        method = %method,
        uri = %uri,
        "request completed"
    );

    response
}

/// Rate-limit gate for routed requests.
///
/// Mounted as a route layer, so unmatched paths (static fallback) bypass
/// it entirely and consume no tokens. On timeout the request is rejected
/// with 429 before reaching its handler.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let identity = match request.extensions().get::<ClientIp>() {
        Some(ip) => ip.0.clone(),
        None => get_client_ip(&request),
    };

    if let Err(err) = state.limiter.admit(&identity).await {
        return err.into_response();
    }

    next.run(request).await
}

/// Attaches a `Session` handle to every request.
///
/// Reads the session cookie, minting a fresh identifier when the caller
/// has none; a minted identifier is returned via `Set-Cookie` so the
/// browser presents it on the next request.
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let (id, minted) = match session_id_from_cookies(&request) {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let session = Session::new(id.clone(), state.sessions.clone());
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    if minted {
        let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
    }

    response
}

fn session_id_from_cookies(request: &Request) -> Option<String> {
    let cookies = request.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

/// Resolves the client address: trusted proxy headers first, then the
/// socket peer address.
pub fn get_client_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                return first_ip.trim().to_string();
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return ip_str.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        addr.ip().to_string()
    } else {
        "unknown".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_client_ip_with_forwarded_header() {
        let mut request = Request::new(axum::body::Body::empty());
        request.headers_mut().insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ip = get_client_ip(&request);
        assert_eq!(ip, "192.168.1.1");
    }

    #[test]
    fn test_get_client_ip_with_real_ip_header() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .headers_mut()
            .insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));

        let ip = get_client_ip(&request);
        assert_eq!(ip, "203.0.113.1");
    }

    #[test]
    fn test_get_client_ip_with_connect_info() {
        let mut request = Request::new(axum::body::Body::empty());
        request
            .extensions_mut()
            .insert(ConnectInfo("203.0.113.7:4242".parse::<SocketAddr>().unwrap()));

        let ip = get_client_ip(&request);
        assert_eq!(ip, "203.0.113.7");
    }

    #[test]
    fn test_get_client_ip_fallback() {
        let request = Request::new(axum::body::Body::empty());
        let ip = get_client_ip(&request);
        assert_eq!(ip, "unknown");
    }

    #[test]
    fn test_session_id_from_cookies() {
        let mut request = Request::new(axum::body::Body::empty());
        request.headers_mut().insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc-def; lang=en"),
        );

        assert_eq!(session_id_from_cookies(&request).as_deref(), Some("abc-def"));
    }

    #[test]
    fn test_missing_or_empty_session_cookie() {
        let request = Request::new(axum::body::Body::empty());
        assert!(session_id_from_cookies(&request).is_none());

        let mut request = Request::new(axum::body::Body::empty());
        request
            .headers_mut()
            .insert(header::COOKIE, HeaderValue::from_static("session="));
        assert!(session_id_from_cookies(&request).is_none());
    }
}
