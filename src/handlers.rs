use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::auth::SessionGuard;
use crate::config::Config;
use crate::error::ServiceError;
use crate::links::LinkManager;
use crate::middleware::ClientIp;
use crate::rate_limiter::RateLimiterRegistry;
use crate::response::ApiResponse;
use crate::session::{Session, SessionStore};
use crate::stats::StatsAggregator;
use crate::store::{
    AccessLogStore, LinkAccessEvent, LinkStore, MemoryAccessLogStore, MemoryLinkStore,
};

const CAPTCHA_LENGTH: usize = 6;
const HASH_LENGTH: usize = 8;

// Ambiguous glyphs (0/O, 1/l/I) left out.
const CAPTCHA_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";

/// Shared application state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiterRegistry>,
    pub sessions: Arc<SessionStore>,
    pub link_store: Arc<dyn LinkStore>,
    pub access_log: Arc<dyn AccessLogStore>,
    pub stats: Arc<StatsAggregator>,
    pub link_manager: Arc<LinkManager>,
}

impl AppState {
    /// Builds the state with in-memory stores and the session backend
    /// selected by the configuration.
    pub fn new(config: Config) -> crate::error::Result<Self> {
        let sessions = if config.session_redis_url.is_empty() {
            Arc::new(SessionStore::memory())
        } else {
            Arc::new(SessionStore::redis(&config.session_redis_url)?)
        };

        let link_store: Arc<dyn LinkStore> = Arc::new(MemoryLinkStore::new());
        let access_log: Arc<dyn AccessLogStore> = Arc::new(MemoryAccessLogStore::new());
        Ok(Self::with_stores(config, sessions, link_store, access_log))
    }

    pub fn with_stores(
        config: Config,
        sessions: Arc<SessionStore>,
        link_store: Arc<dyn LinkStore>,
        access_log: Arc<dyn AccessLogStore>,
    ) -> Self {
        let limiter = Arc::new(RateLimiterRegistry::new(
            config.limit_rate,
            config.limit_burst,
            config.limit_timeout(),
        ));
        let guard = Arc::new(SessionGuard::new(Arc::clone(&link_store)));
        let stats = Arc::new(StatsAggregator::new(
            Arc::clone(&guard),
            Arc::clone(&access_log),
        ));
        let link_manager = Arc::new(LinkManager::new(
            guard,
            Arc::clone(&link_store),
            Arc::clone(&access_log),
        ));

        Self {
            config: Arc::new(config),
            limiter,
            sessions,
            link_store,
            access_log,
            stats,
            link_manager,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatsLinkRequest {
    #[validate(length(min = 1, max = 64))]
    pub hash: String,
    #[validate(length(min = 1, max = 6))]
    pub captcha: String,
    #[serde(default)]
    pub token: String,
    pub page: u64,
    pub size: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteLinkRequest {
    #[validate(length(min = 1, max = 64))]
    pub hash: String,
    #[validate(length(min = 1, max = 6))]
    pub captcha: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateLinkRequest {
    #[serde(rename = "link")]
    #[validate(url)]
    pub url: String,
    #[validate(length(min = 1, max = 6))]
    pub captcha: String,
    #[serde(default, rename = "pwd")]
    #[validate(length(max = 8))]
    pub password: String,
}

/// Service liveness probe.
pub async fn ping() -> impl IntoResponse {
    ApiResponse::success(json!({ "msg": "pong" }))
}

/// Issues a fresh captcha challenge bound to the caller's session.
///
/// The answer is returned in the payload; rendering it as an image is a
/// presentation concern this core does not own.
pub async fn issue_captcha(
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ServiceError> {
    let answer = generate_captcha_answer(CAPTCHA_LENGTH);
    session.set_captcha(&answer).await?;

    Ok(ApiResponse::success(json!({ "captcha": answer })))
}

/// Creates a short link. One captcha answer buys one attempt.
pub async fn generate_link(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<GenerateLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(req) = deserialize(payload)?;
    validate(&req)?;

    let hash = generate_hash();
    let link = state
        .link_manager
        .create_link(&session, &req.captcha, hash, req.url, req.password)
        .await?;

    Ok(ApiResponse::success(json!({
        "hash": link.hash,
        "url": link.url,
    })))
}

/// Paginated access statistics for one link.
pub async fn stats_link(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<StatsLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(req) = deserialize(payload)?;
    validate(&req)?;

    let page = state
        .stats
        .get_stats(
            &session,
            &req.hash,
            &req.token,
            &req.captcha,
            req.page,
            req.size,
        )
        .await?;

    Ok(ApiResponse::success(page))
}

/// Deletes a link and its access log.
pub async fn delete_link(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Json<DeleteLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServiceError> {
    let Json(req) = deserialize(payload)?;
    validate(&req)?;

    state
        .link_manager
        .delete_link(&session, &req.hash, &req.token, &req.captcha)
        .await?;

    Ok(ApiResponse::success(json!({ "hash": req.hash })))
}

/// Resolves a short link and records the access event.
pub async fn redirect(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Extension(ClientIp(client_ip)): Extension<ClientIp>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let link = state
        .link_store
        .find(&hash)
        .ok_or(ServiceError::NotFound)?;

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    state
        .access_log
        .append(LinkAccessEvent::now(&hash, &client_ip, user_agent));

    Ok(Redirect::temporary(&link.url).into_response())
}

fn deserialize<T>(payload: Result<Json<T>, JsonRejection>) -> Result<Json<T>, ServiceError> {
    payload.map_err(|rejection| {
        tracing::debug!(
            target: "linkshortener::handlers",
            reason = %rejection.body_text(),
            "deserialization failed"
        );
        ServiceError::InvalidArgument("malformed request body".into())
    })
}

fn validate<T: Validate>(req: &T) -> Result<(), ServiceError> {
    req.validate()
        .map_err(|e| ServiceError::InvalidArgument(e.to_string()))
}

fn generate_captcha_answer(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CAPTCHA_CHARSET[rng.gen_range(0..CAPTCHA_CHARSET.len())] as char)
        .collect()
}

fn generate_hash() -> String {
    Uuid::new_v4().simple().to_string()[..HASH_LENGTH].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captcha_answer_shape() {
        let answer = generate_captcha_answer(CAPTCHA_LENGTH);
        assert_eq!(answer.len(), CAPTCHA_LENGTH);
        assert!(answer.bytes().all(|b| CAPTCHA_CHARSET.contains(&b)));
    }

    #[test]
    fn test_generated_hashes_differ() {
        let a = generate_hash();
        let b = generate_hash();
        assert_eq!(a.len(), HASH_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stats_request_validation() {
        let req = StatsLinkRequest {
            hash: "abc123".into(),
            captcha: "aB3x9Z".into(),
            token: "s3cret".into(),
            page: 1,
            size: 10,
        };
        assert!(req.validate().is_ok());

        let req = StatsLinkRequest {
            hash: "".into(),
            ..req
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_generate_request_rejects_non_url() {
        let req = GenerateLinkRequest {
            url: "not a url".into(),
            captcha: "aB3x9Z".into(),
            password: "pw".into(),
        };
        assert!(req.validate().is_err());
    }
}
