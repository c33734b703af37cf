use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::MonitorHandle;
use crate::error::{ErrorCode, SessionError, StorageError};
use crate::managers::StopResult;
use crate::session::Profile;
use crate::telemetry::TelemetryCounters;

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub handle: Arc<MonitorHandle>,
}

impl HttpState {
    pub fn new(handle: Arc<MonitorHandle>) -> Self {
        Self { handle }
    }
}

/// Envelope returned by every command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>, data: impl Serialize) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: serde_json::to_value(data).ok(),
        }
    }
}

/// HTTP error variants mapped to `CommandResult` responses.
#[derive(Debug)]
pub enum HttpServerError {
    BadRequest(String),
    Session(SessionError),
    Storage(StorageError),
}

impl From<SessionError> for HttpServerError {
    fn from(err: SessionError) -> Self {
        Self::Session(err)
    }
}

impl From<StorageError> for HttpServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, None, msg),
            Self::Session(err) => {
                let status = match err {
                    SessionError::AlreadyMeasuring | SessionError::NotMeasuring => {
                        StatusCode::CONFLICT
                    }
                    SessionError::InvalidProfile { .. } | SessionError::MissingProfile => {
                        StatusCode::BAD_REQUEST
                    }
                    SessionError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
                    SessionError::StatePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Some(err.code()), err.message())
            }
            Self::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(err.code()),
                err.message(),
            ),
        };

        let body = CommandResult {
            success: false,
            message,
            data: code.map(|code| serde_json::json!({ "code": code })),
        };
        (status, Json(body)).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub measuring: bool,
    pub sensor_connected: bool,
    pub counters: TelemetryCounters,
}

#[derive(Debug, Default, Deserialize)]
pub struct DayQuery {
    pub day: Option<String>,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/telemetry", get(telemetry))
        .route("/api/profile", get(get_profile).post(register_profile))
        .route("/api/session/start", post(start_session))
        .route("/api/session/stop", post(stop_session))
        .route("/api/sessions", get(list_sessions))
        .route("/api/pulses", get(pulse_stream_handler))
        .route("/api/live", get(live_stream_handler))
        .with_state(state)
}

/// Serve until the handle's shutdown signal fires.
pub async fn run_http_server(handle: Arc<MonitorHandle>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding HTTP listener on {}", addr))?;
    let mut shutdown = handle.shutdown_signal();
    let router = build_router(HttpState::new(handle));

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow_and_update() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .context("serving HTTP router")?;
    Ok(())
}

pub async fn health(State(state): State<HttpState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        measuring: state.handle.is_measuring(),
        sensor_connected: state.handle.sensor_connected(),
        counters: state.handle.telemetry().counters(),
    })
}

pub async fn stats(State(state): State<HttpState>) -> Json<CommandResult> {
    Json(CommandResult::ok("Live stats", state.handle.live_stats()))
}

pub async fn telemetry(State(state): State<HttpState>) -> Json<CommandResult> {
    Json(CommandResult::ok(
        "Telemetry snapshot",
        state.handle.telemetry().snapshot(),
    ))
}

pub async fn get_profile(State(state): State<HttpState>) -> Result<Json<CommandResult>, HttpServerError> {
    let result = match state.handle.profile()? {
        Some(profile) => CommandResult::ok("Profile registered", profile),
        None => CommandResult::ok("No profile registered", Value::Null),
    };
    Ok(Json(result))
}

pub async fn register_profile(
    State(state): State<HttpState>,
    Json(profile): Json<Profile>,
) -> Result<Json<CommandResult>, HttpServerError> {
    state.handle.register_profile(profile.clone())?;
    Ok(Json(CommandResult::ok(
        format!("Profile saved for {}", profile.display_name()),
        profile,
    )))
}

pub async fn start_session(
    State(state): State<HttpState>,
    profile: Option<Json<Profile>>,
) -> Result<Json<CommandResult>, HttpServerError> {
    let started = state.handle.start_session(profile.map(|Json(p)| p))?;
    Ok(Json(CommandResult::ok(
        format!("Measurement started for {}", started.display_name()),
        state.handle.live_stats(),
    )))
}

pub async fn stop_session(State(state): State<HttpState>) -> Result<Json<CommandResult>, HttpServerError> {
    let result = match state.handle.stop_session()? {
        StopResult::Completed { summary, persisted } => {
            let message = if persisted {
                "Measurement stopped and saved"
            } else {
                "Measurement stopped; saving failed"
            };
            CommandResult::ok(message, summary)
        }
        StopResult::NoData => CommandResult::ok("Measurement stopped; no data to save", Value::Null),
    };
    Ok(Json(result))
}

pub async fn list_sessions(
    State(state): State<HttpState>,
    Query(query): Query<DayQuery>,
) -> Result<Json<CommandResult>, HttpServerError> {
    let day = match query.day.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| HttpServerError::BadRequest(format!("invalid day {:?}, expected YYYY-MM-DD", raw)))?,
        None => Local::now().date_naive(),
    };
    let records = state.handle.history(day)?;
    Ok(Json(CommandResult::ok(
        format!("{} session(s) on {}", records.len(), day),
        records,
    )))
}

pub async fn pulse_stream_handler(State(state): State<HttpState>) -> sse::EventStream {
    sse::pulses(&state.handle)
}

pub async fn live_stream_handler(State(state): State<HttpState>) -> sse::EventStream {
    sse::live(&state.handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::engine::{ManualClock, SystemClock};
    use crate::storage::MemorySessionStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    fn handle() -> Arc<MonitorHandle> {
        Arc::new(MonitorHandle::with_parts(
            AppConfig::default(),
            Arc::new(SystemClock::default()),
            Arc::new(MemorySessionStore::new()),
        ))
    }

    const PROFILE: &str =
        r#"{"name":"Eva","age":33,"mass_kg":59.5,"height_cm":164,"sex":"female"}"#;

    async fn call(router: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router
            .oneshot(request.body(body).expect("request"))
            .await
            .expect("router call");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = serde_json::from_slice::<Value>(&bytes).expect("JSON body");
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_idle_monitor() {
        let router = build_router(HttpState::new(handle()));
        let (status, json) = call(router, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["measuring"], false);
    }

    #[tokio::test]
    async fn start_without_profile_is_structured_failure() {
        let router = build_router(HttpState::new(handle()));
        let (status, json) = call(router, "POST", "/api/session/start", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["data"]["code"], 3004);
    }

    #[tokio::test]
    async fn profile_then_start_then_stop() {
        let handle = handle();
        let router = build_router(HttpState::new(Arc::clone(&handle)));

        let (status, json) = call(router.clone(), "POST", "/api/profile", Some(PROFILE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["name"], "Eva");

        let (_, json) = call(router.clone(), "GET", "/api/profile", None).await;
        assert_eq!(json["data"]["sex"], "female");

        let (status, json) = call(router.clone(), "POST", "/api/session/start", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["measuring"], true);

        let (status, json) = call(router.clone(), "POST", "/api/session/start", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["data"]["code"], 3001);

        let (status, json) = call(router.clone(), "POST", "/api/session/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Measurement stopped; no data to save");

        let (status, _) = call(router, "POST", "/api/session/stop", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected() {
        let router = build_router(HttpState::new(handle()));
        let (status, json) = call(
            router,
            "POST",
            "/api/profile",
            Some(r#"{"name":"Eva","age":33,"sex":"female"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["data"]["code"], 3003);
    }

    #[tokio::test]
    async fn sessions_listing_validates_day() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let handle = Arc::new(MonitorHandle::with_parts(
            AppConfig::default(),
            clock,
            Arc::new(MemorySessionStore::new()),
        ));
        let router = build_router(HttpState::new(handle));

        let (status, _) = call(router.clone(), "GET", "/api/sessions?day=June", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = call(router, "GET", "/api/sessions?day=2025-06-01", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn stats_returns_snapshot() {
        let router = build_router(HttpState::new(handle()));
        let (status, json) = call(router, "GET", "/api/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["elapsed"], "00:00:00");
        assert_eq!(json["data"]["zone_name"], "No data");
    }

    #[tokio::test]
    async fn telemetry_lists_recent_events() {
        let handle = handle();
        handle.ingest("garbage", None).unwrap();
        let router = build_router(HttpState::new(handle));
        let (status, json) = call(router, "GET", "/api/telemetry", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["counters"]["samples_rejected"], 1);
        assert_eq!(json["data"]["recent"][0]["type"], "sample_rejected");
    }

    #[tokio::test]
    async fn live_stream_opens_with_current_snapshot() {
        use futures::StreamExt;

        let handle = handle();
        handle.start_session(Some(serde_json::from_str(PROFILE).unwrap())).unwrap();
        let router = build_router(HttpState::new(handle));

        let response = router
            .oneshot(Request::builder().uri("/api/live").body(Body::empty()).unwrap())
            .await
            .expect("router call");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let mut body = response.into_body().into_data_stream();
        let chunk = body.next().await.expect("first frame").expect("frame bytes");
        let frame = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(frame.contains("event: live"), "got {frame}");
        assert!(frame.contains("\"measuring\":true"), "got {frame}");
    }
}
