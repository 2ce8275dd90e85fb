//! Axum router and all HTTP handlers for essen-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use essen_lock::{
    GridLayout, InputEvent, LockError, LockView, PatternHasher, PreparedDigest, Stroke,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info};

use crate::{
    api_types::{AppGateResponse, HealthResponse, LayoutRequest, LockErrorResponse},
    state::{schedule_clear, uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/lock", get(lock_view))
        .route("/v1/lock/layout", post(lock_layout))
        .route("/v1/lock/input", post(lock_input))
        .route("/v1/app", get(app_gate))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            config_hash: st.config_hash.clone(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/lock
// ---------------------------------------------------------------------------

pub(crate) async fn lock_view(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let view = st.lock.lock().await.view();
    (StatusCode::OK, Json(view))
}

// ---------------------------------------------------------------------------
// POST /v1/lock/layout
// ---------------------------------------------------------------------------

pub(crate) async fn lock_layout(
    State(st): State<Arc<AppState>>,
    Json(req): Json<LayoutRequest>,
) -> Response {
    if !(req.bounds.width > 0.0 && req.bounds.height > 0.0) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(LockErrorResponse {
                error: "INVALID_LAYOUT".to_string(),
                message: "grid bounds must have a positive width and height".to_string(),
                view: None,
            }),
        )
            .into_response();
    }

    let layout = match req.centers {
        Some(centers) => GridLayout::new(req.bounds, centers),
        None => GridLayout::uniform(req.bounds),
    };
    let view = {
        let mut session = st.lock.lock().await;
        session.set_layout(layout);
        session.view()
    };
    (StatusCode::OK, Json(view)).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/lock/input
// ---------------------------------------------------------------------------

/// Feed one input event to the lock.
///
/// The session lock is released while a digest is computed on the blocking
/// pool; the machine refuses new strokes until the outcome is applied. The
/// digest runs to completion in its own task even if the client goes away,
/// so a dropped request never leaves the machine waiting on a digest.
pub(crate) async fn lock_input(
    State(st): State<Arc<AppState>>,
    Json(event): Json<InputEvent>,
) -> Response {
    let released = matches!(event.stroke(), Some(Stroke::End));

    let (job, hasher) = {
        let mut session = st.lock.lock().await;
        match session.input(&event) {
            Ok(job) => (job, session.hasher()),
            Err(e) => return lock_error(&st, e, session.view()),
        }
    };

    let worker = tokio::spawn(finish_input(Arc::clone(&st), job, hasher, released));
    match worker.await {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "lock input task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(LockErrorResponse {
                    error: "DIGEST_TASK_FAILED".to_string(),
                    message: e.to_string(),
                    view: None,
                }),
            )
                .into_response()
        }
    }
}

/// Settles outstanding digests, publishes the view and schedules the delayed
/// clear of a released gesture.
async fn finish_input(
    st: Arc<AppState>,
    mut job: Option<PreparedDigest>,
    hasher: Option<Arc<dyn PatternHasher>>,
    released: bool,
) -> Response {
    while let Some(prepared) = job.take() {
        let fallback = prepared.clone();
        let task_hasher = hasher.clone();
        let outcome = match tokio::task::spawn_blocking(move || {
            prepared.compute(task_hasher.as_deref())
        })
        .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // The machine still waits on this digest; hand it an empty
                // outcome so it stops waiting.
                error!(error = %e, purpose = ?fallback.purpose, "digest task failed");
                fallback.compute(None)
            }
        };
        let mut session = st.lock.lock().await;
        match session.complete(outcome) {
            Ok(next) => job = next,
            Err(e) => return lock_error(&st, e, session.view()),
        }
    }

    let view = st.publish_view().await;
    if released {
        if let Some(ms) = view.clear_after_ms {
            schedule_clear(Arc::clone(&st), Duration::from_millis(ms));
        }
    }
    (StatusCode::OK, Json(view)).into_response()
}

fn lock_error(st: &AppState, err: LockError, view: LockView) -> Response {
    let status = match &err {
        LockError::HashUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        LockError::IllegalTransition { .. } => StatusCode::CONFLICT,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    info!(code = err.code(), %status, "lock/input refused");
    let _ = st.bus.send(BusMsg::Lock(view.clone()));
    (
        status,
        Json(LockErrorResponse {
            error: err.code().to_string(),
            message: err.to_string(),
            view: Some(view),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/app
// ---------------------------------------------------------------------------

/// 200 once the lock has revealed the application, 423 Locked before that.
pub(crate) async fn app_gate(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    match st.gate.remaining() {
        Some(left) if left.is_zero() => (
            StatusCode::OK,
            Json(AppGateResponse {
                revealed: true,
                reveal_in_ms: None,
            }),
        ),
        Some(left) => (
            StatusCode::LOCKED,
            Json(AppGateResponse {
                revealed: false,
                reveal_in_ms: Some(left.as_millis() as u64),
            }),
        ),
        None => (
            StatusCode::LOCKED,
            Json(AppGateResponse {
                revealed: false,
                reveal_in_ms: None,
            }),
        ),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Lock(_) => "lock",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
