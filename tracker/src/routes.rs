//! HTTP route handlers for open tracking.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Deserialize;
use tracing::{info, warn};

use outreach::io::store::{LeadStore, SqliteLeadStore};

use crate::state::AppState;

/// 1x1 transparent PNG served for every pixel request.
pub static PIXEL_PNG: [u8; 67] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5, 0x1c, 0x0c,
    0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0xfc, 0xff, 0x1f, 0x00,
    0x03, 0x03, 0x01, 0xff, 0xa5, 0xfa, 0x65, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// Build the tracking router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/update_open", get(update_open))
        .route("/pixel", get(pixel))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct TrackQuery {
    tid: Option<String>,
}

impl TrackQuery {
    fn tracking_id(&self) -> Option<&str> {
        self.tid.as_deref().map(str::trim).filter(|tid| !tid.is_empty())
    }
}

async fn health() -> &'static str {
    "ok"
}

/// GET /update_open?tid= - mark the lead opened. Idempotent.
async fn update_open(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> Result<(StatusCode, &'static str), StatusCode> {
    let Some(tid) = query.tracking_id() else {
        return Ok((StatusCode::BAD_REQUEST, "no tid"));
    };
    record_open(&state, tid).await?;
    Ok((StatusCode::OK, "ok"))
}

/// GET /pixel?tid= - serve the pixel, recording the open when a tid is given.
async fn pixel(State(state): State<AppState>, Query(query): Query<TrackQuery>) -> impl IntoResponse {
    if let Some(tid) = query.tracking_id() {
        // The image is served even when recording fails.
        let _ = record_open(&state, tid).await;
    }
    (
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-store, max-age=0"),
        ],
        &PIXEL_PNG[..],
    )
}

/// Record an open off the async workers; SQLite may wait on a busy lock.
async fn record_open(state: &AppState, tid: &str) -> Result<usize, StatusCode> {
    let store = Arc::clone(&state.store);
    let tid = tid.to_string();
    tokio::task::spawn_blocking(move || set_opened(&store, &tid))
        .await
        .map_err(|err| {
            warn!(error = %err, "open recording task failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
}

fn set_opened(store: &Mutex<SqliteLeadStore>, tid: &str) -> Result<usize, StatusCode> {
    let mut store = store.lock().map_err(|_| {
        warn!("lead store lock poisoned");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let matched = store.set_opened(tid).map_err(|err| {
        warn!(tid, error = %err, "failed to record open");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    info!(tid, matched, "open recorded");
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use outreach::core::types::{Lead, NewLead, Vertical};
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    fn state_with_lead() -> (AppState, Lead) {
        let mut store = SqliteLeadStore::open_in_memory().expect("store");
        let lead = store
            .create(&NewLead {
                email: "buyer@bedorder.com".to_string(),
                domain_name: "BedOrder.com".to_string(),
                first_name: None,
                vertical: Vertical::Sleep,
            })
            .expect("create");
        (AppState::new(store), lead)
    }

    async fn get_uri(state: &AppState, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, body.to_vec())
    }

    fn opened(state: &AppState, id: i64) -> bool {
        state
            .store
            .lock()
            .expect("lock")
            .get(id)
            .expect("get")
            .expect("lead")
            .opened
    }

    #[tokio::test]
    async fn update_open_requires_tid() {
        let (state, lead) = state_with_lead();
        for uri in ["/update_open", "/update_open?tid=", "/update_open?tid=%20"] {
            let (status, body) = get_uri(&state, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, b"no tid");
        }
        assert!(!opened(&state, lead.id));
    }

    #[tokio::test]
    async fn update_open_marks_lead_and_is_idempotent() {
        let (state, lead) = state_with_lead();
        let uri = format!("/update_open?tid={}", lead.tracking_id);
        for _ in 0..2 {
            let (status, body) = get_uri(&state, &uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, b"ok");
        }
        assert!(opened(&state, lead.id));
    }

    #[tokio::test]
    async fn unknown_tid_is_accepted_without_changes() {
        let (state, lead) = state_with_lead();
        let (status, _) = get_uri(&state, "/update_open?tid=unknown").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!opened(&state, lead.id));
    }

    #[tokio::test]
    async fn pixel_always_serves_png_and_records_open() {
        let (state, lead) = state_with_lead();

        let (status, body) = get_uri(&state, "/pixel").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, PIXEL_PNG);
        assert!(!opened(&state, lead.id));

        let (status, body) = get_uri(&state, &format!("/pixel?tid={}", lead.tracking_id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[1..4], b"PNG");
        assert!(opened(&state, lead.id));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (state, _) = state_with_lead();
        assert_eq!(get_uri(&state, "/health").await, (StatusCode::OK, b"ok".to_vec()));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn busy_store_does_not_stall_other_requests() {
        let (state, lead) = state_with_lead();
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let holder = {
            let state = state.clone();
            std::thread::spawn(move || {
                let _guard = state.store.lock().expect("lock");
                locked_tx.send(()).expect("signal");
                std::thread::sleep(Duration::from_millis(400));
            })
        };
        locked_rx.recv().expect("store locked");

        let started = Instant::now();
        let pixel = {
            let state = state.clone();
            let uri = format!("/pixel?tid={}", lead.tracking_id);
            tokio::spawn(async move { get_uri(&state, &uri).await })
        };
        tokio::task::yield_now().await;

        let (status, _) = get_uri(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(started.elapsed() < Duration::from_millis(200));

        let (status, body) = pixel.await.expect("pixel task");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, PIXEL_PNG);
        holder.join().expect("lock holder");
        assert!(opened(&state, lead.id));
    }
}
