//! Request handlers for the API endpoints.

use std::sync::{Arc, PoisonError};

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::warn;

use super::AppState;
use super::types::{ErrorResponse, StateResponse, SuggestQuery, SuggestResponse};
use crate::optimizer::{Profile, Suggestion};
use crate::sim::engine::INITIAL_AMBIENT_C;

/// Largest candidate count a single request may ask for.
const MAX_SAMPLES: usize = 100_000;

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn not_started() -> Response {
    error(StatusCode::SERVICE_UNAVAILABLE, "no tick has completed yet")
}

/// `GET /state` → 200 + `StateResponse`, or 503 before the first tick.
pub async fn get_state(State(state): State<Arc<AppState>>) -> Response {
    let Some(p) = state.snapshot() else {
        return not_started();
    };
    Json(StateResponse {
        tick: p.report.tick,
        hour: p.report.hour,
        metrics: p.report.metrics,
        forecasts: p.report.forecasts,
        anomaly: p.report.anomaly,
        anomaly_alert: p.report.anomaly_alert,
        current_ambient_c: p.current_ambient_c,
    })
    .into_response()
}

/// `GET /racks` → 200 + rack list, or 503 before the first tick.
pub async fn get_racks(State(state): State<Arc<AppState>>) -> Response {
    match state.snapshot() {
        Some(p) => Json(p.report.racks).into_response(),
        None => not_started(),
    }
}

/// `GET /suggest?profile=&samples=`
///
/// 200 with a `found` or `no_candidate` suggestion, 503 with a `not_ready`
/// suggestion when models are missing, 400 on bad parameters. The search
/// runs on the blocking pool.
pub async fn get_suggest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SuggestQuery>,
) -> Response {
    let profile = match query.profile.as_deref() {
        None => state.default_profile,
        Some(raw) => match raw.parse::<Profile>() {
            Ok(p) => p,
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        },
    };
    let samples = query.samples.unwrap_or(state.default_samples);
    if samples == 0 || samples > MAX_SAMPLES {
        return error(
            StatusCode::BAD_REQUEST,
            format!("`samples` must be in [1, {MAX_SAMPLES}], got {samples}"),
        );
    }

    let ambient_c = state
        .snapshot()
        .map_or(INITIAL_AMBIENT_C, |p| p.current_ambient_c);
    // Each request forks its own rng so the lock is never held across the search.
    let request_seed: u64 = state
        .search_rng
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .random();
    let optimizer = Arc::clone(&state.optimizer);
    let search = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::seed_from_u64(request_seed);
        optimizer.find_best_settings(ambient_c, profile, samples, &mut rng)
    });
    let suggestion = match search.await {
        Ok(suggestion) => suggestion,
        Err(e) => {
            warn!(error = %e, "settings search task failed");
            return error(StatusCode::INTERNAL_SERVER_ERROR, "settings search failed");
        }
    };

    let status = if suggestion == Suggestion::NotReady {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(SuggestResponse {
            profile,
            ambient_c,
            samples,
            suggestion,
        }),
    )
        .into_response()
}
