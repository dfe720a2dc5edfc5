//! Read-only HTTP view of the live twin.
//!
//! Provides three GET endpoints:
//! - `/state`: latest aggregated metrics, forecasts and anomaly flags
//! - `/racks`: latest live-bridge rack list
//! - `/suggest`: optimizer query at the current ambient

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use axum::Router;
use axum::routing::get;
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;

use crate::optimizer::{Profile, SettingsOptimizer};
use crate::sim::engine::TickReport;

pub use types::{ErrorResponse, StateResponse, SuggestQuery, SuggestResponse};

/// Latest published tick plus the ambient the twin reported with it.
#[derive(Debug, Clone)]
struct Published {
    report: TickReport,
    current_ambient_c: f64,
}

/// State shared between the tick thread (writer) and request handlers.
///
/// The tick thread replaces the snapshot after every emitted tick; handlers
/// only read it. The optimizer is immutable and queried without locks.
pub struct AppState {
    latest: RwLock<Option<Published>>,
    optimizer: Arc<SettingsOptimizer>,
    default_profile: Profile,
    default_samples: usize,
    search_rng: Mutex<StdRng>,
}

impl AppState {
    /// Creates an empty state; `/state` answers 503 until the first publish.
    pub fn new(
        optimizer: Arc<SettingsOptimizer>,
        default_profile: Profile,
        default_samples: usize,
        seed: u64,
    ) -> Self {
        Self {
            latest: RwLock::new(None),
            optimizer,
            default_profile,
            default_samples,
            search_rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Replaces the snapshot served to clients.
    pub fn publish(&self, report: TickReport, current_ambient_c: f64) {
        let mut slot = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Published {
            report,
            current_ambient_c,
        });
    }

    fn snapshot(&self) -> Option<Published> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/racks", get(handlers::get_racks))
        .route("/suggest", get(handlers::get_suggest))
        .with_state(state)
}

/// Binds to `addr` and serves until the server stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, router(state)).await
}
