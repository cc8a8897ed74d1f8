//! partscan-intake library interface
//!
//! Turns a stream of camera frames (or decoded scanner lines) into part
//! lookups: payload parsing, repeat suppression, a CSV-backed part cache
//! with a Mouser fallback, and the pipeline that ties them together.

pub mod api;
pub mod catalog;
pub mod config;
pub mod dedup;
pub mod error;
pub mod frame;
pub mod payload;
pub mod pipeline;
pub mod resolver;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use partscan_common::events::EventBus;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::frame::FrameSink;
use crate::pipeline::ScanCounters;
use crate::store::CacheStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Durable part cache
    pub store: Arc<CacheStore>,
    /// Session counters owned by the pipeline
    pub counters: Arc<ScanCounters>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Frame feed into the pipeline
    pub frames: FrameSink,
    /// Fired once at shutdown; long-lived responses end on it
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<CacheStore>,
        counters: Arc<ScanCounters>,
        event_bus: EventBus,
        frames: FrameSink,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            counters,
            event_bus,
            frames,
            shutdown,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::parts_routes())
        .merge(api::scan_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
