//! # Cyber Threat Map Server
//!
//! Streams simulated attacks and interceptors to map clients.
//!
//! ## Features
//!
//! - **WebSocket Feed**: every simulation event as a JSON text frame
//! - **Bootstrap**: defense centers and server status on connect
//! - **REST**: center listing and health check
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SimulationEngine task                       │
//! │      (generation interval + tick interval, one clock)       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ BroadcastSink
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              tokio broadcast::Sender<SimEvent>              │
//! └─────────────────────────────────────────────────────────────┘
//!                    │                   │
//!                    ▼                   ▼
//! ┌─────────────────────────┐   ┌──────────────────────────────┐
//! │     GET /ws client      │   │       GET /ws client         │
//! └─────────────────────────┘   └──────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod ws;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::Method,
    response::IntoResponse,
    routing::get,
};
use threatmap_domain::{CenterInfo, Location, ServerStatus, SimEvent};
use threatmap_simulator::{BroadcastSink, Scenario, SimulationEngine};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::{ApiError, ApiResult};

/// Application state for Axum handlers
#[derive(Clone)]
pub struct AppState {
    pub events: broadcast::Sender<SimEvent>,
    pub center_info: Arc<CenterInfo>,
}

impl AppState {
    pub fn new(events: broadcast::Sender<SimEvent>, center_info: CenterInfo) -> Self {
        Self {
            events,
            center_info: Arc::new(center_info),
        }
    }

    /// Events every client receives before the live feed
    pub fn bootstrap_events(&self) -> [SimEvent; 2] {
        [
            SimEvent::CenterInfo((*self.center_info).clone()),
            SimEvent::ServerStatus(ServerStatus {
                ok: true,
                message: "Simulation online".to_string(),
            }),
        ]
    }
}

/// Build the simulation engine and the state that feeds clients from it.
pub fn build_engine(config: &Config) -> ApiResult<(SimulationEngine<BroadcastSink>, AppState)> {
    let scenario = match &config.scenario_path {
        Some(path) => Scenario::load(path)?,
        None => Scenario::defaults(),
    };

    let sink = BroadcastSink::new(config.event_channel_capacity);
    let events = sink.sender();
    let engine = SimulationEngine::new(config.simulation.clone(), scenario, sink)?;
    let state = AppState::new(events, engine.center_info());
    Ok((engine, state))
}

/// Defense centers and barriers
pub async fn list_centers(State(state): State<AppState>) -> Json<CenterInfo> {
    Json((*state.center_info).clone())
}

/// Single defense center by id
pub async fn get_center(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Location>> {
    state
        .center_info
        .centers
        .iter()
        .find(|center| center.id == id)
        .cloned()
        .map(Json)
        .ok_or(ApiError::NotFound {
            entity_type: "center".to_string(),
            id,
        })
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

/// Build the Axum router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // Live feed
        .route("/ws", get(ws::ws_handler))
        // REST
        .route("/centers", get(list_centers))
        .route("/centers/{id}", get(get_center))
        // Health check
        .route("/health", get(health_check))
        .route("/", get(|| async { "Cyber Threat Map Server" }))
        // State and middleware
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        build_engine(&config).unwrap().1
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let response = build_router(state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_list_centers() {
        let (status, body) = get_json(build_router(state()), "/centers").await;
        assert_eq!(status, StatusCode::OK);
        let centers = body["centers"].as_array().unwrap();
        assert_eq!(centers.len(), 3);
        assert_eq!(centers[0]["id"], "Server Jakarta");
        assert!(centers[0]["lat"].is_number());
    }

    #[tokio::test]
    async fn test_get_center() {
        let (status, body) = get_json(build_router(state()), "/centers/Server%20Tokyo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "Server Tokyo");

        let (status, body) = get_json(build_router(state()), "/centers/Atlantis").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[test]
    fn test_bootstrap_order() {
        let names: Vec<_> = state().bootstrap_events().iter().map(SimEvent::name).collect();
        assert_eq!(names, ["center-info", "server-status"]);
    }

    #[test]
    fn test_build_engine_with_missing_scenario() {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.scenario_path = Some("/nonexistent/scenario.json".into());
        let err = build_engine(&config).err().unwrap();
        assert_eq!(err.error_code(), "SIMULATOR_ERROR");
    }

    #[tokio::test]
    async fn test_engine_events_reach_subscribers() {
        let config = Config::from_lookup(|_| None).unwrap();
        let (mut engine, state) = build_engine(&config).unwrap();
        let mut rx = state.events.subscribe();

        engine.step_generation(chrono::Utc::now()).unwrap();
        assert_eq!(rx.recv().await.unwrap().name(), "attack-event");
        assert_eq!(rx.recv().await.unwrap().name(), "defense-launch");
    }
}
