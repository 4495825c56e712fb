pub mod auth;
pub mod control;
pub mod health;
pub mod matches;
pub mod stream;

use crate::domain::MatchId;
use crate::error::AppError;
use crate::orchestration::{ControlPlane, MatchRegistry};
use auth::{AllowAll, Authorizer};
use axum::{
    routing::{get, post},
    Router,
};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Buffer between a match feed and one streaming response.
const STREAM_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub registry: MatchRegistry,
    pub control: ControlPlane,
    pub authorizer: Arc<dyn Authorizer>,
    pub stream_buffer: usize,
}

impl AppState {
    pub fn new(registry: MatchRegistry) -> Self {
        Self::with_authorizer(registry, Arc::new(AllowAll))
    }

    pub fn with_authorizer(registry: MatchRegistry, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            control: ControlPlane::new(registry.clone()),
            registry,
            authorizer,
            stream_buffer: STREAM_BUFFER,
        }
    }
}

pub(crate) fn parse_match_id(raw: &str) -> Result<MatchId, AppError> {
    MatchId::from_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid match id: {}", raw)))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/matches",
            get(matches::list_matches).post(matches::create_match),
        )
        .route("/v1/matches/:id", get(matches::get_match))
        .route("/v1/matches/:id/pause", post(control::pause))
        .route("/v1/matches/:id/resume", post(control::resume))
        .route("/v1/matches/:id/stop", post(control::stop))
        .route("/v1/matches/:id/speed", post(control::set_speed))
        .route("/v1/matches/:id/seek", post(control::seek))
        .route("/v1/matches/:id/stream", get(stream::stream_match))
        .layer(cors)
        .with_state(state)
}
