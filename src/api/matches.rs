use crate::api::{parse_match_id, AppState};
use crate::domain::{MatchId, MatchState};
use crate::error::AppError;
use crate::orchestration::CreateMatch;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchListResponse {
    pub matches: Vec<MatchId>,
}

pub async fn create_match(
    State(state): State<AppState>,
    Json(request): Json<CreateMatch>,
) -> Result<(StatusCode, Json<MatchState>), AppError> {
    let initial = state.registry.create(request)?;
    Ok((StatusCode::CREATED, Json(initial)))
}

pub async fn list_matches(State(state): State<AppState>) -> Json<MatchListResponse> {
    Json(MatchListResponse {
        matches: state.registry.list(),
    })
}

pub async fn get_match(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MatchState>, AppError> {
    let match_id = parse_match_id(&id)?;
    let snapshot = state.registry.get(match_id).await?;
    Ok(Json(snapshot))
}
