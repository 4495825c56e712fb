use crate::api::auth::actor;
use crate::api::{parse_match_id, AppState};
use crate::domain::MatchId;
use crate::error::AppError;
use crate::orchestration::ControlCommand;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedRequest {
    pub multiplier: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekRequest {
    pub target_second: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub match_id: MatchId,
    pub command: &'static str,
    pub accepted: bool,
}

async fn dispatch(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    command: ControlCommand,
) -> Result<Json<ControlResponse>, AppError> {
    let match_id = parse_match_id(id)?;
    let actor = actor(headers);
    if !state.authorizer.authorize(actor, match_id, &command) {
        warn!(match_id = %match_id, actor = ?actor, command = command.name(), "control command refused");
        return Err(AppError::Forbidden(format!(
            "not allowed to {} match {}",
            command.name(),
            match_id
        )));
    }

    state.control.execute(match_id, command).await?;
    Ok(Json(ControlResponse {
        match_id,
        command: command.name(),
        accepted: true,
    }))
}

pub async fn pause(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControlResponse>, AppError> {
    dispatch(&state, &headers, &id, ControlCommand::Pause).await
}

pub async fn resume(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControlResponse>, AppError> {
    dispatch(&state, &headers, &id, ControlCommand::Resume).await
}

pub async fn stop(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ControlResponse>, AppError> {
    dispatch(&state, &headers, &id, ControlCommand::Stop).await
}

pub async fn set_speed(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SpeedRequest>,
) -> Result<Json<ControlResponse>, AppError> {
    let command = ControlCommand::SetSpeed {
        multiplier: body.multiplier,
    };
    dispatch(&state, &headers, &id, command).await
}

pub async fn seek(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SeekRequest>,
) -> Result<Json<ControlResponse>, AppError> {
    let command = ControlCommand::Seek {
        target_second: body.target_second,
    };
    dispatch(&state, &headers, &id, command).await
}
