//! Session and sync handlers

use super::AppState;
use crate::error::ApiError;
use crate::protocol::api::{
    CreateSessionRequest, CreateSessionResponse, CurrentSessionResponse, HealthResponse,
    JoinSessionRequest, JoinSessionResponse, PublishResponse, SuccessResponse,
};
use crate::protocol::UpdateRequest;
use crate::session::{SessionStats, SessionSummary};
use crate::types::ClientId;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};

pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.service.list_sessions())
}

pub async fn create_session(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let Json(request) = body?;
    let response = state
        .service
        .create_session(client, request.name.as_deref())?;
    Ok(Json(response))
}

pub async fn join_session(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    body: Result<Json<JoinSessionRequest>, JsonRejection>,
) -> Result<Json<JoinSessionResponse>, ApiError> {
    let Json(request) = body?;
    Ok(Json(state.service.join_session(client, request.session_id)?))
}

pub async fn claim_session(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
) -> Result<Json<SuccessResponse>, ApiError> {
    Ok(Json(state.service.claim(client)?))
}

pub async fn current_session(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
) -> Json<CurrentSessionResponse> {
    Json(state.service.current(client))
}

pub async fn leave_session(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
) -> Json<SuccessResponse> {
    Json(state.service.leave(client))
}

pub async fn publish_update(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<PublishResponse>, ApiError> {
    let Json(request) = body?;
    Ok(Json(state.service.publish(client, request)?))
}

pub async fn session_stats(
    State(state): State<AppState>,
    Extension(client): Extension<ClientId>,
) -> Result<Json<SessionStats>, ApiError> {
    Ok(Json(state.service.stats(client)?))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.service.session_count(),
    })
}
