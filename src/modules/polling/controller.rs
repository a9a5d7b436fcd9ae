use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::modules::polling::schema::{
    ErrorResponse, PollStatusResponse, StartPollRequest, VisibilityRequest, VisibilityResponse,
};
use crate::services::polling::{RegistryError, SubjectKind};
use crate::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("No poll session for {kind}/{subject_id}")]
    NotFound { kind: SubjectKind, subject_id: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
        };
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

fn parse_kind(raw: &str) -> Result<SubjectKind, ApiError> {
    raw.parse().map_err(ApiError::BadRequest)
}

pub async fn start_poll(
    State(state): State<Arc<AppState>>,
    Path((kind, subject_id)): Path<(String, String)>,
    body: Option<Json<StartPollRequest>>,
) -> Result<(StatusCode, Json<PollStatusResponse>), ApiError> {
    let kind = parse_kind(&kind)?;
    // A bodyless start uses the kind's default policy
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let status = state.polls.start(kind, &subject_id, req.into())?;

    Ok((StatusCode::ACCEPTED, Json(PollStatusResponse { kind, status })))
}

pub async fn stop_poll(
    State(state): State<Arc<AppState>>,
    Path((kind, subject_id)): Path<(String, String)>,
) -> Result<Json<PollStatusResponse>, ApiError> {
    let kind = parse_kind(&kind)?;

    let status = state
        .polls
        .stop(kind, &subject_id)
        .ok_or(ApiError::NotFound { kind, subject_id })?;

    Ok(Json(PollStatusResponse { kind, status }))
}

pub async fn get_poll(
    State(state): State<Arc<AppState>>,
    Path((kind, subject_id)): Path<(String, String)>,
) -> Result<Json<PollStatusResponse>, ApiError> {
    let kind = parse_kind(&kind)?;

    let status = state
        .polls
        .status(kind, &subject_id)
        .ok_or(ApiError::NotFound { kind, subject_id })?;

    Ok(Json(PollStatusResponse { kind, status }))
}

pub async fn set_visibility(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VisibilityRequest>,
) -> Json<VisibilityResponse> {
    state.polls.set_visible(req.visible);

    Json(VisibilityResponse {
        visible: state.polls.is_visible(),
        active_sessions: state.polls.active_sessions(),
    })
}
