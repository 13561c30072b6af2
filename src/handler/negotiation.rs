use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::negotiationdtos::*,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn negotiation_handler() -> Router {
    Router::new()
        .route("/", post(create_negotiation).get(list_negotiations))
        .route("/:record_id", get(get_negotiation_snapshot))
        .route("/:record_id/respond", post(respond_to_negotiation))
        .route("/:record_id/discussion", post(start_discussion))
        .route("/:record_id/agreement", put(set_agreement))
}

pub async fn create_negotiation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateNegotiationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let record = app_state
        .agreement_service
        .create_negotiation(auth.user.id, body)
        .await?;

    Ok(Json(ApiResponse::success(
        "Negotiation record created successfully",
        record,
    )))
}

pub async fn list_negotiations(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let records = app_state
        .agreement_service
        .list_for_user(auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Negotiation records retrieved successfully",
        records,
    )))
}

/// Authoritative record + contract snapshot. This is the read the
/// reconciliation poller hits, so it must stay cheap and idempotent.
pub async fn get_negotiation_snapshot(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(record_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state
        .agreement_service
        .get_snapshot(record_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Negotiation snapshot retrieved successfully",
        snapshot,
    )))
}

pub async fn respond_to_negotiation(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(record_id): Path<Uuid>,
    Json(body): Json<RespondToNegotiationDto>,
) -> Result<impl IntoResponse, HttpError> {
    let record = app_state
        .agreement_service
        .respond(record_id, auth.user.id, body.action)
        .await?;

    Ok(Json(ApiResponse::success(
        "Response recorded successfully",
        record,
    )))
}

pub async fn start_discussion(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(record_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let record = app_state
        .agreement_service
        .start_discussion(record_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Negotiation moved to discussion",
        record,
    )))
}

pub async fn set_agreement(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(record_id): Path<Uuid>,
    Json(body): Json<SetAgreementDto>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state
        .agreement_service
        .set_agreement(record_id, auth.user.id, body.agreed)
        .await?;

    Ok(Json(ApiResponse::success(
        "Agreement updated successfully",
        snapshot,
    )))
}
