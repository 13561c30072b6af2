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
    dtos::contractdtos::*,
    dtos::negotiationdtos::ApiResponse,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn contract_handler() -> Router {
    Router::new()
        .route("/", get(list_contracts))
        .route("/:contract_id", get(get_contract))
        .route("/:contract_id/start", put(start_work))
        .route("/:contract_id/complete", put(complete_work))
        .route("/:contract_id/confirm", put(confirm_completion))
        .route("/:contract_id/cancel", put(cancel_contract))
        .route("/:contract_id/feedback", post(submit_feedback))
}

pub async fn list_contracts(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let contracts = app_state
        .contract_service
        .list_for_user(auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Contracts retrieved successfully",
        contracts,
    )))
}

pub async fn get_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let contract = app_state
        .contract_service
        .get_contract(contract_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Contract retrieved successfully",
        contract,
    )))
}

pub async fn start_work(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let contract = app_state
        .contract_service
        .start_work(contract_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Work started", contract)))
}

pub async fn complete_work(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let contract = app_state
        .contract_service
        .complete_work(contract_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Work submitted for confirmation",
        contract,
    )))
}

pub async fn confirm_completion(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let contract = app_state
        .contract_service
        .confirm_completion(contract_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Contract completed", contract)))
}

pub async fn cancel_contract(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
    Json(body): Json<CancelContractDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let contract = app_state
        .contract_service
        .cancel(contract_id, auth.user.id, body.reason)
        .await?;

    Ok(Json(ApiResponse::success("Contract cancelled", contract)))
}

pub async fn submit_feedback(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(contract_id): Path<Uuid>,
    Json(body): Json<SubmitFeedbackDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let contract = app_state
        .feedback_service
        .submit_feedback(contract_id, auth.user.id, body.rating, body.comment)
        .await?;

    Ok(Json(ApiResponse::success(
        "Feedback submitted successfully",
        contract,
    )))
}
