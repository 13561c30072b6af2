use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::error::HttpError;
use crate::models::contractmodel::ContractStatus;
use crate::models::negotiationmodel::NegotiationStatus;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Negotiation record {0} not found")]
    RecordNotFound(Uuid),

    #[error("Contract {0} not found")]
    ContractNotFound(Uuid),

    #[error("User {0} is not authorized to perform this action on {1}")]
    Forbidden(Uuid, Uuid),

    #[error("Negotiation record {0} is in status {1:?}")]
    InvalidNegotiationStatus(Uuid, NegotiationStatus),

    #[error("Contract {0} is in status {1:?}")]
    InvalidContractStatus(Uuid, ContractStatus),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Negotiation record {0} already has a contract")]
    AlreadyContracted(Uuid),

    #[error("Feedback for contract {0} was already submitted by this party")]
    AlreadySubmitted(Uuid),

    #[error("Contract {0} is not completed yet")]
    NotCompleted(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::RecordNotFound(_) | ServiceError::ContractNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Forbidden(_, _) => StatusCode::FORBIDDEN,

            ServiceError::InvalidNegotiationStatus(_, _)
            | ServiceError::InvalidContractStatus(_, _)
            | ServiceError::InvalidTransition(_)
            | ServiceError::AlreadyContracted(_)
            | ServiceError::AlreadySubmitted(_)
            | ServiceError::NotCompleted(_) => StatusCode::CONFLICT,

            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::RecordNotFound(_) | ServiceError::ContractNotFound(_) => "NOT_FOUND",
            ServiceError::Forbidden(_, _) => "FORBIDDEN",
            ServiceError::InvalidNegotiationStatus(_, _)
            | ServiceError::InvalidContractStatus(_, _)
            | ServiceError::InvalidTransition(_) => "INVALID_TRANSITION",
            ServiceError::AlreadyContracted(_) => "ALREADY_CONTRACTED",
            ServiceError::AlreadySubmitted(_) => "ALREADY_SUBMITTED",
            ServiceError::NotCompleted(_) => "NOT_COMPLETED",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Database(_) => "SERVER_ERROR",
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let code = error.code();
        let status = error.status_code();
        // Internal failures keep their detail in the logs, not the envelope.
        let message = match &error {
            ServiceError::Database(e) => {
                tracing::error!("database error: {}", e);
                "Something went wrong, please try again later".to_string()
            }
            _ => error.to_string(),
        };
        HttpError::new(message, status, code)
    }
}
