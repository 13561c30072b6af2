use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::contractmodel::Contract;
use crate::models::negotiationmodel::{NegotiationKind, NegotiationRecord};

//Negotiation DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateNegotiationDto {
    pub kind: NegotiationKind,

    pub job_id: Uuid,

    /// The other party: the client for an application, the worker for an
    /// invitation. The acting user always fills the initiating side.
    pub counterparty_id: Uuid,

    #[validate(length(min = 20, max = 2000, message = "Message must be between 20 and 2000 characters"))]
    pub message: String,

    #[validate(range(min = 0.01, message = "Proposed rate must be positive"))]
    pub proposed_rate: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RespondAction {
    Accept,
    Reject,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondToNegotiationDto {
    pub action: RespondAction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetAgreementDto {
    pub agreed: bool,
}

/// Authoritative state of a negotiation and its contract, if one exists.
/// Served by the snapshot read and carried verbatim in realtime events, so a
/// stale or duplicated delivery can always be overwritten wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationSnapshotDto {
    pub record: NegotiationRecord,
    pub contract: Option<Contract>,
}

impl NegotiationSnapshotDto {
    /// Reconciliation termination condition: a contract has appeared or the
    /// record reached a state it will never leave.
    pub fn is_settled(&self) -> bool {
        self.contract.is_some() || self.record.contract_id.is_some() || self.record.status.is_terminal()
    }
}

//Response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }
    }
}
