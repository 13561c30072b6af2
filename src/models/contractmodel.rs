use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::models::negotiationmodel::{NegotiationKind, PartyRole};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "contract_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    InProgress,
    AwaitingClientConfirmation,
    Completed,
    Cancelled,
}

impl ContractStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::InProgress => "in_progress",
            ContractStatus::AwaitingClientConfirmation => "awaiting_client_confirmation",
            ContractStatus::Completed => "completed",
            ContractStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::Completed | ContractStatus::Cancelled)
    }

    /// Cancellation is only allowed before the client-confirmation handshake.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, ContractStatus::Active | ContractStatus::InProgress)
    }
}

/// Binding work agreement, created exactly once per negotiation record when
/// both parties have independently agreed.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contract {
    pub id: Uuid,
    pub negotiation_id: Uuid,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub worker_id: Uuid,
    pub agreed_rate: BigDecimal,
    pub contract_type: NegotiationKind,
    pub status: ContractStatus,
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
    pub start_date: Option<DateTime<Utc>>,
    pub worker_completed_at: Option<DateTime<Utc>>,
    pub client_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub client_feedback: Option<String>,
    pub worker_feedback: Option<String>,
    pub client_rating: Option<i32>,
    pub worker_rating: Option<i32>,
}

impl Contract {
    pub fn role_of(&self, user_id: Uuid) -> Option<PartyRole> {
        if user_id == self.client_id {
            Some(PartyRole::Client)
        } else if user_id == self.worker_id {
            Some(PartyRole::Worker)
        } else {
            None
        }
    }

    pub fn feedback_of(&self, role: PartyRole) -> Option<&str> {
        match role {
            PartyRole::Client => self.client_feedback.as_deref(),
            PartyRole::Worker => self.worker_feedback.as_deref(),
        }
    }
}
