use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "negotiation_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NegotiationKind {
    /// Worker applies to a client's job post.
    Application,
    /// Client invites a specific worker to a job post.
    Invitation,
}

impl NegotiationKind {
    pub fn to_str(&self) -> &str {
        match self {
            NegotiationKind::Application => "application",
            NegotiationKind::Invitation => "invitation",
        }
    }

    /// The party that created the record.
    pub fn initiator(&self) -> PartyRole {
        match self {
            NegotiationKind::Application => PartyRole::Worker,
            NegotiationKind::Invitation => PartyRole::Client,
        }
    }

    /// The party allowed to accept/reject the record while it is pending.
    pub fn responder(&self) -> PartyRole {
        match self {
            NegotiationKind::Application => PartyRole::Client,
            NegotiationKind::Invitation => PartyRole::Worker,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "negotiation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    Pending,
    Accepted,
    Rejected,
    InDiscussion,
    ClientAgreed,
    WorkerAgreed,
    BothAgreed,
    Cancelled,
}

impl NegotiationStatus {
    pub fn to_str(&self) -> &str {
        match self {
            NegotiationStatus::Pending => "pending",
            NegotiationStatus::Accepted => "accepted",
            NegotiationStatus::Rejected => "rejected",
            NegotiationStatus::InDiscussion => "in_discussion",
            NegotiationStatus::ClientAgreed => "client_agreed",
            NegotiationStatus::WorkerAgreed => "worker_agreed",
            NegotiationStatus::BothAgreed => "both_agreed",
            NegotiationStatus::Cancelled => "cancelled",
        }
    }

    /// A record in one of these states never moves again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NegotiationStatus::Rejected | NegotiationStatus::BothAgreed | NegotiationStatus::Cancelled
        )
    }
}

/// Which side of a negotiation or contract a user is acting as.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Client,
    Worker,
}

impl PartyRole {
    pub fn to_str(&self) -> &str {
        match self {
            PartyRole::Client => "client",
            PartyRole::Worker => "worker",
        }
    }
}

/// Unified Application/Invitation entity. Which party initiated is carried by
/// `kind`; everything else goes through one state machine.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NegotiationRecord {
    pub id: Uuid,
    pub kind: NegotiationKind,
    pub job_id: Uuid,
    pub client_id: Uuid,
    pub worker_id: Uuid,
    pub initiator_message: String,
    pub proposed_rate: BigDecimal,
    pub status: NegotiationStatus,
    pub client_agreed: bool,
    pub worker_agreed: bool,
    pub contract_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
    pub updated_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
}

impl NegotiationRecord {
    pub fn role_of(&self, user_id: Uuid) -> Option<PartyRole> {
        if user_id == self.client_id {
            Some(PartyRole::Client)
        } else if user_id == self.worker_id {
            Some(PartyRole::Worker)
        } else {
            None
        }
    }
}
