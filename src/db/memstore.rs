//! In-memory implementation of the storage traits for service-level tests.
//! Mirrors the conditional-write guards of the Postgres implementation: every
//! mutation checks the same predicates under one lock, so the claim
//! compare-and-set has the same at-most-once semantics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::BigDecimal;
use sqlx::Error;
use uuid::Uuid;

use crate::db::contractdb::ContractExt;
use crate::db::negotiationdb::NegotiationExt;
use crate::models::contractmodel::{Contract, ContractStatus};
use crate::models::negotiationmodel::{NegotiationKind, NegotiationRecord, NegotiationStatus, PartyRole};

#[derive(Debug, Default)]
struct MemInner {
    records: HashMap<Uuid, NegotiationRecord>,
    contracts: HashMap<Uuid, Contract>,
}

#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract_count(&self) -> usize {
        self.inner.lock().unwrap().contracts.len()
    }

    pub fn insert_record(&self, record: NegotiationRecord) {
        self.inner.lock().unwrap().records.insert(record.id, record);
    }

    pub fn insert_contract(&self, contract: Contract) {
        self.inner.lock().unwrap().contracts.insert(contract.id, contract);
    }
}

#[async_trait]
impl NegotiationExt for MemStore {
    async fn create_negotiation(
        &self,
        kind: NegotiationKind,
        job_id: Uuid,
        client_id: Uuid,
        worker_id: Uuid,
        initiator_message: String,
        proposed_rate: BigDecimal,
    ) -> Result<NegotiationRecord, Error> {
        let record = NegotiationRecord {
            id: Uuid::new_v4(),
            kind,
            job_id,
            client_id,
            worker_id,
            initiator_message,
            proposed_rate,
            status: NegotiationStatus::Pending,
            client_agreed: false,
            worker_agreed: false,
            contract_id: None,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.inner.lock().unwrap().records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_negotiation(&self, record_id: Uuid) -> Result<Option<NegotiationRecord>, Error> {
        Ok(self.inner.lock().unwrap().records.get(&record_id).cloned())
    }

    async fn get_negotiations_for_user(&self, user_id: Uuid) -> Result<Vec<NegotiationRecord>, Error> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .records
            .values()
            .filter(|r| r.client_id == user_id || r.worker_id == user_id)
            .cloned()
            .collect())
    }

    async fn respond_to_negotiation(
        &self,
        record_id: Uuid,
        status: NegotiationStatus,
    ) -> Result<Option<NegotiationRecord>, Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.records.get_mut(&record_id) {
            Some(record) if record.status == NegotiationStatus::Pending => {
                record.status = status;
                record.updated_at = Some(Utc::now());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn start_discussion(&self, record_id: Uuid) -> Result<Option<NegotiationRecord>, Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.records.get_mut(&record_id) {
            Some(record) if record.status == NegotiationStatus::Pending => {
                record.status = NegotiationStatus::InDiscussion;
                record.updated_at = Some(Utc::now());
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_party_agreement(
        &self,
        record_id: Uuid,
        role: PartyRole,
        agreed: bool,
    ) -> Result<Option<NegotiationRecord>, Error> {
        let mut inner = self.inner.lock().unwrap();
        let record = match inner.records.get_mut(&record_id) {
            Some(record) => record,
            None => return Ok(None),
        };

        if record.contract_id.is_some() {
            return Ok(None);
        }

        if agreed {
            if matches!(
                record.status,
                NegotiationStatus::Rejected | NegotiationStatus::Cancelled | NegotiationStatus::BothAgreed
            ) {
                return Ok(None);
            }
            match role {
                PartyRole::Client => {
                    record.client_agreed = true;
                    record.status = NegotiationStatus::ClientAgreed;
                }
                PartyRole::Worker => {
                    record.worker_agreed = true;
                    record.status = NegotiationStatus::WorkerAgreed;
                }
            }
        } else {
            if !matches!(
                record.status,
                NegotiationStatus::InDiscussion
                    | NegotiationStatus::ClientAgreed
                    | NegotiationStatus::WorkerAgreed
            ) {
                return Ok(None);
            }
            match role {
                PartyRole::Client => record.client_agreed = false,
                PartyRole::Worker => record.worker_agreed = false,
            }
            record.status = if record.worker_agreed {
                NegotiationStatus::WorkerAgreed
            } else if record.client_agreed {
                NegotiationStatus::ClientAgreed
            } else {
                NegotiationStatus::InDiscussion
            };
        }
        record.updated_at = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn claim_contract(
        &self,
        record: &NegotiationRecord,
    ) -> Result<Option<(NegotiationRecord, Contract)>, Error> {
        let mut inner = self.inner.lock().unwrap();
        let stored = match inner.records.get_mut(&record.id) {
            Some(stored) => stored,
            None => return Ok(None),
        };

        if stored.contract_id.is_some() {
            return Ok(None);
        }

        let contract = Contract {
            id: Uuid::new_v4(),
            negotiation_id: record.id,
            job_id: record.job_id,
            client_id: record.client_id,
            worker_id: record.worker_id,
            agreed_rate: record.proposed_rate.clone(),
            contract_type: record.kind,
            status: ContractStatus::Active,
            created_at: Some(Utc::now()),
            start_date: None,
            worker_completed_at: None,
            client_confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
            client_feedback: None,
            worker_feedback: None,
            client_rating: None,
            worker_rating: None,
        };

        stored.contract_id = Some(contract.id);
        stored.status = NegotiationStatus::BothAgreed;
        stored.client_agreed = true;
        stored.worker_agreed = true;
        stored.updated_at = Some(Utc::now());

        let claimed = stored.clone();
        inner.contracts.insert(contract.id, contract.clone());
        Ok(Some((claimed, contract)))
    }
}

#[async_trait]
impl ContractExt for MemStore {
    async fn get_contract(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        Ok(self.inner.lock().unwrap().contracts.get(&contract_id).cloned())
    }

    async fn get_contracts_for_user(&self, user_id: Uuid) -> Result<Vec<Contract>, Error> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .contracts
            .values()
            .filter(|c| c.client_id == user_id || c.worker_id == user_id)
            .cloned()
            .collect())
    }

    async fn start_contract_work(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.contracts.get_mut(&contract_id) {
            Some(contract) if contract.status == ContractStatus::Active => {
                contract.status = ContractStatus::InProgress;
                contract.start_date = Some(Utc::now());
                Ok(Some(contract.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn complete_contract_work(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.contracts.get_mut(&contract_id) {
            Some(contract) if contract.status == ContractStatus::InProgress => {
                contract.status = ContractStatus::AwaitingClientConfirmation;
                contract.worker_completed_at = Some(Utc::now());
                Ok(Some(contract.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn confirm_contract_completion(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.contracts.get_mut(&contract_id) {
            Some(contract) if contract.status == ContractStatus::AwaitingClientConfirmation => {
                contract.status = ContractStatus::Completed;
                contract.client_confirmed_at = Some(Utc::now());
                contract.completed_at = Some(Utc::now());
                Ok(Some(contract.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn cancel_contract(&self, contract_id: Uuid, reason: String) -> Result<Option<Contract>, Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.contracts.get_mut(&contract_id) {
            Some(contract) if contract.status.is_cancellable() => {
                contract.status = ContractStatus::Cancelled;
                contract.cancelled_at = Some(Utc::now());
                contract.cancel_reason = Some(reason);
                Ok(Some(contract.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn record_feedback(
        &self,
        contract_id: Uuid,
        role: PartyRole,
        rating: i32,
        comment: String,
    ) -> Result<Option<Contract>, Error> {
        let mut inner = self.inner.lock().unwrap();
        let contract = match inner.contracts.get_mut(&contract_id) {
            Some(contract) => contract,
            None => return Ok(None),
        };

        if contract.status != ContractStatus::Completed {
            return Ok(None);
        }

        match role {
            PartyRole::Client => {
                if contract.client_feedback.is_some() {
                    return Ok(None);
                }
                contract.client_feedback = Some(comment);
                contract.client_rating = Some(rating);
            }
            PartyRole::Worker => {
                if contract.worker_feedback.is_some() {
                    return Ok(None);
                }
                contract.worker_feedback = Some(comment);
                contract.worker_rating = Some(rating);
            }
        }
        Ok(Some(contract.clone()))
    }
}
