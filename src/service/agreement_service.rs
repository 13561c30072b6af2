use std::sync::Arc;

use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{contractdb::ContractExt, db::DBClient, negotiationdb::NegotiationExt},
    dtos::negotiationdtos::{CreateNegotiationDto, NegotiationSnapshotDto, RespondAction},
    models::negotiationmodel::{NegotiationKind, NegotiationRecord, NegotiationStatus, PartyRole},
    service::{
        error::ServiceError,
        realtime_service::{events, RealtimeEvent, RealtimeService},
    },
};

/// Owns the pre-contract negotiation state machine and the mutual-consent
/// boundary: both parties must independently agree before exactly one
/// contract is created, no matter how their requests interleave.
#[derive(Debug)]
pub struct AgreementService<S = DBClient> {
    store: Arc<S>,
    realtime_service: Arc<RealtimeService>,
}

impl<S> AgreementService<S>
where
    S: NegotiationExt + ContractExt + Send + Sync,
{
    pub fn new(store: Arc<S>, realtime_service: Arc<RealtimeService>) -> Self {
        Self {
            store,
            realtime_service,
        }
    }

    pub async fn create_negotiation(
        &self,
        acting_user_id: Uuid,
        body: CreateNegotiationDto,
    ) -> Result<NegotiationRecord, ServiceError> {
        // The acting user always fills the initiating side of the record.
        let (client_id, worker_id) = match body.kind {
            NegotiationKind::Application => (body.counterparty_id, acting_user_id),
            NegotiationKind::Invitation => (acting_user_id, body.counterparty_id),
        };

        if client_id == worker_id {
            return Err(ServiceError::Validation(
                "Client and worker must be different users".to_string(),
            ));
        }
        if body.message.trim().len() < 20 {
            return Err(ServiceError::Validation(
                "Message must be at least 20 characters".to_string(),
            ));
        }
        let proposed_rate = BigDecimal::try_from(body.proposed_rate)
            .map_err(|_| ServiceError::Validation("Proposed rate is not a valid number".to_string()))?;
        if proposed_rate <= BigDecimal::from(0) {
            return Err(ServiceError::Validation("Proposed rate must be positive".to_string()));
        }

        let record = self
            .store
            .create_negotiation(body.kind, body.job_id, client_id, worker_id, body.message, proposed_rate)
            .await?;

        tracing::info!(
            "negotiation {} created: {} for job {} between client {} and worker {}",
            record.id,
            record.kind.to_str(),
            record.job_id,
            record.client_id,
            record.worker_id
        );

        self.publish_record(events::NEGOTIATION_CREATED, &record);
        Ok(record)
    }

    /// Accept or reject a pending record. Only the non-initiating party may
    /// respond, and only while the record is still pending.
    pub async fn respond(
        &self,
        record_id: Uuid,
        acting_user_id: Uuid,
        action: RespondAction,
    ) -> Result<NegotiationRecord, ServiceError> {
        let record = self.fetch_record(record_id).await?;
        let role = self.require_party(&record, acting_user_id)?;

        if role != record.kind.responder() {
            return Err(ServiceError::InvalidTransition(format!(
                "Only the {} may respond to a {}",
                record.kind.responder().to_str(),
                record.kind.to_str()
            )));
        }

        let status = match action {
            RespondAction::Accept => NegotiationStatus::Accepted,
            RespondAction::Reject => NegotiationStatus::Rejected,
        };

        let updated = self
            .store
            .respond_to_negotiation(record_id, status)
            .await?
            .ok_or(ServiceError::InvalidNegotiationStatus(record_id, record.status))?;

        self.publish_record(events::NEGOTIATION_RESPONDED, &updated);
        Ok(updated)
    }

    /// Move a pending record into discussion. A record already in discussion
    /// is returned unchanged (safe against double clicks from either side).
    pub async fn start_discussion(
        &self,
        record_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<NegotiationRecord, ServiceError> {
        let record = self.fetch_record(record_id).await?;
        self.require_party(&record, acting_user_id)?;

        match self.store.start_discussion(record_id).await? {
            Some(updated) => {
                self.publish_record(events::NEGOTIATION_DISCUSSION, &updated);
                Ok(updated)
            }
            None if record.status == NegotiationStatus::InDiscussion => Ok(record),
            None => Err(ServiceError::InvalidNegotiationStatus(record_id, record.status)),
        }
    }

    /// The mutual-consent transition. Setting `agreed = true` while the other
    /// party's flag is already set wins the race to create the contract; a
    /// concurrent second winner loses the conditional claim and recovers by
    /// re-reading the record. Setting `agreed = false` only ever clears the
    /// acting party's own flag.
    pub async fn set_agreement(
        &self,
        record_id: Uuid,
        acting_user_id: Uuid,
        agreed: bool,
    ) -> Result<NegotiationSnapshotDto, ServiceError> {
        let record = self.fetch_record(record_id).await?;
        let role = self.require_party(&record, acting_user_id)?;

        if matches!(record.status, NegotiationStatus::Rejected | NegotiationStatus::Cancelled) {
            return Err(ServiceError::InvalidNegotiationStatus(record_id, record.status));
        }

        if record.contract_id.is_some() {
            // Contracted records are immutable. A repeated "I agree" is the
            // losing side of the race (or a duplicate click) and observes the
            // winning outcome; anything else is an invalid transition.
            if agreed {
                return self.load_snapshot(record_id).await;
            }
            return Err(ServiceError::InvalidNegotiationStatus(record_id, record.status));
        }

        if !agreed {
            return self.withdraw_agreement(record, role).await;
        }

        let updated = match self.store.set_party_agreement(record_id, role, true).await? {
            Some(updated) => updated,
            // The record moved under us between read and write (responded,
            // cancelled or contracted by the other side).
            None => {
                let current = self.fetch_record(record_id).await?;
                return Err(ServiceError::InvalidNegotiationStatus(record_id, current.status));
            }
        };

        if !(updated.client_agreed && updated.worker_agreed) {
            tracing::info!(
                "negotiation {}: {} agreed, waiting on the other party",
                record_id,
                role.to_str()
            );
            let snapshot = NegotiationSnapshotDto {
                record: updated,
                contract: None,
            };
            self.publish_snapshot(events::NEGOTIATION_AGREEMENT, &snapshot);
            return Ok(snapshot);
        }

        // Both flags are set: this call races any concurrent agreement for
        // the single contract claim.
        match self.store.claim_contract(&updated).await? {
            Some((claimed, contract)) => {
                tracing::info!(
                    "negotiation {}: both parties agreed, contract {} created",
                    record_id,
                    contract.id
                );
                let snapshot = NegotiationSnapshotDto {
                    record: claimed,
                    contract: Some(contract.clone()),
                };
                self.publish_snapshot(events::NEGOTIATION_AGREEMENT, &snapshot);
                self.realtime_service.publish_to_parties(
                    snapshot.record.client_id,
                    snapshot.record.worker_id,
                    &RealtimeEvent::new(events::CONTRACT_CREATED, &contract),
                );
                Ok(snapshot)
            }
            None => {
                // Race lost: the other party's call created the contract
                // first. Per the error design this is not a failure — the
                // loser re-reads and observes the winning outcome.
                tracing::debug!("negotiation {}: lost the contract claim race, re-reading", record_id);
                let snapshot = self.load_snapshot(record_id).await?;
                if snapshot.record.contract_id.is_none() {
                    return Err(ServiceError::AlreadyContracted(record_id));
                }
                Ok(snapshot)
            }
        }
    }

    async fn withdraw_agreement(
        &self,
        record: NegotiationRecord,
        role: PartyRole,
    ) -> Result<NegotiationSnapshotDto, ServiceError> {
        // Withdrawing before any discussion started is a no-op clamp, not an
        // error and not a cancellation.
        if matches!(record.status, NegotiationStatus::Pending | NegotiationStatus::Accepted) {
            return Ok(NegotiationSnapshotDto {
                record,
                contract: None,
            });
        }

        match self.store.set_party_agreement(record.id, role, false).await? {
            Some(updated) => {
                let snapshot = NegotiationSnapshotDto {
                    record: updated,
                    contract: None,
                };
                self.publish_snapshot(events::NEGOTIATION_AGREEMENT, &snapshot);
                Ok(snapshot)
            }
            None => {
                let current = self.fetch_record(record.id).await?;
                Err(ServiceError::InvalidNegotiationStatus(record.id, current.status))
            }
        }
    }

    /// Authoritative read used by the reconciliation poller and the snapshot
    /// endpoint. Idempotent and safe to call arbitrarily often.
    pub async fn get_snapshot(
        &self,
        record_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<NegotiationSnapshotDto, ServiceError> {
        let record = self.fetch_record(record_id).await?;
        self.require_party(&record, acting_user_id)?;
        self.load_snapshot(record_id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<NegotiationRecord>, ServiceError> {
        Ok(self.store.get_negotiations_for_user(user_id).await?)
    }

    async fn load_snapshot(&self, record_id: Uuid) -> Result<NegotiationSnapshotDto, ServiceError> {
        let record = self.fetch_record(record_id).await?;
        let contract = match record.contract_id {
            Some(contract_id) => self.store.get_contract(contract_id).await?,
            None => None,
        };
        Ok(NegotiationSnapshotDto { record, contract })
    }

    async fn fetch_record(&self, record_id: Uuid) -> Result<NegotiationRecord, ServiceError> {
        self.store
            .get_negotiation(record_id)
            .await?
            .ok_or(ServiceError::RecordNotFound(record_id))
    }

    fn require_party(&self, record: &NegotiationRecord, user_id: Uuid) -> Result<PartyRole, ServiceError> {
        record
            .role_of(user_id)
            .ok_or(ServiceError::Forbidden(user_id, record.id))
    }

    fn publish_record(&self, event: &str, record: &NegotiationRecord) {
        let snapshot = NegotiationSnapshotDto {
            record: record.clone(),
            contract: None,
        };
        self.publish_snapshot(event, &snapshot);
    }

    fn publish_snapshot(&self, event: &str, snapshot: &NegotiationSnapshotDto) {
        self.realtime_service.publish_to_parties(
            snapshot.record.client_id,
            snapshot.record.worker_id,
            &RealtimeEvent::new(event, snapshot),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memstore::MemStore;

    fn service() -> (Arc<AgreementService<MemStore>>, Arc<MemStore>, Arc<RealtimeService>) {
        let store = Arc::new(MemStore::new());
        let realtime = Arc::new(RealtimeService::new());
        let service = Arc::new(AgreementService::new(store.clone(), realtime.clone()));
        (service, store, realtime)
    }

    fn application_dto(client_id: Uuid) -> CreateNegotiationDto {
        CreateNegotiationDto {
            kind: NegotiationKind::Application,
            job_id: Uuid::new_v4(),
            counterparty_id: client_id,
            message: "I have ten years of experience with this kind of work".to_string(),
            proposed_rate: 500.0,
        }
    }

    #[tokio::test]
    async fn create_assigns_sides_by_kind() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();

        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();
        assert_eq!(record.client_id, client);
        assert_eq!(record.worker_id, worker);
        assert_eq!(record.status, NegotiationStatus::Pending);
        assert!(!record.client_agreed && !record.worker_agreed);

        let invitation = CreateNegotiationDto {
            kind: NegotiationKind::Invitation,
            job_id: Uuid::new_v4(),
            counterparty_id: worker,
            message: "We would like you to take on our renovation job".to_string(),
            proposed_rate: 750.0,
        };
        let record = service.create_negotiation(client, invitation).await.unwrap();
        assert_eq!(record.client_id, client);
        assert_eq!(record.worker_id, worker);
    }

    #[tokio::test]
    async fn create_rejects_short_message_and_bad_rate() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();

        let mut dto = application_dto(client);
        dto.message = "too short".to_string();
        let err = service.create_negotiation(worker, dto).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut dto = application_dto(client);
        dto.proposed_rate = -5.0;
        let err = service.create_negotiation(worker, dto).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn only_the_responder_may_respond_and_only_while_pending() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();

        // The initiating worker cannot respond to its own application.
        let err = service
            .respond(record.id, worker, RespondAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));

        // A stranger is rejected outright.
        let err = service
            .respond(record.id, Uuid::new_v4(), RespondAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_, _)));

        let updated = service
            .respond(record.id, client, RespondAction::Accept)
            .await
            .unwrap();
        assert_eq!(updated.status, NegotiationStatus::Accepted);

        // No longer pending: a second response is an invalid transition.
        let err = service
            .respond(record.id, client, RespondAction::Reject)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidNegotiationStatus(_, _)));
    }

    #[tokio::test]
    async fn start_discussion_is_idempotent() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();

        let first = service.start_discussion(record.id, worker).await.unwrap();
        assert_eq!(first.status, NegotiationStatus::InDiscussion);

        let second = service.start_discussion(record.id, client).await.unwrap();
        assert_eq!(second.status, NegotiationStatus::InDiscussion);
    }

    #[tokio::test]
    async fn scenario_a_worker_then_client_agree_creates_one_contract() {
        let (service, store, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();
        service.start_discussion(record.id, worker).await.unwrap();

        let snapshot = service.set_agreement(record.id, worker, true).await.unwrap();
        assert_eq!(snapshot.record.status, NegotiationStatus::WorkerAgreed);
        assert!(snapshot.record.worker_agreed && !snapshot.record.client_agreed);
        assert!(snapshot.contract.is_none());
        assert_eq!(store.contract_count(), 0);

        let snapshot = service.set_agreement(record.id, client, true).await.unwrap();
        assert_eq!(snapshot.record.status, NegotiationStatus::BothAgreed);
        let contract = snapshot.contract.expect("contract must be created");
        assert_eq!(contract.agreed_rate, BigDecimal::from(500));
        assert_eq!(contract.status, crate::models::contractmodel::ContractStatus::Active);
        assert_eq!(snapshot.record.contract_id, Some(contract.id));
        assert_eq!(store.contract_count(), 1);
    }

    #[tokio::test]
    async fn scenario_b_concurrent_agreements_create_exactly_one_contract() {
        for _ in 0..25 {
            let (service, store, _) = service();
            let client = Uuid::new_v4();
            let worker = Uuid::new_v4();
            let record = service
                .create_negotiation(worker, application_dto(client))
                .await
                .unwrap();
            let record_id = record.id;
            service.start_discussion(record_id, worker).await.unwrap();
            service.set_agreement(record_id, worker, true).await.unwrap();

            // Both parties hit "I agree" at the same time on a record the
            // worker already agreed to.
            let service_a = service.clone();
            let service_b = service.clone();
            let a = tokio::spawn(async move { service_a.set_agreement(record_id, client, true).await });
            let b = tokio::spawn(async move { service_b.set_agreement(record_id, worker, true).await });

            let snap_a = a.await.unwrap().unwrap();
            let snap_b = b.await.unwrap().unwrap();

            assert_eq!(store.contract_count(), 1);
            let id_a = snap_a.record.contract_id.expect("caller A observes the contract");
            let id_b = snap_b.record.contract_id.expect("caller B observes the contract");
            assert_eq!(id_a, id_b);
        }
    }

    #[tokio::test]
    async fn withdrawing_never_creates_a_contract_or_clears_the_other_flag() {
        let (service, store, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();
        service.start_discussion(record.id, worker).await.unwrap();
        service.set_agreement(record.id, worker, true).await.unwrap();

        // Client agrees then changes its mind; the worker's flag survives.
        let snapshot = service.set_agreement(record.id, client, false).await.unwrap();
        assert!(snapshot.record.worker_agreed);
        assert!(!snapshot.record.client_agreed);
        assert_eq!(snapshot.record.status, NegotiationStatus::WorkerAgreed);
        assert_eq!(store.contract_count(), 0);

        // Worker withdraws too: back to plain discussion.
        let snapshot = service.set_agreement(record.id, worker, false).await.unwrap();
        assert!(!snapshot.record.worker_agreed && !snapshot.record.client_agreed);
        assert_eq!(snapshot.record.status, NegotiationStatus::InDiscussion);
        assert_eq!(store.contract_count(), 0);
    }

    #[tokio::test]
    async fn withdraw_before_discussion_is_a_no_op_clamp() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();

        let snapshot = service.set_agreement(record.id, client, false).await.unwrap();
        assert_eq!(snapshot.record.status, NegotiationStatus::Pending);
    }

    #[tokio::test]
    async fn contracted_record_is_immutable_except_for_duplicate_consent() {
        let (service, store, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();
        service.start_discussion(record.id, worker).await.unwrap();
        service.set_agreement(record.id, worker, true).await.unwrap();
        let winner = service.set_agreement(record.id, client, true).await.unwrap();

        // A duplicate "I agree" observes the winning outcome, it does not
        // create a second contract.
        let replay = service.set_agreement(record.id, client, true).await.unwrap();
        assert_eq!(replay.record.contract_id, winner.record.contract_id);
        assert_eq!(store.contract_count(), 1);

        // Un-agreeing a contracted record is refused.
        let err = service.set_agreement(record.id, worker, false).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidNegotiationStatus(_, _)));
    }

    #[tokio::test]
    async fn agreement_on_rejected_record_fails() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();
        service.respond(record.id, client, RespondAction::Reject).await.unwrap();

        let err = service.set_agreement(record.id, worker, true).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidNegotiationStatus(_, _)));
    }

    #[tokio::test]
    async fn strangers_are_forbidden() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();

        let err = service
            .set_agreement(record.id, Uuid::new_v4(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_, _)));

        let err = service.get_snapshot(record.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_, _)));
    }

    #[tokio::test]
    async fn agreement_events_reach_both_parties() {
        let (service, _, realtime) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let mut client_sub = realtime.subscribe(client);
        let mut worker_sub = realtime.subscribe(worker);

        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();
        service.start_discussion(record.id, worker).await.unwrap();
        service.set_agreement(record.id, worker, true).await.unwrap();
        service.set_agreement(record.id, client, true).await.unwrap();

        let mut client_events = Vec::new();
        while let Ok(frame) = client_sub.receiver.try_recv() {
            client_events.push(frame);
        }
        assert!(client_events.iter().any(|f| f.contains(events::NEGOTIATION_AGREEMENT)));
        assert!(client_events.iter().any(|f| f.contains(events::CONTRACT_CREATED)));

        let mut worker_events = Vec::new();
        while let Ok(frame) = worker_sub.receiver.try_recv() {
            worker_events.push(frame);
        }
        assert!(worker_events.iter().any(|f| f.contains(events::CONTRACT_CREATED)));
    }

    #[tokio::test]
    async fn snapshot_is_idempotent_and_carries_the_contract() {
        let (service, _, _) = service();
        let client = Uuid::new_v4();
        let worker = Uuid::new_v4();
        let record = service
            .create_negotiation(worker, application_dto(client))
            .await
            .unwrap();
        service.start_discussion(record.id, worker).await.unwrap();
        service.set_agreement(record.id, worker, true).await.unwrap();
        service.set_agreement(record.id, client, true).await.unwrap();

        let first = service.get_snapshot(record.id, client).await.unwrap();
        let second = service.get_snapshot(record.id, worker).await.unwrap();
        assert!(first.is_settled() && second.is_settled());
        assert_eq!(
            first.contract.as_ref().map(|c| c.id),
            second.contract.as_ref().map(|c| c.id)
        );
    }
}
