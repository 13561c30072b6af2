use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{contractdb::ContractExt, db::DBClient},
    models::contractmodel::Contract,
    models::negotiationmodel::PartyRole,
    service::{
        error::ServiceError,
        realtime_service::{events, RealtimeEvent, RealtimeService},
    },
};

/// Enforces the contract execution lifecycle: which party may move a contract
/// forward, and that no status ever regresses. State guards live in the
/// store's conditional writes so duplicate clicks and cancel-vs-complete
/// races settle on whichever write lands first.
#[derive(Debug)]
pub struct ContractService<S = DBClient> {
    store: Arc<S>,
    realtime_service: Arc<RealtimeService>,
}

impl<S> ContractService<S>
where
    S: ContractExt + Send + Sync,
{
    pub fn new(store: Arc<S>, realtime_service: Arc<RealtimeService>) -> Self {
        Self {
            store,
            realtime_service,
        }
    }

    /// Worker-only: active -> in_progress.
    pub async fn start_work(&self, contract_id: Uuid, acting_user_id: Uuid) -> Result<Contract, ServiceError> {
        let contract = self.fetch_gated(contract_id, acting_user_id, Some(PartyRole::Worker)).await?;
        let updated = self
            .store
            .start_contract_work(contract_id)
            .await?
            .ok_or(ServiceError::InvalidContractStatus(contract_id, contract.status))?;
        self.publish_update(&updated);
        Ok(updated)
    }

    /// Worker-only: in_progress -> awaiting_client_confirmation.
    pub async fn complete_work(&self, contract_id: Uuid, acting_user_id: Uuid) -> Result<Contract, ServiceError> {
        let contract = self.fetch_gated(contract_id, acting_user_id, Some(PartyRole::Worker)).await?;
        let updated = self
            .store
            .complete_contract_work(contract_id)
            .await?
            .ok_or(ServiceError::InvalidContractStatus(contract_id, contract.status))?;
        self.publish_update(&updated);
        Ok(updated)
    }

    /// Client-only: awaiting_client_confirmation -> completed.
    pub async fn confirm_completion(
        &self,
        contract_id: Uuid,
        acting_user_id: Uuid,
    ) -> Result<Contract, ServiceError> {
        let contract = self.fetch_gated(contract_id, acting_user_id, Some(PartyRole::Client)).await?;
        let updated = self
            .store
            .confirm_contract_completion(contract_id)
            .await?
            .ok_or(ServiceError::InvalidContractStatus(contract_id, contract.status))?;
        self.publish_update(&updated);
        Ok(updated)
    }

    /// Either party, while the work is not past the confirmation handshake.
    /// Terminal: a cancelled contract never moves again.
    pub async fn cancel(
        &self,
        contract_id: Uuid,
        acting_user_id: Uuid,
        reason: String,
    ) -> Result<Contract, ServiceError> {
        let contract = self.fetch_gated(contract_id, acting_user_id, None).await?;
        let updated = self
            .store
            .cancel_contract(contract_id, reason)
            .await?
            .ok_or(ServiceError::InvalidContractStatus(contract_id, contract.status))?;
        tracing::info!("contract {} cancelled by user {}", contract_id, acting_user_id);
        self.publish_update(&updated);
        Ok(updated)
    }

    pub async fn get_contract(&self, contract_id: Uuid, acting_user_id: Uuid) -> Result<Contract, ServiceError> {
        self.fetch_gated(contract_id, acting_user_id, None).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Contract>, ServiceError> {
        Ok(self.store.get_contracts_for_user(user_id).await?)
    }

    async fn fetch_gated(
        &self,
        contract_id: Uuid,
        acting_user_id: Uuid,
        required_role: Option<PartyRole>,
    ) -> Result<Contract, ServiceError> {
        let contract = self
            .store
            .get_contract(contract_id)
            .await?
            .ok_or(ServiceError::ContractNotFound(contract_id))?;

        let role = contract
            .role_of(acting_user_id)
            .ok_or(ServiceError::Forbidden(acting_user_id, contract_id))?;

        if let Some(required) = required_role {
            if role != required {
                return Err(ServiceError::Forbidden(acting_user_id, contract_id));
            }
        }

        Ok(contract)
    }

    fn publish_update(&self, contract: &Contract) {
        self.realtime_service.publish_to_parties(
            contract.client_id,
            contract.worker_id,
            &RealtimeEvent::new(events::CONTRACT_UPDATED, contract),
        );
    }
}
