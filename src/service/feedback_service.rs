use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{contractdb::ContractExt, db::DBClient},
    models::contractmodel::{Contract, ContractStatus},
    service::{
        error::ServiceError,
        realtime_service::{events, RealtimeEvent, RealtimeService},
    },
};

/// Accepts one review per party per completed contract. Feedback never moves
/// the contract's status; completed contracts stay queryable forever.
#[derive(Debug)]
pub struct FeedbackService<S = DBClient> {
    store: Arc<S>,
    realtime_service: Arc<RealtimeService>,
}

impl<S> FeedbackService<S>
where
    S: ContractExt + Send + Sync,
{
    pub fn new(store: Arc<S>, realtime_service: Arc<RealtimeService>) -> Self {
        Self {
            store,
            realtime_service,
        }
    }

    pub async fn submit_feedback(
        &self,
        contract_id: Uuid,
        acting_user_id: Uuid,
        rating: i32,
        comment: String,
    ) -> Result<Contract, ServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::Validation("Rating must be between 1 and 5".to_string()));
        }
        if comment.trim().len() < 5 {
            return Err(ServiceError::Validation(
                "Comment must be at least 5 characters".to_string(),
            ));
        }

        let contract = self
            .store
            .get_contract(contract_id)
            .await?
            .ok_or(ServiceError::ContractNotFound(contract_id))?;

        let role = contract
            .role_of(acting_user_id)
            .ok_or(ServiceError::Forbidden(acting_user_id, contract_id))?;

        if contract.status != ContractStatus::Completed {
            return Err(ServiceError::NotCompleted(contract_id));
        }

        if contract.feedback_of(role).is_some() {
            return Err(ServiceError::AlreadySubmitted(contract_id));
        }

        let updated = self
            .store
            .record_feedback(contract_id, role, rating, comment)
            .await?
            // The conditional write is the authority: a concurrent duplicate
            // submission loses here even when the pre-check passed.
            .ok_or(ServiceError::AlreadySubmitted(contract_id))?;

        tracing::info!(
            "feedback recorded on contract {} by {} (rating {})",
            contract_id,
            role.to_str(),
            rating
        );

        self.realtime_service.publish_to_parties(
            updated.client_id,
            updated.worker_id,
            &RealtimeEvent::new(events::CONTRACT_FEEDBACK, &updated),
        );

        Ok(updated)
    }
}
