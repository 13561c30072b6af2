use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::contractmodel::Contract;
use crate::models::negotiationmodel::PartyRole;

const CONTRACT_COLUMNS: &str = r#"
    id, negotiation_id, job_id, client_id, worker_id, agreed_rate, contract_type,
    status, created_at, start_date, worker_completed_at, client_confirmed_at,
    completed_at, cancelled_at, cancel_reason, client_feedback, worker_feedback,
    client_rating, worker_rating
"#;

/// Storage contract for the contract execution lifecycle. Every transition is
/// a conditional write on the expected current status: `Ok(None)` means the
/// contract was not in that status (double click, retry, or a lost
/// cancel-vs-complete race) and no row was touched.
#[async_trait]
pub trait ContractExt {
    async fn get_contract(&self, contract_id: Uuid) -> Result<Option<Contract>, Error>;

    async fn get_contracts_for_user(&self, user_id: Uuid) -> Result<Vec<Contract>, Error>;

    /// active -> in_progress, stamping `start_date`.
    async fn start_contract_work(&self, contract_id: Uuid) -> Result<Option<Contract>, Error>;

    /// in_progress -> awaiting_client_confirmation, stamping `worker_completed_at`.
    async fn complete_contract_work(&self, contract_id: Uuid) -> Result<Option<Contract>, Error>;

    /// awaiting_client_confirmation -> completed, stamping confirmation times.
    async fn confirm_contract_completion(&self, contract_id: Uuid) -> Result<Option<Contract>, Error>;

    /// active | in_progress -> cancelled, stamping `cancelled_at` and the reason.
    async fn cancel_contract(&self, contract_id: Uuid, reason: String) -> Result<Option<Contract>, Error>;

    /// Writes one party's feedback, guarded on that party's slot being empty
    /// and the contract being completed. Never changes the status.
    async fn record_feedback(
        &self,
        contract_id: Uuid,
        role: PartyRole,
        rating: i32,
        comment: String,
    ) -> Result<Option<Contract>, Error>;
}

#[async_trait]
impl ContractExt for DBClient {
    async fn get_contract(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        sqlx::query_as::<_, Contract>(&format!(
            r#"
            SELECT {CONTRACT_COLUMNS}
            FROM contracts
            WHERE id = $1
            "#
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_contracts_for_user(&self, user_id: Uuid) -> Result<Vec<Contract>, Error> {
        sqlx::query_as::<_, Contract>(&format!(
            r#"
            SELECT {CONTRACT_COLUMNS}
            FROM contracts
            WHERE client_id = $1 OR worker_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn start_contract_work(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'in_progress'::contract_status, start_date = NOW()
            WHERE id = $1 AND status = 'active'::contract_status
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn complete_contract_work(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'awaiting_client_confirmation'::contract_status, worker_completed_at = NOW()
            WHERE id = $1 AND status = 'in_progress'::contract_status
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn confirm_contract_completion(&self, contract_id: Uuid) -> Result<Option<Contract>, Error> {
        sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'completed'::contract_status,
                client_confirmed_at = NOW(),
                completed_at = NOW()
            WHERE id = $1 AND status = 'awaiting_client_confirmation'::contract_status
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn cancel_contract(&self, contract_id: Uuid, reason: String) -> Result<Option<Contract>, Error> {
        sqlx::query_as::<_, Contract>(&format!(
            r#"
            UPDATE contracts
            SET status = 'cancelled'::contract_status,
                cancelled_at = NOW(),
                cancel_reason = $2
            WHERE id = $1 AND status IN ('active', 'in_progress')
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
    }

    async fn record_feedback(
        &self,
        contract_id: Uuid,
        role: PartyRole,
        rating: i32,
        comment: String,
    ) -> Result<Option<Contract>, Error> {
        let query = match role {
            PartyRole::Client => format!(
                r#"
                UPDATE contracts
                SET client_feedback = $2, client_rating = $3
                WHERE id = $1 AND status = 'completed'::contract_status AND client_feedback IS NULL
                RETURNING {CONTRACT_COLUMNS}
                "#
            ),
            PartyRole::Worker => format!(
                r#"
                UPDATE contracts
                SET worker_feedback = $2, worker_rating = $3
                WHERE id = $1 AND status = 'completed'::contract_status AND worker_feedback IS NULL
                RETURNING {CONTRACT_COLUMNS}
                "#
            ),
        };

        sqlx::query_as::<_, Contract>(&query)
            .bind(contract_id)
            .bind(comment)
            .bind(rating)
            .fetch_optional(&self.pool)
            .await
    }
}
