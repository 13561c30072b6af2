use async_trait::async_trait;
use sqlx::types::BigDecimal;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::contractmodel::Contract;
use crate::models::negotiationmodel::{NegotiationKind, NegotiationRecord, NegotiationStatus, PartyRole};

const NEGOTIATION_COLUMNS: &str = r#"
    id, kind, job_id, client_id, worker_id, initiator_message, proposed_rate,
    status, client_agreed, worker_agreed, contract_id, created_at, updated_at
"#;

const CONTRACT_COLUMNS: &str = r#"
    id, negotiation_id, job_id, client_id, worker_id, agreed_rate, contract_type,
    status, created_at, start_date, worker_completed_at, client_confirmed_at,
    completed_at, cancelled_at, cancel_reason, client_feedback, worker_feedback,
    client_rating, worker_rating
"#;

/// Storage contract for negotiation records. All state-changing methods are
/// conditional writes: `Ok(None)` means the guard did not match the current
/// row (wrong status, or the contract claim slot is already taken) and the
/// caller decides how to surface that.
#[async_trait]
pub trait NegotiationExt {
    async fn create_negotiation(
        &self,
        kind: NegotiationKind,
        job_id: Uuid,
        client_id: Uuid,
        worker_id: Uuid,
        initiator_message: String,
        proposed_rate: BigDecimal,
    ) -> Result<NegotiationRecord, Error>;

    async fn get_negotiation(&self, record_id: Uuid) -> Result<Option<NegotiationRecord>, Error>;

    async fn get_negotiations_for_user(&self, user_id: Uuid) -> Result<Vec<NegotiationRecord>, Error>;

    /// Accept or reject a pending record. Guarded on `status = 'pending'`.
    async fn respond_to_negotiation(
        &self,
        record_id: Uuid,
        status: NegotiationStatus,
    ) -> Result<Option<NegotiationRecord>, Error>;

    /// Move a pending record into discussion. Guarded on `status = 'pending'`;
    /// the idempotent already-in-discussion case is handled by the caller.
    async fn start_discussion(&self, record_id: Uuid) -> Result<Option<NegotiationRecord>, Error>;

    /// Set or clear one party's agreement flag and recompute the status, as a
    /// single row-atomic statement. Guarded on the contract slot being empty
    /// and the record not being in a state that forbids agreement changes.
    async fn set_party_agreement(
        &self,
        record_id: Uuid,
        role: PartyRole,
        agreed: bool,
    ) -> Result<Option<NegotiationRecord>, Error>;

    /// The agreement-to-contract transactional boundary. Compare-and-set on
    /// `contract_id IS NULL`: the winner flips the record to `both_agreed`
    /// and inserts the contract in one transaction; a racing loser gets
    /// `Ok(None)` and is expected to re-read the record.
    async fn claim_contract(
        &self,
        record: &NegotiationRecord,
    ) -> Result<Option<(NegotiationRecord, Contract)>, Error>;
}

#[async_trait]
impl NegotiationExt for DBClient {
    async fn create_negotiation(
        &self,
        kind: NegotiationKind,
        job_id: Uuid,
        client_id: Uuid,
        worker_id: Uuid,
        initiator_message: String,
        proposed_rate: BigDecimal,
    ) -> Result<NegotiationRecord, Error> {
        sqlx::query_as::<_, NegotiationRecord>(&format!(
            r#"
            INSERT INTO negotiation_records
            (kind, job_id, client_id, worker_id, initiator_message, proposed_rate)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NEGOTIATION_COLUMNS}
            "#
        ))
        .bind(kind)
        .bind(job_id)
        .bind(client_id)
        .bind(worker_id)
        .bind(initiator_message)
        .bind(proposed_rate)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_negotiation(&self, record_id: Uuid) -> Result<Option<NegotiationRecord>, Error> {
        sqlx::query_as::<_, NegotiationRecord>(&format!(
            r#"
            SELECT {NEGOTIATION_COLUMNS}
            FROM negotiation_records
            WHERE id = $1
            "#
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_negotiations_for_user(&self, user_id: Uuid) -> Result<Vec<NegotiationRecord>, Error> {
        sqlx::query_as::<_, NegotiationRecord>(&format!(
            r#"
            SELECT {NEGOTIATION_COLUMNS}
            FROM negotiation_records
            WHERE client_id = $1 OR worker_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn respond_to_negotiation(
        &self,
        record_id: Uuid,
        status: NegotiationStatus,
    ) -> Result<Option<NegotiationRecord>, Error> {
        sqlx::query_as::<_, NegotiationRecord>(&format!(
            r#"
            UPDATE negotiation_records
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'::negotiation_status
            RETURNING {NEGOTIATION_COLUMNS}
            "#
        ))
        .bind(record_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
    }

    async fn start_discussion(&self, record_id: Uuid) -> Result<Option<NegotiationRecord>, Error> {
        sqlx::query_as::<_, NegotiationRecord>(&format!(
            r#"
            UPDATE negotiation_records
            SET status = 'in_discussion'::negotiation_status, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'::negotiation_status
            RETURNING {NEGOTIATION_COLUMNS}
            "#
        ))
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_party_agreement(
        &self,
        record_id: Uuid,
        role: PartyRole,
        agreed: bool,
    ) -> Result<Option<NegotiationRecord>, Error> {
        // One statement so two racing parties serialize on the row lock and
        // the second one's CASE expressions see the first one's flags.
        let query = if agreed {
            format!(
                r#"
                UPDATE negotiation_records
                SET client_agreed = CASE WHEN $2 = 'client' THEN TRUE ELSE client_agreed END,
                    worker_agreed = CASE WHEN $2 = 'worker' THEN TRUE ELSE worker_agreed END,
                    status = CASE WHEN $2 = 'client'
                             THEN 'client_agreed'::negotiation_status
                             ELSE 'worker_agreed'::negotiation_status END,
                    updated_at = NOW()
                WHERE id = $1
                  AND contract_id IS NULL
                  AND status NOT IN ('rejected', 'cancelled', 'both_agreed')
                RETURNING {NEGOTIATION_COLUMNS}
                "#
            )
        } else {
            format!(
                r#"
                UPDATE negotiation_records
                SET client_agreed = CASE WHEN $2 = 'client' THEN FALSE ELSE client_agreed END,
                    worker_agreed = CASE WHEN $2 = 'worker' THEN FALSE ELSE worker_agreed END,
                    status = CASE
                        WHEN $2 = 'client' AND worker_agreed THEN 'worker_agreed'::negotiation_status
                        WHEN $2 = 'worker' AND client_agreed THEN 'client_agreed'::negotiation_status
                        ELSE 'in_discussion'::negotiation_status
                    END,
                    updated_at = NOW()
                WHERE id = $1
                  AND contract_id IS NULL
                  AND status IN ('in_discussion', 'client_agreed', 'worker_agreed')
                RETURNING {NEGOTIATION_COLUMNS}
                "#
            )
        };

        sqlx::query_as::<_, NegotiationRecord>(&query)
            .bind(record_id)
            .bind(role.to_str())
            .fetch_optional(&self.pool)
            .await
    }

    async fn claim_contract(
        &self,
        record: &NegotiationRecord,
    ) -> Result<Option<(NegotiationRecord, Contract)>, Error> {
        let mut tx = self.pool.begin().await?;
        let contract_id = Uuid::new_v4();

        // The claim lands first: a racing transaction blocks on the row lock
        // and re-evaluates `contract_id IS NULL` after we commit, so at most
        // one claim ever matches.
        let claimed = sqlx::query_as::<_, NegotiationRecord>(&format!(
            r#"
            UPDATE negotiation_records
            SET contract_id = $2,
                status = 'both_agreed'::negotiation_status,
                client_agreed = TRUE,
                worker_agreed = TRUE,
                updated_at = NOW()
            WHERE id = $1 AND contract_id IS NULL
            RETURNING {NEGOTIATION_COLUMNS}
            "#
        ))
        .bind(record.id)
        .bind(contract_id)
        .fetch_optional(&mut *tx)
        .await?;

        let claimed = match claimed {
            Some(claimed) => claimed,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        let contract = sqlx::query_as::<_, Contract>(&format!(
            r#"
            INSERT INTO contracts
            (id, negotiation_id, job_id, client_id, worker_id, agreed_rate, contract_type, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'active'::contract_status)
            RETURNING {CONTRACT_COLUMNS}
            "#
        ))
        .bind(contract_id)
        .bind(record.id)
        .bind(record.job_id)
        .bind(record.client_id)
        .bind(record.worker_id)
        .bind(record.proposed_rate.clone())
        .bind(record.kind)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some((claimed, contract)))
    }
}
