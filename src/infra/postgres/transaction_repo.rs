use {
    super::audit_repo::insert_audit_entry,
    crate::domain::{
        audit::NewAuditEntry,
        error::PipelineError,
        id::{BuyerId, ExternalReference, ItemId, ProviderPaymentId},
        money::{Currency, Money, MoneyAmount},
        store::{StoreFuture, TransactionStore},
        transaction::{
            AllocationStatus, NewTransaction, PixPayload, ProviderStatus, Transaction,
            TransactionStatus,
        },
    },
    chrono::{DateTime, Utc},
    sqlx::PgPool,
    uuid::Uuid,
};

#[derive(Debug)]
struct TransactionRow {
    id: Uuid,
    external_reference: String,
    account_id: String,
    user_id: String,
    amount: i64,
    currency: String,
    status: String,
    provider_payment_id: String,
    provider_payment_method: String,
    provider_status: String,
    provider_status_detail: Option<String>,
    provider_reference: Option<String>,
    installments: Option<i16>,
    pix_qr_code: Option<String>,
    pix_qr_code_base64: Option<String>,
    pix_expires_at: Option<DateTime<Utc>>,
    allocation_status: String,
    webhook_processed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PipelineError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let pix = match (row.pix_qr_code, row.pix_qr_code_base64) {
            (Some(qr_code), Some(qr_code_base64)) => Some(PixPayload {
                qr_code,
                qr_code_base64,
                expires_at: row.pix_expires_at,
            }),
            _ => None,
        };
        let installments = row
            .installments
            .map(u8::try_from)
            .transpose()
            .map_err(|_| PipelineError::Validation("installments out of range".into()))?;

        Ok(Transaction {
            id: row.id,
            external_reference: ExternalReference::new(row.external_reference)?,
            item_id: ItemId::new(row.account_id)?,
            buyer_id: BuyerId::new(row.user_id)?,
            money: Money::new(
                MoneyAmount::new(row.amount)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            status: TransactionStatus::try_from(row.status.as_str())?,
            provider_payment_id: ProviderPaymentId::new(row.provider_payment_id)?,
            provider_payment_method: row.provider_payment_method,
            provider_status: ProviderStatus::new(row.provider_status, row.provider_status_detail),
            provider_reference: row.provider_reference,
            installments,
            pix,
            allocation: AllocationStatus::try_from(row.allocation_status.as_str())?,
            webhook_processed: row.webhook_processed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres-backed [`TransactionStore`]. Every write appends its audit row in
/// the same database transaction.
#[derive(Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, new: &NewTransaction) -> Result<bool, PipelineError> {
        let mut tx = self.pool.begin().await?;

        let pix = new.pix();
        let result = sqlx::query!(
            r#"
            INSERT INTO transactions
                (id, external_reference, account_id, user_id, amount, currency, status,
                 provider_payment_id, provider_payment_method, provider_status,
                 provider_status_detail, provider_reference, installments,
                 pix_qr_code, pix_qr_code_base64, pix_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (external_reference) DO NOTHING
            "#,
            new.id(),
            new.external_reference().as_str(),
            new.item_id().as_str(),
            new.buyer_id().as_str(),
            new.money().amount().cents(),
            new.money().currency().as_str(),
            new.status().as_str(),
            new.provider_payment_id().as_str(),
            new.provider_payment_method(),
            &new.provider_status().status,
            new.provider_status().detail.as_deref(),
            new.provider_reference(),
            new.installments().map(i16::from),
            pix.map(|p| p.qr_code.as_str()),
            pix.map(|p| p.qr_code_base64.as_str()),
            pix.and_then(|p| p.expires_at),
        )
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(false);
        }

        insert_audit_entry(&mut tx, &new.audit_entry("checkout", "created")).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn find_by_reference(
        &self,
        reference: &ExternalReference,
    ) -> Result<Option<Transaction>, PipelineError> {
        let row = sqlx::query_as!(
            TransactionRow,
            r#"
            SELECT id, external_reference, account_id, user_id, amount, currency, status,
                   provider_payment_id, provider_payment_method, provider_status,
                   provider_status_detail, provider_reference, installments,
                   pix_qr_code, pix_qr_code_base64, pix_expires_at,
                   allocation_status, webhook_processed, created_at, updated_at
            FROM transactions
            WHERE external_reference = $1
            "#,
            reference.as_str(),
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn find_by_payment_id(
        &self,
        id: &ProviderPaymentId,
    ) -> Result<Option<Transaction>, PipelineError> {
        let row = sqlx::query_as!(
            TransactionRow,
            r#"
            SELECT id, external_reference, account_id, user_id, amount, currency, status,
                   provider_payment_id, provider_payment_method, provider_status,
                   provider_status_detail, provider_reference, installments,
                   pix_qr_code, pix_qr_code_base64, pix_expires_at,
                   allocation_status, webhook_processed, created_at, updated_at
            FROM transactions
            WHERE provider_payment_id = $1
            "#,
            id.as_str(),
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn advance(
        &self,
        id: Uuid,
        status: TransactionStatus,
        provider_status: &ProviderStatus,
    ) -> Result<bool, PipelineError> {
        if !TransactionStatus::Pending.can_transition_to(&status) {
            return Err(PipelineError::Validation(format!(
                "cannot advance a transaction to {status}"
            )));
        }

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query!(
            r#"
            UPDATE transactions
            SET status = $2, provider_status = $3, provider_status_detail = $4, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
            id,
            status.as_str(),
            &provider_status.status,
            provider_status.detail.as_deref(),
        )
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(false);
        }

        let audit = NewAuditEntry::transaction(
            id,
            "webhook:mercado_pago",
            "status_changed",
            serde_json::json!({
                "old_status": TransactionStatus::Pending.as_str(),
                "new_status": status.as_str(),
                "provider_status": provider_status.status,
                "provider_status_detail": provider_status.detail,
            }),
        );
        insert_audit_entry(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn refresh(&self, id: Uuid, provider_status: &ProviderStatus) -> Result<(), PipelineError> {
        sqlx::query!(
            r#"
            UPDATE transactions
            SET provider_status = $2, provider_status_detail = $3, updated_at = now()
            WHERE id = $1 AND status = 'pending'
            "#,
            id,
            &provider_status.status,
            provider_status.detail.as_deref(),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_allocation(&self, id: Uuid, outcome: AllocationStatus) -> Result<bool, PipelineError> {
        if outcome == AllocationStatus::NotAttempted {
            return Err(PipelineError::Validation(
                "allocation outcome must be reserved or unavailable".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let first = sqlx::query!(
            r#"
            UPDATE transactions
            SET allocation_status = $2, updated_at = now()
            WHERE id = $1 AND allocation_status = 'not_attempted'
            "#,
            id,
            outcome.as_str(),
        )
        .execute(&mut *tx)
        .await?;

        let action = if first.rows_affected() > 0 {
            "allocation_recorded"
        } else if outcome == AllocationStatus::Reserved {
            // A concurrent path lost the reservation and recorded it first.
            let corrected = sqlx::query!(
                r#"
                UPDATE transactions
                SET allocation_status = 'reserved', updated_at = now()
                WHERE id = $1 AND allocation_status = 'unavailable'
                "#,
                id,
            )
            .execute(&mut *tx)
            .await?;
            if corrected.rows_affected() == 0 {
                tx.commit().await?;
                return Ok(false);
            }
            "allocation_corrected"
        } else {
            tx.commit().await?;
            return Ok(false);
        };

        let audit = NewAuditEntry::transaction(
            id,
            "allocator",
            action,
            serde_json::json!({ "allocation_status": outcome.as_str() }),
        );
        insert_audit_entry(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn set_webhook_processed(&self, id: Uuid) -> Result<bool, PipelineError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query!(
            r#"
            UPDATE transactions
            SET webhook_processed = true, updated_at = now()
            WHERE id = $1 AND NOT webhook_processed
            "#,
            id,
        )
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(false);
        }

        let audit = NewAuditEntry::transaction(id, "webhook:mercado_pago", "webhook_processed", serde_json::json!({}));
        insert_audit_entry(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(true)
    }
}

impl TransactionStore for PgTransactionStore {
    fn create<'a>(&'a self, tx: &'a NewTransaction) -> StoreFuture<'a, bool> {
        Box::pin(self.insert(tx))
    }

    fn find_by_external_reference<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> StoreFuture<'a, Option<Transaction>> {
        Box::pin(self.find_by_reference(reference))
    }

    fn find_by_provider_payment_id<'a>(
        &'a self,
        id: &'a ProviderPaymentId,
    ) -> StoreFuture<'a, Option<Transaction>> {
        Box::pin(self.find_by_payment_id(id))
    }

    fn advance_status<'a>(
        &'a self,
        id: Uuid,
        status: TransactionStatus,
        provider_status: &'a ProviderStatus,
    ) -> StoreFuture<'a, bool> {
        Box::pin(self.advance(id, status, provider_status))
    }

    fn refresh_provider_status<'a>(
        &'a self,
        id: Uuid,
        provider_status: &'a ProviderStatus,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.refresh(id, provider_status))
    }

    fn record_allocation(&self, id: Uuid, outcome: AllocationStatus) -> StoreFuture<'_, bool> {
        Box::pin(self.set_allocation(id, outcome))
    }

    fn mark_webhook_processed(&self, id: Uuid) -> StoreFuture<'_, bool> {
        Box::pin(self.set_webhook_processed(id))
    }
}
