use {
    crate::domain::{
        error::{GatewayError, PipelineError},
        gateway::PaymentGateway,
        id::ProviderPaymentId,
        store::{AccountAllocator, TransactionStore},
        transaction::{AllocationStatus, Transaction, TransactionStatus},
    },
    std::{sync::Arc, time::Duration},
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileResult {
    /// No transaction carries this provider payment id.
    UnknownPayment,
    /// A previous delivery already brought the transaction to its final state.
    AlreadyProcessed(Uuid),
    /// Provider still reports a non-terminal status; the flag stays unset.
    StillPending(Uuid),
    /// A concurrent delivery won the status update and owns the allocation.
    InFlight(Uuid),
    Completed {
        id: Uuid,
        allocation: AllocationStatus,
    },
    Failed(Uuid),
    /// Provider status contradicts the terminal local status. Logged, not applied.
    Anomaly(Uuid),
}

pub struct Reconciler {
    store: Arc<dyn TransactionStore>,
    catalog: Arc<dyn AccountAllocator>,
    gateway: Arc<dyn PaymentGateway>,
    gateway_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        catalog: Arc<dyn AccountAllocator>,
        gateway: Arc<dyn PaymentGateway>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            gateway_timeout,
        }
    }

    /// Brings the transaction behind `payment_id` to the provider's current
    /// state. Errors leave `webhook_processed` unset so a redelivery retries.
    #[tracing::instrument(name = "reconcile", skip_all, fields(provider_payment_id = %payment_id))]
    pub async fn reconcile(
        &self,
        payment_id: &ProviderPaymentId,
    ) -> Result<ReconcileResult, PipelineError> {
        let Some(tx) = self.store.find_by_provider_payment_id(payment_id).await? else {
            tracing::warn!("notification for unknown payment, acknowledging");
            return Ok(ReconcileResult::UnknownPayment);
        };

        if tx.webhook_processed {
            tracing::info!(transaction_id = %tx.id, "duplicate notification, already processed");
            return Ok(ReconcileResult::AlreadyProcessed(tx.id));
        }

        let fetched = tokio::time::timeout(self.gateway_timeout, self.gateway.fetch_payment(payment_id))
            .await
            .map_err(|_| GatewayError::Timeout)
            .and_then(|result| result)?;
        let incoming = fetched.status.local_status();

        if let Some(reference) = fetched.external_reference.as_deref() {
            if reference != tx.external_reference.as_str() {
                tracing::warn!(
                    transaction_id = %tx.id,
                    provider_reference = reference,
                    stored_reference = %tx.external_reference,
                    "provider reports a different external reference"
                );
            }
        }

        if !incoming.is_terminal() {
            if tx.status == TransactionStatus::Pending {
                self.store
                    .refresh_provider_status(tx.id, &fetched.status)
                    .await?;
            }
            tracing::info!(
                transaction_id = %tx.id,
                provider_status = %fetched.status.status,
                "payment not settled yet"
            );
            return Ok(ReconcileResult::StillPending(tx.id));
        }

        if tx.status == TransactionStatus::Pending {
            let advanced = self
                .store
                .advance_status(tx.id, incoming, &fetched.status)
                .await?;
            if !advanced {
                tracing::info!(transaction_id = %tx.id, "status already advanced by a concurrent delivery");
                return Ok(ReconcileResult::InFlight(tx.id));
            }
            tracing::info!(transaction_id = %tx.id, from = %tx.status, to = %incoming, "transaction status advanced");
            let mut tx = tx;
            tx.status = incoming;
            return self.finish(tx).await;
        }

        if tx.status != incoming {
            tracing::warn!(
                transaction_id = %tx.id,
                from = %tx.status,
                to = %incoming,
                provider_status = %fetched.status.status,
                "provider status contradicts terminal transaction, logged as anomaly"
            );
            self.store.mark_webhook_processed(tx.id).await?;
            return Ok(ReconcileResult::Anomaly(tx.id));
        }

        // Terminal already (synchronous card result or an interrupted run).
        self.finish(tx).await
    }

    async fn finish(&self, tx: Transaction) -> Result<ReconcileResult, PipelineError> {
        let result = match tx.status {
            TransactionStatus::Completed => {
                let allocation = match tx.allocation {
                    AllocationStatus::NotAttempted => match self.allocate(&tx).await? {
                        Some(allocation) => allocation,
                        None => return Ok(ReconcileResult::InFlight(tx.id)),
                    },
                    recorded => recorded,
                };
                ReconcileResult::Completed {
                    id: tx.id,
                    allocation,
                }
            }
            TransactionStatus::Failed => ReconcileResult::Failed(tx.id),
            TransactionStatus::Pending => {
                return Err(PipelineError::Validation(format!(
                    "transaction {} is not terminal",
                    tx.id
                )));
            }
        };

        if !self.store.mark_webhook_processed(tx.id).await? {
            return Ok(ReconcileResult::AlreadyProcessed(tx.id));
        }
        Ok(result)
    }

    /// `None` when a concurrent delivery recorded the allocation first.
    async fn allocate(&self, tx: &Transaction) -> Result<Option<AllocationStatus>, PipelineError> {
        let reserved = self.catalog.reserve(&tx.item_id, &tx.buyer_id).await?;
        let allocation = AllocationStatus::from_reserved(reserved);
        if !self.store.record_allocation(tx.id, allocation).await? {
            tracing::info!(transaction_id = %tx.id, "allocation already recorded by a concurrent delivery");
            return Ok(None);
        }

        if reserved {
            tracing::info!(transaction_id = %tx.id, account_id = %tx.item_id, "account reserved after settlement");
        } else {
            tracing::warn!(
                transaction_id = %tx.id,
                account_id = %tx.item_id,
                "payment settled but account already sold, needs manual review"
            );
        }
        Ok(Some(allocation))
    }
}
