use {
    super::{
        reference::generate_reference,
        validation::{ValidationRules, validate},
    },
    crate::domain::{
        decline::DeclineReason,
        error::{ErrorCode, GatewayError, PipelineError},
        gateway::{ChargeDecision, ChargeRequest, PaymentGateway},
        id::ItemId,
        money::{Currency, Money, MoneyAmount},
        request::{RawPaymentRequest, ValidationError},
        store::{AccountAllocator, ItemStatus, TransactionStore},
        transaction::{
            AllocationStatus, NewTransaction, NewTransactionParams, Transaction, TransactionStatus,
        },
    },
    chrono::{DateTime, TimeDelta, Utc},
    std::{sync::Arc, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub max_amount: MoneyAmount,
    pub gateway_timeout: Duration,
    pub pix_expiration: TimeDelta,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// Card approved and the item reserved for the buyer.
    Approved(Transaction),
    /// PIX issued; the item stays available until the payment clears.
    AwaitingPayment(Transaction),
    Declined {
        transaction: Transaction,
        reason: DeclineReason,
    },
    /// Charge approved, but another buyer got the item first.
    ItemTaken(Transaction),
}

impl CheckoutOutcome {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Self::Approved(t) | Self::AwaitingPayment(t) | Self::ItemTaken(t) => t,
            Self::Declined { transaction, .. } => transaction,
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("payment gateway credentials are not configured")]
    MissingCredentials,

    #[error("invalid payment request ({} problem(s))", .0.len())]
    Invalid(Vec<ValidationError>),

    #[error("account {0} is not available")]
    ItemUnavailable(ItemId),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] PipelineError),
}

impl CheckoutError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MissingCredentials => ErrorCode::MissingAccessToken,
            Self::Invalid(errors) => errors
                .first()
                .map(|e| e.code)
                .unwrap_or(ErrorCode::InvalidRequest),
            Self::ItemUnavailable(_) => ErrorCode::AccountUnavailable,
            Self::Gateway(e) | Self::Store(PipelineError::Gateway(e)) => match e {
                GatewayError::Timeout => ErrorCode::Timeout,
                GatewayError::Network(_) => ErrorCode::NetworkError,
                GatewayError::Provider { .. } => ErrorCode::MercadoPagoError,
                GatewayError::Decode(_) => ErrorCode::InternalError,
            },
            Self::Store(PipelineError::Database(_)) => ErrorCode::DatabaseError,
            Self::Store(_) => ErrorCode::InternalError,
        }
    }
}

pub struct Checkout {
    store: Arc<dyn TransactionStore>,
    catalog: Arc<dyn AccountAllocator>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    settings: CheckoutSettings,
}

impl Checkout {
    /// `gateway` is `None` when no provider credentials are configured; every
    /// request then fails before validation.
    pub fn new(
        store: Arc<dyn TransactionStore>,
        catalog: Arc<dyn AccountAllocator>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            settings,
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    #[tracing::instrument(
        name = "checkout",
        skip_all,
        fields(external_reference = tracing::field::Empty, method = tracing::field::Empty)
    )]
    pub async fn process(
        &self,
        raw: &RawPaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let gateway = self
            .gateway
            .as_deref()
            .ok_or(CheckoutError::MissingCredentials)?;

        let rules = ValidationRules {
            max_amount: self.settings.max_amount,
        };
        let request = validate(raw, &rules).map_err(CheckoutError::Invalid)?;
        let reference = generate_reference(&request.item_id, &request.buyer_id, now);

        tracing::Span::current()
            .record("external_reference", tracing::field::display(&reference))
            .record("method", request.method.id());

        // A retry of an attempt we already recorded is answered from the row.
        if let Some(existing) = self.store.find_by_external_reference(&reference).await? {
            tracing::info!(transaction_id = %existing.id, "replaying recorded attempt");
            return self.replay(existing).await;
        }

        match self.catalog.item_status(&request.item_id).await? {
            Some(ItemStatus::Available) => {}
            status => {
                tracing::info!(account_id = %request.item_id, ?status, "account not available for sale");
                return Err(CheckoutError::ItemUnavailable(request.item_id));
            }
        }

        let pix_expires_at = request
            .method
            .is_pix()
            .then(|| now + self.settings.pix_expiration);
        let charge = ChargeRequest {
            payment: request.clone(),
            external_reference: reference.clone(),
            pix_expires_at,
        };

        let outcome = tokio::time::timeout(self.settings.gateway_timeout, gateway.create_charge(charge))
            .await
            .map_err(|_| GatewayError::Timeout)
            .and_then(|result| result)
            .inspect_err(|e| {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "gateway charge failed");
            })?;
        tracing::debug!(raw = %outcome.raw, "gateway answer");

        let new_tx = NewTransaction::new(NewTransactionParams {
            external_reference: reference.clone(),
            item_id: request.item_id.clone(),
            buyer_id: request.buyer_id.clone(),
            money: Money::new(request.amount, Currency::Brl),
            status: outcome.decision.local_status(),
            provider_payment_id: outcome.provider_payment_id.clone(),
            provider_payment_method: outcome.payment_method_id.clone(),
            provider_status: outcome.provider_status.clone(),
            provider_reference: outcome.provider_reference.clone(),
            installments: request.installments(),
            pix: outcome.pix.clone(),
        });

        if !self.store.create(&new_tx).await? {
            let existing = self
                .store
                .find_by_external_reference(&reference)
                .await?
                .ok_or_else(|| {
                    PipelineError::Unavailable(format!("transaction {reference} vanished after conflict"))
                })?;
            tracing::info!(transaction_id = %existing.id, "concurrent retry already recorded this attempt");
            return self.replay(existing).await;
        }

        let transaction = new_tx.to_record(now);
        tracing::info!(
            transaction_id = %transaction.id,
            provider_payment_id = %transaction.provider_payment_id,
            status = %transaction.status,
            "transaction created"
        );

        match outcome.decision {
            ChargeDecision::Approved => self.allocate(transaction).await,
            ChargeDecision::Pending => Ok(CheckoutOutcome::AwaitingPayment(transaction)),
            ChargeDecision::Rejected(reason) => {
                tracing::info!(reason = %reason, "charge declined");
                Ok(CheckoutOutcome::Declined {
                    transaction,
                    reason,
                })
            }
        }
    }

    async fn replay(&self, existing: Transaction) -> Result<CheckoutOutcome, CheckoutError> {
        match (existing.status, existing.allocation) {
            (TransactionStatus::Completed, AllocationStatus::NotAttempted) => {
                self.allocate(existing).await
            }
            (TransactionStatus::Completed, AllocationStatus::Reserved) => {
                Ok(CheckoutOutcome::Approved(existing))
            }
            (TransactionStatus::Completed, AllocationStatus::Unavailable) => {
                Ok(CheckoutOutcome::ItemTaken(existing))
            }
            (TransactionStatus::Pending, _) => Ok(CheckoutOutcome::AwaitingPayment(existing)),
            (TransactionStatus::Failed, _) => {
                let detail = existing
                    .provider_status
                    .detail
                    .as_deref()
                    .unwrap_or(&existing.provider_status.status);
                Ok(CheckoutOutcome::Declined {
                    reason: DeclineReason::from_status_detail(detail),
                    transaction: existing,
                })
            }
        }
    }

    async fn allocate(&self, mut transaction: Transaction) -> Result<CheckoutOutcome, CheckoutError> {
        let reserved = self
            .catalog
            .reserve(&transaction.item_id, &transaction.buyer_id)
            .await?;
        let allocation = AllocationStatus::from_reserved(reserved);
        let recorded = self.store.record_allocation(transaction.id, allocation).await;

        if reserved {
            // The buyer holds the item whatever the marker says.
            if let Err(e) = recorded {
                tracing::error!(transaction_id = %transaction.id, %allocation, error = %e, "failed to record allocation");
            }
            transaction.allocation = allocation;
            tracing::info!(transaction_id = %transaction.id, account_id = %transaction.item_id, "account reserved");
            return Ok(CheckoutOutcome::Approved(transaction));
        }

        // Another path for this same transaction may have reserved first.
        if !matches!(recorded, Ok(true)) {
            if let Err(e) = &recorded {
                tracing::warn!(transaction_id = %transaction.id, error = %e, "failed to record allocation, re-reading");
            }
            let stored = self
                .store
                .find_by_external_reference(&transaction.external_reference)
                .await?
                .ok_or_else(|| {
                    PipelineError::Unavailable(format!("transaction {} vanished", transaction.id))
                })?;
            if stored.allocation == AllocationStatus::Reserved {
                tracing::info!(transaction_id = %stored.id, "account already reserved for this transaction");
                return Ok(CheckoutOutcome::Approved(stored));
            }
            recorded?;
        }

        transaction.allocation = allocation;
        tracing::warn!(
            transaction_id = %transaction.id,
            account_id = %transaction.item_id,
            provider_payment_id = %transaction.provider_payment_id,
            "charge approved but account already sold, needs manual review"
        );
        Ok(CheckoutOutcome::ItemTaken(transaction))
    }
}
