use {
    super::error::PipelineError,
    super::id::{BuyerId, ExternalReference, ItemId, ProviderPaymentId},
    super::transaction::{AllocationStatus, NewTransaction, ProviderStatus, Transaction, TransactionStatus},
    serde::{Deserialize, Serialize},
    std::{fmt, future::Future, pin::Pin},
    uuid::Uuid,
};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PipelineError>> + Send + 'a>>;

/// Durable record of every payment attempt.
///
/// Status moves pending → {completed, failed} and never back; callers rely on
/// [`TransactionStore::advance_status`] being a compare-and-set from pending.
pub trait TransactionStore: Send + Sync {
    /// Single insert. `false` when the external reference is already stored.
    fn create<'a>(&'a self, tx: &'a NewTransaction) -> StoreFuture<'a, bool>;

    fn find_by_external_reference<'a>(
        &'a self,
        reference: &'a ExternalReference,
    ) -> StoreFuture<'a, Option<Transaction>>;

    fn find_by_provider_payment_id<'a>(
        &'a self,
        id: &'a ProviderPaymentId,
    ) -> StoreFuture<'a, Option<Transaction>>;

    /// Moves a pending transaction to `status`. `false` if it was no longer pending.
    fn advance_status<'a>(
        &'a self,
        id: Uuid,
        status: TransactionStatus,
        provider_status: &'a ProviderStatus,
    ) -> StoreFuture<'a, bool>;

    /// Records a non-terminal provider status without touching local status.
    fn refresh_provider_status<'a>(
        &'a self,
        id: Uuid,
        provider_status: &'a ProviderStatus,
    ) -> StoreFuture<'a, ()>;

    /// Stores the allocation result. `false` if one was already recorded,
    /// except that `Reserved` replaces an `Unavailable` written by a concurrent
    /// path that lost the reservation for this same transaction.
    fn record_allocation(&self, id: Uuid, outcome: AllocationStatus) -> StoreFuture<'_, bool>;

    /// `false` if the flag was already set.
    fn mark_webhook_processed(&self, id: Uuid) -> StoreFuture<'_, bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    Sold,
    InProduction,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Sold => "sold",
            Self::InProduction => "in_production",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ItemStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "available" => Ok(Self::Available),
            "sold" => Ok(Self::Sold),
            "in_production" => Ok(Self::InProduction),
            other => Err(PipelineError::Validation(format!(
                "unknown item status: {other}"
            ))),
        }
    }
}

/// Catalog boundary: item status reads and the conditional reservation.
pub trait AccountAllocator: Send + Sync {
    fn item_status<'a>(&'a self, item: &'a ItemId) -> StoreFuture<'a, Option<ItemStatus>>;

    /// Atomically marks the item sold to `buyer` if, and only if, it is still
    /// available. Exactly one concurrent caller observes `true`.
    fn reserve<'a>(&'a self, item: &'a ItemId, buyer: &'a BuyerId) -> StoreFuture<'a, bool>;
}
