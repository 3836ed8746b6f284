use {
    super::audit::NewAuditEntry,
    super::error::PipelineError,
    super::id::{BuyerId, ExternalReference, ItemId, ProviderPaymentId},
    super::money::Money,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    uuid::Uuid,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Lifecycle rank; higher means further along. Status never moves to a
    /// lower or equal rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Completed | Self::Failed => 1,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 1
    }

    pub fn can_transition_to(&self, next: &TransactionStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Failed)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Validation(format!(
                "unknown transaction status: {other}"
            ))),
        }
    }
}

/// What happened when the item was reserved for this transaction's buyer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    NotAttempted,
    Reserved,
    /// Paid, but the item had already been taken. Needs manual review.
    Unavailable,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::Reserved => "reserved",
            Self::Unavailable => "unavailable",
        }
    }

    pub fn from_reserved(reserved: bool) -> Self {
        if reserved {
            Self::Reserved
        } else {
            Self::Unavailable
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AllocationStatus {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "not_attempted" => Ok(Self::NotAttempted),
            "reserved" => Ok(Self::Reserved),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(PipelineError::Validation(format!(
                "unknown allocation status: {other}"
            ))),
        }
    }
}

/// PIX payment instructions shown to the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixPayload {
    pub qr_code: String,
    pub qr_code_base64: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Raw provider status pair, richer than the local status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub status: String,
    pub detail: Option<String>,
}

impl ProviderStatus {
    pub fn new(status: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status: status.into(),
            detail,
        }
    }

    /// Local status implied by an asynchronous status report.
    pub fn local_status(&self) -> TransactionStatus {
        match self.status.as_str() {
            "approved" => TransactionStatus::Completed,
            "rejected" | "cancelled" | "refunded" | "charged_back" => TransactionStatus::Failed,
            _ => TransactionStatus::Pending,
        }
    }
}

/// Full transaction record from the store (for reads).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub external_reference: ExternalReference,
    pub item_id: ItemId,
    pub buyer_id: BuyerId,
    pub money: Money,
    pub status: TransactionStatus,
    pub provider_payment_id: ProviderPaymentId,
    pub provider_payment_method: String,
    pub provider_status: ProviderStatus,
    pub provider_reference: Option<String>,
    pub installments: Option<u8>,
    pub pix: Option<PixPayload>,
    pub allocation: AllocationStatus,
    pub webhook_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewTransactionParams {
    pub external_reference: ExternalReference,
    pub item_id: ItemId,
    pub buyer_id: BuyerId,
    pub money: Money,
    pub status: TransactionStatus,
    pub provider_payment_id: ProviderPaymentId,
    pub provider_payment_method: String,
    pub provider_status: ProviderStatus,
    pub provider_reference: Option<String>,
    pub installments: Option<u8>,
    pub pix: Option<PixPayload>,
}

/// For INSERT. The id is generated in Rust via `Uuid::now_v7()`.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    id: Uuid,
    external_reference: ExternalReference,
    item_id: ItemId,
    buyer_id: BuyerId,
    money: Money,
    status: TransactionStatus,
    provider_payment_id: ProviderPaymentId,
    provider_payment_method: String,
    provider_status: ProviderStatus,
    provider_reference: Option<String>,
    installments: Option<u8>,
    pix: Option<PixPayload>,
}

impl NewTransaction {
    pub fn new(params: NewTransactionParams) -> Self {
        Self {
            id: Uuid::now_v7(),
            external_reference: params.external_reference,
            item_id: params.item_id,
            buyer_id: params.buyer_id,
            money: params.money,
            status: params.status,
            provider_payment_id: params.provider_payment_id,
            provider_payment_method: params.provider_payment_method,
            provider_status: params.provider_status,
            provider_reference: params.provider_reference,
            installments: params.installments,
            pix: params.pix,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn external_reference(&self) -> &ExternalReference {
        &self.external_reference
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    pub fn buyer_id(&self) -> &BuyerId {
        &self.buyer_id
    }

    pub fn money(&self) -> &Money {
        &self.money
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn provider_payment_id(&self) -> &ProviderPaymentId {
        &self.provider_payment_id
    }

    pub fn provider_payment_method(&self) -> &str {
        &self.provider_payment_method
    }

    pub fn provider_status(&self) -> &ProviderStatus {
        &self.provider_status
    }

    pub fn provider_reference(&self) -> Option<&str> {
        self.provider_reference.as_deref()
    }

    pub fn installments(&self) -> Option<u8> {
        self.installments
    }

    pub fn pix(&self) -> Option<&PixPayload> {
        self.pix.as_ref()
    }

    /// The row as it reads back immediately after insert.
    pub fn to_record(&self, at: DateTime<Utc>) -> Transaction {
        Transaction {
            id: self.id,
            external_reference: self.external_reference.clone(),
            item_id: self.item_id.clone(),
            buyer_id: self.buyer_id.clone(),
            money: self.money.clone(),
            status: self.status,
            provider_payment_id: self.provider_payment_id.clone(),
            provider_payment_method: self.provider_payment_method.clone(),
            provider_status: self.provider_status.clone(),
            provider_reference: self.provider_reference.clone(),
            installments: self.installments,
            pix: self.pix.clone(),
            allocation: AllocationStatus::NotAttempted,
            webhook_processed: false,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn audit_entry(&self, actor: &str, action: &str) -> NewAuditEntry {
        let detail = serde_json::json!({
            "account_id": self.item_id.as_str(),
            "amount": self.money.amount().cents(),
            "currency": self.money.currency().as_str(),
            "status": self.status.as_str(),
            "provider_payment_id": self.provider_payment_id.as_str(),
            "provider_status": self.provider_status.status,
        });
        NewAuditEntry::transaction(self.id, actor, action, detail)
            .with_external_id(self.external_reference.as_str())
    }
}
