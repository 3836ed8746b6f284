use {
    super::decline::DeclineReason,
    super::error::GatewayError,
    super::id::{ExternalReference, ProviderPaymentId},
    super::request::PaymentRequest,
    super::transaction::{PixPayload, ProviderStatus, TransactionStatus},
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin},
};

/// One charge attempt handed to the gateway.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub payment: PaymentRequest,
    pub external_reference: ExternalReference,
    /// Set for PIX only.
    pub pix_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeDecision {
    Approved,
    Pending,
    Rejected(DeclineReason),
}

impl ChargeDecision {
    pub fn local_status(&self) -> TransactionStatus {
        match self {
            Self::Approved => TransactionStatus::Completed,
            Self::Pending => TransactionStatus::Pending,
            Self::Rejected(_) => TransactionStatus::Failed,
        }
    }
}

/// Normalized result of a charge call.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub decision: ChargeDecision,
    pub provider_payment_id: ProviderPaymentId,
    pub provider_status: ProviderStatus,
    pub payment_method_id: String,
    pub provider_reference: Option<String>,
    pub pix: Option<PixPayload>,
    pub raw: serde_json::Value,
}

/// Current provider view of a payment, fetched during reconciliation.
#[derive(Debug, Clone)]
pub struct ProviderPayment {
    pub id: ProviderPaymentId,
    pub status: ProviderStatus,
    pub external_reference: Option<String>,
}

pub trait PaymentGateway: Send + Sync {
    fn create_charge(
        &self,
        charge: ChargeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChargeOutcome, GatewayError>> + Send + '_>>;

    fn fetch_payment(
        &self,
        id: &ProviderPaymentId,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderPayment, GatewayError>> + Send + '_>>;
}
