use {
    serde::Serialize,
    std::fmt,
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Failure talking to the payment provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway call timed out")]
    Timeout,

    #[error("network: {0}")]
    Network(String),

    /// The provider answered but refused the request (HTTP 4xx/5xx).
    #[error("provider rejected request ({status}): {message}")]
    Provider {
        status: u16,
        message: String,
        cause: Option<String>,
    },

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Whether resubmitting with the same idempotency key may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Machine-readable error codes returned by the payment endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingAccessToken,
    InvalidRequest,
    InvalidPaymentMethod,
    InvalidAmount,
    InvalidEmail,
    MissingAccountId,
    MissingUserId,
    InvalidPayerName,
    InvalidIdentification,
    InvalidCpfFormat,
    InvalidToken,
    MissingIssuerId,
    InvalidInstallments,
    AccountUnavailable,
    MercadoPagoError,
    DatabaseError,
    Timeout,
    NetworkError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingAccessToken => "missing_access_token",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidPaymentMethod => "invalid_payment_method",
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidEmail => "invalid_email",
            Self::MissingAccountId => "missing_account_id",
            Self::MissingUserId => "missing_user_id",
            Self::InvalidPayerName => "invalid_payer_name",
            Self::InvalidIdentification => "invalid_identification",
            Self::InvalidCpfFormat => "invalid_cpf_format",
            Self::InvalidToken => "invalid_token",
            Self::MissingIssuerId => "missing_issuer_id",
            Self::InvalidInstallments => "invalid_installments",
            Self::AccountUnavailable => "account_unavailable",
            Self::MercadoPagoError => "mercado_pago_error",
            Self::DatabaseError => "database_error",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
