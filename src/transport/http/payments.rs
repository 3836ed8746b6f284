use {
    crate::{
        AppState,
        domain::{
            decline::DeclineReason,
            error::{ErrorCode, GatewayError, PipelineError},
            request::{RawPaymentRequest, ValidationError},
            transaction::Transaction,
        },
        services::checkout::{CheckoutError, CheckoutOutcome},
    },
    axum::{
        Json,
        extract::{State, rejection::StringRejection},
    },
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    serde::Serialize,
    uuid::Uuid,
};

/// Body of every `/payments` answer. Always sent with HTTP 200; `success`
/// carries the business result.
#[derive(Debug, Default, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_detail: Option<String>,
    pub payment_method_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub transaction_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installments: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub external_reference: String,
}

impl PaymentResponse {
    fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            error_code: Some(code),
            ..Self::default()
        }
    }

    fn with_transaction(mut self, tx: &Transaction) -> Self {
        self.payment = Some(PaymentView {
            id: tx.provider_payment_id.to_string(),
            status: tx.provider_status.status.clone(),
            status_detail: tx.provider_status.detail.clone(),
            payment_method_id: tx.provider_payment_method.clone(),
            transaction_amount: tx.money.amount().to_decimal(),
            installments: tx.installments,
        });
        self.transaction = Some(TransactionView {
            id: tx.id,
            external_reference: tx.external_reference.to_string(),
        });
        self
    }
}

impl From<CheckoutOutcome> for PaymentResponse {
    fn from(outcome: CheckoutOutcome) -> Self {
        match outcome {
            CheckoutOutcome::Approved(tx) => Self {
                success: true,
                ..Self::default()
            }
            .with_transaction(&tx),
            CheckoutOutcome::AwaitingPayment(tx) => {
                let mut response = Self {
                    success: true,
                    ..Self::default()
                }
                .with_transaction(&tx);
                if let Some(pix) = tx.pix {
                    response.qr_code = Some(pix.qr_code);
                    response.qr_code_base64 = Some(pix.qr_code_base64);
                    response.expires_at = pix.expires_at;
                }
                response
            }
            CheckoutOutcome::Declined {
                transaction,
                reason,
            } => Self {
                error_detail: Some(reason.code().to_string()),
                ..Self::failure(ErrorCode::MercadoPagoError, reason.message())
            }
            .with_transaction(&transaction),
            CheckoutOutcome::ItemTaken(tx) => Self::failure(
                ErrorCode::AccountUnavailable,
                "This account is no longer available.",
            )
            .with_transaction(&tx),
        }
    }
}

impl From<&CheckoutError> for PaymentResponse {
    fn from(err: &CheckoutError) -> Self {
        let code = err.code();
        match err {
            CheckoutError::MissingCredentials => {
                Self::failure(code, "Payment provider is not configured.")
            }
            CheckoutError::Invalid(errors) => {
                let message = errors
                    .first()
                    .map(|e| e.description.clone())
                    .unwrap_or_else(|| "invalid request".to_string());
                Self {
                    errors: Some(errors.clone()),
                    ..Self::failure(code, message)
                }
            }
            CheckoutError::ItemUnavailable(_) => {
                Self::failure(code, "This account is not available for sale.")
            }
            CheckoutError::Gateway(e) | CheckoutError::Store(PipelineError::Gateway(e)) => {
                gateway_failure(code, e)
            }
            CheckoutError::Store(_) => Self::failure(code, "Internal error, please try again."),
        }
    }
}

fn gateway_failure(code: ErrorCode, err: &GatewayError) -> PaymentResponse {
    match err {
        GatewayError::Timeout => {
            PaymentResponse::failure(code, "The payment provider did not answer in time.")
        }
        GatewayError::Network(_) => {
            PaymentResponse::failure(code, "Could not reach the payment provider.")
        }
        GatewayError::Provider { cause, message, .. } => {
            let reason = cause.as_deref().map(DeclineReason::from_cause_code);
            match reason {
                Some(DeclineReason::Other(_)) | None => PaymentResponse {
                    error_detail: Some("payment_declined".to_string()),
                    ..PaymentResponse::failure(code, message.clone())
                },
                Some(reason) => PaymentResponse {
                    error_detail: Some(reason.code().to_string()),
                    ..PaymentResponse::failure(code, reason.message())
                },
            }
        }
        GatewayError::Decode(_) => {
            PaymentResponse::failure(code, "Unexpected answer from the payment provider.")
        }
    }
}

#[tracing::instrument(name = "payment", skip_all, fields(error_code = tracing::field::Empty))]
pub async fn create_payment(
    State(state): State<AppState>,
    body: Result<String, StringRejection>,
) -> Json<PaymentResponse> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(status = %rejection.status(), "unreadable payment body: {rejection}");
            tracing::Span::current().record("error_code", ErrorCode::InvalidRequest.as_str());
            return Json(PaymentResponse::failure(
                ErrorCode::InvalidRequest,
                "Request body could not be read.",
            ));
        }
    };

    let raw: RawPaymentRequest = match serde_json::from_str(&body) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("malformed payment body: {e}");
            tracing::Span::current().record("error_code", ErrorCode::InvalidRequest.as_str());
            return Json(PaymentResponse::failure(
                ErrorCode::InvalidRequest,
                "Request body is not valid JSON.",
            ));
        }
    };

    let processed =
        tokio::time::timeout(state.request_timeout(), state.checkout.process(&raw, Utc::now())).await;
    let Ok(result) = processed else {
        tracing::error!(timeout = ?state.request_timeout(), "payment request exceeded its deadline");
        tracing::Span::current().record("error_code", ErrorCode::Timeout.as_str());
        return Json(PaymentResponse::failure(
            ErrorCode::Timeout,
            "The payment could not be completed in time, please try again.",
        ));
    };

    match result {
        Ok(outcome) => Json(outcome.into()),
        Err(err) => {
            let code = err.code();
            tracing::Span::current().record("error_code", code.as_str());
            match &err {
                CheckoutError::Store(e) => tracing::error!("checkout failed: {e}"),
                CheckoutError::Gateway(e) => tracing::warn!(retryable = e.is_retryable(), "charge failed: {e}"),
                other => tracing::info!("payment rejected: {other}"),
            }
            Json(PaymentResponse::from(&err))
        }
    }
}
