pub mod card;
pub mod pix;
pub mod types;
pub mod webhook;

use {
    crate::domain::{
        error::GatewayError,
        gateway::{ChargeOutcome, ChargeRequest, PaymentGateway, ProviderPayment},
        id::ProviderPaymentId,
        request::{Payer, PaymentMethod},
        transaction::ProviderStatus,
    },
    std::{future::Future, pin::Pin, time::Duration},
    types::{ErrorBody, Identification, PayerPayload, PaymentResponse},
};

pub const DEFAULT_BASE_URL: &str = "https://api.mercadopago.com";
const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

#[derive(Debug, Clone)]
pub struct MercadoPagoSettings {
    pub base_url: String,
    pub access_token: String,
    pub notification_url: Option<String>,
    pub timeout: Duration,
}

pub struct MercadoPagoGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    notification_url: Option<String>,
}

impl MercadoPagoGateway {
    pub fn new(settings: MercadoPagoSettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            access_token: settings.access_token,
            notification_url: settings.notification_url,
        })
    }

    async fn create_charge_inner(&self, charge: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let notification_url = self.notification_url.as_deref();
        let payload = match &charge.payment.method {
            PaymentMethod::Pix => pix::build_payload(&charge, notification_url),
            PaymentMethod::Card(card) => card::build_payload(&charge, card, notification_url),
        };

        tracing::debug!(
            external_reference = %charge.external_reference,
            method = charge.payment.method.id(),
            "sending charge"
        );

        let response = self
            .client
            .post(format!("{}/v1/payments", self.base_url))
            .bearer_auth(&self.access_token)
            .header(IDEMPOTENCY_HEADER, charge.external_reference.as_str())
            .json(&payload)
            .send()
            .await
            .map_err(transport_error)?;

        let raw = read_json(response).await?;
        let parsed: PaymentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::Decode(format!("payment response: {e}")))?;

        match &charge.payment.method {
            PaymentMethod::Pix => pix::interpret(parsed, raw, charge.pix_expires_at),
            PaymentMethod::Card(_) => card::interpret(parsed, raw),
        }
    }

    async fn fetch_payment_inner(&self, id: &ProviderPaymentId) -> Result<ProviderPayment, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v1/payments/{}", self.base_url, id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let raw = read_json(response).await?;
        let parsed: PaymentResponse = serde_json::from_value(raw)
            .map_err(|e| GatewayError::Decode(format!("payment response: {e}")))?;

        Ok(ProviderPayment {
            id: payment_id(parsed.id)?,
            status: ProviderStatus::new(parsed.status, parsed.status_detail),
            external_reference: parsed.external_reference,
        })
    }
}

impl PaymentGateway for MercadoPagoGateway {
    fn create_charge(
        &self,
        charge: ChargeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChargeOutcome, GatewayError>> + Send + '_>> {
        Box::pin(self.create_charge_inner(charge))
    }

    fn fetch_payment(
        &self,
        id: &ProviderPaymentId,
    ) -> Pin<Box<dyn Future<Output = Result<ProviderPayment, GatewayError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { self.fetch_payment_inner(&id).await })
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(e.to_string())
    }
}

/// Reads the body as JSON, turning non-2xx answers into `Provider` errors.
async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, GatewayError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let cause = body.cause.iter().find_map(|c| c.code_str());
        let message = body
            .cause
            .iter()
            .find_map(|c| c.description.clone())
            .or(body.message)
            .or(body.error)
            .unwrap_or_else(|| status.to_string());
        return Err(GatewayError::Provider {
            status: status.as_u16(),
            message,
            cause,
        });
    }

    serde_json::from_str(&text).map_err(|e| GatewayError::Decode(format!("invalid JSON: {e}")))
}

fn payer_payload(payer: &Payer) -> PayerPayload<'_> {
    let (first_name, last_name) = payer.split_name();
    PayerPayload {
        email: &payer.email,
        first_name,
        last_name,
        identification: Identification {
            kind: "CPF",
            number: payer.cpf.as_str(),
        },
    }
}

fn payment_id(id: u64) -> Result<ProviderPaymentId, GatewayError> {
    ProviderPaymentId::new(id.to_string()).map_err(|e| GatewayError::Decode(e.to_string()))
}
