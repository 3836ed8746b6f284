use {
    super::{
        payer_payload, payment_id,
        types::{Metadata, PaymentPayload, PaymentResponse},
    },
    crate::domain::{
        decline::DeclineReason,
        error::GatewayError,
        gateway::{ChargeDecision, ChargeOutcome, ChargeRequest},
        transaction::{PixPayload, ProviderStatus},
    },
    chrono::{DateTime, SecondsFormat, Utc},
};

pub const PAYMENT_METHOD_ID: &str = "pix";

pub fn build_payload<'a>(
    charge: &'a ChargeRequest,
    notification_url: Option<&'a str>,
) -> PaymentPayload<'a> {
    let payment = &charge.payment;
    PaymentPayload {
        transaction_amount: payment.amount.to_decimal(),
        description: format!("Account {}", payment.item_id),
        payment_method_id: PAYMENT_METHOD_ID,
        token: None,
        installments: None,
        issuer_id: None,
        payer: payer_payload(&payment.payer),
        external_reference: charge.external_reference.as_str(),
        notification_url,
        date_of_expiration: charge
            .pix_expires_at
            .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, false)),
        metadata: Metadata {
            account_id: payment.item_id.as_str(),
            user_id: payment.buyer_id.as_str(),
        },
    }
}

/// A PIX charge never settles synchronously. Unless the provider refused it
/// outright, the result is pending and must carry a QR payload.
pub fn interpret(
    response: PaymentResponse,
    raw: serde_json::Value,
    requested_expiry: Option<DateTime<Utc>>,
) -> Result<ChargeOutcome, GatewayError> {
    let provider_payment_id = payment_id(response.id)?;
    let provider_status = ProviderStatus::new(response.status.clone(), response.status_detail.clone());

    if matches!(response.status.as_str(), "rejected" | "cancelled") {
        let detail = response.status_detail.as_deref().unwrap_or(&response.status);
        return Ok(ChargeOutcome {
            decision: ChargeDecision::Rejected(DeclineReason::from_status_detail(detail)),
            provider_payment_id,
            provider_status,
            payment_method_id: PAYMENT_METHOD_ID.to_string(),
            provider_reference: None,
            pix: None,
            raw,
        });
    }

    let data = response
        .point_of_interaction
        .and_then(|poi| poi.transaction_data)
        .ok_or_else(|| GatewayError::Decode("PIX charge without transaction_data".into()))?;
    let (Some(qr_code), Some(qr_code_base64)) = (data.qr_code, data.qr_code_base64) else {
        return Err(GatewayError::Decode("PIX charge without QR payload".into()));
    };

    let expires_at = response
        .date_of_expiration
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc))
        .or(requested_expiry);

    Ok(ChargeOutcome {
        decision: ChargeDecision::Pending,
        provider_payment_id,
        provider_status,
        payment_method_id: response
            .payment_method_id
            .unwrap_or_else(|| PAYMENT_METHOD_ID.to_string()),
        provider_reference: data.ticket_url,
        pix: Some(PixPayload {
            qr_code,
            qr_code_base64,
            expires_at,
        }),
        raw,
    })
}
