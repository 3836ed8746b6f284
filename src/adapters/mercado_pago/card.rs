use {
    super::{
        payer_payload, payment_id,
        types::{Metadata, PaymentPayload, PaymentResponse},
    },
    crate::domain::{
        decline::DeclineReason,
        error::GatewayError,
        gateway::{ChargeDecision, ChargeOutcome, ChargeRequest},
        request::CardDetails,
        transaction::ProviderStatus,
    },
};

pub fn build_payload<'a>(
    charge: &'a ChargeRequest,
    card: &'a CardDetails,
    notification_url: Option<&'a str>,
) -> PaymentPayload<'a> {
    let payment = &charge.payment;
    PaymentPayload {
        transaction_amount: payment.amount.to_decimal(),
        description: format!("Account {}", payment.item_id),
        payment_method_id: &card.brand,
        token: Some(&card.token),
        installments: Some(card.installments),
        issuer_id: Some(&card.issuer_id),
        payer: payer_payload(&payment.payer),
        external_reference: charge.external_reference.as_str(),
        notification_url,
        date_of_expiration: None,
        metadata: Metadata {
            account_id: payment.item_id.as_str(),
            user_id: payment.buyer_id.as_str(),
        },
    }
}

/// Card charges settle synchronously: only `approved` completes, any other
/// answer (including `in_process`) is a decline.
pub fn interpret(
    response: PaymentResponse,
    raw: serde_json::Value,
) -> Result<ChargeOutcome, GatewayError> {
    let decision = match response.status.as_str() {
        "approved" => ChargeDecision::Approved,
        other => ChargeDecision::Rejected(DeclineReason::from_status_detail(
            response.status_detail.as_deref().unwrap_or(other),
        )),
    };

    Ok(ChargeOutcome {
        decision,
        provider_payment_id: payment_id(response.id)?,
        provider_status: ProviderStatus::new(response.status, response.status_detail),
        payment_method_id: response.payment_method_id.unwrap_or_default(),
        provider_reference: response.authorization_code,
        pix: None,
        raw,
    })
}
