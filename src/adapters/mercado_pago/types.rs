//! Wire shapes of the `/v1/payments` API.

use {
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Serialize)]
pub struct PaymentPayload<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    pub transaction_amount: Decimal,
    pub description: String,
    pub payment_method_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installments: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<&'a str>,
    pub payer: PayerPayload<'a>,
    pub external_reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_expiration: Option<String>,
    pub metadata: Metadata<'a>,
}

#[derive(Debug, Serialize)]
pub struct PayerPayload<'a> {
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub identification: Identification<'a>,
}

#[derive(Debug, Serialize)]
pub struct Identification<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub number: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Metadata<'a> {
    pub account_id: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentResponse {
    pub id: u64,
    pub status: String,
    #[serde(default)]
    pub status_detail: Option<String>,
    #[serde(default)]
    pub payment_method_id: Option<String>,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub date_of_expiration: Option<String>,
    #[serde(default)]
    pub point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointOfInteraction {
    #[serde(default)]
    pub transaction_data: Option<TransactionData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionData {
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub qr_code_base64: Option<String>,
    #[serde(default)]
    pub ticket_url: Option<String>,
}

/// Body of a non-2xx answer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub cause: Vec<Cause>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cause {
    /// Numeric on most endpoints, a string on a few (`E301`).
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Cause {
    pub fn code_str(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
