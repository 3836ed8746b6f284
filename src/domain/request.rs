use {
    super::{
        error::ErrorCode,
        id::{BuyerId, ItemId},
        money::MoneyAmount,
    },
    rust_decimal::Decimal,
    serde::{Deserialize, Deserializer, Serialize},
};

/// Payment request exactly as the checkout UI posts it. Every field is
/// optional so the validator can report all problems at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPaymentRequest {
    pub payment_method_id: Option<String>,
    pub token: Option<String>,
    pub installments: Option<i64>,
    pub amount: Option<Decimal>,
    pub email: Option<String>,
    pub identification_type: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub identification_number: Option<String>,
    pub payer_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub account_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub issuer_id: Option<String>,
}

// Brick forms send issuer ids and CPFs as either JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// A validated CPF: exactly 11 digits, punctuation stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cpf(String);

impl Cpf {
    pub(crate) fn from_validated_digits(digits: String) -> Self {
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payer {
    pub email: String,
    pub name: String,
    pub cpf: Cpf,
}

impl Payer {
    /// Splits the full name into (first, last) as the gateway expects.
    pub fn split_name(&self) -> (&str, &str) {
        match self.name.split_once(' ') {
            Some((first, last)) => (first, last.trim()),
            None => (self.name.as_str(), ""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDetails {
    /// Card brand id as chosen by the UI (`visa`, `master`, ...).
    pub brand: String,
    pub token: String,
    pub issuer_id: String,
    pub installments: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    Pix,
    Card(CardDetails),
}

impl PaymentMethod {
    pub fn id(&self) -> &str {
        match self {
            Self::Pix => "pix",
            Self::Card(card) => &card.brand,
        }
    }

    pub fn is_pix(&self) -> bool {
        matches!(self, Self::Pix)
    }
}

/// Normalized request produced by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    pub amount: MoneyAmount,
    pub payer: Payer,
    pub item_id: ItemId,
    pub buyer_id: BuyerId,
}

impl PaymentRequest {
    pub fn installments(&self) -> Option<u8> {
        match &self.method {
            PaymentMethod::Pix => None,
            PaymentMethod::Card(card) => Some(card.installments),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub code: ErrorCode,
    pub description: String,
    pub field: &'static str,
}

impl ValidationError {
    pub fn new(code: ErrorCode, field: &'static str, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            field,
        }
    }
}
