//! Provider rejection codes mapped to user-facing reasons.
//!
//! Mercado Pago reports a synchronous decline through `status_detail`
//! (`cc_rejected_*`) and a refused request through `cause[].code`. Both land
//! here; anything unrecognised goes to [`DeclineReason::Other`] and keeps the
//! raw code for the logs.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclineReason {
    InvalidCardNumber,
    InvalidExpirationDate,
    InvalidSecurityCode,
    InvalidCardData,
    InvalidIdentification,
    CallForAuthorize,
    CardDisabled,
    CardError,
    DuplicatedPayment,
    HighRisk,
    InsufficientFunds,
    InvalidInstallments,
    MaxAttempts,
    UnderReview,
    Blacklisted,
    Other(String),
}

impl DeclineReason {
    pub fn from_status_detail(detail: &str) -> Self {
        match detail {
            "cc_rejected_bad_filled_card_number" => Self::InvalidCardNumber,
            "cc_rejected_bad_filled_date" => Self::InvalidExpirationDate,
            "cc_rejected_bad_filled_security_code" => Self::InvalidSecurityCode,
            "cc_rejected_bad_filled_other" => Self::InvalidCardData,
            "cc_rejected_call_for_authorize" => Self::CallForAuthorize,
            "cc_rejected_card_disabled" => Self::CardDisabled,
            "cc_rejected_card_error" => Self::CardError,
            "cc_rejected_duplicated_payment" => Self::DuplicatedPayment,
            "cc_rejected_high_risk" => Self::HighRisk,
            "cc_rejected_insufficient_amount" => Self::InsufficientFunds,
            "cc_rejected_invalid_installments" => Self::InvalidInstallments,
            "cc_rejected_max_attempts" => Self::MaxAttempts,
            "cc_rejected_blacklist" => Self::Blacklisted,
            "pending_contingency" | "pending_review_manual" => Self::UnderReview,
            other => Self::Other(other.to_string()),
        }
    }

    /// Maps a `cause[].code` from a refused request.
    pub fn from_cause_code(code: &str) -> Self {
        match code {
            "205" | "E301" | "3034" => Self::InvalidCardNumber,
            "208" | "209" | "325" | "326" => Self::InvalidExpirationDate,
            "224" | "E302" => Self::InvalidSecurityCode,
            "221" | "316" => Self::InvalidCardData,
            "212" | "213" | "214" | "322" | "324" | "2067" => Self::InvalidIdentification,
            "220" => Self::CardError,
            other => Self::Other(other.to_string()),
        }
    }

    /// Stable sub-code surfaced next to `mercado_pago_error`.
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidCardNumber => "invalid_card_number",
            Self::InvalidExpirationDate => "expired_or_invalid_date",
            Self::InvalidSecurityCode => "invalid_security_code",
            Self::InvalidCardData => "invalid_card_data",
            Self::InvalidIdentification => "invalid_identification",
            Self::CallForAuthorize => "call_for_authorize",
            Self::CardDisabled => "card_disabled",
            Self::CardError => "card_error",
            Self::DuplicatedPayment => "duplicated_payment",
            Self::HighRisk => "high_risk",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidInstallments => "invalid_installments",
            Self::MaxAttempts => "max_attempts",
            Self::UnderReview => "under_review",
            Self::Blacklisted => "blacklisted",
            Self::Other(_) => "payment_declined",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidCardNumber => "Check the card number and try again.",
            Self::InvalidExpirationDate => "Check the card expiration date.",
            Self::InvalidSecurityCode => "Check the card security code.",
            Self::InvalidCardData => "Check the card details and try again.",
            Self::InvalidIdentification => "Check the payer's CPF.",
            Self::CallForAuthorize => "Authorize the payment with your card issuer.",
            Self::CardDisabled => "Call your card issuer to activate the card.",
            Self::CardError => "The card could not process the payment.",
            Self::DuplicatedPayment => "You already made a payment for this amount.",
            Self::HighRisk => "The payment was declined. Choose another payment method.",
            Self::InsufficientFunds => "The card has insufficient funds.",
            Self::InvalidInstallments => "The card does not accept this number of installments.",
            Self::MaxAttempts => "Too many attempts. Choose another card or payment method.",
            Self::UnderReview => "The payment is under review by the provider.",
            Self::Blacklisted => "The payment could not be processed.",
            Self::Other(_) => "The payment was declined.",
        }
    }
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(raw) => write!(f, "payment_declined({raw})"),
            known => write!(f, "{}", known.code()),
        }
    }
}
