//! Request validation. Runs before any gateway call or write and reports
//! every violated rule, in a fixed order, not just the first.

use crate::domain::{
    error::ErrorCode,
    id::{BuyerId, ItemId},
    money::MoneyAmount,
    request::{CardDetails, Cpf, Payer, PaymentMethod, PaymentRequest, RawPaymentRequest, ValidationError},
};

pub const MIN_CARD_TOKEN_LEN: usize = 20;
pub const MAX_INSTALLMENTS: i64 = 12;

#[derive(Debug, Clone, Copy)]
pub struct ValidationRules {
    /// Inclusive amount ceiling.
    pub max_amount: MoneyAmount,
}

pub fn validate(
    raw: &RawPaymentRequest,
    rules: &ValidationRules,
) -> Result<PaymentRequest, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let method_id = non_empty(raw.payment_method_id.as_deref());
    if method_id.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::InvalidPaymentMethod,
            "payment_method_id",
            "payment method is required",
        ));
    }

    let amount = raw
        .amount
        .and_then(|value| MoneyAmount::from_decimal(value).ok())
        .filter(|amount| !amount.is_zero() && *amount <= rules.max_amount);
    if amount.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::InvalidAmount,
            "amount",
            format!(
                "amount must be greater than zero and at most {}",
                rules.max_amount
            ),
        ));
    }

    let email = non_empty(raw.email.as_deref()).filter(|e| is_plausible_email(e));
    if email.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::InvalidEmail,
            "email",
            "a valid email is required",
        ));
    }

    let item_id = raw.account_id.as_deref().and_then(|id| ItemId::new(id).ok());
    if item_id.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::MissingAccountId,
            "account_id",
            "account id is required",
        ));
    }

    let buyer_id = raw.user_id.as_deref().and_then(|id| BuyerId::new(id).ok());
    if buyer_id.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::MissingUserId,
            "user_id",
            "user id is required",
        ));
    }

    let payer_name = raw
        .payer_name
        .as_deref()
        .map(str::trim)
        .filter(|name| name.chars().count() >= 2);
    if payer_name.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::InvalidPayerName,
            "payer_name",
            "payer name must have at least 2 characters",
        ));
    }

    let cpf = match check_identification(raw) {
        Ok(cpf) => Some(cpf),
        Err(err) => {
            errors.push(err);
            None
        }
    };

    let method = match method_id {
        Some(id) if id.eq_ignore_ascii_case("pix") => Some(PaymentMethod::Pix),
        Some(brand) => check_card(brand, raw, &mut errors).map(PaymentMethod::Card),
        None => None,
    };

    match (method, amount, email, item_id, buyer_id, payer_name, cpf) {
        (Some(method), Some(amount), Some(email), Some(item_id), Some(buyer_id), Some(name), Some(cpf))
            if errors.is_empty() =>
        {
            Ok(PaymentRequest {
                method,
                amount,
                payer: Payer {
                    email: email.to_string(),
                    name: name.to_string(),
                    cpf,
                },
                item_id,
                buyer_id,
            })
        }
        _ => Err(errors),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

fn check_identification(raw: &RawPaymentRequest) -> Result<Cpf, ValidationError> {
    let id_type = non_empty(raw.identification_type.as_deref());
    let number = non_empty(raw.identification_number.as_deref());

    let number = match (id_type, number) {
        (Some(t), Some(n)) if t.eq_ignore_ascii_case("cpf") => n,
        _ => {
            return Err(ValidationError::new(
                ErrorCode::InvalidIdentification,
                "identification_number",
                "CPF identification is required",
            ));
        }
    };

    let digits: String = number.chars().filter(|c| !matches!(c, '.' | '-' | ' ')).collect();
    if is_valid_cpf(&digits) {
        Ok(Cpf::from_validated_digits(digits))
    } else {
        Err(ValidationError::new(
            ErrorCode::InvalidCpfFormat,
            "identification_number",
            "CPF is invalid",
        ))
    }
}

/// 11 digits, not all the same, and both mod-11 check digits match.
pub fn is_valid_cpf(digits: &str) -> bool {
    if digits.len() != 11 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let d: Vec<u32> = digits.bytes().map(|b| u32::from(b - b'0')).collect();
    if d.iter().all(|&x| x == d[0]) {
        return false;
    }
    check_digit(&d[..9]) == d[9] && check_digit(&d[..10]) == d[10]
}

/// Weights run from `len + 1` down to 2; remainders 10 and 11 become 0.
fn check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=top).rev())
        .map(|(digit, weight)| digit * weight)
        .sum();
    let rest = 11 - (sum % 11);
    if rest >= 10 { 0 } else { rest }
}

fn check_card(
    brand: &str,
    raw: &RawPaymentRequest,
    errors: &mut Vec<ValidationError>,
) -> Option<CardDetails> {
    let token = non_empty(raw.token.as_deref()).filter(|t| t.len() >= MIN_CARD_TOKEN_LEN);
    if token.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::InvalidToken,
            "token",
            "card token is missing or malformed",
        ));
    }

    let issuer_id = non_empty(raw.issuer_id.as_deref());
    if issuer_id.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::MissingIssuerId,
            "issuer_id",
            "card issuer is required",
        ));
    }

    let installments = match raw.installments {
        None => Some(1),
        Some(n) if (1..=MAX_INSTALLMENTS).contains(&n) => u8::try_from(n).ok(),
        Some(_) => None,
    };
    if installments.is_none() {
        errors.push(ValidationError::new(
            ErrorCode::InvalidInstallments,
            "installments",
            format!("installments must be between 1 and {MAX_INSTALLMENTS}"),
        ));
    }

    Some(CardDetails {
        brand: brand.to_lowercase(),
        token: token?.to_string(),
        issuer_id: issuer_id?.to_string(),
        installments: installments?,
    })
}
