use {
    super::error::PipelineError,
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Amount in minor units (centavos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub fn new(cents: i64) -> Result<Self, PipelineError> {
        if cents < 0 {
            return Err(PipelineError::Validation(format!(
                "MoneyAmount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    /// Converts a major-unit decimal (e.g. `150.00`) into minor units.
    /// Rejects negative values and anything finer than a centavo.
    pub fn from_decimal(value: Decimal) -> Result<Self, PipelineError> {
        let normalized = value.normalize();
        if normalized.scale() > 2 {
            return Err(PipelineError::Validation(format!(
                "amount has more than two decimal places: {value}"
            )));
        }
        let cents = (normalized * Decimal::ONE_HUNDRED).trunc();
        let cents: i64 = cents
            .try_into()
            .map_err(|_| PipelineError::Validation(format!("amount out of range: {value}")))?;
        Self::new(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Major-unit decimal with two fractional digits.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Brl,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brl => "BRL",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "BRL" | "brl" => Ok(Self::Brl),
            other => Err(PipelineError::Validation(format!(
                "unknown currency: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MoneyAmount,
    currency: Currency,
}

impl Money {
    pub fn new(amount: MoneyAmount, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn amount(&self) -> MoneyAmount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }
}
