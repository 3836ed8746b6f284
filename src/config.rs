//! Process configuration, read once at startup.
//!
//! Values come from the environment (optionally seeded by a `.env` file) and
//! are deserialized with `envy`; field `max_payment_amount` reads
//! `MAX_PAYMENT_AMOUNT` and so on.

use {
    crate::{
        adapters::mercado_pago::{DEFAULT_BASE_URL, MercadoPagoSettings},
        domain::money::MoneyAmount,
        services::checkout::CheckoutSettings,
    },
    chrono::TimeDelta,
    rust_decimal::Decimal,
    serde::Deserialize,
    std::{str::FromStr, time::Duration},
    thiserror::Error,
};

pub const MIN_PIX_EXPIRATION_MINUTES: i64 = 30;
pub const MAX_PIX_EXPIRATION_MINUTES: i64 = 24 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment: {0}")]
    Env(#[from] envy::Error),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub mercado_pago_access_token: Option<String>,

    #[serde(default = "default_base_url")]
    pub mercado_pago_base_url: String,

    #[serde(default)]
    pub mercado_pago_webhook_secret: Option<String>,

    #[serde(default)]
    pub notification_url: Option<String>,

    #[serde(default = "default_max_amount")]
    pub max_payment_amount: String,

    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_secs: u64,

    #[serde(default = "default_pix_expiration")]
    pub pix_expiration_minutes: i64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_amount() -> String {
    "10000.00".to_string()
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_pix_expiration() -> i64 {
    MIN_PIX_EXPIRATION_MINUTES
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()?;
        config.checkout_settings()?;
        Ok(config)
    }

    pub fn access_token(&self) -> Option<&str> {
        non_empty(&self.mercado_pago_access_token)
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        non_empty(&self.mercado_pago_webhook_secret)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    /// Clamped to the provider's accepted window.
    pub fn pix_expiration(&self) -> TimeDelta {
        TimeDelta::minutes(
            self.pix_expiration_minutes
                .clamp(MIN_PIX_EXPIRATION_MINUTES, MAX_PIX_EXPIRATION_MINUTES),
        )
    }

    pub fn max_amount(&self) -> Result<MoneyAmount, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            name: "MAX_PAYMENT_AMOUNT",
            reason,
        };
        let value = Decimal::from_str(self.max_payment_amount.trim()).map_err(|e| invalid(e.to_string()))?;
        let amount = MoneyAmount::from_decimal(value).map_err(|e| invalid(e.to_string()))?;
        if amount.is_zero() {
            return Err(invalid("must be greater than zero".into()));
        }
        Ok(amount)
    }

    pub fn checkout_settings(&self) -> Result<CheckoutSettings, ConfigError> {
        if self.gateway_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "GATEWAY_TIMEOUT_SECS",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(CheckoutSettings {
            max_amount: self.max_amount()?,
            gateway_timeout: self.gateway_timeout(),
            pix_expiration: self.pix_expiration(),
        })
    }

    /// `None` when no access token is configured.
    pub fn mercado_pago(&self) -> Option<MercadoPagoSettings> {
        Some(MercadoPagoSettings {
            base_url: self.mercado_pago_base_url.clone(),
            access_token: self.access_token()?.to_string(),
            notification_url: non_empty(&self.notification_url).map(str::to_string),
            timeout: self.gateway_timeout(),
        })
    }
}
