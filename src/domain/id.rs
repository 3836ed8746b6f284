use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Catalog item (sellable account) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(PipelineError::Validation("ItemId must not be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Buyer (user) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuyerId(String);

impl BuyerId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(PipelineError::Validation("BuyerId must not be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Idempotency key shared by the transaction row and the gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalReference(String);

impl ExternalReference {
    pub fn new(reference: impl Into<String>) -> Result<Self, PipelineError> {
        let reference = reference.into();
        if reference.is_empty() || reference.len() > 256 {
            return Err(PipelineError::Validation(format!(
                "ExternalReference must be 1..=256 chars, got {}",
                reference.len()
            )));
        }
        Ok(Self(reference))
    }

    /// For references built by the generator, which are bounded by construction.
    pub(crate) fn derived(reference: String) -> Self {
        Self(reference)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Payment identifier assigned by the provider (numeric on Mercado Pago).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderPaymentId(String);

impl ProviderPaymentId {
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into().trim().to_string();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(PipelineError::Validation(format!(
                "ProviderPaymentId must be non-empty alphanumeric, got: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
