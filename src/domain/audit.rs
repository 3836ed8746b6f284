use uuid::Uuid;

const TRANSACTION_ENTITY: &str = "transaction";

/// Append-only lifecycle row, written in the same database transaction as the
/// change it describes.
pub struct NewAuditEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    /// External reference of the transaction, when known at write time.
    pub external_id: Option<String>,
    pub action: String,
    pub actor: String,
    pub detail: serde_json::Value,
}

impl NewAuditEntry {
    pub fn transaction(
        transaction_id: Uuid,
        actor: &str,
        action: &str,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            entity_type: TRANSACTION_ENTITY.to_string(),
            entity_id: Some(transaction_id),
            external_id: None,
            action: action.to_string(),
            actor: actor.to_string(),
            detail,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}
