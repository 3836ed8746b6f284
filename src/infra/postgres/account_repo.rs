use {
    crate::domain::{
        error::PipelineError,
        id::{BuyerId, ItemId},
        store::{AccountAllocator, ItemStatus, StoreFuture},
    },
    sqlx::PgPool,
};

/// Catalog access over the `accounts` table.
#[derive(Clone)]
pub struct PgAccountAllocator {
    pool: PgPool,
}

impl PgAccountAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_status(&self, item: &ItemId) -> Result<Option<ItemStatus>, PipelineError> {
        let status = sqlx::query_scalar!("SELECT status FROM accounts WHERE id = $1", item.as_str())
            .fetch_optional(&self.pool)
            .await?;

        status.as_deref().map(ItemStatus::try_from).transpose()
    }

    // Compare-and-swap: exactly one concurrent caller sees a changed row.
    async fn try_reserve(&self, item: &ItemId, buyer: &BuyerId) -> Result<bool, PipelineError> {
        let result = sqlx::query!(
            r#"
            UPDATE accounts
            SET status = 'sold', buyer_id = $2, updated_at = now()
            WHERE id = $1 AND status = 'available'
            "#,
            item.as_str(),
            buyer.as_str(),
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

impl AccountAllocator for PgAccountAllocator {
    fn item_status<'a>(&'a self, item: &'a ItemId) -> StoreFuture<'a, Option<ItemStatus>> {
        Box::pin(self.fetch_status(item))
    }

    fn reserve<'a>(&'a self, item: &'a ItemId, buyer: &'a BuyerId) -> StoreFuture<'a, bool> {
        Box::pin(self.try_reserve(item, buyer))
    }
}
