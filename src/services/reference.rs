use {
    crate::domain::id::{BuyerId, ExternalReference, ItemId},
    chrono::{DateTime, Utc},
    sha2::{Digest, Sha256},
};

const DIGEST_HEX_LEN: usize = 16;
const SHORT_ID_LEN: usize = 8;

/// Derives the external reference for one checkout attempt.
///
/// Pure: the same item, buyer and second always give the same reference, so
/// a retried request reuses the gateway idempotency key and the row key.
pub fn generate_reference(item: &ItemId, buyer: &BuyerId, at: DateTime<Utc>) -> ExternalReference {
    let ts = at.timestamp();

    let mut hasher = Sha256::new();
    hasher.update(item.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(buyer.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(ts.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());

    ExternalReference::derived(format!(
        "acc-{}-{}-{}-{}",
        short(item.as_str()),
        short(buyer.as_str()),
        ts,
        &digest[..DIGEST_HEX_LEN]
    ))
}

fn short(id: &str) -> String {
    id.chars()
        .filter(char::is_ascii_alphanumeric)
        .take(SHORT_ID_LEN)
        .collect()
}
