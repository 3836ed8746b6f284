//! Notification parsing and `x-signature` verification.
//!
//! Mercado Pago delivers the same notification either as a JSON body
//! (`{"type":"payment","action":"payment.updated","data":{"id":"123"}}`) or,
//! for the older IPN style, only through query parameters
//! (`?topic=payment&id=123`). The signature header has the form
//! `ts=<unix>,v1=<hex hmac>` and signs the manifest
//! `id:<data.id>;request-id:<x-request-id>;ts:<ts>;`.

use {
    crate::domain::error::PipelineError,
    hmac::{Hmac, Mac},
    serde::Deserialize,
    sha2::Sha256,
    std::collections::HashMap,
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub topic: String,
    pub action: Option<String>,
    pub data_id: String,
}

impl Notification {
    pub fn is_payment(&self) -> bool {
        self.topic == "payment"
    }
}

#[derive(Debug, Deserialize)]
struct NotificationBody {
    #[serde(rename = "type", alias = "topic")]
    topic: Option<String>,
    action: Option<String>,
    data: Option<NotificationData>,
}

#[derive(Debug, Deserialize)]
struct NotificationData {
    id: Option<serde_json::Value>,
}

fn id_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Body first, query string as fallback for each field.
pub fn parse_notification(
    body: &str,
    query: &HashMap<String, String>,
) -> Result<Notification, PipelineError> {
    let parsed = if body.trim().is_empty() {
        None
    } else {
        let parsed = serde_json::from_str::<NotificationBody>(body)
            .map_err(|e| PipelineError::Validation(format!("malformed notification: {e}")))?;
        Some(parsed)
    };

    let (body_topic, action, body_id) = match parsed {
        Some(b) => (
            b.topic,
            b.action,
            b.data.and_then(|d| d.id).as_ref().and_then(id_string),
        ),
        None => (None, None, None),
    };

    let topic = body_topic
        .or_else(|| query.get("type").cloned())
        .or_else(|| query.get("topic").cloned())
        .ok_or_else(|| PipelineError::Validation("notification without type".into()))?;

    let data_id = body_id
        .or_else(|| query.get("data.id").cloned())
        .or_else(|| query.get("id").cloned())
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| PipelineError::Validation("notification without data.id".into()))?;

    Ok(Notification {
        topic,
        action,
        data_id,
    })
}

struct SignatureParts<'a> {
    ts: &'a str,
    v1: &'a str,
}

fn parse_signature_header(header: &str) -> Option<SignatureParts<'_>> {
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("ts", value)) => ts = Some(value.trim()),
            Some(("v1", value)) => v1 = Some(value.trim()),
            _ => {}
        }
    }
    Some(SignatureParts { ts: ts?, v1: v1? })
}

fn manifest(data_id: &str, request_id: Option<&str>, ts: &str) -> String {
    let mut out = format!("id:{};", data_id.to_lowercase());
    if let Some(request_id) = request_id {
        out.push_str(&format!("request-id:{request_id};"));
    }
    out.push_str(&format!("ts:{ts};"));
    out
}

/// Checks `x-signature` against the shared secret in constant time.
pub fn verify_signature(
    secret: &str,
    signature: Option<&str>,
    request_id: Option<&str>,
    data_id: &str,
) -> Result<(), PipelineError> {
    let header = signature
        .ok_or_else(|| PipelineError::WebhookSignature(format!("missing {SIGNATURE_HEADER} header")))?;
    let parts = parse_signature_header(header)
        .ok_or_else(|| PipelineError::WebhookSignature("malformed signature header".into()))?;
    let expected = hex::decode(parts.v1)
        .map_err(|_| PipelineError::WebhookSignature("signature is not hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PipelineError::WebhookSignature(e.to_string()))?;
    mac.update(manifest(data_id, request_id, parts.ts).as_bytes());
    mac.verify_slice(&expected)
        .map_err(|_| PipelineError::WebhookSignature("signature mismatch".into()))
}
