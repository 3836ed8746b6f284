use {
    crate::{
        AppState,
        adapters::mercado_pago::webhook::{
            REQUEST_ID_HEADER, SIGNATURE_HEADER, parse_notification, verify_signature,
        },
        domain::{error::PipelineError, id::ProviderPaymentId},
        services::reconciler::ReconcileResult,
        transport::http::errors::ApiError,
    },
    axum::{
        Json,
        extract::{Query, State},
        http::HeaderMap,
    },
    std::collections::HashMap,
};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(topic = tracing::field::Empty, provider_payment_id = tracing::field::Empty)
)]
pub async fn mercado_pago_webhook(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let reconciler = state.reconciler.as_ref().ok_or_else(|| {
        PipelineError::Unavailable("payment gateway credentials are not configured".into())
    })?;

    let notification = parse_notification(&body, &query)?;
    tracing::Span::current()
        .record("topic", tracing::field::display(&notification.topic))
        .record("provider_payment_id", tracing::field::display(&notification.data_id));

    if let Some(secret) = state.webhook_secret.as_deref() {
        // The provider signs the id exactly as it appears in the query string.
        let signed_id = query.get("data.id").unwrap_or(&notification.data_id);
        verify_signature(
            secret,
            header(&headers, SIGNATURE_HEADER),
            header(&headers, REQUEST_ID_HEADER),
            signed_id,
        )?;
    }

    if !notification.is_payment() {
        tracing::info!("non-payment notification, ignored");
        return Ok(Json(serde_json::json!({"status": "ignored"})));
    }

    let payment_id = match ProviderPaymentId::new(notification.data_id.as_str()) {
        Ok(id) => id,
        Err(PipelineError::Validation(msg)) => {
            tracing::warn!("skipping invalid payment id: {msg}");
            return Ok(Json(serde_json::json!({"status": "ignored_invalid_data"})));
        }
        Err(e) => return Err(e.into()),
    };

    let status = match reconciler.reconcile(&payment_id).await? {
        ReconcileResult::UnknownPayment => "unknown_payment",
        ReconcileResult::AlreadyProcessed(_) => "duplicate",
        ReconcileResult::StillPending(_) => "pending",
        ReconcileResult::InFlight(_) => "in_flight",
        ReconcileResult::Completed { .. } => "completed",
        ReconcileResult::Failed(_) => "failed",
        ReconcileResult::Anomaly(_) => "anomaly",
    };

    Ok(Json(serde_json::json!({"status": status})))
}
