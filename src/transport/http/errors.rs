use {
    crate::domain::error::PipelineError,
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
};

/// Error answer of the webhook endpoint. The status code drives provider
/// redelivery: 5xx is retried, 4xx is not.
pub struct ApiError(pub PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            PipelineError::Validation(msg) => {
                tracing::warn!("rejected notification: {msg}");
                (StatusCode::BAD_REQUEST, "invalid_notification", msg.clone())
            }
            PipelineError::WebhookSignature(msg) => {
                tracing::warn!("webhook signature rejected: {msg}");
                (
                    StatusCode::UNAUTHORIZED,
                    "webhook_error",
                    "invalid webhook signature".to_string(),
                )
            }
            PipelineError::Unavailable(msg) => {
                tracing::error!("service unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    msg.clone(),
                )
            }
            PipelineError::Gateway(err) => {
                tracing::error!(retryable = err.is_retryable(), "gateway error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "gateway_error",
                    "payment provider error".to_string(),
                )
            }
            PipelineError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            PipelineError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}
