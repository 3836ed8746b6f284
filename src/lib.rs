pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;
pub mod transport;

use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    services::{checkout::Checkout, reconciler::Reconciler},
    std::{sync::Arc, time::Duration},
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
    transport::http::{payments, webhooks},
};

/// Payment bodies and notifications are tiny.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Slack on top of the gateway timeout before the server gives up on a request.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<Checkout>,
    /// `None` without gateway credentials; webhooks then answer 503.
    pub reconciler: Option<Arc<Reconciler>>,
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    /// Upper bound on a whole request, gateway call included.
    pub fn request_timeout(&self) -> Duration {
        self.checkout.settings().gateway_timeout + REQUEST_TIMEOUT_SLACK
    }
}

pub fn app(state: AppState) -> Router {
    // `/payments` enforces its own deadline so a slow request still answers 200.
    let webhook_timeout = TimeoutLayer::new(state.request_timeout());

    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/payments", post(payments::create_payment))
        .route(
            "/webhooks/mercado-pago",
            post(webhooks::mercado_pago_webhook).layer(webhook_timeout),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
