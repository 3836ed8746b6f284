use {
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    store_payments::{
        AppState,
        adapters::mercado_pago::MercadoPagoGateway,
        config::Config,
        domain::gateway::PaymentGateway,
        infra::postgres::{account_repo::PgAccountAllocator, transaction_repo::PgTransactionStore},
        services::{checkout::Checkout, reconciler::Reconciler},
    },
    tokio::signal,
    tracing_subscriber::EnvFilter,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("invalid configuration");
    let settings = config
        .checkout_settings()
        .expect("invalid checkout settings");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let store = Arc::new(PgTransactionStore::new(pool.clone()));
    let catalog = Arc::new(PgAccountAllocator::new(pool));

    let gateway: Option<Arc<dyn PaymentGateway>> = match config.mercado_pago() {
        Some(mp) => {
            let client = MercadoPagoGateway::new(mp).expect("failed to build Mercado Pago client");
            Some(Arc::new(client) as Arc<dyn PaymentGateway>)
        }
        None => {
            tracing::warn!("MERCADO_PAGO_ACCESS_TOKEN not set, payments and webhooks are disabled");
            None
        }
    };

    let reconciler = gateway.clone().map(|gateway| {
        Arc::new(Reconciler::new(
            store.clone(),
            catalog.clone(),
            gateway,
            settings.gateway_timeout,
        ))
    });
    if config.webhook_secret().is_none() {
        tracing::warn!("MERCADO_PAGO_WEBHOOK_SECRET not set, webhook signatures are not verified");
    }

    let state = AppState {
        checkout: Arc::new(Checkout::new(store, catalog, gateway, settings)),
        reconciler,
        webhook_secret: config.webhook_secret().map(Arc::from),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, store_payments::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
