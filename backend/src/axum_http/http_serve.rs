use crate::{
    auth::JwtSecret,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        orders::OrderUseCase, payment_notifications::PaymentNotificationUseCase,
        subscription_ledger::SubscriptionLedger,
    },
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            orders::OrderPostgres, plans::PlanPostgres, subscriptions::SubscriptionPostgres,
        },
    },
    payments::tbank_client::{TBankClient, TBankSettings},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

pub fn app(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let plan_repository = Arc::new(PlanPostgres::new(Arc::clone(&db_pool)));
    let order_repository = Arc::new(OrderPostgres::new(Arc::clone(&db_pool)));
    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));

    let tbank_client = TBankClient::new(TBankSettings {
        base_url: config.tbank.base_url.clone(),
        terminal_key: config.tbank.terminal_key.clone(),
        terminal_password: config.tbank.terminal_password.clone(),
        notification_url: Some(config.public_urls.notification_url()),
        fail_url: Some(config.public_urls.failed_redirect()),
    })
    .context("payment gateway client cannot be created")?;

    let ledger = Arc::new(SubscriptionLedger::new(
        Arc::clone(&plan_repository),
        subscription_repository,
        config.billing.baseline_plan_code.clone(),
    ));
    let order_usecase = Arc::new(OrderUseCase::new(
        Arc::clone(&plan_repository),
        Arc::clone(&order_repository),
        Arc::new(tbank_client),
        config.public_urls.payment_return_url(),
    ));
    let notification_usecase = Arc::new(PaymentNotificationUseCase::new(
        order_repository,
        plan_repository,
        Arc::clone(&ledger),
        config.tbank.terminal_password.clone(),
    ));

    let body_limit: usize = (config.backend_server.body_limit * 1024 * 1024).try_into()?;

    Ok(Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/order",
            routers::orders::routes(
                order_usecase,
                notification_usecase,
                Arc::clone(&ledger),
                Arc::new(config.public_urls.clone()),
            ),
        )
        .nest("/api/v1/subscription", routers::subscriptions::routes(ledger))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(JwtSecret::new(&config.auth.jwt_secret)))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http()))
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = app(Arc::clone(&config), db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
