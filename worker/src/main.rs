use anyhow::{Context, Result};
use backend::axum_http::http_serve::shutdown_signal;
use crates::{
    infra::db::{postgres::postgres_connection, repositories::subscriptions::SubscriptionPostgres},
    payments::tbank_client::{TBankClient, TBankSettings},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use worker::{
    axum_http, config, services::renewal_loop::run_renewal_loop,
    usecases::subscription_renewals::RenewalUseCase,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let subscription_repository = Arc::new(SubscriptionPostgres::new(Arc::new(postgres_pool)));

    // Recurring charges carry no redirect or callback URLs.
    let tbank_client = TBankClient::new(TBankSettings {
        base_url: dotenvy_env.tbank.base_url.clone(),
        terminal_key: dotenvy_env.tbank.terminal_key.clone(),
        terminal_password: dotenvy_env.tbank.terminal_password.clone(),
        notification_url: None,
        fail_url: None,
    })
    .context("payment gateway client cannot be created")?;

    let renewal_usecase = Arc::new(RenewalUseCase::new(
        subscription_repository,
        Arc::new(tbank_client),
        dotenvy_env.renewal.max_attempts,
    ));

    let cancel = CancellationToken::new();

    let renewal_loop = tokio::spawn({
        let cancel = cancel.clone();
        let period = dotenvy_env.renewal.interval();
        async move {
            let _stop_all = cancel.clone().drop_guard();
            run_renewal_loop(renewal_usecase, period, cancel).await
        }
    });

    let health_server = tokio::spawn({
        let cancel = cancel.clone();
        let config = Arc::clone(&dotenvy_env);
        async move {
            let _stop_all = cancel.clone().drop_guard();
            axum_http::http_serve::start(config, cancel).await
        }
    });

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                _ = shutdown_signal() => cancel.cancel(),
                _ = cancel.cancelled() => {}
            }
        }
    });

    let (renewal_result, server_result) = tokio::join!(renewal_loop, health_server);
    renewal_result??;
    server_result??;

    info!("Worker stopped");
    Ok(())
}
