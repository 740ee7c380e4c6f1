use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use crates::domain::repositories::{
    payment_gateway::PaymentGateway, subscriptions::SubscriptionRepository,
};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::usecases::subscription_renewals::RenewalUseCase;

/// Runs a renewal tick right away and then once per `period` until `cancel` fires.
pub async fn run_renewal_loop<S, G>(
    usecase: Arc<RenewalUseCase<S, G>>,
    period: Duration,
    cancel: CancellationToken,
) -> Result<()>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_secs = period.as_secs(), "Starting renewal loop");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Renewal loop stopped");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        if let Err(e) = usecase.run_renewals(Utc::now(), &cancel).await {
            error!(error = ?e, "Renewal tick failed");
        }
    }
}
