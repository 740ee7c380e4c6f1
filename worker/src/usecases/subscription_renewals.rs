use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{payment_gateway::PaymentGateway, subscriptions::SubscriptionRepository},
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus, payment_gateway::ChargeCommand,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenewalSummary {
    pub due: usize,
    pub renewed: usize,
    pub past_due: usize,
    pub canceled: usize,
    pub errors: usize,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenewalOutcome {
    Renewed,
    PastDue,
    Canceled,
}

/// Recurring charge order id, one per user per day.
pub fn renewal_order_id(now: DateTime<Utc>, user_id: Uuid) -> String {
    format!("{}-renew-{}", now.format("%Y%m%d"), user_id)
}

pub struct RenewalUseCase<S, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    subscription_repository: Arc<S>,
    payment_gateway: Arc<G>,
    max_attempts: i32,
}

impl<S, G> RenewalUseCase<S, G>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(subscription_repository: Arc<S>, payment_gateway: Arc<G>, max_attempts: i32) -> Self {
        Self {
            subscription_repository,
            payment_gateway,
            max_attempts: max_attempts.max(1),
        }
    }

    /// One scheduler tick. Due subscriptions are charged one at a time; a failure on
    /// one of them never stops the rest. Cancellation is checked between charges.
    pub async fn run_renewals(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<RenewalSummary> {
        let due: Vec<SubscriptionEntity> = self
            .subscription_repository
            .list_all()
            .await?
            .into_iter()
            .filter(|subscription| subscription.is_due_for_renewal(now))
            .collect();

        let mut summary = RenewalSummary {
            due: due.len(),
            ..RenewalSummary::default()
        };

        if due.is_empty() {
            info!("renewals: nothing due");
            return Ok(summary);
        }

        info!(due = due.len(), "renewals: tick started");

        for (processed, subscription) in due.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    remaining = due.len() - processed,
                    "renewals: shutdown requested, rest of the batch skipped"
                );
                summary.interrupted = true;
                break;
            }

            match self.renew(subscription, now).await {
                Ok(RenewalOutcome::Renewed) => summary.renewed += 1,
                Ok(RenewalOutcome::PastDue) => summary.past_due += 1,
                Ok(RenewalOutcome::Canceled) => summary.canceled += 1,
                Err(e) => {
                    error!(
                        subscription_id = %subscription.id,
                        user_id = %subscription.user_id,
                        error = ?e,
                        "renewals: subscription skipped, retried next tick"
                    );
                    summary.errors += 1;
                }
            }
        }

        info!(
            renewed = summary.renewed,
            past_due = summary.past_due,
            canceled = summary.canceled,
            errors = summary.errors,
            "renewals: tick finished"
        );

        Ok(summary)
    }

    async fn renew(
        &self,
        subscription: &SubscriptionEntity,
        now: DateTime<Utc>,
    ) -> Result<RenewalOutcome> {
        let rebill_token = subscription
            .rebill_token()
            .ok_or_else(|| anyhow!("subscription {} has no rebill token", subscription.id))?;

        let command = ChargeCommand {
            rebill_id: rebill_token.to_string(),
            amount_minor: subscription.amount_minor,
            order_id: renewal_order_id(now, subscription.user_id),
        };

        match self.payment_gateway.charge(command).await {
            Ok(()) => {
                let period_end = subscription.billing_period().cycle_end(now)?;
                self.subscription_repository
                    .record_renewal(subscription.id, now, period_end)
                    .await?;

                info!(
                    subscription_id = %subscription.id,
                    user_id = %subscription.user_id,
                    %period_end,
                    "renewals: subscription renewed"
                );
                Ok(RenewalOutcome::Renewed)
            }
            Err(charge_error) => {
                let attempts = subscription.renewal_attempts.saturating_add(1);
                let (status, outcome) = if attempts >= self.max_attempts {
                    (SubscriptionStatus::Canceled, RenewalOutcome::Canceled)
                } else {
                    (SubscriptionStatus::PastDue, RenewalOutcome::PastDue)
                };

                warn!(
                    subscription_id = %subscription.id,
                    user_id = %subscription.user_id,
                    attempts,
                    max_attempts = self.max_attempts,
                    %status,
                    error = %charge_error,
                    "renewals: charge failed"
                );

                self.subscription_repository
                    .record_renewal_failure(subscription.id, status, attempts)
                    .await?;
                Ok(outcome)
            }
        }
    }
}
