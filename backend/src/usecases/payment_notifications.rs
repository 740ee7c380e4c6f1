use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::orders::OrderEntity,
        repositories::{
            orders::OrderRepository, plans::PlanRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::{
            enums::order_statuses::OrderStatus, payment_gateway::PaymentNotification,
        },
    },
    payments::tbank_signing::{self, SignatureError},
};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::subscription_ledger::{LedgerError, SubscriptionLedger};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("malformed notification: {0}")]
    Malformed(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("order `{0}` not found")]
    OrderNotFound(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl NotificationError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            NotificationError::Malformed(_) | NotificationError::OrderNotFound(_) => {
                StatusCode::BAD_REQUEST
            }
            NotificationError::InvalidSignature => StatusCode::FORBIDDEN,
            NotificationError::Ledger(err) => err.status_code(),
            NotificationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type NotificationResult<T> = std::result::Result<T, NotificationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Paid { order_id: Uuid, subscription_id: Uuid },
    Failed { order_id: Uuid },
    /// The order had already left `pending`; nothing but a new rebill token was applied.
    AlreadyProcessed { order_id: Uuid },
}

pub struct PaymentNotificationUseCase<O, P, S>
where
    O: OrderRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    order_repository: Arc<O>,
    plan_repository: Arc<P>,
    ledger: Arc<SubscriptionLedger<P, S>>,
    terminal_password: String,
}

impl<O, P, S> PaymentNotificationUseCase<O, P, S>
where
    O: OrderRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(
        order_repository: Arc<O>,
        plan_repository: Arc<P>,
        ledger: Arc<SubscriptionLedger<P, S>>,
        terminal_password: impl Into<String>,
    ) -> Self {
        Self {
            order_repository,
            plan_repository,
            ledger,
            terminal_password: terminal_password.into(),
        }
    }

    /// Authenticates a raw gateway callback and applies it. Nothing is read or written
    /// before the signature has been checked.
    pub async fn handle(
        &self,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> NotificationResult<NotificationOutcome> {
        let notification = self.authenticate(body)?;

        let order = self
            .order_repository
            .find_by_external_order_id(&notification.order_id)
            .await?
            .ok_or_else(|| {
                warn!(
                    external_order_id = %notification.order_id,
                    "payment_notifications: callback for unknown order"
                );
                NotificationError::OrderNotFound(notification.order_id.clone())
            })?;

        info!(
            order_id = %order.id,
            success = notification.success,
            status = %notification.status,
            payment_id = ?notification.payment_id,
            "payment_notifications: callback received"
        );

        let status = order.status();
        let target = if notification.success {
            OrderStatus::Paid
        } else {
            OrderStatus::Failed
        };

        if status.can_transition_to(target) {
            return match target {
                OrderStatus::Paid => self.apply_success(&order, &notification, now).await,
                _ => self.apply_failure(&order, &notification).await,
            };
        }

        if status == OrderStatus::Paid && target == OrderStatus::Paid {
            return self.settle_replayed_success(&order, &notification).await;
        }

        warn!(
            order_id = %order.id,
            %status,
            success = notification.success,
            "payment_notifications: callback for settled order ignored"
        );
        Ok(NotificationOutcome::AlreadyProcessed { order_id: order.id })
    }

    fn authenticate(&self, body: &[u8]) -> NotificationResult<PaymentNotification> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|err| NotificationError::Malformed(err.to_string()))?;

        let object = payload
            .as_object()
            .ok_or_else(|| NotificationError::Malformed("expected a JSON object".to_string()))?;

        tbank_signing::verify_json(object, &self.terminal_password).map_err(|err| match err {
            SignatureError::MissingToken | SignatureError::Mismatch => {
                warn!(reason = %err, "payment_notifications: signature rejected");
                NotificationError::InvalidSignature
            }
            SignatureError::UnsupportedValue(_) => NotificationError::Malformed(err.to_string()),
        })?;

        let notification: PaymentNotification = serde_json::from_value(payload)
            .map_err(|err| NotificationError::Malformed(err.to_string()))?;

        if notification.order_id.trim().is_empty() {
            return Err(NotificationError::Malformed("OrderId is empty".to_string()));
        }

        Ok(notification)
    }

    async fn apply_failure(
        &self,
        order: &OrderEntity,
        notification: &PaymentNotification,
    ) -> NotificationResult<NotificationOutcome> {
        match self.order_repository.mark_failed(order.id).await? {
            Some(_) => {
                info!(
                    order_id = %order.id,
                    error_code = ?notification.error_code,
                    "payment_notifications: order failed"
                );
                Ok(NotificationOutcome::Failed { order_id: order.id })
            }
            None => Ok(NotificationOutcome::AlreadyProcessed { order_id: order.id }),
        }
    }

    async fn apply_success(
        &self,
        order: &OrderEntity,
        notification: &PaymentNotification,
        now: DateTime<Utc>,
    ) -> NotificationResult<NotificationOutcome> {
        let rebill_token = notification.rebill_token().map(str::to_string);

        let Some(paid) = self
            .order_repository
            .mark_paid(order.id, now, rebill_token.clone())
            .await?
        else {
            info!(order_id = %order.id, "payment_notifications: order settled concurrently");
            return Ok(NotificationOutcome::AlreadyProcessed { order_id: order.id });
        };

        self.grant_for_order(&paid, rebill_token, now).await
    }

    /// Grants the plan bought by a paid order, priced at the order's snapshot.
    async fn grant_for_order(
        &self,
        paid: &OrderEntity,
        rebill_token: Option<String>,
        granted_at: DateTime<Utc>,
    ) -> NotificationResult<NotificationOutcome> {
        let plan = self
            .plan_repository
            .find_by_id(paid.plan_id)
            .await?
            .ok_or_else(|| {
                error!(
                    order_id = %paid.id,
                    plan_id = %paid.plan_id,
                    "payment_notifications: paid order references a missing plan, needs reconciliation"
                );
                anyhow!("plan {} for paid order {} is missing", paid.plan_id, paid.id)
            })?
            .with_price(paid.amount_minor, paid.currency.clone());

        let subscription = self
            .ledger
            .grant(paid.user_id, &plan, rebill_token, granted_at)
            .await
            .map_err(|err| {
                error!(
                    order_id = %paid.id,
                    user_id = %paid.user_id,
                    error = %err,
                    "payment_notifications: grant failed for paid order, awaiting redelivery"
                );
                err
            })?;

        info!(
            order_id = %paid.id,
            user_id = %paid.user_id,
            subscription_id = %subscription.id,
            plan_code = %plan.code,
            "payment_notifications: order paid and subscription granted"
        );

        Ok(NotificationOutcome::Paid {
            order_id: paid.id,
            subscription_id: subscription.id,
        })
    }

    /// A success callback for an order that is already paid. Completes a grant that
    /// failed after the order was marked paid, otherwise only stores a new rebill token.
    async fn settle_replayed_success(
        &self,
        order: &OrderEntity,
        notification: &PaymentNotification,
    ) -> NotificationResult<NotificationOutcome> {
        let paid_at = order.paid_at.unwrap_or(order.updated_at);

        if !self
            .ledger
            .has_grant_since(order.user_id, order.plan_id, paid_at)
            .await?
        {
            let rebill_token = notification
                .rebill_token()
                .map(str::to_string)
                .or_else(|| order.external_rebill_id.clone());

            if let Some(token) = rebill_token.as_deref() {
                if order.external_rebill_id.as_deref() != Some(token) {
                    self.order_repository
                        .attach_rebill_id(order.id, token.to_string())
                        .await?;
                }
            }

            warn!(
                order_id = %order.id,
                user_id = %order.user_id,
                "payment_notifications: paid order has no grant, granting on redelivery"
            );
            return self.grant_for_order(order, rebill_token, paid_at).await;
        }

        self.refresh_rebill_token(order, notification).await
    }

    async fn refresh_rebill_token(
        &self,
        order: &OrderEntity,
        notification: &PaymentNotification,
    ) -> NotificationResult<NotificationOutcome> {
        let outcome = NotificationOutcome::AlreadyProcessed { order_id: order.id };

        let Some(token) = notification.rebill_token() else {
            info!(order_id = %order.id, "payment_notifications: duplicate success callback");
            return Ok(outcome);
        };

        if order.external_rebill_id.as_deref() != Some(token) {
            self.order_repository
                .attach_rebill_id(order.id, token.to_string())
                .await?;
        }

        if self.ledger.attach_rebill_token(order.user_id, token).await? {
            info!(
                order_id = %order.id,
                user_id = %order.user_id,
                "payment_notifications: late rebill token stored"
            );
        }

        Ok(outcome)
    }
}
