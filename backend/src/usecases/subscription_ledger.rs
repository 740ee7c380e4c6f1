use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{
        plans::PlanEntity,
        subscriptions::{GrantSubscriptionChangeset, InsertSubscriptionEntity, SubscriptionEntity},
    },
    repositories::{plans::PlanRepository, subscriptions::SubscriptionRepository},
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus, subscriptions::EntitlementDto,
    },
};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("baseline plan `{0}` is not available")]
    BaselinePlanNotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            LedgerError::BaselinePlanNotFound(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Keeps exactly one authoritative subscription row per user and rewrites it in place.
pub struct SubscriptionLedger<P, S>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    plan_repository: Arc<P>,
    subscription_repository: Arc<S>,
    baseline_plan_code: String,
}

impl<P, S> SubscriptionLedger<P, S>
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(
        plan_repository: Arc<P>,
        subscription_repository: Arc<S>,
        baseline_plan_code: impl Into<String>,
    ) -> Self {
        Self {
            plan_repository,
            subscription_repository,
            baseline_plan_code: baseline_plan_code.into(),
        }
    }

    /// Activates `plan` for one billing cycle starting at `now`. A missing rebill
    /// token keeps whatever token the row already holds.
    pub async fn grant(
        &self,
        user_id: Uuid,
        plan: &PlanEntity,
        rebill_token: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<SubscriptionEntity> {
        let rebill_token = rebill_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        if let Some(existing) = self.find_subscription(user_id).await? {
            return self.overwrite(&existing, plan, rebill_token, now).await;
        }

        let insert = Self::new_subscription(user_id, plan, rebill_token.clone(), now)?;
        match self.subscription_repository.create(insert).await? {
            Some(created) => {
                info!(
                    %user_id,
                    subscription_id = %created.id,
                    plan_code = %plan.code,
                    period_end = %created.period_end,
                    "subscription_ledger: subscription created"
                );
                Ok(created)
            }
            None => {
                let existing = self.find_subscription(user_id).await?.ok_or_else(|| {
                    anyhow!("subscription for user {user_id} disappeared during grant")
                })?;
                self.overwrite(&existing, plan, rebill_token, now).await
            }
        }
    }

    /// Grants the baseline plan to users without a subscription. Returns the row and
    /// whether it was created by this call.
    pub async fn ensure_baseline(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<(SubscriptionEntity, bool)> {
        if let Some(existing) = self.find_subscription(user_id).await? {
            return Ok((existing, false));
        }

        let plan = self.baseline_plan().await?;
        let insert = Self::new_subscription(user_id, &plan, None, now)?;

        match self.subscription_repository.create(insert).await? {
            Some(created) => {
                info!(
                    %user_id,
                    subscription_id = %created.id,
                    plan_code = %plan.code,
                    "subscription_ledger: baseline plan granted"
                );
                Ok((created, true))
            }
            None => {
                let existing = self.find_subscription(user_id).await?.ok_or_else(|| {
                    anyhow!("subscription for user {user_id} disappeared during bootstrap")
                })?;
                Ok((existing, false))
            }
        }
    }

    /// Stores a rebill token that arrived after the grant. `false` when the user has
    /// no subscription or already holds this token.
    pub async fn attach_rebill_token(&self, user_id: Uuid, rebill_token: &str) -> LedgerResult<bool> {
        let Some(subscription) = self.find_subscription(user_id).await? else {
            return Ok(false);
        };

        if subscription.rebill_token() == Some(rebill_token) {
            return Ok(false);
        }

        self.subscription_repository
            .attach_rebill_token(subscription.id, rebill_token.to_string())
            .await?;

        info!(
            %user_id,
            subscription_id = %subscription.id,
            "subscription_ledger: rebill token attached"
        );
        Ok(true)
    }

    /// Whether the user's row reflects a grant made at or after `paid_at` for a paid
    /// plan. A baseline bootstrap never counts as covering a paid order.
    pub async fn has_grant_since(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        paid_at: DateTime<Utc>,
    ) -> LedgerResult<bool> {
        let Some(subscription) = self.find_subscription(user_id).await? else {
            return Ok(false);
        };

        if subscription.period_start < paid_at {
            return Ok(false);
        }
        if subscription.plan_id == plan_id {
            return Ok(true);
        }

        let baseline = self
            .plan_repository
            .find_active_plan_by_code(&self.baseline_plan_code)
            .await?;
        Ok(baseline.is_none_or(|plan| plan.id != subscription.plan_id))
    }

    /// The plan the user is entitled to right now, falling back to the baseline plan.
    pub async fn current_entitlement(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<EntitlementDto> {
        let subscription = self.find_subscription(user_id).await?;

        if let Some(subscription) = subscription.as_ref().filter(|sub| sub.is_effective(now)) {
            let plan = self
                .plan_repository
                .find_by_id(subscription.plan_id)
                .await?
                .ok_or_else(|| anyhow!("plan {} is missing", subscription.plan_id))?;

            return Ok(EntitlementDto {
                is_baseline: plan.code == self.baseline_plan_code,
                plan_code: plan.code,
                plan_id: Some(plan.id),
                status: Some(subscription.status()),
                period_end: Some(subscription.period_end),
            });
        }

        let baseline = self
            .plan_repository
            .find_active_plan_by_code(&self.baseline_plan_code)
            .await?;

        Ok(EntitlementDto {
            plan_code: self.baseline_plan_code.clone(),
            plan_id: baseline.map(|plan| plan.id),
            status: subscription.as_ref().map(SubscriptionEntity::status),
            period_end: subscription.as_ref().map(|sub| sub.period_end),
            is_baseline: true,
        })
    }

    async fn find_subscription(&self, user_id: Uuid) -> LedgerResult<Option<SubscriptionEntity>> {
        self.subscription_repository
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscription_ledger: failed to load subscription");
                LedgerError::Internal(err)
            })
    }

    async fn baseline_plan(&self) -> LedgerResult<PlanEntity> {
        self.plan_repository
            .find_active_plan_by_code(&self.baseline_plan_code)
            .await?
            .ok_or_else(|| {
                error!(
                    plan_code = %self.baseline_plan_code,
                    "subscription_ledger: baseline plan is missing or inactive"
                );
                LedgerError::BaselinePlanNotFound(self.baseline_plan_code.clone())
            })
    }

    async fn overwrite(
        &self,
        existing: &SubscriptionEntity,
        plan: &PlanEntity,
        rebill_token: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<SubscriptionEntity> {
        let changeset = GrantSubscriptionChangeset {
            plan_id: plan.id,
            status: SubscriptionStatus::Active.to_string(),
            period_start: now,
            period_end: plan.billing_period.cycle_end(now)?,
            amount_minor: plan.amount_minor,
            currency: plan.currency.clone(),
            billing_period: plan.billing_period.to_string(),
            external_subscription_id: rebill_token,
            renewal_attempts: 0,
            updated_at: now,
        };

        let updated = self
            .subscription_repository
            .overwrite(existing.id, changeset)
            .await?;

        info!(
            user_id = %existing.user_id,
            subscription_id = %updated.id,
            previous_plan_id = %existing.plan_id,
            plan_code = %plan.code,
            period_end = %updated.period_end,
            "subscription_ledger: subscription overwritten"
        );
        Ok(updated)
    }

    fn new_subscription(
        user_id: Uuid,
        plan: &PlanEntity,
        rebill_token: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<InsertSubscriptionEntity> {
        Ok(InsertSubscriptionEntity {
            user_id,
            plan_id: plan.id,
            status: SubscriptionStatus::Active.to_string(),
            period_start: now,
            period_end: plan.billing_period.cycle_end(now)?,
            amount_minor: plan.amount_minor,
            currency: plan.currency.clone(),
            billing_period: plan.billing_period.to_string(),
            external_subscription_id: rebill_token,
        })
    }
}
