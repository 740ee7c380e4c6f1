use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::SubscriptionEntity,
    value_objects::enums::{billing_periods::BillingPeriod, subscription_statuses::SubscriptionStatus},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub amount_minor: i64,
    pub currency: String,
    pub billing_period: BillingPeriod,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            status: value.status(),
            billing_period: value.billing_period(),
            id: value.id,
            user_id: value.user_id,
            plan_id: value.plan_id,
            period_start: value.period_start,
            period_end: value.period_end,
            amount_minor: value.amount_minor,
            currency: value.currency,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnsureBaselineDto {
    pub created: bool,
    pub subscription: SubscriptionDto,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementDto {
    pub plan_code: String,
    pub plan_id: Option<Uuid>,
    pub status: Option<SubscriptionStatus>,
    pub period_end: Option<DateTime<Utc>>,
    pub is_baseline: bool,
}
