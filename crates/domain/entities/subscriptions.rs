use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::{
        billing_periods::BillingPeriod, subscription_statuses::SubscriptionStatus,
    },
    infra::db::postgres::schema::subscriptions,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub amount_minor: i64,
    pub currency: String,
    pub billing_period: String,
    pub external_subscription_id: Option<String>,
    pub renewal_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    pub fn status(&self) -> SubscriptionStatus {
        SubscriptionStatus::from_str(&self.status)
    }

    pub fn billing_period(&self) -> BillingPeriod {
        BillingPeriod::from_str(&self.billing_period)
    }

    pub fn rebill_token(&self) -> Option<&str> {
        self.external_subscription_id
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn is_due_for_renewal(&self, now: DateTime<Utc>) -> bool {
        self.status().is_renewable() && self.period_end <= now && self.rebill_token().is_some()
    }

    /// Whether the subscription still grants its plan at `now`.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.status().is_renewable() && self.period_end > now
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub amount_minor: i64,
    pub currency: String,
    pub billing_period: String,
    pub external_subscription_id: Option<String>,
}

/// Overwrites an existing row on a fresh grant. `None` for the rebill token leaves
/// the stored token untouched.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct GrantSubscriptionChangeset {
    pub plan_id: Uuid,
    pub status: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub amount_minor: i64,
    pub currency: String,
    pub billing_period: String,
    pub external_subscription_id: Option<String>,
    pub renewal_attempts: i32,
    pub updated_at: DateTime<Utc>,
}
