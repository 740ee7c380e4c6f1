use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::billing_periods::BillingPeriod,
    infra::db::postgres::schema::plans,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntity {
    pub id: Uuid,
    pub code: String,
    pub name: Option<String>,
    pub currency: String,
    pub amount_minor: i64,
    pub billing_period: BillingPeriod,
    pub trial_days: i32,
    pub is_active: bool,
}

impl PlanEntity {
    /// Same plan priced at a previously captured snapshot.
    pub fn with_price(mut self, amount_minor: i64, currency: impl Into<String>) -> Self {
        self.amount_minor = amount_minor;
        self.currency = currency.into();
        self
    }
}

/// Raw row used for Diesel queries. The billing period stays text and is parsed into BillingPeriod.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanRow {
    pub id: Uuid,
    pub code: String,
    pub name: Option<String>,
    pub currency: String,
    pub amount_minor: i64,
    pub billing_period: String,
    pub trial_days: i32,
    pub is_active: bool,
}

impl From<PlanRow> for PlanEntity {
    fn from(value: PlanRow) -> Self {
        Self {
            id: value.id,
            code: value.code,
            name: value.name,
            currency: value.currency,
            amount_minor: value.amount_minor,
            billing_period: BillingPeriod::from_str(&value.billing_period),
            trial_days: value.trial_days,
            is_active: value.is_active,
        }
    }
}
