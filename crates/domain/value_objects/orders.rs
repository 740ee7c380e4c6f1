use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::orders::OrderEntity, value_objects::enums::order_statuses::OrderStatus,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOrderModel {
    pub plan_id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitOrderDto {
    pub payment_url: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub status: OrderStatus,
    pub amount_minor: i64,
    pub currency: String,
    pub external_order_id: Option<String>,
    pub payment_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<OrderEntity> for OrderDto {
    fn from(value: OrderEntity) -> Self {
        Self {
            status: value.status(),
            id: value.id,
            user_id: value.user_id,
            plan_id: value.plan_id,
            amount_minor: value.amount_minor,
            currency: value.currency,
            external_order_id: value.external_order_id,
            payment_url: value.payment_url,
            paid_at: value.paid_at,
            last_error: value.last_error,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOwnerQuery {
    pub user_id: Option<Uuid>,
}

/// Which orders a request may see or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    Owner(Uuid),
    All,
}

impl OrderScope {
    /// Regular users are pinned to their own orders. Admins see everything unless
    /// they narrow the scope to one user.
    pub fn resolve(requester_id: Uuid, is_admin: bool, requested_user: Option<Uuid>) -> Self {
        match (is_admin, requested_user) {
            (false, _) => OrderScope::Owner(requester_id),
            (true, Some(user_id)) => OrderScope::Owner(user_id),
            (true, None) => OrderScope::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regular_users_cannot_widen_their_scope() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(OrderScope::resolve(me, false, None), OrderScope::Owner(me));
        assert_eq!(OrderScope::resolve(me, false, Some(other)), OrderScope::Owner(me));
    }

    #[test]
    fn admins_see_all_or_the_requested_user() {
        let admin = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(OrderScope::resolve(admin, true, None), OrderScope::All);
        assert_eq!(
            OrderScope::resolve(admin, true, Some(other)),
            OrderScope::Owner(other)
        );
    }
}
