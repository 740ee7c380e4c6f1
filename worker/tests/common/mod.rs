//! In-memory repositories and a scripted gateway for lifecycle tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{
        orders::{InsertOrderEntity, OrderEntity},
        plans::PlanEntity,
        subscriptions::{GrantSubscriptionChangeset, InsertSubscriptionEntity, SubscriptionEntity},
    },
    repositories::{
        orders::OrderRepository, payment_gateway::PaymentGateway, plans::PlanRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{
            billing_periods::BillingPeriod, order_statuses::OrderStatus,
            subscription_statuses::SubscriptionStatus,
        },
        orders::OrderScope,
        payment_gateway::{ChargeCommand, GatewayError, InitPaymentCommand, PaymentSession},
    },
};
use uuid::Uuid;

#[derive(Default, Clone)]
pub struct InMemoryPlans {
    plans: Arc<Mutex<Vec<PlanEntity>>>,
}

impl InMemoryPlans {
    pub fn with_plan(self, code: &str, amount_minor: i64, billing_period: BillingPeriod) -> Self {
        self.plans.lock().unwrap().push(PlanEntity {
            id: Uuid::new_v4(),
            code: code.to_string(),
            name: Some(code.to_string()),
            currency: "RUB".to_string(),
            amount_minor,
            billing_period,
            trial_days: 0,
            is_active: true,
        });
        self
    }

    pub fn by_code(&self, code: &str) -> PlanEntity {
        self.plans
            .lock()
            .unwrap()
            .iter()
            .find(|plan| plan.code == code)
            .cloned()
            .unwrap()
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlans {
    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|plan| plan.id == plan_id)
            .cloned())
    }

    async fn find_active_plan_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        Ok(self.find_by_id(plan_id).await?.filter(|plan| plan.is_active))
    }

    async fn find_active_plan_by_code(&self, code: &str) -> Result<Option<PlanEntity>> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|plan| plan.code == code && plan.is_active)
            .cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryOrders {
    orders: Arc<Mutex<HashMap<Uuid, OrderEntity>>>,
}

impl InMemoryOrders {
    pub fn get(&self, order_id: Uuid) -> OrderEntity {
        self.orders.lock().unwrap()[&order_id].clone()
    }

    fn update_pending(
        &self,
        order_id: Uuid,
        apply: impl FnOnce(&mut OrderEntity),
    ) -> Option<OrderEntity> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(&order_id)?;
        if order.status() != OrderStatus::Pending {
            return None;
        }
        apply(order);
        Some(order.clone())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create(&self, insert_order_entity: InsertOrderEntity) -> Result<OrderEntity> {
        let order = OrderEntity {
            id: Uuid::new_v4(),
            user_id: insert_order_entity.user_id,
            plan_id: insert_order_entity.plan_id,
            status: insert_order_entity.status,
            amount_minor: insert_order_entity.amount_minor,
            currency: insert_order_entity.currency,
            external_order_id: None,
            external_rebill_id: None,
            payment_url: None,
            paid_at: None,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.orders.lock().unwrap().insert(order.id, order.clone());
        Ok(order)
    }

    async fn record_gateway_session(
        &self,
        order_id: Uuid,
        external_order_id: String,
        payment_url: String,
    ) -> Result<()> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| anyhow!("order {order_id} not found"))?;
        order.external_order_id = Some(external_order_id);
        order.payment_url = Some(payment_url);
        order.last_error = None;
        Ok(())
    }

    async fn record_gateway_error(&self, order_id: Uuid, error: String) -> Result<()> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| anyhow!("order {order_id} not found"))?;
        order.last_error = Some(error);
        Ok(())
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        Ok(self.orders.lock().unwrap().get(&order_id).cloned())
    }

    async fn find_by_external_order_id(
        &self,
        external_order_id: &str,
    ) -> Result<Option<OrderEntity>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|order| order.external_order_id.as_deref() == Some(external_order_id))
            .cloned())
    }

    async fn mark_paid(
        &self,
        order_id: Uuid,
        paid_at: DateTime<Utc>,
        rebill_id: Option<String>,
    ) -> Result<Option<OrderEntity>> {
        Ok(self.update_pending(order_id, |order| {
            order.status = OrderStatus::Paid.to_string();
            order.paid_at = Some(paid_at);
            if rebill_id.is_some() {
                order.external_rebill_id = rebill_id;
            }
        }))
    }

    async fn mark_failed(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        Ok(self.update_pending(order_id, |order| {
            order.status = OrderStatus::Failed.to_string();
            order.paid_at = None;
        }))
    }

    async fn attach_rebill_id(&self, order_id: Uuid, rebill_id: String) -> Result<()> {
        if let Some(order) = self.orders.lock().unwrap().get_mut(&order_id) {
            order.external_rebill_id = Some(rebill_id);
        }
        Ok(())
    }

    async fn list(&self, scope: OrderScope) -> Result<Vec<OrderEntity>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|order| match scope {
                OrderScope::Owner(user_id) => order.user_id == user_id,
                OrderScope::All => true,
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, order_id: Uuid, scope: OrderScope) -> Result<bool> {
        let mut orders = self.orders.lock().unwrap();
        let allowed = orders.get(&order_id).is_some_and(|order| match scope {
            OrderScope::Owner(user_id) => order.user_id == user_id,
            OrderScope::All => true,
        });
        Ok(allowed && orders.remove(&order_id).is_some())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySubscriptions {
    subscriptions: Arc<Mutex<HashMap<Uuid, SubscriptionEntity>>>,
}

impl InMemorySubscriptions {
    pub fn for_user(&self, user_id: Uuid) -> Option<SubscriptionEntity> {
        self.subscriptions
            .lock()
            .unwrap()
            .values()
            .find(|subscription| subscription.user_id == user_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    fn update(
        &self,
        subscription_id: Uuid,
        apply: impl FnOnce(&mut SubscriptionEntity),
    ) -> Result<SubscriptionEntity> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions
            .get_mut(&subscription_id)
            .ok_or_else(|| anyhow!("subscription {subscription_id} not found"))?;
        apply(subscription);
        Ok(subscription.clone())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        Ok(self.for_user(user_id))
    }

    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions
            .values()
            .any(|subscription| subscription.user_id == insert_subscription_entity.user_id)
        {
            return Ok(None);
        }

        let subscription = SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: insert_subscription_entity.user_id,
            plan_id: insert_subscription_entity.plan_id,
            status: insert_subscription_entity.status,
            period_start: insert_subscription_entity.period_start,
            period_end: insert_subscription_entity.period_end,
            amount_minor: insert_subscription_entity.amount_minor,
            currency: insert_subscription_entity.currency,
            billing_period: insert_subscription_entity.billing_period,
            external_subscription_id: insert_subscription_entity.external_subscription_id,
            renewal_attempts: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(Some(subscription))
    }

    async fn overwrite(
        &self,
        subscription_id: Uuid,
        changeset: GrantSubscriptionChangeset,
    ) -> Result<SubscriptionEntity> {
        self.update(subscription_id, |subscription| {
            subscription.plan_id = changeset.plan_id;
            subscription.status = changeset.status;
            subscription.period_start = changeset.period_start;
            subscription.period_end = changeset.period_end;
            subscription.amount_minor = changeset.amount_minor;
            subscription.currency = changeset.currency;
            subscription.billing_period = changeset.billing_period;
            if changeset.external_subscription_id.is_some() {
                subscription.external_subscription_id = changeset.external_subscription_id;
            }
            subscription.renewal_attempts = changeset.renewal_attempts;
            subscription.updated_at = changeset.updated_at;
        })
    }

    async fn list_all(&self) -> Result<Vec<SubscriptionEntity>> {
        Ok(self.subscriptions.lock().unwrap().values().cloned().collect())
    }

    async fn record_renewal(
        &self,
        subscription_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<()> {
        self.update(subscription_id, |subscription| {
            subscription.status = SubscriptionStatus::Active.to_string();
            subscription.period_start = period_start;
            subscription.period_end = period_end;
            subscription.renewal_attempts = 0;
        })?;
        Ok(())
    }

    async fn record_renewal_failure(
        &self,
        subscription_id: Uuid,
        status: SubscriptionStatus,
        renewal_attempts: i32,
    ) -> Result<()> {
        self.update(subscription_id, |subscription| {
            subscription.status = status.to_string();
            subscription.renewal_attempts = renewal_attempts;
        })?;
        Ok(())
    }

    async fn attach_rebill_token(&self, subscription_id: Uuid, rebill_token: String) -> Result<()> {
        self.update(subscription_id, |subscription| {
            subscription.external_subscription_id = Some(rebill_token);
        })?;
        Ok(())
    }
}

/// Hosted-page sessions always succeed; charges follow the queued script and
/// succeed once it runs out.
#[derive(Default, Clone)]
pub struct ScriptedGateway {
    charge_script: Arc<Mutex<VecDeque<Result<(), String>>>>,
    charges: Arc<Mutex<Vec<ChargeCommand>>>,
}

impl ScriptedGateway {
    pub fn fail_next_charge(&self, message: &str) {
        self.charge_script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn charges(&self) -> Vec<ChargeCommand> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn init_payment(
        &self,
        command: InitPaymentCommand,
    ) -> Result<PaymentSession, GatewayError> {
        Ok(PaymentSession {
            payment_url: format!("https://pay.example/{}", command.order_id),
            external_order_id: command.order_id,
        })
    }

    async fn charge(&self, command: ChargeCommand) -> Result<(), GatewayError> {
        self.charges.lock().unwrap().push(command);
        match self.charge_script.lock().unwrap().pop_front() {
            Some(Err(message)) => Err(GatewayError::Rejected { message }),
            Some(Ok(())) | None => Ok(()),
        }
    }
}
