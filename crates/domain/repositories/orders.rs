use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::orders::{InsertOrderEntity, OrderEntity},
    value_objects::orders::OrderScope,
};

#[automock]
#[async_trait]
pub trait OrderRepository {
    async fn create(&self, insert_order_entity: InsertOrderEntity) -> Result<OrderEntity>;
    async fn record_gateway_session(
        &self,
        order_id: Uuid,
        external_order_id: String,
        payment_url: String,
    ) -> Result<()>;
    async fn record_gateway_error(&self, order_id: Uuid, error: String) -> Result<()>;
    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>>;
    async fn find_by_external_order_id(&self, external_order_id: &str)
    -> Result<Option<OrderEntity>>;
    /// Moves a pending order to `paid`. `None` means the order was no longer pending.
    async fn mark_paid(
        &self,
        order_id: Uuid,
        paid_at: DateTime<Utc>,
        rebill_id: Option<String>,
    ) -> Result<Option<OrderEntity>>;
    /// Moves a pending order to `failed`. `None` means the order was no longer pending.
    async fn mark_failed(&self, order_id: Uuid) -> Result<Option<OrderEntity>>;
    async fn attach_rebill_id(&self, order_id: Uuid, rebill_id: String) -> Result<()>;
    async fn list(&self, scope: OrderScope) -> Result<Vec<OrderEntity>>;
    async fn delete(&self, order_id: Uuid, scope: OrderScope) -> Result<bool>;
}
