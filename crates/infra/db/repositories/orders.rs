use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::orders},
};
use domain::{
    entities::orders::{InsertOrderEntity, OrderEntity},
    repositories::orders::OrderRepository,
    value_objects::{enums::order_statuses::OrderStatus, orders::OrderScope},
};

pub struct OrderPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl OrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl OrderRepository for OrderPostgres {
    async fn create(&self, insert_order_entity: InsertOrderEntity) -> Result<OrderEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = insert_into(orders::table)
            .values(&insert_order_entity)
            .returning(OrderEntity::as_returning())
            .get_result::<OrderEntity>(&mut conn)?;

        Ok(order)
    }

    async fn record_gateway_session(
        &self,
        order_id: Uuid,
        external_order_id: String,
        payment_url: String,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(orders::table)
            .filter(orders::id.eq(order_id))
            .set((
                orders::external_order_id.eq(Some(external_order_id)),
                orders::payment_url.eq(Some(payment_url)),
                orders::last_error.eq(None::<String>),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn record_gateway_error(&self, order_id: Uuid, error: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(orders::table)
            .filter(orders::id.eq(order_id))
            .set((
                orders::last_error.eq(Some(error)),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = orders::table
            .filter(orders::id.eq(order_id))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }

    async fn find_by_external_order_id(
        &self,
        external_order_id: &str,
    ) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = orders::table
            .filter(orders::external_order_id.eq(external_order_id))
            .select(OrderEntity::as_select())
            .first::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }

    async fn mark_paid(
        &self,
        order_id: Uuid,
        paid_at: DateTime<Utc>,
        rebill_id: Option<String>,
    ) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // The status guard makes concurrent deliveries race on the row, not in memory.
        let order = update(orders::table)
            .filter(orders::id.eq(order_id))
            .filter(orders::status.eq(OrderStatus::Pending.to_string()))
            .set((
                orders::status.eq(OrderStatus::Paid.to_string()),
                orders::paid_at.eq(Some(paid_at)),
                orders::external_rebill_id.eq(rebill_id),
                orders::updated_at.eq(Utc::now()),
            ))
            .returning(OrderEntity::as_returning())
            .get_result::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }

    async fn mark_failed(&self, order_id: Uuid) -> Result<Option<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let order = update(orders::table)
            .filter(orders::id.eq(order_id))
            .filter(orders::status.eq(OrderStatus::Pending.to_string()))
            .set((
                orders::status.eq(OrderStatus::Failed.to_string()),
                orders::paid_at.eq(None::<DateTime<Utc>>),
                orders::updated_at.eq(Utc::now()),
            ))
            .returning(OrderEntity::as_returning())
            .get_result::<OrderEntity>(&mut conn)
            .optional()?;

        Ok(order)
    }

    async fn attach_rebill_id(&self, order_id: Uuid, rebill_id: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(orders::table)
            .filter(orders::id.eq(order_id))
            .set((
                orders::external_rebill_id.eq(Some(rebill_id)),
                orders::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn list(&self, scope: OrderScope) -> Result<Vec<OrderEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = orders::table.into_boxed();
        if let OrderScope::Owner(user_id) = scope {
            query = query.filter(orders::user_id.eq(user_id));
        }

        let results = query
            .order(orders::created_at.desc())
            .select(OrderEntity::as_select())
            .load::<OrderEntity>(&mut conn)?;

        Ok(results)
    }

    async fn delete(&self, order_id: Uuid, scope: OrderScope) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = match scope {
            OrderScope::Owner(user_id) => delete(
                orders::table
                    .filter(orders::id.eq(order_id))
                    .filter(orders::user_id.eq(user_id)),
            )
            .execute(&mut conn)?,
            OrderScope::All => {
                delete(orders::table.filter(orders::id.eq(order_id))).execute(&mut conn)?
            }
        };

        Ok(deleted > 0)
    }
}
