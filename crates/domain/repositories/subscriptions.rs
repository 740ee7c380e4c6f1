use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{
        GrantSubscriptionChangeset, InsertSubscriptionEntity, SubscriptionEntity,
    },
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;
    /// `None` when the user already has a row (another writer got there first).
    async fn create(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<Option<SubscriptionEntity>>;
    async fn overwrite(
        &self,
        subscription_id: Uuid,
        changeset: GrantSubscriptionChangeset,
    ) -> Result<SubscriptionEntity>;
    async fn list_all(&self) -> Result<Vec<SubscriptionEntity>>;
    async fn record_renewal(
        &self,
        subscription_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<()>;
    async fn record_renewal_failure(
        &self,
        subscription_id: Uuid,
        status: SubscriptionStatus,
        renewal_attempts: i32,
    ) -> Result<()>;
    async fn attach_rebill_token(&self, subscription_id: Uuid, rebill_token: String) -> Result<()>;
}
