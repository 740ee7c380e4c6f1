pub mod billing_periods;
pub mod order_statuses;
pub mod subscription_statuses;
