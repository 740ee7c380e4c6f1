pub mod orders;
pub mod payment_notifications;
pub mod subscription_ledger;
