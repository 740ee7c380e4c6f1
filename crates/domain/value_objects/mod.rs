pub mod enums;
pub mod orders;
pub mod payment_gateway;
pub mod subscriptions;
