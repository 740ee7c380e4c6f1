pub mod orders;
pub mod payment_gateway;
pub mod plans;
pub mod subscriptions;
