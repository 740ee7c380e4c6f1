pub mod orders;
pub mod plans;
pub mod subscriptions;
