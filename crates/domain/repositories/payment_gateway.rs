use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::payment_gateway::{
    ChargeCommand, GatewayError, InitPaymentCommand, PaymentSession,
};

/// Outbound calls to the acquiring gateway. Calls are never retried here.
#[automock]
#[async_trait]
pub trait PaymentGateway {
    async fn init_payment(
        &self,
        command: InitPaymentCommand,
    ) -> Result<PaymentSession, GatewayError>;
    async fn charge(&self, command: ChargeCommand) -> Result<(), GatewayError>;
}
