use std::sync::Arc;

use crates::domain::{
    entities::orders::InsertOrderEntity,
    repositories::{
        orders::OrderRepository, payment_gateway::PaymentGateway, plans::PlanRepository,
    },
    value_objects::{
        enums::order_statuses::OrderStatus,
        orders::{InitOrderDto, InitOrderModel, OrderDto, OrderScope},
        payment_gateway::{GatewayError, InitPaymentCommand},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("plan not found")]
    PlanNotFound,
    #[error("order not found")]
    OrderNotFound,
    #[error("payment initiation failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OrderError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            OrderError::PlanNotFound | OrderError::Gateway(_) => StatusCode::BAD_REQUEST,
            OrderError::OrderNotFound => StatusCode::NOT_FOUND,
            OrderError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type OrderResult<T> = std::result::Result<T, OrderError>;

pub struct OrderUseCase<P, O, G>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    plan_repository: Arc<P>,
    order_repository: Arc<O>,
    payment_gateway: Arc<G>,
    payment_return_url: String,
}

impl<P, O, G> OrderUseCase<P, O, G>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(
        plan_repository: Arc<P>,
        order_repository: Arc<O>,
        payment_gateway: Arc<G>,
        payment_return_url: impl Into<String>,
    ) -> Self {
        Self {
            plan_repository,
            order_repository,
            payment_gateway,
            payment_return_url: payment_return_url.into(),
        }
    }

    /// Creates a pending order priced from the plan and opens a hosted payment page
    /// for it. A gateway failure is written to the order, which stays pending.
    pub async fn init_order(
        &self,
        user_id: Uuid,
        model: InitOrderModel,
    ) -> OrderResult<InitOrderDto> {
        let plan = self
            .plan_repository
            .find_active_plan_by_id(model.plan_id)
            .await?
            .ok_or(OrderError::PlanNotFound)?;

        let order = self
            .order_repository
            .create(InsertOrderEntity {
                user_id,
                plan_id: plan.id,
                status: OrderStatus::Pending.to_string(),
                amount_minor: plan.amount_minor,
                currency: plan.currency.clone(),
            })
            .await?;

        info!(
            %user_id,
            order_id = %order.id,
            plan_code = %plan.code,
            amount_minor = order.amount_minor,
            "orders: order created"
        );

        let success_url = model
            .return_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("{}?oid={}", self.payment_return_url, order.id));

        let command = InitPaymentCommand {
            amount_minor: order.amount_minor,
            order_id: order.id.to_string(),
            customer_key: user_id.to_string(),
            description: format!("Plan {}", plan.code),
            email: model
                .email
                .map(|email| email.trim().to_string())
                .filter(|email| !email.is_empty()),
            success_url: Some(success_url),
            recurring: true,
        };

        let session = match self.payment_gateway.init_payment(command).await {
            Ok(session) => session,
            Err(gateway_error) => {
                warn!(
                    order_id = %order.id,
                    error = %gateway_error,
                    "orders: payment initiation failed, order left pending"
                );
                if let Err(err) = self
                    .order_repository
                    .record_gateway_error(order.id, gateway_error.to_string())
                    .await
                {
                    error!(order_id = %order.id, db_error = ?err, "orders: failed to record gateway error");
                }
                return Err(OrderError::Gateway(gateway_error));
            }
        };

        self.order_repository
            .record_gateway_session(
                order.id,
                session.external_order_id.clone(),
                session.payment_url.clone(),
            )
            .await
            .map_err(|err| {
                error!(order_id = %order.id, db_error = ?err, "orders: failed to store payment session");
                OrderError::Internal(err)
            })?;

        info!(
            order_id = %order.id,
            external_order_id = %session.external_order_id,
            "orders: payment session opened"
        );

        Ok(InitOrderDto {
            payment_url: session.payment_url,
            order_id: session.external_order_id,
        })
    }

    pub async fn list_orders(&self, scope: OrderScope) -> OrderResult<Vec<OrderDto>> {
        let orders = self.order_repository.list(scope).await?;
        Ok(orders.into_iter().map(OrderDto::from).collect())
    }

    pub async fn delete_order(&self, order_id: Uuid, scope: OrderScope) -> OrderResult<()> {
        if !self.order_repository.delete(order_id, scope).await? {
            return Err(OrderError::OrderNotFound);
        }

        info!(%order_id, ?scope, "orders: order deleted");
        Ok(())
    }

    /// Whether the order behind a browser return is paid. Unknown ids count as unpaid.
    pub async fn is_paid(&self, order_id: Uuid) -> OrderResult<bool> {
        let order = self.order_repository.find_by_id(order_id).await?;
        Ok(order.is_some_and(|order| order.status() == OrderStatus::Paid))
    }
}
