use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::Utc;
use crates::domain::{
    repositories::{
        orders::OrderRepository, payment_gateway::PaymentGateway, plans::PlanRepository,
        subscriptions::SubscriptionRepository,
    },
    value_objects::{
        orders::{InitOrderModel, OrderOwnerQuery, OrderScope},
        subscriptions::EnsureBaselineDto,
    },
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    config::config_model::PublicUrls,
    usecases::{
        orders::OrderUseCase, payment_notifications::PaymentNotificationUseCase,
        subscription_ledger::SubscriptionLedger,
    },
};

pub struct PaymentReturnState<P, O, G>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub order_usecase: Arc<OrderUseCase<P, O, G>>,
    pub public_urls: Arc<PublicUrls>,
}

impl<P, O, G> Clone for PaymentReturnState<P, O, G>
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            order_usecase: Arc::clone(&self.order_usecase),
            public_urls: Arc::clone(&self.public_urls),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentReturnQuery {
    pub oid: Option<String>,
}

pub fn routes<P, O, G, S>(
    order_usecase: Arc<OrderUseCase<P, O, G>>,
    notification_usecase: Arc<PaymentNotificationUseCase<O, P, S>>,
    ledger: Arc<SubscriptionLedger<P, S>>,
    public_urls: Arc<PublicUrls>,
) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    let payment_return_state = PaymentReturnState {
        order_usecase: Arc::clone(&order_usecase),
        public_urls,
    };

    let orders = Router::new()
        .route("/init", post(init_order::<P, O, G>))
        .route("/all", get(list_orders::<P, O, G>))
        .route("/:id", delete(delete_order::<P, O, G>))
        .with_state(order_usecase);

    let payment_return = Router::new()
        .route("/paid", get(payment_return::<P, O, G>))
        .with_state(payment_return_state);

    let notifications = Router::new()
        .route("/notify/tbank", post(notify_tbank::<O, P, S>))
        .with_state(notification_usecase);

    let baseline = Router::new()
        .route("/ensure-start", post(ensure_start::<P, S>))
        .with_state(ledger);

    orders
        .merge(payment_return)
        .merge(notifications)
        .merge(baseline)
}

pub async fn init_order<P, O, G>(
    State(order_usecase): State<Arc<OrderUseCase<P, O, G>>>,
    auth: AuthUser,
    Json(init_order_model): Json<InitOrderModel>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    match order_usecase.init_order(auth.user_id, init_order_model).await {
        Ok(init_order_dto) => (StatusCode::OK, Json(init_order_dto)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_orders<P, O, G>(
    State(order_usecase): State<Arc<OrderUseCase<P, O, G>>>,
    auth: AuthUser,
    Query(owner_query): Query<OrderOwnerQuery>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let scope = OrderScope::resolve(auth.user_id, auth.is_admin(), owner_query.user_id);

    match order_usecase.list_orders(scope).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_order<P, O, G>(
    State(order_usecase): State<Arc<OrderUseCase<P, O, G>>>,
    auth: AuthUser,
    Path(order_id): Path<Uuid>,
    Query(owner_query): Query<OrderOwnerQuery>,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let scope = OrderScope::resolve(auth.user_id, auth.is_admin(), owner_query.user_id);

    match order_usecase.delete_order(order_id, scope).await {
        Ok(()) => (StatusCode::OK, "Order deleted").into_response(),
        Err(e) => e.into_response(),
    }
}

/// Browser landing after the hosted payment page.
pub async fn payment_return<P, O, G>(
    State(state): State<PaymentReturnState<P, O, G>>,
    Query(query): Query<PaymentReturnQuery>,
) -> Response
where
    P: PlanRepository + Send + Sync + 'static,
    O: OrderRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    let order_id = query
        .oid
        .as_deref()
        .and_then(|oid| Uuid::parse_str(oid.trim()).ok());

    let paid = match order_id {
        Some(order_id) => state.order_usecase.is_paid(order_id).await.unwrap_or_else(|e| {
            tracing::error!(%order_id, error = %e, "orders router: payment return lookup failed");
            false
        }),
        None => false,
    };

    let location = if paid {
        state.public_urls.paid_redirect()
    } else {
        info!(oid = ?query.oid, "orders router: payment return for unpaid order");
        state.public_urls.failed_redirect()
    };

    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

pub async fn notify_tbank<O, P, S>(
    State(notification_usecase): State<Arc<PaymentNotificationUseCase<O, P, S>>>,
    body: Bytes,
) -> impl IntoResponse
where
    O: OrderRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    match notification_usecase.handle(&body, Utc::now()).await {
        Ok(outcome) => {
            info!(?outcome, "orders router: gateway notification handled");
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn ensure_start<P, S>(
    State(ledger): State<Arc<SubscriptionLedger<P, S>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    match ledger.ensure_baseline(auth.user_id, Utc::now()).await {
        Ok((subscription, created)) => (
            StatusCode::OK,
            Json(EnsureBaselineDto {
                created,
                subscription: subscription.into(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
