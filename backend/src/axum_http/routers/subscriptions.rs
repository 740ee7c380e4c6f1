use std::sync::Arc;

use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get,
};
use chrono::Utc;
use crates::domain::repositories::{
    plans::PlanRepository, subscriptions::SubscriptionRepository,
};

use crate::{auth::AuthUser, usecases::subscription_ledger::SubscriptionLedger};

pub fn routes<P, S>(ledger: Arc<SubscriptionLedger<P, S>>) -> Router
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/current", get(current_entitlement::<P, S>))
        .with_state(ledger)
}

pub async fn current_entitlement<P, S>(
    State(ledger): State<Arc<SubscriptionLedger<P, S>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    match ledger.current_entitlement(auth.user_id, Utc::now()).await {
        Ok(entitlement) => (StatusCode::OK, Json(entitlement)).into_response(),
        Err(e) => e.into_response(),
    }
}
