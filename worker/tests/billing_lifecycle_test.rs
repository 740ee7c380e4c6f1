mod common;

use std::sync::Arc;

use backend::usecases::{
    orders::OrderUseCase,
    payment_notifications::{NotificationError, NotificationOutcome, PaymentNotificationUseCase},
    subscription_ledger::SubscriptionLedger,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{InMemoryOrders, InMemoryPlans, InMemorySubscriptions, ScriptedGateway};
use crates::{
    domain::value_objects::{
        enums::{
            billing_periods::BillingPeriod, order_statuses::OrderStatus,
            subscription_statuses::SubscriptionStatus,
        },
        orders::InitOrderModel,
    },
    payments::tbank_signing::SignatureFields,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use worker::usecases::subscription_renewals::RenewalUseCase;

const TERMINAL_PASSWORD: &str = "lifecycle-secret";

struct Billing {
    plans: InMemoryPlans,
    orders: InMemoryOrders,
    subscriptions: InMemorySubscriptions,
    gateway: ScriptedGateway,
    ledger: Arc<SubscriptionLedger<InMemoryPlans, InMemorySubscriptions>>,
    order_usecase: OrderUseCase<InMemoryPlans, InMemoryOrders, ScriptedGateway>,
    notification_usecase:
        PaymentNotificationUseCase<InMemoryOrders, InMemoryPlans, InMemorySubscriptions>,
    renewal_usecase: RenewalUseCase<InMemorySubscriptions, ScriptedGateway>,
}

impl Billing {
    fn new() -> Self {
        let plans = InMemoryPlans::default()
            .with_plan("START", 0, BillingPeriod::Month)
            .with_plan("PRO", 99_900, BillingPeriod::Month);
        let orders = InMemoryOrders::default();
        let subscriptions = InMemorySubscriptions::default();
        let gateway = ScriptedGateway::default();

        let ledger = Arc::new(SubscriptionLedger::new(
            Arc::new(plans.clone()),
            Arc::new(subscriptions.clone()),
            "START",
        ));
        let order_usecase = OrderUseCase::new(
            Arc::new(plans.clone()),
            Arc::new(orders.clone()),
            Arc::new(gateway.clone()),
            "https://api.example.com/api/v1/order/paid",
        );
        let notification_usecase = PaymentNotificationUseCase::new(
            Arc::new(orders.clone()),
            Arc::new(plans.clone()),
            Arc::clone(&ledger),
            TERMINAL_PASSWORD,
        );
        let renewal_usecase = RenewalUseCase::new(
            Arc::new(subscriptions.clone()),
            Arc::new(gateway.clone()),
            3,
        );

        Self {
            plans,
            orders,
            subscriptions,
            gateway,
            ledger,
            order_usecase,
            notification_usecase,
            renewal_usecase,
        }
    }
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
}

fn signed_callback(order_id: &str, success: bool, rebill_id: Option<&str>) -> Vec<u8> {
    let mut payload = json!({
        "TerminalKey": "lifecycle-terminal",
        "OrderId": order_id,
        "Success": success,
        "Status": if success { "CONFIRMED" } else { "REJECTED" },
        "PaymentId": 3093639567u64,
        "ErrorCode": if success { "0" } else { "1051" },
        "Amount": 9_990_000,
    });
    if let Some(rebill_id) = rebill_id {
        payload["RebillId"] = json!(rebill_id);
    }

    let token = SignatureFields::from_json(payload.as_object().unwrap())
        .unwrap()
        .sign(TERMINAL_PASSWORD);
    payload["Token"] = Value::String(token);
    serde_json::to_vec(&payload).unwrap()
}

#[tokio::test]
async fn order_payment_grant_and_renewals() {
    let billing = Billing::new();
    let user_id = Uuid::new_v4();
    let pro = billing.plans.by_code("PRO");
    let no_cancel = CancellationToken::new();

    // Checkout.
    let init = billing
        .order_usecase
        .init_order(
            user_id,
            InitOrderModel {
                plan_id: pro.id,
                email: Some("buyer@example.com".to_string()),
                return_url: None,
            },
        )
        .await
        .unwrap();
    let order_id = Uuid::parse_str(&init.order_id).unwrap();
    let order = billing.orders.get(order_id);
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.amount_minor, 99_900);
    assert_eq!(order.payment_url.as_deref(), Some(init.payment_url.as_str()));

    // Forged callback changes nothing.
    let mut forged: Value = serde_json::from_slice(&signed_callback(
        &init.order_id,
        true,
        Some("tok1"),
    ))
    .unwrap();
    forged["RebillId"] = json!("stolen");
    let err = billing
        .notification_usecase
        .handle(&serde_json::to_vec(&forged).unwrap(), at(2025, 1, 31))
        .await
        .unwrap_err();
    assert!(matches!(err, NotificationError::InvalidSignature));
    assert_eq!(billing.orders.get(order_id).status(), OrderStatus::Pending);
    assert!(billing.subscriptions.for_user(user_id).is_none());

    // Successful callback grants one month from payment time.
    let paid_at = at(2025, 1, 31);
    let outcome = billing
        .notification_usecase
        .handle(&signed_callback(&init.order_id, true, Some("tok1")), paid_at)
        .await
        .unwrap();
    assert!(matches!(outcome, NotificationOutcome::Paid { .. }));

    let order = billing.orders.get(order_id);
    assert_eq!(order.status(), OrderStatus::Paid);
    assert_eq!(order.paid_at, Some(paid_at));
    assert_eq!(order.external_rebill_id.as_deref(), Some("tok1"));

    let subscription = billing.subscriptions.for_user(user_id).unwrap();
    assert_eq!(subscription.status(), SubscriptionStatus::Active);
    assert_eq!(subscription.plan_id, pro.id);
    assert_eq!(subscription.period_end, at(2025, 2, 28));
    assert_eq!(subscription.rebill_token(), Some("tok1"));

    // Replayed callback is acknowledged without a second grant.
    let replay = billing
        .notification_usecase
        .handle(
            &signed_callback(&init.order_id, true, Some("tok1")),
            at(2025, 2, 1),
        )
        .await
        .unwrap();
    assert_eq!(replay, NotificationOutcome::AlreadyProcessed { order_id });
    assert_eq!(billing.subscriptions.for_user(user_id).unwrap(), subscription);

    // Not due yet.
    let early = billing
        .renewal_usecase
        .run_renewals(at(2025, 2, 20), &no_cancel)
        .await
        .unwrap();
    assert_eq!(early.due, 0);
    assert!(billing.gateway.charges().is_empty());

    // 32 days later the renewal charges tok1 and extends from the charge time.
    let renewed_at = paid_at + Duration::days(32);
    let summary = billing
        .renewal_usecase
        .run_renewals(renewed_at, &no_cancel)
        .await
        .unwrap();
    assert_eq!(summary.renewed, 1);

    let charges = billing.gateway.charges();
    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].rebill_id, "tok1");
    assert_eq!(charges[0].amount_minor, 99_900);
    assert_eq!(charges[0].order_id, format!("20250304-renew-{user_id}"));

    let renewed = billing.subscriptions.for_user(user_id).unwrap();
    assert_eq!(renewed.status(), SubscriptionStatus::Active);
    assert_eq!(renewed.period_start, renewed_at);
    assert_eq!(renewed.period_end, at(2025, 4, 4));

    // A failed charge marks past_due and keeps the period.
    billing.gateway.fail_next_charge("insufficient funds");
    let failed = billing
        .renewal_usecase
        .run_renewals(at(2025, 4, 5), &no_cancel)
        .await
        .unwrap();
    assert_eq!(failed.past_due, 1);

    let past_due = billing.subscriptions.for_user(user_id).unwrap();
    assert_eq!(past_due.status(), SubscriptionStatus::PastDue);
    assert_eq!(past_due.period_end, at(2025, 4, 4));
    assert_eq!(past_due.renewal_attempts, 1);

    // Past-due subscriptions keep their plan until the period runs out.
    let entitlement = billing
        .ledger
        .current_entitlement(user_id, at(2025, 4, 1))
        .await
        .unwrap();
    assert_eq!(entitlement.plan_code, "PRO");
    assert!(!entitlement.is_baseline);
}

#[tokio::test]
async fn repeated_failures_cancel_the_subscription() {
    let billing = Billing::new();
    let user_id = Uuid::new_v4();
    let pro = billing.plans.by_code("PRO");
    let no_cancel = CancellationToken::new();

    billing
        .ledger
        .grant(user_id, &pro, Some("tok9".to_string()), at(2025, 1, 1))
        .await
        .unwrap();

    for day in 2..=4 {
        billing.gateway.fail_next_charge("card expired");
        billing
            .renewal_usecase
            .run_renewals(at(2025, 2, day), &no_cancel)
            .await
            .unwrap();
    }

    let canceled = billing.subscriptions.for_user(user_id).unwrap();
    assert_eq!(canceled.status(), SubscriptionStatus::Canceled);
    assert_eq!(canceled.renewal_attempts, 3);

    let after = billing
        .renewal_usecase
        .run_renewals(at(2025, 2, 5), &no_cancel)
        .await
        .unwrap();
    assert_eq!(after.due, 0);
    assert_eq!(billing.gateway.charges().len(), 3);

    let entitlement = billing
        .ledger
        .current_entitlement(user_id, at(2025, 2, 5))
        .await
        .unwrap();
    assert!(entitlement.is_baseline);
    assert_eq!(entitlement.status, Some(SubscriptionStatus::Canceled));
}

#[tokio::test]
async fn ensure_baseline_is_idempotent() {
    let billing = Billing::new();
    let user_id = Uuid::new_v4();
    let start = billing.plans.by_code("START");

    let (first, created) = billing
        .ledger
        .ensure_baseline(user_id, at(2025, 5, 1))
        .await
        .unwrap();
    assert!(created);
    assert_eq!(first.plan_id, start.id);

    let (second, created_again) = billing
        .ledger
        .ensure_baseline(user_id, at(2025, 5, 2))
        .await
        .unwrap();
    assert!(!created_again);
    assert_eq!(second, first);
    assert_eq!(billing.subscriptions.count(), 1);
}

#[tokio::test]
async fn paid_order_upgrades_baseline_in_place() {
    let billing = Billing::new();
    let user_id = Uuid::new_v4();
    let pro = billing.plans.by_code("PRO");

    let (baseline, _) = billing
        .ledger
        .ensure_baseline(user_id, at(2025, 5, 1))
        .await
        .unwrap();

    let init = billing
        .order_usecase
        .init_order(
            user_id,
            InitOrderModel {
                plan_id: pro.id,
                email: None,
                return_url: Some("https://app.example.com/thanks".to_string()),
            },
        )
        .await
        .unwrap();

    billing
        .notification_usecase
        .handle(
            &signed_callback(&init.order_id, true, Some("tok2")),
            at(2025, 5, 10),
        )
        .await
        .unwrap();

    let upgraded = billing.subscriptions.for_user(user_id).unwrap();
    assert_eq!(upgraded.id, baseline.id);
    assert_eq!(upgraded.plan_id, pro.id);
    assert_eq!(upgraded.period_end, at(2025, 6, 10));
    assert_eq!(billing.subscriptions.count(), 1);

    let declined = billing
        .order_usecase
        .init_order(
            user_id,
            InitOrderModel {
                plan_id: pro.id,
                email: None,
                return_url: None,
            },
        )
        .await
        .unwrap();
    let outcome = billing
        .notification_usecase
        .handle(&signed_callback(&declined.order_id, false, None), at(2025, 5, 11))
        .await
        .unwrap();
    assert!(matches!(outcome, NotificationOutcome::Failed { .. }));
    assert_eq!(billing.subscriptions.for_user(user_id).unwrap(), upgraded);
}
