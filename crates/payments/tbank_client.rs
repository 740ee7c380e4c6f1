use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    domain::{
        repositories::payment_gateway::PaymentGateway,
        value_objects::payment_gateway::{
            ChargeCommand, GatewayError, InitPaymentCommand, PaymentSession, to_gateway_amount,
        },
    },
    payments::tbank_signing::{Signable, SignatureFields, sign},
};

pub const DEFAULT_BASE_URL: &str = "https://securepay.tinkoff.ru";
pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

const RECEIPT_TAXATION: &str = "usn_income";
const RECEIPT_TAX: &str = "none";

#[derive(Debug, Clone)]
pub struct TBankSettings {
    pub base_url: String,
    pub terminal_key: String,
    pub terminal_password: String,
    /// Where the gateway posts payment notifications. Only needed for `Init`.
    pub notification_url: Option<String>,
    pub fail_url: Option<String>,
}

/// Acquiring client for the TBank `v2` API built on reqwest.
pub struct TBankClient {
    http: reqwest::Client,
    base_url: String,
    terminal_key: String,
    terminal_password: String,
    notification_url: Option<String>,
    fail_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitRequest<'a> {
    terminal_key: &'a str,
    amount: i64,
    order_id: &'a str,
    description: &'a str,
    customer_key: &'a str,
    #[serde(rename = "SuccessURL", skip_serializing_if = "Option::is_none")]
    success_url: Option<&'a str>,
    #[serde(rename = "FailURL", skip_serializing_if = "Option::is_none")]
    fail_url: Option<&'a str>,
    #[serde(rename = "NotificationURL", skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recurrent: Option<&'static str>,
    receipt: Receipt<'a>,
}

impl Signable for InitRequest<'_> {
    fn signature_fields(&self) -> SignatureFields {
        SignatureFields::new()
            .text("TerminalKey", self.terminal_key)
            .integer("Amount", self.amount)
            .text("OrderId", self.order_id)
            .text("Description", self.description)
            .text("CustomerKey", self.customer_key)
            .optional_text("SuccessURL", self.success_url)
            .optional_text("FailURL", self.fail_url)
            .optional_text("NotificationURL", self.notification_url)
            .optional_text("Recurrent", self.recurrent)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Receipt<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    taxation: &'static str,
    items: Vec<ReceiptItem<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiptItem<'a> {
    name: &'a str,
    price: i64,
    quantity: i64,
    amount: i64,
    tax: &'static str,
}

impl<'a> Receipt<'a> {
    fn single_item(name: &'a str, amount: i64, email: Option<&'a str>) -> Self {
        Self {
            email: email.filter(|email| !email.trim().is_empty()),
            taxation: RECEIPT_TAXATION,
            items: vec![ReceiptItem {
                name,
                price: amount,
                quantity: 1,
                amount,
                tax: RECEIPT_TAX,
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ChargeRequest<'a> {
    terminal_key: &'a str,
    rebill_id: &'a str,
    amount: i64,
    order_id: &'a str,
}

impl Signable for ChargeRequest<'_> {
    fn signature_fields(&self) -> SignatureFields {
        SignatureFields::new()
            .text("TerminalKey", self.terminal_key)
            .text("RebillId", self.rebill_id)
            .integer("Amount", self.amount)
            .text("OrderId", self.order_id)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct GatewayResponse {
    success: bool,
    #[serde(rename = "PaymentURL")]
    payment_url: Option<String>,
    order_id: Option<String>,
    status: Option<String>,
    error_code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl GatewayResponse {
    fn rejection(&self, status: StatusCode) -> GatewayError {
        let message = non_empty(self.message.as_deref());
        let details = non_empty(self.details.as_deref());

        let message = match (message, details) {
            (Some(message), Some(details)) => format!("{message}: {details}"),
            (Some(message), None) => message.to_string(),
            (None, Some(details)) => details.to_string(),
            (None, None) => format!("http {}", status.as_u16()),
        };

        GatewayError::Rejected { message }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl TBankClient {
    pub fn new(settings: TBankSettings) -> Result<Self, GatewayError> {
        Self::with_timeout(settings, GATEWAY_TIMEOUT)
    }

    pub fn with_timeout(settings: TBankSettings, timeout: Duration) -> Result<Self, GatewayError> {
        if settings.terminal_key.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "terminal key is empty".to_string(),
            ));
        }
        if settings.terminal_password.trim().is_empty() {
            return Err(GatewayError::Configuration(
                "terminal password is empty".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Configuration(err.to_string()))?;

        let base_url = match settings.base_url.trim().trim_end_matches('/') {
            "" => DEFAULT_BASE_URL.to_string(),
            base_url => base_url.to_string(),
        };

        Ok(Self {
            http,
            base_url,
            terminal_key: settings.terminal_key,
            terminal_password: settings.terminal_password,
            notification_url: settings.notification_url,
            fail_url: settings.fail_url,
        })
    }

    async fn post<T: Serialize>(
        &self,
        method: &str,
        body: &T,
    ) -> Result<(StatusCode, GatewayResponse), GatewayError> {
        let url = format!("{}/v2/{}", self.base_url, method);

        let resp = self.http.post(&url).json(body).send().await.map_err(|err| {
            error!(%method, error = %err, "tbank: request failed");
            GatewayError::Transport(err.to_string())
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|err| {
            error!(%method, %status, error = %err, "tbank: failed to read response body");
            GatewayError::Transport(err.to_string())
        })?;

        match serde_json::from_str::<GatewayResponse>(&text) {
            Ok(parsed) => Ok((status, parsed)),
            Err(_) if !status.is_success() => Ok((status, GatewayResponse::default())),
            Err(err) => {
                error!(%method, %status, error = %err, "tbank: unreadable response body");
                Err(GatewayError::InvalidResponse(err.to_string()))
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for TBankClient {
    async fn init_payment(
        &self,
        command: InitPaymentCommand,
    ) -> Result<PaymentSession, GatewayError> {
        let amount = to_gateway_amount(command.amount_minor)?;

        let request = InitRequest {
            terminal_key: &self.terminal_key,
            amount,
            order_id: &command.order_id,
            description: &command.description,
            customer_key: &command.customer_key,
            success_url: command.success_url.as_deref(),
            fail_url: self.fail_url.as_deref(),
            notification_url: self.notification_url.as_deref(),
            recurrent: command.recurring.then_some("Y"),
            receipt: Receipt::single_item(&command.description, amount, command.email.as_deref()),
        };

        let (status, resp) = self.post("Init", &sign(request, &self.terminal_password)).await?;

        let payment_url = non_empty(resp.payment_url.as_deref()).map(str::to_string);
        match payment_url {
            Some(payment_url) if resp.success && status.is_success() => {
                let external_order_id = non_empty(resp.order_id.as_deref())
                    .unwrap_or(&command.order_id)
                    .to_string();

                info!(
                    order_id = %command.order_id,
                    %external_order_id,
                    gateway_status = ?resp.status,
                    "tbank: payment initiated"
                );

                Ok(PaymentSession {
                    payment_url,
                    external_order_id,
                })
            }
            _ => {
                let rejection = resp.rejection(status);
                error!(
                    order_id = %command.order_id,
                    %status,
                    error_code = ?resp.error_code,
                    error = %rejection,
                    "tbank: init rejected"
                );
                Err(rejection)
            }
        }
    }

    async fn charge(&self, command: ChargeCommand) -> Result<(), GatewayError> {
        let amount = to_gateway_amount(command.amount_minor)?;

        let request = ChargeRequest {
            terminal_key: &self.terminal_key,
            rebill_id: &command.rebill_id,
            amount,
            order_id: &command.order_id,
        };

        let (status, resp) = self
            .post("Charge", &sign(request, &self.terminal_password))
            .await?;

        if resp.success && status.is_success() {
            info!(
                order_id = %command.order_id,
                gateway_status = ?resp.status,
                "tbank: recurring charge accepted"
            );
            return Ok(());
        }

        let rejection = resp.rejection(status);
        error!(
            order_id = %command.order_id,
            %status,
            error_code = ?resp.error_code,
            error = %rejection,
            "tbank: recurring charge rejected"
        );
        Err(rejection)
    }
}
