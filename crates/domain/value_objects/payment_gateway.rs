use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// The gateway bills in hundredths of the currency's minor unit.
pub const GATEWAY_UNITS_PER_MINOR: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPaymentCommand {
    pub amount_minor: i64,
    pub order_id: String,
    pub customer_key: String,
    pub description: String,
    pub email: Option<String>,
    pub success_url: Option<String>,
    pub recurring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    pub payment_url: String,
    pub external_order_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeCommand {
    pub rebill_id: String,
    pub amount_minor: i64,
    pub order_id: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured: {0}")]
    Configuration(String),
    #[error("amount {0} cannot be expressed in gateway units")]
    InvalidAmount(i64),
    #[error("{message}")]
    Rejected { message: String },
    #[error("payment gateway request failed: {0}")]
    Transport(String),
    #[error("payment gateway returned an unreadable response: {0}")]
    InvalidResponse(String),
}

pub fn to_gateway_amount(amount_minor: i64) -> Result<i64, GatewayError> {
    amount_minor
        .checked_mul(GATEWAY_UNITS_PER_MINOR)
        .filter(|amount| *amount >= 0)
        .ok_or(GatewayError::InvalidAmount(amount_minor))
}

/// Asynchronous payment notification posted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentNotification {
    pub order_id: String,
    pub success: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub rebill_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl PaymentNotification {
    pub fn rebill_token(&self) -> Option<&str> {
        self.rebill_id
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
