//! Request signing shared by outbound gateway calls and inbound notifications.
//!
//! The token is the lowercase hex SHA-256 of every non-empty top-level value,
//! concatenated in byte-wise key order after the terminal password has been
//! added under `Password`. Nested objects (`Receipt`, `DATA`) are not signed.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const TOKEN_FIELD: &str = "Token";
pub const PASSWORD_FIELD: &str = "Password";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is missing")]
    MissingToken,
    #[error("signature does not match")]
    Mismatch,
    #[error("field `{0}` has a value that cannot be signed")]
    UnsupportedValue(String),
}

/// Canonical set of signed fields, kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureFields {
    values: BTreeMap<String, String>,
}

impl SignatureFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty strings are not signed.
    pub fn text(mut self, key: &str, value: &str) -> Self {
        if !value.is_empty() {
            self.values.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn optional_text(self, key: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.text(key, value),
            None => self,
        }
    }

    pub fn integer(mut self, key: &str, value: i64) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn flag(mut self, key: &str, value: bool) -> Self {
        self.values
            .insert(key.to_string(), if value { "true" } else { "false" }.to_string());
        self
    }

    /// Collects the signed fields of a received JSON object.
    pub fn from_json(object: &Map<String, Value>) -> Result<Self, SignatureError> {
        let mut fields = Self::new();

        for (key, value) in object {
            if key == TOKEN_FIELD {
                continue;
            }

            fields = match value {
                Value::Null | Value::Object(_) | Value::Array(_) => fields,
                Value::String(text) => fields.text(key, text),
                Value::Bool(flag) => fields.flag(key, *flag),
                Value::Number(number) => {
                    let rendered = if let Some(int) = number.as_i64() {
                        int.to_string()
                    } else if let Some(uint) = number.as_u64() {
                        uint.to_string()
                    } else {
                        return Err(SignatureError::UnsupportedValue(key.clone()));
                    };
                    fields.values.insert(key.clone(), rendered);
                    fields
                }
            };
        }

        Ok(fields)
    }

    fn canonical_payload(&self, secret: &str) -> String {
        let mut values = self.values.clone();
        values.insert(PASSWORD_FIELD.to_string(), secret.to_string());
        values.into_values().collect()
    }

    pub fn sign(&self, secret: &str) -> String {
        let digest = Sha256::digest(self.canonical_payload(secret).as_bytes());
        hex::encode(digest)
    }

    /// Case-insensitive, constant-time comparison against a received token.
    pub fn verify(&self, secret: &str, received: &str) -> Result<(), SignatureError> {
        let received = received.trim();
        if received.is_empty() {
            return Err(SignatureError::MissingToken);
        }

        let expected = self.sign(secret);
        let received = received.to_ascii_lowercase();

        if bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// A request body whose signed fields are listed explicitly.
pub trait Signable {
    fn signature_fields(&self) -> SignatureFields;
}

#[derive(Debug, Serialize)]
pub struct Signed<T> {
    #[serde(flatten)]
    pub body: T,
    #[serde(rename = "Token")]
    pub token: String,
}

pub fn sign<T: Signable>(body: T, secret: &str) -> Signed<T> {
    let token = body.signature_fields().sign(secret);
    Signed { body, token }
}

/// Checks the `Token` of a received JSON object against the rest of its fields.
pub fn verify_json(object: &Map<String, Value>, secret: &str) -> Result<(), SignatureError> {
    let received = match object.get(TOKEN_FIELD) {
        Some(Value::String(token)) => token.as_str(),
        _ => return Err(SignatureError::MissingToken),
    };

    SignatureFields::from_json(object)?.verify(secret, received)
}
