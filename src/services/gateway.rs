use crate::config::GatewayConfig;
use crate::errors::ServiceError;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha512;
use std::time::Duration;
use tracing::{instrument, warn};

type HmacSha512 = Hmac<Sha512>;

/// Header carrying the webhook HMAC signature.
pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Webhook event emitted when a charge settles successfully.
pub const CHARGE_SUCCESS: &str = "charge.success";

/// Adapter for the hosted payment gateway.
///
/// All amounts cross this boundary in integer minor currency units. The
/// shared secret doubles as the webhook HMAC key.
#[derive(Clone)]
pub struct PaymentGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    callback_url: String,
}

/// Charge outcome reported by the gateway's verification endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Success,
    Failed,
    Abandoned,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    data: InitializeData,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    data: VerifyData,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: ChargeStatus,
}

/// Parsed webhook payload. Only fields the confirmation path needs.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub reference: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl PaymentGateway {
    pub fn new(cfg: &GatewayConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            secret_key: cfg.secret_key.clone(),
            callback_url: cfg.callback_url.clone(),
        })
    }

    /// Requests a hosted payment session and returns the redirect URL the
    /// customer completes payment at.
    #[instrument(skip(self, email))]
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount_minor: i64,
        reference: &str,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let body = json!({
            "email": email,
            "amount": amount_minor,
            "reference": reference,
            "callback_url": self.callback_url,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("initialize failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ServiceError::PaymentGateway(format!(
                "initialize returned {}",
                resp.status()
            )));
        }

        let parsed: InitializeResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("malformed initialize body: {e}")))?;
        Ok(parsed.data.authorization_url)
    }

    /// Builds the verification URL with the reference as a single path
    /// segment. References reach this from the callback querystring, so a
    /// `/` or `?` in one must be percent-encoded rather than reshape the
    /// request path.
    fn verify_url(&self, reference: &str) -> Result<reqwest::Url, ServiceError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ServiceError::Internal(format!("invalid gateway base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Internal("gateway base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["transaction", "verify", reference]);
        Ok(url)
    }

    /// Re-verifies a transaction server-side. The redirect callback never
    /// trusts browser-supplied status; this is the authoritative read.
    #[instrument(skip(self))]
    pub async fn verify_transaction(&self, reference: &str) -> Result<ChargeStatus, ServiceError> {
        let url = self.verify_url(reference)?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("verify failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ServiceError::PaymentGateway(format!(
                "verify returned {}",
                resp.status()
            )));
        }

        let parsed: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("malformed verify body: {e}")))?;
        Ok(parsed.data.status)
    }

    /// Verifies the webhook HMAC (SHA-512 over the raw request bytes).
    ///
    /// Must run against the raw body before any JSON parsing; re-serialized
    /// JSON would not be byte-identical. Comparison is constant-time.
    pub fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
        let Ok(mut mac) = HmacSha512::new_from_slice(self.secret_key.as_bytes()) else {
            return false;
        };
        mac.update(raw_body);
        let expected = hex::encode(mac.finalize().into_bytes());
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }
}

/// Converts a decimal major-unit amount to the gateway's integer minor units.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    let scaled = amount * dec!(100);
    if scaled.fract() != Decimal::ZERO {
        return Err(ServiceError::Validation(format!(
            "amount {amount} has sub-minor-unit precision"
        )));
    }
    scaled.to_i64().ok_or_else(|| {
        warn!(%amount, "amount overflows gateway minor units");
        ServiceError::Validation(format!("amount {amount} is out of range"))
    })
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.iter().zip(b) {
        res |= x ^ y;
    }
    res == 0
}
