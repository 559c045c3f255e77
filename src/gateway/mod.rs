//! Payment gateway collaborator
//!
//! The core talks to the gateway through this narrow contract only: create
//! an order, refund an amount, verify a webhook signature. Local state is
//! never mutated before a gateway call succeeds, so a `GatewayError` leaves
//! state unchanged and is safe to retry with backoff.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{ApiError, ApiResult};

type HmacSha256 = Hmac<Sha256>;

/// A gateway order created for a payment intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
}

/// A refund executed by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub gateway_refund_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway identifier persisted alongside payments (e.g. "razorpay").
    fn name(&self) -> &'static str;

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: serde_json::Value,
    ) -> ApiResult<GatewayOrder>;

    async fn refund(
        &self,
        gateway_payment_ref: &str,
        amount_minor: i64,
        reason: Option<&str>,
    ) -> ApiResult<GatewayRefund>;
}

/// Verify a gateway webhook signature: hex-encoded HMAC-SHA256 of the raw
/// payload under the shared secret.
pub fn verify_webhook_signature(raw_payload: &[u8], signature_header: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature_header.trim()) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(raw_payload);

    mac.verify_slice(&expected).is_ok()
}

/// Compute the signature a gateway would attach to a payload. Used by
/// tests and local tooling.
pub fn sign_webhook_payload(raw_payload: &[u8], secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(raw_payload);
    hex::encode(mac.finalize().into_bytes())
}

// ===== Razorpay implementation =====

#[derive(Debug, Deserialize)]
struct RazorpayOrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RazorpayRefundResponse {
    id: String,
}

/// Razorpay Orders/Refunds API client
pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(base_url: String, key_id: String, key_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            key_id,
            key_secret,
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: serde_json::Value,
    ) -> ApiResult<GatewayOrder> {
        let body = serde_json::json!({
            "amount": amount_minor,
            "currency": currency,
            "notes": metadata,
        });

        let response = self
            .http
            .post(format!("{}/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::GatewayError(format!(
                "Order creation failed ({}): {}",
                status, text
            )));
        }

        let order: RazorpayOrderResponse = response.json().await?;

        tracing::info!(gateway_order_id = %order.id, amount_minor, "Gateway order created");

        Ok(GatewayOrder {
            gateway_order_id: order.id,
        })
    }

    async fn refund(
        &self,
        gateway_payment_ref: &str,
        amount_minor: i64,
        reason: Option<&str>,
    ) -> ApiResult<GatewayRefund> {
        let body = serde_json::json!({
            "amount": amount_minor,
            "notes": { "reason": reason.unwrap_or("requested_by_customer") },
        });

        let response = self
            .http
            .post(format!(
                "{}/payments/{}/refund",
                self.base_url, gateway_payment_ref
            ))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::GatewayError(format!(
                "Refund failed ({}): {}",
                status, text
            )));
        }

        let refund: RazorpayRefundResponse = response.json().await?;

        tracing::info!(gateway_refund_id = %refund.id, amount_minor, "Gateway refund executed");

        Ok(GatewayRefund {
            gateway_refund_id: refund.id,
        })
    }
}

/// In-memory gateway for tests: echoes deterministic references and never
/// leaves the process.
pub struct StubGateway;

#[async_trait]
impl PaymentGateway for StubGateway {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn create_order(
        &self,
        _amount_minor: i64,
        _currency: &str,
        _metadata: serde_json::Value,
    ) -> ApiResult<GatewayOrder> {
        Ok(GatewayOrder {
            gateway_order_id: format!("order_{}", uuid::Uuid::new_v4().simple()),
        })
    }

    async fn refund(
        &self,
        gateway_payment_ref: &str,
        _amount_minor: i64,
        _reason: Option<&str>,
    ) -> ApiResult<GatewayRefund> {
        Ok(GatewayRefund {
            gateway_refund_id: format!("rfnd_{}", gateway_payment_ref),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let payload = br#"{"event":"payment.captured","ref":"pay_123"}"#;
        let secret = "whsec_test";

        let signature = sign_webhook_payload(payload, secret);
        assert!(verify_webhook_signature(payload, &signature, secret));
    }

    #[test]
    fn test_signature_rejects_tampered_payload() {
        let secret = "whsec_test";
        let signature = sign_webhook_payload(b"original", secret);
        assert!(!verify_webhook_signature(b"tampered", &signature, secret));
    }

    #[test]
    fn test_signature_rejects_wrong_secret() {
        let payload = b"payload";
        let signature = sign_webhook_payload(payload, "secret-a");
        assert!(!verify_webhook_signature(payload, &signature, "secret-b"));
    }

    #[test]
    fn test_signature_rejects_malformed_header() {
        assert!(!verify_webhook_signature(b"payload", "not-hex!", "secret"));
        assert!(!verify_webhook_signature(b"payload", "", "secret"));
    }
}
