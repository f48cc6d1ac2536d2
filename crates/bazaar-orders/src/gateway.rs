//! # Payment Gateway
//!
//! The online-payment collaborator: creates remote orders and checks the
//! signature the gateway hands back after the customer pays.
//!
//! ## Flow
//! ```text
//! ┌──────────────┐  create_remote_order   ┌──────────────┐
//! │   Checkout   │ ─────────────────────► │   Gateway    │
//! │   service    │ ◄───────────────────── │   (HTTP)     │
//! └──────┬───────┘   { id: order_Nx.. }   └──────┬───────┘
//!        │                                       │ customer pays
//!        │   verify(order_id, payment_id, sig)   │
//!        │ ◄─────────────────────────────────────┘
//!        ▼
//!  HMAC-SHA256(secret, "order_id|payment_id") == sig ?
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::error::{OrderError, OrderResult};

type HmacSha256 = Hmac<Sha256>;

/// The gateway-side order a payment is made against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
}

/// Creates remote orders on the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// `amount_paise` is in minor units of `currency`.
    async fn create_remote_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
    ) -> OrderResult<RemoteOrder>;
}

// =============================================================================
// HTTP Gateway
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

/// Razorpay-style REST client: `POST {base_url}/orders` with basic auth.
#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(base_url: impl Into<String>, key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        RazorpayGateway {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_remote_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
    ) -> OrderResult<RemoteOrder> {
        let url = format!("{}/orders", self.base_url);
        debug!(url = %url, amount_paise, currency, receipt, "Creating remote order");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody {
                amount: amount_paise,
                currency,
                receipt,
            })
            .send()
            .await
            .map_err(|e| OrderError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Gateway refused order creation");
            return Err(OrderError::Gateway(format!("order creation returned {status}")));
        }

        response
            .json::<RemoteOrder>()
            .await
            .map_err(|e| OrderError::Gateway(format!("unreadable order response: {e}")))
    }
}

// =============================================================================
// Offline Gateway
// =============================================================================

/// In-process gateway that never leaves the machine.
///
/// Used when no gateway credentials are configured, and by tests.
#[derive(Debug, Default)]
pub struct StubGateway {
    counter: AtomicU64,
}

impl StubGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of remote orders created so far.
    pub fn created(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_remote_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
    ) -> OrderResult<RemoteOrder> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(amount_paise, currency, receipt, n, "Stub gateway order");
        Ok(RemoteOrder {
            id: format!("order_stub_{n}"),
        })
    }
}

// =============================================================================
// Signature Verification
// =============================================================================

/// Checks payment signatures with the shared gateway secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    key: HmacSha256,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> OrderResult<Self> {
        let key = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| OrderError::validation(format!("invalid gateway secret: {e}")))?;
        Ok(SignatureVerifier { key })
    }

    fn mac(&self, gateway_order_id: &str, payment_id: &str) -> HmacSha256 {
        let mut mac = self.key.clone();
        mac.update(gateway_order_id.as_bytes());
        mac.update(b"|");
        mac.update(payment_id.as_bytes());
        mac
    }

    /// Hex signature the gateway would send for this payment.
    pub fn sign(&self, gateway_order_id: &str, payment_id: &str) -> String {
        hex::encode(self.mac(gateway_order_id, payment_id).finalize().into_bytes())
    }

    /// Constant-time check of a hex signature.
    pub fn verify(&self, gateway_order_id: &str, payment_id: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(gateway_order_id, payment_id)
            .verify_slice(&expected)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let verifier = SignatureVerifier::new("secret").unwrap();
        let sig = verifier.sign("order_1", "pay_1");
        assert_eq!(sig.len(), 64);
        assert!(verifier.verify("order_1", "pay_1", &sig));
        assert!(verifier.verify("order_1", "pay_1", &sig.to_uppercase()));
    }

    #[test]
    fn test_rejects_tampered_signature() {
        let verifier = SignatureVerifier::new("secret").unwrap();
        let sig = verifier.sign("order_1", "pay_1");
        assert!(!verifier.verify("order_1", "pay_2", &sig));
        assert!(!verifier.verify("order_1", "pay_1", "not-hex"));
        assert!(!verifier.verify("order_1", "pay_1", ""));
        assert!(!SignatureVerifier::new("other").unwrap().verify("order_1", "pay_1", &sig));
    }

    #[tokio::test]
    async fn test_stub_gateway_issues_distinct_ids() {
        let gateway = StubGateway::new();
        let a = gateway.create_remote_order(90_000, "INR", "receipt_1").await.unwrap();
        let b = gateway.create_remote_order(90_000, "INR", "receipt_1").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(gateway.created(), 2);
    }
}
