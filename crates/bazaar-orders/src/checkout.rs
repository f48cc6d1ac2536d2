//! # Checkout
//!
//! Turns a cart into an order.
//!
//! ## Payment Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           place_order                                   │
//! │                                                                         │
//! │  COD / Wallet ── one transaction ─────────────────────────────────────  │
//! │     quote + coupon check → commit stock → debit wallet → record coupon  │
//! │     → insert order → clear cart → COMMIT → send confirmation            │
//! │                                                                         │
//! │  Gateway ── two steps ────────────────────────────────────────────────  │
//! │     1. drop stale unpaid orders, quote, create remote order, insert     │
//! │        order (payment pending) + record coupon. Stock untouched.        │
//! │     2. verify_payment: signature ok → paid, commit stock, clear cart    │
//! │        order cancelled or out of stock → payment credited to wallet     │
//! │        signature bad → PaymentVerificationFailed, nothing changes       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transaction is retried as a whole on transient failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};

use bazaar_core::coupon::normalize_code;
use bazaar_core::{
    Address, Cart, CheckoutQuote, Coupon, CouponError, Money, Order, OrderStatus, PaymentCapture,
    PaymentMethod,
};
use bazaar_db::{
    with_retry, AddressRepository, CartRepository, CouponRepository, Database, DebitOutcome,
    OrderRepository, WalletRepository,
};

use crate::error::{OrderError, OrderResult};
use crate::gateway::{PaymentGateway, SignatureVerifier};
use crate::notify::{self, Notifier};
use crate::settlement;
use crate::ServiceConfig;

/// The signed-in customer an order is placed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRef {
    pub user_id: String,
    pub email: String,
}

impl CustomerRef {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        CustomerRef {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub address_id: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// What the client needs to open the gateway's payment form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub order_id: String,
    pub gateway_order_id: String,
    pub amount_paise: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: Order,
    /// Present for gateway orders awaiting payment.
    pub payment: Option<PaymentRequest>,
}

/// The gateway's callback after the customer paid.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub gateway_order_id: String,
    pub payment_id: String,
    pub signature: String,
}

struct PricedCart {
    cart: Cart,
    coupon: Option<Coupon>,
    quote: CheckoutQuote,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    config: ServiceConfig,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    notifier: Arc<dyn Notifier>,
}

impl CheckoutService {
    pub fn new(
        db: Database,
        config: ServiceConfig,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        CheckoutService {
            db,
            config,
            gateway,
            verifier,
            notifier,
        }
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Prices the cart with an optional coupon without changing anything.
    pub async fn quote(&self, user_id: &str, coupon_code: Option<&str>) -> OrderResult<CheckoutQuote> {
        let mut conn = self.db.pool().acquire().await?;
        let priced = self.price_cart(&mut conn, user_id, coupon_code, Utc::now()).await?;
        Ok(priced.quote)
    }

    /// Coupons the user could apply to the current cart.
    pub async fn available_coupons(&self, user_id: &str) -> OrderResult<Vec<Coupon>> {
        let subtotal = self.db.carts().get(user_id).await?.subtotal();
        let coupons = self
            .db
            .coupons()
            .available_for_user(user_id, Utc::now())
            .await?
            .into_iter()
            .filter(|c| subtotal >= c.minimum())
            .collect();
        Ok(coupons)
    }

    // =========================================================================
    // Placement
    // =========================================================================

    pub async fn place_order(&self, customer: &CustomerRef, request: &PlaceOrderRequest) -> OrderResult<PlacedOrder> {
        match request.payment_method {
            PaymentMethod::Gateway => self.start_gateway_payment(customer, request).await,
            PaymentMethod::Cod | PaymentMethod::Wallet => {
                let user_id = customer.user_id.as_str();
                let order = with_retry("place_order", self.config.retry, move || {
                    self.place_settled_once(user_id, request)
                })
                .await?;

                info!(
                    order_id = %order.id,
                    user_id = %order.user_id,
                    method = order.payment_method.as_str(),
                    total = %order.order_amount(),
                    "Order placed"
                );
                notify::confirm(self.notifier.as_ref(), &customer.email, &order).await;
                Ok(PlacedOrder { order, payment: None })
            }
        }
    }

    /// COD and wallet orders: everything in one transaction.
    async fn place_settled_once(&self, user_id: &str, request: &PlaceOrderRequest) -> OrderResult<Order> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let address = Self::address(&mut tx, user_id, &request.address_id).await?;
        let priced = self
            .price_cart(&mut tx, user_id, request.coupon_code.as_deref(), now)
            .await?;
        self.config
            .checkout
            .ensure_method_allowed(request.payment_method, &priced.quote)?;

        let order = Order::place(
            user_id,
            &priced.cart.items,
            address.snapshot(),
            &priced.quote,
            request.payment_method,
        )?;

        settlement::clear_cart(&mut tx, &priced.cart).await?;
        settlement::commit_stock(&mut tx, &order).await?;

        let total = priced.quote.total();
        if request.payment_method == PaymentMethod::Wallet && total.is_positive() {
            let description = format!("Payment for order {}", order.id);
            if let DebitOutcome::Insufficient { balance } =
                WalletRepository::debit(&mut tx, user_id, total, &description).await?
            {
                return Err(OrderError::InsufficientFunds {
                    available: balance,
                    required: total,
                });
            }
        }

        if let Some(coupon) = &priced.coupon {
            Self::record_coupon(&mut tx, coupon, user_id).await?;
        }
        OrderRepository::insert(&mut tx, &order).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Gateway orders: stored unpaid against a fresh remote order.
    async fn start_gateway_payment(&self, customer: &CustomerRef, request: &PlaceOrderRequest) -> OrderResult<PlacedOrder> {
        let user_id = customer.user_id.as_str();
        let now = Utc::now();

        let quote = with_retry("checkout_prepare", self.config.retry, move || {
            self.prepare_gateway_once(user_id, request, now)
        })
        .await?;
        if !quote.total().is_positive() {
            return Err(OrderError::validation(
                "nothing to pay online, choose another payment method",
            ));
        }

        let receipt = format!("receipt_{}", now.timestamp());
        let remote = self
            .gateway
            .create_remote_order(quote.total_paise, &self.config.currency, &receipt)
            .await?;

        let remote_id = remote.id.as_str();
        let quote_ref = &quote;
        let order = with_retry("checkout_gateway", self.config.retry, move || {
            self.insert_gateway_order_once(user_id, request, remote_id, quote_ref)
        })
        .await?;

        info!(
            order_id = %order.id,
            gateway_order_id = %remote.id,
            total = %order.order_amount(),
            "Awaiting online payment"
        );
        let payment = PaymentRequest {
            order_id: order.id.clone(),
            gateway_order_id: remote.id.clone(),
            amount_paise: quote.total_paise,
            currency: self.config.currency.clone(),
        };
        Ok(PlacedOrder {
            order,
            payment: Some(payment),
        })
    }

    async fn prepare_gateway_once(
        &self,
        user_id: &str,
        request: &PlaceOrderRequest,
        now: DateTime<Utc>,
    ) -> OrderResult<CheckoutQuote> {
        let mut tx = self.db.begin().await?;

        let cutoff = now - self.config.pending_order_ttl;
        OrderRepository::delete_stale_gateway_orders(&mut tx, user_id, cutoff).await?;

        Self::address(&mut tx, user_id, &request.address_id).await?;
        let priced = self
            .price_cart(&mut tx, user_id, request.coupon_code.as_deref(), now)
            .await?;
        self.config
            .checkout
            .ensure_method_allowed(PaymentMethod::Gateway, &priced.quote)?;

        tx.commit().await?;
        Ok(priced.quote)
    }

    async fn insert_gateway_order_once(
        &self,
        user_id: &str,
        request: &PlaceOrderRequest,
        gateway_order_id: &str,
        expected: &CheckoutQuote,
    ) -> OrderResult<Order> {
        let mut tx = self.db.begin().await?;

        let address = Self::address(&mut tx, user_id, &request.address_id).await?;
        let priced = self
            .price_cart(&mut tx, user_id, request.coupon_code.as_deref(), Utc::now())
            .await?;
        if priced.quote != *expected {
            return Err(OrderError::validation("cart changed during checkout, please try again"));
        }

        let mut order = Order::place(
            user_id,
            &priced.cart.items,
            address.snapshot(),
            &priced.quote,
            PaymentMethod::Gateway,
        )?;
        order.gateway_order_id = Some(gateway_order_id.to_string());

        if let Some(coupon) = &priced.coupon {
            Self::record_coupon(&mut tx, coupon, user_id).await?;
        }
        OrderRepository::insert(&mut tx, &order).await?;

        tx.commit().await?;
        Ok(order)
    }

    // =========================================================================
    // Gateway callbacks
    // =========================================================================

    /// Confirms an online payment after checking its signature.
    ///
    /// A payment for an order that was cancelled in the meantime, or whose
    /// stock is gone, is still recorded and credited to the wallet.
    pub async fn verify_payment(&self, customer: &CustomerRef, confirmation: &PaymentConfirmation) -> OrderResult<Order> {
        if !self.verifier.verify(
            &confirmation.gateway_order_id,
            &confirmation.payment_id,
            &confirmation.signature,
        ) {
            warn!(
                gateway_order_id = %confirmation.gateway_order_id,
                user_id = %customer.user_id,
                "Payment signature mismatch"
            );
            return Err(OrderError::PaymentVerificationFailed {
                gateway_order_id: confirmation.gateway_order_id.clone(),
            });
        }

        let user_id = customer.user_id.as_str();
        let (order, refunded) = with_retry("verify_payment", self.config.retry, move || {
            self.confirm_payment_once(user_id, confirmation)
        })
        .await?;

        match refunded {
            Some(amount) => warn!(
                order_id = %order.id,
                payment_id = %confirmation.payment_id,
                refunded = %amount,
                "Payment received for a cancelled order, refunded to wallet"
            ),
            None => {
                info!(
                    order_id = %order.id,
                    payment_id = %confirmation.payment_id,
                    "Online payment verified"
                );
                notify::confirm(self.notifier.as_ref(), &customer.email, &order).await;
            }
        }
        Ok(order)
    }

    async fn confirm_payment_once(
        &self,
        user_id: &str,
        confirmation: &PaymentConfirmation,
    ) -> OrderResult<(Order, Option<Money>)> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let mut order = Self::gateway_order(&mut tx, user_id, &confirmation.gateway_order_id).await?;
        let cart = CartRepository::load(&mut tx, user_id).await?;

        if order.status == OrderStatus::Pending {
            if let Some(shortfall) = settlement::stock_shortfall(&mut tx, &order, &cart).await? {
                warn!(order_id = %order.id, error = %shortfall, "Paid order cannot be fulfilled");
                order.cancel("Out of stock when payment arrived", now)?;
            }
        }

        let refunded = match order.confirm_payment(&confirmation.payment_id, &confirmation.signature, now)? {
            PaymentCapture::Fulfil => {
                settlement::clear_cart(&mut tx, &cart).await?;
                settlement::commit_stock(&mut tx, &order).await?;
                None
            }
            PaymentCapture::Refund(amount) => {
                if amount.is_positive() {
                    let description = format!("Refund of payment for cancelled order {}", order.id);
                    WalletRepository::credit(&mut tx, user_id, amount, &description).await?;
                }
                Some(amount)
            }
        };
        OrderRepository::update(&mut tx, &mut order).await?;

        tx.commit().await?;
        Ok((order, refunded))
    }

    /// The customer dismissed the payment form or the gateway declined.
    pub async fn mark_payment_failed(&self, user_id: &str, gateway_order_id: &str) -> OrderResult<Order> {
        let order = with_retry("payment_failed", self.config.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let mut order = Self::gateway_order(&mut tx, user_id, gateway_order_id).await?;
            order.fail_payment(Utc::now())?;
            OrderRepository::update(&mut tx, &mut order).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(order)
        })
        .await?;

        warn!(order_id = %order.id, gateway_order_id = %gateway_order_id, "Online payment failed");
        Ok(order)
    }

    /// Opens a new remote order for a failed online payment.
    pub async fn retry_payment(&self, user_id: &str, order_id: &str) -> OrderResult<PaymentRequest> {
        let now = Utc::now();
        let mut preview = self
            .db
            .orders()
            .get_by_id(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| OrderError::not_found("Order", order_id))?;
        // Fail before contacting the gateway if the order cannot be retried
        preview.retry_payment("", now)?;

        let receipt = format!("receipt_{}", now.timestamp());
        let remote = self
            .gateway
            .create_remote_order(preview.order_amount_paise, &self.config.currency, &receipt)
            .await?;

        let remote_id = remote.id.as_str();
        let order = with_retry("retry_payment", self.config.retry, move || async move {
            let mut tx = self.db.begin().await?;
            let mut order = OrderRepository::find(&mut tx, order_id)
                .await?
                .filter(|o| o.user_id == user_id)
                .ok_or_else(|| OrderError::not_found("Order", order_id))?;
            order.retry_payment(remote_id, Utc::now())?;
            OrderRepository::update(&mut tx, &mut order).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(order)
        })
        .await?;

        info!(order_id = %order.id, gateway_order_id = %remote.id, "Online payment reopened");
        Ok(PaymentRequest {
            order_id: order.id,
            gateway_order_id: remote.id,
            amount_paise: order.order_amount_paise,
            currency: self.config.currency.clone(),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn price_cart(
        &self,
        conn: &mut SqliteConnection,
        user_id: &str,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> OrderResult<PricedCart> {
        let cart = CartRepository::load(conn, user_id).await?;
        if cart.is_empty() {
            return Err(OrderError::validation("cart is empty"));
        }

        let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let coupon = CouponRepository::find_by_code(conn, code)
                    .await?
                    .ok_or_else(|| CouponError::Unknown(normalize_code(code)))?;
                let usage = CouponRepository::user_usage(conn, &coupon.id, user_id).await?;
                Some((coupon, usage))
            }
            None => None,
        };

        let quote = self.config.checkout.quote(
            cart.subtotal(),
            coupon.as_ref().map(|(c, usage)| (c, *usage)),
            now,
        )?;
        Ok(PricedCart {
            cart,
            coupon: coupon.map(|(c, _)| c),
            quote,
        })
    }

    async fn address(conn: &mut SqliteConnection, user_id: &str, address_id: &str) -> OrderResult<Address> {
        AddressRepository::find_for_user(conn, user_id, address_id)
            .await?
            .ok_or_else(|| OrderError::validation(format!("address {address_id} not found")))
    }

    async fn gateway_order(conn: &mut SqliteConnection, user_id: &str, gateway_order_id: &str) -> OrderResult<Order> {
        OrderRepository::find_by_gateway_order(conn, gateway_order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| OrderError::not_found("Order", gateway_order_id))
    }

    /// Counts the redemption, failing if a concurrent checkout used the last one.
    async fn record_coupon(conn: &mut SqliteConnection, coupon: &Coupon, user_id: &str) -> OrderResult<()> {
        if !CouponRepository::record_usage(conn, coupon, user_id).await? {
            return Err(CouponError::UsageLimitReached(coupon.code.clone()).into());
        }
        Ok(())
    }
}
