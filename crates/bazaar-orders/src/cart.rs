//! # Cart Service
//!
//! Cart lines hold stock. Adding moves units from *available* to *reserved*,
//! removing moves them back, and placing an order takes them off the shelf.
//!
//! ```text
//!   stock = 5, reserved = 0          available 5
//!   add(p1, 2)      reserved = 2     available 3
//!   update(p1, -1)  reserved = 1     available 4
//!   place order     stock = 4, reserved = 0
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use bazaar_core::pricing::best_price;
use bazaar_core::validation::validate_quantity;
use bazaar_core::{Cart, CartItem, CheckoutPolicy, CheckoutQuote, MAX_ITEM_QUANTITY};
use bazaar_db::{
    with_retry, CartRepository, Database, OfferRepository, ProductRepository, RetryPolicy,
};

use crate::error::{OrderError, OrderResult};

/// A cart with its price summary. `quote` is absent for an empty cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub item_count: i64,
    pub quote: Option<CheckoutQuote>,
}

#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
    policy: CheckoutPolicy,
    retry: RetryPolicy,
}

impl CartService {
    pub fn new(db: Database, policy: CheckoutPolicy, retry: RetryPolicy) -> Self {
        CartService { db, policy, retry }
    }

    pub async fn view(&self, user_id: &str) -> OrderResult<CartView> {
        let cart = self.db.carts().get(user_id).await?;
        let quote = if cart.is_empty() {
            None
        } else {
            Some(self.policy.quote(cart.subtotal(), None, Utc::now())?)
        };
        Ok(CartView {
            item_count: cart.item_count(),
            cart,
            quote,
        })
    }

    /// Units across all lines.
    pub async fn count(&self, user_id: &str) -> OrderResult<i64> {
        Ok(self.db.carts().count(user_id).await?)
    }

    /// Adds `quantity` units, merging with an existing line.
    ///
    /// The line's price is re-captured at the current best offer.
    pub async fn add_item(&self, user_id: &str, product_id: &str, quantity: i64) -> OrderResult<Cart> {
        validate_quantity(quantity)?;
        with_retry("cart_add", self.retry, move || {
            self.add_item_once(user_id, product_id, quantity)
        })
        .await
    }

    async fn add_item_once(&self, user_id: &str, product_id: &str, quantity: i64) -> OrderResult<Cart> {
        let mut tx = self.db.begin().await?;

        let product = ProductRepository::find(&mut tx, product_id)
            .await?
            .filter(|p| p.is_listed)
            .ok_or_else(|| OrderError::not_found("Product", product_id))?;

        let existing = CartRepository::find_item(&mut tx, user_id, product_id).await?;
        let total = existing.as_ref().map_or(0, |i| i.quantity) + quantity;
        if total > MAX_ITEM_QUANTITY {
            return Err(OrderError::validation(format!(
                "at most {MAX_ITEM_QUANTITY} units of {} per order",
                product.name
            )));
        }

        if !ProductRepository::reserve(&mut tx, product_id, quantity).await? {
            return Err(OrderError::InsufficientStock {
                product: product.name.clone(),
                available: product.available(),
                requested: quantity,
            });
        }

        let now = Utc::now();
        let offers = OfferRepository::find_for_product(&mut tx, &product).await?;
        let price = best_price(&product, &offers, now);

        let item = CartItem {
            id: existing
                .as_ref()
                .map_or_else(|| Uuid::new_v4().to_string(), |i| i.id.clone()),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            product_name: product.name.clone(),
            quantity: total,
            unit_price_paise: price.original_price_paise,
            final_price_paise: price.final_price_paise,
            added_at: existing.as_ref().map_or(now, |i| i.added_at),
        };
        CartRepository::upsert_item(&mut tx, &item).await?;

        let cart = CartRepository::load(&mut tx, user_id).await?;
        tx.commit().await?;

        info!(user_id = %user_id, product_id = %product_id, quantity = total, "Added to cart");
        Ok(cart)
    }

    /// Changes a line's quantity by `delta`; the result must stay in 1..=10.
    pub async fn update_quantity(&self, user_id: &str, product_id: &str, delta: i64) -> OrderResult<Cart> {
        if delta == 0 {
            return Err(OrderError::validation("quantity change must not be zero"));
        }
        with_retry("cart_update", self.retry, move || {
            self.update_quantity_once(user_id, product_id, delta)
        })
        .await
    }

    async fn update_quantity_once(&self, user_id: &str, product_id: &str, delta: i64) -> OrderResult<Cart> {
        let mut tx = self.db.begin().await?;
        let mut item = Self::existing(&mut tx, user_id, product_id).await?;

        let quantity = item.quantity + delta;
        validate_quantity(quantity)?;

        if delta > 0 {
            if !ProductRepository::reserve(&mut tx, product_id, delta).await? {
                let available = ProductRepository::find(&mut tx, product_id)
                    .await?
                    .map_or(0, |p| p.available());
                return Err(OrderError::InsufficientStock {
                    product: item.product_name.clone(),
                    available,
                    requested: delta,
                });
            }
        } else {
            ProductRepository::release(&mut tx, product_id, -delta).await?;
        }

        item.quantity = quantity;
        CartRepository::upsert_item(&mut tx, &item).await?;

        let cart = CartRepository::load(&mut tx, user_id).await?;
        tx.commit().await?;

        debug!(user_id = %user_id, product_id = %product_id, quantity, "Cart quantity changed");
        Ok(cart)
    }

    /// Removes a line and releases its units.
    pub async fn remove_item(&self, user_id: &str, product_id: &str) -> OrderResult<Cart> {
        with_retry("cart_remove", self.retry, move || {
            self.remove_item_once(user_id, product_id)
        })
        .await
    }

    async fn remove_item_once(&self, user_id: &str, product_id: &str) -> OrderResult<Cart> {
        let mut tx = self.db.begin().await?;
        let item = Self::existing(&mut tx, user_id, product_id).await?;

        ProductRepository::release(&mut tx, product_id, item.quantity).await?;
        CartRepository::delete_item(&mut tx, user_id, product_id).await?;

        let cart = CartRepository::load(&mut tx, user_id).await?;
        tx.commit().await?;

        info!(user_id = %user_id, product_id = %product_id, "Removed from cart");
        Ok(cart)
    }

    async fn existing(conn: &mut SqliteConnection, user_id: &str, product_id: &str) -> OrderResult<CartItem> {
        CartRepository::find_item(conn, user_id, product_id)
            .await?
            .ok_or_else(|| OrderError::not_found("Cart item", product_id))
    }
}
