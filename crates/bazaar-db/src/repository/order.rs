//! # Order Repository
//!
//! Orders with their lines.
//!
//! ## Optimistic Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Writer A                         Writer B                              │
//! │  find(o1) → version 3             find(o1) → version 3                  │
//! │  cancel line, refund wallet       admin toggle → Shipped                │
//! │  UPDATE ... WHERE version = 3 ✓   UPDATE ... WHERE version = 3 ✗ (0 rows)│
//! │  commit                           DbError::Conflict → retry from find   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every order mutation goes through [`OrderRepository::update`], so a lost
//! race always surfaces as [`DbError::Conflict`] and the whole transaction
//! (refunds and restocks included) rolls back.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::types::AddressSnapshot;
use bazaar_core::{Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus};

const ORDER_COLUMNS: &str = "id, user_id, status, address_json, subtotal_paise, shipping_paise, \
     coupon_code, coupon_discount_paise, offer_savings_paise, order_amount_paise, refunded_paise, \
     payment_method, payment_status, gateway_order_id, gateway_payment_id, gateway_signature, \
     cancellation_reason, cancelled_at, return_reason, return_requested_at, delivered_at, \
     created_at, updated_at, version";

const LINE_COLUMNS: &str = "id, order_id, position, product_id, product_name, quantity, \
     unit_price_paise, final_price_paise, total_paise, status, cancellation_reason";

#[derive(Debug, FromRow)]
struct OrderRecord {
    id: String,
    user_id: String,
    status: OrderStatus,
    address_json: String,
    subtotal_paise: i64,
    shipping_paise: i64,
    coupon_code: Option<String>,
    coupon_discount_paise: i64,
    offer_savings_paise: i64,
    order_amount_paise: i64,
    refunded_paise: i64,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    cancellation_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    return_reason: Option<String>,
    return_requested_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl OrderRecord {
    fn into_order(self, lines: Vec<OrderLine>) -> DbResult<Order> {
        let address: AddressSnapshot = serde_json::from_str(&self.address_json)
            .map_err(|e| DbError::corrupt("Order address", e))?;

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            lines,
            status: self.status,
            address,
            subtotal_paise: self.subtotal_paise,
            shipping_paise: self.shipping_paise,
            coupon_code: self.coupon_code,
            coupon_discount_paise: self.coupon_discount_paise,
            offer_savings_paise: self.offer_savings_paise,
            order_amount_paise: self.order_amount_paise,
            refunded_paise: self.refunded_paise,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            gateway_signature: self.gateway_signature,
            cancellation_reason: self.cancellation_reason,
            cancelled_at: self.cancelled_at,
            return_reason: self.return_reason,
            return_requested_at: self.return_requested_at,
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

/// Admin listing filter.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match record {
            Some(record) => Ok(Some(Self::hydrate(conn, record).await?)),
            None => Ok(None),
        }
    }

    /// Looks an order up by the payment gateway's order id.
    pub async fn find_by_gateway_order(
        conn: &mut SqliteConnection,
        gateway_order_id: &str,
    ) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_order_id = ?1");
        let record = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(gateway_order_id)
            .fetch_optional(&mut *conn)
            .await?;

        match record {
            Some(record) => Ok(Some(Self::hydrate(conn, record).await?)),
            None => Ok(None),
        }
    }

    /// A user's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, id"
        );
        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.hydrate_all(records).await
    }

    /// All orders, newest first, optionally by status.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE (?1 IS NULL OR status = ?1) \
             ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
        );
        let records = sqlx::query_as::<_, OrderRecord>(&sql)
            .bind(filter.status)
            .bind(filter.limit.map(i64::from).unwrap_or(-1))
            .bind(filter.offset.unwrap_or(0))
            .fetch_all(&self.pool)
            .await?;

        debug!(count = records.len(), status = ?filter.status, "Listed orders");
        self.hydrate_all(records).await
    }

    async fn hydrate(conn: &mut SqliteConnection, record: OrderRecord) -> DbResult<Order> {
        let sql = format!("SELECT {LINE_COLUMNS} FROM order_lines WHERE order_id = ?1 ORDER BY position");
        let lines = sqlx::query_as::<_, OrderLine>(&sql)
            .bind(&record.id)
            .fetch_all(&mut *conn)
            .await?;
        record.into_order(lines)
    }

    async fn hydrate_all(&self, records: Vec<OrderRecord>) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let mut orders = Vec::with_capacity(records.len());
        for record in records {
            orders.push(Self::hydrate(&mut conn, record).await?);
        }
        Ok(orders)
    }

    // =========================================================================
    // Writes (transactional)
    // =========================================================================

    /// Inserts an order and all of its lines.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(
            id = %order.id,
            user_id = %order.user_id,
            lines = order.lines.len(),
            amount = order.order_amount_paise,
            "Inserting order"
        );

        let address_json = serde_json::to_string(&order.address)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, status, address_json, subtotal_paise, shipping_paise,
                coupon_code, coupon_discount_paise, offer_savings_paise,
                order_amount_paise, refunded_paise, payment_method, payment_status,
                gateway_order_id, gateway_payment_id, gateway_signature,
                cancellation_reason, cancelled_at, return_reason, return_requested_at,
                delivered_at, created_at, updated_at, version
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(&address_json)
        .bind(order.subtotal_paise)
        .bind(order.shipping_paise)
        .bind(&order.coupon_code)
        .bind(order.coupon_discount_paise)
        .bind(order.offer_savings_paise)
        .bind(order.order_amount_paise)
        .bind(order.refunded_paise)
        .bind(order.payment_method)
        .bind(order.payment_status)
        .bind(&order.gateway_order_id)
        .bind(&order.gateway_payment_id)
        .bind(&order.gateway_signature)
        .bind(&order.cancellation_reason)
        .bind(order.cancelled_at)
        .bind(&order.return_reason)
        .bind(order.return_requested_at)
        .bind(order.delivered_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.version)
        .execute(&mut *conn)
        .await?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_lines (
                    id, order_id, position, product_id, product_name, quantity,
                    unit_price_paise, final_price_paise, total_paise, status,
                    cancellation_reason
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&line.id)
            .bind(&order.id)
            .bind(line.position)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price_paise)
            .bind(line.final_price_paise)
            .bind(line.total_paise)
            .bind(line.status)
            .bind(&line.cancellation_reason)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Writes back every mutable field of the order and its lines.
    ///
    /// The row must still carry `order.version`; on success the stored and
    /// in-memory versions are both bumped.
    ///
    /// ## Errors
    /// - `NotFound` when the order doesn't exist
    /// - `Conflict` when another writer updated it first
    pub async fn update(conn: &mut SqliteConnection, order: &mut Order) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                status = ?3,
                order_amount_paise = ?4,
                refunded_paise = ?5,
                payment_status = ?6,
                gateway_order_id = ?7,
                gateway_payment_id = ?8,
                gateway_signature = ?9,
                cancellation_reason = ?10,
                cancelled_at = ?11,
                return_reason = ?12,
                return_requested_at = ?13,
                delivered_at = ?14,
                updated_at = ?15,
                version = version + 1
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&order.id)
        .bind(order.version)
        .bind(order.status)
        .bind(order.order_amount_paise)
        .bind(order.refunded_paise)
        .bind(order.payment_status)
        .bind(&order.gateway_order_id)
        .bind(&order.gateway_payment_id)
        .bind(&order.gateway_signature)
        .bind(&order.cancellation_reason)
        .bind(order.cancelled_at)
        .bind(&order.return_reason)
        .bind(order.return_requested_at)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = ?1)")
                .bind(&order.id)
                .fetch_one(&mut *conn)
                .await?;
            return Err(if exists {
                DbError::conflict("Order", &order.id)
            } else {
                DbError::not_found("Order", &order.id)
            });
        }

        for line in &order.lines {
            sqlx::query(
                "UPDATE order_lines SET status = ?2, cancellation_reason = ?3 WHERE id = ?1",
            )
            .bind(&line.id)
            .bind(line.status)
            .bind(&line.cancellation_reason)
            .execute(&mut *conn)
            .await?;
        }

        order.version += 1;
        debug!(id = %order.id, status = %order.status, version = order.version, "Order updated");
        Ok(())
    }

    /// Discards a user's online-payment orders that were never paid and are
    /// older than `cutoff`.
    pub async fn delete_stale_gateway_orders(
        conn: &mut SqliteConnection,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM orders
            WHERE user_id = ?1
              AND payment_method = ?2
              AND payment_status != ?3
              AND status = ?4
              AND created_at < ?5
            "#,
        )
        .bind(user_id)
        .bind(PaymentMethod::Gateway)
        .bind(PaymentStatus::Paid)
        .bind(OrderStatus::Pending)
        .bind(cutoff)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            debug!(user_id = %user_id, deleted = result.rows_affected(), "Discarded stale gateway orders");
        }
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, product};
    use bazaar_core::{CartItem, CheckoutQuote, LineStatus};
    use chrono::Duration;

    fn address() -> AddressSnapshot {
        AddressSnapshot {
            address_type: "Home".to_string(),
            name: "Asha".to_string(),
            street: "12 MG Road".to_string(),
            city: "Kochi".to_string(),
            landmark: Some("Near the ferry".to_string()),
            state: "Kerala".to_string(),
            pincode: "682001".to_string(),
            phone: "9876543210".to_string(),
        }
    }

    fn new_order(user_id: &str, method: PaymentMethod) -> Order {
        let items: Vec<CartItem> = ["p1", "p2"]
            .iter()
            .map(|p| CartItem {
                id: format!("ci-{p}"),
                user_id: user_id.to_string(),
                product_id: p.to_string(),
                product_name: format!("Product {p}"),
                quantity: 1,
                unit_price_paise: 20_000,
                final_price_paise: 20_000,
                added_at: Utc::now(),
            })
            .collect();
        let quote = CheckoutQuote {
            subtotal_paise: 40_000,
            shipping_paise: 5_000,
            coupon_code: None,
            coupon_discount_paise: 0,
            total_paise: 45_000,
        };
        Order::place(user_id, &items, address(), &quote, method).unwrap()
    }

    async fn seeded() -> crate::Database {
        let db = database().await;
        db.products().insert(&product("p1", 20_000, 5)).await.unwrap();
        db.products().insert(&product("p2", 20_000, 5)).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_insert_and_find_round_trip() {
        let db = seeded().await;
        let order = new_order("u1", PaymentMethod::Cod);

        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();

        let found = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(found.lines.len(), 2);
        assert_eq!(found.lines[0].position, 0);
        assert_eq!(found.address, order.address);
        assert_eq!(found.status, OrderStatus::Processing);
        assert_eq!(found.order_amount_paise, 45_000);
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_detects_conflict() {
        let db = seeded().await;
        let order = new_order("u1", PaymentMethod::Cod);
        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();

        let mut first = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        let mut second = first.clone();

        let line_id = first.lines[0].id.clone();
        first.cancel_line(&line_id, "changed my mind", Utc::now()).unwrap();
        let mut tx = db.begin().await.unwrap();
        OrderRepository::update(&mut tx, &mut first).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(first.version, 1);

        second.advance(OrderStatus::Shipped, Utc::now()).unwrap();
        let mut tx = db.begin().await.unwrap();
        assert!(matches!(
            OrderRepository::update(&mut tx, &mut second).await,
            Err(DbError::Conflict { .. })
        ));
        drop(tx);

        let stored = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, OrderStatus::Processing);
        assert_eq!(stored.lines[0].status, LineStatus::Cancelled);
        assert_eq!(stored.order_amount_paise + stored.refunded_paise, 45_000);
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let db = seeded().await;
        let cod = new_order("u1", PaymentMethod::Cod);
        let online = new_order("u2", PaymentMethod::Gateway);

        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &cod).await.unwrap();
        OrderRepository::insert(&mut tx, &online).await.unwrap();
        tx.commit().await.unwrap();

        let all = db.orders().list(&OrderFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let pending = db
            .orders()
            .list(&OrderFilter {
                status: Some(OrderStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, online.id);

        assert_eq!(db.orders().list_for_user("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_lookup_and_stale_cleanup() {
        let db = seeded().await;
        let mut stale = new_order("u1", PaymentMethod::Gateway);
        stale.gateway_order_id = Some("order_stale".to_string());
        stale.created_at = Utc::now() - Duration::hours(30);
        let mut fresh = new_order("u1", PaymentMethod::Gateway);
        fresh.gateway_order_id = Some("order_fresh".to_string());

        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &stale).await.unwrap();
        OrderRepository::insert(&mut tx, &fresh).await.unwrap();

        let found = OrderRepository::find_by_gateway_order(&mut tx, "order_fresh")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, fresh.id);

        let cutoff = Utc::now() - Duration::hours(24);
        let deleted = OrderRepository::delete_stale_gateway_orders(&mut tx, "u1", cutoff)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(OrderRepository::find(&mut tx, &stale.id).await.unwrap().is_none());
        tx.commit().await.unwrap();
    }
}
