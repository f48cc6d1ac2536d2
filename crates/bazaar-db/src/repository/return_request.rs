//! # Return Request Repository

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::{ReturnItem, ReturnRequest, ReturnStatus};

const RETURN_COLUMNS: &str = "id, order_id, user_id, reason, status, refund_paise, created_at, resolved_at";

#[derive(Debug, FromRow)]
struct ReturnRecord {
    id: String,
    order_id: String,
    user_id: String,
    reason: String,
    status: ReturnStatus,
    refund_paise: Option<i64>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl ReturnRecord {
    fn with_items(self, items: Vec<ReturnItem>) -> ReturnRequest {
        ReturnRequest {
            id: self.id,
            order_id: self.order_id,
            user_id: self.user_id,
            reason: self.reason,
            items,
            status: self.status,
            refund_paise: self.refund_paise,
            created_at: self.created_at,
            resolved_at: self.resolved_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ReturnRequest>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<ReturnRequest>> {
        let sql = format!("SELECT {RETURN_COLUMNS} FROM return_requests WHERE id = ?1");
        let record = sqlx::query_as::<_, ReturnRecord>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match record {
            Some(record) => {
                let items = Self::items(conn, &record.id).await?;
                Ok(Some(record.with_items(items)))
            }
            None => Ok(None),
        }
    }

    async fn items(conn: &mut SqliteConnection, return_id: &str) -> DbResult<Vec<ReturnItem>> {
        let items = sqlx::query_as::<_, ReturnItem>(
            "SELECT line_id, product_id, quantity FROM return_items WHERE return_id = ?1",
        )
        .bind(return_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(items)
    }

    /// Requests oldest first, optionally by status (admin queue).
    pub async fn list(&self, status: Option<ReturnStatus>) -> DbResult<Vec<ReturnRequest>> {
        let sql = format!(
            "SELECT {RETURN_COLUMNS} FROM return_requests \
             WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at, id"
        );
        let records = sqlx::query_as::<_, ReturnRecord>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        self.with_items(records).await
    }

    /// A user's requests, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<ReturnRequest>> {
        let sql = format!(
            "SELECT {RETURN_COLUMNS} FROM return_requests \
             WHERE user_id = ?1 ORDER BY created_at DESC, id"
        );
        let records = sqlx::query_as::<_, ReturnRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.with_items(records).await
    }

    async fn with_items(&self, records: Vec<ReturnRecord>) -> DbResult<Vec<ReturnRequest>> {
        let mut conn = self.pool.acquire().await?;
        let mut requests = Vec::with_capacity(records.len());
        for record in records {
            let items = Self::items(&mut conn, &record.id).await?;
            requests.push(record.with_items(items));
        }
        Ok(requests)
    }

    pub async fn insert(conn: &mut SqliteConnection, request: &ReturnRequest) -> DbResult<()> {
        debug!(
            id = %request.id,
            order_id = %request.order_id,
            lines = request.items.len(),
            "Inserting return request"
        );

        sqlx::query(
            r#"
            INSERT INTO return_requests (
                id, order_id, user_id, reason, status, refund_paise, created_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&request.id)
        .bind(&request.order_id)
        .bind(&request.user_id)
        .bind(&request.reason)
        .bind(request.status)
        .bind(request.refund_paise)
        .bind(request.created_at)
        .bind(request.resolved_at)
        .execute(&mut *conn)
        .await?;

        for item in &request.items {
            sqlx::query(
                "INSERT INTO return_items (return_id, line_id, product_id, quantity) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&request.id)
            .bind(&item.line_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Stores the approval or rejection.
    ///
    /// ## Errors
    /// `Conflict` when the stored request is no longer pending.
    pub async fn resolve(conn: &mut SqliteConnection, request: &ReturnRequest) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE return_requests SET status = ?2, refund_paise = ?3, resolved_at = ?4
            WHERE id = ?1 AND status = ?5
            "#,
        )
        .bind(&request.id)
        .bind(request.status)
        .bind(request.refund_paise)
        .bind(request.resolved_at)
        .bind(ReturnStatus::Pending)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Return request", &request.id));
        }
        debug!(id = %request.id, status = ?request.status, "Return request resolved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::order::OrderRepository;
    use crate::repository::test_support::{database, product};
    use bazaar_core::types::AddressSnapshot;
    use bazaar_core::{CartItem, CheckoutQuote, Money, Order, PaymentMethod};

    async fn delivered_order(db: &crate::Database) -> Order {
        db.products().insert(&product("p1", 10_000, 5)).await.unwrap();
        let item = CartItem {
            id: "ci".to_string(),
            user_id: "u1".to_string(),
            product_id: "p1".to_string(),
            product_name: "Product p1".to_string(),
            quantity: 1,
            unit_price_paise: 10_000,
            final_price_paise: 10_000,
            added_at: Utc::now(),
        };
        let address = AddressSnapshot {
            address_type: "Home".to_string(),
            name: "Asha".to_string(),
            street: "12 MG Road".to_string(),
            city: "Kochi".to_string(),
            landmark: None,
            state: "Kerala".to_string(),
            pincode: "682001".to_string(),
            phone: "9876543210".to_string(),
        };
        let quote = CheckoutQuote {
            subtotal_paise: 10_000,
            shipping_paise: 5_000,
            coupon_code: None,
            coupon_discount_paise: 0,
            total_paise: 15_000,
        };
        let order = Order::place("u1", &[item], address, &quote, PaymentMethod::Cod).unwrap();
        let mut tx = db.begin().await.unwrap();
        OrderRepository::insert(&mut tx, &order).await.unwrap();
        tx.commit().await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_insert_list_and_resolve_once() {
        let db = database().await;
        let order = delivered_order(&db).await;
        let ids = vec![order.lines[0].id.clone()];
        let mut request = ReturnRequest::open(&order, &ids, "damaged");

        let mut tx = db.begin().await.unwrap();
        ReturnRepository::insert(&mut tx, &request).await.unwrap();
        tx.commit().await.unwrap();

        let pending = db.returns().list(Some(ReturnStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].items.len(), 1);
        assert_eq!(db.returns().list_for_user("u1").await.unwrap().len(), 1);

        let stale = request.clone();
        request.approve(Money::from_rupees(150), Utc::now()).unwrap();
        let mut tx = db.begin().await.unwrap();
        ReturnRepository::resolve(&mut tx, &request).await.unwrap();
        tx.commit().await.unwrap();

        let mut again = stale;
        again.reject(Utc::now()).unwrap();
        let mut tx = db.begin().await.unwrap();
        assert!(matches!(
            ReturnRepository::resolve(&mut tx, &again).await,
            Err(DbError::Conflict { .. })
        ));
        drop(tx);

        let stored = db.returns().get_by_id(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReturnStatus::Approved);
        assert_eq!(stored.refund_paise, Some(15_000));
        assert!(db.returns().list(Some(ReturnStatus::Pending)).await.unwrap().is_empty());
    }
}
