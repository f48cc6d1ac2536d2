//! # Cart Repository
//!
//! One row per (user, product). Prices are captured when the line is added
//! or changed; the product name is always read live.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bazaar_core::{Cart, CartItem};

const CART_SELECT: &str = r#"
    SELECT c.id, c.user_id, c.product_id, p.name AS product_name, c.quantity,
           c.unit_price_paise, c.final_price_paise, c.added_at
    FROM cart_items c
    INNER JOIN products p ON p.id = c.product_id
"#;

#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// The user's cart, oldest line first. Missing carts are empty.
    pub async fn get(&self, user_id: &str) -> DbResult<Cart> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut conn, user_id).await
    }

    pub async fn load(conn: &mut SqliteConnection, user_id: &str) -> DbResult<Cart> {
        let sql = format!("{CART_SELECT} WHERE c.user_id = ?1 ORDER BY c.added_at, c.id");
        let items = sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(Cart {
            user_id: user_id.to_string(),
            items,
        })
    }

    pub async fn find_item(
        conn: &mut SqliteConnection,
        user_id: &str,
        product_id: &str,
    ) -> DbResult<Option<CartItem>> {
        let sql = format!("{CART_SELECT} WHERE c.user_id = ?1 AND c.product_id = ?2");
        let item = sqlx::query_as::<_, CartItem>(&sql)
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(item)
    }

    /// Inserts the line or overwrites quantity and prices of the existing one.
    pub async fn upsert_item(conn: &mut SqliteConnection, item: &CartItem) -> DbResult<()> {
        debug!(
            user_id = %item.user_id,
            product_id = %item.product_id,
            quantity = item.quantity,
            "Saving cart line"
        );

        sqlx::query(
            r#"
            INSERT INTO cart_items (
                id, user_id, product_id, quantity,
                unit_price_paise, final_price_paise, added_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (user_id, product_id) DO UPDATE SET
                quantity = excluded.quantity,
                unit_price_paise = excluded.unit_price_paise,
                final_price_paise = excluded.final_price_paise
            "#,
        )
        .bind(&item.id)
        .bind(&item.user_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_paise)
        .bind(item.final_price_paise)
        .bind(item.added_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Removes one line. Returns whether it existed.
    pub async fn delete_item(
        conn: &mut SqliteConnection,
        user_id: &str,
        product_id: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1 AND product_id = ?2")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Empties the cart.
    pub async fn clear(conn: &mut SqliteConnection, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        debug!(user_id = %user_id, lines = result.rows_affected(), "Cart cleared");
        Ok(result.rows_affected())
    }

    /// Total units across all lines (the header badge).
    pub async fn count(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM cart_items WHERE user_id = ?1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, product};
    use chrono::Utc;

    fn item(user_id: &str, product_id: &str, quantity: i64) -> CartItem {
        CartItem {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            product_name: String::new(),
            quantity,
            unit_price_paise: 10_000,
            final_price_paise: 9_000,
            added_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_quantity() {
        let db = database().await;
        db.products().insert(&product("p1", 10_000, 5)).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        CartRepository::upsert_item(&mut tx, &item("u1", "p1", 1)).await.unwrap();
        CartRepository::upsert_item(&mut tx, &item("u1", "p1", 3)).await.unwrap();
        tx.commit().await.unwrap();

        let cart = db.carts().get("u1").await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.items[0].product_name, "Product p1");
        assert_eq!(db.carts().count("u1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let db = database().await;
        db.products().insert(&product("p1", 10_000, 5)).await.unwrap();
        db.products().insert(&product("p2", 10_000, 5)).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        CartRepository::upsert_item(&mut tx, &item("u1", "p1", 1)).await.unwrap();
        CartRepository::upsert_item(&mut tx, &item("u1", "p2", 2)).await.unwrap();
        assert!(CartRepository::delete_item(&mut tx, "u1", "p1").await.unwrap());
        assert!(!CartRepository::delete_item(&mut tx, "u1", "p1").await.unwrap());
        assert_eq!(CartRepository::clear(&mut tx, "u1").await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert!(db.carts().get("u1").await.unwrap().is_empty());
        assert_eq!(db.carts().count("u1").await.unwrap(), 0);
    }
}
