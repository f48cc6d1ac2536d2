//! # Product Repository
//!
//! Catalog rows plus the two stock counters.
//!
//! ## Stock Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock     units physically on hand                                    │
//! │  reserved  units sitting in carts                                      │
//! │  available = stock - reserved                                          │
//! │                                                                         │
//! │  add to cart      reserved += q   WHERE stock - reserved >= q          │
//! │  remove from cart reserved -= q                                        │
//! │  place order      reserved -= q; stock -= q  WHERE stock - q >= reserved│
//! │  cancel / return  stock += q                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each guard lives in the UPDATE's WHERE clause, so two buyers racing for
//! the last unit cannot both win: the second UPDATE matches zero rows.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, category_id, price_paise, discount_bps, stock, reserved, \
     is_listed, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Loads a product inside an open transaction.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(product)
    }

    /// Lists listed products, optionally within one category.
    pub async fn list_listed(&self, category_id: Option<&str>, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_listed = 1 AND (?1 IS NULL OR category_id = ?1) \
             ORDER BY name LIMIT ?2"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(category_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category_id, price_paise, discount_bps,
                stock, reserved, is_listed, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_paise)
        .bind(product.discount_bps)
        .bind(product.stock)
        .bind(product.reserved)
        .bind(product.is_listed)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Shows or hides a product in the storefront.
    pub async fn set_listed(&self, id: &str, listed: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_listed = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(listed)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    // =========================================================================
    // Stock (transactional)
    // =========================================================================

    /// Holds `quantity` units for a cart.
    ///
    /// Returns `false` when the product is unlisted or fewer than `quantity`
    /// units are available.
    pub async fn reserve(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET reserved = reserved + ?2, updated_at = ?3
            WHERE id = ?1 AND is_listed = 1 AND stock - reserved >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        debug!(id = %id, quantity, reserved = result.rows_affected() == 1, "Reserve stock");
        Ok(result.rows_affected() == 1)
    }

    /// Gives back units held for a cart.
    pub async fn release(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE products
            SET reserved = MAX(reserved - ?2, 0), updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Adds `delta` (possibly negative) to on-hand stock.
    ///
    /// A decrement only applies when it leaves enough stock for everyone
    /// else's cart reservations; otherwise returns `false` and changes nothing.
    pub async fn adjust_stock(conn: &mut SqliteConnection, id: &str, delta: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock + ?2, updated_at = ?3
            WHERE id = ?1 AND stock + ?2 >= reserved
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        debug!(id = %id, delta, applied = result.rows_affected() == 1, "Adjust stock");
        Ok(result.rows_affected() == 1)
    }

    /// Returns units to stock after a cancellation or approved return.
    pub async fn restock(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<()> {
        if !Self::adjust_stock(conn, id, quantity).await? {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, product};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = database().await;
        db.products().insert(&product("p1", 10_000, 5)).await.unwrap();

        let found = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(found.price_paise, 10_000);
        assert_eq!(found.available(), 5);
        assert!(db.products().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reserve_respects_availability() {
        let db = database().await;
        db.products().insert(&product("p1", 10_000, 3)).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(ProductRepository::reserve(&mut tx, "p1", 2).await.unwrap());
        assert!(!ProductRepository::reserve(&mut tx, "p1", 2).await.unwrap());
        assert!(ProductRepository::reserve(&mut tx, "p1", 1).await.unwrap());
        tx.commit().await.unwrap();

        let p = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p.stock, 3);
        assert_eq!(p.reserved, 3);
        assert_eq!(p.available(), 0);
    }

    #[tokio::test]
    async fn test_unlisted_product_cannot_be_reserved() {
        let db = database().await;
        db.products().insert(&product("p1", 10_000, 3)).await.unwrap();
        db.products().set_listed("p1", false).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(!ProductRepository::reserve(&mut tx, "p1", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_decrement_leaves_room_for_other_reservations() {
        let db = database().await;
        db.products().insert(&product("p1", 10_000, 3)).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        // Another cart holds 2 of the 3 units.
        assert!(ProductRepository::reserve(&mut tx, "p1", 2).await.unwrap());
        assert!(!ProductRepository::adjust_stock(&mut tx, "p1", -2).await.unwrap());
        assert!(ProductRepository::adjust_stock(&mut tx, "p1", -1).await.unwrap());
        tx.commit().await.unwrap();

        let p = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p.stock, 2);
        assert_eq!(p.reserved, 2);
    }

    #[tokio::test]
    async fn test_release_and_restock() {
        let db = database().await;
        db.products().insert(&product("p1", 10_000, 1)).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        ProductRepository::reserve(&mut tx, "p1", 1).await.unwrap();
        ProductRepository::release(&mut tx, "p1", 5).await.unwrap();
        ProductRepository::restock(&mut tx, "p1", 4).await.unwrap();
        assert!(ProductRepository::restock(&mut tx, "missing", 1).await.is_err());
        tx.commit().await.unwrap();

        let p = db.products().get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(p.reserved, 0);
        assert_eq!(p.stock, 5);
    }
}
