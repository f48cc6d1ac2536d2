//! # Address Repository
//!
//! A customer's saved delivery addresses. Orders never reference these rows;
//! they copy an [`bazaar_core::AddressSnapshot`] at placement.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::Address;

const ADDRESS_COLUMNS: &str = "id, user_id, address_type, name, street, city, landmark, state, \
     pincode, phone, is_default, created_at";

#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    /// Saves an address. A new default address demotes the previous one.
    pub async fn insert(&self, address: &Address) -> DbResult<()> {
        debug!(id = %address.id, user_id = %address.user_id, "Inserting address");

        let mut tx = self.pool.begin().await?;

        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = 0 WHERE user_id = ?1")
                .bind(&address.user_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO addresses (
                id, user_id, address_type, name, street, city, landmark,
                state, pincode, phone, is_default, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.address_type)
        .bind(&address.name)
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.landmark)
        .bind(&address.state)
        .bind(&address.pincode)
        .bind(&address.phone)
        .bind(address.is_default)
        .bind(address.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Lists a user's addresses, default first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Address>> {
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = ?1 \
             ORDER BY is_default DESC, created_at"
        );
        let addresses = sqlx::query_as::<_, Address>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(addresses)
    }

    /// Loads one of `user_id`'s addresses. Someone else's address is
    /// reported as not found.
    pub async fn find_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
        id: &str,
    ) -> DbResult<Option<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = ?1 AND user_id = ?2");
        let address = sqlx::query_as::<_, Address>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(address)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Address", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;
    use chrono::Utc;

    fn address(id: &str, user_id: &str, is_default: bool) -> Address {
        Address {
            id: id.to_string(),
            user_id: user_id.to_string(),
            address_type: "Home".to_string(),
            name: "Asha".to_string(),
            street: "12 MG Road".to_string(),
            city: "Kochi".to_string(),
            landmark: None,
            state: "Kerala".to_string(),
            pincode: "682001".to_string(),
            phone: "9876543210".to_string(),
            is_default,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_new_default_demotes_previous() {
        let db = database().await;
        db.addresses().insert(&address("a1", "u1", true)).await.unwrap();
        db.addresses().insert(&address("a2", "u1", true)).await.unwrap();

        let list = db.addresses().list_for_user("u1").await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "a2");
        assert!(list[0].is_default);
        assert!(!list[1].is_default);
    }

    #[tokio::test]
    async fn test_other_users_address_is_hidden() {
        let db = database().await;
        db.addresses().insert(&address("a1", "u1", false)).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(AddressRepository::find_for_user(&mut conn, "u1", "a1")
            .await
            .unwrap()
            .is_some());
        assert!(AddressRepository::find_for_user(&mut conn, "u2", "a1")
            .await
            .unwrap()
            .is_none());
        drop(conn);

        assert!(db.addresses().delete("u2", "a1").await.is_err());
        db.addresses().delete("u1", "a1").await.unwrap();
    }
}
