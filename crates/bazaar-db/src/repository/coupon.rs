//! # Coupon Repository
//!
//! Coupons plus a per-user usage counter.
//!
//! ## Usage Accounting
//! ```text
//! record_usage(coupon, user)
//!   ├── coupons.times_used += 1        WHERE usage_limit IS NULL OR times_used < usage_limit
//!   └── coupon_usages.usage_count += 1 WHERE usage_count < usage_per_user_limit
//!
//! Either guard failing → Ok(false); the caller rolls the transaction back.
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::coupon::normalize_code;
use bazaar_core::types::DiscountRate;
use bazaar_core::{Coupon, CouponDiscount};

const COUPON_COLUMNS: &str = "id, name, code, kind, value, max_discount_paise, minimum_paise, \
     expires_at, is_active, usage_limit, usage_per_user_limit, times_used, created_at";

#[derive(Debug, FromRow)]
struct CouponRecord {
    id: String,
    name: String,
    code: String,
    kind: String,
    value: i64,
    max_discount_paise: Option<i64>,
    minimum_paise: i64,
    expires_at: DateTime<Utc>,
    is_active: bool,
    usage_limit: Option<i64>,
    usage_per_user_limit: i64,
    times_used: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<CouponRecord> for Coupon {
    type Error = DbError;

    fn try_from(r: CouponRecord) -> DbResult<Self> {
        let discount = match r.kind.as_str() {
            "percentage" => CouponDiscount::Percentage {
                rate: DiscountRate::from_bps(
                    u32::try_from(r.value).map_err(|e| DbError::corrupt("Coupon", e))?,
                ),
                max_discount_paise: r.max_discount_paise,
            },
            "flat" => CouponDiscount::Flat {
                amount_paise: r.value,
            },
            other => return Err(DbError::corrupt("Coupon", format!("unknown kind '{other}'"))),
        };

        Ok(Coupon {
            id: r.id,
            name: r.name,
            code: r.code,
            discount,
            minimum_paise: r.minimum_paise,
            expires_at: r.expires_at,
            is_active: r.is_active,
            usage_limit: r.usage_limit,
            usage_per_user_limit: r.usage_per_user_limit,
            times_used: r.times_used,
            created_at: r.created_at,
        })
    }
}

fn into_coupons(records: Vec<CouponRecord>) -> DbResult<Vec<Coupon>> {
    records.into_iter().map(Coupon::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a coupon. The code is stored upper-cased.
    ///
    /// ## Errors
    /// `UniqueViolation` when the code or name is taken.
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        let code = normalize_code(&coupon.code);
        debug!(id = %coupon.id, code = %code, "Inserting coupon");

        let (kind, value, max_discount) = match &coupon.discount {
            CouponDiscount::Percentage {
                rate,
                max_discount_paise,
            } => ("percentage", i64::from(rate.bps()), *max_discount_paise),
            CouponDiscount::Flat { amount_paise } => ("flat", *amount_paise, None),
        };

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, name, code, kind, value, max_discount_paise, minimum_paise,
                expires_at, is_active, usage_limit, usage_per_user_limit,
                times_used, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.name)
        .bind(&code)
        .bind(kind)
        .bind(value)
        .bind(max_discount)
        .bind(coupon.minimum_paise)
        .bind(coupon.expires_at)
        .bind(coupon.is_active)
        .bind(coupon.usage_limit)
        .bind(coupon.usage_per_user_limit)
        .bind(coupon.times_used)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, code.clone()),
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_code(&mut conn, code).await
    }

    /// Case-insensitive lookup by code.
    pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1");
        let record = sqlx::query_as::<_, CouponRecord>(&sql)
            .bind(normalize_code(code))
            .fetch_optional(&mut *conn)
            .await?;
        record.map(Coupon::try_from).transpose()
    }

    /// Whether a code is already taken (used by code generation).
    pub async fn code_exists(&self, code: &str) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM coupons WHERE code = ?1)")
            .bind(normalize_code(code))
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// How many times `user_id` has redeemed the coupon.
    pub async fn user_usage(
        conn: &mut SqliteConnection,
        coupon_id: &str,
        user_id: &str,
    ) -> DbResult<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT usage_count FROM coupon_usages WHERE coupon_id = ?1 AND user_id = ?2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Counts one redemption against both limits.
    ///
    /// Returns `false` if either limit is already reached. The global counter
    /// may have been bumped by then, so the caller must not commit.
    pub async fn record_usage(
        conn: &mut SqliteConnection,
        coupon: &Coupon,
        user_id: &str,
    ) -> DbResult<bool> {
        let global = sqlx::query(
            r#"
            UPDATE coupons SET times_used = times_used + 1
            WHERE id = ?1 AND (usage_limit IS NULL OR times_used < usage_limit)
            "#,
        )
        .bind(&coupon.id)
        .execute(&mut *conn)
        .await?;

        if global.rows_affected() == 0 {
            debug!(code = %coupon.code, "Coupon usage limit reached");
            return Ok(false);
        }

        let per_user = sqlx::query(
            r#"
            INSERT INTO coupon_usages (coupon_id, user_id, usage_count) VALUES (?1, ?2, 1)
            ON CONFLICT (coupon_id, user_id) DO UPDATE SET usage_count = usage_count + 1
            WHERE usage_count < ?3
            "#,
        )
        .bind(&coupon.id)
        .bind(user_id)
        .bind(coupon.usage_per_user_limit)
        .execute(&mut *conn)
        .await?;

        if per_user.rows_affected() == 0 {
            debug!(code = %coupon.code, user_id = %user_id, "Per-user coupon limit reached");
            return Ok(false);
        }

        Ok(true)
    }

    /// Active, unexpired coupons `user_id` can still redeem.
    pub async fn available_for_user(&self, user_id: &str, now: DateTime<Utc>) -> DbResult<Vec<Coupon>> {
        let sql = format!(
            r#"
            SELECT {COUPON_COLUMNS} FROM coupons c
            WHERE c.is_active = 1
              AND (c.usage_limit IS NULL OR c.times_used < c.usage_limit)
              AND c.usage_per_user_limit > COALESCE(
                    (SELECT u.usage_count FROM coupon_usages u
                     WHERE u.coupon_id = c.id AND u.user_id = ?1), 0)
            ORDER BY c.expires_at
            "#
        );
        let records = sqlx::query_as::<_, CouponRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let coupons = into_coupons(records)?
            .into_iter()
            .filter(|c| c.expires_at > now)
            .collect();
        Ok(coupons)
    }

    /// Every coupon, newest first (admin listing).
    pub async fn list(&self) -> DbResult<Vec<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC");
        let records = sqlx::query_as::<_, CouponRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        into_coupons(records)
    }

    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE coupons SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;
    use chrono::Duration;

    fn coupon(code: &str, usage_limit: Option<i64>, per_user: i64) -> Coupon {
        Coupon {
            id: uuid::Uuid::new_v4().to_string(),
            name: format!("Coupon {code}"),
            code: code.to_string(),
            discount: CouponDiscount::Percentage {
                rate: DiscountRate::from_percent(10),
                max_discount_paise: None,
            },
            minimum_paise: 0,
            expires_at: Utc::now() + Duration::days(7),
            is_active: true,
            usage_limit,
            usage_per_user_limit: per_user,
            times_used: 0,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let db = database().await;
        db.coupons().insert(&coupon("save10ab", None, 1)).await.unwrap();

        let found = db.coupons().get_by_code("SAVE10AB").await.unwrap().unwrap();
        assert_eq!(found.code, "SAVE10AB");
        assert!(db.coupons().code_exists("save10ab").await.unwrap());
        assert!(db.coupons().get_by_code("NOPE0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = database().await;
        db.coupons().insert(&coupon("SAVE10AB", None, 1)).await.unwrap();

        let mut dup = coupon("SAVE10AB", None, 1);
        dup.name = "Another".to_string();
        assert!(matches!(
            db.coupons().insert(&dup).await,
            Err(DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_per_user_limit() {
        let db = database().await;
        let c = coupon("ONCEONLY", None, 1);
        db.coupons().insert(&c).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        assert!(CouponRepository::record_usage(&mut tx, &c, "u1").await.unwrap());
        assert!(!CouponRepository::record_usage(&mut tx, &c, "u1").await.unwrap());
        assert_eq!(CouponRepository::user_usage(&mut tx, &c.id, "u1").await.unwrap(), 1);
        assert!(CouponRepository::record_usage(&mut tx, &c, "u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_global_limit_and_availability() {
        let db = database().await;
        let c = coupon("FIRSTTWO", Some(1), 5);
        db.coupons().insert(&c).await.unwrap();

        assert_eq!(db.coupons().available_for_user("u1", Utc::now()).await.unwrap().len(), 1);

        let mut tx = db.begin().await.unwrap();
        assert!(CouponRepository::record_usage(&mut tx, &c, "u1").await.unwrap());
        assert!(!CouponRepository::record_usage(&mut tx, &c, "u2").await.unwrap());
        tx.commit().await.unwrap();

        assert!(db.coupons().available_for_user("u2", Utc::now()).await.unwrap().is_empty());
        let stored = db.coupons().get_by_code("FIRSTTWO").await.unwrap().unwrap();
        assert_eq!(stored.times_used, 1);
    }

    #[tokio::test]
    async fn test_expired_and_inactive_not_available() {
        let db = database().await;
        let mut expired = coupon("OLDCODE1", None, 1);
        expired.expires_at = Utc::now() - Duration::days(1);
        db.coupons().insert(&expired).await.unwrap();
        let off = coupon("OFFCODE1", None, 1);
        db.coupons().insert(&off).await.unwrap();
        db.coupons().set_active(&off.id, false).await.unwrap();

        assert!(db.coupons().available_for_user("u1", Utc::now()).await.unwrap().is_empty());
        assert_eq!(db.coupons().list().await.unwrap().len(), 2);
    }
}
