//! # Offer Repository
//!
//! Offers are stored flat (`kind`, `value`) with their targets in two join
//! tables, and reassembled into [`Offer`] on load.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::types::DiscountRate;
use bazaar_core::{Offer, OfferDiscount, Product};

#[derive(Debug, FromRow)]
struct OfferRecord {
    id: String,
    name: String,
    kind: String,
    value: i64,
    max_discount_paise: Option<i64>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    is_active: bool,
}

impl OfferRecord {
    fn into_offer(self, category_ids: Vec<String>, product_ids: Vec<String>) -> DbResult<Offer> {
        let discount = match self.kind.as_str() {
            "percentage" => OfferDiscount::Percentage {
                rate: DiscountRate::from_bps(
                    u32::try_from(self.value).map_err(|e| DbError::corrupt("Offer", e))?,
                ),
                max_discount_paise: self.max_discount_paise,
            },
            "fixed" => OfferDiscount::Fixed {
                amount_paise: self.value,
                max_discount_paise: self.max_discount_paise,
            },
            other => return Err(DbError::corrupt("Offer", format!("unknown kind '{other}'"))),
        };

        Ok(Offer {
            id: self.id,
            name: self.name,
            discount,
            category_ids,
            product_ids,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            is_active: self.is_active,
        })
    }
}

fn discount_columns(discount: &OfferDiscount) -> (&'static str, i64, Option<i64>) {
    match discount {
        OfferDiscount::Percentage {
            rate,
            max_discount_paise,
        } => ("percentage", i64::from(rate.bps()), *max_discount_paise),
        OfferDiscount::Fixed {
            amount_paise,
            max_discount_paise,
        } => ("fixed", *amount_paise, *max_discount_paise),
    }
}

#[derive(Debug, Clone)]
pub struct OfferRepository {
    pool: SqlitePool,
}

impl OfferRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OfferRepository { pool }
    }

    /// Inserts an offer together with its category and product targets.
    pub async fn insert(&self, offer: &Offer) -> DbResult<()> {
        debug!(id = %offer.id, name = %offer.name, "Inserting offer");

        let (kind, value, max_discount) = discount_columns(&offer.discount);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO offers (
                id, name, kind, value, max_discount_paise,
                starts_at, ends_at, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&offer.id)
        .bind(&offer.name)
        .bind(kind)
        .bind(value)
        .bind(max_discount)
        .bind(offer.starts_at)
        .bind(offer.ends_at)
        .bind(offer.is_active)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        for category_id in &offer.category_ids {
            sqlx::query("INSERT INTO offer_categories (offer_id, category_id) VALUES (?1, ?2)")
                .bind(&offer.id)
                .bind(category_id)
                .execute(&mut *tx)
                .await?;
        }
        for product_id in &offer.product_ids {
            sqlx::query("INSERT INTO offer_products (offer_id, product_id) VALUES (?1, ?2)")
                .bind(&offer.id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Active offers that target `product` directly or through its category.
    pub async fn for_product(&self, product: &Product) -> DbResult<Vec<Offer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_for_product(&mut conn, product).await
    }

    /// Same as [`Self::for_product`], inside an open transaction.
    ///
    /// The time window is left to [`Offer::is_live`] so the caller's clock
    /// decides.
    pub async fn find_for_product(
        conn: &mut SqliteConnection,
        product: &Product,
    ) -> DbResult<Vec<Offer>> {
        let records = sqlx::query_as::<_, OfferRecord>(
            r#"
            SELECT o.id, o.name, o.kind, o.value, o.max_discount_paise,
                   o.starts_at, o.ends_at, o.is_active
            FROM offers o
            WHERE o.is_active = 1
              AND (
                EXISTS (SELECT 1 FROM offer_products op
                        WHERE op.offer_id = o.id AND op.product_id = ?1)
                OR EXISTS (SELECT 1 FROM offer_categories oc
                           WHERE oc.offer_id = o.id AND oc.category_id = ?2)
              )
            "#,
        )
        .bind(&product.id)
        .bind(&product.category_id)
        .fetch_all(&mut *conn)
        .await?;

        let mut offers = Vec::with_capacity(records.len());
        for record in records {
            let category_ids: Vec<String> =
                sqlx::query_scalar("SELECT category_id FROM offer_categories WHERE offer_id = ?1")
                    .bind(&record.id)
                    .fetch_all(&mut *conn)
                    .await?;
            let product_ids: Vec<String> =
                sqlx::query_scalar("SELECT product_id FROM offer_products WHERE offer_id = ?1")
                    .bind(&record.id)
                    .fetch_all(&mut *conn)
                    .await?;
            offers.push(record.into_offer(category_ids, product_ids)?);
        }

        debug!(product_id = %product.id, count = offers.len(), "Loaded offers");
        Ok(offers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, product};
    use chrono::Duration;

    fn offer(id: &str, discount: OfferDiscount, categories: &[&str], products: &[&str]) -> Offer {
        let now = Utc::now();
        Offer {
            id: id.to_string(),
            name: format!("Offer {id}"),
            discount,
            category_ids: categories.iter().map(|s| s.to_string()).collect(),
            product_ids: products.iter().map(|s| s.to_string()).collect(),
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_offers_found_by_product_and_category() {
        let db = database().await;
        let p1 = product("p1", 10_000, 5);
        db.products().insert(&p1).await.unwrap();
        db.products().insert(&product("p2", 10_000, 5)).await.unwrap();

        db.offers()
            .insert(&offer(
                "o1",
                OfferDiscount::Percentage {
                    rate: DiscountRate::from_percent(10),
                    max_discount_paise: Some(500),
                },
                &[],
                &["p1"],
            ))
            .await
            .unwrap();
        db.offers()
            .insert(&offer(
                "o2",
                OfferDiscount::Fixed {
                    amount_paise: 700,
                    max_discount_paise: None,
                },
                &["cat-1"],
                &[],
            ))
            .await
            .unwrap();
        db.offers()
            .insert(&offer(
                "o3",
                OfferDiscount::Fixed {
                    amount_paise: 100,
                    max_discount_paise: Some(50),
                },
                &["other"],
                &["p2"],
            ))
            .await
            .unwrap();

        let mut offers = db.offers().for_product(&p1).await.unwrap();
        offers.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].product_ids, vec!["p1".to_string()]);
        assert_eq!(
            offers[0].discount,
            OfferDiscount::Percentage {
                rate: DiscountRate::from_percent(10),
                max_discount_paise: Some(500),
            }
        );
        assert_eq!(offers[1].category_ids, vec!["cat-1".to_string()]);
        assert!(offers.iter().all(|o| o.is_live(Utc::now())));
    }
}
