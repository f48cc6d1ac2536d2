//! # Catalog Administration
//!
//! Products, offers and coupons as the order core needs them, plus the
//! customer-facing price of a product under the best live offer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use bazaar_core::coupon::{generate_code, normalize_code};
use bazaar_core::pricing::best_price;
use bazaar_core::validation::{validate_coupon_code, validate_discount_bps, validate_price_paise};
use bazaar_core::{Coupon, CouponDiscount, Offer, OfferDiscount, PriceBreakdown, Product};
use bazaar_db::{with_retry, Database, ProductRepository, RetryPolicy};

use crate::error::{OrderError, OrderResult};

/// Attempts at finding an unused generated coupon code.
const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category_id: String,
    pub price_paise: i64,
    #[serde(default)]
    pub discount_bps: u32,
    pub stock: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub name: String,
    pub discount: OfferDiscount,
    #[serde(default)]
    pub category_ids: Vec<String>,
    #[serde(default)]
    pub product_ids: Vec<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub name: String,
    /// Generated when absent.
    #[serde(default)]
    pub code: Option<String>,
    pub discount: CouponDiscount,
    #[serde(default)]
    pub minimum_paise: i64,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_limit: Option<i64>,
    #[serde(default = "default_per_user_limit")]
    pub usage_per_user_limit: i64,
}

fn default_per_user_limit() -> i64 {
    1
}

/// A product with its current best price.
#[derive(Debug, Clone, Serialize)]
pub struct PricedProduct {
    pub product: Product,
    pub price: PriceBreakdown,
}

#[derive(Debug, Clone)]
pub struct CatalogService {
    db: Database,
    retry: RetryPolicy,
}

impl CatalogService {
    pub fn new(db: Database, retry: RetryPolicy) -> Self {
        CatalogService { db, retry }
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn add_product(&self, input: NewProduct) -> OrderResult<Product> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(OrderError::validation("product name is required"));
        }
        validate_price_paise(input.price_paise)?;
        validate_discount_bps(input.discount_bps)?;
        if input.stock < 0 {
            return Err(OrderError::validation("stock cannot be negative"));
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category_id: input.category_id,
            price_paise: input.price_paise,
            discount_bps: input.discount_bps,
            stock: input.stock,
            reserved: 0,
            is_listed: true,
            created_at: now,
            updated_at: now,
        };
        self.db.products().insert(&product).await?;

        info!(product_id = %product.id, name = %product.name, "Product added");
        Ok(product)
    }

    pub async fn set_listed(&self, product_id: &str, listed: bool) -> OrderResult<()> {
        self.db.products().set_listed(product_id, listed).await?;
        info!(product_id = %product_id, listed, "Product listing changed");
        Ok(())
    }

    /// Adds units to on-hand stock.
    pub async fn restock(&self, product_id: &str, quantity: i64) -> OrderResult<Product> {
        if quantity <= 0 {
            return Err(OrderError::validation("restock quantity must be positive"));
        }
        with_retry("restock", self.retry, move || async move {
            let mut tx = self.db.begin().await?;
            ProductRepository::restock(&mut tx, product_id, quantity).await?;
            let product = ProductRepository::find(&mut tx, product_id)
                .await?
                .ok_or_else(|| OrderError::not_found("Product", product_id))?;
            tx.commit().await?;
            Ok::<_, OrderError>(product)
        })
        .await
    }

    /// A listed product at its best live price.
    pub async fn priced_product(&self, product_id: &str) -> OrderResult<PricedProduct> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .filter(|p| p.is_listed)
            .ok_or_else(|| OrderError::not_found("Product", product_id))?;
        self.price(product).await
    }

    pub async fn list_products(&self, category_id: Option<&str>, limit: u32) -> OrderResult<Vec<PricedProduct>> {
        let products = self.db.products().list_listed(category_id, limit).await?;
        let mut priced = Vec::with_capacity(products.len());
        for product in products {
            priced.push(self.price(product).await?);
        }
        Ok(priced)
    }

    async fn price(&self, product: Product) -> OrderResult<PricedProduct> {
        let offers = self.db.offers().for_product(&product).await?;
        let price = best_price(&product, &offers, Utc::now());
        Ok(PricedProduct { product, price })
    }

    // =========================================================================
    // Offers
    // =========================================================================

    pub async fn add_offer(&self, input: NewOffer) -> OrderResult<Offer> {
        if input.name.trim().is_empty() {
            return Err(OrderError::validation("offer name is required"));
        }
        if input.ends_at <= input.starts_at {
            return Err(OrderError::validation("offer must end after it starts"));
        }
        if input.category_ids.is_empty() && input.product_ids.is_empty() {
            return Err(OrderError::validation("offer must target a category or a product"));
        }
        let cap = match &input.discount {
            OfferDiscount::Percentage {
                rate,
                max_discount_paise,
            } => {
                validate_discount_bps(rate.bps())?;
                max_discount_paise
            }
            OfferDiscount::Fixed {
                amount_paise,
                max_discount_paise,
            } => {
                validate_price_paise(*amount_paise)?;
                max_discount_paise
            }
        };
        if let Some(cap) = cap {
            validate_price_paise(*cap)?;
        }

        let offer = Offer {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            discount: input.discount,
            category_ids: input.category_ids,
            product_ids: input.product_ids,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            is_active: true,
        };
        self.db.offers().insert(&offer).await?;

        info!(offer_id = %offer.id, name = %offer.name, "Offer added");
        Ok(offer)
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    pub async fn create_coupon(&self, input: NewCoupon) -> OrderResult<Coupon> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(OrderError::validation("coupon name is required"));
        }
        if input.expires_at <= Utc::now() {
            return Err(OrderError::validation("coupon must expire in the future"));
        }
        if input.usage_per_user_limit < 1 || input.usage_limit.is_some_and(|l| l < 1) {
            return Err(OrderError::validation("usage limits must be at least 1"));
        }
        validate_price_paise(input.minimum_paise)?;
        match &input.discount {
            CouponDiscount::Percentage {
                rate,
                max_discount_paise,
            } => {
                validate_discount_bps(rate.bps())?;
                if let Some(cap) = max_discount_paise {
                    validate_price_paise(*cap)?;
                }
            }
            CouponDiscount::Flat { amount_paise } => validate_price_paise(*amount_paise)?,
        }

        let code = match &input.code {
            Some(code) => {
                validate_coupon_code(code)?;
                normalize_code(code)
            }
            None => self.unused_code().await?,
        };

        let coupon = Coupon {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            code,
            discount: input.discount,
            minimum_paise: input.minimum_paise,
            expires_at: input.expires_at,
            is_active: true,
            usage_limit: input.usage_limit,
            usage_per_user_limit: input.usage_per_user_limit,
            times_used: 0,
            created_at: Utc::now(),
        };
        self.db.coupons().insert(&coupon).await?;

        info!(coupon_id = %coupon.id, code = %coupon.code, "Coupon created");
        Ok(coupon)
    }

    async fn unused_code(&self) -> OrderResult<String> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code(&mut rand::thread_rng());
            if !self.db.coupons().code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(OrderError::validation("could not generate an unused coupon code"))
    }

    pub async fn list_coupons(&self) -> OrderResult<Vec<Coupon>> {
        Ok(self.db.coupons().list().await?)
    }

    pub async fn set_coupon_active(&self, coupon_id: &str, active: bool) -> OrderResult<()> {
        self.db.coupons().set_active(coupon_id, active).await?;
        info!(coupon_id = %coupon_id, active, "Coupon status changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::harness;
    use bazaar_core::{DiscountRate, OfferSource};
    use chrono::Duration;

    fn laptop() -> NewProduct {
        NewProduct {
            name: "Aspire 7".to_string(),
            category_id: "laptops".to_string(),
            price_paise: 100_000,
            discount_bps: 500,
            stock: 3,
        }
    }

    #[tokio::test]
    async fn test_category_offer_sets_price() {
        let h = harness().await;
        let product = h.services.catalog.add_product(laptop()).await.unwrap();

        let priced = h.services.catalog.priced_product(&product.id).await.unwrap();
        assert_eq!(priced.price.final_price_paise, 95_000);
        assert_eq!(priced.price.applied_offer, OfferSource::Product);

        let now = Utc::now();
        h.services
            .catalog
            .add_offer(NewOffer {
                name: "Festive".to_string(),
                discount: OfferDiscount::Fixed {
                    amount_paise: 20_000,
                    max_discount_paise: None,
                },
                category_ids: vec!["laptops".to_string()],
                product_ids: vec![],
                starts_at: now - Duration::hours(1),
                ends_at: now + Duration::days(1),
            })
            .await
            .unwrap();

        let listed = h.services.catalog.list_products(Some("laptops"), 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].price.final_price_paise, 80_000);
        assert_eq!(listed[0].price.applied_offer, OfferSource::Category);

        // The cart captures the offer price
        let cart = h.services.cart.add_item("u1", &product.id, 1).await.unwrap();
        assert_eq!(cart.items[0].final_price_paise, 80_000);
        assert_eq!(cart.items[0].unit_price_paise, 100_000);
    }

    #[tokio::test]
    async fn test_unlisted_product_cannot_be_bought() {
        let h = harness().await;
        let product = h.services.catalog.add_product(laptop()).await.unwrap();
        h.services.catalog.set_listed(&product.id, false).await.unwrap();

        let err = h.services.cart.add_item("u1", &product.id, 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(h.services.catalog.list_products(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restock_adds_units() {
        let h = harness().await;
        let product = h.services.catalog.add_product(laptop()).await.unwrap();
        let product = h.services.catalog.restock(&product.id, 4).await.unwrap();
        assert_eq!(product.stock, 7);
        assert_eq!(
            h.services.catalog.restock("missing", 1).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_generated_and_duplicate_coupon_codes() {
        let h = harness().await;
        let input = |name: &str, code: Option<&str>| NewCoupon {
            name: name.to_string(),
            code: code.map(str::to_string),
            discount: CouponDiscount::Percentage {
                rate: DiscountRate::from_percent(15),
                max_discount_paise: Some(10_000),
            },
            minimum_paise: 0,
            expires_at: Utc::now() + Duration::days(30),
            usage_limit: None,
            usage_per_user_limit: 1,
        };

        let generated = h.services.catalog.create_coupon(input("Autumn", None)).await.unwrap();
        assert_eq!(generated.code.len(), 8);

        let named = h
            .services
            .catalog
            .create_coupon(input("Welcome", Some("welcome10")))
            .await
            .unwrap();
        assert_eq!(named.code, "WELCOME10");

        let err = h
            .services
            .catalog
            .create_coupon(input("Welcome again", Some("WELCOME10")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        h.services.catalog.set_coupon_active(&named.id, false).await.unwrap();
        let coupons = h.services.catalog.list_coupons().await.unwrap();
        assert_eq!(coupons.len(), 2);
        assert!(coupons.iter().any(|c| c.code == "WELCOME10" && !c.is_active));
    }
}
