//! Stock and wallet side effects applied inside an operation's transaction.

use sqlx::SqliteConnection;
use tracing::debug;

use bazaar_core::{Cart, LineStatus, Order, OrderLine, Settlement};
use bazaar_db::{CartRepository, ProductRepository, WalletRepository};

use crate::error::{OrderError, OrderResult};

/// Puts settled lines back on the shelf and credits the wallet.
pub(crate) async fn apply(
    conn: &mut SqliteConnection,
    order: &Order,
    settlement: &Settlement,
    description: &str,
) -> OrderResult<()> {
    for restock in &settlement.restock {
        ProductRepository::restock(conn, &restock.product_id, restock.quantity).await?;
    }
    if let Some(amount) = settlement.wallet_credit() {
        WalletRepository::credit(conn, &order.user_id, amount, description).await?;
    }
    debug!(
        order_id = %order.id,
        refund = %settlement.refund,
        credited = settlement.wallet_credit().is_some(),
        restocked = settlement.restock.len(),
        "Settlement applied"
    );
    Ok(())
}

/// Drops the user's cart and the stock it was holding.
pub(crate) async fn clear_cart(conn: &mut SqliteConnection, cart: &Cart) -> OrderResult<()> {
    for item in &cart.items {
        ProductRepository::release(conn, &item.product_id, item.quantity).await?;
    }
    CartRepository::clear(conn, &cart.user_id).await?;
    Ok(())
}

/// Takes the order's units out of stock.
///
/// Run after [`clear_cart`] so the buyer's own reservation does not count
/// against them.
pub(crate) async fn commit_stock(conn: &mut SqliteConnection, order: &Order) -> OrderResult<()> {
    for line in ordered_lines(order) {
        if !ProductRepository::adjust_stock(conn, &line.product_id, -line.quantity).await? {
            let available = ProductRepository::find(conn, &line.product_id)
                .await?
                .map(|p| p.available())
                .unwrap_or(0);
            return Err(OrderError::InsufficientStock {
                product: line.product_name.clone(),
                available,
                requested: line.quantity,
            });
        }
    }
    Ok(())
}

/// The first line the shelf cannot cover, counting units the buyer's own
/// cart is holding as available to them.
pub(crate) async fn stock_shortfall(
    conn: &mut SqliteConnection,
    order: &Order,
    cart: &Cart,
) -> OrderResult<Option<OrderError>> {
    for line in ordered_lines(order) {
        let held: i64 = cart
            .items
            .iter()
            .filter(|i| i.product_id == line.product_id)
            .map(|i| i.quantity)
            .sum();
        let available = ProductRepository::find(conn, &line.product_id)
            .await?
            .map_or(0, |p| p.available())
            + held;
        if available < line.quantity {
            return Ok(Some(OrderError::InsufficientStock {
                product: line.product_name.clone(),
                available,
                requested: line.quantity,
            }));
        }
    }
    Ok(None)
}

fn ordered_lines(order: &Order) -> impl Iterator<Item = &OrderLine> {
    order.lines.iter().filter(|l| l.status == LineStatus::Ordered)
}
