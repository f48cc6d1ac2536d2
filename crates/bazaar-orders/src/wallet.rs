//! Wallet reads. Balances only change inside order and return transactions.

use bazaar_core::{Money, WalletSummary, WalletTransaction};
use bazaar_db::Database;

use crate::error::OrderResult;

#[derive(Debug, Clone)]
pub struct WalletService {
    db: Database,
}

impl WalletService {
    pub fn new(db: Database) -> Self {
        WalletService { db }
    }

    /// Zero for a user who never had a wallet.
    pub async fn balance(&self, user_id: &str) -> OrderResult<Money> {
        Ok(self.db.wallets().get_or_empty(user_id).await?.balance())
    }

    pub async fn summary(&self, user_id: &str) -> OrderResult<WalletSummary> {
        let wallet = self.db.wallets().get_or_empty(user_id).await?;
        let transactions = self.db.wallets().transactions(user_id).await?;
        Ok(WalletSummary::new(&wallet, transactions))
    }

    /// Newest first.
    pub async fn transactions(&self, user_id: &str) -> OrderResult<Vec<WalletTransaction>> {
        Ok(self.db.wallets().transactions(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{fund_wallet, harness, place_order, seed_product};
    use bazaar_core::wallet::reconcile;
    use bazaar_core::{Money, PaymentMethod};

    #[tokio::test]
    async fn test_balance_matches_ledger_through_order_lifecycle() {
        let h = harness().await;
        seed_product(&h.db, "p1", 70_000, 5).await;
        seed_product(&h.db, "p2", 20_000, 5).await;
        fund_wallet(&h.db, "u1", Money::from_rupees(2000)).await;

        let check = |summary: bazaar_core::WalletSummary| {
            assert_eq!(Money::from_paise(summary.balance_paise), reconcile(&summary.transactions));
            assert_eq!(
                summary.balance_paise,
                summary.total_credited_paise - summary.total_debited_paise
            );
        };
        check(h.services.wallet.summary("u1").await.unwrap());

        h.services.cart.add_item("u1", "p1", 1).await.unwrap();
        h.services.cart.add_item("u1", "p2", 2).await.unwrap();
        let order = place_order(&h, "u1", PaymentMethod::Wallet, None).await;
        check(h.services.wallet.summary("u1").await.unwrap());

        let p2_line = order.lines.iter().find(|l| l.product_id == "p2").unwrap().id.clone();
        h.services
            .orders
            .cancel_line("u1", &order.id, &p2_line, "too many")
            .await
            .unwrap();
        check(h.services.wallet.summary("u1").await.unwrap());

        h.services.orders.cancel_order("u1", &order.id, "never mind").await.unwrap();
        let summary = h.services.wallet.summary("u1").await.unwrap();
        check(summary.clone());
        assert_eq!(summary.balance_paise, 200_000);
        assert_eq!(h.services.wallet.transactions("u1").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_wallet() {
        let h = harness().await;
        assert_eq!(h.services.wallet.balance("nobody").await.unwrap(), Money::zero());
        let summary = h.services.wallet.summary("nobody").await.unwrap();
        assert!(summary.transactions.is_empty());
    }
}
