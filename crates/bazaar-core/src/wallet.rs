//! # Wallet Ledger
//!
//! Per-user store of credit: a running balance plus an append-only list of
//! transactions.
//!
//! ## Ledger Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  balance == Σ credits − Σ debits      (at every point in time)         │
//! │                                                                         │
//! │  credit(₹360, "Refund for cancelled line")                             │
//! │     → append Credit ₹360, balance += ₹360                              │
//! │                                                                         │
//! │  debit(₹250, "Payment for order")                                      │
//! │     → balance < ₹250 ? InsufficientFunds : append Debit, balance −= ₹250│
//! │                                                                         │
//! │  Transactions are never edited or removed; corrections are new entries │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This module holds the in-memory rules. bazaar-db applies the same rules
//! with conditional SQL updates so balance and ledger change in one unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

/// Direction of a wallet transaction.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// One immutable ledger entry. `amount_paise` is always positive;
/// `kind` gives the sign.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WalletTransaction {
    pub id: String,
    pub user_id: String,
    pub amount_paise: i64,
    pub kind: TransactionKind,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// Builds a credit entry. The amount must be positive.
    pub fn credit(user_id: &str, amount: Money, description: impl Into<String>) -> CoreResult<Self> {
        Self::new(user_id, amount, TransactionKind::Credit, description.into())
    }

    /// Builds a debit entry. The amount must be positive.
    pub fn debit(user_id: &str, amount: Money, description: impl Into<String>) -> CoreResult<Self> {
        Self::new(user_id, amount, TransactionKind::Debit, description.into())
    }

    fn new(user_id: &str, amount: Money, kind: TransactionKind, description: String) -> CoreResult<Self> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }
        Ok(WalletTransaction {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount_paise: amount.paise(),
            kind,
            description,
            created_at: Utc::now(),
        })
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_paise(self.amount_paise)
    }

    /// Positive for credits, negative for debits.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Credit => self.amount(),
            TransactionKind::Debit => Money::zero() - self.amount(),
        }
    }
}

/// A user's wallet header. Created lazily with a zero balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Wallet {
    pub user_id: String,
    pub balance_paise: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// An empty wallet for `user_id`.
    pub fn empty(user_id: &str) -> Self {
        Wallet {
            user_id: user_id.to_string(),
            balance_paise: 0,
            updated_at: Utc::now(),
        }
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_paise(self.balance_paise)
    }

    /// Fails with `InsufficientFunds` if the balance does not cover `amount`.
    pub fn ensure_covers(&self, amount: Money) -> CoreResult<()> {
        if self.balance() < amount {
            return Err(CoreError::InsufficientFunds {
                available: self.balance(),
                required: amount,
            });
        }
        Ok(())
    }

    /// Applies a ledger entry to the running balance.
    pub fn apply(&mut self, tx: &WalletTransaction) -> CoreResult<()> {
        if tx.kind == TransactionKind::Debit {
            self.ensure_covers(tx.amount())?;
        }
        self.balance_paise += tx.signed_amount().paise();
        self.updated_at = tx.created_at;
        Ok(())
    }
}

/// Recomputes a balance from the ledger.
pub fn reconcile(transactions: &[WalletTransaction]) -> Money {
    transactions.iter().map(WalletTransaction::signed_amount).sum()
}

/// Wallet overview: balance plus lifetime totals.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WalletSummary {
    pub balance_paise: i64,
    pub total_credited_paise: i64,
    pub total_debited_paise: i64,
    /// Newest first.
    pub transactions: Vec<WalletTransaction>,
}

impl WalletSummary {
    pub fn new(wallet: &Wallet, mut transactions: Vec<WalletTransaction>) -> Self {
        let (credited, debited) = transactions.iter().fold((0i64, 0i64), |(c, d), tx| match tx.kind {
            TransactionKind::Credit => (c + tx.amount_paise, d),
            TransactionKind::Debit => (c, d + tx.amount_paise),
        });
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        WalletSummary {
            balance_paise: wallet.balance_paise,
            total_credited_paise: credited,
            total_debited_paise: debited,
            transactions,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
