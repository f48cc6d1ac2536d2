//! # Return Requests
//!
//! A customer's request to send back delivered items, resolved by an
//! administrator exactly once.
//!
//! ```text
//! Pending ──► Approved   (refund issued)
//!    │
//!    └──────► Rejected   (lines back to Ordered)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::order::Order;

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
}

/// One line covered by a return request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnItem {
    pub line_id: String,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequest {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub reason: String,
    pub items: Vec<ReturnItem>,
    pub status: ReturnStatus,
    /// Set when approved.
    pub refund_paise: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ReturnRequest {
    /// A pending request for `line_ids` of `order`.
    pub fn open(order: &Order, line_ids: &[String], reason: &str) -> Self {
        let items = order
            .lines
            .iter()
            .filter(|l| line_ids.contains(&l.id))
            .map(|l| ReturnItem {
                line_id: l.id.clone(),
                product_id: l.product_id.clone(),
                quantity: l.quantity,
            })
            .collect();
        ReturnRequest {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            user_id: order.user_id.clone(),
            reason: reason.to_string(),
            items,
            status: ReturnStatus::Pending,
            refund_paise: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn line_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.line_id.clone()).collect()
    }

    fn ensure_pending(&self) -> CoreResult<()> {
        if self.status != ReturnStatus::Pending {
            return Err(CoreError::not_eligible(
                "Return request",
                self.id.clone(),
                format!("already {:?}", self.status).to_lowercase(),
            ));
        }
        Ok(())
    }

    pub fn approve(&mut self, refund: Money, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_pending()?;
        self.status = ReturnStatus::Approved;
        self.refund_paise = Some(refund.paise());
        self.resolved_at = Some(now);
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_pending()?;
        self.status = ReturnStatus::Rejected;
        self.resolved_at = Some(now);
        Ok(())
    }
}
