use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockwise_core::Money;

/// How a supplier was paid. Recorded only; no gateway is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    MobileWallet,
    Cheque,
    Other,
}

/// Append-only payment ledger entry against one purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Bank reference, cheque number, ...
    #[serde(default)]
    pub reference: Option<String>,
    pub paid_at: DateTime<Utc>,
}
