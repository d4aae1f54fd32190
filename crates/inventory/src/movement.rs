use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockwise_core::{AggregateId, DomainResult, Money, Quantity, ValueObject};

/// Product identifier (catalog entry whose stock is counted).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Shop (stock location) identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopId(pub AggregateId);

impl ShopId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ShopId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Where a stock movement came from: one receipt of one purchase order line.
///
/// `receipt_no` is the ordinal of the receive operation on the order, so two partial
/// deliveries of the same line get distinct references. Stock posting is idempotent
/// on this value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceRef {
    pub order_id: AggregateId,
    pub item_id: AggregateId,
    pub receipt_no: u32,
}

impl ValueObject for SourceRef {}

impl core::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "po/{}/item/{}/receipt/{}",
            self.order_id, self.item_id, self.receipt_no
        )
    }
}

/// Append-only stock ledger entry produced by receiving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub shop_id: ShopId,
    /// Always positive for receipts.
    pub quantity: Quantity,
    pub unit_cost: Money,
    pub source: SourceRef,
    /// IMEI / serial numbers of the received units; empty for anonymous stock.
    #[serde(default)]
    pub identity_numbers: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    /// Value of the movement at purchase cost.
    pub fn value(&self) -> DomainResult<Money> {
        self.unit_cost.times(self.quantity)
    }

    pub fn is_identified(&self) -> bool {
        !self.identity_numbers.is_empty()
    }
}
