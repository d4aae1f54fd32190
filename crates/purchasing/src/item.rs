use serde::{Deserialize, Serialize};

use stockwise_core::{AggregateId, Entity, Money, Quantity};
use stockwise_inventory::ProductId;

/// Purchase order line identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseItemId(pub AggregateId);

impl PurchaseItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Caller input for one line of a new purchase order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseItem {
    pub item_id: PurchaseItemId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub unit_cost: Money,
}

/// Purchase order line.
///
/// `ordered`, `unit_cost` and `total_cost` are fixed at creation; only `received`
/// moves, and only upwards, inside a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub item_id: PurchaseItemId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub ordered: Quantity,
    pub received: Quantity,
    pub unit_cost: Money,
    pub total_cost: Money,
}

impl PurchaseItem {
    pub fn pending(&self) -> Quantity {
        // received <= ordered holds for every accepted event.
        self.ordered
            .checked_sub(self.received)
            .unwrap_or(Quantity::ZERO)
    }

    pub fn is_fully_received(&self) -> bool {
        self.pending().is_zero()
    }
}

impl Entity for PurchaseItem {
    type Id = PurchaseItemId;

    fn id(&self) -> &Self::Id {
        &self.item_id
    }
}
