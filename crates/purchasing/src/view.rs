use chrono::{DateTime, Utc};
use serde::Serialize;

use stockwise_core::{AggregateRoot, Money, Quantity};
use stockwise_inventory::{ProductId, ShopId};

use crate::item::{PurchaseItem, PurchaseItemId};
use crate::order::{PurchaseOrder, PurchaseOrderId};
use crate::payment::Payment;
use crate::status::PurchaseOrderStatus;
use crate::supplier::{Supplier, SupplierId};

/// One line of an order as returned to callers, with its pending quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    pub item_id: PurchaseItemId,
    pub line_no: u32,
    pub product_id: ProductId,
    pub ordered: Quantity,
    pub received: Quantity,
    pub pending: Quantity,
    pub unit_cost: Money,
    pub total_cost: Money,
}

impl From<&PurchaseItem> for ItemView {
    fn from(item: &PurchaseItem) -> Self {
        Self {
            item_id: item.item_id,
            line_no: item.line_no,
            product_id: item.product_id,
            ordered: item.ordered,
            received: item.received,
            pending: item.pending(),
            unit_cost: item.unit_cost,
            total_cost: item.total_cost,
        }
    }
}

/// Full order read: header, supplier, lines and payments, with the derived due amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    pub order_id: PurchaseOrderId,
    pub invoice_number: String,
    pub supplier_id: Option<SupplierId>,
    /// `None` when the directory no longer knows the supplier.
    pub supplier: Option<Supplier>,
    pub shop_id: Option<ShopId>,
    pub status: PurchaseOrderStatus,
    pub order_date: Option<DateTime<Utc>>,
    pub received_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub due_amount: Money,
    pub items: Vec<ItemView>,
    pub payments: Vec<Payment>,
    pub version: u64,
}

impl OrderView {
    pub fn from_order(order: &PurchaseOrder, supplier: Option<Supplier>) -> Self {
        Self {
            order_id: order.id_typed(),
            invoice_number: order.invoice_number().to_string(),
            supplier_id: order.supplier_id(),
            supplier,
            shop_id: order.shop_id(),
            status: order.status(),
            order_date: order.order_date(),
            received_date: order.received_date(),
            due_date: order.due_date(),
            notes: order.notes().map(str::to_string),
            total_amount: order.total_amount(),
            paid_amount: order.paid_amount(),
            due_amount: order.due_amount(),
            items: order.items().iter().map(ItemView::from).collect(),
            payments: order.payments().to_vec(),
            version: order.version(),
        }
    }

    pub fn item(&self, item_id: PurchaseItemId) -> Option<&ItemView> {
        self.items.iter().find(|i| i.item_id == item_id)
    }
}
