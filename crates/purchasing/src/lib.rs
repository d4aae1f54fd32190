//! Purchasing domain module (purchase orders, event-sourced).
//!
//! Business rules for the purchase order lifecycle: creation, the status state
//! machine, batch receiving against ordered quantities, the payment ledger and the
//! deletion guard. Everything here is deterministic domain logic (no IO, no storage).

pub mod error;
pub mod item;
pub mod order;
pub mod payment;
pub mod receiving;
pub mod status;
pub mod supplier;
pub mod view;

pub use error::PurchasingError;
pub use item::{NewPurchaseItem, PurchaseItem, PurchaseItemId};
pub use order::{
    ChangeStatus, CreatePurchaseOrder, DeletePurchaseOrder, PaymentRecorded, PurchaseOrder,
    PurchaseOrderCommand, PurchaseOrderCreated, PurchaseOrderDeleted, PurchaseOrderEvent,
    PurchaseOrderId, PurchaseOrderStatusChanged, Receipt, ReceiveStock, RecordPayment,
    StockReceived, AGGREGATE_TYPE,
};
pub use payment::{Payment, PaymentMethod};
pub use receiving::ReceivingRecord;
pub use status::PurchaseOrderStatus;
pub use supplier::{Supplier, SupplierDirectory, SupplierId};
pub use view::{ItemView, OrderView};
