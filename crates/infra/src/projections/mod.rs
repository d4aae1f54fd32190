//! Projections: consumers of committed purchase order events.
//!
//! All projections are:
//! - **Rebuildable**: reconstructed from the event streams
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe for at-least-once delivery (per-stream cursors)

mod cursor;

pub mod purchase_orders;
pub mod stock_posting;

pub use purchase_orders::{
    PurchaseOrderProjectionError, PurchaseOrderSummary, PurchaseOrdersProjection,
};
pub use stock_posting::{PostingReport, StockPostingError, StockPostingProjection};
