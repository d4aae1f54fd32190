//! Inventory side of receiving: what a stock movement is, how it is identified, and
//! the contract of the service that turns movements into on-hand stock.
//!
//! Pure domain types; storage-backed implementations live in `stockwise-infra`.

pub mod movement;
pub mod stock;

pub use movement::{ProductId, ShopId, SourceRef, StockMovement};
pub use stock::{IncreaseStock, PostingOutcome, StockError, StockLedger, StockLevel, StockService};
