//! Infrastructure layer: event store, dispatcher, projections, in-memory collaborators
//! and the purchasing application service that wires them together.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod invoice_numbers;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod stock;
pub mod suppliers;


pub use config::{ConfigError, PurchasingConfig};
pub use services::{NewPurchaseOrder, PurchasingService, ServiceError};
pub use stock::InMemoryStockService;
pub use suppliers::InMemorySupplierDirectory;
