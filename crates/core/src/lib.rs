//! `stockwise-core`: domain building blocks shared by the purchasing and inventory crates.
//!
//! Everything here is **pure** (no IO): identifiers, the domain error model, the
//! aggregate contract used by the command dispatcher, and the fixed-precision
//! money/quantity primitives.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId};
pub use money::{Money, Quantity, MONEY_SCALE};
pub use value_object::ValueObject;
