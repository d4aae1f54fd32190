use thiserror::Error;

use stockwise_core::{DomainError, Money, Quantity};

use crate::item::PurchaseItemId;
use crate::status::PurchaseOrderStatus;
use crate::supplier::SupplierId;

/// Every way a purchase order operation can be rejected.
///
/// All of these are raised while deciding, before anything is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PurchasingError {
    #[error("cannot move purchase order from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
        reason: &'static str,
    },

    #[error("purchase order in status {0} cannot receive stock")]
    OrderNotReceivable(PurchaseOrderStatus),

    #[error("item {0} does not belong to this purchase order")]
    ItemNotFound(PurchaseItemId),

    #[error("cannot receive {requested} unit(s) of item {item_id}: {pending} pending")]
    QuantityExceedsOrdered {
        item_id: PurchaseItemId,
        requested: Quantity,
        pending: Quantity,
    },

    #[error("item {item_id}: {actual} identity number(s) supplied for {expected} unit(s)")]
    IdentityCountMismatch {
        item_id: PurchaseItemId,
        expected: Quantity,
        actual: usize,
    },

    #[error("identity number '{0}' is duplicated or already received")]
    DuplicateIdentityNumber(String),

    #[error("idempotency key '{0}' was already used with a different receipt")]
    IdempotencyKeyReused(String),

    #[error("purchase order is cancelled")]
    OrderCancelled,

    #[error("payment of {amount} rejected: must be positive and at most the due amount {due}")]
    PaymentExceedsDue { amount: Money, due: Money },

    #[error("purchase order has received stock and cannot be deleted")]
    CannotDeleteReceivedOrder,

    #[error("completed purchase orders cannot be deleted")]
    CannotDeleteCompleted,

    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("purchase order not found")]
    NotFound,

    #[error("purchase order already exists")]
    AlreadyExists,

    #[error("unknown supplier {0}")]
    UnknownSupplier(SupplierId),

    #[error("invoice number '{0}' is already in use")]
    DuplicateInvoiceNumber(String),

    #[error("validation failed: {0}")]
    Validation(String),
}

impl PurchasingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn transition(
        from: PurchaseOrderStatus,
        to: PurchaseOrderStatus,
        reason: &'static str,
    ) -> Self {
        Self::InvalidStateTransition { from, to, reason }
    }
}

impl From<DomainError> for PurchasingError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => PurchasingError::Validation(msg),
            DomainError::NotFound => PurchasingError::NotFound,
            DomainError::Conflict(msg) => PurchasingError::ConcurrentModification(msg),
        }
    }
}
