//! Receiving engine rules: validating a batch of deliveries against an order's lines
//! and deriving the order status from receiving progress.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use stockwise_core::{Entity, Quantity};

use crate::error::PurchasingError;
use crate::item::{PurchaseItem, PurchaseItemId};
use crate::status::PurchaseOrderStatus;

/// One line of a receive request.
///
/// `identity_numbers` is either empty (anonymous stock) or holds exactly one IMEI /
/// serial number per received unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingRecord {
    pub item_id: PurchaseItemId,
    pub quantity: Quantity,
    #[serde(default)]
    pub identity_numbers: Vec<String>,
}

impl ReceivingRecord {
    pub fn anonymous(item_id: PurchaseItemId, quantity: u32) -> Self {
        Self {
            item_id,
            quantity: Quantity::new(quantity),
            identity_numbers: Vec::new(),
        }
    }

    /// One unit per identity number.
    pub fn identified<I, S>(item_id: PurchaseItemId, identity_numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let identity_numbers: Vec<String> = identity_numbers.into_iter().map(Into::into).collect();
        Self {
            item_id,
            quantity: Quantity::new(u32::try_from(identity_numbers.len()).unwrap_or(u32::MAX)),
            identity_numbers,
        }
    }
}

/// A validated record, resolved to the index of its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedLine {
    pub index: usize,
    pub quantity: Quantity,
    pub identity_numbers: Vec<String>,
}

/// Validate a whole batch; any bad record rejects the batch.
///
/// `received_identities` holds every identity number already received on the order.
pub(crate) fn plan_receipt(
    items: &[PurchaseItem],
    received_identities: &HashSet<&str>,
    records: &[ReceivingRecord],
) -> Result<Vec<PlannedLine>, PurchasingError> {
    if records.is_empty() {
        return Err(PurchasingError::validation(
            "receipt must contain at least one record",
        ));
    }

    let mut seen_items = HashSet::with_capacity(records.len());
    let mut batch_identities: HashSet<&str> = HashSet::new();
    let mut plan = Vec::with_capacity(records.len());

    for record in records {
        let index = items
            .iter()
            .position(|item| item.id() == &record.item_id)
            .ok_or(PurchasingError::ItemNotFound(record.item_id))?;

        if !seen_items.insert(record.item_id) {
            return Err(PurchasingError::validation(format!(
                "item {} listed more than once in one receipt",
                record.item_id
            )));
        }

        let pending = items[index].pending();
        if record.quantity.is_zero() || record.quantity > pending {
            return Err(PurchasingError::QuantityExceedsOrdered {
                item_id: record.item_id,
                requested: record.quantity,
                pending,
            });
        }

        let supplied = record.identity_numbers.len();
        if supplied != 0 && supplied != record.quantity.get() as usize {
            return Err(PurchasingError::IdentityCountMismatch {
                item_id: record.item_id,
                expected: record.quantity,
                actual: supplied,
            });
        }

        let mut identity_numbers = Vec::with_capacity(supplied);
        for raw in &record.identity_numbers {
            let number = raw.trim();
            if number.is_empty() {
                return Err(PurchasingError::validation(
                    "identity numbers cannot be blank",
                ));
            }
            if received_identities.contains(number) || !batch_identities.insert(number) {
                return Err(PurchasingError::DuplicateIdentityNumber(number.to_string()));
            }
            identity_numbers.push(number.to_string());
        }

        plan.push(PlannedLine {
            index,
            quantity: record.quantity,
            identity_numbers,
        });
    }

    Ok(plan)
}

/// Status implied by the lines' receiving progress, if any stock has arrived.
pub fn infer_status(items: &[PurchaseItem]) -> Option<PurchaseOrderStatus> {
    if !items.is_empty() && items.iter().all(PurchaseItem::is_fully_received) {
        Some(PurchaseOrderStatus::Received)
    } else if items.iter().any(|item| !item.received.is_zero()) {
        Some(PurchaseOrderStatus::Partial)
    } else {
        None
    }
}
