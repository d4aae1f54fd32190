use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockwise_core::{Money, TenantId};
use stockwise_events::EventEnvelope;
use stockwise_inventory::ShopId;
use stockwise_purchasing::{
    AGGREGATE_TYPE, PurchaseOrderEvent, PurchaseOrderId, PurchaseOrderStatus, SupplierId,
};

use super::cursor::{self, CursorKey, Cursors, Position};
use crate::read_model::TenantStore;

/// One row of the purchase order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOrderSummary {
    pub order_id: PurchaseOrderId,
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub shop_id: ShopId,
    pub status: PurchaseOrderStatus,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub line_count: usize,
    pub ordered_units: u64,
    pub received_units: u64,
    pub order_date: DateTime<Utc>,
    pub received_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl PurchaseOrderSummary {
    pub fn due_amount(&self) -> Money {
        self.total_amount
            .checked_sub(self.paid_amount)
            .unwrap_or(Money::ZERO)
    }
}

#[derive(Debug, Error)]
pub enum PurchaseOrderProjectionError {
    #[error("failed to deserialize purchase order event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Purchase order listing read model.
///
/// Deleted orders are removed from the store; the stream itself stays in the event
/// store as the audit trail.
#[derive(Debug)]
pub struct PurchaseOrdersProjection<S>
where
    S: TenantStore<PurchaseOrderId, PurchaseOrderSummary>,
{
    store: S,
    // Held for the whole apply so concurrent deliveries of one stream cannot interleave.
    cursors: Mutex<Cursors>,
}

impl<S> PurchaseOrdersProjection<S>
where
    S: TenantStore<PurchaseOrderId, PurchaseOrderSummary>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: Mutex::new(Cursors::new()),
        }
    }

    pub fn get(&self, tenant_id: TenantId, order_id: &PurchaseOrderId) -> Option<PurchaseOrderSummary> {
        self.store.get(tenant_id, order_id)
    }

    /// Orders of one tenant, oldest first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<PurchaseOrderSummary> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| {
            a.order_date
                .cmp(&b.order_date)
                .then_with(|| a.invoice_number.cmp(&b.invoice_number))
        });
        rows
    }

    /// Returns `false` when the envelope was skipped (other aggregate type or redelivery).
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<bool, PurchaseOrderProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(false);
        }

        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let key = CursorKey {
            tenant_id,
            aggregate_id,
        };

        // A poisoned cursor map is still a valid map; keep projecting.
        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        match cursor::position(&cursors, key, seq) {
            Position::Seen => return Ok(false),
            Position::Gap { last } => {
                return Err(PurchaseOrderProjectionError::NonMonotonicSequence {
                    last,
                    found: seq,
                });
            }
            Position::Next => {}
        }

        let ev: PurchaseOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| PurchaseOrderProjectionError::Deserialize(e.to_string()))?;

        if ev.tenant_id() != tenant_id {
            return Err(PurchaseOrderProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if ev.order_id().0 != aggregate_id {
            return Err(PurchaseOrderProjectionError::TenantIsolation(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.order_id,
                    PurchaseOrderSummary {
                        order_id: e.order_id,
                        invoice_number: e.invoice_number,
                        supplier_id: e.supplier_id,
                        shop_id: e.shop_id,
                        status: e.status,
                        total_amount: e.total_amount,
                        paid_amount: Money::ZERO,
                        line_count: e.items.len(),
                        ordered_units: e.items.iter().map(|i| u64::from(i.ordered.get())).sum(),
                        received_units: 0,
                        order_date: e.occurred_at,
                        received_date: None,
                        due_date: e.due_date,
                    },
                );
            }
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &e.order_id) {
                    row.status = e.to;
                    self.store.upsert(tenant_id, e.order_id, row);
                }
            }
            PurchaseOrderEvent::StockReceived(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &e.order_id) {
                    row.received_units += e
                        .movements
                        .iter()
                        .map(|m| u64::from(m.quantity.get()))
                        .sum::<u64>();
                    row.status = e.status;
                    if row.received_date.is_none() {
                        row.received_date = e.received_date;
                    }
                    self.store.upsert(tenant_id, e.order_id, row);
                }
            }
            PurchaseOrderEvent::PaymentRecorded(e) => {
                if let Some(mut row) = self.store.get(tenant_id, &e.order_id) {
                    row.paid_amount = row.paid_amount.saturating_add(e.payment.amount);
                    self.store.upsert(tenant_id, e.order_id, row);
                }
            }
            PurchaseOrderEvent::PurchaseOrderDeleted(e) => {
                self.store.remove(tenant_id, &e.order_id);
            }
        }

        cursors.insert(key, seq);
        Ok(true)
    }

    /// Drop the read model of every tenant present in `envelopes` and replay them.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), PurchaseOrderProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort();
            tenants.dedup();
            let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
            for t in tenants {
                self.store.clear_tenant(t);
                cursor::clear_tenant(&mut cursors, t);
            }
        }

        envs.sort_by_key(|e| (e.tenant_id(), e.aggregate_id(), e.sequence_number()));
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
