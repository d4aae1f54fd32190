use std::sync::Mutex;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use stockwise_core::TenantId;
use stockwise_events::EventEnvelope;
use stockwise_inventory::{IncreaseStock, PostingOutcome, StockError, StockMovement, StockService};
use stockwise_purchasing::{AGGREGATE_TYPE, PurchaseOrderEvent};

use super::cursor::{self, CursorKey, Cursors, Position};

#[derive(Debug, Error)]
pub enum StockPostingError {
    #[error("failed to deserialize purchase order event: {0}")]
    Deserialize(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
    #[error(transparent)]
    Stock(#[from] StockError),
}

/// How many movements changed stock, and how many were already posted.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PostingReport {
    pub applied: usize,
    pub already_posted: usize,
}

impl std::ops::AddAssign for PostingReport {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.already_posted += other.already_posted;
    }
}

impl PostingReport {
    fn record(&mut self, outcome: PostingOutcome) {
        match outcome {
            PostingOutcome::Applied => self.applied += 1,
            PostingOutcome::AlreadyPosted => self.already_posted += 1,
        }
    }
}

/// Turns committed `StockReceived` events into stock increases, one call per movement.
///
/// Two layers absorb duplicates: the per-stream cursor drops redelivered envelopes, and
/// the stock service itself ignores a source reference it has already posted. The
/// cursor only advances once every movement of the event is posted, so a failed
/// posting is retried in full on the next delivery.
#[derive(Debug)]
pub struct StockPostingProjection<St> {
    stock: St,
    cursors: Mutex<Cursors>,
}

impl<St> StockPostingProjection<St>
where
    St: StockService,
{
    pub fn new(stock: St) -> Self {
        Self {
            stock,
            cursors: Mutex::new(Cursors::new()),
        }
    }

    pub fn stock(&self) -> &St {
        &self.stock
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<PostingReport, StockPostingError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE {
            return Ok(PostingReport::default());
        }

        let tenant_id = envelope.tenant_id();
        let key = CursorKey {
            tenant_id,
            aggregate_id: envelope.aggregate_id(),
        };
        let seq = envelope.sequence_number();

        let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
        match cursor::position(&cursors, key, seq) {
            Position::Seen => return Ok(PostingReport::default()),
            Position::Gap { last } => {
                return Err(StockPostingError::NonMonotonicSequence { last, found: seq });
            }
            Position::Next => {}
        }

        let ev: PurchaseOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockPostingError::Deserialize(e.to_string()))?;
        if ev.tenant_id() != tenant_id {
            return Err(StockPostingError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }

        let report = match &ev {
            PurchaseOrderEvent::StockReceived(e) => {
                let report = self.post_movements(tenant_id, &e.movements)?;
                info!(
                    order_id = %e.order_id,
                    receipt_no = e.receipt_no,
                    applied = report.applied,
                    already_posted = report.already_posted,
                    "receipt posted to stock"
                );
                report
            }
            _ => PostingReport::default(),
        };

        cursors.insert(key, seq);
        Ok(report)
    }

    /// Post movements directly, bypassing the cursor (reconciliation path).
    pub fn post_movements<'a>(
        &self,
        tenant_id: TenantId,
        movements: impl IntoIterator<Item = &'a StockMovement>,
    ) -> Result<PostingReport, StockError> {
        let mut report = PostingReport::default();
        for movement in movements {
            let outcome = self
                .stock
                .increase_stock(tenant_id, IncreaseStock::from(movement))?;
            if outcome == PostingOutcome::AlreadyPosted {
                debug!(source = %movement.source, "movement already posted");
            }
            report.record(outcome);
        }
        Ok(report)
    }
}
