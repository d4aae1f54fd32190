//! Purchasing application service: the operations exposed to calling layers.
//!
//! Every mutating operation goes through the command dispatcher (load, decide, append
//! with the loaded stream version), then brings the read model and stock up to date
//! from the order's stream. The append is the commit point: an operation that returns
//! an error wrote nothing, and one that committed returns its view even when the read
//! model or stock could not follow. Stock posting is idempotent on the movement's
//! source reference, so retrying a receive (same idempotency key) or calling
//! `reconcile_stock` re-posts safely.
//!
//! Identity numbers are held in the stock service for the order before its receipt is
//! appended, and the hold is confirmed or released once the append's outcome is known.
//! A committed receipt therefore never carries a number another order can claim.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{Level, debug, info, instrument, warn};
use uuid::Uuid;

use stockwise_core::{AggregateId, AggregateRoot, Money, TenantId};
use stockwise_events::{EventBus, EventEnvelope};
use stockwise_inventory::{ShopId, StockError, StockService};
use stockwise_purchasing::{
    AGGREGATE_TYPE, ChangeStatus, CreatePurchaseOrder, DeletePurchaseOrder, NewPurchaseItem,
    OrderView, PaymentMethod, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId,
    PurchaseOrderStatus, PurchasingError, ReceiveStock, ReceivingRecord, RecordPayment,
    SupplierDirectory, SupplierId,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::config::PurchasingConfig;
use crate::event_store::{EventStore, EventStoreError};
use crate::invoice_numbers::InvoiceNumbers;
use crate::projections::{
    PostingReport, PurchaseOrderProjectionError, PurchaseOrderSummary, PurchaseOrdersProjection,
    StockPostingError, StockPostingProjection,
};
use crate::read_model::InMemoryTenantStore;

/// What callers see when an operation fails.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A business rejection; nothing was written.
    #[error(transparent)]
    Purchasing(#[from] PurchasingError),
    #[error("event store failure: {0}")]
    Store(#[source] EventStoreError),
    /// Stored history could not be read back (deserialization, isolation, sequencing).
    #[error("purchase order history is unreadable: {0}")]
    Corrupt(String),
    /// The stock service failed (identity holds, or postings during `reconcile_stock`).
    #[error("stock posting failed: {0}")]
    StockPosting(#[source] StockError),
}

impl From<DispatchError<PurchasingError>> for ServiceError {
    fn from(value: DispatchError<PurchasingError>) -> Self {
        match value {
            DispatchError::Rejected(e) => ServiceError::Purchasing(e),
            DispatchError::Concurrency(msg) => {
                ServiceError::Purchasing(PurchasingError::ConcurrentModification(msg))
            }
            DispatchError::TenantIsolation(msg) | DispatchError::Deserialize(msg) => {
                ServiceError::Corrupt(msg)
            }
            DispatchError::Store(e) => ServiceError::Store(e),
        }
    }
}

impl From<PurchaseOrderProjectionError> for ServiceError {
    fn from(value: PurchaseOrderProjectionError) -> Self {
        ServiceError::Corrupt(value.to_string())
    }
}

impl From<StockPostingError> for ServiceError {
    fn from(value: StockPostingError) -> Self {
        match value {
            StockPostingError::Stock(e) => ServiceError::StockPosting(e),
            other => ServiceError::Corrupt(other.to_string()),
        }
    }
}

impl ServiceError {
    /// The domain rejection, if this is one.
    pub fn purchasing(&self) -> Option<&PurchasingError> {
        match self {
            ServiceError::Purchasing(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ServiceError::Purchasing(PurchasingError::ConcurrentModification(_))
        )
    }
}

/// Input of `create_purchase_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseOrder {
    pub supplier_id: SupplierId,
    pub shop_id: ShopId,
    pub items: Vec<NewPurchaseItem>,
    pub notes: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Allocated from the configured prefix when absent.
    pub invoice_number: Option<String>,
    /// Start in `Ordered` (already placed with the supplier) instead of `Draft`.
    pub placed: bool,
}

type OrdersReadModel = PurchaseOrdersProjection<InMemoryTenantStore<PurchaseOrderId, PurchaseOrderSummary>>;

pub struct PurchasingService<S, B, St, D> {
    dispatcher: CommandDispatcher<S, B>,
    orders: OrdersReadModel,
    posting: StockPostingProjection<St>,
    suppliers: D,
    invoice_numbers: InvoiceNumbers,
    config: PurchasingConfig,
}

fn empty_order(_: TenantId, id: AggregateId) -> PurchaseOrder {
    PurchaseOrder::empty(PurchaseOrderId::new(id))
}

impl<S, B, St, D> PurchasingService<S, B, St, D>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    St: StockService,
    D: SupplierDirectory,
{
    pub fn new(store: S, bus: B, stock: St, suppliers: D, config: PurchasingConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            orders: PurchaseOrdersProjection::new(InMemoryTenantStore::new()),
            posting: StockPostingProjection::new(stock),
            suppliers,
            invoice_numbers: InvoiceNumbers::new(config.invoice_prefix.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PurchasingConfig {
        &self.config
    }

    pub fn stock(&self) -> &St {
        self.posting.stock()
    }

    pub fn event_store(&self) -> &S {
        self.dispatcher.store()
    }

    #[instrument(
        skip(self, input),
        fields(
            tenant_id = %tenant_id,
            supplier_id = %input.supplier_id,
            order_id = tracing::field::Empty
        ),
        err(level = Level::WARN)
    )]
    pub fn create_purchase_order(
        &self,
        tenant_id: TenantId,
        input: NewPurchaseOrder,
    ) -> Result<OrderView, ServiceError> {
        let supplier = self
            .suppliers
            .find(tenant_id, input.supplier_id)
            .ok_or(PurchasingError::UnknownSupplier(input.supplier_id))?;

        let order_id = PurchaseOrderId::new(AggregateId::new());
        tracing::Span::current().record("order_id", tracing::field::display(order_id));
        let now = Utc::now();

        let invoice_number = match input.invoice_number.as_deref() {
            Some(number) => self.invoice_numbers.reserve(tenant_id, number, order_id)?,
            None => self.invoice_numbers.allocate(tenant_id, now, order_id),
        };

        let command = PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
            tenant_id,
            order_id,
            invoice_number: invoice_number.clone(),
            supplier_id: input.supplier_id,
            shop_id: input.shop_id,
            items: input.items,
            notes: input.notes,
            due_date: input.due_date,
            placed: input.placed,
            occurred_at: now,
        });

        let dispatched = match self.dispatch(tenant_id, order_id, &command) {
            Ok(d) => d,
            Err(e) => {
                self.invoice_numbers
                    .release(tenant_id, &invoice_number, order_id);
                return Err(e);
            }
        };

        let order = dispatched.aggregate;
        info!(
            invoice_number = %order.invoice_number(),
            total = %order.total_amount(),
            status = %order.status(),
            "purchase order created"
        );
        self.catch_up(tenant_id, order_id);
        Ok(OrderView::from_order(&order, Some(supplier)))
    }

    /// Receive one batch of deliveries, all-or-nothing.
    #[instrument(
        skip(self, records),
        fields(tenant_id = %tenant_id, order_id = %order_id, records = records.len()),
        err(level = Level::WARN)
    )]
    pub fn receive_stock(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        idempotency_key: &str,
        records: Vec<ReceivingRecord>,
    ) -> Result<OrderView, ServiceError> {
        if records.len() > self.config.max_receive_batch {
            return Err(PurchasingError::validation(format!(
                "receipt has {} records, at most {} are accepted",
                records.len(),
                self.config.max_receive_batch
            ))
            .into());
        }
        let identities = identity_numbers(&records);
        self.hold_identities(tenant_id, order_id, &identities)?;

        let command = PurchaseOrderCommand::ReceiveStock(ReceiveStock {
            tenant_id,
            order_id,
            idempotency_key: idempotency_key.to_string(),
            records,
            occurred_at: Utc::now(),
        });
        let dispatched = match self.dispatch(tenant_id, order_id, &command) {
            Ok(d) => d,
            Err(e) => {
                self.settle_identities(tenant_id, order_id, &identities, false);
                return Err(e);
            }
        };
        self.settle_identities(tenant_id, order_id, &identities, true);
        let order = dispatched.aggregate;

        if dispatched.committed.is_empty() {
            // Replay of an accepted receipt: make sure its movements reached stock.
            let receipt = order.receipt_by_key(idempotency_key.trim());
            match self
                .posting
                .post_movements(tenant_id, receipt.into_iter().flat_map(|r| &r.movements))
            {
                Ok(report) => debug!(
                    applied = report.applied,
                    already_posted = report.already_posted,
                    "idempotent receive replay"
                ),
                Err(e) => warn!(error = %e, "replayed receipt still not posted to stock"),
            }
        } else {
            info!(
                status = %order.status(),
                version = order.version(),
                "stock received"
            );
            self.catch_up(tenant_id, order_id);
        }

        Ok(self.view(tenant_id, &order))
    }

    #[instrument(
        skip(self, reference),
        fields(tenant_id = %tenant_id, order_id = %order_id, amount = %amount),
        err(level = Level::WARN)
    )]
    pub fn record_payment(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        amount: Money,
        method: PaymentMethod,
        reference: Option<String>,
    ) -> Result<OrderView, ServiceError> {
        let command = PurchaseOrderCommand::RecordPayment(RecordPayment {
            tenant_id,
            order_id,
            payment_id: Uuid::now_v7(),
            amount,
            method,
            reference,
            occurred_at: Utc::now(),
        });
        let order = self.dispatch(tenant_id, order_id, &command)?.aggregate;
        info!(paid = %order.paid_amount(), due = %order.due_amount(), "payment recorded");
        self.catch_up(tenant_id, order_id);
        Ok(self.view(tenant_id, &order))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err(level = Level::WARN))]
    pub fn change_status(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        status: PurchaseOrderStatus,
    ) -> Result<OrderView, ServiceError> {
        let command = PurchaseOrderCommand::ChangeStatus(ChangeStatus {
            tenant_id,
            order_id,
            status,
            occurred_at: Utc::now(),
        });
        let order = self.dispatch(tenant_id, order_id, &command)?.aggregate;
        info!(status = %order.status(), "purchase order status changed");
        self.catch_up(tenant_id, order_id);
        Ok(self.view(tenant_id, &order))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err(level = Level::WARN))]
    pub fn delete_purchase_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<(), ServiceError> {
        let command = PurchaseOrderCommand::DeletePurchaseOrder(DeletePurchaseOrder {
            tenant_id,
            order_id,
            occurred_at: Utc::now(),
        });
        self.dispatch(tenant_id, order_id, &command)?;
        info!("purchase order deleted");
        self.catch_up(tenant_id, order_id);
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err(level = Level::DEBUG))]
    pub fn get_order(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<OrderView, ServiceError> {
        let order = self.load(tenant_id, order_id)?;
        if !order.exists() {
            return Err(PurchasingError::NotFound.into());
        }
        Ok(self.view(tenant_id, &order))
    }

    /// Orders of one tenant from the listing read model, oldest first.
    pub fn list_orders(&self, tenant_id: TenantId) -> Vec<PurchaseOrderSummary> {
        self.orders.list(tenant_id)
    }

    /// Re-post every movement of an order and bring the read model up to date.
    ///
    /// Safe at any time: postings are idempotent on their source reference.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    pub fn reconcile_stock(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PostingReport, ServiceError> {
        let order = self.load(tenant_id, order_id)?;
        if order.version() == 0 {
            return Err(PurchasingError::NotFound.into());
        }
        let report = self
            .posting
            .post_movements(tenant_id, order.movements())
            .map_err(ServiceError::StockPosting)?;
        self.try_catch_up(tenant_id, order_id)?;
        info!(
            applied = report.applied,
            already_posted = report.already_posted,
            "stock reconciled"
        );
        Ok(report)
    }

    fn dispatch(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        command: &PurchaseOrderCommand,
    ) -> Result<Dispatched<PurchaseOrder>, ServiceError> {
        Ok(self
            .dispatcher
            .dispatch(tenant_id, order_id.0, AGGREGATE_TYPE, command, empty_order)?)
    }

    fn load(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<PurchaseOrder, ServiceError> {
        let (order, _) = self.dispatcher.load(tenant_id, order_id.0, empty_order)?;
        Ok(order)
    }

    fn view(&self, tenant_id: TenantId, order: &PurchaseOrder) -> OrderView {
        let supplier = order
            .supplier_id()
            .and_then(|id| self.suppliers.find(tenant_id, id));
        OrderView::from_order(order, supplier)
    }

    /// Feed the order's whole stream to the projections: the listing first, then stock.
    ///
    /// Cursors skip what was already applied, so concurrent callers never double-apply
    /// and a caller that lost a race simply finds nothing left to do.
    fn try_catch_up(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    ) -> Result<PostingReport, ServiceError> {
        let envelopes: Vec<_> = self
            .dispatcher
            .store()
            .load_stream(tenant_id, order_id.0)
            .map_err(ServiceError::Store)?
            .iter()
            .map(|stored| stored.to_envelope())
            .collect();

        for envelope in &envelopes {
            self.orders.apply_envelope(envelope)?;
        }
        let mut report = PostingReport::default();
        for envelope in &envelopes {
            report += self.posting.apply_envelope(envelope)?;
        }
        Ok(report)
    }

    /// Catch-up after a commit. Failures do not undo the commit; the next command on
    /// the order or `reconcile_stock` picks them up.
    fn catch_up(&self, tenant_id: TenantId, order_id: PurchaseOrderId) {
        if let Err(e) = self.try_catch_up(tenant_id, order_id) {
            warn!(error = %e, "committed events not yet reflected in read model or stock");
        }
    }

    fn hold_identities(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        identities: &[String],
    ) -> Result<(), ServiceError> {
        if identities.is_empty() {
            return Ok(());
        }
        self.stock()
            .reserve_identities(tenant_id, order_id.0, identities)
            .map_err(|e| match e {
                StockError::IdentityHeld { identity, .. }
                | StockError::IdentityConflict { identity, .. } => {
                    PurchasingError::DuplicateIdentityNumber(identity).into()
                }
                other => ServiceError::StockPosting(other),
            })
    }

    fn settle_identities(
        &self,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
        identities: &[String],
        committed: bool,
    ) {
        if identities.is_empty() {
            return;
        }
        let settled = if committed {
            self.stock()
                .confirm_identities(tenant_id, order_id.0, identities)
        } else {
            self.stock()
                .release_identities(tenant_id, order_id.0, identities)
        };
        if let Err(e) = settled {
            warn!(error = %e, committed, "identity hold left unsettled");
        }
    }
}

/// Distinct, trimmed identity numbers of a batch.
fn identity_numbers(records: &[ReceivingRecord]) -> Vec<String> {
    let mut numbers: Vec<String> = records
        .iter()
        .flat_map(|r| r.identity_numbers.iter())
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    numbers.sort();
    numbers.dedup();
    numbers
}
