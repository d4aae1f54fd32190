use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockwise_core::{Aggregate, AggregateId, AggregateRoot, Money, Quantity, TenantId};
use stockwise_events::{Command, Event};
use stockwise_inventory::{ShopId, SourceRef, StockMovement};

use crate::error::PurchasingError;
use crate::item::{NewPurchaseItem, PurchaseItem};
use crate::payment::{Payment, PaymentMethod};
use crate::receiving::{ReceivingRecord, infer_status, plan_receipt};
use crate::status::PurchaseOrderStatus;
use crate::supplier::SupplierId;

/// Stream type under which purchase orders are stored.
pub const AGGREGATE_TYPE: &str = "purchasing.order";

/// Purchase order identifier (tenant-scoped via `tenant_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A receive operation that has been applied to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_no: u32,
    pub idempotency_key: String,
    pub records: Vec<ReceivingRecord>,
    pub movements: Vec<StockMovement>,
    pub received_at: DateTime<Utc>,
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    tenant_id: Option<TenantId>,
    invoice_number: String,
    supplier_id: Option<SupplierId>,
    shop_id: Option<ShopId>,
    status: PurchaseOrderStatus,
    items: Vec<PurchaseItem>,
    total_amount: Money,
    paid_amount: Money,
    payments: Vec<Payment>,
    receipts: Vec<Receipt>,
    order_date: Option<DateTime<Utc>>,
    received_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            tenant_id: None,
            invoice_number: String::new(),
            supplier_id: None,
            shop_id: None,
            status: PurchaseOrderStatus::Draft,
            items: Vec::new(),
            total_amount: Money::ZERO,
            paid_amount: Money::ZERO,
            payments: Vec::new(),
            receipts: Vec::new(),
            order_date: None,
            received_date: None,
            due_date: None,
            notes: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Created and not deleted.
    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn status(&self) -> PurchaseOrderStatus {
        self.status
    }

    pub fn items(&self) -> &[PurchaseItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    /// Always derived from total and paid, never stored.
    pub fn due_amount(&self) -> Money {
        self.total_amount
            .checked_sub(self.paid_amount)
            .unwrap_or(Money::ZERO)
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn order_date(&self) -> Option<DateTime<Utc>> {
        self.order_date
    }

    pub fn received_date(&self) -> Option<DateTime<Utc>> {
        self.received_date
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn has_received_stock(&self) -> bool {
        self.items.iter().any(|item| !item.received.is_zero())
    }

    /// Every stock movement ever posted against this order, in receipt order.
    pub fn movements(&self) -> impl Iterator<Item = &StockMovement> {
        self.receipts.iter().flat_map(|r| r.movements.iter())
    }

    pub fn receipt_by_key(&self, idempotency_key: &str) -> Option<&Receipt> {
        self.receipts
            .iter()
            .find(|r| r.idempotency_key == idempotency_key)
    }

    fn received_identities(&self) -> HashSet<&str> {
        self.movements()
            .flat_map(|m| m.identity_numbers.iter().map(String::as_str))
            .collect()
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub shop_id: ShopId,
    pub items: Vec<NewPurchaseItem>,
    pub notes: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Already placed with the supplier: start in `Ordered` instead of `Draft`.
    pub placed: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus (manual transition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub status: PurchaseOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock (one batch, all-or-nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub idempotency_key: String,
    pub records: Vec<ReceivingRecord>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub payment_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeletePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePurchaseOrder {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    ChangeStatus(ChangeStatus),
    ReceiveStock(ReceiveStock),
    RecordPayment(RecordPayment),
    DeletePurchaseOrder(DeletePurchaseOrder),
}

impl PurchaseOrderCommand {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            PurchaseOrderCommand::CreatePurchaseOrder(c) => c.tenant_id,
            PurchaseOrderCommand::ChangeStatus(c) => c.tenant_id,
            PurchaseOrderCommand::ReceiveStock(c) => c.tenant_id,
            PurchaseOrderCommand::RecordPayment(c) => c.tenant_id,
            PurchaseOrderCommand::DeletePurchaseOrder(c) => c.tenant_id,
        }
    }

    pub fn order_id(&self) -> PurchaseOrderId {
        match self {
            PurchaseOrderCommand::CreatePurchaseOrder(c) => c.order_id,
            PurchaseOrderCommand::ChangeStatus(c) => c.order_id,
            PurchaseOrderCommand::ReceiveStock(c) => c.order_id,
            PurchaseOrderCommand::RecordPayment(c) => c.order_id,
            PurchaseOrderCommand::DeletePurchaseOrder(c) => c.order_id,
        }
    }
}

impl Command for PurchaseOrderCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.order_id().0
    }
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub invoice_number: String,
    pub supplier_id: SupplierId,
    pub shop_id: ShopId,
    pub items: Vec<PurchaseItem>,
    pub total_amount: Money,
    pub status: PurchaseOrderStatus,
    pub notes: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderStatusChanged (manual transitions only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderStatusChanged {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub from: PurchaseOrderStatus,
    pub to: PurchaseOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
///
/// The single fact that carries a whole receipt: line increments (via `movements`,
/// one per line), the identity numbers, and the status derived from the resulting
/// line progress. Stock posting consumes `movements`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub receipt_no: u32,
    pub idempotency_key: String,
    pub records: Vec<ReceivingRecord>,
    pub movements: Vec<StockMovement>,
    pub status: PurchaseOrderStatus,
    /// Set only by the receipt that first completes the order.
    pub received_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderDeleted (tombstone; the stream stays as audit trail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderDeleted {
    pub tenant_id: TenantId,
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    PurchaseOrderStatusChanged(PurchaseOrderStatusChanged),
    StockReceived(StockReceived),
    PaymentRecorded(PaymentRecorded),
    PurchaseOrderDeleted(PurchaseOrderDeleted),
}

impl PurchaseOrderEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.tenant_id,
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => e.tenant_id,
            PurchaseOrderEvent::StockReceived(e) => e.tenant_id,
            PurchaseOrderEvent::PaymentRecorded(e) => e.tenant_id,
            PurchaseOrderEvent::PurchaseOrderDeleted(e) => e.tenant_id,
        }
    }

    pub fn order_id(&self) -> PurchaseOrderId {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.order_id,
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => e.order_id,
            PurchaseOrderEvent::StockReceived(e) => e.order_id,
            PurchaseOrderEvent::PaymentRecorded(e) => e.order_id,
            PurchaseOrderEvent::PurchaseOrderDeleted(e) => e.order_id,
        }
    }
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::PurchaseOrderStatusChanged(_) => "purchasing.order.status_changed",
            PurchaseOrderEvent::StockReceived(_) => "purchasing.order.stock_received",
            PurchaseOrderEvent::PaymentRecorded(_) => "purchasing.order.payment_recorded",
            PurchaseOrderEvent::PurchaseOrderDeleted(_) => "purchasing.order.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => e.occurred_at,
            PurchaseOrderEvent::StockReceived(e) => e.occurred_at,
            PurchaseOrderEvent::PaymentRecorded(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = PurchasingError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.tenant_id = Some(e.tenant_id);
                self.invoice_number = e.invoice_number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.shop_id = Some(e.shop_id);
                self.items = e.items.clone();
                self.total_amount = e.total_amount;
                self.paid_amount = Money::ZERO;
                self.status = e.status;
                self.notes = e.notes.clone();
                self.due_date = e.due_date;
                self.order_date = Some(e.occurred_at);
                self.created = true;
            }
            PurchaseOrderEvent::PurchaseOrderStatusChanged(e) => {
                self.status = e.to;
            }
            PurchaseOrderEvent::StockReceived(e) => {
                for movement in &e.movements {
                    if let Some(item) = self
                        .items
                        .iter_mut()
                        .find(|item| item.item_id.0 == movement.source.item_id)
                    {
                        item.received = item.received.saturating_add(movement.quantity);
                    }
                }
                self.status = e.status;
                if self.received_date.is_none() {
                    self.received_date = e.received_date;
                }
                self.receipts.push(Receipt {
                    receipt_no: e.receipt_no,
                    idempotency_key: e.idempotency_key.clone(),
                    records: e.records.clone(),
                    movements: e.movements.clone(),
                    received_at: e.occurred_at,
                });
            }
            PurchaseOrderEvent::PaymentRecorded(e) => {
                self.paid_amount = self.paid_amount.saturating_add(e.payment.amount);
                self.payments.push(e.payment.clone());
            }
            PurchaseOrderEvent::PurchaseOrderDeleted(_) => {
                self.deleted = true;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            PurchaseOrderCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            PurchaseOrderCommand::DeletePurchaseOrder(cmd) => self.handle_delete(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_exists(&self, tenant_id: TenantId, order_id: PurchaseOrderId) -> Result<(), PurchasingError> {
        if !self.exists() {
            return Err(PurchasingError::NotFound);
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(PurchasingError::validation("tenant mismatch"));
        }
        if self.id != order_id {
            return Err(PurchasingError::validation("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
        if self.created {
            return Err(PurchasingError::AlreadyExists);
        }

        let invoice_number = cmd.invoice_number.trim();
        if invoice_number.is_empty() {
            return Err(PurchasingError::validation("invoice number cannot be empty"));
        }

        if cmd.items.is_empty() {
            return Err(PurchasingError::validation(
                "purchase order needs at least one item",
            ));
        }

        let mut seen = HashSet::with_capacity(cmd.items.len());
        let mut items = Vec::with_capacity(cmd.items.len());
        for (idx, line) in cmd.items.iter().enumerate() {
            if !seen.insert(line.item_id) {
                return Err(PurchasingError::validation(format!(
                    "duplicate item id {}",
                    line.item_id
                )));
            }
            if line.quantity.is_zero() {
                return Err(PurchasingError::validation(
                    "ordered quantity must be at least 1",
                ));
            }
            items.push(PurchaseItem {
                item_id: line.item_id,
                line_no: (idx as u32) + 1,
                product_id: line.product_id,
                ordered: line.quantity,
                received: Quantity::ZERO,
                unit_cost: line.unit_cost,
                total_cost: line.unit_cost.times(line.quantity)?,
            });
        }

        let total_amount = Money::sum(items.iter().map(|item| &item.total_cost))?;
        let status = if cmd.placed {
            PurchaseOrderStatus::Ordered
        } else {
            PurchaseOrderStatus::Draft
        };
        let notes = cmd
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                invoice_number: invoice_number.to_string(),
                supplier_id: cmd.supplier_id,
                shop_id: cmd.shop_id,
                items,
                total_amount,
                status,
                notes,
                due_date: cmd.due_date,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeStatus,
    ) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        let from = self.status;
        let to = cmd.status;

        if from == to {
            return Err(PurchasingError::transition(from, to, "order is already in that status"));
        }
        if from.is_terminal() {
            return Err(PurchasingError::transition(from, to, "status is terminal"));
        }
        if to.is_receiving_derived() {
            return Err(PurchasingError::transition(
                from,
                to,
                "status is derived from receiving progress",
            ));
        }
        if !from.can_transition_to(to) {
            return Err(PurchasingError::transition(from, to, "transition not allowed"));
        }

        match to {
            PurchaseOrderStatus::Completed if !self.due_amount().is_zero() => {
                return Err(PurchasingError::transition(
                    from,
                    to,
                    "due amount must be settled first",
                ));
            }
            PurchaseOrderStatus::Cancelled if self.has_received_stock() => {
                return Err(PurchasingError::transition(
                    from,
                    to,
                    "stock has already been received against this order",
                ));
            }
            _ => {}
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderStatusChanged(
            PurchaseOrderStatusChanged {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                from,
                to,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_receive(
        &self,
        cmd: &ReceiveStock,
    ) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        let key = cmd.idempotency_key.trim();
        if key.is_empty() {
            return Err(PurchasingError::validation("idempotency key cannot be empty"));
        }

        // Replays are checked before status: the original receipt may have moved the
        // order to `Received`.
        if let Some(previous) = self.receipt_by_key(key) {
            if previous.records == cmd.records {
                return Ok(vec![]);
            }
            return Err(PurchasingError::IdempotencyKeyReused(key.to_string()));
        }

        if !self.status.accepts_receipts() {
            return Err(PurchasingError::OrderNotReceivable(self.status));
        }

        let shop_id = self
            .shop_id
            .ok_or_else(|| PurchasingError::validation("order has no receiving shop"))?;

        let received_identities = self.received_identities();
        let plan = plan_receipt(&self.items, &received_identities, &cmd.records)?;

        let receipt_no = u32::try_from(self.receipts.len())
            .map_err(|_| PurchasingError::validation("too many receipts on one order"))?
            + 1;

        let mut projected = self.items.clone();
        let mut movements = Vec::with_capacity(plan.len());
        for line in plan {
            let item = &mut projected[line.index];
            item.received = item.received.checked_add(line.quantity)?;
            movements.push(StockMovement {
                product_id: item.product_id,
                shop_id,
                quantity: line.quantity,
                unit_cost: item.unit_cost,
                source: SourceRef {
                    order_id: self.id.0,
                    item_id: item.item_id.0,
                    receipt_no,
                },
                identity_numbers: line.identity_numbers,
                occurred_at: cmd.occurred_at,
            });
        }

        // A non-empty valid plan always leaves at least one line received.
        let status = infer_status(&projected).unwrap_or(PurchaseOrderStatus::Partial);
        let received_date = (status == PurchaseOrderStatus::Received
            && self.received_date.is_none())
        .then_some(cmd.occurred_at);

        Ok(vec![PurchaseOrderEvent::StockReceived(StockReceived {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            receipt_no,
            idempotency_key: key.to_string(),
            records: cmd.records.clone(),
            movements,
            status,
            received_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_payment(
        &self,
        cmd: &RecordPayment,
    ) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status == PurchaseOrderStatus::Cancelled {
            return Err(PurchasingError::OrderCancelled);
        }

        let due = self.due_amount();
        if cmd.amount.is_zero() || cmd.amount > due {
            return Err(PurchasingError::PaymentExceedsDue {
                amount: cmd.amount,
                due,
            });
        }

        if self.payments.iter().any(|p| p.payment_id == cmd.payment_id) {
            return Err(PurchasingError::validation(format!(
                "payment {} already recorded",
                cmd.payment_id
            )));
        }

        let reference = cmd
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Ok(vec![PurchaseOrderEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            order_id: cmd.order_id,
            payment: Payment {
                payment_id: cmd.payment_id,
                amount: cmd.amount,
                method: cmd.method,
                reference,
                paid_at: cmd.occurred_at,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(
        &self,
        cmd: &DeletePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
        self.ensure_exists(cmd.tenant_id, cmd.order_id)?;

        if self.status == PurchaseOrderStatus::Completed {
            return Err(PurchasingError::CannotDeleteCompleted);
        }
        if !self.status.is_deletable() || self.has_received_stock() {
            return Err(PurchasingError::CannotDeleteReceivedOrder);
        }

        Ok(vec![PurchaseOrderEvent::PurchaseOrderDeleted(
            PurchaseOrderDeleted {
                tenant_id: cmd.tenant_id,
                order_id: cmd.order_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::PurchaseItemId;
    use rust_decimal_macros::dec;
    use stockwise_inventory::ProductId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_order_id() -> PurchaseOrderId {
        PurchaseOrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn money(value: rust_decimal::Decimal) -> Money {
        Money::new(value).unwrap()
    }

    fn new_line(quantity: u32, unit_cost: Money) -> NewPurchaseItem {
        NewPurchaseItem {
            item_id: PurchaseItemId::new(AggregateId::new()),
            product_id: ProductId::new(AggregateId::new()),
            quantity: Quantity::new(quantity),
            unit_cost,
        }
    }

    struct Fixture {
        order: PurchaseOrder,
        tenant_id: TenantId,
        order_id: PurchaseOrderId,
    }

    impl Fixture {
        /// Order created and applied; `placed` decides Draft vs Ordered.
        fn new(lines: Vec<NewPurchaseItem>, placed: bool) -> Self {
            let tenant_id = test_tenant_id();
            let order_id = test_order_id();
            let mut order = PurchaseOrder::empty(order_id);
            let cmd = CreatePurchaseOrder {
                tenant_id,
                order_id,
                invoice_number: "PO-20260101-0001".to_string(),
                supplier_id: SupplierId::new(AggregateId::new()),
                shop_id: ShopId::new(AggregateId::new()),
                items: lines,
                notes: Some("  first order  ".to_string()),
                due_date: None,
                placed,
                occurred_at: test_time(),
            };
            let events = order
                .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
                .unwrap();
            order.apply(&events[0]);
            Self {
                order,
                tenant_id,
                order_id,
            }
        }

        fn run(&mut self, cmd: PurchaseOrderCommand) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
            let events = self.order.handle(&cmd)?;
            for e in &events {
                self.order.apply(e);
            }
            Ok(events)
        }

        fn receive(&mut self, key: &str, records: Vec<ReceivingRecord>) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
            self.run(PurchaseOrderCommand::ReceiveStock(ReceiveStock {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                idempotency_key: key.to_string(),
                records,
                occurred_at: test_time(),
            }))
        }

        fn pay(&mut self, amount: Money) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
            self.run(PurchaseOrderCommand::RecordPayment(RecordPayment {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                payment_id: Uuid::now_v7(),
                amount,
                method: PaymentMethod::BankTransfer,
                reference: None,
                occurred_at: test_time(),
            }))
        }

        fn change_status(&mut self, status: PurchaseOrderStatus) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
            self.run(PurchaseOrderCommand::ChangeStatus(ChangeStatus {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                status,
                occurred_at: test_time(),
            }))
        }

        fn delete(&mut self) -> Result<Vec<PurchaseOrderEvent>, PurchasingError> {
            self.run(PurchaseOrderCommand::DeletePurchaseOrder(DeletePurchaseOrder {
                tenant_id: self.tenant_id,
                order_id: self.order_id,
                occurred_at: test_time(),
            }))
        }

        fn item_id(&self, idx: usize) -> PurchaseItemId {
            self.order.items()[idx].item_id
        }
    }

    fn single_line_order() -> Fixture {
        Fixture::new(vec![new_line(10, money(dec!(100)))], true)
    }

    fn imeis(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i:05}")).collect()
    }

    #[test]
    fn create_computes_total_and_starts_unpaid() {
        let f = Fixture::new(
            vec![
                new_line(10, money(dec!(100))),
                new_line(3, money(dec!(2.50))),
            ],
            false,
        );

        assert_eq!(f.order.status(), PurchaseOrderStatus::Draft);
        assert_eq!(f.order.total_amount().amount(), dec!(1007.5));
        assert!(f.order.paid_amount().is_zero());
        assert_eq!(f.order.due_amount(), f.order.total_amount());
        assert_eq!(f.order.items()[1].line_no, 2);
        assert_eq!(f.order.notes(), Some("first order"));
        assert!(f.order.order_date().is_some());
        assert_eq!(f.order.version(), 1);
    }

    #[test]
    fn create_rejects_empty_orders_and_zero_quantities() {
        let order = PurchaseOrder::empty(test_order_id());
        let mut cmd = CreatePurchaseOrder {
            tenant_id: test_tenant_id(),
            order_id: test_order_id(),
            invoice_number: "PO-1".to_string(),
            supplier_id: SupplierId::new(AggregateId::new()),
            shop_id: ShopId::new(AggregateId::new()),
            items: vec![],
            notes: None,
            due_date: None,
            placed: true,
            occurred_at: test_time(),
        };
        let err = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, PurchasingError::Validation(_)));

        cmd.items = vec![new_line(0, money(dec!(1)))];
        let err = order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap_err();
        assert!(matches!(err, PurchasingError::Validation(_)));
    }

    #[test]
    fn create_twice_is_rejected() {
        let f = single_line_order();
        let cmd = CreatePurchaseOrder {
            tenant_id: f.tenant_id,
            order_id: f.order_id,
            invoice_number: "PO-2".to_string(),
            supplier_id: SupplierId::new(AggregateId::new()),
            shop_id: ShopId::new(AggregateId::new()),
            items: vec![new_line(1, money(dec!(1)))],
            notes: None,
            due_date: None,
            placed: false,
            occurred_at: test_time(),
        };
        let err = f
            .order
            .handle(&PurchaseOrderCommand::CreatePurchaseOrder(cmd))
            .unwrap_err();
        assert_eq!(err, PurchasingError::AlreadyExists);
    }

    #[test]
    fn partial_then_full_receipt_moves_status_and_stamps_received_date() {
        let mut f = single_line_order();
        assert_eq!(f.order.total_amount().amount(), dec!(1000));
        let item = f.item_id(0);

        let events = f
            .receive("r-1", vec![ReceivingRecord::identified(item, imeis("35", 6))])
            .unwrap();
        match &events[0] {
            PurchaseOrderEvent::StockReceived(e) => {
                assert_eq!(e.receipt_no, 1);
                assert_eq!(e.movements.len(), 1);
                assert_eq!(e.movements[0].quantity, Quantity::new(6));
                assert_eq!(e.movements[0].unit_cost.amount(), dec!(100));
                assert_eq!(e.movements[0].identity_numbers.len(), 6);
                assert_eq!(e.status, PurchaseOrderStatus::Partial);
                assert!(e.received_date.is_none());
            }
            other => panic!("Expected StockReceived event, got {other:?}"),
        }
        assert_eq!(f.order.items()[0].received, Quantity::new(6));
        assert_eq!(f.order.status(), PurchaseOrderStatus::Partial);
        assert!(f.order.received_date().is_none());

        f.receive("r-2", vec![ReceivingRecord::anonymous(item, 4)])
            .unwrap();
        assert_eq!(f.order.items()[0].received, Quantity::new(10));
        assert_eq!(f.order.status(), PurchaseOrderStatus::Received);
        assert!(f.order.received_date().is_some());
        assert_eq!(f.order.movements().count(), 2);
    }

    #[test]
    fn receiving_more_than_pending_is_rejected_without_mutation() {
        let mut f = single_line_order();
        let item = f.item_id(0);
        f.receive("r-1", vec![ReceivingRecord::anonymous(item, 6)])
            .unwrap();
        let before = f.order.clone();

        let err = f
            .receive("r-2", vec![ReceivingRecord::anonymous(item, 5)])
            .unwrap_err();
        assert_eq!(
            err,
            PurchasingError::QuantityExceedsOrdered {
                item_id: item,
                requested: Quantity::new(5),
                pending: Quantity::new(4),
            }
        );
        assert_eq!(f.order, before);
    }

    #[test]
    fn receipt_batch_is_all_or_nothing() {
        let mut f = Fixture::new(
            vec![new_line(5, money(dec!(10))), new_line(5, money(dec!(20)))],
            true,
        );
        let (a, b) = (f.item_id(0), f.item_id(1));

        let err = f
            .receive(
                "batch",
                vec![
                    ReceivingRecord::anonymous(a, 2),
                    ReceivingRecord {
                        item_id: b,
                        quantity: Quantity::new(3),
                        identity_numbers: vec!["X1".into(), "X2".into()],
                    },
                ],
            )
            .unwrap_err();
        assert!(matches!(err, PurchasingError::IdentityCountMismatch { .. }));
        assert!(!f.order.has_received_stock());
        assert_eq!(f.order.status(), PurchaseOrderStatus::Ordered);
    }

    #[test]
    fn unknown_item_is_rejected() {
        let mut f = single_line_order();
        let stranger = PurchaseItemId::new(AggregateId::new());
        let err = f
            .receive("r-1", vec![ReceivingRecord::anonymous(stranger, 1)])
            .unwrap_err();
        assert_eq!(err, PurchasingError::ItemNotFound(stranger));
    }

    #[test]
    fn draft_orders_cannot_receive() {
        let mut f = Fixture::new(vec![new_line(1, money(dec!(1)))], false);
        let item = f.item_id(0);
        let err = f
            .receive("r-1", vec![ReceivingRecord::anonymous(item, 1)])
            .unwrap_err();
        assert_eq!(
            err,
            PurchasingError::OrderNotReceivable(PurchaseOrderStatus::Draft)
        );
    }

    #[test]
    fn replaying_same_key_and_payload_is_a_no_op() {
        let mut f = single_line_order();
        let item = f.item_id(0);
        let records = vec![ReceivingRecord::anonymous(item, 10)];

        f.receive("same", records.clone()).unwrap();
        let version = f.order.version();

        let events = f.receive("same", records).unwrap();
        assert!(events.is_empty());
        assert_eq!(f.order.version(), version);
        assert_eq!(f.order.items()[0].received, Quantity::new(10));

        let err = f
            .receive("same", vec![ReceivingRecord::anonymous(item, 1)])
            .unwrap_err();
        assert_eq!(err, PurchasingError::IdempotencyKeyReused("same".into()));
    }

    #[test]
    fn identity_numbers_cannot_be_received_twice_on_one_order() {
        let mut f = single_line_order();
        let item = f.item_id(0);
        f.receive("r-1", vec![ReceivingRecord::identified(item, ["IMEI-1"])])
            .unwrap();
        let err = f
            .receive("r-2", vec![ReceivingRecord::identified(item, ["IMEI-1"])])
            .unwrap_err();
        assert_eq!(err, PurchasingError::DuplicateIdentityNumber("IMEI-1".into()));
    }

    #[test]
    fn completion_requires_full_receipt_and_settled_due() {
        let mut f = single_line_order();
        let item = f.item_id(0);

        let err = f.change_status(PurchaseOrderStatus::Completed).unwrap_err();
        assert!(matches!(err, PurchasingError::InvalidStateTransition { .. }));

        f.receive("r-1", vec![ReceivingRecord::anonymous(item, 10)])
            .unwrap();
        let err = f.change_status(PurchaseOrderStatus::Completed).unwrap_err();
        match err {
            PurchasingError::InvalidStateTransition { reason, .. } => {
                assert!(reason.contains("due amount"))
            }
            other => panic!("Expected InvalidStateTransition, got {other:?}"),
        }

        f.pay(money(dec!(1000))).unwrap();
        assert!(f.order.due_amount().is_zero());
        f.change_status(PurchaseOrderStatus::Completed).unwrap();
        assert_eq!(f.order.status(), PurchaseOrderStatus::Completed);
    }

    #[test]
    fn fully_paid_order_with_pending_stock_cannot_complete() {
        let mut f = single_line_order();
        f.pay(money(dec!(1000))).unwrap();
        assert_eq!(f.order.status(), PurchaseOrderStatus::Ordered);
        assert!(f.change_status(PurchaseOrderStatus::Completed).is_err());
    }

    #[test]
    fn receiving_derived_statuses_cannot_be_set_manually() {
        let mut f = single_line_order();
        for status in [PurchaseOrderStatus::Partial, PurchaseOrderStatus::Received] {
            let err = f.change_status(status).unwrap_err();
            assert!(matches!(err, PurchasingError::InvalidStateTransition { .. }));
        }
    }

    #[test]
    fn draft_can_be_placed_then_cancelled() {
        let mut f = Fixture::new(vec![new_line(2, money(dec!(5)))], false);
        f.change_status(PurchaseOrderStatus::Ordered).unwrap();
        assert_eq!(f.order.status(), PurchaseOrderStatus::Ordered);
        assert!(f.change_status(PurchaseOrderStatus::Ordered).is_err());

        f.change_status(PurchaseOrderStatus::Cancelled).unwrap();
        let err = f.change_status(PurchaseOrderStatus::Ordered).unwrap_err();
        match err {
            PurchasingError::InvalidStateTransition { reason, .. } => {
                assert_eq!(reason, "status is terminal")
            }
            other => panic!("Expected InvalidStateTransition, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_is_blocked_once_stock_is_posted() {
        let mut f = single_line_order();
        let item = f.item_id(0);
        f.receive("r-1", vec![ReceivingRecord::anonymous(item, 1)])
            .unwrap();
        let err = f.change_status(PurchaseOrderStatus::Cancelled).unwrap_err();
        assert!(matches!(err, PurchasingError::InvalidStateTransition { .. }));
        assert_eq!(f.order.status(), PurchaseOrderStatus::Partial);
    }

    #[test]
    fn overpayment_is_rejected_and_paid_unchanged() {
        let mut f = single_line_order();
        let err = f.pay(money(dec!(1200))).unwrap_err();
        assert_eq!(
            err,
            PurchasingError::PaymentExceedsDue {
                amount: money(dec!(1200)),
                due: money(dec!(1000)),
            }
        );
        assert!(f.order.paid_amount().is_zero());

        assert!(matches!(
            f.pay(Money::ZERO).unwrap_err(),
            PurchasingError::PaymentExceedsDue { .. }
        ));
    }

    #[test]
    fn payments_accumulate_and_due_is_derived() {
        let mut f = single_line_order();
        f.pay(money(dec!(250.25))).unwrap();
        f.pay(money(dec!(249.75))).unwrap();
        assert_eq!(f.order.paid_amount().amount(), dec!(500));
        assert_eq!(f.order.due_amount().amount(), dec!(500));
        assert_eq!(f.order.payments().len(), 2);
        assert_eq!(f.order.status(), PurchaseOrderStatus::Ordered);
    }

    #[test]
    fn cancelled_orders_refuse_payments() {
        let mut f = single_line_order();
        f.change_status(PurchaseOrderStatus::Cancelled).unwrap();
        assert_eq!(
            f.pay(money(dec!(1))).unwrap_err(),
            PurchasingError::OrderCancelled
        );
    }

    #[test]
    fn deletion_guard() {
        let mut untouched = single_line_order();
        untouched.delete().unwrap();
        assert!(untouched.order.is_deleted());
        assert_eq!(untouched.delete().unwrap_err(), PurchasingError::NotFound);

        let mut received = single_line_order();
        let item = received.item_id(0);
        received
            .receive("r-1", vec![ReceivingRecord::anonymous(item, 10)])
            .unwrap();
        assert_eq!(
            received.delete().unwrap_err(),
            PurchasingError::CannotDeleteReceivedOrder
        );

        received.pay(money(dec!(1000))).unwrap();
        received.change_status(PurchaseOrderStatus::Completed).unwrap();
        assert_eq!(
            received.delete().unwrap_err(),
            PurchasingError::CannotDeleteCompleted
        );
    }

    #[test]
    fn commands_against_missing_order_are_not_found() {
        let order = PurchaseOrder::empty(test_order_id());
        let cmd = PurchaseOrderCommand::ChangeStatus(ChangeStatus {
            tenant_id: test_tenant_id(),
            order_id: *order.id(),
            status: PurchaseOrderStatus::Ordered,
            occurred_at: test_time(),
        });
        assert_eq!(order.handle(&cmd).unwrap_err(), PurchasingError::NotFound);
        assert_eq!(cmd.target_aggregate_id(), order.id().0);
    }

    #[test]
    fn events_round_trip_through_json() {
        let mut f = single_line_order();
        let item = f.item_id(0);
        let events = f
            .receive("r-1", vec![ReceivingRecord::identified(item, ["A", "B"])])
            .unwrap();
        let json = serde_json::to_value(&events[0]).unwrap();
        let back: PurchaseOrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, events[0]);
        assert_eq!(back.event_type(), "purchasing.order.stock_received");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Receive { line: usize, qty: u32 },
            Pay { minor: u64 },
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                (0usize..3, 0u32..8).prop_map(|(line, qty)| Step::Receive { line, qty }),
                (0u64..60_000).prop_map(|minor| Step::Pay { minor }),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Whatever sequence of receipts and payments is attempted, accepted or
            /// not, quantities and amounts stay inside their bounds.
            #[test]
            fn quantities_and_amounts_stay_within_bounds(
                ordered in prop::collection::vec(1u32..10, 3),
                steps in prop::collection::vec(step(), 1..30),
            ) {
                let lines = ordered
                    .iter()
                    .map(|q| new_line(*q, Money::from_minor(1_000)))
                    .collect();
                let mut f = Fixture::new(lines, true);

                for (n, s) in steps.into_iter().enumerate() {
                    let _ = match s {
                        Step::Receive { line, qty } => {
                            let item = f.item_id(line);
                            f.receive(&format!("k{n}"), vec![ReceivingRecord::anonymous(item, qty)])
                        }
                        Step::Pay { minor } => f.pay(Money::from_minor(minor)),
                    };

                    for item in f.order.items() {
                        prop_assert!(item.received <= item.ordered);
                    }
                    prop_assert!(f.order.paid_amount() <= f.order.total_amount());
                    prop_assert_eq!(
                        f.order.due_amount().checked_add(f.order.paid_amount()).unwrap(),
                        f.order.total_amount()
                    );
                    if f.order.items().iter().all(PurchaseItem::is_fully_received) {
                        prop_assert_eq!(f.order.status(), PurchaseOrderStatus::Received);
                    }
                }
            }

            /// Receiving disjoint lines in either order ends in the same line state.
            #[test]
            fn disjoint_receipts_commute(qa in 1u32..6, qb in 1u32..6) {
                let lines = vec![new_line(5, Money::from_minor(100)), new_line(5, Money::from_minor(200))];
                let mut ab = Fixture::new(lines.clone(), true);
                let mut ba = Fixture::new(lines, true);
                let (a, b) = (ab.item_id(0), ab.item_id(1));

                ab.receive("a", vec![ReceivingRecord::anonymous(a, qa)]).unwrap();
                ab.receive("b", vec![ReceivingRecord::anonymous(b, qb)]).unwrap();
                ba.receive("b", vec![ReceivingRecord::anonymous(b, qb)]).unwrap();
                ba.receive("a", vec![ReceivingRecord::anonymous(a, qa)]).unwrap();

                let received = |f: &Fixture| f.order.items().iter().map(|i| i.received).collect::<Vec<_>>();
                prop_assert_eq!(received(&ab), received(&ba));
                prop_assert_eq!(ab.order.status(), ba.order.status());
            }
        }
    }
}
