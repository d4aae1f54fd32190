//! Per-tenant invoice number allocation and uniqueness.
//!
//! Allocated numbers look like `PO-20260101-0007`: prefix, order date, and a daily
//! sequence. Caller-supplied numbers go through the same uniqueness check.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, Utc};

use stockwise_core::TenantId;
use stockwise_purchasing::{PurchaseOrderId, PurchasingError};

#[derive(Debug, Default)]
struct Registry {
    next: HashMap<(TenantId, NaiveDate), u32>,
    taken: HashMap<(TenantId, String), PurchaseOrderId>,
}

#[derive(Debug)]
pub struct InvoiceNumbers {
    prefix: String,
    registry: Mutex<Registry>,
}

impl InvoiceNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            registry: Mutex::new(Registry::default()),
        }
    }

    /// Allocate and reserve the next free number for `at`'s date.
    pub fn allocate(&self, tenant_id: TenantId, at: DateTime<Utc>, order_id: PurchaseOrderId) -> String {
        let date = at.date_naive();
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            let seq = {
                let next = registry.next.entry((tenant_id, date)).or_insert(0);
                *next += 1;
                *next
            };
            let candidate = format!("{}-{}-{seq:04}", self.prefix, date.format("%Y%m%d"));
            // Skip numbers a caller already claimed by hand.
            if !registry.taken.contains_key(&(tenant_id, candidate.clone())) {
                registry.taken.insert((tenant_id, candidate.clone()), order_id);
                return candidate;
            }
        }
    }

    /// Reserve a caller-supplied number.
    pub fn reserve(
        &self,
        tenant_id: TenantId,
        invoice_number: &str,
        order_id: PurchaseOrderId,
    ) -> Result<String, PurchasingError> {
        let number = invoice_number.trim();
        if number.is_empty() {
            return Err(PurchasingError::validation("invoice number cannot be empty"));
        }
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let key = (tenant_id, number.to_string());
        if registry.taken.contains_key(&key) {
            return Err(PurchasingError::DuplicateInvoiceNumber(number.to_string()));
        }
        registry.taken.insert(key, order_id);
        Ok(number.to_string())
    }

    /// Give a number back after the order it was reserved for failed to be created.
    pub fn release(&self, tenant_id: TenantId, invoice_number: &str, order_id: PurchaseOrderId) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let key = (tenant_id, invoice_number.to_string());
        if registry.taken.get(&key) == Some(&order_id) {
            registry.taken.remove(&key);
        }
    }

    pub fn owner(&self, tenant_id: TenantId, invoice_number: &str) -> Option<PurchaseOrderId> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry
            .taken
            .get(&(tenant_id, invoice_number.to_string()))
            .copied()
    }
}
