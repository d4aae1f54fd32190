use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockwise_core::{AggregateId, TenantId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub AggregateId);

impl SupplierId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Supplier identity as shown next to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: SupplierId,
    pub name: String,
    #[serde(default)]
    pub contact: Option<String>,
}

/// Read-only supplier lookup. Purchasing never mutates suppliers.
pub trait SupplierDirectory: Send + Sync {
    fn find(&self, tenant_id: TenantId, supplier_id: SupplierId) -> Option<Supplier>;
}

impl<D> SupplierDirectory for Arc<D>
where
    D: SupplierDirectory + ?Sized,
{
    fn find(&self, tenant_id: TenantId, supplier_id: SupplierId) -> Option<Supplier> {
        (**self).find(tenant_id, supplier_id)
    }
}
