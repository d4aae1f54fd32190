//! In-memory supplier directory.

use stockwise_core::TenantId;
use stockwise_purchasing::{Supplier, SupplierDirectory, SupplierId};

use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Supplier lookup backed by a tenant-isolated store. Suppliers are maintained
/// elsewhere; purchasing only reads them.
#[derive(Debug, Default)]
pub struct InMemorySupplierDirectory {
    suppliers: InMemoryTenantStore<SupplierId, Supplier>,
}

impl InMemorySupplierDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tenant_id: TenantId, supplier: Supplier) {
        self.suppliers
            .upsert(tenant_id, supplier.supplier_id, supplier);
    }
}

impl SupplierDirectory for InMemorySupplierDirectory {
    fn find(&self, tenant_id: TenantId, supplier_id: SupplierId) -> Option<Supplier> {
        self.suppliers.get(tenant_id, &supplier_id)
    }
}
