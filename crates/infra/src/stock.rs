//! In-memory inventory stock service.
//!
//! Keeps on-hand levels per `(tenant, product, shop)`, the set of posted source
//! references, the per-unit identity registry and the identity holds taken by orders
//! before they commit a receipt. One write lock covers all of it, so a posting is
//! applied completely or not at all.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use stockwise_core::{AggregateId, Quantity, TenantId};
use stockwise_inventory::{
    IncreaseStock, PostingOutcome, ProductId, ShopId, SourceRef, StockError, StockLevel,
    StockService,
};

/// Where a serialized unit lives and which receipt brought it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRecord {
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub source: SourceRef,
}

/// An order's claim on an identity number.
#[derive(Debug, Clone, Copy)]
struct IdentityHold {
    owner: AggregateId,
    /// Reservations not yet confirmed or released.
    pending: u32,
    /// A receipt carrying the number was committed.
    confirmed: bool,
}

#[derive(Debug, Default)]
struct TenantStock {
    posted: HashSet<SourceRef>,
    levels: HashMap<(ProductId, ShopId), StockLevel>,
    units: HashMap<String, UnitRecord>,
    holds: HashMap<String, IdentityHold>,
}

impl TenantStock {
    /// Who else already owns `identity`, if anyone.
    fn foreign_owner(&self, identity: &str, owner: AggregateId) -> Option<AggregateId> {
        if let Some(unit) = self.units.get(identity) {
            if unit.source.order_id != owner {
                return Some(unit.source.order_id);
            }
        }
        self.holds
            .get(identity)
            .map(|hold| hold.owner)
            .filter(|holder| *holder != owner)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStockService {
    tenants: RwLock<HashMap<TenantId, TenantStock>>,
    unavailable: AtomicBool,
}

fn poisoned() -> StockError {
    StockError::Unavailable("lock poisoned".to_string())
}

impl InMemoryStockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every posting fails with `StockError::Unavailable`.
    /// Identity holds keep working.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn level(&self, tenant_id: TenantId, product_id: ProductId, shop_id: ShopId) -> StockLevel {
        self.tenants
            .read()
            .ok()
            .and_then(|t| t.get(&tenant_id)?.levels.get(&(product_id, shop_id)).copied())
            .unwrap_or_default()
    }

    pub fn unit(&self, tenant_id: TenantId, identity_number: &str) -> Option<UnitRecord> {
        self.tenants
            .read()
            .ok()?
            .get(&tenant_id)?
            .units
            .get(identity_number)
            .cloned()
    }

    /// Current holder of an identity number, posted or not.
    pub fn holder(&self, tenant_id: TenantId, identity_number: &str) -> Option<AggregateId> {
        self.tenants
            .read()
            .ok()?
            .get(&tenant_id)?
            .holds
            .get(identity_number)
            .map(|hold| hold.owner)
    }

    /// Number of distinct source references posted for a tenant.
    pub fn posted_count(&self, tenant_id: TenantId) -> usize {
        self.tenants
            .read()
            .ok()
            .and_then(|t| t.get(&tenant_id).map(|s| s.posted.len()))
            .unwrap_or(0)
    }
}

impl StockService for InMemoryStockService {
    fn increase_stock(
        &self,
        tenant_id: TenantId,
        request: IncreaseStock,
    ) -> Result<PostingOutcome, StockError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StockError::Unavailable("stock service offline".to_string()));
        }
        if request.quantity.is_zero() {
            return Err(StockError::InvalidQuantity);
        }

        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        let stock = tenants.entry(tenant_id).or_default();

        if stock.posted.contains(&request.source) {
            return Ok(PostingOutcome::AlreadyPosted);
        }

        for identity in &request.identity_numbers {
            if let Some(existing) = stock.units.get(identity) {
                return Err(StockError::IdentityConflict {
                    identity: identity.clone(),
                    existing: existing.source,
                });
            }
            if let Some(owner) = stock.foreign_owner(identity, request.source.order_id) {
                return Err(StockError::IdentityHeld {
                    identity: identity.clone(),
                    owner,
                });
            }
        }

        let mut level = stock
            .levels
            .get(&(request.product_id, request.shop_id))
            .copied()
            .unwrap_or_default();
        level.receive(request.quantity, request.unit_cost)?;

        stock
            .levels
            .insert((request.product_id, request.shop_id), level);
        for identity in request.identity_numbers {
            stock.units.insert(
                identity,
                UnitRecord {
                    product_id: request.product_id,
                    shop_id: request.shop_id,
                    source: request.source,
                },
            );
        }
        stock.posted.insert(request.source);

        Ok(PostingOutcome::Applied)
    }

    fn on_hand(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        shop_id: ShopId,
    ) -> Result<Quantity, StockError> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        Ok(tenants
            .get(&tenant_id)
            .and_then(|s| s.levels.get(&(product_id, shop_id)))
            .map(|l| l.on_hand)
            .unwrap_or(Quantity::ZERO))
    }

    fn find_unit(
        &self,
        tenant_id: TenantId,
        identity_number: &str,
    ) -> Result<Option<SourceRef>, StockError> {
        let tenants = self.tenants.read().map_err(|_| poisoned())?;
        Ok(tenants
            .get(&tenant_id)
            .and_then(|s| s.units.get(identity_number))
            .map(|u| u.source))
    }

    fn reserve_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        let stock = tenants.entry(tenant_id).or_default();

        for identity in identity_numbers {
            if let Some(holder) = stock.foreign_owner(identity, owner) {
                return Err(StockError::IdentityHeld {
                    identity: identity.clone(),
                    owner: holder,
                });
            }
        }
        for identity in identity_numbers {
            stock
                .holds
                .entry(identity.clone())
                .or_insert(IdentityHold {
                    owner,
                    pending: 0,
                    confirmed: false,
                })
                .pending += 1;
        }
        Ok(())
    }

    fn confirm_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        let stock = tenants.entry(tenant_id).or_default();

        for identity in identity_numbers {
            if let Some(hold) = stock.holds.get_mut(identity) {
                if hold.owner == owner {
                    hold.pending = hold.pending.saturating_sub(1);
                    hold.confirmed = true;
                }
            }
        }
        Ok(())
    }

    fn release_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError> {
        let mut tenants = self.tenants.write().map_err(|_| poisoned())?;
        let Some(stock) = tenants.get_mut(&tenant_id) else {
            return Ok(());
        };

        for identity in identity_numbers {
            let free = match stock.holds.get_mut(identity) {
                Some(hold) if hold.owner == owner => {
                    hold.pending = hold.pending.saturating_sub(1);
                    hold.pending == 0 && !hold.confirmed
                }
                _ => false,
            };
            if free {
                stock.holds.remove(identity);
            }
        }
        Ok(())
    }
}
