use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use stockwise_core::{AggregateId, DomainError, DomainResult, Money, Quantity, TenantId};

use crate::movement::{ProductId, ShopId, SourceRef, StockMovement};

/// Request to add received units to on-hand stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncreaseStock {
    pub product_id: ProductId,
    pub shop_id: ShopId,
    pub quantity: Quantity,
    pub unit_cost: Money,
    pub source: SourceRef,
    pub identity_numbers: Vec<String>,
}

impl From<&StockMovement> for IncreaseStock {
    fn from(movement: &StockMovement) -> Self {
        Self {
            product_id: movement.product_id,
            shop_id: movement.shop_id,
            quantity: movement.quantity,
            unit_cost: movement.unit_cost,
            source: movement.source,
            identity_numbers: movement.identity_numbers.clone(),
        }
    }
}

/// Result of an `increase_stock` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PostingOutcome {
    /// Stock was increased.
    Applied,
    /// The source reference was already posted; nothing changed.
    AlreadyPosted,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("stock increase must be positive")]
    InvalidQuantity,

    #[error("identity number '{identity}' already registered by {existing}")]
    IdentityConflict { identity: String, existing: SourceRef },

    #[error("identity number '{identity}' is held by order {owner}")]
    IdentityHeld { identity: String, owner: AggregateId },

    #[error("stock storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Inventory stock collaborator.
///
/// `increase_stock` must be idempotent on `source`: a second call with an already
/// posted reference returns `AlreadyPosted` and leaves stock untouched. Callers rely on
/// this to replay movements safely after a crash or a retried request.
pub trait StockService: Send + Sync {
    fn increase_stock(
        &self,
        tenant_id: TenantId,
        request: IncreaseStock,
    ) -> Result<PostingOutcome, StockError>;

    fn on_hand(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        shop_id: ShopId,
    ) -> Result<Quantity, StockError>;

    /// Which movement registered this identity number, if any.
    fn find_unit(
        &self,
        tenant_id: TenantId,
        identity_number: &str,
    ) -> Result<Option<SourceRef>, StockError>;

    /// Hold identity numbers for `owner` (an order) before its receipt is committed.
    ///
    /// All or nothing: if any number is held or posted by another owner, nothing is
    /// held and `IdentityHeld` names the first offender. Every successful call is
    /// settled by exactly one `confirm_identities` or `release_identities` with the
    /// same numbers.
    fn reserve_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError>;

    /// The receipt carrying these numbers was committed; the hold becomes permanent.
    fn confirm_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError>;

    /// The receipt was not committed. Numbers no other pending or committed receipt of
    /// `owner` holds become free again.
    fn release_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError>;
}

impl<S> StockService for Arc<S>
where
    S: StockService + ?Sized,
{
    fn increase_stock(
        &self,
        tenant_id: TenantId,
        request: IncreaseStock,
    ) -> Result<PostingOutcome, StockError> {
        (**self).increase_stock(tenant_id, request)
    }

    fn on_hand(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        shop_id: ShopId,
    ) -> Result<Quantity, StockError> {
        (**self).on_hand(tenant_id, product_id, shop_id)
    }

    fn find_unit(
        &self,
        tenant_id: TenantId,
        identity_number: &str,
    ) -> Result<Option<SourceRef>, StockError> {
        (**self).find_unit(tenant_id, identity_number)
    }

    fn reserve_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError> {
        (**self).reserve_identities(tenant_id, owner, identity_numbers)
    }

    fn confirm_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError> {
        (**self).confirm_identities(tenant_id, owner, identity_numbers)
    }

    fn release_identities(
        &self,
        tenant_id: TenantId,
        owner: AggregateId,
        identity_numbers: &[String],
    ) -> Result<(), StockError> {
        (**self).release_identities(tenant_id, owner, identity_numbers)
    }
}

/// On-hand quantity and purchase-cost valuation of one product at one shop.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct StockLevel {
    pub on_hand: Quantity,
    pub valuation: Money,
}

impl StockLevel {
    pub fn receive(&mut self, quantity: Quantity, unit_cost: Money) -> DomainResult<()> {
        let value = unit_cost.times(quantity)?;
        self.on_hand = self.on_hand.checked_add(quantity)?;
        self.valuation = self.valuation.checked_add(value)?;
        Ok(())
    }
}

/// Rebuilds stock levels from the movement trail.
///
/// Movements are deduplicated on their source reference, so feeding the same trail
/// twice (or overlapping trails) yields the same levels.
#[derive(Debug, Default)]
pub struct StockLedger {
    seen: HashSet<SourceRef>,
    levels: BTreeMap<(ProductId, ShopId), StockLevel>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replay<'a>(
        movements: impl IntoIterator<Item = &'a StockMovement>,
    ) -> DomainResult<Self> {
        let mut ledger = Self::new();
        for movement in movements {
            ledger.record(movement)?;
        }
        Ok(ledger)
    }

    /// Returns `false` when the movement was already recorded.
    pub fn record(&mut self, movement: &StockMovement) -> DomainResult<bool> {
        if movement.quantity.is_zero() {
            return Err(DomainError::validation("stock movement quantity must be positive"));
        }
        if self.seen.contains(&movement.source) {
            return Ok(false);
        }
        self.levels
            .entry((movement.product_id, movement.shop_id))
            .or_default()
            .receive(movement.quantity, movement.unit_cost)?;
        self.seen.insert(movement.source);
        Ok(true)
    }

    pub fn level(&self, product_id: ProductId, shop_id: ShopId) -> StockLevel {
        self.levels
            .get(&(product_id, shop_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn levels(&self) -> impl Iterator<Item = (&(ProductId, ShopId), &StockLevel)> {
        self.levels.iter()
    }
}
