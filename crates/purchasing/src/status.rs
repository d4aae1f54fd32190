use serde::{Deserialize, Serialize};

/// Purchase order status lifecycle.
///
/// ```text
/// Draft ──> Ordered ──> Partial ──> Received ──> Completed
///   │          │  └──────────────────^  │
///   └──────────┴─────────┴──────────────┴──> Cancelled
/// ```
///
/// `Partial` and `Received` are derived from receiving progress; `Completed` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Ordered,
    Partial,
    Received,
    Completed,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Ordered => "ordered",
            PurchaseOrderStatus::Partial => "partial",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Completed => "completed",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Completed | PurchaseOrderStatus::Cancelled
        )
    }

    /// Only placed orders that are not yet fully received accept deliveries.
    pub fn accepts_receipts(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Ordered | PurchaseOrderStatus::Partial
        )
    }

    /// Set by the receiving engine, never by a caller.
    pub fn is_receiving_derived(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Partial | PurchaseOrderStatus::Received
        )
    }

    pub fn is_deletable(self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Draft | PurchaseOrderStatus::Ordered | PurchaseOrderStatus::Cancelled
        )
    }

    /// Edges of the state graph, regardless of who drives them.
    pub fn can_transition_to(self, next: PurchaseOrderStatus) -> bool {
        use PurchaseOrderStatus::*;

        match (self, next) {
            (Draft, Ordered) => true,
            (Ordered, Partial) | (Ordered, Received) => true,
            (Partial, Received) => true,
            (Received, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl core::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
