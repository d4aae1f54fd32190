//! Per-stream cursors for at-least-once delivery.
//!
//! A projection remembers the last sequence number it applied for every
//! `(tenant_id, aggregate_id)` stream. Anything at or below it is a redelivery.

use std::collections::HashMap;

use stockwise_core::{AggregateId, TenantId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CursorKey {
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Position {
    /// Already applied; skip.
    Seen,
    /// Exactly the next event of the stream.
    Next,
    /// A gap (or sequence 0): earlier events were never applied.
    Gap { last: u64 },
}

pub(crate) type Cursors = HashMap<CursorKey, u64>;

pub(crate) fn position(cursors: &Cursors, key: CursorKey, sequence_number: u64) -> Position {
    let last = cursors.get(&key).copied().unwrap_or(0);
    if sequence_number == 0 || sequence_number > last + 1 {
        Position::Gap { last }
    } else if sequence_number <= last {
        Position::Seen
    } else {
        Position::Next
    }
}

pub(crate) fn clear_tenant(cursors: &mut Cursors, tenant_id: TenantId) {
    cursors.retain(|k, _| k.tenant_id != tenant_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_redeliveries_and_gaps() {
        let key = CursorKey {
            tenant_id: TenantId::new(),
            aggregate_id: AggregateId::new(),
        };
        let mut cursors = Cursors::new();
        assert_eq!(position(&cursors, key, 1), Position::Next);
        assert_eq!(position(&cursors, key, 2), Position::Gap { last: 0 });

        cursors.insert(key, 3);
        assert_eq!(position(&cursors, key, 2), Position::Seen);
        assert_eq!(position(&cursors, key, 4), Position::Next);
        assert_eq!(position(&cursors, key, 0), Position::Gap { last: 3 });
    }
}
