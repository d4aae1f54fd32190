//! Entity trait: identity that survives state changes.

/// Entity marker + minimal interface.
///
/// Child entities of an aggregate (e.g. purchase order lines) implement this so
/// lookups go through their identity rather than their position.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
