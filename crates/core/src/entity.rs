//! Entity trait: identity + continuity across state changes.

use chrono::{DateTime, Utc};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> Self::Id;

    /// Creation timestamp; stores order listings by it.
    fn created_at(&self) -> DateTime<Utc>;
}

/// Sort entities in creation order (ties broken by the time-ordered id).
pub fn sort_by_creation<E>(items: &mut [E])
where
    E: Entity,
    E::Id: Ord,
{
    items.sort_by(|a, b| {
        a.created_at()
            .cmp(&b.created_at())
            .then_with(|| a.id().cmp(&b.id()))
    });
}
