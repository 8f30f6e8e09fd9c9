//! Stable entity identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable entity identifier handed out by a world.
///
/// hecs recycles its internal handles; `EntityId` does not, so renderer logs
/// and scene files can refer to an entity across despawns.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-world id source. Ids start at 1 and are never reused.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Make sure ids handed out later are greater than `id`
    /// (used when a scene file pins explicit ids).
    pub fn reserve_through(&mut self, id: EntityId) {
        self.next = self.next.max(id.0 + 1);
    }
}
